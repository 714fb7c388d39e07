//! State reduction.
//!
//! [`apply`] is the only code that writes [`AppState`]. It performs no IO and
//! reads no clock, so replaying the same actions always yields the same state.

use folio_types::{
    DEFAULT_LIGHT_THEME, FieldTypeMismatch, LoadState, Position, SessionSnapshot, Theme,
    ThemeRegistry, ViewIndex, ViewSlot,
};
use thiserror::Error;

use crate::action::Action;
use crate::load::{self, IllegalTransition, LoadEdge};
use crate::state::AppState;

const NEW_THEME_BASE: &str = "New Theme";

/// Why an action left the state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("view {view} does not exist")]
    UnknownView { view: ViewIndex },
    #[error("no document is open in view {view}")]
    NoDocument { view: ViewIndex },
    #[error("view {view}: {source}")]
    IllegalTransition {
        view: ViewIndex,
        source: IllegalTransition,
    },
    #[error("view {view} is {state}, not LOADING")]
    NotLoading { view: ViewIndex, state: LoadState },
    #[error("theme `{name}` does not exist")]
    UnknownTheme { name: String },
    #[error("theme `{name}` is built in and cannot be changed")]
    ReadOnlyTheme { name: String },
    #[error("theme `{name}` already exists")]
    ThemeNameTaken { name: String },
    #[error("theme name must not be empty")]
    EmptyThemeName,
    #[error(transparent)]
    FieldType(#[from] FieldTypeMismatch),
}

/// Pure reduction: returns the next state, or the current one unchanged when
/// the action is rejected.
#[must_use]
pub fn reduce(state: &AppState, action: &Action) -> AppState {
    let mut next = state.clone();
    match apply(&mut next, action) {
        Ok(()) => next,
        Err(_) => state.clone(),
    }
}

/// Applies `action` to `state` in place.
///
/// On `Err` the state may be partially written; callers reduce a copy and
/// discard it on rejection.
pub fn apply(state: &mut AppState, action: &Action) -> Result<(), Rejection> {
    if let Some(view) = action.view() {
        let slot = state
            .view_mut(view)
            .ok_or(Rejection::UnknownView { view })?;
        return apply_view(slot, view, action);
    }
    apply_settings(state, action)
}

fn move_slot(slot: &mut ViewSlot, view: ViewIndex, edge: LoadEdge) -> Result<(), Rejection> {
    let receipt = load::transition(slot.load_state, edge)
        .map_err(|source| Rejection::IllegalTransition { view, source })?;
    slot.load_state = receipt.to();
    Ok(())
}

fn hydrate(slot: &mut ViewSlot, snapshot: &SessionSnapshot) {
    let data = &snapshot.data;
    slot.title.clone_from(&snapshot.title);
    slot.author.clone_from(&snapshot.author);
    slot.position = Position::new(Some(data.locator.clone()), Some(data.progress));
    slot.bookmarks = data.bookmarks.clone();
    slot.highlights = data.highlights.clone();
    slot.style = data.theme.clone();
}

fn apply_view(slot: &mut ViewSlot, view: ViewIndex, action: &Action) -> Result<(), Rejection> {
    match action {
        Action::BeginLoad { hash, .. } => {
            move_slot(slot, view, LoadEdge::Begin)?;
            *slot = ViewSlot {
                hash: Some(hash.clone()),
                load_state: LoadState::Loading,
                ..ViewSlot::default()
            };
            return Ok(());
        }
        Action::ResetView { .. } => {
            move_slot(slot, view, LoadEdge::Reset)?;
            *slot = ViewSlot::default();
            return Ok(());
        }
        _ => {}
    }

    if slot.load_state == LoadState::Empty {
        return Err(Rejection::NoDocument { view });
    }

    match action {
        Action::HydrateSession { snapshot, .. } => {
            if slot.load_state != LoadState::Loading {
                return Err(Rejection::NotLoading {
                    view,
                    state: slot.load_state,
                });
            }
            hydrate(slot, snapshot);
        }
        Action::CompleteLoad { .. } => move_slot(slot, view, LoadEdge::Complete)?,
        Action::FailLoad { reason, .. } => {
            move_slot(slot, view, LoadEdge::Fail)?;
            slot.load_error = Some(reason.clone());
        }
        Action::SetMetadata { title, author, .. } => {
            slot.title.clone_from(title);
            slot.author.clone_from(author);
        }
        Action::SetPosition {
            locator, progress, ..
        } => {
            slot.position = Position::new(locator.clone(), *progress);
        }
        Action::ToggleBookmark { locator, .. } => {
            slot.bookmarks.toggle(locator.clone());
        }
        Action::AddHighlight { highlight, .. } => {
            slot.highlights.upsert(highlight.clone());
        }
        Action::RemoveHighlight { range, .. } => {
            slot.highlights.remove(range);
        }
        Action::SetHighlightNote { range, note, .. } => {
            slot.highlights.set_note(range, note.clone());
        }
        Action::SetReaderStyle { field, value, .. } => {
            field.set(&mut slot.style, value.clone())?;
        }
        _ => {}
    }
    Ok(())
}

fn editable_theme<'a>(themes: &'a mut ThemeRegistry, name: &str) -> Result<&'a mut Theme, Rejection> {
    if ThemeRegistry::is_builtin(name) {
        return Err(Rejection::ReadOnlyTheme {
            name: name.to_string(),
        });
    }
    themes.get_mut(name).ok_or_else(|| Rejection::UnknownTheme {
        name: name.to_string(),
    })
}

fn apply_settings(state: &mut AppState, action: &Action) -> Result<(), Rejection> {
    let settings = &mut state.settings;
    let prefs = &mut settings.preferences;
    let ui = &mut settings.ui;

    match action {
        Action::SelectTheme { name } => {
            if !settings.themes.contains(name) {
                return Err(Rejection::UnknownTheme { name: name.clone() });
            }
            prefs.selected_theme.clone_from(name);
        }
        Action::AddTheme => {
            let name = settings.themes.unique_name(NEW_THEME_BASE);
            let base = settings
                .themes
                .get(DEFAULT_LIGHT_THEME)
                .cloned()
                .unwrap_or_else(Theme::light);
            settings.themes.insert(name, base);
        }
        Action::RenameTheme { from, to } => {
            let to = to.trim();
            if to.is_empty() {
                return Err(Rejection::EmptyThemeName);
            }
            if from == to {
                return Ok(());
            }
            if settings.themes.contains(to) {
                return Err(Rejection::ThemeNameTaken {
                    name: to.to_string(),
                });
            }
            let theme = editable_theme(&mut settings.themes, from)?.clone();
            settings.themes.remove(from);
            settings.themes.insert(to.to_string(), theme);
            if prefs.selected_theme == *from {
                prefs.selected_theme = to.to_string();
            }
        }
        Action::DeleteTheme { name } => {
            editable_theme(&mut settings.themes, name)?;
            settings.themes.remove(name);
            if prefs.selected_theme == *name {
                prefs.selected_theme = DEFAULT_LIGHT_THEME.to_string();
            }
        }
        Action::UpdateTheme {
            name,
            property,
            value,
        } => {
            let theme = editable_theme(&mut settings.themes, name)?;
            property.set(theme, value.clone());
        }
        Action::SetSortSettings { sort_by, direction } => {
            prefs.sort_by.clone_from(sort_by);
            prefs.sort_direction = *direction;
        }
        Action::SetReaderMargins { margins } => prefs.reader_margins = *margins,
        Action::SetQaCapability { credentials } => {
            prefs.qa_capability_id = credentials.capability_id.clone();
            prefs.qa_capability_key = credentials.capability_key.clone();
        }
        Action::ClearQaCapability => {
            prefs.qa_capability_id = Default::default();
            prefs.qa_capability_key = Default::default();
        }
        Action::LoadSettings { snapshot } => {
            *prefs = snapshot.preferences.clone();
            settings.themes = ThemeRegistry::with_builtins(snapshot.themes.clone().into_inner());
            if !settings.themes.contains(&prefs.selected_theme) {
                prefs.selected_theme = DEFAULT_LIGHT_THEME.to_string();
            }
        }
        Action::SetMaximized(maximized) => ui.maximized = *maximized,
        Action::ToggleMenu => ui.menu_toggled = !ui.menu_toggled,
        Action::ToggleThemeMenu => ui.theme_menu_active = !ui.theme_menu_active,
        Action::ToggleProgressMenu => ui.progress_menu_active = !ui.progress_menu_active,
        Action::SelectSidebarMenu { menu } => ui.sidebar_menu.clone_from(menu),
        Action::SelectView { view } => {
            if !view.is_valid() {
                return Err(Rejection::UnknownView { view: *view });
            }
            ui.selected_view = *view;
        }
        Action::SetDualReaderMode(enabled) => ui.dual_reader_mode = *enabled,
        Action::SetDualReaderReversed(reversed) => ui.dual_reader_reversed = *reversed,
        Action::SetDictionaryWord { word } => ui.dictionary_word.clone_from(word),
        Action::BindExcerpt { text } => ui.qa_excerpt.clone_from(text),
        Action::ClearExcerpt => ui.qa_excerpt.clear(),
        Action::ShowFootnote { text, link } => {
            ui.footnote.active = true;
            ui.footnote.text.clone_from(text);
            ui.footnote.link.clone_from(link);
        }
        Action::HideFootnote => ui.footnote = Default::default(),
        Action::MoveQuickbarModal { x, y } => {
            ui.modals.quickbar.visible = true;
            ui.modals.quickbar.x = *x;
            ui.modals.quickbar.y = *y;
        }
        Action::HideQuickbarModal => ui.modals.quickbar.visible = false,
        Action::MoveNoteModal { x, y } => {
            ui.modals.note.x = *x;
            ui.modals.note.y = *y;
        }
        Action::ShowNoteModal => ui.modals.note.visible = true,
        Action::HideNoteModal => ui.modals.note.visible = false,
        Action::SetModalLocator { locator } => ui.modals.selected_locator.clone_from(locator),
        // View-scoped actions are routed by `apply` before reaching here.
        _ => {}
    }
    Ok(())
}
