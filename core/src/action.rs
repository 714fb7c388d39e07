//! Named state changes.
//!
//! Every mutation of [`AppState`](crate::AppState) is one of these values. Each
//! action has a stable [`ActionKind`] whose name (`"view/ToggleBookmark"`,
//! `"settings/SelectTheme"`, ...) is what the durability allow-list and the
//! logs refer to.

use std::fmt;

use folio_types::{
    DocumentHash, Highlight, Locator, QaCredentials, SessionSnapshot, SettingsSnapshot,
    SortDirection, ViewIndex,
};

use crate::fields::{FieldValue, ReaderStyleField, ThemeProperty};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // ------------------------------------------------------------------
    // View-scoped
    // ------------------------------------------------------------------
    BeginLoad {
        view: ViewIndex,
        hash: DocumentHash,
    },
    HydrateSession {
        view: ViewIndex,
        snapshot: SessionSnapshot,
    },
    CompleteLoad {
        view: ViewIndex,
    },
    FailLoad {
        view: ViewIndex,
        reason: String,
    },
    ResetView {
        view: ViewIndex,
    },
    SetMetadata {
        view: ViewIndex,
        title: String,
        author: String,
    },
    SetPosition {
        view: ViewIndex,
        locator: Option<Locator>,
        progress: Option<f64>,
    },
    ToggleBookmark {
        view: ViewIndex,
        locator: Locator,
    },
    AddHighlight {
        view: ViewIndex,
        highlight: Highlight,
    },
    RemoveHighlight {
        view: ViewIndex,
        range: Locator,
    },
    SetHighlightNote {
        view: ViewIndex,
        range: Locator,
        note: String,
    },
    SetReaderStyle {
        view: ViewIndex,
        field: ReaderStyleField,
        value: FieldValue,
    },

    // ------------------------------------------------------------------
    // Settings-scoped
    // ------------------------------------------------------------------
    SelectTheme {
        name: String,
    },
    /// Adds a copy of the default light theme under a fresh `"New Theme N"` name.
    AddTheme,
    RenameTheme {
        from: String,
        to: String,
    },
    DeleteTheme {
        name: String,
    },
    UpdateTheme {
        name: String,
        property: ThemeProperty,
        value: String,
    },
    SetSortSettings {
        sort_by: String,
        direction: SortDirection,
    },
    SetReaderMargins {
        margins: u32,
    },
    SetQaCapability {
        credentials: QaCredentials,
    },
    ClearQaCapability,
    /// Replaces preferences and themes with stored values. Hydration only.
    LoadSettings {
        snapshot: SettingsSnapshot,
    },

    // ------------------------------------------------------------------
    // Transient UI
    // ------------------------------------------------------------------
    SetMaximized(bool),
    ToggleMenu,
    ToggleThemeMenu,
    ToggleProgressMenu,
    SelectSidebarMenu {
        menu: Option<String>,
    },
    SelectView {
        view: ViewIndex,
    },
    SetDualReaderMode(bool),
    SetDualReaderReversed(bool),
    SetDictionaryWord {
        word: String,
    },
    BindExcerpt {
        text: String,
    },
    ClearExcerpt,
    ShowFootnote {
        text: String,
        link: String,
    },
    HideFootnote,
    MoveQuickbarModal {
        x: f64,
        y: f64,
    },
    HideQuickbarModal,
    MoveNoteModal {
        x: f64,
        y: f64,
    },
    ShowNoteModal,
    HideNoteModal,
    SetModalLocator {
        locator: Option<Locator>,
    },
}

/// Which part of the state an action belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    View,
    Settings,
    Ui,
}

/// Payload-free discriminant of an [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    BeginLoad,
    HydrateSession,
    CompleteLoad,
    FailLoad,
    ResetView,
    SetMetadata,
    SetPosition,
    ToggleBookmark,
    AddHighlight,
    RemoveHighlight,
    SetHighlightNote,
    SetReaderStyle,
    SelectTheme,
    AddTheme,
    RenameTheme,
    DeleteTheme,
    UpdateTheme,
    SetSortSettings,
    SetReaderMargins,
    SetQaCapability,
    ClearQaCapability,
    LoadSettings,
    SetMaximized,
    ToggleMenu,
    ToggleThemeMenu,
    ToggleProgressMenu,
    SelectSidebarMenu,
    SelectView,
    SetDualReaderMode,
    SetDualReaderReversed,
    SetDictionaryWord,
    BindExcerpt,
    ClearExcerpt,
    ShowFootnote,
    HideFootnote,
    MoveQuickbarModal,
    HideQuickbarModal,
    MoveNoteModal,
    ShowNoteModal,
    HideNoteModal,
    SetModalLocator,
}

impl ActionKind {
    /// Kinds whose effect on state must reach storage.
    ///
    /// Load bookkeeping and hydration are excluded: they either carry nothing
    /// new or would echo stored data straight back to storage.
    pub const DURABLE: &'static [Self] = &[
        Self::CompleteLoad,
        Self::SetMetadata,
        Self::SetPosition,
        Self::ToggleBookmark,
        Self::AddHighlight,
        Self::RemoveHighlight,
        Self::SetHighlightNote,
        Self::SetReaderStyle,
        Self::SelectTheme,
        Self::AddTheme,
        Self::RenameTheme,
        Self::DeleteTheme,
        Self::UpdateTheme,
        Self::SetSortSettings,
        Self::SetReaderMargins,
        Self::SetQaCapability,
        Self::ClearQaCapability,
    ];

    #[must_use]
    pub fn is_durable(self) -> bool {
        Self::DURABLE.contains(&self)
    }

    #[must_use]
    pub const fn scope(self) -> Scope {
        match self {
            Self::BeginLoad
            | Self::HydrateSession
            | Self::CompleteLoad
            | Self::FailLoad
            | Self::ResetView
            | Self::SetMetadata
            | Self::SetPosition
            | Self::ToggleBookmark
            | Self::AddHighlight
            | Self::RemoveHighlight
            | Self::SetHighlightNote
            | Self::SetReaderStyle => Scope::View,
            Self::SelectTheme
            | Self::AddTheme
            | Self::RenameTheme
            | Self::DeleteTheme
            | Self::UpdateTheme
            | Self::SetSortSettings
            | Self::SetReaderMargins
            | Self::SetQaCapability
            | Self::ClearQaCapability
            | Self::LoadSettings => Scope::Settings,
            _ => Scope::Ui,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeginLoad => "view/BeginLoad",
            Self::HydrateSession => "view/HydrateSession",
            Self::CompleteLoad => "view/CompleteLoad",
            Self::FailLoad => "view/FailLoad",
            Self::ResetView => "view/ResetView",
            Self::SetMetadata => "view/SetMetadata",
            Self::SetPosition => "view/SetPosition",
            Self::ToggleBookmark => "view/ToggleBookmark",
            Self::AddHighlight => "view/AddHighlight",
            Self::RemoveHighlight => "view/RemoveHighlight",
            Self::SetHighlightNote => "view/SetHighlightNote",
            Self::SetReaderStyle => "view/SetReaderStyle",
            Self::SelectTheme => "settings/SelectTheme",
            Self::AddTheme => "settings/AddTheme",
            Self::RenameTheme => "settings/RenameTheme",
            Self::DeleteTheme => "settings/DeleteTheme",
            Self::UpdateTheme => "settings/UpdateTheme",
            Self::SetSortSettings => "settings/SetSortSettings",
            Self::SetReaderMargins => "settings/SetReaderMargins",
            Self::SetQaCapability => "settings/SetQaCapability",
            Self::ClearQaCapability => "settings/ClearQaCapability",
            Self::LoadSettings => "settings/LoadSettings",
            Self::SetMaximized => "ui/SetMaximized",
            Self::ToggleMenu => "ui/ToggleMenu",
            Self::ToggleThemeMenu => "ui/ToggleThemeMenu",
            Self::ToggleProgressMenu => "ui/ToggleProgressMenu",
            Self::SelectSidebarMenu => "ui/SelectSidebarMenu",
            Self::SelectView => "ui/SelectView",
            Self::SetDualReaderMode => "ui/SetDualReaderMode",
            Self::SetDualReaderReversed => "ui/SetDualReaderReversed",
            Self::SetDictionaryWord => "ui/SetDictionaryWord",
            Self::BindExcerpt => "ui/BindExcerpt",
            Self::ClearExcerpt => "ui/ClearExcerpt",
            Self::ShowFootnote => "ui/ShowFootnote",
            Self::HideFootnote => "ui/HideFootnote",
            Self::MoveQuickbarModal => "ui/MoveQuickbarModal",
            Self::HideQuickbarModal => "ui/HideQuickbarModal",
            Self::MoveNoteModal => "ui/MoveNoteModal",
            Self::ShowNoteModal => "ui/ShowNoteModal",
            Self::HideNoteModal => "ui/HideNoteModal",
            Self::SetModalLocator => "ui/SetModalLocator",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Action {
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::BeginLoad { .. } => ActionKind::BeginLoad,
            Self::HydrateSession { .. } => ActionKind::HydrateSession,
            Self::CompleteLoad { .. } => ActionKind::CompleteLoad,
            Self::FailLoad { .. } => ActionKind::FailLoad,
            Self::ResetView { .. } => ActionKind::ResetView,
            Self::SetMetadata { .. } => ActionKind::SetMetadata,
            Self::SetPosition { .. } => ActionKind::SetPosition,
            Self::ToggleBookmark { .. } => ActionKind::ToggleBookmark,
            Self::AddHighlight { .. } => ActionKind::AddHighlight,
            Self::RemoveHighlight { .. } => ActionKind::RemoveHighlight,
            Self::SetHighlightNote { .. } => ActionKind::SetHighlightNote,
            Self::SetReaderStyle { .. } => ActionKind::SetReaderStyle,
            Self::SelectTheme { .. } => ActionKind::SelectTheme,
            Self::AddTheme => ActionKind::AddTheme,
            Self::RenameTheme { .. } => ActionKind::RenameTheme,
            Self::DeleteTheme { .. } => ActionKind::DeleteTheme,
            Self::UpdateTheme { .. } => ActionKind::UpdateTheme,
            Self::SetSortSettings { .. } => ActionKind::SetSortSettings,
            Self::SetReaderMargins { .. } => ActionKind::SetReaderMargins,
            Self::SetQaCapability { .. } => ActionKind::SetQaCapability,
            Self::ClearQaCapability => ActionKind::ClearQaCapability,
            Self::LoadSettings { .. } => ActionKind::LoadSettings,
            Self::SetMaximized(_) => ActionKind::SetMaximized,
            Self::ToggleMenu => ActionKind::ToggleMenu,
            Self::ToggleThemeMenu => ActionKind::ToggleThemeMenu,
            Self::ToggleProgressMenu => ActionKind::ToggleProgressMenu,
            Self::SelectSidebarMenu { .. } => ActionKind::SelectSidebarMenu,
            Self::SelectView { .. } => ActionKind::SelectView,
            Self::SetDualReaderMode(_) => ActionKind::SetDualReaderMode,
            Self::SetDualReaderReversed(_) => ActionKind::SetDualReaderReversed,
            Self::SetDictionaryWord { .. } => ActionKind::SetDictionaryWord,
            Self::BindExcerpt { .. } => ActionKind::BindExcerpt,
            Self::ClearExcerpt => ActionKind::ClearExcerpt,
            Self::ShowFootnote { .. } => ActionKind::ShowFootnote,
            Self::HideFootnote => ActionKind::HideFootnote,
            Self::MoveQuickbarModal { .. } => ActionKind::MoveQuickbarModal,
            Self::HideQuickbarModal => ActionKind::HideQuickbarModal,
            Self::MoveNoteModal { .. } => ActionKind::MoveNoteModal,
            Self::ShowNoteModal => ActionKind::ShowNoteModal,
            Self::HideNoteModal => ActionKind::HideNoteModal,
            Self::SetModalLocator { .. } => ActionKind::SetModalLocator,
        }
    }

    /// The view slot a view-scoped action targets.
    #[must_use]
    pub const fn view(&self) -> Option<ViewIndex> {
        match self {
            Self::BeginLoad { view, .. }
            | Self::HydrateSession { view, .. }
            | Self::CompleteLoad { view }
            | Self::FailLoad { view, .. }
            | Self::ResetView { view }
            | Self::SetMetadata { view, .. }
            | Self::SetPosition { view, .. }
            | Self::ToggleBookmark { view, .. }
            | Self::AddHighlight { view, .. }
            | Self::RemoveHighlight { view, .. }
            | Self::SetHighlightNote { view, .. }
            | Self::SetReaderStyle { view, .. } => Some(*view),
            _ => None,
        }
    }
}
