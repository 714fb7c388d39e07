//! Durability classification and session snapshot projection.
//!
//! Decides whether a change must reach storage and, for view-scoped changes,
//! whether the slot is in a state where writing is safe. Execution (immediate
//! writes, debouncing) belongs to the engine.

use std::fmt;

use folio_types::{
    DocumentHash, LoadState, SessionData, SessionSnapshot, ViewIndex, ViewSlot,
};
use thiserror::Error;

use crate::action::{Action, ActionKind, Scope};

/// Where a durable change is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    NotDurable,
    /// Saved immediately as a session snapshot of this slot.
    View(ViewIndex),
    /// Saved through the settings debounce.
    Settings,
}

#[must_use]
pub fn durability(action: &Action) -> Durability {
    let kind = action.kind();
    if !kind.is_durable() {
        return Durability::NotDurable;
    }
    match (kind.scope(), action.view()) {
        (Scope::View, Some(view)) => Durability::View(view),
        (Scope::Settings, _) => Durability::Settings,
        _ => Durability::NotDurable,
    }
}

/// Why a view-scoped durable change was not written.
///
/// These are expected while a document is still hydrating and are not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferReason {
    NotComplete(LoadState),
    NoProgress,
}

impl fmt::Display for DeferReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotComplete(state) => write!(f, "load state is {state}"),
            Self::NoProgress => f.write_str("progress is undefined"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("{kind} targets view {view}, which does not exist")]
    MalformedChange { kind: ActionKind, view: ViewIndex },
}

/// Projects a slot into the persisted snapshot shape.
///
/// Fails when the slot is not `COMPLETE` or its progress is undefined; a
/// snapshot from a half-loaded slot would overwrite real data with defaults.
pub fn session_snapshot(
    slot: &ViewSlot,
    modified: i64,
) -> Result<(DocumentHash, SessionSnapshot), DeferReason> {
    if slot.load_state != LoadState::Complete {
        return Err(DeferReason::NotComplete(slot.load_state));
    }
    let hash = slot
        .hash
        .clone()
        .ok_or(DeferReason::NotComplete(slot.load_state))?;
    let progress = slot.position.progress.ok_or(DeferReason::NoProgress)?;

    let snapshot = SessionSnapshot {
        title: slot.title.clone(),
        author: slot.author.clone(),
        modified,
        data: SessionData {
            progress,
            locator: slot.position.locator.clone().unwrap_or_default(),
            bookmarks: slot.bookmarks.clone(),
            highlights: slot.highlights.clone(),
            theme: slot.style.clone(),
        },
    };
    Ok((hash, snapshot))
}
