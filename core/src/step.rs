//! One reduction step: next state plus the side effects it calls for.
//!
//! The engine runs effects; nothing here touches IO. A step never both rejects
//! an action and emits effects for it.

use folio_types::{
    DocumentHash, LoadState, NonEmptyString, QaCredentials, SessionSnapshot, SettingsSnapshot,
    ViewIndex,
};

use crate::action::{Action, ActionKind};
use crate::load::LoadEdge;
use crate::reducer::{Rejection, apply};
use crate::state::AppState;
use crate::sync::{DeferReason, Durability, SyncError, durability, session_snapshot};

/// Side effect requested by a step.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Write this slot's snapshot now.
    SaveSession {
        view: ViewIndex,
        hash: DocumentHash,
        snapshot: SessionSnapshot,
    },
    /// (Re)start the settings debounce with the latest snapshot.
    ScheduleSettingsSave(SettingsSnapshot),
    /// The excerpt bound to question answering changed. `None` means cleared.
    ExcerptChanged(Option<NonEmptyString>),
    /// The stored assistant credentials changed. `None` means disabled.
    CapabilityChanged(Option<QaCredentials>),
}

/// Something worth logging about a step that did not produce a write.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// The action is outside the durable allow-list.
    NotDurable { kind: ActionKind },
    /// A durable view change arrived before the slot was safe to persist.
    Deferred {
        kind: ActionKind,
        view: ViewIndex,
        reason: DeferReason,
    },
    Malformed(SyncError),
    IllegalLoadTransition {
        view: ViewIndex,
        from: LoadState,
        edge: LoadEdge,
    },
    Rejected {
        kind: ActionKind,
        reason: Rejection,
    },
}

#[derive(Debug, Clone)]
pub struct Step {
    pub state: AppState,
    pub effects: Vec<Effect>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Step {
    #[must_use]
    pub fn changed(&self, before: &AppState) -> bool {
        self.state != *before
    }
}

/// Reduces `action` against `state` and plans the resulting side effects.
///
/// `modified_at` (milliseconds since the Unix epoch) stamps any session
/// snapshot produced by this step.
#[must_use]
pub fn step(state: &AppState, action: &Action, modified_at: i64) -> Step {
    let kind = action.kind();
    let mut diagnostics = Vec::new();
    let durability = durability(action);
    if durability == Durability::NotDurable {
        diagnostics.push(Diagnostic::NotDurable { kind });
    }

    let mut next = state.clone();
    if let Err(rejection) = apply(&mut next, action) {
        diagnostics.push(rejection_diagnostic(kind, rejection));
        return Step {
            state: state.clone(),
            effects: Vec::new(),
            diagnostics,
        };
    }

    let mut effects = Vec::new();
    if next != *state {
        match durability {
            Durability::NotDurable => {}
            Durability::View(view) => {
                if let Some(slot) = next.view(view) {
                    match session_snapshot(slot, modified_at) {
                        Ok((hash, snapshot)) => effects.push(Effect::SaveSession {
                            view,
                            hash,
                            snapshot,
                        }),
                        Err(reason) => {
                            diagnostics.push(Diagnostic::Deferred { kind, view, reason });
                        }
                    }
                }
            }
            Durability::Settings => {
                effects.push(Effect::ScheduleSettingsSave(next.settings.snapshot()));
            }
        }
    }

    let excerpt_before = bound_excerpt(state);
    let excerpt_after = bound_excerpt(&next);
    if excerpt_before != excerpt_after {
        effects.push(Effect::ExcerptChanged(excerpt_after));
    }

    let credentials_before = state.settings.preferences.qa_credentials();
    let credentials_after = next.settings.preferences.qa_credentials();
    if credentials_before != credentials_after {
        effects.push(Effect::CapabilityChanged(credentials_after));
    }

    Step {
        state: next,
        effects,
        diagnostics,
    }
}

fn bound_excerpt(state: &AppState) -> Option<NonEmptyString> {
    state
        .bound_excerpt()
        .and_then(|text| NonEmptyString::new(text).ok())
}

fn rejection_diagnostic(kind: ActionKind, rejection: Rejection) -> Diagnostic {
    match rejection {
        Rejection::UnknownView { view } => {
            Diagnostic::Malformed(SyncError::MalformedChange { kind, view })
        }
        Rejection::IllegalTransition { view, source } => Diagnostic::IllegalLoadTransition {
            view,
            from: source.from,
            edge: source.edge,
        },
        reason => Diagnostic::Rejected { kind, reason },
    }
}
