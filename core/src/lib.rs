//! Core state logic for Folio.
//!
//! Everything in this crate is synchronous and side-effect free:
//!
//! - [`action`] - the named state changes and their durability allow-list
//! - [`load`] - the per-view load-state transition graph
//! - [`reducer`] - the single path that writes [`AppState`]
//! - [`sync`] - durability routing and session snapshot projection
//! - [`step`] - reduction plus the effects the engine must run
//! - [`fields`] - typed property access for themes and reader styles

pub mod action;
pub mod fields;
pub mod load;
pub mod reducer;
mod state;
pub mod step;
pub mod sync;

pub use action::{Action, ActionKind, Scope};
pub use fields::{FieldValue, ReaderStyleField, ThemeProperty};
pub use load::{IllegalTransition, LoadEdge, TransitionReceipt};
pub use reducer::{Rejection, apply, reduce};
pub use state::AppState;
pub use step::{Diagnostic, Effect, Step, step};
pub use sync::{DeferReason, Durability, SyncError, durability, session_snapshot};
