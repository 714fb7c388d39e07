//! Load-state transition graph authority.
//!
//! This module is the single encoding point for named [`LoadState`] edges and
//! legality checks. The reducer asks here before moving a view slot; sync
//! planning reads the resulting state and never re-derives the graph.

use std::fmt;

use folio_types::LoadState;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadEdge {
    /// `EMPTY -> LOADING`: a document was chosen for the slot.
    Begin,
    /// `LOADING -> COMPLETE`: stored data (if any) has been applied.
    Complete,
    /// `LOADING -> ERROR`
    Fail,
    /// Any state back to `EMPTY`.
    Reset,
}

impl LoadEdge {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Begin => "begin",
            Self::Complete => "complete",
            Self::Fail => "fail",
            Self::Reset => "reset",
        }
    }
}

impl fmt::Display for LoadEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal load transition: {edge} from {from}")]
pub struct IllegalTransition {
    pub from: LoadState,
    pub edge: LoadEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionReceipt {
    from: LoadState,
    edge: LoadEdge,
    to: LoadState,
}

impl TransitionReceipt {
    #[must_use]
    pub const fn from(self) -> LoadState {
        self.from
    }

    #[must_use]
    pub const fn edge(self) -> LoadEdge {
        self.edge
    }

    #[must_use]
    pub const fn to(self) -> LoadState {
        self.to
    }
}

fn is_legal_transition(from: LoadState, edge: LoadEdge, to: LoadState) -> bool {
    use LoadState::{Complete, Empty, Error, Loading};

    match edge {
        LoadEdge::Begin => from == Empty && to == Loading,
        LoadEdge::Complete => from == Loading && to == Complete,
        LoadEdge::Fail => from == Loading && to == Error,
        LoadEdge::Reset => to == Empty,
    }
}

/// Follows `edge` out of `from`.
pub fn transition(from: LoadState, edge: LoadEdge) -> Result<TransitionReceipt, IllegalTransition> {
    let to = match edge {
        LoadEdge::Begin => LoadState::Loading,
        LoadEdge::Complete => LoadState::Complete,
        LoadEdge::Fail => LoadState::Error,
        LoadEdge::Reset => LoadState::Empty,
    };
    if is_legal_transition(from, edge, to) {
        Ok(TransitionReceipt { from, edge, to })
    } else {
        Err(IllegalTransition { from, edge })
    }
}
