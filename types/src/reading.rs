//! Per-view reading state and the persisted session snapshot.

use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::DocumentHash;

/// Opaque position marker produced by the renderer (an EPUB CFI in practice).
///
/// The engine never parses locators; it only stores and compares them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Load lifecycle of a view slot.
///
/// ```text
///  EMPTY ──begin──► LOADING ──complete──► COMPLETE
///    ▲                 │                     │
///    │                 └──fail──► ERROR      │
///    └──────────── reset (from any) ─────────┘
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LoadState {
    #[default]
    Empty,
    Loading,
    Complete,
    Error,
}

impl LoadState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "EMPTY",
            Self::Loading => "LOADING",
            Self::Complete => "COMPLETE",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reading position within a document.
///
/// `progress` stays `None` until the renderer has computed it; a slot with
/// undefined progress is never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Position {
    pub locator: Option<Locator>,
    pub progress: Option<f64>,
}

impl Position {
    /// Builds a position, dropping empty locators and non-finite progress and
    /// clamping finite progress into `[0, 1]`.
    #[must_use]
    pub fn new(locator: Option<Locator>, progress: Option<f64>) -> Self {
        Self {
            locator: locator.filter(|l| !l.is_empty()),
            progress: progress.filter(|p| p.is_finite()).map(|p| p.clamp(0.0, 1.0)),
        }
    }
}

/// Deduplicated bookmarked locators, kept in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bookmarks(IndexSet<Locator>);

impl Bookmarks {
    /// Adds the locator if absent, removes it if present. Returns whether the
    /// locator is bookmarked afterwards.
    pub fn toggle(&mut self, locator: Locator) -> bool {
        if self.0.shift_remove(&locator) {
            false
        } else {
            self.0.insert(locator);
            true
        }
    }

    #[must_use]
    pub fn contains(&self, locator: &Locator) -> bool {
        self.0.contains(locator)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Locator> {
        self.0.iter()
    }
}

impl FromIterator<Locator> for Bookmarks {
    fn from_iter<I: IntoIterator<Item = Locator>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub range: Locator,
    pub color: String,
    #[serde(default)]
    pub note: String,
}

/// Highlights in insertion order, keyed by range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Highlights(Vec<Highlight>);

impl Highlights {
    /// Inserts a highlight, or updates color and note in place when the range
    /// is already highlighted.
    pub fn upsert(&mut self, highlight: Highlight) {
        match self.0.iter_mut().find(|h| h.range == highlight.range) {
            Some(existing) => {
                existing.color = highlight.color;
                existing.note = highlight.note;
            }
            None => self.0.push(highlight),
        }
    }

    /// Returns `false` when no highlight covers `range`.
    pub fn remove(&mut self, range: &Locator) -> bool {
        let before = self.0.len();
        self.0.retain(|h| &h.range != range);
        self.0.len() != before
    }

    pub fn set_note(&mut self, range: &Locator, note: String) -> bool {
        match self.0.iter_mut().find(|h| &h.range == range) {
            Some(existing) => {
                existing.note = note;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn get(&self, range: &Locator) -> Option<&Highlight> {
        self.0.iter().find(|h| &h.range == range)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Highlight] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Highlight> for Highlights {
    fn from_iter<I: IntoIterator<Item = Highlight>>(iter: I) -> Self {
        let mut highlights = Self::default();
        for highlight in iter {
            highlights.upsert(highlight);
        }
        highlights
    }
}

/// Per-document reader style overriding the global theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReaderStyle {
    pub theme_name: String,
    pub font: String,
    pub font_size: f64,
    pub font_weight: f64,
    pub word_spacing: f64,
    pub line_height: f64,
    pub render_mode: String,
    pub paragraph_spacing: f64,
    pub text_align: String,
}

impl Default for ReaderStyle {
    fn default() -> Self {
        Self {
            theme_name: crate::DEFAULT_LIGHT_THEME.to_string(),
            font: "Times New Roman".to_string(),
            font_size: 18.0,
            font_weight: 400.0,
            word_spacing: 0.0,
            line_height: 1.5,
            render_mode: "paginated".to_string(),
            paragraph_spacing: 0.0,
            text_align: "justify".to_string(),
        }
    }
}

/// Persisted form of a document session.
///
/// Field names are the on-disk contract and must round-trip exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub modified: i64,
    pub data: SessionData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub progress: f64,
    // Libraries written by older builds name this field `cfi`.
    #[serde(default, alias = "cfi")]
    pub locator: Locator,
    #[serde(default)]
    pub bookmarks: Bookmarks,
    #[serde(default)]
    pub highlights: Highlights,
    #[serde(default)]
    pub theme: ReaderStyle,
}

/// One reader view: the document open in it and the user's state within it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewSlot {
    pub hash: Option<DocumentHash>,
    pub title: String,
    pub author: String,
    pub load_state: LoadState,
    pub load_error: Option<String>,
    pub position: Position,
    pub bookmarks: Bookmarks,
    pub highlights: Highlights,
    pub style: ReaderStyle,
}
