//! Domain types for Folio.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application: the reducer in
//! `folio-core`, the gateways in `folio-providers`, and the orchestration in
//! `folio-engine`.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod ids;
mod qa;
mod reading;
mod settings;
mod theme;

pub use ids::{CapabilityId, CapabilityKey, DocumentHash, FileRef, MAX_VIEWS, ThreadId, ViewIndex};
pub use qa::{ChatMessage, ChatSender, QaCredentials, QaStatus, ThreadHandle};
pub use reading::{
    Bookmarks, Highlight, Highlights, LoadState, Locator, Position, ReaderStyle, SessionData,
    SessionSnapshot, ViewSlot,
};
pub use settings::{
    AppSettings, Footnote, ModalAnchor, Modals, Preferences, SettingsSnapshot, SortDirection,
    TransientUi,
};
pub use theme::{
    BodyStyle, DEFAULT_DARK_THEME, DEFAULT_LIGHT_THEME, ImageStyle, ReaderPalette, Theme,
    ThemeRegistry, UiPalette,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// NonEmpty String Types
// ============================================================================

/// A string guaranteed to be non-empty (after trimming).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("value must not be empty")]
pub struct EmptyStringError;

impl NonEmptyString {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyStringError> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(EmptyStringError)
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl std::ops::Deref for NonEmptyString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl AsRef<str> for NonEmptyString {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for NonEmptyString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Typed field access errors
// ============================================================================

/// A typed setter received a value of the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field `{field}` expects {expected}")]
pub struct FieldTypeMismatch {
    pub field: &'static str,
    pub expected: &'static str,
}
