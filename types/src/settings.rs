//! Global application settings.
//!
//! [`AppSettings`] is the in-memory shape: durable preferences, the theme
//! registry, and transient UI state. Only [`SettingsSnapshot`] ever leaves the
//! process, and it has no field for transient state, so UI flags cannot leak
//! into storage.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    CapabilityId, CapabilityKey, DEFAULT_LIGHT_THEME, Locator, QaCredentials, ThemeRegistry,
    ViewIndex,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "ASC")]
    Ascending,
    #[serde(rename = "DESC")]
    Descending,
}

impl SortDirection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable scalar preferences. Serialized as `settings.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub selected_theme: String,
    pub sort_by: String,
    pub sort_direction: SortDirection,
    pub reader_margins: u32,
    #[serde(rename = "qaBotId")]
    pub qa_capability_id: CapabilityId,
    #[serde(rename = "qaBotApiKey")]
    pub qa_capability_key: CapabilityKey,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            selected_theme: DEFAULT_LIGHT_THEME.to_string(),
            sort_by: "title".to_string(),
            sort_direction: SortDirection::Ascending,
            reader_margins: 75,
            qa_capability_id: CapabilityId::default(),
            qa_capability_key: CapabilityKey::default(),
        }
    }
}

impl Preferences {
    /// Question answering is enabled iff an assistant id is stored.
    #[must_use]
    pub fn qa_enabled(&self) -> bool {
        !self.qa_capability_id.is_empty()
    }

    #[must_use]
    pub fn qa_credentials(&self) -> Option<QaCredentials> {
        self.qa_enabled().then(|| QaCredentials {
            capability_id: self.qa_capability_id.clone(),
            capability_key: self.qa_capability_key.clone(),
        })
    }
}

/// Durable projection of [`AppSettings`] handed to storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsSnapshot {
    pub preferences: Preferences,
    pub themes: ThemeRegistry,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Footnote {
    pub active: bool,
    pub text: String,
    pub link: String,
}

/// Visibility and screen position of a floating modal.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModalAnchor {
    pub visible: bool,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Modals {
    pub selected_locator: Option<Locator>,
    pub quickbar: ModalAnchor,
    pub note: ModalAnchor,
}

/// UI state that lives only as long as the process.
#[derive(Debug, Clone, PartialEq)]
pub struct TransientUi {
    pub maximized: bool,
    pub selected_view: ViewIndex,
    pub dual_reader_mode: bool,
    pub dual_reader_reversed: bool,
    pub dictionary_word: String,
    /// Text excerpt bound to the question-answering session. Empty when unbound.
    pub qa_excerpt: String,
    pub sidebar_menu: Option<String>,
    pub menu_toggled: bool,
    pub theme_menu_active: bool,
    pub progress_menu_active: bool,
    pub footnote: Footnote,
    pub modals: Modals,
}

impl Default for TransientUi {
    fn default() -> Self {
        Self {
            maximized: false,
            selected_view: ViewIndex::PRIMARY,
            dual_reader_mode: false,
            dual_reader_reversed: false,
            dictionary_word: String::new(),
            qa_excerpt: String::new(),
            sidebar_menu: None,
            menu_toggled: true,
            theme_menu_active: false,
            progress_menu_active: false,
            footnote: Footnote::default(),
            modals: Modals::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppSettings {
    pub preferences: Preferences,
    pub themes: ThemeRegistry,
    pub ui: TransientUi,
}

impl AppSettings {
    #[must_use]
    pub fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            preferences: self.preferences.clone(),
            themes: self.themes.clone(),
        }
    }
}
