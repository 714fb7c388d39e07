//! Global UI themes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_LIGHT_THEME: &str = "Default Light";
pub const DEFAULT_DARK_THEME: &str = "Default Dark";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiPalette {
    pub primary_background: String,
    pub secondary_background: String,
    pub tertiary_background: String,
    pub primary_text: String,
    pub secondary_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyStyle {
    pub background: String,
    pub color: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStyle {
    pub mix_blend_mode: String,
    pub invert: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderPalette {
    pub body: BodyStyle,
    pub image: ImageStyle,
}

/// A named color scheme for the application chrome and the reader body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub ui: UiPalette,
    pub reader: ReaderPalette,
}

impl Theme {
    #[must_use]
    pub fn light() -> Self {
        Self {
            ui: UiPalette {
                primary_background: "#ffffff".into(),
                secondary_background: "#f3f3f3".into(),
                tertiary_background: "#e6e6e6".into(),
                primary_text: "#1a1a1a".into(),
                secondary_text: "#5c5c5c".into(),
            },
            reader: ReaderPalette {
                body: BodyStyle {
                    background: "#ffffff".into(),
                    color: "#1a1a1a".into(),
                    link: "#1a0dab".into(),
                },
                image: ImageStyle {
                    mix_blend_mode: "normal".into(),
                    invert: "0%".into(),
                },
            },
        }
    }

    #[must_use]
    pub fn dark() -> Self {
        Self {
            ui: UiPalette {
                primary_background: "#1e1e1e".into(),
                secondary_background: "#252526".into(),
                tertiary_background: "#333333".into(),
                primary_text: "#e6e6e6".into(),
                secondary_text: "#a0a0a0".into(),
            },
            reader: ReaderPalette {
                body: BodyStyle {
                    background: "#1e1e1e".into(),
                    color: "#e6e6e6".into(),
                    link: "#8ab4f8".into(),
                },
                image: ImageStyle {
                    mix_blend_mode: "screen".into(),
                    invert: "100%".into(),
                },
            },
        }
    }
}

/// Themes by name. The two built-in themes are always present and read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThemeRegistry(BTreeMap<String, Theme>);

impl Default for ThemeRegistry {
    fn default() -> Self {
        let mut themes = BTreeMap::new();
        themes.insert(DEFAULT_DARK_THEME.to_string(), Theme::dark());
        themes.insert(DEFAULT_LIGHT_THEME.to_string(), Theme::light());
        Self(themes)
    }
}

impl ThemeRegistry {
    #[must_use]
    pub fn is_builtin(name: &str) -> bool {
        name == DEFAULT_LIGHT_THEME || name == DEFAULT_DARK_THEME
    }

    /// Builds a registry from stored themes, restoring any missing built-in.
    #[must_use]
    pub fn with_builtins(themes: BTreeMap<String, Theme>) -> Self {
        let mut registry = Self(themes);
        registry
            .0
            .entry(DEFAULT_DARK_THEME.to_string())
            .or_insert_with(Theme::dark);
        registry
            .0
            .entry(DEFAULT_LIGHT_THEME.to_string())
            .or_insert_with(Theme::light);
        registry
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Theme> {
        self.0.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Theme> {
        self.0.get_mut(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert(&mut self, name: String, theme: Theme) {
        self.0.insert(name, theme);
    }

    pub fn remove(&mut self, name: &str) -> Option<Theme> {
        self.0.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First free name of the form `"{base} {n}"`, counting from 1.
    #[must_use]
    pub fn unique_name(&self, base: &str) -> String {
        (1..)
            .map(|n| format!("{base} {n}"))
            .find(|candidate| !self.0.contains_key(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, Theme> {
        self.0
    }
}
