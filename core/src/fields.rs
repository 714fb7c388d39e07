//! Typed addressing into nested settings structures.
//!
//! Themes and reader styles are edited one property at a time from the
//! settings UI. Each editable property is a variant here with a typed getter
//! and setter, so an edit can never name a path that does not exist.

use std::fmt;

use folio_types::{FieldTypeMismatch, ReaderStyle, Theme};

/// Editable property of a [`Theme`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThemeProperty {
    UiPrimaryBackground,
    UiSecondaryBackground,
    UiTertiaryBackground,
    UiPrimaryText,
    UiSecondaryText,
    ReaderBodyBackground,
    ReaderBodyColor,
    ReaderBodyLink,
    ReaderImageMixBlendMode,
    ReaderImageInvert,
}

impl ThemeProperty {
    pub const ALL: [Self; 10] = [
        Self::UiPrimaryBackground,
        Self::UiSecondaryBackground,
        Self::UiTertiaryBackground,
        Self::UiPrimaryText,
        Self::UiSecondaryText,
        Self::ReaderBodyBackground,
        Self::ReaderBodyColor,
        Self::ReaderBodyLink,
        Self::ReaderImageMixBlendMode,
        Self::ReaderImageInvert,
    ];

    /// Dotted path as it appears in the stored theme JSON.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::UiPrimaryBackground => "ui.primaryBackground",
            Self::UiSecondaryBackground => "ui.secondaryBackground",
            Self::UiTertiaryBackground => "ui.tertiaryBackground",
            Self::UiPrimaryText => "ui.primaryText",
            Self::UiSecondaryText => "ui.secondaryText",
            Self::ReaderBodyBackground => "reader.body.background",
            Self::ReaderBodyColor => "reader.body.color",
            Self::ReaderBodyLink => "reader.body.link",
            Self::ReaderImageMixBlendMode => "reader.image.mixBlendMode",
            Self::ReaderImageInvert => "reader.image.invert",
        }
    }

    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.path() == path)
    }

    #[must_use]
    pub fn get(self, theme: &Theme) -> &str {
        match self {
            Self::UiPrimaryBackground => &theme.ui.primary_background,
            Self::UiSecondaryBackground => &theme.ui.secondary_background,
            Self::UiTertiaryBackground => &theme.ui.tertiary_background,
            Self::UiPrimaryText => &theme.ui.primary_text,
            Self::UiSecondaryText => &theme.ui.secondary_text,
            Self::ReaderBodyBackground => &theme.reader.body.background,
            Self::ReaderBodyColor => &theme.reader.body.color,
            Self::ReaderBodyLink => &theme.reader.body.link,
            Self::ReaderImageMixBlendMode => &theme.reader.image.mix_blend_mode,
            Self::ReaderImageInvert => &theme.reader.image.invert,
        }
    }

    pub fn set(self, theme: &mut Theme, value: String) {
        let slot = match self {
            Self::UiPrimaryBackground => &mut theme.ui.primary_background,
            Self::UiSecondaryBackground => &mut theme.ui.secondary_background,
            Self::UiTertiaryBackground => &mut theme.ui.tertiary_background,
            Self::UiPrimaryText => &mut theme.ui.primary_text,
            Self::UiSecondaryText => &mut theme.ui.secondary_text,
            Self::ReaderBodyBackground => &mut theme.reader.body.background,
            Self::ReaderBodyColor => &mut theme.reader.body.color,
            Self::ReaderBodyLink => &mut theme.reader.body.link,
            Self::ReaderImageMixBlendMode => &mut theme.reader.image.mix_blend_mode,
            Self::ReaderImageInvert => &mut theme.reader.image.invert,
        };
        *slot = value;
    }
}

impl fmt::Display for ThemeProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Value carried by a reader-style edit.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
}

impl FieldValue {
    fn into_text(self, field: &'static str) -> Result<String, FieldTypeMismatch> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Number(_) => Err(FieldTypeMismatch {
                field,
                expected: "text",
            }),
        }
    }

    fn into_number(self, field: &'static str) -> Result<f64, FieldTypeMismatch> {
        match self {
            Self::Number(n) if n.is_finite() => Ok(n),
            Self::Number(_) | Self::Text(_) => Err(FieldTypeMismatch {
                field,
                expected: "a finite number",
            }),
        }
    }
}

/// Editable property of a per-document [`ReaderStyle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderStyleField {
    ThemeName,
    Font,
    FontSize,
    FontWeight,
    WordSpacing,
    LineHeight,
    RenderMode,
    ParagraphSpacing,
    TextAlign,
}

impl ReaderStyleField {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ThemeName => "themeName",
            Self::Font => "font",
            Self::FontSize => "fontSize",
            Self::FontWeight => "fontWeight",
            Self::WordSpacing => "wordSpacing",
            Self::LineHeight => "lineHeight",
            Self::RenderMode => "renderMode",
            Self::ParagraphSpacing => "paragraphSpacing",
            Self::TextAlign => "textAlign",
        }
    }

    #[must_use]
    pub fn get(self, style: &ReaderStyle) -> FieldValue {
        match self {
            Self::ThemeName => FieldValue::Text(style.theme_name.clone()),
            Self::Font => FieldValue::Text(style.font.clone()),
            Self::RenderMode => FieldValue::Text(style.render_mode.clone()),
            Self::TextAlign => FieldValue::Text(style.text_align.clone()),
            Self::FontSize => FieldValue::Number(style.font_size),
            Self::FontWeight => FieldValue::Number(style.font_weight),
            Self::WordSpacing => FieldValue::Number(style.word_spacing),
            Self::LineHeight => FieldValue::Number(style.line_height),
            Self::ParagraphSpacing => FieldValue::Number(style.paragraph_spacing),
        }
    }

    pub fn set(self, style: &mut ReaderStyle, value: FieldValue) -> Result<(), FieldTypeMismatch> {
        let name = self.name();
        match self {
            Self::ThemeName => style.theme_name = value.into_text(name)?,
            Self::Font => style.font = value.into_text(name)?,
            Self::RenderMode => style.render_mode = value.into_text(name)?,
            Self::TextAlign => style.text_align = value.into_text(name)?,
            Self::FontSize => style.font_size = value.into_number(name)?,
            Self::FontWeight => style.font_weight = value.into_number(name)?,
            Self::WordSpacing => style.word_spacing = value.into_number(name)?,
            Self::LineHeight => style.line_height = value.into_number(name)?,
            Self::ParagraphSpacing => style.paragraph_spacing = value.into_number(name)?,
        }
        Ok(())
    }
}

impl fmt::Display for ReaderStyleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
