//! Caption style resolution
//!
//! User style data is merged leniently: unknown keys are ignored, numbers are
//! clamped into safe ranges, bad colors keep their defaults and font keys are
//! resolved through a fixed allow-list. Every correction is reported as a
//! [`StyleWarning`] instead of an error.

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Sparse user override mapping, keyed like the default style
pub type StyleOverrides = BTreeMap<String, Value>;

/// Fonts that style data may reference, by key
pub const ALLOWED_FONTS: [(&str, &str); 4] = [
    ("poppins_bold", "fonts/Poppins-Bold.ttf"),
    ("poppins_semibold", "fonts/Poppins-SemiBold.ttf"),
    ("montserrat_bold", "fonts/Montserrat-Bold.ttf"),
    ("inter_bold", "fonts/Inter-Bold.ttf"),
];

pub const DEFAULT_FONT_KEY: &str = "poppins_bold";

/// RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const WHITE: Self = Self([255, 255, 255, 255]);
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const YELLOW: Self = Self([255, 255, 0, 255]);

    #[must_use]
    pub fn alpha(&self) -> u8 {
        self.0[3]
    }

    /// Parse `[r,g,b]`, `[r,g,b,a]`, `#rrggbb`, `#rrggbbaa` or a color name.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) if items.len() == 3 || items.len() == 4 => {
                let mut rgba = [255u8; 4];
                for (slot, item) in rgba.iter_mut().zip(items) {
                    *slot = u8::try_from(item.as_u64()?).ok()?;
                }
                Some(Self(rgba))
            }
            Value::String(s) => Self::parse(s),
            _ => None,
        }
    }

    /// Parse a hex code or a color name
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
                return None;
            }
            let mut rgba = [255u8; 4];
            for (i, slot) in rgba.iter_mut().take(hex.len() / 2).enumerate() {
                *slot = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
            }
            return Some(Self(rgba));
        }

        match s.to_ascii_lowercase().as_str() {
            "black" => Some(Self::BLACK),
            "white" => Some(Self::WHITE),
            "yellow" => Some(Self::YELLOW),
            "red" => Some(Self([255, 0, 0, 255])),
            "green" => Some(Self([0, 128, 0, 255])),
            "lime" => Some(Self([0, 255, 0, 255])),
            "blue" => Some(Self([0, 0, 255, 255])),
            "cyan" => Some(Self([0, 255, 255, 255])),
            "magenta" => Some(Self([255, 0, 255, 255])),
            "orange" => Some(Self([255, 165, 0, 255])),
            "transparent" => Some(Self([0, 0, 0, 0])),
            _ => None,
        }
    }
}

impl Serialize for Rgba {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// A font from the allow-list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FontResource {
    pub key: &'static str,
    pub path: &'static str,
}

impl FontResource {
    /// Look up an allow-listed font key
    #[must_use]
    pub fn lookup(key: &str) -> Option<Self> {
        ALLOWED_FONTS
            .iter()
            .find(|(k, _)| *k == key)
            .map(|&(key, path)| Self { key, path })
    }

    /// Location of the font file under `root`
    #[must_use]
    pub fn resolve_path(&self, root: &Path) -> PathBuf {
        root.join(self.path)
    }
}

impl Default for FontResource {
    fn default() -> Self {
        Self {
            key: ALLOWED_FONTS[0].0,
            path: ALLOWED_FONTS[0].1,
        }
    }
}

/// Diagnostic produced while resolving a style
#[derive(Debug, Clone, PartialEq)]
pub enum StyleWarning {
    /// Key is not part of the style and was ignored
    UnknownKey(String),
    /// Value had the wrong shape; the default was kept
    InvalidValue { key: String, value: String },
    /// Number was outside its range
    Clamped { key: String, requested: f64, applied: u32 },
    /// Font key is not allow-listed; the default font was used
    UnknownFont(String),
}

impl fmt::Display for StyleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKey(key) => write!(f, "ignoring unknown style key '{key}'"),
            Self::InvalidValue { key, value } => {
                write!(f, "invalid value {value} for '{key}', keeping default")
            }
            Self::Clamped {
                key,
                requested,
                applied,
            } => write!(f, "'{key}' = {requested} out of range, using {applied}"),
            Self::UnknownFont(key) => {
                write!(f, "font '{key}' is not allowed, using '{DEFAULT_FONT_KEY}'")
            }
        }
    }
}

/// A corrected value plus what was corrected
#[derive(Debug, Clone)]
pub struct Sanitized<T> {
    pub value: T,
    pub warnings: Vec<StyleWarning>,
}

/// Numeric style field with its default and inclusive range
struct NumericField {
    key: &'static str,
    default: u32,
    min: u32,
    max: u32,
}

const FONT_SIZE: NumericField = NumericField {
    key: "font_size",
    default: 50,
    min: 28,
    max: 80,
};
const STROKE_WIDTH: NumericField = NumericField {
    key: "stroke_width",
    default: 6,
    min: 0,
    max: 12,
};
const WORD_SPACING: NumericField = NumericField {
    key: "word_spacing",
    default: 18,
    min: 6,
    max: 40,
};
const HORIZONTAL_PADDING: NumericField = NumericField {
    key: "horizontal_padding",
    default: 32,
    min: 0,
    max: 80,
};
const VERTICAL_PADDING: NumericField = NumericField {
    key: "vertical_padding",
    default: 14,
    min: 0,
    max: 60,
};

const COLOR_KEYS: [&str; 3] = ["text_color", "highlight_color", "stroke_color"];

/// Final, clamped caption style shared by every layout call of a render session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedStyle {
    font: FontResource,
    font_size: u32,
    text_color: Rgba,
    highlight_color: Rgba,
    stroke_color: Rgba,
    stroke_width: u32,
    word_spacing: u32,
    horizontal_padding: u32,
    vertical_padding: u32,
}

impl Default for ResolvedStyle {
    fn default() -> Self {
        Self {
            font: FontResource::default(),
            font_size: FONT_SIZE.default,
            text_color: Rgba::WHITE,
            highlight_color: Rgba::YELLOW,
            stroke_color: Rgba::BLACK,
            stroke_width: STROKE_WIDTH.default,
            word_spacing: WORD_SPACING.default,
            horizontal_padding: HORIZONTAL_PADDING.default,
            vertical_padding: VERTICAL_PADDING.default,
        }
    }
}

impl ResolvedStyle {
    #[must_use]
    pub fn font(&self) -> FontResource {
        self.font
    }

    #[must_use]
    pub fn font_size(&self) -> u32 {
        self.font_size
    }

    #[must_use]
    pub fn text_color(&self) -> Rgba {
        self.text_color
    }

    #[must_use]
    pub fn highlight_color(&self) -> Rgba {
        self.highlight_color
    }

    #[must_use]
    pub fn stroke_color(&self) -> Rgba {
        self.stroke_color
    }

    #[must_use]
    pub fn stroke_width(&self) -> u32 {
        self.stroke_width
    }

    #[must_use]
    pub fn word_spacing(&self) -> u32 {
        self.word_spacing
    }

    #[must_use]
    pub fn horizontal_padding(&self) -> u32 {
        self.horizontal_padding
    }

    #[must_use]
    pub fn vertical_padding(&self) -> u32 {
        self.vertical_padding
    }
}

/// Merge `overrides` into the default style and sanitize the result.
///
/// Never fails; corrections are returned as warnings and logged.
#[must_use]
pub fn resolve_style(overrides: &StyleOverrides) -> Sanitized<ResolvedStyle> {
    let mut style = ResolvedStyle::default();
    let mut warnings = Vec::new();

    for key in overrides.keys() {
        let known = key == "font_key"
            || COLOR_KEYS.contains(&key.as_str())
            || [&FONT_SIZE, &STROKE_WIDTH, &WORD_SPACING, &HORIZONTAL_PADDING, &VERTICAL_PADDING]
                .iter()
                .any(|f| f.key == key);
        if !known {
            warnings.push(StyleWarning::UnknownKey(key.clone()));
        }
    }

    if let Some(value) = overrides.get("font_key") {
        match value.as_str().and_then(FontResource::lookup) {
            Some(font) => style.font = font,
            None => warnings.push(StyleWarning::UnknownFont(display_value(value))),
        }
    }

    style.font_size = sanitize_number(overrides, &FONT_SIZE, &mut warnings);
    style.stroke_width = sanitize_number(overrides, &STROKE_WIDTH, &mut warnings);
    style.word_spacing = sanitize_number(overrides, &WORD_SPACING, &mut warnings);
    style.horizontal_padding = sanitize_number(overrides, &HORIZONTAL_PADDING, &mut warnings);
    style.vertical_padding = sanitize_number(overrides, &VERTICAL_PADDING, &mut warnings);

    style.text_color = sanitize_color(overrides, "text_color", style.text_color, &mut warnings);
    style.highlight_color =
        sanitize_color(overrides, "highlight_color", style.highlight_color, &mut warnings);
    style.stroke_color =
        sanitize_color(overrides, "stroke_color", style.stroke_color, &mut warnings);

    for warning in &warnings {
        warn!("Caption style: {warning}");
    }

    Sanitized {
        value: style,
        warnings,
    }
}

fn sanitize_number(
    overrides: &StyleOverrides,
    field: &NumericField,
    warnings: &mut Vec<StyleWarning>,
) -> u32 {
    let Some(value) = overrides.get(field.key) else {
        return field.default;
    };

    let Some(requested) = value.as_f64().filter(|v| v.is_finite()) else {
        warnings.push(StyleWarning::InvalidValue {
            key: field.key.to_string(),
            value: display_value(value),
        });
        return field.default;
    };

    let applied = requested
        .round()
        .clamp(f64::from(field.min), f64::from(field.max)) as u32;

    if requested < f64::from(field.min) || requested > f64::from(field.max) {
        warnings.push(StyleWarning::Clamped {
            key: field.key.to_string(),
            requested,
            applied,
        });
    }

    applied
}

fn sanitize_color(
    overrides: &StyleOverrides,
    key: &str,
    default: Rgba,
    warnings: &mut Vec<StyleWarning>,
) -> Rgba {
    let Some(value) = overrides.get(key) else {
        return default;
    };

    Rgba::from_value(value).unwrap_or_else(|| {
        warnings.push(StyleWarning::InvalidValue {
            key: key.to_string(),
            value: display_value(value),
        });
        default
    })
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn overrides(value: Value) -> StyleOverrides {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_defaults() {
        let resolved = resolve_style(&StyleOverrides::new());
        assert!(resolved.warnings.is_empty());
        assert_eq!(resolved.value, ResolvedStyle::default());
        assert_eq!(resolved.value.font().key, "poppins_bold");
        assert_eq!(resolved.value.font_size(), 50);
        assert_eq!(resolved.value.highlight_color(), Rgba::YELLOW);
    }

    #[test]
    fn test_font_size_clamped() {
        let resolved = resolve_style(&overrides(json!({ "font_size": 200 })));
        assert_eq!(resolved.value.font_size(), 80);
        assert_eq!(
            resolved.warnings,
            vec![StyleWarning::Clamped {
                key: "font_size".to_string(),
                requested: 200.0,
                applied: 80
            }]
        );

        let resolved = resolve_style(&overrides(json!({ "font_size": 3 })));
        assert_eq!(resolved.value.font_size(), 28);
    }

    #[test]
    fn test_all_ranges_clamped() {
        let resolved = resolve_style(&overrides(json!({
            "stroke_width": -4,
            "word_spacing": 99,
            "horizontal_padding": 500,
            "vertical_padding": -1.5,
        })));
        let style = resolved.value;
        assert_eq!(style.stroke_width(), 0);
        assert_eq!(style.word_spacing(), 40);
        assert_eq!(style.horizontal_padding(), 80);
        assert_eq!(style.vertical_padding(), 0);
        assert_eq!(resolved.warnings.len(), 4);
    }

    #[test]
    fn test_in_range_values_applied() {
        let resolved = resolve_style(&overrides(json!({
            "font_size": 46,
            "stroke_width": 8,
            "word_spacing": 22,
            "font_key": "montserrat_bold",
            "highlight_color": [0, 255, 180, 255],
            "stroke_color": "black",
        })));
        assert!(resolved.warnings.is_empty());
        let style = resolved.value;
        assert_eq!(style.font_size(), 46);
        assert_eq!(style.stroke_width(), 8);
        assert_eq!(style.word_spacing(), 22);
        assert_eq!(style.font().path, "fonts/Montserrat-Bold.ttf");
        assert_eq!(style.highlight_color(), Rgba([0, 255, 180, 255]));
    }

    #[test]
    fn test_unknown_font_falls_back() {
        let resolved = resolve_style(&overrides(json!({ "font_key": "nope" })));
        assert_eq!(resolved.value.font(), FontResource::default());
        assert_eq!(
            resolved.warnings,
            vec![StyleWarning::UnknownFont("nope".to_string())]
        );
    }

    #[test]
    fn test_font_path_cannot_be_injected() {
        let resolved = resolve_style(&overrides(json!({
            "font_key": "../../etc/passwd",
            "font_path": "/etc/passwd",
        })));
        assert_eq!(resolved.value.font().path, "fonts/Poppins-Bold.ttf");
        assert!(resolved
            .warnings
            .contains(&StyleWarning::UnknownKey("font_path".to_string())));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let resolved = resolve_style(&overrides(json!({ "glow": true, "font_size": 60 })));
        assert_eq!(resolved.value.font_size(), 60);
        assert_eq!(
            resolved.warnings,
            vec![StyleWarning::UnknownKey("glow".to_string())]
        );
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let resolved = resolve_style(&overrides(json!({
            "font_size": "huge",
            "text_color": "not-a-color",
            "stroke_color": [300, 0, 0],
        })));
        assert_eq!(resolved.value.font_size(), 50);
        assert_eq!(resolved.value.text_color(), Rgba::WHITE);
        assert_eq!(resolved.value.stroke_color(), Rgba::BLACK);
        assert_eq!(resolved.warnings.len(), 3);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let input = overrides(json!({ "font_size": 200, "font_key": "nope", "word_spacing": 2 }));
        let first = resolve_style(&input);
        let second = resolve_style(&input);
        assert_eq!(first.value, second.value);
        assert_eq!(first.warnings, second.warnings);
    }

    #[test]
    fn test_color_parsing() {
        assert_eq!(Rgba::parse("#FF8000"), Some(Rgba([255, 128, 0, 255])));
        assert_eq!(Rgba::parse("#00ff0080"), Some(Rgba([0, 255, 0, 128])));
        assert_eq!(Rgba::parse("Yellow"), Some(Rgba::YELLOW));
        assert_eq!(Rgba::parse("#12345"), None);
        assert_eq!(Rgba::parse("#zzzzzz"), None);
        assert_eq!(
            Rgba::from_value(&json!([10, 20, 30])),
            Some(Rgba([10, 20, 30, 255]))
        );
        assert_eq!(Rgba::from_value(&json!([10, 20])), None);
        assert_eq!(Rgba::from_value(&json!(5)), None);
    }

    #[test]
    fn test_style_serializes_colors_as_arrays() {
        let json = serde_json::to_value(ResolvedStyle::default()).unwrap();
        assert_eq!(json["highlight_color"], json!([255, 255, 0, 255]));
        assert_eq!(json["font"]["key"], json!("poppins_bold"));
    }
}
