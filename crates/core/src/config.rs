//! Editor configuration
//!
//! Tunables for object defaults, history depth and manipulation handles.
//! Configuration can be loaded from a JSON file, environment variables,
//! or created programmatically.

use crate::error::ConfigError;
use crate::geometry::{Color, Size};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const ENV_HISTORY_LIMIT: &str = "OVERLAY_HISTORY_LIMIT";
pub const ENV_FONT_SIZE: &str = "OVERLAY_FONT_SIZE";
pub const ENV_FONT_FAMILY: &str = "OVERLAY_FONT_FAMILY";
pub const ENV_WHITEOUT_RATIO: &str = "OVERLAY_WHITEOUT_RATIO";

/// Configuration for the annotation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Font for new empty text objects
    pub default_font_family: String,
    pub default_font_size: f32,
    #[serde(with = "hex_color")]
    pub default_text_color: Color,

    /// Rectangle placed by the whiteout tool
    pub whiteout_size: Size,

    /// Whiteout height as a multiple of the masked run's height
    pub whiteout_mask_ratio: f32,

    pub sticky_note_size: Size,
    #[serde(with = "hex_color")]
    pub sticky_note_color: Color,
    pub sticky_note_text: String,

    /// Max undo entries kept per page
    pub history_limit: usize,

    /// Handle hit radius in document units
    pub handle_size: f32,

    /// Distance of the rotation handle above an object's top edge
    pub rotation_handle_offset: f32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_font_family: "Helvetica".to_string(),
            default_font_size: 16.0,
            default_text_color: Color::BLACK,
            whiteout_size: Size::new(100.0, 30.0),
            whiteout_mask_ratio: 1.2,
            sticky_note_size: Size::new(150.0, 100.0),
            sticky_note_color: Color::NOTE_YELLOW,
            sticky_note_text: "Note".to_string(),
            history_limit: 100,
            handle_size: 6.0,
            rotation_handle_offset: 30.0,
        }
    }
}

impl EditorConfig {
    pub fn with_font(mut self, family: impl Into<String>, size: f32) -> Self {
        self.default_font_family = family.into();
        self.default_font_size = size;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_whiteout_size(mut self, size: Size) -> Self {
        self.whiteout_size = size;
        self
    }

    pub fn with_whiteout_mask_ratio(mut self, ratio: f32) -> Self {
        self.whiteout_mask_ratio = ratio;
        self
    }

    pub fn with_sticky_note(mut self, size: Size, color: Color, text: impl Into<String>) -> Self {
        self.sticky_note_size = size;
        self.sticky_note_color = color;
        self.sticky_note_text = text.into();
        self
    }

    /// Loads configuration from environment variables, on top of the defaults.
    ///
    /// Environment variables:
    /// - `OVERLAY_HISTORY_LIMIT`: undo entries per page (default: 100)
    /// - `OVERLAY_FONT_SIZE`: default font size (default: 16)
    /// - `OVERLAY_FONT_FAMILY`: default font family (default: Helvetica)
    /// - `OVERLAY_WHITEOUT_RATIO`: whiteout mask ratio (default: 1.2)
    ///
    /// # Errors
    /// Returns an error if any variable contains an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var(ENV_HISTORY_LIMIT) {
            config.history_limit = parse_value(ENV_HISTORY_LIMIT, &val)?;
        }
        if let Ok(val) = std::env::var(ENV_FONT_SIZE) {
            config.default_font_size = parse_value(ENV_FONT_SIZE, &val)?;
        }
        if let Ok(val) = std::env::var(ENV_FONT_FAMILY) {
            config.default_font_family = val;
        }
        if let Ok(val) = std::env::var(ENV_WHITEOUT_RATIO) {
            config.whiteout_mask_ratio = parse_value(ENV_WHITEOUT_RATIO, &val)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file. Missing keys keep their defaults.
    ///
    /// ```json
    /// { "default_font_size": 12.0, "sticky_note_color": "#ffeb3b" }
    /// ```
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("default_font_size", self.default_font_size),
            ("whiteout_mask_ratio", self.whiteout_mask_ratio),
            ("whiteout_size.width", self.whiteout_size.width),
            ("whiteout_size.height", self.whiteout_size.height),
            ("sticky_note_size.width", self.sticky_note_size.width),
            ("sticky_note_size.height", self.sticky_note_size.height),
            ("handle_size", self.handle_size),
        ];
        for (key, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(invalid(key, value));
            }
        }
        if self.rotation_handle_offset < 0.0 {
            return Err(invalid("rotation_handle_offset", self.rotation_handle_offset));
        }
        if self.history_limit == 0 {
            return Err(invalid("history_limit", self.history_limit));
        }
        if self.default_font_family.trim().is_empty() {
            return Err(invalid("default_font_family", "\"\""));
        }
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| invalid(key, value))
}

/// Colors as `"#rrggbb"` strings in config files
mod hex_color {
    use crate::geometry::Color;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(color: &Color, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&color.to_hex())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Color, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Color::from_hex(&raw).ok_or_else(|| de::Error::custom(format!("invalid color {raw:?}")))
    }
}
