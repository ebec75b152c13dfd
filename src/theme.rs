use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::rank::NEUTRAL_STROKE;

const LIGHT_BACKGROUND: &str = "#ffffff";
const LIGHT_TEXT: &str = "#111827";

const BUILTIN_THEMES: &[(&str, &str)] = &[
    ("dark", include_str!("../themes/dark.toml")),
    ("light", include_str!("../themes/light.toml")),
];

const FONT_FAMILY: &str = "sans-serif";

/// Background/text palette for the surface and its exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    #[serde(default = "default_background")]
    pub background_color: String,
    #[serde(default = "default_text")]
    pub text_color: String,
    #[serde(default = "default_link")]
    pub link_color: String,
    #[serde(default = "default_font_family")]
    pub font_family: String,
}

fn default_background() -> String {
    LIGHT_BACKGROUND.to_string()
}
fn default_text() -> String {
    LIGHT_TEXT.to_string()
}
fn default_link() -> String {
    NEUTRAL_STROKE.to_string()
}
fn default_font_family() -> String {
    FONT_FAMILY.to_string()
}

impl Default for Theme {
    fn default() -> Self {
        Self::light()
    }
}

#[derive(Debug, Deserialize)]
struct AlacrittyColors {
    primary: AlacrittyPrimary,
    #[serde(default)]
    normal: Option<AlacrittyNormal>,
}

#[derive(Debug, Deserialize)]
struct AlacrittyPrimary {
    background: String,
    foreground: String,
}

#[derive(Debug, Deserialize)]
struct AlacrittyNormal {
    #[serde(default)]
    white: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlacrittyTheme {
    colors: AlacrittyColors,
}

impl Theme {
    pub fn light() -> Self {
        Theme {
            background_color: LIGHT_BACKGROUND.to_string(),
            text_color: LIGHT_TEXT.to_string(),
            link_color: NEUTRAL_STROKE.to_string(),
            font_family: FONT_FAMILY.to_string(),
        }
    }

    pub fn from_builtin(name: &str) -> Result<Self, ConfigError> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        let content = BUILTIN_THEMES
            .iter()
            .find(|(n, _)| *n == normalized)
            .map(|(_, c)| *c)
            .ok_or_else(|| ConfigError::UnknownTheme {
                name: name.to_string(),
                available: Self::list_builtins().join(", "),
            })?;
        Self::from_alacritty_toml(content)
    }

    pub fn list_builtins() -> Vec<&'static str> {
        BUILTIN_THEMES.iter().map(|(n, _)| *n).collect()
    }

    /// A built-in name, or a path to a TOML/YAML theme file.
    pub fn resolve(name_or_path: &str) -> Result<Self, ConfigError> {
        let path = Path::new(name_or_path);
        if !path.is_file() {
            return Self::from_builtin(name_or_path);
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        // Try TOML first, then YAML
        Self::from_alacritty_toml(&content).or_else(|_| Self::from_alacritty_yaml(&content))
    }

    /// Whether the background is dark enough to need light text in exports.
    pub fn is_dark(&self) -> bool {
        parse_hex(&self.background_color)
            .map(|(r, g, b)| (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) < 128.0)
            .unwrap_or(false)
    }

    pub fn from_alacritty_yaml(content: &str) -> Result<Self, ConfigError> {
        let alacritty: AlacrittyTheme =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Theme {
                message: format!("Failed to parse Alacritty YAML: {}", e),
            })?;

        Ok(Self::from_alacritty_theme(alacritty))
    }

    pub fn from_alacritty_toml(content: &str) -> Result<Self, ConfigError> {
        let alacritty: AlacrittyTheme = toml::from_str(content).map_err(|e| ConfigError::Theme {
            message: format!("Failed to parse Alacritty TOML: {}", e),
        })?;

        Ok(Self::from_alacritty_theme(alacritty))
    }

    fn from_alacritty_theme(alacritty: AlacrittyTheme) -> Self {
        let colors = alacritty.colors;
        Theme {
            background_color: colors.primary.background,
            text_color: colors.primary.foreground,
            link_color: colors
                .normal
                .and_then(|n| n.white)
                .unwrap_or_else(default_link),
            font_family: FONT_FAMILY.to_string(),
        }
    }
}

/// `#rrggbb` / `#rgb` → components.
pub fn parse_hex(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.trim().strip_prefix('#')?;
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return None,
    };
    let value = u32::from_str_radix(&expanded, 16).ok()?;
    Some(((value >> 16) as u8, (value >> 8) as u8, value as u8))
}
