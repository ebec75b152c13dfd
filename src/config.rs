use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEBOUNCE_MS: u64 = 50;
const COOLDOWN_MS: u64 = 120;
const COLOR_FRAME_MS: u64 = 16;
const LAYOUT_POLL_MS: u64 = 50;
const LAYOUT_POLL_ATTEMPTS: u32 = 10;
const MINIMAP_DEBOUNCE_MS: u64 = 120;

const D3_URL: &str = "https://cdn.jsdelivr.net/npm/d3@7";
const MARKMAP_LIB_URL: &str = "https://cdn.jsdelivr.net/npm/markmap-lib";
const MARKMAP_VIEW_URL: &str = "https://cdn.jsdelivr.net/npm/markmap-view";

/// Everything tunable from a settings file. Every field has a default, so an empty file
/// is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Built-in theme name or path to a theme file.
    pub theme: Option<String>,
    pub render: RenderSettings,
    pub scheduler: SchedulerSettings,
    pub export: ExportSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub font_size: f32,
    pub line_height: f32,
    pub spacing_horizontal: f32,
    pub spacing_vertical: f32,
    pub padding_x: f32,
    pub line_width: f32,
    pub circle_radius: f32,
    /// Depth below which nodes start collapsed; `None` expands everything.
    pub initial_expand_level: Option<usize>,
    pub fit_ratio: f32,
    pub max_width: Option<f32>,
    pub client_width: f32,
    pub client_height: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            font_size: 16.0,
            line_height: 20.0,
            spacing_horizontal: 80.0,
            spacing_vertical: 5.0,
            padding_x: 8.0,
            line_width: 1.5,
            circle_radius: 6.0,
            initial_expand_level: None,
            fit_ratio: 0.98,
            max_width: None,
            client_width: 1200.0,
            client_height: 800.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub debounce_ms: u64,
    pub cooldown_ms: u64,
    /// Delay between layout completion and the color pass.
    pub color_frame_ms: u64,
    pub layout_poll_ms: u64,
    pub layout_poll_attempts: u32,
    pub minimap_debounce_ms: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            debounce_ms: DEBOUNCE_MS,
            cooldown_ms: COOLDOWN_MS,
            color_frame_ms: COLOR_FRAME_MS,
            layout_poll_ms: LAYOUT_POLL_MS,
            layout_poll_attempts: LAYOUT_POLL_ATTEMPTS,
            minimap_debounce_ms: MINIMAP_DEBOUNCE_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub png_scale: f32,
    pub padding: f32,
    pub max_bytes: Option<usize>,
    pub jpeg_quality: u8,
    pub jpeg_min_quality: u8,
    pub jpeg_quality_step: u8,
    pub downscale_factor: f32,
    pub max_attempts: usize,
    pub include_internal_labels: bool,
    pub d3_url: String,
    pub markmap_lib_url: String,
    pub markmap_view_url: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            png_scale: 2.0,
            padding: 4.0,
            max_bytes: None,
            jpeg_quality: 92,
            jpeg_min_quality: 60,
            jpeg_quality_step: 12,
            downscale_factor: 0.85,
            max_attempts: 5,
            include_internal_labels: false,
            d3_url: D3_URL.to_string(),
            markmap_lib_url: MARKMAP_LIB_URL.to_string(),
            markmap_view_url: MARKMAP_VIEW_URL.to_string(),
        }
    }
}

impl Settings {
    /// Parse settings, trying TOML first and then YAML.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        match toml::from_str(content) {
            Ok(settings) => Ok(settings),
            Err(toml_err) => serde_yaml::from_str(content).map_err(|yaml_err| ConfigError::Parse {
                toml: toml_err.to_string(),
                yaml: yaml_err.to_string(),
            }),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_settings_use_defaults() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.scheduler.debounce_ms, 50);
        assert_eq!(settings.scheduler.cooldown_ms, 120);
        assert_eq!(settings.export.png_scale, 2.0);
    }

    #[test]
    fn parses_partial_toml() {
        let settings = Settings::parse(
            "theme = \"dark\"\n[scheduler]\ndebounce_ms = 10\n[export]\nmax_bytes = 2000000\n",
        )
        .unwrap();
        assert_eq!(settings.theme.as_deref(), Some("dark"));
        assert_eq!(settings.scheduler.debounce_ms, 10);
        assert_eq!(settings.scheduler.cooldown_ms, 120);
        assert_eq!(settings.export.max_bytes, Some(2_000_000));
    }

    #[test]
    fn falls_back_to_yaml() {
        let settings = Settings::parse("render:\n  fit_ratio: 0.9\n  initial_expand_level: 2\n").unwrap();
        assert_eq!(settings.render.fit_ratio, 0.9);
        assert_eq!(settings.render.initial_expand_level, Some(2));
    }

    #[test]
    fn reports_both_parse_errors() {
        let err = Settings::parse("scheduler = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
