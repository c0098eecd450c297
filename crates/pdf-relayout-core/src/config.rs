use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::fit::FitOptions;
use crate::layout::NormalizeOptions;
use crate::pdf::OverlayOptions;
use crate::translator::DEFAULT_COMMAND_TIMEOUT_SECS;
use crate::util::APP_NAME;

/// Language codes following ISO 639-1 with regional variants
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lang(pub String);

impl Lang {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Serde default functions for common languages
fn default_source_lang() -> Lang {
    Lang::new("fr")
}

fn default_target_lang() -> Lang {
    Lang::new("en")
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Lang {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Lang {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// RGB color with components in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl TextColor {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub const fn black() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub const fn white() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }

    pub const fn dark_red() -> Self {
        Self::new(0.8, 0.0, 0.0)
    }

    pub const fn blue() -> Self {
        Self::new(0.0, 0.0, 0.8)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "black" => Some(Self::black()),
            "white" => Some(Self::white()),
            "darkred" | "dark_red" | "dark-red" => Some(Self::dark_red()),
            "blue" => Some(Self::blue()),
            _ => None,
        }
    }

    /// Components clamped to the valid range
    pub fn clamped(self) -> Self {
        Self::new(
            self.r.clamp(0.0, 1.0),
            self.g.clamp(0.0, 1.0),
            self.b.clamp(0.0, 1.0),
        )
    }
}

impl Default for TextColor {
    fn default() -> Self {
        Self::black()
    }
}

/// Translator backend configuration.
///
/// `command` selects the external command backend; otherwise the
/// OpenAI-compatible API is used (llama.cpp, Ollama, DeepSeek, OpenAI, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Lines per API request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Shell command translating stdin lines to stdout lines
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

impl TranslatorConfig {
    /// Create a new API translator config
    pub fn new(
        api_base: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            api_key,
            model: model.into(),
            ..Self::default()
        }
    }

    /// Create a command translator config
    pub fn command(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            ..Self::default()
        }
    }
}

fn default_api_base() -> String {
    "http://localhost:8080/v1".to_string()
}

fn default_model() -> String {
    "default_model".to_string()
}

const fn default_retry_count() -> u32 {
    3
}

const fn default_retry_delay_ms() -> u64 {
    1000
}

const fn default_batch_size() -> usize {
    40
}

const fn default_command_timeout_secs() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            model: default_model(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
            batch_size: default_batch_size(),
            command: None,
            command_timeout_secs: default_command_timeout_secs(),
        }
    }
}

/// Overlay appearance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Paint an opaque background behind each translated box
    #[serde(default)]
    pub paint_white_bg: bool,
    /// Remove the original text layer with Ghostscript before merging
    #[serde(default)]
    pub strip_text: bool,
    #[serde(default = "TextColor::white")]
    pub background: TextColor,
    #[serde(default)]
    pub text_color: TextColor,
    /// TrueType font used for the overlay (built-in Helvetica otherwise)
    #[serde(default)]
    pub font_path: Option<PathBuf>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            paint_white_bg: false,
            strip_text: false,
            background: TextColor::white(),
            text_color: TextColor::black(),
            font_path: None,
        }
    }
}

impl OverlayConfig {
    /// Compositor options. Stripped documents always get a painted background.
    pub fn overlay_options(&self, fit: &FitOptions) -> OverlayOptions {
        OverlayOptions {
            paint_background: self.paint_white_bg || self.strip_text,
            background: self.background.clamped(),
            text_color: self.text_color.clamped(),
            fit: fit.clone(),
        }
    }
}

/// Auto-tuning search grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuneConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_v_tol_grid")]
    pub v_tol_grid: Vec<f32>,
    #[serde(default = "default_min_font_grid")]
    pub min_font_grid: Vec<f32>,
    /// Rasterization resolution for scoring
    #[serde(default = "default_tune_dpi")]
    pub dpi: f32,
}

fn default_v_tol_grid() -> Vec<f32> {
    vec![6.0, 9.0, 12.0]
}

fn default_min_font_grid() -> Vec<f32> {
    vec![7.0, 8.0, 9.0]
}

const fn default_tune_dpi() -> f32 {
    150.0
}

impl Default for TuneConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            v_tol_grid: default_v_tol_grid(),
            min_font_grid: default_min_font_grid(),
            dpi: default_tune_dpi(),
        }
    }
}

/// Glossary applied to source lines before translation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AbbreviationConfig {
    /// `TOKEN=Full|Short` entries
    #[serde(default)]
    pub entries: Vec<String>,
    /// Expand to the full form instead of the short one
    #[serde(default)]
    pub prefer_full: bool,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable the in-memory line cache
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum cached lines
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,

    /// Entry TTL in seconds (0 = no expiry)
    #[serde(default)]
    pub ttl_seconds: u64,
}

const fn default_true() -> bool {
    true
}

const fn default_max_entries() -> u64 {
    10_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: default_max_entries(),
            ttl_seconds: 0,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Source language
    #[serde(default = "default_source_lang")]
    pub source_lang: Lang,

    /// Target language
    #[serde(default = "default_target_lang")]
    pub target_lang: Lang,

    /// Line grouping thresholds
    #[serde(default)]
    pub layout: NormalizeOptions,

    /// Text fitting parameters
    #[serde(default)]
    pub fit: FitOptions,

    #[serde(default)]
    pub overlay: OverlayConfig,

    #[serde(default)]
    pub tune: TuneConfig,

    /// Translator backend configuration
    #[serde(default)]
    pub translator: TranslatorConfig,

    #[serde(default)]
    pub abbreviations: AbbreviationConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_lang: default_source_lang(),
            target_lang: default_target_lang(),
            layout: NormalizeOptions::default(),
            fit: FitOptions::default(),
            overlay: OverlayConfig::default(),
            tune: TuneConfig::default(),
            translator: TranslatorConfig::default(),
            abbreviations: AbbreviationConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from layered sources, later ones overriding earlier ones:
    /// `~/.config/pdf-relayout/config.toml`, `./config.toml`, then
    /// `PDF_RELAYOUT__SECTION__KEY` environment variables.
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join(APP_NAME).join("config.toml");
            tracing::debug!("Looking for config at {}", user_config.display());
            builder = builder.add_source(config::File::from(user_config).required(false));
        }

        let config: Self = builder
            .add_source(config::File::from(PathBuf::from("config.toml")).required(false))
            .add_source(
                config::Environment::with_prefix("PDF_RELAYOUT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(config::Config::try_deserialize::<Self>)
            .map_err(|e| Error::ConfigLoad(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        let positive = |field: &str, value: f32| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(Error::ConfigInvalid {
                    field: field.to_string(),
                    reason: format!("must be a positive number, got {value}"),
                })
            }
        };

        positive("layout.v_tol", self.layout.v_tol)?;
        positive("fit.line_spacing", self.fit.line_spacing)?;
        positive("tune.dpi", self.tune.dpi)?;
        if let Some(min) = self.fit.min_size_override {
            positive("fit.min_size_override", min)?;
        }
        if self.fit.padding < 0.0 {
            return Err(Error::ConfigInvalid {
                field: "fit.padding".to_string(),
                reason: "must not be negative".to_string(),
            });
        }
        if self.tune.enabled && (self.tune.v_tol_grid.is_empty() || self.tune.min_font_grid.is_empty()) {
            return Err(Error::ConfigInvalid {
                field: "tune".to_string(),
                reason: "search grids must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.source_lang.as_str(), "fr");
        assert_eq!(config.target_lang.as_str(), "en");
        assert!((config.layout.v_tol - 6.0).abs() < f32::EPSILON);
        assert_eq!(config.tune.v_tol_grid, vec![6.0, 9.0, 12.0]);
        assert_eq!(config.tune.min_font_grid, vec![7.0, 8.0, 9.0]);
        assert!(config.translator.command.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial_tables() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
target_lang = "de"

[layout]
v_tol = 9.0

[overlay]
strip_text = true

[translator]
command = "cat"

[abbreviations]
entries = ["DV=Devant|Dev."]
prefer_full = true
"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.target_lang.as_str(), "de");
        assert_eq!(config.source_lang.as_str(), "fr");
        assert!((config.layout.v_tol - 9.0).abs() < f32::EPSILON);
        assert_eq!(config.translator.command.as_deref(), Some("cat"));
        assert_eq!(config.translator.retry_count, 3);
        assert_eq!(config.abbreviations.entries.len(), 1);
        assert!(config.abbreviations.prefer_full);

        let options = config.overlay.overlay_options(&config.fit);
        assert!(options.paint_background);
    }

    #[test]
    fn test_from_file_rejects_bad_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[layout]\nv_tol = -1.0").unwrap();
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(Error::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn test_from_file_missing() {
        assert!(matches!(
            AppConfig::from_file("/nonexistent/pdf-relayout.toml"),
            Err(Error::ConfigLoad(_))
        ));
    }

    #[test]
    fn test_empty_grid_rejected_when_tuning() {
        let mut config = AppConfig::default();
        config.tune.enabled = true;
        config.tune.min_font_grid.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_color_names() {
        assert_eq!(TextColor::from_name("White"), Some(TextColor::white()));
        assert_eq!(TextColor::from_name("dark-red"), Some(TextColor::dark_red()));
        assert_eq!(TextColor::from_name("mauve"), None);
        assert_eq!(TextColor::new(2.0, -1.0, 0.5).clamped(), TextColor::new(1.0, 0.0, 0.5));
    }
}
