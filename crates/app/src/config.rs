use std::path::{Path, PathBuf};

use releve_extract::LlmOptions;
use releve_ocr::{BudgetOptions, DeskewOptions, LayoutOptions, PdfOptions, PipelineOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "releve.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Tesseract language code.
    pub lang: String,
    /// Directory holding `tessdata`, when not the system default.
    pub data_path: Option<String>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self { lang: "eng".to_string(), data_path: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub layout: LayoutOptions,
    pub deskew: DeskewOptions,
    pub pdf: PdfOptions,
    pub budget: BudgetOptions,
    pub llm: LlmOptions,
    pub ocr: OcrSettings,
}

impl AppConfig {
    /// Load `path`, or `releve.toml` if present, or defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.exists() {
                    return Ok(Self::default());
                }
                fallback
            }
        };
        let text = std::fs::read_to_string(&path)
            .map_err(|source| ConfigError::Read { path: path.clone(), source })?;
        tracing::debug!("loaded config from {}", path.display());
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.layout.tolerance_divisor > 0.0) {
            return Err(ConfigError::Invalid("layout.tolerance_divisor must be positive".into()));
        }
        if !(self.layout.fallback_unit > 0.0) {
            return Err(ConfigError::Invalid("layout.fallback_unit must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.layout.min_confidence) {
            return Err(ConfigError::Invalid("layout.min_confidence must be within 0..=1".into()));
        }
        if self.deskew.enabled && !(self.deskew.step_degrees > 0.0) {
            return Err(ConfigError::Invalid("deskew.step_degrees must be positive".into()));
        }
        if !(self.pdf.render_dpi > 0.0) {
            return Err(ConfigError::Invalid("pdf.render_dpi must be positive".into()));
        }
        if self.pdf.max_pages == 0 {
            return Err(ConfigError::Invalid("pdf.max_pages must be at least 1".into()));
        }
        Ok(())
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            layout: self.layout.clone(),
            deskew: self.deskew.clone(),
            pdf: self.pdf.clone(),
            budget: self.budget.clone(),
        }
    }
}
