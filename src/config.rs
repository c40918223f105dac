//! YAML configuration for the `arbor` binary
//!
//! Every field has a default, so a missing file or an empty one yields a
//! usable configuration. Command-line flags override what is read here.

use crate::generation::{GenerationPipeline, DEFAULT_MAX_CHILDREN};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid log level: {0}")]
    LogLevel(String),
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArborConfig {
    /// SQLite database; defaults to `<data_dir>/arbor/arbor.db`
    pub db_path: Option<PathBuf>,
    pub log_level: String,
    pub generation: GenerationConfig,
}

impl Default for ArborConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: "info".to_string(),
            generation: GenerationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub model_id: Option<String>,
    pub max_children: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model_id: None,
            max_children: DEFAULT_MAX_CHILDREN,
        }
    }
}

impl GenerationConfig {
    pub fn pipeline(&self) -> GenerationPipeline {
        let pipeline = GenerationPipeline::new().with_max_children(self.max_children);
        match &self.model_id {
            Some(model) => pipeline.with_model(model.clone()),
            None => pipeline,
        }
    }
}

impl ArborConfig {
    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load configuration from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load from the default location, or defaults if no file exists there
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// `<config_dir>/arbor/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("arbor").join("config.yaml"))
    }

    /// The configured database path, or `<data_dir>/arbor/arbor.db`
    pub fn resolved_db_path(&self) -> PathBuf {
        if let Some(path) = &self.db_path {
            return path.clone();
        }
        let data_dir = dirs::data_dir().unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
        data_dir.join("arbor").join("arbor.db")
    }
}

/// Install a stderr `fmt` subscriber at `level`.
///
/// Returns `Ok(false)` if a global subscriber was already installed.
pub fn init_logging(level: &str) -> Result<bool, ConfigError> {
    let level: tracing::Level = level.parse().map_err(|_| ConfigError::LogLevel(level.to_string()))?;
    Ok(tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok())
}
