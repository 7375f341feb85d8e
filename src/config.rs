use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;

/// Default maximum distance between the current commit and the oldest retained commit
pub const MAX_UNDO_DEPTH: usize = 32;

/// Default maximum distance between the branch head and the current commit
pub const MAX_REDO_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Bounds on how much history is retained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryLimits {
    pub max_undo: usize,
    pub max_redo: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            max_undo: MAX_UNDO_DEPTH,
            max_redo: MAX_REDO_DEPTH,
        }
    }
}

impl HistoryLimits {
    pub fn new(max_undo: usize, max_redo: usize) -> Self {
        Self { max_undo, max_redo }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// One of trace, debug, info, warn, error
    pub log_level: String,
    pub history: HistoryLimits,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            history: HistoryLimits::default(),
        }
    }
}

impl AppConfig {
    /// Parse config from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.level()?;
        Ok(config)
    }

    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Render the config back to TOML, e.g. to log the effective settings
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    pub fn level(&self) -> Result<Level, ConfigError> {
        self.log_level
            .parse::<Level>()
            .map_err(|_| ConfigError::Invalid(format!("unknown log level '{}'", self.log_level)))
    }
}

#[cfg(test)]
mod test;
