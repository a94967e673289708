//! Engine configuration.
//!
//! Deliberately small: everything transport-related (URLs, keys) belongs to
//! the adapters in the binary crate. Loadable from TOML; every field has a
//! default so a partial file is valid.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::execution::sandbox::DEFAULT_SANDBOX_TIMEOUT;
use crate::execution::Language;
use crate::history::DEFAULT_HISTORY_CAPACITY;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Language learners are expected to write.
    pub language: Language,
    /// Wall-clock bound for the remote sandbox, in milliseconds.
    pub sandbox_timeout_ms: u64,
    /// Number of runs kept in history.
    pub history_capacity: usize,
    /// Sampling temperature for simulation requests.
    pub simulation_temperature: f32,
    /// Sampling temperature for fix suggestions.
    pub fix_temperature: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            language: Language::Java,
            sandbox_timeout_ms: DEFAULT_SANDBOX_TIMEOUT.as_millis() as u64,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            simulation_temperature: 0.0,
            fix_temperature: 0.2,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn sandbox_timeout(&self) -> Duration {
        Duration::from_millis(self.sandbox_timeout_ms)
    }
}
