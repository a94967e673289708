//! Runner configuration: adapter endpoints, state location, engine settings.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Environment variables (`JAVALAB_*`)
//! 2. The TOML file passed with `--config`
//! 3. Built-in defaults
//!
//! | Variable                   | Field                    | Default                                    |
//! |----------------------------|--------------------------|--------------------------------------------|
//! | `JAVALAB_SANDBOX_URL`      | sandbox URL (empty = off)| `https://emkc.org/api/v2/piston/execute`   |
//! | `JAVALAB_MODEL_URL`        | model base URL           | `https://api.openai.com/v1`                |
//! | `JAVALAB_MODEL`            | model name               | `gpt-4o-mini`                              |
//! | `JAVALAB_API_KEY`          | model API key            | unset (model tiers disabled)               |
//! | `JAVALAB_STATE_DIR`        | state directory          | `.javalab`                                 |
//! | `JAVALAB_HTTP_TIMEOUT_SECS`| model request timeout    | `30`                                       |
//! | `JAVALAB_LANGUAGE`         | target language          | `java`                                     |

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use javalab_engine::{EngineConfig, Language};
use serde::Deserialize;

const DEFAULT_SANDBOX_URL: &str = "https://emkc.org/api/v2/piston/execute";
const DEFAULT_MODEL_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_STATE_DIR: &str = ".javalab";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

const ENV_SANDBOX_URL: &str = "JAVALAB_SANDBOX_URL";
const ENV_MODEL_URL: &str = "JAVALAB_MODEL_URL";
const ENV_MODEL: &str = "JAVALAB_MODEL";
const ENV_API_KEY: &str = "JAVALAB_API_KEY";
const ENV_STATE_DIR: &str = "JAVALAB_STATE_DIR";
const ENV_HTTP_TIMEOUT: &str = "JAVALAB_HTTP_TIMEOUT_SECS";
const ENV_LANGUAGE: &str = "JAVALAB_LANGUAGE";

/// OpenAI-compatible chat endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEndpoint {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    /// Piston-compatible execute URL; `None` disables the sandbox tier.
    pub sandbox_url: Option<String>,
    /// Chat endpoint; `None` disables simulation, model fixes and translation.
    pub model: Option<ModelEndpoint>,
    pub state_dir: PathBuf,
    pub http_timeout: Duration,
    pub engine: EngineConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            sandbox_url: Some(DEFAULT_SANDBOX_URL.to_string()),
            model: None,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            engine: EngineConfig::default(),
        }
    }
}

/// On-disk shape; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    sandbox_url: Option<String>,
    model_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    state_dir: Option<PathBuf>,
    http_timeout_secs: Option<u64>,
    engine: Option<EngineConfig>,
}

impl RunnerConfig {
    /// Defaults, then `path` (if any), then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = path {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            config
                .apply_toml(&text)
                .with_context(|| format!("Invalid config file {}", path.display()))?;
        }
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn apply_toml(&mut self, text: &str) -> Result<()> {
        let file: FileConfig = toml::from_str(text)?;
        if let Some(url) = file.sandbox_url {
            self.sandbox_url = non_empty(url);
        }
        self.merge_model(file.model_url, file.model, file.api_key);
        if let Some(dir) = file.state_dir {
            self.state_dir = dir;
        }
        if let Some(secs) = file.http_timeout_secs {
            self.http_timeout = Duration::from_secs(secs);
        }
        if let Some(engine) = file.engine {
            self.engine = engine;
        }
        Ok(())
    }

    /// Apply overrides from `lookup` (the environment in production).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_SANDBOX_URL) {
            self.sandbox_url = non_empty(url);
        }
        self.merge_model(lookup(ENV_MODEL_URL), lookup(ENV_MODEL), lookup(ENV_API_KEY));
        if let Some(dir) = lookup(ENV_STATE_DIR) {
            self.state_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup(ENV_HTTP_TIMEOUT) {
            let secs: u64 = secs
                .trim()
                .parse()
                .with_context(|| format!("{ENV_HTTP_TIMEOUT} must be a whole number of seconds"))?;
            self.http_timeout = Duration::from_secs(secs);
        }
        if let Some(lang) = lookup(ENV_LANGUAGE) {
            self.engine.language = lang
                .parse::<Language>()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("Invalid {ENV_LANGUAGE}"))?;
        }
        Ok(())
    }

    /// The model endpoint exists once any of its fields is configured.
    fn merge_model(&mut self, url: Option<String>, model: Option<String>, api_key: Option<String>) {
        if url.is_none() && model.is_none() && api_key.is_none() {
            return;
        }
        let endpoint = self.model.get_or_insert_with(|| ModelEndpoint {
            base_url: DEFAULT_MODEL_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
        });
        if let Some(url) = url.and_then(non_empty) {
            endpoint.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = model.and_then(non_empty) {
            endpoint.model = model;
        }
        if let Some(key) = api_key {
            endpoint.api_key = non_empty(key);
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.sandbox_url.as_deref(), Some(DEFAULT_SANDBOX_URL));
        assert!(config.model.is_none());
        assert_eq!(config.state_dir, PathBuf::from(".javalab"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RunnerConfig::default();
        config
            .apply_env(env(&[
                (ENV_SANDBOX_URL, ""),
                (ENV_API_KEY, "sk-test"),
                (ENV_MODEL_URL, "http://localhost:8000/v1/"),
                (ENV_LANGUAGE, "C"),
                (ENV_HTTP_TIMEOUT, "12"),
            ]))
            .unwrap();
        assert!(config.sandbox_url.is_none());
        let model = config.model.unwrap();
        assert_eq!(model.base_url, "http://localhost:8000/v1");
        assert_eq!(model.model, DEFAULT_MODEL);
        assert_eq!(model.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.engine.language, Language::C);
        assert_eq!(config.http_timeout, Duration::from_secs(12));
    }

    #[test]
    fn test_bad_env_values() {
        let mut config = RunnerConfig::default();
        assert!(config.apply_env(env(&[(ENV_HTTP_TIMEOUT, "soon")])).is_err());
        assert!(config.apply_env(env(&[(ENV_LANGUAGE, "cobol")])).is_err());
    }

    #[test]
    fn test_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("javalab.toml");
        std::fs::write(
            &path,
            "model = \"local-coder\"\nstate_dir = \"/tmp/jl\"\n\n[engine]\nsandbox_timeout_ms = 2000\n",
        )
        .unwrap();

        let mut config = RunnerConfig::default();
        config.apply_toml(&std::fs::read_to_string(&path).unwrap()).unwrap();
        config.apply_env(env(&[(ENV_STATE_DIR, "/var/jl")])).unwrap();

        assert_eq!(config.model.unwrap().model, "local-coder");
        assert_eq!(config.state_dir, PathBuf::from("/var/jl"));
        assert_eq!(config.engine.sandbox_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_unknown_file_keys_rejected() {
        let mut config = RunnerConfig::default();
        assert!(config.apply_toml("sandbox = \"x\"").is_err());
    }
}
