//! Layered configuration
//!
//! Sources, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. `cadence.toml` in the working directory, or the file named by
//!    `--config` / `CADENCE_CONFIG_PATH` (required when named explicitly)
//! 3. `CADENCE__SECTION__KEY` environment variables, e.g.
//!    `CADENCE__SIMULATION__SEED=7`
//!
//! A `.env` file is loaded first so its variables take part in step 3.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_CONFIG_FILE: &str = "cadence.toml";
const CONFIG_PATH_VAR: &str = "CADENCE_CONFIG_PATH";
const ENV_PREFIX: &str = "CADENCE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub interpreter: InterpreterConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    /// `full` or `compact`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "full".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpreterConfig {
    /// Wait returned by `step()` while the pause flag is set
    pub pause_wait_seconds: u64,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            pause_wait_seconds: crate::executor::DEFAULT_PAUSE_WAIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub failure_probability: f64,
    /// Fixed seed for random simulation; a fresh one is drawn when unset
    #[serde(default)]
    pub seed: Option<u64>,
    /// Step cap for `simulate` and `verify`
    pub max_steps: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            failure_probability: crate::simulation::DEFAULT_FAILURE_PROBABILITY,
            seed: None,
            max_steps: 1000,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load with no overrides
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    /// The effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let p = self.simulation.failure_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(ConfigError::Invalid(format!(
                "simulation.failure_probability must be within 0.0..=1.0, got {}",
                p
            )));
        }
        if self.simulation.max_steps == 0 {
            return Err(ConfigError::Invalid(
                "simulation.max_steps must be at least 1".to_string(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "full" | "compact") {
            return Err(ConfigError::Invalid(format!(
                "logging.format must be 'full' or 'compact', got '{}'",
                self.logging.format
            )));
        }
        Ok(())
    }
}

/// Collects explicit overrides, then layers file and environment sources.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    log_level: Option<String>,
    skip_env: bool,
}

impl ConfigBuilder {
    /// Config file to read; it must exist
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Overrides `logging.level` from every other source
    pub fn log_level(mut self, level: Option<String>) -> Self {
        self.log_level = level;
        self
    }

    /// Ignore `.env` and process environment variables
    pub fn without_env(mut self) -> Self {
        self.skip_env = true;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        if !self.skip_env {
            dotenvy::dotenv().ok();
        }

        let explicit = self.config_path.or_else(|| {
            if self.skip_env {
                None
            } else {
                std::env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from)
            }
        });

        let mut builder =
            ::config::Config::builder().add_source(::config::Config::try_from(&Config::default())?);

        builder = match &explicit {
            Some(path) => builder.add_source(::config::File::from(path.as_path()).required(true)),
            None => builder.add_source(::config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        if !self.skip_env {
            builder = builder.add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let mut config: Config = builder.build()?.try_deserialize()?;
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        config.validate()?;

        tracing::debug!(path = ?explicit, "configuration loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// The `.toml` suffix lets the loader pick the format; the file is
    /// deleted when the handle drops.
    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("cadence-")
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::builder().without_env().build().unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.interpreter.pause_wait_seconds, 60);
        assert_eq!(config.simulation.seed, None);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = write_temp(
            r#"
[simulation]
failure_probability = 0.5
seed = 11
max_steps = 40

[logging]
format = "compact"
"#,
        );
        let config = Config::builder()
            .without_env()
            .config_path(Some(file.path().to_path_buf()))
            .build()
            .unwrap();

        assert_eq!(config.simulation.failure_probability, 0.5);
        assert_eq!(config.simulation.seed, Some(11));
        assert_eq!(config.simulation.max_steps, 40);
        assert_eq!(config.logging.format, "compact");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_log_level_override() {
        let config = Config::builder()
            .without_env()
            .log_level(Some("debug".to_string()))
            .build()
            .unwrap();
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = Config::builder()
            .without_env()
            .config_path(Some(PathBuf::from("/nonexistent/cadence.toml")))
            .build();
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let file = write_temp("[simulation]\nfailure_probability = 2.0\nmax_steps = 5\n");
        let result = Config::builder()
            .without_env()
            .config_path(Some(file.path().to_path_buf()))
            .build();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_config_file_removed_after_load() {
        let file = write_temp("[interpreter]\npause_wait_seconds = 5\n");
        let path = file.path().to_path_buf();
        let config = Config::builder()
            .without_env()
            .config_path(Some(path.clone()))
            .build()
            .unwrap();
        assert_eq!(config.interpreter.pause_wait_seconds, 5);

        drop(file);
        assert!(!path.exists());
    }

    #[test]
    fn test_render_toml() {
        let rendered = Config::default().to_toml().unwrap();
        assert!(rendered.contains("[logging]"));
        assert!(rendered.contains("pause_wait_seconds = 60"));
        assert!(rendered.contains("max_steps = 1000"));
    }
}
