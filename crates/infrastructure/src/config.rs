//! Application configuration
//!
//! Values are layered: built-in defaults, then an optional config file, then
//! environment variables such as `VISION_AGENT_VISION__TOP_K=3`.

use std::path::{Path, PathBuf};

use ai_vision::VisionConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::telemetry::TelemetryConfig;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "VISION_AGENT";

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "config";

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    /// Values were read but are not usable
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Configuration could not be rendered
    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Where manifests are read from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Directory of `*.yml` / `*.yaml` manifests; built-in models only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_dir: Option<PathBuf>,
}

/// Top-level agent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub vision: VisionConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,
}

impl AppConfig {
    /// Load from `config.{toml,yaml,json}` in the working directory (if any)
    /// and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load from an explicit file, which must exist, and the environment
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => ::config::File::from(path).required(true),
            None => ::config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config: Self = ::config::Config::builder()
            .add_source(file)
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check values the agent cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.vision.validate().map_err(ConfigError::Invalid)?;
        if self.telemetry.log_filter.trim().is_empty() {
            return Err(ConfigError::Invalid("telemetry.log_filter must not be empty".into()));
        }
        Ok(())
    }

    /// Effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
