use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format of log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Configuration for logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Filter directives, e.g. "ai_vision=debug,info"; `RUST_LOG` wins when set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Include source file and line in each event
    #[serde(default)]
    pub with_location: bool,
}

fn default_log_filter() -> String {
    "presentation_cli=info,ai_vision=info,infrastructure=info,warn".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            format: LogFormat::default(),
            with_location: false,
        }
    }
}

impl TelemetryConfig {
    /// Filter used when `RUST_LOG` is unset
    ///
    /// `override_filter` (e.g. from command-line verbosity) replaces the
    /// configured filter.
    fn env_filter(&self, override_filter: Option<&str>) -> Result<EnvFilter, TelemetryError> {
        if let Some(filter) = override_filter {
            return EnvFilter::try_new(filter).map_err(|e| TelemetryError::Filter(e.to_string()));
        }
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.log_filter))
            .map_err(|e| TelemetryError::Filter(e.to_string()))
    }
}

/// Install the global subscriber
///
/// Fails if a subscriber is already installed.
pub fn init_telemetry(
    config: &TelemetryConfig,
    override_filter: Option<&str>,
) -> Result<(), TelemetryError> {
    let env_filter = config.env_filter(override_filter)?;

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(config.with_location)
            .with_line_number(config.with_location)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_file(config.with_location)
            .with_line_number(config.with_location)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()
        .map_err(|e| TelemetryError::Init(e.to_string()))?;

    info!(format = ?config.format, "Logging initialized");
    Ok(())
}

/// Error type for telemetry initialization
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to initialize tracing subscriber
    #[error("Failed to initialize tracing: {0}")]
    Init(String),

    /// Filter directives could not be parsed
    #[error("Invalid log filter: {0}")]
    Filter(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.log_filter.contains("ai_vision=info"));
        assert!(!config.with_location);
    }

    #[test]
    fn format_deserializes_lowercase() {
        let config: TelemetryConfig = toml::from_str("format = \"json\"").unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.log_filter, default_log_filter());
    }

    #[test]
    fn override_filter_is_parsed() {
        let config = TelemetryConfig::default();
        assert!(config.env_filter(Some("ai_vision=trace")).is_ok());
        assert!(matches!(
            config.env_filter(Some("ai_vision=loudest")),
            Err(TelemetryError::Filter(_))
        ));
    }

    #[test]
    fn second_init_fails() {
        let config = TelemetryConfig::default();
        let _ = init_telemetry(&config, Some("warn"));
        let second = init_telemetry(&config, Some("warn"));
        assert!(matches!(second, Err(TelemetryError::Init(_))));
    }
}
