//! Infrastructure layer - Configuration, logging and manifest storage
//!
//! Loads the agent configuration, installs the tracing subscriber and reads
//! model manifests from disk.

pub mod catalog;
pub mod config;
pub mod telemetry;

pub use catalog::{CatalogError, ManifestCatalog};
pub use config::{AppConfig, CatalogConfig, ConfigError};
pub use telemetry::{LogFormat, TelemetryConfig, TelemetryError, init_telemetry};
