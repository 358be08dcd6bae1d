//! Logging and tracing setup
//!
//! Installs a `tracing` subscriber writing human-readable or JSON lines.

mod subscriber;

pub use subscriber::{LogFormat, TelemetryConfig, TelemetryError, init_telemetry};
