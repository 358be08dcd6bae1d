//! Configuration for vision predictors

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration shared by all predictors of the plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    /// Root directory for downloaded model artifacts
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Whole-request timeout for artifact downloads in milliseconds
    #[serde(default = "default_download_timeout_ms")]
    pub download_timeout_ms: u64,

    /// Connection timeout for artifact downloads in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// User agent sent with artifact downloads
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Number of classes returned by the prediction service
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Framework version advertised by the registered predictor
    #[serde(default = "default_framework_version")]
    pub framework_version: String,
}

fn default_work_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("vision-agent")
}

const fn default_download_timeout_ms() -> u64 {
    600_000 // 10 minutes, weight files can be large
}

const fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_user_agent() -> String {
    format!("vision-agent/{}", env!("CARGO_PKG_VERSION"))
}

const fn default_top_k() -> usize {
    5
}

fn default_framework_version() -> String {
    "0.8.1".to_string()
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            download_timeout_ms: default_download_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            user_agent: default_user_agent(),
            top_k: default_top_k(),
            framework_version: default_framework_version(),
        }
    }
}

impl VisionConfig {
    /// Config rooted at a specific work directory
    pub fn with_work_dir(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.work_dir.as_os_str().is_empty() {
            return Err("work_dir must not be empty".to_string());
        }
        if self.download_timeout_ms == 0 {
            return Err("download_timeout_ms must be greater than zero".to_string());
        }
        if self.top_k == 0 {
            return Err("top_k must be greater than zero".to_string());
        }
        Ok(())
    }
}
