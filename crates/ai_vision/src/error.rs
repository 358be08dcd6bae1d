//! Vision predictor errors

use domain::DomainError;
use thiserror::Error;

/// Errors that can occur while preparing or running a predictor
#[derive(Debug, Error)]
pub enum VisionError {
    /// The manifest is unusable for this predictor
    #[error(transparent)]
    Manifest(#[from] DomainError),

    /// Failed to connect to an artifact server
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Request to an artifact server failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Timeout while talking to an artifact server
    #[error("Download timeout: {0}")]
    Timeout(String),

    /// The artifact server rejected the download
    #[error("Download failed for {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Archive could not be unpacked
    #[error("Archive error: {0}")]
    Archive(String),

    /// Label file missing or unreadable
    #[error("Cannot read {path}: {reason}")]
    LabelsUnavailable { path: String, reason: String },

    /// Mean blob missing or malformed
    #[error("Invalid mean blob: {0}")]
    InvalidMean(String),

    /// Input image could not be decoded or resized
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Tensor does not fit the model
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The wrapped inference runtime failed
    #[error("Inference engine error: {0}")]
    Engine(String),

    /// No predictor registered for the framework
    #[error("No predictor registered for framework {0}")]
    FrameworkNotRegistered(String),

    /// Predictor was used after `close`
    #[error("Predictor for {0} is closed")]
    Closed(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VisionError {
    /// Create a download failure
    pub fn download_failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DownloadFailed {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for VisionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::ConnectionFailed(err.to_string())
        } else {
            Self::RequestFailed(err.to_string())
        }
    }
}

impl From<image::ImageError> for VisionError {
    fn from(err: image::ImageError) -> Self {
        Self::InvalidImage(err.to_string())
    }
}

impl From<tokio::task::JoinError> for VisionError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Engine(format!("worker task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_failed_message() {
        let err = VisionError::download_failed("http://x/model.onnx", "HTTP 404 Not Found");
        assert_eq!(
            err.to_string(),
            "Download failed for http://x/model.onnx: HTTP 404 Not Found"
        );
    }

    #[test]
    fn domain_errors_pass_through() {
        let err: VisionError = DomainError::UnsupportedInputType("audio".into()).into();
        assert_eq!(err.to_string(), "Input type not supported: audio");
    }

    #[test]
    fn labels_unavailable_names_path() {
        let err = VisionError::LabelsUnavailable {
            path: "/tmp/squeezenet.features".into(),
            reason: "No such file or directory".into(),
        };
        assert!(err.to_string().starts_with("Cannot read /tmp/squeezenet.features"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: VisionError = io.into();
        assert!(matches!(err, VisionError::Io(_)));
    }
}
