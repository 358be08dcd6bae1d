//! Domain-level errors

use thiserror::Error;

/// Errors that can occur in the domain layer
#[derive(Debug, Error)]
pub enum DomainError {
    /// Manifest YAML could not be parsed
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    /// The model declares a number of inputs the predictor cannot handle
    #[error("Number of inputs not supported: expected 1, got {0}")]
    UnsupportedInputCount(usize),

    /// The model input is not an image
    #[error("Input type not supported: {0}")]
    UnsupportedInputType(String),

    /// A required manifest parameter is absent
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    /// A manifest parameter has the wrong shape or value
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// The output vector is longer than the label list
    #[error("Model produced {outputs} outputs but only {labels} labels are available")]
    LabelMismatch { outputs: usize, labels: usize },

    /// Validation failed
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

impl DomainError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
