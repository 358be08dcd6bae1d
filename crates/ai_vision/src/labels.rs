//! Label (features) files
//!
//! One label per line, the line index being the class index in the model's
//! output vector.

use std::path::Path;

use tracing::debug;

use crate::error::VisionError;

/// Split label text into lines, dropping trailing blank lines
pub fn parse_labels(text: &str) -> Vec<String> {
    let mut labels: Vec<String> = text
        .lines()
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect();
    while labels.last().is_some_and(|label| label.trim().is_empty()) {
        labels.pop();
    }
    labels
}

/// Read a label file from disk
pub async fn read_labels(path: &Path) -> Result<Vec<String>, VisionError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| VisionError::LabelsUnavailable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    let labels = parse_labels(&text);
    debug!(path = %path.display(), count = labels.len(), "Loaded labels");
    Ok(labels)
}
