//! Where per-channel mean values come from

use serde::{Deserialize, Serialize};

/// Mean subtracted from every pixel during preprocessing
///
/// Values are listed in tensor plane order (BGR for Caffe models).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MeanSource {
    /// Explicit per-channel means
    PerChannel([f32; 3]),
    /// URL of a serialized mean blob to download
    Url(String),
}

impl MeanSource {
    /// Per-channel means if known without downloading
    #[must_use]
    pub const fn per_channel(&self) -> Option<[f32; 3]> {
        match self {
            Self::PerChannel(values) => Some(*values),
            Self::Url(_) => None,
        }
    }
}

impl Default for MeanSource {
    fn default() -> Self {
        Self::PerChannel([0.0; 3])
    }
}
