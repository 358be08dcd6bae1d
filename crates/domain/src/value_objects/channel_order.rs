//! Channel plane order of an image tensor

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Order in which color channels are laid out as tensor planes
///
/// Caffe-family models are trained on BGR input, so that is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChannelOrder {
    /// Planes are blue, green, red
    #[default]
    Bgr,
    /// Planes are red, green, blue
    Rgb,
}

impl ChannelOrder {
    /// Index into an `[r, g, b]` pixel for each output plane
    #[must_use]
    pub const fn source_channels(self) -> [usize; 3] {
        match self {
            Self::Bgr => [2, 1, 0],
            Self::Rgb => [0, 1, 2],
        }
    }
}

impl fmt::Display for ChannelOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bgr => write!(f, "BGR"),
            Self::Rgb => write!(f, "RGB"),
        }
    }
}

impl FromStr for ChannelOrder {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BGR" => Ok(Self::Bgr),
            "RGB" => Ok(Self::Rgb),
            other => Err(DomainError::invalid_parameter(
                "color_mode",
                format!("unknown channel order '{other}', use BGR or RGB"),
            )),
        }
    }
}
