//! Input tensor dimensions
//!
//! Image models declare their input as `[C, H, W]` or `[N, C, H, W]`; the
//! batch defaults to 1 when omitted.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Shape of an NCHW image tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageDimensions {
    batch: usize,
    channels: usize,
    height: usize,
    width: usize,
}

impl ImageDimensions {
    /// Create validated dimensions
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidParameter` if any extent is zero.
    pub fn new(
        batch: usize,
        channels: usize,
        height: usize,
        width: usize,
    ) -> Result<Self, DomainError> {
        if batch == 0 || channels == 0 || height == 0 || width == 0 {
            return Err(DomainError::invalid_parameter(
                "dimensions",
                format!("all extents must be positive, got [{batch}, {channels}, {height}, {width}]"),
            ));
        }
        Ok(Self {
            batch,
            channels,
            height,
            width,
        })
    }

    /// Build from a `[C, H, W]` or `[N, C, H, W]` list
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidParameter` for other lengths, for
    /// non-integral or non-positive values.
    #[allow(clippy::cast_sign_loss)]
    pub fn from_values(values: &[f64]) -> Result<Self, DomainError> {
        let extents = values
            .iter()
            .map(|v| {
                if v.fract() == 0.0 && *v >= 1.0 {
                    Ok(*v as usize)
                } else {
                    Err(DomainError::invalid_parameter(
                        "dimensions",
                        format!("{v} is not a positive integer"),
                    ))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        match extents.as_slice() {
            [c, h, w] => Self::new(1, *c, *h, *w),
            [n, c, h, w] => Self::new(*n, *c, *h, *w),
            other => Err(DomainError::invalid_parameter(
                "dimensions",
                format!("expected 3 or 4 values, got {}", other.len()),
            )),
        }
    }

    pub const fn batch(&self) -> usize {
        self.batch
    }

    pub const fn channels(&self) -> usize {
        self.channels
    }

    pub const fn height(&self) -> usize {
        self.height
    }

    pub const fn width(&self) -> usize {
        self.width
    }

    /// Number of pixels in one channel plane
    #[must_use]
    pub const fn plane_len(&self) -> usize {
        self.height * self.width
    }

    /// Number of floats in one image (C×H×W)
    #[must_use]
    pub const fn image_len(&self) -> usize {
        self.channels * self.plane_len()
    }

    /// The same shape with a batch of one
    #[must_use]
    pub const fn per_image(&self) -> Self {
        Self { batch: 1, ..*self }
    }

    /// Shape as `[N, C, H, W]`
    #[must_use]
    pub const fn as_nchw(&self) -> [usize; 4] {
        [self.batch, self.channels, self.height, self.width]
    }
}

impl fmt::Display for ImageDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}x{}x{}",
            self.batch, self.channels, self.height, self.width
        )
    }
}
