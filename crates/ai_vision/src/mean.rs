//! Mean blobs
//!
//! Caffe-era models ship their training-set mean image as a serialized
//! `BlobProto` (`mean.binaryproto`). Preprocessing only needs one value per
//! channel, so the blob is averaged plane by plane.

use std::path::Path;

use prost::Message;

use crate::error::VisionError;

/// Shape of a blob, outermost dimension first
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BlobShape {
    #[prost(int64, repeated, tag = "1")]
    pub dim: ::prost::alloc::vec::Vec<i64>,
}

/// Serialized N-dimensional array
///
/// `num`, `channels`, `height` and `width` are the legacy 4-D shape; newer
/// writers fill `shape` instead.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BlobProto {
    #[prost(message, optional, tag = "7")]
    pub shape: ::core::option::Option<BlobShape>,
    #[prost(float, repeated, tag = "5")]
    pub data: ::prost::alloc::vec::Vec<f32>,
    #[prost(float, repeated, tag = "6")]
    pub diff: ::prost::alloc::vec::Vec<f32>,
    #[prost(double, repeated, tag = "8")]
    pub double_data: ::prost::alloc::vec::Vec<f64>,
    #[prost(int32, optional, tag = "1")]
    pub num: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "2")]
    pub channels: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "3")]
    pub height: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "4")]
    pub width: ::core::option::Option<i32>,
}

impl BlobProto {
    /// Channel count declared by the blob, if any
    fn declared_channels(&self) -> Option<i64> {
        if let Some(shape) = &self.shape {
            return match shape.dim.as_slice() {
                [_, c, _, _] | [c, _, _] => Some(*c),
                _ => None,
            };
        }
        self.channels.map(i64::from)
    }

    /// Blob values as `f32`, preferring single precision data
    fn values(&self) -> Vec<f32> {
        if self.data.is_empty() {
            self.double_data.iter().map(|v| *v as f32).collect()
        } else {
            self.data.clone()
        }
    }
}

/// Decode a mean blob and reduce it to per-channel means
pub fn mean_from_blob(bytes: &[u8]) -> Result<[f32; 3], VisionError> {
    let blob = BlobProto::decode(bytes).map_err(|e| VisionError::InvalidMean(e.to_string()))?;
    if let Some(channels) = blob.declared_channels()
        && channels != 3
    {
        return Err(VisionError::InvalidMean(format!(
            "expected 3 channels, blob has {channels}"
        )));
    }
    channel_means(&blob.values())
}

/// Read a `mean.binaryproto` file from disk
pub async fn read_mean_blob(path: &Path) -> Result<[f32; 3], VisionError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| VisionError::InvalidMean(format!("{}: {e}", path.display())))?;
    mean_from_blob(&bytes)
}

/// Average each of three equally sized, consecutive planes
pub fn channel_means(values: &[f32]) -> Result<[f32; 3], VisionError> {
    if values.is_empty() || values.len() % 3 != 0 {
        return Err(VisionError::InvalidMean(format!(
            "{} values cannot be split into 3 planes",
            values.len()
        )));
    }
    let plane = values.len() / 3;
    let mut means = [0.0_f32; 3];
    for (mean, chunk) in means.iter_mut().zip(values.chunks_exact(plane)) {
        let sum: f64 = chunk.iter().map(|v| f64::from(*v)).sum();
        *mean = (sum / plane as f64) as f32;
    }
    Ok(means)
}
