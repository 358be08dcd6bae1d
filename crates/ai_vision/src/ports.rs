//! Port definitions for predictors
//!
//! Defines the traits (ports) the agent drives and the seam to the wrapped
//! inference runtime.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{FrameworkManifest, ImageDimensions, ModelManifest, PredictionFeatures};
use image::DynamicImage;
#[cfg(test)]
use mockall::automock;

use crate::error::VisionError;

/// A preprocessed image, channel-planar (C×H×W) floats
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Vec<f32>,
    dims: ImageDimensions,
}

impl InputTensor {
    /// Wrap a buffer holding exactly one image of `dims`
    pub fn new(data: Vec<f32>, dims: ImageDimensions) -> Result<Self, VisionError> {
        let dims = dims.per_image();
        if data.len() != dims.image_len() {
            return Err(VisionError::InvalidInput(format!(
                "tensor of {} values does not match {dims}",
                data.len()
            )));
        }
        Ok(Self { data, dims })
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub const fn dims(&self) -> ImageDimensions {
        self.dims
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }
}

/// A loaded model inside the wrapped inference runtime
#[cfg_attr(test, automock)]
pub trait InferenceSession: Send + Sync {
    /// Run the model on one image and return the raw output vector
    fn predict(&self, input: &[f32], dims: ImageDimensions) -> Result<Vec<f32>, VisionError>;

    /// Release native resources early; dropping the session also releases them
    fn close(&self) {}
}

/// Builds inference sessions from downloaded artifacts
#[cfg_attr(test, automock)]
pub trait SessionLoader: Send + Sync {
    /// Load a session for the given graph and weight files
    fn load(
        &self,
        graph_path: &Path,
        weights_path: &Path,
        dims: ImageDimensions,
    ) -> Result<Box<dyn InferenceSession>, VisionError>;
}

/// Per-model predictor driven by the agent
///
/// Lifecycle: `download` → (`preprocess` → `predict`)* → `close`.
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Framework this predictor runs on
    fn framework(&self) -> &FrameworkManifest;

    /// Model this predictor serves
    fn manifest(&self) -> &ModelManifest;

    /// Fetch graph, weights and labels into the work directory
    async fn download(&self) -> Result<(), VisionError>;

    /// Resize and normalize an image into the model's input tensor
    async fn preprocess(&self, image: DynamicImage) -> Result<InputTensor, VisionError>;

    /// Classify a preprocessed image; features are sorted by probability
    async fn predict(&self, input: &InputTensor) -> Result<PredictionFeatures, VisionError>;

    /// Release the inference session
    async fn close(&self) -> Result<(), VisionError>;
}

/// Prototype registered with the agent, one per framework
#[async_trait]
pub trait PredictorFactory: Send + Sync {
    /// Framework served by predictors from this factory
    fn framework(&self) -> &FrameworkManifest;

    /// Create a predictor for one model
    async fn load(&self, manifest: ModelManifest) -> Result<Arc<dyn Predictor>, VisionError>;
}
