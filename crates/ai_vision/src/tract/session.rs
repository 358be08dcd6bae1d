use std::path::Path;

use domain::ImageDimensions;
use tracing::{debug, instrument};
use tract_onnx::prelude::*;

use crate::error::VisionError;
use crate::ports::{InferenceSession, SessionLoader};

/// Loads ONNX graphs into optimized tract plans
#[derive(Debug, Clone, Copy, Default)]
pub struct TractSessionLoader;

impl SessionLoader for TractSessionLoader {
    #[instrument(skip(self), fields(graph = %graph_path.display()))]
    fn load(
        &self,
        graph_path: &Path,
        weights_path: &Path,
        dims: ImageDimensions,
    ) -> Result<Box<dyn InferenceSession>, VisionError> {
        if !weights_path.exists() {
            return Err(VisionError::Engine(format!(
                "weights file {} is missing",
                weights_path.display()
            )));
        }
        Ok(Box::new(TractSession::load(graph_path, dims)?))
    }
}

/// A model ready to run on fixed-size single images
pub struct TractSession {
    plan: TypedRunnableModel<TypedModel>,
    dims: ImageDimensions,
}

impl std::fmt::Debug for TractSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TractSession")
            .field("dims", &self.dims)
            .finish_non_exhaustive()
    }
}

impl TractSession {
    /// Load, type and optimize an ONNX graph for `dims`
    pub fn load(graph_path: &Path, dims: ImageDimensions) -> Result<Self, VisionError> {
        let dims = dims.per_image();
        let plan = tract_onnx::onnx()
            .model_for_path(graph_path)
            .and_then(|model| model.with_input_fact(0, f32::fact(dims.as_nchw()).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(engine_error)?;
        debug!(%dims, "Loaded ONNX graph");
        Ok(Self { plan, dims })
    }
}

impl InferenceSession for TractSession {
    fn predict(&self, input: &[f32], dims: ImageDimensions) -> Result<Vec<f32>, VisionError> {
        let dims = dims.per_image();
        if dims != self.dims {
            return Err(VisionError::InvalidInput(format!(
                "session expects {}, got {dims}",
                self.dims
            )));
        }
        let tensor = Tensor::from_shape(&dims.as_nchw(), input).map_err(engine_error)?;
        let outputs = self.plan.run(tvec!(tensor.into())).map_err(engine_error)?;
        let first = outputs
            .first()
            .ok_or_else(|| VisionError::Engine("model produced no output".into()))?;
        let view = first.to_array_view::<f32>().map_err(engine_error)?;
        Ok(view.iter().copied().collect())
    }
}

fn engine_error(err: TractError) -> VisionError {
    VisionError::Engine(format!("{err:#}"))
}
