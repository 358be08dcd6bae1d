//! Domain entities - Manifests and the results produced from them

mod model_manifest;
mod prediction;

pub use model_manifest::{
    COLOR_MODE_PARAM, DIMENSIONS_PARAM, FEATURES_URL_PARAM, MEAN_PARAM, ModelAssets,
    ModelInput, ModelManifest, ModelOutput, SCALE_PARAM, path_segment,
};
pub use prediction::{PredictionFeature, PredictionFeatures};
