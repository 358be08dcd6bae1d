//! Caffe2 image classification
//!
//! Serves image models published for Caffe2. Inference runs through a
//! [`SessionLoader`], by default the tract ONNX runtime.

mod predictor;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{FrameworkManifest, ModelManifest};
use tracing::{debug, instrument};

pub use predictor::ImagePredictor;

use crate::config::VisionConfig;
use crate::download::ArtifactDownloader;
use crate::error::VisionError;
use crate::ports::{Predictor, PredictorFactory, SessionLoader};
use crate::tract::TractSessionLoader;

/// Framework name served by this module
pub const FRAMEWORK_NAME: &str = "Caffe2";

/// Creates [`ImagePredictor`]s for Caffe2 manifests
pub struct ImagePredictorFactory {
    framework: FrameworkManifest,
    work_root: PathBuf,
    downloader: ArtifactDownloader,
    loader: Arc<dyn SessionLoader>,
}

impl std::fmt::Debug for ImagePredictorFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePredictorFactory")
            .field("framework", &self.framework)
            .field("work_root", &self.work_root)
            .finish_non_exhaustive()
    }
}

impl ImagePredictorFactory {
    /// Factory backed by the tract runtime
    pub fn new(config: &VisionConfig) -> Result<Self, VisionError> {
        Self::with_loader(config, Arc::new(TractSessionLoader))
    }

    /// Factory backed by a custom inference runtime
    pub fn with_loader(
        config: &VisionConfig,
        loader: Arc<dyn SessionLoader>,
    ) -> Result<Self, VisionError> {
        config.validate().map_err(VisionError::Configuration)?;
        Ok(Self {
            framework: framework_manifest(config),
            work_root: config.work_dir.clone(),
            downloader: ArtifactDownloader::new(config)?,
            loader,
        })
    }
}

#[async_trait]
impl PredictorFactory for ImagePredictorFactory {
    fn framework(&self) -> &FrameworkManifest {
        &self.framework
    }

    #[instrument(skip_all, fields(model = %manifest.canonical_name()))]
    async fn load(&self, manifest: ModelManifest) -> Result<Arc<dyn Predictor>, VisionError> {
        if !self.framework.matches(&manifest.framework) {
            return Err(VisionError::FrameworkNotRegistered(
                manifest.framework.to_string(),
            ));
        }
        let predictor = ImagePredictor::new(
            self.framework.clone(),
            manifest,
            &self.work_root,
            self.downloader.clone(),
            Arc::clone(&self.loader),
        )?;
        debug!(work_dir = %predictor.work_dir().display(), "Created predictor");
        Ok(Arc::new(predictor))
    }
}

/// Framework identity advertised to the agent
pub fn framework_manifest(config: &VisionConfig) -> FrameworkManifest {
    FrameworkManifest::new(FRAMEWORK_NAME, config.framework_version.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::MockSessionLoader;

    fn manifest(framework: &str, version: &str) -> ModelManifest {
        ModelManifest::from_yaml(&format!(
            r"
name: ResNet
version: 50
framework:
  name: {framework}
  version: {version}
inputs:
  - type: image
    parameters:
      dimensions: [3, 224, 224]
model:
  graph_path: https://example.com/resnet.onnx
  weights_path: https://example.com/resnet.onnx
"
        ))
        .unwrap()
    }

    fn factory(dir: &std::path::Path) -> ImagePredictorFactory {
        ImagePredictorFactory::with_loader(
            &VisionConfig::with_work_dir(dir),
            Arc::new(MockSessionLoader::new()),
        )
        .unwrap()
    }

    #[test]
    fn advertises_caffe2() {
        let fw = framework_manifest(&VisionConfig::default());
        assert_eq!(fw.canonical_name(), "caffe2:0.8.1");
    }

    #[tokio::test]
    async fn loads_matching_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let predictor = factory(dir.path())
            .load(manifest("caffe2", "0.8.1"))
            .await
            .unwrap();
        assert_eq!(predictor.manifest().name, "ResNet");
        assert_eq!(predictor.framework().name, FRAMEWORK_NAME);
    }

    #[tokio::test]
    async fn rejects_other_framework() {
        let dir = tempfile::tempdir().unwrap();
        let err = factory(dir.path())
            .load(manifest("TensorFlow", "1.2"))
            .await
            .err().unwrap();
        assert!(matches!(err, VisionError::FrameworkNotRegistered(_)));
    }

    #[tokio::test]
    async fn rejects_non_image_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = manifest("Caffe2", "0.8.1");
        m.inputs[0].kind = "audio".into();
        let err = factory(dir.path()).load(m).await.err().unwrap();
        assert!(matches!(err, VisionError::Manifest(_)));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = VisionConfig {
            top_k: 0,
            ..Default::default()
        };
        assert!(ImagePredictorFactory::new(&config).is_err());
    }
}
