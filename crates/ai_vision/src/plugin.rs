//! Plugin registration
//!
//! Called once at agent start to make the image predictors available.

use std::sync::Arc;

use domain::FrameworkManifest;
use tracing::info;

use crate::caffe2::ImagePredictorFactory;
use crate::config::VisionConfig;
use crate::error::VisionError;
use crate::ports::{PredictorFactory, SessionLoader};
use crate::registry::PredictorRegistry;

pub use crate::caffe2::framework_manifest;

/// Register the image predictor backed by the tract runtime
pub fn register(
    registry: &PredictorRegistry,
    config: &VisionConfig,
) -> Result<FrameworkManifest, VisionError> {
    Ok(register_factory(registry, ImagePredictorFactory::new(config)?))
}

/// Register the image predictor backed by a custom runtime
pub fn register_with_loader(
    registry: &PredictorRegistry,
    config: &VisionConfig,
    loader: Arc<dyn SessionLoader>,
) -> Result<FrameworkManifest, VisionError> {
    let factory = ImagePredictorFactory::with_loader(config, loader)?;
    Ok(register_factory(registry, factory))
}

fn register_factory(
    registry: &PredictorRegistry,
    factory: ImagePredictorFactory,
) -> FrameworkManifest {
    let framework = factory.framework().clone();
    registry.register(Arc::new(factory));
    info!(%framework, "Image predictor plugin registered");
    framework
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_caffe2() {
        let dir = tempfile::tempdir().unwrap();
        let registry = PredictorRegistry::new();
        let framework = register(&registry, &VisionConfig::with_work_dir(dir.path())).unwrap();

        assert_eq!(framework.canonical_name(), "caffe2:0.8.1");
        assert!(registry.resolve(&framework).is_some());
    }

    #[test]
    fn configured_version_is_advertised() {
        let dir = tempfile::tempdir().unwrap();
        let config = VisionConfig {
            framework_version: "1.0".into(),
            ..VisionConfig::with_work_dir(dir.path())
        };
        let registry = PredictorRegistry::new();
        register(&registry, &config).unwrap();
        assert_eq!(registry.frameworks(), vec![framework_manifest(&config)]);
    }
}
