//! Predictor registry
//!
//! Maps frameworks to the factories that build predictors for them. Plugins
//! register their factories once at process start.

use std::sync::Arc;

use domain::{FrameworkManifest, ModelManifest};
use parking_lot::RwLock;
use tracing::{info, instrument, warn};

use crate::error::VisionError;
use crate::ports::{Predictor, PredictorFactory};

/// Thread-safe set of registered predictor factories
#[derive(Default)]
pub struct PredictorRegistry {
    factories: RwLock<Vec<Arc<dyn PredictorFactory>>>,
}

impl std::fmt::Debug for PredictorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictorRegistry")
            .field("frameworks", &self.frameworks())
            .finish()
    }
}

impl PredictorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a factory, replacing one registered for the same framework
    pub fn register(&self, factory: Arc<dyn PredictorFactory>) {
        let key = factory.framework().canonical_name();
        let mut factories = self.factories.write();
        if let Some(existing) = factories
            .iter_mut()
            .find(|f| f.framework().canonical_name() == key)
        {
            warn!(framework = %key, "Replacing registered predictor");
            *existing = factory;
        } else {
            info!(framework = %key, "Registered predictor");
            factories.push(factory);
        }
    }

    /// Factory able to run models built for `wanted`
    pub fn resolve(&self, wanted: &FrameworkManifest) -> Option<Arc<dyn PredictorFactory>> {
        self.factories
            .read()
            .iter()
            .find(|f| f.framework().matches(wanted))
            .cloned()
    }

    /// All registered frameworks, in registration order
    pub fn frameworks(&self) -> Vec<FrameworkManifest> {
        self.factories
            .read()
            .iter()
            .map(|f| f.framework().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.read().is_empty()
    }

    /// Create a predictor for `manifest` with the matching factory
    #[instrument(skip_all, fields(model = %manifest.canonical_name()))]
    pub async fn load(&self, manifest: ModelManifest) -> Result<Arc<dyn Predictor>, VisionError> {
        let factory = self
            .resolve(&manifest.framework)
            .ok_or_else(|| VisionError::FrameworkNotRegistered(manifest.framework.to_string()))?;
        factory.load(manifest).await
    }
}
