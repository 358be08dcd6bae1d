//! Prediction service
//!
//! Agent-side entry point: finds the predictor for a manifest, keeps it
//! loaded between requests and runs the download, preprocess and predict
//! steps in order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use domain::{ModelManifest, PredictionFeatures};
use image::DynamicImage;
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::error::VisionError;
use crate::ports::Predictor;
use crate::registry::PredictorRegistry;

/// Slot for one model; empty until its first load and download succeed
type PredictorSlot = Arc<OnceCell<Arc<dyn Predictor>>>;

/// Runs classifications through registered predictors
pub struct PredictionService {
    registry: Arc<PredictorRegistry>,
    top_k: usize,
    predictors: Mutex<HashMap<String, PredictorSlot>>,
}

impl std::fmt::Debug for PredictionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionService")
            .field("registry", &self.registry)
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

impl PredictionService {
    pub fn new(registry: Arc<PredictorRegistry>, top_k: usize) -> Self {
        Self {
            registry,
            top_k,
            predictors: Mutex::new(HashMap::new()),
        }
    }

    /// Loaded predictor for `manifest` with its artifacts downloaded
    ///
    /// Concurrent requests for the same model share one load. Other models
    /// are served while it runs.
    #[instrument(skip_all, fields(model = %manifest.canonical_name()))]
    pub async fn predictor(
        &self,
        manifest: &ModelManifest,
    ) -> Result<Arc<dyn Predictor>, VisionError> {
        let slot = Arc::clone(
            self.predictors
                .lock()
                .entry(manifest.canonical_name())
                .or_default(),
        );
        if let Some(predictor) = slot.get() {
            debug!("Reusing loaded predictor");
            return Ok(Arc::clone(predictor));
        }

        let predictor = slot
            .get_or_try_init(|| self.load_and_download(manifest))
            .await?;
        Ok(Arc::clone(predictor))
    }

    async fn load_and_download(
        &self,
        manifest: &ModelManifest,
    ) -> Result<Arc<dyn Predictor>, VisionError> {
        let predictor = self.registry.load(manifest.clone()).await?;
        if let Err(e) = predictor.download().await {
            if let Err(close_err) = predictor.close().await {
                warn!(error = %close_err, "Failed to close predictor");
            }
            return Err(e);
        }
        info!("Predictor loaded");
        Ok(predictor)
    }

    /// Top classes for `image` using the configured `top_k`
    pub async fn classify(
        &self,
        manifest: &ModelManifest,
        image: DynamicImage,
    ) -> Result<PredictionFeatures, VisionError> {
        self.classify_top_k(manifest, image, self.top_k).await
    }

    /// The `k` most probable classes for `image`
    #[instrument(skip(self, manifest, image), fields(model = %manifest.canonical_name()))]
    pub async fn classify_top_k(
        &self,
        manifest: &ModelManifest,
        image: DynamicImage,
        k: usize,
    ) -> Result<PredictionFeatures, VisionError> {
        let predictor = self.predictor(manifest).await?;
        let input = predictor.preprocess(image).await?;
        let features = predictor.predict(&input).await?;
        Ok(features.top_k(k))
    }

    /// Close and forget every loaded predictor
    pub async fn shutdown(&self) {
        let slots: Vec<_> = self.predictors.lock().drain().collect();
        for (name, slot) in slots {
            let Some(predictor) = slot.get() else {
                continue;
            };
            if let Err(e) = predictor.close().await {
                warn!(model = %name, error = %e, "Failed to close predictor");
            }
        }
        info!("Prediction service stopped");
    }
}

/// Decode an image file on a blocking thread
pub async fn open_image(path: &Path) -> Result<DynamicImage, VisionError> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || image::open(&path).map_err(VisionError::from)).await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use domain::{FrameworkManifest, ImageDimensions, PredictionFeature};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    use crate::ports::{InputTensor, PredictorFactory};

    /// Shared by every fake predictor; the model named `slow` waits for
    /// `release` inside `download`
    #[derive(Default)]
    struct Counters {
        loads: AtomicUsize,
        downloads: AtomicUsize,
        closes: AtomicUsize,
        failing_downloads: AtomicUsize,
        download_started: Notify,
        release: Notify,
    }

    struct FakePredictor {
        framework: FrameworkManifest,
        manifest: ModelManifest,
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl Predictor for FakePredictor {
        fn framework(&self) -> &FrameworkManifest {
            &self.framework
        }

        fn manifest(&self) -> &ModelManifest {
            &self.manifest
        }

        async fn download(&self) -> Result<(), VisionError> {
            self.counters.downloads.fetch_add(1, Ordering::SeqCst);
            if self.manifest.name == "slow" {
                self.counters.download_started.notify_one();
                self.counters.release.notified().await;
            }
            let failing = &self.counters.failing_downloads;
            if failing.load(Ordering::SeqCst) > 0 {
                failing.fetch_sub(1, Ordering::SeqCst);
                return Err(VisionError::download_failed("labels.txt", "unavailable"));
            }
            Ok(())
        }

        async fn preprocess(&self, _image: DynamicImage) -> Result<InputTensor, VisionError> {
            InputTensor::new(vec![0.0; 3], ImageDimensions::new(1, 3, 1, 1)?)
        }

        async fn predict(&self, _input: &InputTensor) -> Result<PredictionFeatures, VisionError> {
            Ok(PredictionFeatures::new(
                [0.2_f32, 0.5, 0.3]
                    .iter()
                    .zip(0_i64..)
                    .map(|(p, i)| PredictionFeature {
                        index: i,
                        name: format!("class{i}"),
                        probability: *p,
                    })
                    .collect(),
            ))
        }

        async fn close(&self) -> Result<(), VisionError> {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeFactory {
        framework: FrameworkManifest,
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl PredictorFactory for FakeFactory {
        fn framework(&self) -> &FrameworkManifest {
            &self.framework
        }

        async fn load(&self, manifest: ModelManifest) -> Result<Arc<dyn Predictor>, VisionError> {
            self.counters.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FakePredictor {
                framework: self.framework.clone(),
                manifest,
                counters: Arc::clone(&self.counters),
            }))
        }
    }

    fn service() -> (PredictionService, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let registry = Arc::new(PredictorRegistry::new());
        registry.register(Arc::new(FakeFactory {
            framework: FrameworkManifest::new("Caffe2", "0.8.1"),
            counters: Arc::clone(&counters),
        }));
        (PredictionService::new(registry, 2), counters)
    }

    fn manifest(name: &str) -> ModelManifest {
        ModelManifest::from_yaml(&format!(
            "name: {name}\nframework:\n  name: Caffe2\nmodel:\n  graph_path: g\n  weights_path: w\n"
        ))
        .unwrap()
    }

    fn image() -> DynamicImage {
        DynamicImage::new_rgb8(1, 1)
    }

    #[tokio::test]
    async fn classify_returns_top_k() {
        let (service, _) = service();
        let features = service.classify(&manifest("a"), image()).await.unwrap();
        let names: Vec<_> = features.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["class1", "class2"]);
    }

    #[tokio::test]
    async fn predictors_are_cached_per_model() {
        let (service, counters) = service();
        service.classify(&manifest("a"), image()).await.unwrap();
        service.classify(&manifest("a"), image()).await.unwrap();
        service.classify_top_k(&manifest("b"), image(), 1).await.unwrap();

        assert_eq!(counters.loads.load(Ordering::SeqCst), 2);
        assert_eq!(counters.downloads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn shutdown_closes_every_predictor() {
        let (service, counters) = service();
        service.classify(&manifest("a"), image()).await.unwrap();
        service.classify(&manifest("b"), image()).await.unwrap();
        service.shutdown().await;
        assert_eq!(counters.closes.load(Ordering::SeqCst), 2);

        // a later request loads again
        service.classify(&manifest("a"), image()).await.unwrap();
        assert_eq!(counters.loads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unknown_framework_fails() {
        let (service, _) = service();
        let mut m = manifest("a");
        m.framework = FrameworkManifest::new("TensorFlow", "1.12");
        let err = service.classify(&m, image()).await.unwrap_err();
        assert!(matches!(err, VisionError::FrameworkNotRegistered(_)));
    }

    #[tokio::test]
    async fn cached_model_is_served_while_another_downloads() {
        let (service, counters) = service();
        let service = Arc::new(service);
        service.classify(&manifest("fast"), image()).await.unwrap();

        let slow = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.classify(&manifest("slow"), image()).await }
        });
        counters.download_started.notified().await;

        let fast = tokio::time::timeout(
            Duration::from_millis(500),
            service.classify(&manifest("fast"), image()),
        )
        .await;
        assert!(matches!(fast, Ok(Ok(_))));

        counters.release.notify_one();
        slow.await.unwrap().unwrap();
        assert_eq!(counters.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_load() {
        let (service, counters) = service();
        let service = Arc::new(service);
        let requests: Vec<_> = (0..3)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.classify(&manifest("slow"), image()).await })
            })
            .collect();

        counters.download_started.notified().await;
        counters.release.notify_one();
        for request in requests {
            request.await.unwrap().unwrap();
        }
        assert_eq!(counters.loads.load(Ordering::SeqCst), 1);
        assert_eq!(counters.downloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_download_is_retried() {
        let (service, counters) = service();
        counters.failing_downloads.store(1, Ordering::SeqCst);

        let err = service.classify(&manifest("a"), image()).await.unwrap_err();
        assert!(matches!(err, VisionError::DownloadFailed { .. }));
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);

        service.classify(&manifest("a"), image()).await.unwrap();
        assert_eq!(counters.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn open_image_reports_missing_file() {
        let err = open_image(Path::new("/nonexistent/cat.jpg")).await.unwrap_err();
        assert!(matches!(err, VisionError::InvalidImage(_)));
    }
}
