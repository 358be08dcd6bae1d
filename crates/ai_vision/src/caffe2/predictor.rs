use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use domain::{
    DomainError, FEATURES_URL_PARAM, FrameworkManifest, ImageDimensions, MeanSource,
    ModelManifest, PredictionFeatures, path_segment,
};
use image::DynamicImage;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::download::ArtifactDownloader;
use crate::error::VisionError;
use crate::labels::read_labels;
use crate::mean::read_mean_blob;
use crate::ports::{InferenceSession, InputTensor, Predictor, SessionLoader};
use crate::preprocess::{Normalization, image_to_tensor};

const MEAN_FILE: &str = "mean.binaryproto";

#[derive(Default)]
struct State {
    session: Option<Arc<dyn InferenceSession>>,
    labels: Option<Arc<Vec<String>>>,
    mean: Option<[f32; 3]>,
    closed: bool,
}

/// Image classifier for a single model
///
/// The session and the label list are loaded on the first prediction and
/// kept until `close`.
pub struct ImagePredictor {
    framework: FrameworkManifest,
    manifest: ModelManifest,
    work_dir: PathBuf,
    dims: ImageDimensions,
    normalization: Normalization,
    mean_source: MeanSource,
    downloader: ArtifactDownloader,
    loader: Arc<dyn SessionLoader>,
    state: Mutex<State>,
}

impl std::fmt::Debug for ImagePredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePredictor")
            .field("model", &self.manifest.canonical_name())
            .field("work_dir", &self.work_dir)
            .field("dims", &self.dims)
            .finish_non_exhaustive()
    }
}

impl ImagePredictor {
    /// Check the manifest and prepare a predictor rooted under `work_root`
    pub fn new(
        framework: FrameworkManifest,
        manifest: ModelManifest,
        work_root: &Path,
        downloader: ArtifactDownloader,
        loader: Arc<dyn SessionLoader>,
    ) -> Result<Self, VisionError> {
        let dims = manifest.image_dimensions()?;
        let mean_source = manifest.mean()?;
        let normalization = Normalization::new(
            mean_source.per_channel().unwrap_or_default(),
            manifest.scale()?,
            manifest.channel_order()?,
        )?;
        let work_dir = work_root.join(manifest.work_dir_suffix());

        Ok(Self {
            framework,
            manifest,
            work_dir,
            dims,
            normalization,
            mean_source,
            downloader,
            loader,
            state: Mutex::new(State::default()),
        })
    }

    /// Directory holding this model's artifacts
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Local path of the graph file
    pub fn graph_path(&self) -> PathBuf {
        self.artifact_path(&self.manifest.model.graph_path)
    }

    /// Local path of the weights file
    pub fn weights_path(&self) -> PathBuf {
        self.artifact_path(&self.manifest.model.weights_path)
    }

    /// Local path of the label file
    pub fn features_path(&self) -> PathBuf {
        self.work_dir
            .join(format!("{}.features", path_segment(&self.manifest.name)))
    }

    fn mean_path(&self) -> PathBuf {
        self.work_dir.join(MEAN_FILE)
    }

    /// Archives keep their inner layout; plain downloads keep the basename
    fn artifact_path(&self, path: &str) -> PathBuf {
        if self.manifest.model.is_archive {
            return self.work_dir.join(path.trim_start_matches('/'));
        }
        let name = path
            .split(['?', '#'])
            .next()
            .and_then(|p| p.rsplit('/').next())
            .filter(|n| !n.is_empty())
            .unwrap_or(path);
        self.work_dir.join(name)
    }

    fn features_url(&self) -> Result<&str, VisionError> {
        self.manifest
            .features_url()
            .ok_or_else(|| DomainError::MissingParameter(FEATURES_URL_PARAM.into()).into())
    }

    fn ensure_open(&self, state: &State) -> Result<(), VisionError> {
        if state.closed {
            Err(VisionError::Closed(self.manifest.canonical_name()))
        } else {
            Ok(())
        }
    }

    async fn mean(&self, state: &mut State) -> Result<[f32; 3], VisionError> {
        if let Some(mean) = state.mean {
            return Ok(mean);
        }
        let mean = match &self.mean_source {
            MeanSource::PerChannel(values) => *values,
            MeanSource::Url(url) => {
                let path = self.downloader.download_file(url, &self.mean_path()).await?;
                read_mean_blob(&path).await?
            }
        };
        debug!(?mean, "Resolved channel means");
        state.mean = Some(mean);
        Ok(mean)
    }

    #[instrument(name = "load_predictor", skip_all, fields(model = %self.manifest.name))]
    async fn session(&self, state: &mut State) -> Result<Arc<dyn InferenceSession>, VisionError> {
        if let Some(session) = &state.session {
            return Ok(Arc::clone(session));
        }
        let loader = Arc::clone(&self.loader);
        let graph = self.graph_path();
        let weights = self.weights_path();
        let dims = self.dims;
        let session: Arc<dyn InferenceSession> =
            tokio::task::spawn_blocking(move || loader.load(&graph, &weights, dims))
                .await??
                .into();
        info!("Inference session ready");
        state.session = Some(Arc::clone(&session));
        Ok(session)
    }

    async fn labels(&self, state: &mut State) -> Result<Arc<Vec<String>>, VisionError> {
        if let Some(labels) = &state.labels {
            return Ok(Arc::clone(labels));
        }
        let labels = Arc::new(read_labels(&self.features_path()).await?);
        state.labels = Some(Arc::clone(&labels));
        Ok(labels)
    }
}

#[async_trait]
impl Predictor for ImagePredictor {
    fn framework(&self) -> &FrameworkManifest {
        &self.framework
    }

    fn manifest(&self) -> &ModelManifest {
        &self.manifest
    }

    #[instrument(name = "download_model", skip(self), fields(model = %self.manifest.canonical_name()))]
    async fn download(&self) -> Result<(), VisionError> {
        self.ensure_open(&*self.state.lock().await)?;
        let features_url = self.features_url()?;
        tokio::fs::create_dir_all(&self.work_dir).await?;

        if self.manifest.model.is_archive {
            let members = [self.graph_path(), self.weights_path()];
            self.downloader
                .download_archive(&self.manifest.model.base_url, &self.work_dir, &members)
                .await?;
        } else {
            let graph_path = self.graph_path();
            let weights_path = self.weights_path();
            self.downloader
                .download_file(&self.manifest.graph_url(), &graph_path)
                .await?;
            // graph and weights may share one file
            if weights_path != graph_path {
                self.downloader
                    .download_file(&self.manifest.weights_url(), &weights_path)
                    .await?;
            }
        }

        self.downloader
            .download_file(features_url, &self.features_path())
            .await?;

        if let MeanSource::Url(url) = &self.mean_source {
            self.downloader.download_file(url, &self.mean_path()).await?;
        }

        info!(work_dir = %self.work_dir.display(), "Model artifacts ready");
        Ok(())
    }

    #[instrument(name = "preprocess", skip_all, fields(model = %self.manifest.name))]
    async fn preprocess(&self, image: DynamicImage) -> Result<InputTensor, VisionError> {
        let normalization = {
            let mut state = self.state.lock().await;
            self.ensure_open(&state)?;
            Normalization {
                mean: self.mean(&mut state).await?,
                ..self.normalization
            }
        };
        let dims = self.dims;
        tokio::task::spawn_blocking(move || image_to_tensor(&image, dims, &normalization)).await?
    }

    #[instrument(name = "predict", skip_all, fields(model = %self.manifest.name))]
    async fn predict(&self, input: &InputTensor) -> Result<PredictionFeatures, VisionError> {
        let expected = self.dims.per_image();
        if input.dims() != expected {
            return Err(VisionError::InvalidInput(format!(
                "expected {expected}, got {}",
                input.dims()
            )));
        }

        let (session, labels) = {
            let mut state = self.state.lock().await;
            self.ensure_open(&state)?;
            let session = self.session(&mut state).await?;
            let labels = self.labels(&mut state).await?;
            (session, labels)
        };

        let data = input.data().to_vec();
        let dims = input.dims();
        let probabilities =
            tokio::task::spawn_blocking(move || session.predict(&data, dims)).await??;
        debug!(outputs = probabilities.len(), "Inference finished");

        Ok(PredictionFeatures::from_probabilities(&probabilities, &labels)?.sorted())
    }

    async fn close(&self) -> Result<(), VisionError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        state.labels = None;
        if let Some(session) = state.session.take() {
            session.close();
        }
        debug!(model = %self.manifest.canonical_name(), "Predictor closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VisionConfig;
    use crate::ports::{MockInferenceSession, MockSessionLoader};

    const MANIFEST: &str = r"
name: SqueezeNet
version: 1.0
framework:
  name: Caffe2
  version: 0.8.1
inputs:
  - type: image
    parameters:
      dimensions: [3, 2, 2]
      mean: [1.0, 2.0, 3.0]
output:
  type: feature
  parameters:
    features_url: labels.txt
model:
  base_url: https://example.com/squeezenet
  graph_path: predict_net.pb
  weights_path: init_net.pb
";

    fn predictor_from_yaml(
        yaml: &str,
        loader: MockSessionLoader,
        work_root: &Path,
    ) -> ImagePredictor {
        ImagePredictor::new(
            FrameworkManifest::new("Caffe2", "0.8.1"),
            ModelManifest::from_yaml(yaml).unwrap(),
            work_root,
            ArtifactDownloader::new(&VisionConfig::default()).unwrap(),
            Arc::new(loader),
        )
        .unwrap()
    }

    fn predictor(loader: MockSessionLoader, work_root: &Path) -> ImagePredictor {
        predictor_from_yaml(MANIFEST, loader, work_root)
    }

    fn write_labels(p: &ImagePredictor, labels: &str) {
        std::fs::create_dir_all(p.work_dir()).unwrap();
        std::fs::write(p.features_path(), labels).unwrap();
    }

    fn loader_with_output(output: Vec<f32>) -> MockSessionLoader {
        let mut loader = MockSessionLoader::new();
        loader.expect_load().times(1).returning(move |_, _, _| {
            let mut session = MockInferenceSession::new();
            let output = output.clone();
            session
                .expect_predict()
                .returning(move |_, _| Ok(output.clone()));
            session.expect_close().returning(|| ());
            Ok(Box::new(session) as Box<dyn InferenceSession>)
        });
        loader
    }

    #[test]
    fn artifact_paths_use_basenames() {
        let dir = tempfile::tempdir().unwrap();
        let p = predictor(MockSessionLoader::new(), dir.path());
        assert!(p.work_dir().ends_with("caffe2/0.8.1/squeezenet/1.0"));
        assert_eq!(p.graph_path(), p.work_dir().join("predict_net.pb"));
        assert_eq!(p.weights_path(), p.work_dir().join("init_net.pb"));
        assert_eq!(p.features_path(), p.work_dir().join("squeezenet.features"));
    }

    #[test]
    fn features_file_name_is_filesystem_safe() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = MANIFEST.replace("name: SqueezeNet", "name: Inception v3/Caffe");
        let p = predictor_from_yaml(&yaml, MockSessionLoader::new(), dir.path());
        assert_eq!(
            p.features_path().file_name().unwrap(),
            "inception_v3_caffe.features"
        );
    }

    #[tokio::test]
    async fn preprocess_applies_manifest_mean() {
        let dir = tempfile::tempdir().unwrap();
        let p = predictor(MockSessionLoader::new(), dir.path());
        let image = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            2,
            2,
            image::Rgb([10, 20, 30]),
        ));
        let tensor = p.preprocess(image).await.unwrap();
        assert_eq!(&tensor.data()[0..4], &[29.0; 4]);
        assert_eq!(&tensor.data()[4..8], &[18.0; 4]);
        assert_eq!(&tensor.data()[8..12], &[7.0; 4]);
    }

    #[tokio::test]
    async fn predict_sorts_and_labels_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let p = predictor(loader_with_output(vec![0.1, 0.7, 0.2]), dir.path());
        write_labels(&p, "cat\ndog\nbird\n");

        let input = InputTensor::new(vec![0.0; 12], p.dims).unwrap();
        let features = p.predict(&input).await.unwrap();
        let names: Vec<_> = features.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["dog", "bird", "cat"]);
        assert_eq!(features.best().unwrap().index, 1);

        // session is loaded once and reused
        p.predict(&input).await.unwrap();
    }

    #[tokio::test]
    async fn more_outputs_than_labels_fails() {
        let dir = tempfile::tempdir().unwrap();
        let p = predictor(loader_with_output(vec![0.1, 0.7, 0.2]), dir.path());
        write_labels(&p, "cat\ndog\n");

        let input = InputTensor::new(vec![0.0; 12], p.dims).unwrap();
        let err = p.predict(&input).await.unwrap_err();
        assert!(matches!(
            err,
            VisionError::Manifest(DomainError::LabelMismatch { outputs: 3, labels: 2 })
        ));
    }

    #[tokio::test]
    async fn missing_labels_fail_prediction() {
        let dir = tempfile::tempdir().unwrap();
        let p = predictor(loader_with_output(vec![1.0]), dir.path());
        let input = InputTensor::new(vec![0.0; 12], p.dims).unwrap();
        let err = p.predict(&input).await.unwrap_err();
        assert!(matches!(err, VisionError::LabelsUnavailable { .. }));
    }

    #[tokio::test]
    async fn wrong_input_shape_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p = predictor(MockSessionLoader::new(), dir.path());
        let other = ImageDimensions::new(1, 3, 4, 4).unwrap();
        let input = InputTensor::new(vec![0.0; 48], other).unwrap();
        let err = p.predict(&input).await.unwrap_err();
        assert!(matches!(err, VisionError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_final() {
        let dir = tempfile::tempdir().unwrap();
        let p = predictor(loader_with_output(vec![0.5]), dir.path());
        write_labels(&p, "only\n");
        let input = InputTensor::new(vec![0.0; 12], p.dims).unwrap();
        p.predict(&input).await.unwrap();

        p.close().await.unwrap();
        p.close().await.unwrap();

        assert!(matches!(p.predict(&input).await, Err(VisionError::Closed(_))));
        assert!(matches!(p.download().await, Err(VisionError::Closed(_))));
    }

    #[tokio::test]
    async fn download_fetches_graph_before_labels() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source");
        std::fs::create_dir(&source).unwrap();
        let labels = source.join("labels.txt");
        std::fs::write(&labels, "cat\n").unwrap();
        let yaml = MANIFEST
            .replace("https://example.com/squeezenet", &source.display().to_string())
            .replace("labels.txt", &labels.display().to_string());
        let p = predictor_from_yaml(&yaml, MockSessionLoader::new(), &dir.path().join("work"));

        assert!(p.download().await.is_err());
        assert!(!p.features_path().exists());

        std::fs::write(source.join("predict_net.pb"), "graph").unwrap();
        std::fs::write(source.join("init_net.pb"), "weights").unwrap();
        p.download().await.unwrap();
        assert_eq!(std::fs::read_to_string(p.weights_path()).unwrap(), "weights");
        assert_eq!(std::fs::read_to_string(p.features_path()).unwrap(), "cat\n");
    }

    #[tokio::test]
    async fn download_requires_features_url() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = MANIFEST.replace("    features_url: labels.txt\n", "    other: x\n");
        let p = predictor_from_yaml(&yaml, MockSessionLoader::new(), dir.path());
        let err = p.download().await.unwrap_err();
        assert!(matches!(
            err,
            VisionError::Manifest(DomainError::MissingParameter(_))
        ));
    }
}
