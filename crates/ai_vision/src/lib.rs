//! AI Vision - Image classification predictors
//!
//! Runs image-classification models described by YAML manifests: downloads
//! the graph, weights and label files, turns images into normalized tensors
//! and maps the model output back onto labelled classes. Predictors register
//! into a [`PredictorRegistry`] at start-up and inference runs on the tract
//! ONNX runtime.

pub mod caffe2;
pub mod config;
pub mod download;
pub mod error;
pub mod labels;
pub mod mean;
pub mod plugin;
pub mod ports;
pub mod preprocess;
pub mod registry;
pub mod service;
pub mod tract;

pub use caffe2::{ImagePredictor, ImagePredictorFactory};
pub use config::VisionConfig;
pub use download::ArtifactDownloader;
pub use error::VisionError;
pub use ports::{InferenceSession, InputTensor, Predictor, PredictorFactory, SessionLoader};
pub use preprocess::Normalization;
pub use registry::PredictorRegistry;
pub use service::{PredictionService, open_image};
pub use tract::TractSessionLoader;
