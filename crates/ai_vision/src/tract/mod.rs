//! Inference on the tract ONNX runtime
//!
//! Graph files must be ONNX exports of the model. When the graph keeps its
//! tensors as external data, the weights file has to sit next to it, which is
//! what the download layout produces.

mod session;

pub use session::{TractSession, TractSessionLoader};
