//! facepoint-core — Face localization and embedding extraction.
//!
//! Uses a YOLOv8-face model for detection and a FaceNet-style network for
//! 512-dimensional embeddings, both running via ONNX Runtime on CPU.

pub mod detector;
pub mod embedder;
pub mod types;

pub use detector::FaceDetector;
pub use embedder::FaceEmbedder;
pub use types::{Embedding, FaceRegion};
