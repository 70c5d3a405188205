//! FaceNet-style embedding extractor via ONNX Runtime.
//!
//! Converts a cropped face image into a 512-dimensional L2-unit-normalized
//! embedding. The pipeline is deterministic for a given image: resize to the
//! network's fixed input, rescale into [-1, 1], one forward pass, flatten,
//! normalize.

use crate::types::Embedding;
use image::{imageops, RgbImage};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const EMBEDDING_DIM: usize = 512;
const PIXEL_MEAN: f32 = 127.5;
const PIXEL_STD: f32 = 128.0;

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("model file not found: {0} — place the FaceNet ONNX export in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// FaceNet-style embedding extractor.
pub struct FaceEmbedder {
    session: Session,
    input_size: usize,
}

impl FaceEmbedder {
    /// Load the embedding ONNX model from the given path.
    pub fn load(model_path: &str, input_size: usize) -> Result<Self, EmbedderError> {
        if !Path::new(model_path).exists() {
            return Err(EmbedderError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            input_size,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded embedding model"
        );

        Ok(Self { session, input_size })
    }

    /// Extract a 512-dimensional embedding from a cropped face image.
    pub fn embed(&mut self, face: &RgbImage) -> Result<Embedding, EmbedderError> {
        let input = self.preprocess(face);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("embedding extraction: {e}")))?;

        let raw: Vec<f32> = raw_data.to_vec();

        if raw.len() != EMBEDDING_DIM {
            return Err(EmbedderError::InferenceFailed(format!(
                "expected {EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Embedding { values: l2_normalize(raw) })
    }

    /// Resize the crop and rescale pixels into the network's [-1, 1] range,
    /// producing a NCHW float tensor.
    fn preprocess(&self, face: &RgbImage) -> Array4<f32> {
        let size = self.input_size;
        let resized = imageops::resize(face, size as u32, size as u32, imageops::FilterType::Triangle);

        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] =
                    (f32::from(pixel.0[c]) - PIXEL_MEAN) / PIXEL_STD;
            }
        }

        tensor
    }
}

/// Scale a vector to unit L2 norm. A zero vector is returned unchanged.
pub fn l2_normalize(raw: Vec<f32>) -> Vec<f32> {
    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize_unit_norm() {
        let normalized = l2_normalize(vec![3.0, 4.0]);
        let norm: f32 = normalized.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let normalized = l2_normalize(vec![0.0, 0.0, 0.0]);
        assert_eq!(normalized, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_l2_normalize_already_unit() {
        let normalized = l2_normalize(vec![1.0, 0.0]);
        assert!((normalized[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_shape_and_range() {
        let embedder_input = 160usize;
        let face = RgbImage::from_pixel(200, 180, image::Rgb([128, 0, 255]));
        // Exercise the preprocess arithmetic without a session.
        let resized = imageops::resize(
            &face,
            embedder_input as u32,
            embedder_input as u32,
            imageops::FilterType::Triangle,
        );
        let mut tensor = Array4::<f32>::zeros((1, 3, embedder_input, embedder_input));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] =
                    (f32::from(pixel.0[c]) - PIXEL_MEAN) / PIXEL_STD;
            }
        }
        assert_eq!(tensor.shape(), &[1, 3, embedder_input, embedder_input]);
        // 128 → (128-127.5)/128, 0 → -127.5/128, 255 → 127.5/128
        assert!((tensor[[0, 0, 0, 0]] - 0.5 / 128.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 0, 0]] + 127.5 / 128.0).abs() < 1e-6);
        assert!((tensor[[0, 2, 0, 0]] - 127.5 / 128.0).abs() < 1e-6);
    }
}
