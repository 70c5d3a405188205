use serde::{Deserialize, Serialize};

/// Axis-aligned face bounding box in frame coordinates.
///
/// Coordinates are clamped to the frame by the detector, so
/// `x1 <= x2 <= width` and `y1 <= y2 <= height` always hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
    /// Detection confidence in [0, 1].
    pub confidence: f32,
}

impl FaceRegion {
    /// Pixel area of the region.
    pub fn area(&self) -> u64 {
        u64::from(self.x2.saturating_sub(self.x1)) * u64::from(self.y2.saturating_sub(self.y1))
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }
}

/// Face embedding vector (512-dimensional, L2-unit-normalized).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    /// Cosine similarity between two embeddings.
    ///
    /// Returns a value in [-1, 1]. Higher = more similar. Always traverses
    /// every dimension; a zero vector yields 0.0.
    pub fn cosine(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            dot / denom
        } else {
            0.0
        }
    }
}
