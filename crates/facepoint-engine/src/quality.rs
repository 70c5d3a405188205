//! Enrollment quality gate.
//!
//! Rejects face crops that would poison the gallery: blurred, too dark or
//! too bright, or near-uniform. Runs only during enrollment, never at probe
//! time.

use image::{imageops, RgbImage};
use imageproc::filter::laplacian_filter;
use thiserror::Error;

/// Floors and bounds for the three quality metrics.
#[derive(Debug, Clone)]
pub struct QualityThresholds {
    /// Minimum variance of the Laplacian response.
    pub sharpness_floor: f32,
    /// Acceptable mean grayscale brightness range.
    pub brightness_min: f32,
    pub brightness_max: f32,
    /// Minimum grayscale standard deviation.
    pub contrast_floor: f32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            sharpness_floor: 100.0,
            brightness_min: 50.0,
            brightness_max: 200.0,
            contrast_floor: 20.0,
        }
    }
}

/// Reason a crop failed the gate, with the measured value for diagnostics.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QualityIssue {
    #[error("too blurry: laplacian variance {measured:.1} < {floor:.1}")]
    TooBlurry { measured: f32, floor: f32 },
    #[error("too dark: mean brightness {mean:.1}")]
    TooDark { mean: f32 },
    #[error("too bright: mean brightness {mean:.1}")]
    TooBright { mean: f32 },
    #[error("low contrast: stddev {measured:.1} < {floor:.1}")]
    LowContrast { measured: f32, floor: f32 },
}

/// Check a face crop against the gate. Returns the first failing metric.
pub fn check(face: &RgbImage, thresholds: &QualityThresholds) -> Result<(), QualityIssue> {
    let gray = imageops::grayscale(face);
    let pixels: Vec<f32> = gray.pixels().map(|p| f32::from(p.0[0])).collect();

    let sharpness = laplacian_variance(&gray);
    if sharpness < thresholds.sharpness_floor {
        return Err(QualityIssue::TooBlurry {
            measured: sharpness,
            floor: thresholds.sharpness_floor,
        });
    }

    let mean = mean(&pixels);
    if mean < thresholds.brightness_min {
        return Err(QualityIssue::TooDark { mean });
    }
    if mean > thresholds.brightness_max {
        return Err(QualityIssue::TooBright { mean });
    }

    let spread = stddev(&pixels, mean);
    if spread < thresholds.contrast_floor {
        return Err(QualityIssue::LowContrast {
            measured: spread,
            floor: thresholds.contrast_floor,
        });
    }

    tracing::debug!(sharpness, mean, spread, "sample passed quality gate");
    Ok(())
}

/// Variance of the 3×3 Laplacian response — the sharpness metric.
fn laplacian_variance(gray: &image::GrayImage) -> f32 {
    let response = laplacian_filter(gray);
    let values: Vec<f32> = response.pixels().map(|p| f32::from(p.0[0])).collect();
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(&values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f32>() / values.len() as f32
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

fn stddev(values: &[f32], mean: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / values.len() as f32).sqrt()
}
