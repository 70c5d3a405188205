//! Synthetic enrollment augmentation.
//!
//! A handful of live captures cannot characterize intra-class variation, so
//! each accepted sample is expanded into six variants once at enrollment:
//! the original, ±5° rotations, ±10% brightness, and a horizontal mirror.

use image::{imageops, Rgb, RgbImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

/// Variants produced per accepted sample, original included.
pub const VARIANTS_PER_SAMPLE: usize = 6;

const ROTATION_DEGREES: f32 = 5.0;
const BRIGHTNESS_FACTOR: f32 = 0.1;

/// Expand one face crop into its six enrollment variants.
pub fn expand(face: &RgbImage) -> Vec<RgbImage> {
    let mut variants = Vec::with_capacity(VARIANTS_PER_SAMPLE);

    variants.push(face.clone());

    for degrees in [-ROTATION_DEGREES, ROTATION_DEGREES] {
        variants.push(rotate_about_center(
            face,
            degrees.to_radians(),
            Interpolation::Bilinear,
            Rgb([0, 0, 0]),
        ));
    }

    variants.push(scale_brightness(face, 1.0 + BRIGHTNESS_FACTOR));
    variants.push(scale_brightness(face, 1.0 - BRIGHTNESS_FACTOR));

    variants.push(imageops::flip_horizontal(face));

    variants
}

/// Multiply every channel by `factor`, clamping to [0, 255].
fn scale_brightness(face: &RgbImage, factor: f32) -> RgbImage {
    let mut out = face.clone();
    for pixel in out.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = (f32::from(*channel) * factor).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}
