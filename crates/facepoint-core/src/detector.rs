//! YOLOv8-face detector via ONNX Runtime.
//!
//! Runs a single-class ultralytics face model with letterbox preprocessing
//! and NMS post-processing, and provides the margin crop used for both
//! enrollment and probe images.

use crate::types::FaceRegion;
use image::{imageops, RgbImage};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const YOLO_INPUT_SIZE: usize = 640;
const YOLO_NMS_THRESHOLD: f32 = 0.45;
/// Channels per anchor: [cx, cy, w, h, face_score]. Landmark-carrying
/// exports append extra channels, which are ignored.
const YOLO_BOX_ATTRS: usize = 5;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — place the YOLOv8-face ONNX export in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Metadata for coordinate de-mapping after letterbox resize.
struct LetterboxInfo {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// YOLOv8-face detector.
pub struct FaceDetector {
    session: Session,
    input_size: usize,
    confidence_threshold: f32,
}

impl FaceDetector {
    /// Load the YOLOv8-face ONNX model from the given path.
    ///
    /// Fails fast: a missing or unloadable model is fatal at startup rather
    /// than surfacing mid-recognition.
    pub fn load(model_path: &str, confidence_threshold: f32) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            threshold = confidence_threshold,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded YOLOv8-face model"
        );

        Ok(Self {
            session,
            input_size: YOLO_INPUT_SIZE,
            confidence_threshold,
        })
    }

    /// Detect faces in a frame, returning regions sorted by confidence.
    ///
    /// A frame with no faces yields an empty vector, never an error.
    pub fn detect(&mut self, frame: &RgbImage) -> Result<Vec<FaceRegion>, DetectorError> {
        let (input, letterbox) = self.preprocess(frame);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("detection output: {e}")))?;

        // Ultralytics exports channels-first: [1, attrs, anchors].
        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        if dims.len() != 3 || dims[1] < YOLO_BOX_ATTRS {
            return Err(DetectorError::InferenceFailed(format!(
                "unexpected detection output shape {dims:?}, need [1, >=5, anchors]"
            )));
        }
        let attrs = dims[1];
        let anchors = dims[2];

        let mut detections = decode_predictions(
            data,
            attrs,
            anchors,
            &letterbox,
            frame.width(),
            frame.height(),
            self.confidence_threshold,
        );

        detections = nms(detections, YOLO_NMS_THRESHOLD);
        detections.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        tracing::debug!(count = detections.len(), "faces detected");
        Ok(detections)
    }

    /// Detect and return the largest face by pixel area, if any.
    pub fn largest(&mut self, frame: &RgbImage) -> Result<Option<FaceRegion>, DetectorError> {
        let faces = self.detect(frame)?;
        Ok(faces.into_iter().max_by_key(FaceRegion::area))
    }

    /// Crop a face region from the frame, expanded by `margin` pixels on
    /// every side and clamped to frame bounds.
    ///
    /// Returns `None` when the clamped region has zero area.
    pub fn crop(frame: &RgbImage, region: &FaceRegion, margin: u32) -> Option<RgbImage> {
        let x1 = region.x1.saturating_sub(margin);
        let y1 = region.y1.saturating_sub(margin);
        let x2 = (region.x2 + margin).min(frame.width());
        let y2 = (region.y2 + margin).min(frame.height());

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some(imageops::crop_imm(frame, x1, y1, x2 - x1, y2 - y1).to_image())
    }

    /// Preprocess a frame into a NCHW float tensor with letterbox padding.
    fn preprocess(&self, frame: &RgbImage) -> (Array4<f32>, LetterboxInfo) {
        let (width, height) = (frame.width() as f32, frame.height() as f32);
        let size = self.input_size as f32;

        let scale = (size / width).min(size / height);
        let new_w = (width * scale).round() as u32;
        let new_h = (height * scale).round() as u32;
        let pad_x = (size - new_w as f32) / 2.0;
        let pad_y = (size - new_h as f32) / 2.0;

        let letterbox = LetterboxInfo { scale, pad_x, pad_y };

        let resized = imageops::resize(frame, new_w, new_h, imageops::FilterType::Triangle);

        let pad_x_start = pad_x.floor() as u32;
        let pad_y_start = pad_y.floor() as u32;

        let mut tensor = Array4::<f32>::zeros((1, 3, self.input_size, self.input_size));
        for (x, y, pixel) in resized.enumerate_pixels() {
            let ty = (y + pad_y_start) as usize;
            let tx = (x + pad_x_start) as usize;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = f32::from(pixel.0[c]) / 255.0;
            }
        }

        (tensor, letterbox)
    }
}

/// Decode channels-first YOLOv8 predictions into frame-space regions.
///
/// Layout: `data[attr * anchors + anchor]` with attrs = [cx, cy, w, h, score].
fn decode_predictions(
    data: &[f32],
    attrs: usize,
    anchors: usize,
    letterbox: &LetterboxInfo,
    frame_width: u32,
    frame_height: u32,
    threshold: f32,
) -> Vec<FaceRegion> {
    // Extra landmark channels beyond the score are ignored.
    debug_assert!(attrs >= YOLO_BOX_ATTRS);
    let mut detections = Vec::new();
    let at = |attr: usize, anchor: usize| data.get(attr * anchors + anchor).copied().unwrap_or(0.0);

    for anchor in 0..anchors {
        let score = at(4, anchor);
        if score < threshold {
            continue;
        }

        let cx = at(0, anchor);
        let cy = at(1, anchor);
        let w = at(2, anchor);
        let h = at(3, anchor);

        // Map from letterboxed space back to frame space.
        let x1 = (cx - w / 2.0 - letterbox.pad_x) / letterbox.scale;
        let y1 = (cy - h / 2.0 - letterbox.pad_y) / letterbox.scale;
        let x2 = (cx + w / 2.0 - letterbox.pad_x) / letterbox.scale;
        let y2 = (cy + h / 2.0 - letterbox.pad_y) / letterbox.scale;

        let x1 = x1.max(0.0).round() as u32;
        let y1 = y1.max(0.0).round() as u32;
        let x2 = (x2.round() as u32).min(frame_width).max(x1);
        let y2 = (y2.round() as u32).min(frame_height).max(y1);

        detections.push(FaceRegion {
            x1,
            y1,
            x2,
            y2,
            confidence: score,
        });
    }

    detections
}

/// Non-Maximum Suppression: remove overlapping detections.
fn nms(mut detections: Vec<FaceRegion>, iou_threshold: f32) -> Vec<FaceRegion> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(detections[i].clone());

        for j in (i + 1)..detections.len() {
            if suppressed[j] {
                continue;
            }
            if iou(&detections[i], &detections[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Intersection-over-Union between two regions.
fn iou(a: &FaceRegion, b: &FaceRegion) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2.saturating_sub(x1) as f32) * (y2.saturating_sub(y1) as f32);
    let area_a = a.area() as f32;
    let area_b = b.area() as f32;
    let union = area_a + area_b - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_region(x1: u32, y1: u32, x2: u32, y2: u32, conf: f32) -> FaceRegion {
        FaceRegion { x1, y1, x2, y2, confidence: conf }
    }

    #[test]
    fn test_iou_identical() {
        let a = make_region(0, 0, 100, 100, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = make_region(0, 0, 10, 10, 1.0);
        let b = make_region(20, 20, 30, 30, 1.0);
        assert!(iou(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_iou_partial() {
        let a = make_region(0, 0, 10, 10, 1.0);
        let b = make_region(5, 0, 15, 10, 1.0);
        // Overlap: 5x10 = 50, union: 100+100-50 = 150
        let expected = 50.0 / 150.0;
        assert!((iou(&a, &b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_nms_suppresses_overlapping() {
        let detections = vec![
            make_region(0, 0, 100, 100, 0.9),
            make_region(5, 5, 105, 105, 0.8),
            make_region(200, 200, 250, 250, 0.7),
        ];
        let result = nms(detections, 0.45);
        assert_eq!(result.len(), 2);
        assert!((result[0].confidence - 0.9).abs() < 1e-6);
        assert!((result[1].confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(vec![], 0.45).is_empty());
    }

    #[test]
    fn test_decode_filters_by_confidence() {
        // Two anchors, channels-first [cx, cy, w, h, score] × 2
        let anchors = 2;
        let data = vec![
            320.0, 320.0, // cx
            320.0, 320.0, // cy
            100.0, 100.0, // w
            100.0, 100.0, // h
            0.9, 0.3, // score
        ];
        let letterbox = LetterboxInfo { scale: 1.0, pad_x: 0.0, pad_y: 0.0 };
        let dets = decode_predictions(&data, 5, anchors, &letterbox, 640, 640, 0.5);
        assert_eq!(dets.len(), 1);
        assert!((dets[0].confidence - 0.9).abs() < 1e-6);
        assert_eq!(dets[0].x1, 270);
        assert_eq!(dets[0].x2, 370);
    }

    #[test]
    fn test_decode_clamps_to_frame() {
        let data = vec![5.0, 5.0, 100.0, 100.0, 0.9];
        let letterbox = LetterboxInfo { scale: 1.0, pad_x: 0.0, pad_y: 0.0 };
        let dets = decode_predictions(&data, 5, 1, &letterbox, 640, 480, 0.5);
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].x1, 0);
        assert_eq!(dets[0].y1, 0);
    }

    #[test]
    fn test_decode_undoes_letterbox() {
        // Frame 320x240 scaled by 2.0 into 640x640 leaves pad_y = (640-480)/2.
        let letterbox = LetterboxInfo { scale: 2.0, pad_x: 0.0, pad_y: 80.0 };
        let data = vec![200.0, 280.0, 100.0, 100.0, 0.9];
        let dets = decode_predictions(&data, 5, 1, &letterbox, 320, 240, 0.5);
        assert_eq!(dets.len(), 1);
        // cx=200 → frame x ∈ [(200-50)/2, (200+50)/2] = [75, 125]
        assert_eq!(dets[0].x1, 75);
        assert_eq!(dets[0].x2, 125);
        // cy=280 → frame y ∈ [(280-50-80)/2, (280+50-80)/2] = [75, 125]
        assert_eq!(dets[0].y1, 75);
        assert_eq!(dets[0].y2, 125);
    }

    #[test]
    fn test_crop_with_margin_clamped() {
        let frame = RgbImage::from_pixel(100, 100, image::Rgb([50, 50, 50]));
        let region = make_region(10, 10, 90, 90, 0.9);
        let crop = FaceDetector::crop(&frame, &region, 20).unwrap();
        // x1 = 10-20 clamps to 0, x2 = 90+20 clamps to 100
        assert_eq!(crop.width(), 100);
        assert_eq!(crop.height(), 100);
    }

    #[test]
    fn test_crop_degenerate_region() {
        let frame = RgbImage::from_pixel(100, 100, image::Rgb([50, 50, 50]));
        let region = make_region(100, 100, 100, 100, 0.9);
        assert!(FaceDetector::crop(&frame, &region, 0).is_none());
    }

    #[test]
    fn test_crop_zero_margin() {
        let frame = RgbImage::from_pixel(64, 64, image::Rgb([10, 20, 30]));
        let region = make_region(8, 16, 40, 48, 0.9);
        let crop = FaceDetector::crop(&frame, &region, 0).unwrap();
        assert_eq!(crop.width(), 32);
        assert_eq!(crop.height(), 32);
    }
}
