use crate::classifier::DecisionThresholds;
use crate::quality::QualityThresholds;
use std::path::PathBuf;

/// Engine configuration, loaded from `FACEPOINT_*` environment variables
/// with embedded defaults.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Directory holding the persisted gallery and classifier files.
    pub data_dir: PathBuf,
    /// Detection confidence threshold for the face detector.
    pub detection_threshold: f32,
    /// Margin in pixels added around a detected face before cropping.
    pub crop_margin: u32,
    /// Minimum calibrated top-class probability for a MULTI-state match.
    pub accept_threshold: f32,
    /// Minimum top-1 − top-2 probability separation for a MULTI-state match.
    pub min_probability_gap: f32,
    /// Minimum raw cosine similarity for a SINGLE-state match. Stricter than
    /// the general threshold since there is no second class to calibrate
    /// against.
    pub single_cosine_threshold: f32,
    /// Square input size of the embedding network.
    pub embed_input_size: usize,
    pub quality: QualityThresholds,
}

impl EngineConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("FACEPOINT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::var("XDG_DATA_HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| {
                        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                        PathBuf::from(home).join(".local/share")
                    })
                    .join("facepoint")
            });

        Self {
            model_dir: std::env::var("FACEPOINT_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("models")),
            data_dir,
            detection_threshold: env_f32("FACEPOINT_DETECTION_THRESHOLD", 0.5),
            crop_margin: env_u32("FACEPOINT_CROP_MARGIN", 20),
            accept_threshold: env_f32("FACEPOINT_ACCEPT_THRESHOLD", 0.7),
            min_probability_gap: env_f32("FACEPOINT_MIN_PROBABILITY_GAP", 0.1),
            single_cosine_threshold: env_f32("FACEPOINT_SINGLE_COSINE_THRESHOLD", 0.5),
            embed_input_size: env_usize("FACEPOINT_EMBED_INPUT_SIZE", 160),
            quality: QualityThresholds {
                sharpness_floor: env_f32("FACEPOINT_SHARPNESS_FLOOR", 100.0),
                brightness_min: env_f32("FACEPOINT_BRIGHTNESS_MIN", 50.0),
                brightness_max: env_f32("FACEPOINT_BRIGHTNESS_MAX", 200.0),
                contrast_floor: env_f32("FACEPOINT_CONTRAST_FLOOR", 20.0),
            },
        }
    }

    /// Path to the face detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join("yolov8n-face.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the embedding model.
    pub fn embedder_model_path(&self) -> String {
        self.model_dir
            .join("facenet512.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the persisted gallery (embedding matrix + labels).
    pub fn gallery_path(&self) -> PathBuf {
        self.data_dir.join("gallery.json")
    }

    /// Path to the persisted classifier snapshot (absent in EMPTY/SINGLE).
    pub fn classifier_path(&self) -> PathBuf {
        self.data_dir.join("classifier.json")
    }

    pub fn decision_thresholds(&self) -> DecisionThresholds {
        DecisionThresholds {
            accept: self.accept_threshold,
            min_gap: self.min_probability_gap,
            single_cosine: self.single_cosine_threshold,
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
