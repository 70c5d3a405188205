//! facepoint-engine — Face enrollment and recognition engine.
//!
//! Quality-gated, augmentation-backed enrollment into a versioned gallery
//! store, a two-regime identity classifier (cosine for one enrollee,
//! calibrated SVM for several), and the recognition facade consumed by the
//! attendance workflow.

pub mod augment;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod quality;
pub mod store;

pub use classifier::{ClassifierSnapshot, Decision, DecisionThresholds};
pub use config::EngineConfig;
pub use engine::{EngineStatus, EnrollReport, FaceEngine, GalleryState, IdentityId, Recognition};
pub use error::{EngineError, SampleRejection};
pub use store::GalleryStore;
