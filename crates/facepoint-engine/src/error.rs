use crate::quality::QualityIssue;
use thiserror::Error;

/// Why a single enrollment sample was rejected before reaching the store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SampleRejection {
    #[error("no face detected")]
    NoFace,
    #[error("face crop has zero area")]
    DegenerateCrop,
    #[error("{0}")]
    Quality(#[from] QualityIssue),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("detector: {0}")]
    Detector(#[from] facepoint_core::detector::DetectorError),
    #[error("embedder: {0}")]
    Embedder(#[from] facepoint_core::embedder::EmbedderError),
    /// Zero samples passed the quality gate. Carries the per-sample reasons
    /// so the caller can ask the user to recapture.
    #[error("enrollment rejected: no sample passed the quality gate ({})",
        .reasons.iter().map(|(i, r)| format!("sample {i}: {r}")).collect::<Vec<_>>().join("; "))]
    EnrollmentRejected { reasons: Vec<(usize, SampleRejection)> },
    /// Persisted gallery is inconsistent. Fail closed: recognition refuses
    /// to run until re-enrollment.
    #[error("gallery store corrupted: {0}")]
    StoreCorrupted(String),
    #[error("identity label {0:?} is not a valid numeric user id")]
    IdentityParse(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),
}
