//! Recognition facade and enrollment lifecycle.
//!
//! `FaceEngine` is the only entry point consumed by the attendance
//! workflow: it orchestrates detector → embedder → classifier for probes
//! and runs the gate → augment → embed → commit pipeline for enrollment.
//! It is an explicitly constructed service object; there is no global
//! lazily-initialized model state.

use crate::augment;
use crate::classifier::{ClassifierSnapshot, Decision};
use crate::config::EngineConfig;
use crate::error::{EngineError, SampleRejection};
use crate::quality;
use crate::store::GalleryStore;
use facepoint_core::{Embedding, FaceDetector, FaceEmbedder};
use image::RgbImage;
use std::path::PathBuf;
use std::sync::Arc;

/// String-typed identity at the engine boundary.
///
/// The store keeps labels as strings; conversion to the external numeric
/// user id happens here, failing explicitly instead of silently reporting
/// no-match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityId(String);

impl IdentityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to the external numeric user identifier.
    pub fn as_user_id(&self) -> Result<i64, EngineError> {
        self.0
            .trim()
            .parse()
            .map_err(|_| EngineError::IdentityParse(self.0.clone()))
    }
}

impl std::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Probe outcome. Always well-formed: probe-time failures collapse to
/// `(None, 0.0)` so the attendance workflow never sees an error here.
#[derive(Debug, Clone)]
pub struct Recognition {
    pub identity: Option<IdentityId>,
    pub confidence: f32,
}

impl Recognition {
    fn no_match() -> Self {
        Self { identity: None, confidence: 0.0 }
    }

    fn from_decision(decision: Decision) -> Self {
        Self {
            identity: decision.label.map(IdentityId::new),
            confidence: decision.confidence,
        }
    }
}

/// What happened during an enrollment call.
#[derive(Debug)]
pub struct EnrollReport {
    /// Raw samples that passed detection and the quality gate.
    pub accepted_samples: usize,
    /// Per-sample rejections (index into the submitted images).
    pub rejected: Vec<(usize, SampleRejection)>,
    /// Embedding rows appended to the store (accepted × variants).
    pub stored_rows: usize,
}

/// Health/diagnostics summary.
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub enrolled_identities: usize,
    pub stored_embeddings: usize,
    pub state: &'static str,
}

/// Gallery plus its derived classifier, committed as one unit.
///
/// Every mutation builds the next store and snapshot in memory, persists
/// both atomically, and only then swaps the in-memory state — so a failure
/// anywhere leaves the previous on-disk state authoritative.
#[derive(Debug)]
pub struct GalleryState {
    store: GalleryStore,
    snapshot: Arc<ClassifierSnapshot>,
    gallery_path: PathBuf,
    classifier_path: PathBuf,
}

impl GalleryState {
    /// Load the persisted gallery (empty on first start) and derive the
    /// classifier. A corrupt gallery fails closed here.
    pub fn load(gallery_path: PathBuf, classifier_path: PathBuf) -> Result<Self, EngineError> {
        let store = GalleryStore::load(&gallery_path)?;
        let snapshot = Arc::new(ClassifierSnapshot::load_or_train(&store, &classifier_path));
        Ok(Self { store, snapshot, gallery_path, classifier_path })
    }

    /// Current immutable classifier snapshot. Cheap to clone; a holder
    /// observes either the fully old or fully new classifier.
    pub fn snapshot(&self) -> Arc<ClassifierSnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            enrolled_identities: self.store.identity_count(),
            stored_embeddings: self.store.len(),
            state: self.snapshot.state_name(),
        }
    }

    /// Append embeddings for one identity, retrain, persist, swap.
    pub fn commit_enroll(
        &mut self,
        identity: &IdentityId,
        rows: &[Embedding],
    ) -> Result<usize, EngineError> {
        if rows.is_empty() {
            return Err(EngineError::EnrollmentRejected { reasons: Vec::new() });
        }

        let mut next_store = self.store.clone();
        next_store.append(identity.as_str(), rows);
        let next_snapshot = ClassifierSnapshot::train(&next_store);

        self.commit(next_store, next_snapshot)?;
        tracing::info!(
            identity = %identity,
            rows = rows.len(),
            total = self.store.len(),
            state = self.snapshot.state_name(),
            "enrollment committed"
        );
        Ok(rows.len())
    }

    /// Remove all rows for an identity, retrain-or-clear, persist, swap.
    /// Unknown identity is a zero-effect success with no disk churn.
    pub fn commit_remove(&mut self, identity: &IdentityId) -> Result<usize, EngineError> {
        let mut next_store = self.store.clone();
        let removed = next_store.remove_label(identity.as_str());
        if removed == 0 {
            tracing::debug!(identity = %identity, "remove: identity not enrolled, no-op");
            return Ok(0);
        }

        let next_snapshot = ClassifierSnapshot::train(&next_store);
        self.commit(next_store, next_snapshot)?;
        tracing::info!(
            identity = %identity,
            removed,
            state = self.snapshot.state_name(),
            "removal committed"
        );
        Ok(removed)
    }

    /// Persist the candidate state, then swap it in. Disk first: if either
    /// write fails the in-memory state is untouched and the previous files
    /// (written via temp + rename) remain intact.
    fn commit(
        &mut self,
        next_store: GalleryStore,
        next_snapshot: ClassifierSnapshot,
    ) -> Result<(), EngineError> {
        next_store.save(&self.gallery_path)?;
        next_snapshot.save(&self.classifier_path)?;
        self.store = next_store;
        self.snapshot = Arc::new(next_snapshot);
        Ok(())
    }
}

/// The Face Recognition & Enrollment Engine.
pub struct FaceEngine {
    detector: FaceDetector,
    embedder: FaceEmbedder,
    gallery: GalleryState,
    config: EngineConfig,
}

impl FaceEngine {
    /// Construct the engine: load both models (fail-fast — recognition
    /// cannot proceed without them) and the persisted gallery.
    pub fn open(config: EngineConfig) -> Result<Self, EngineError> {
        let detector =
            FaceDetector::load(&config.detector_model_path(), config.detection_threshold)?;
        let embedder = FaceEmbedder::load(&config.embedder_model_path(), config.embed_input_size)?;
        let gallery = GalleryState::load(config.gallery_path(), config.classifier_path())?;

        tracing::info!(
            identities = gallery.status().enrolled_identities,
            rows = gallery.status().stored_embeddings,
            state = gallery.status().state,
            "face engine ready"
        );

        Ok(Self { detector, embedder, gallery, config })
    }

    /// Recognize the largest face in a frame.
    ///
    /// Detection or crop failure yields no-match independent of classifier
    /// logic; inference failures are logged and collapse to no-match.
    pub fn recognize_best(&mut self, frame: &RgbImage) -> Recognition {
        let region = match self.detector.largest(frame) {
            Ok(Some(region)) => region,
            Ok(None) => {
                tracing::debug!("probe: no face detected");
                return Recognition::no_match();
            }
            Err(e) => {
                tracing::warn!(error = %e, "probe: detection failed");
                return Recognition::no_match();
            }
        };

        let Some(crop) = FaceDetector::crop(frame, &region, self.config.crop_margin) else {
            tracing::debug!("probe: degenerate crop");
            return Recognition::no_match();
        };

        let embedding = match self.embedder.embed(&crop) {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!(error = %e, "probe: embedding failed");
                return Recognition::no_match();
            }
        };

        let snapshot = self.gallery.snapshot();
        let decision = snapshot.classify(&embedding, &self.config.decision_thresholds());
        Recognition::from_decision(decision)
    }

    /// Enroll an identity from raw captured images.
    ///
    /// Pipeline: detect + crop each image → quality gate → augment accepted
    /// samples → embed every variant → commit (append, retrain, persist)
    /// as one unit. Fails with per-sample reasons when nothing passes the
    /// gate; any failure before the final persist leaves prior on-disk
    /// state authoritative.
    pub fn enroll(
        &mut self,
        identity: &IdentityId,
        images: &[RgbImage],
    ) -> Result<EnrollReport, EngineError> {
        let mut accepted: Vec<RgbImage> = Vec::new();
        let mut rejected: Vec<(usize, SampleRejection)> = Vec::new();

        for (index, image) in images.iter().enumerate() {
            let Some(region) = self.detector.largest(image)? else {
                rejected.push((index, SampleRejection::NoFace));
                continue;
            };
            let Some(crop) = FaceDetector::crop(image, &region, self.config.crop_margin) else {
                rejected.push((index, SampleRejection::DegenerateCrop));
                continue;
            };
            match quality::check(&crop, &self.config.quality) {
                Ok(()) => accepted.push(crop),
                Err(issue) => rejected.push((index, issue.into())),
            }
        }

        if accepted.is_empty() {
            tracing::warn!(
                identity = %identity,
                submitted = images.len(),
                "enrollment rejected: no sample passed the quality gate"
            );
            return Err(EngineError::EnrollmentRejected { reasons: rejected });
        }

        let embedder = &mut self.embedder;
        enroll_accepted(&mut self.gallery, identity, accepted, rejected, |variant| {
            embedder.embed(variant).map_err(EngineError::from)
        })
    }

    /// Remove all face data for an identity. Unknown identity is a
    /// zero-effect success.
    pub fn remove(&mut self, identity: &IdentityId) -> Result<usize, EngineError> {
        self.gallery.commit_remove(identity)
    }

    /// Replace an identity's face data wholesale.
    pub fn re_enroll(
        &mut self,
        identity: &IdentityId,
        images: &[RgbImage],
    ) -> Result<EnrollReport, EngineError> {
        self.gallery.commit_remove(identity)?;
        self.enroll(identity, images)
    }

    pub fn status(&self) -> EngineStatus {
        self.gallery.status()
    }
}

/// Augment the gated samples, embed every variant, then commit as one
/// unit. All rows are produced before the gallery is touched, so an
/// embedding failure on any variant leaves prior on-disk state
/// authoritative.
fn enroll_accepted<F>(
    gallery: &mut GalleryState,
    identity: &IdentityId,
    accepted: Vec<RgbImage>,
    rejected: Vec<(usize, SampleRejection)>,
    mut embed: F,
) -> Result<EnrollReport, EngineError>
where
    F: FnMut(&RgbImage) -> Result<Embedding, EngineError>,
{
    let mut rows: Vec<Embedding> =
        Vec::with_capacity(accepted.len() * augment::VARIANTS_PER_SAMPLE);
    for crop in &accepted {
        for variant in augment::expand(crop) {
            rows.push(embed(&variant)?);
        }
    }

    let stored_rows = gallery.commit_enroll(identity, &rows)?;

    Ok(EnrollReport {
        accepted_samples: accepted.len(),
        rejected,
        stored_rows,
    })
}
