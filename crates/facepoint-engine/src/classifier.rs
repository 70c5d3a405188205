//! Identity classifier: a state machine over gallery size.
//!
//! EMPTY  — no probe ever matches.
//! SINGLE — one enrolled identity; a discriminative boundary is meaningless
//!          with one class, so the decision is maximum cosine similarity
//!          against that identity's stored rows under a stricter threshold.
//! MULTI  — a margin-based one-vs-rest linear SVM with per-class Platt
//!          sigmoid calibration, retrained from scratch on every mutation.
//!          Acceptance requires both a calibrated top probability above the
//!          acceptance threshold and a minimum top-1/top-2 separation:
//!          calibration on small per-identity sample counts is noisy, and a
//!          near-tie is a stronger misclassification signal than absolute
//!          probability alone.
//!
//! Snapshots are immutable; mutations build a new snapshot and swap it
//! whole, so a reader never observes a half-updated model.

use crate::error::EngineError;
use crate::store::{labels_match, write_atomic, GalleryStore};
use facepoint_core::Embedding;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Fixed seed for epoch shuffling: retraining must be reproducible so that
/// remove-then-re-enroll yields the same decisions.
const TRAIN_SEED: u64 = 0xFACE_0101;
const PEGASOS_EPOCHS: usize = 40;
const PEGASOS_LAMBDA: f32 = 0.01;

/// Thresholds applied at decision time (not baked into the trained model).
#[derive(Debug, Clone, Copy)]
pub struct DecisionThresholds {
    /// Minimum calibrated top-class probability (MULTI).
    pub accept: f32,
    /// Minimum top-1 − top-2 probability separation (MULTI).
    pub min_gap: f32,
    /// Minimum raw cosine similarity (SINGLE).
    pub single_cosine: f32,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self { accept: 0.7, min_gap: 0.1, single_cosine: 0.5 }
    }
}

/// Outcome of classifying one probe embedding.
#[derive(Debug, Clone)]
pub struct Decision {
    /// Matched identity label, `None` for no-match. The confidence is
    /// reported either way for diagnostics.
    pub label: Option<String>,
    pub confidence: f32,
    /// Top-1 − top-2 probability separation (MULTI only).
    pub gap: Option<f32>,
}

impl Decision {
    pub fn no_match() -> Self {
        Self { label: None, confidence: 0.0, gap: None }
    }
}

/// Immutable classifier state, always derived from a gallery snapshot.
#[derive(Debug, Clone)]
pub enum ClassifierSnapshot {
    Empty,
    Single {
        label: String,
        /// That identity's stored rows, copied so the snapshot is
        /// self-contained.
        references: Vec<Vec<f32>>,
    },
    Multi(SvmModel),
}

impl ClassifierSnapshot {
    /// Derive the classifier regime from the gallery and train if needed.
    pub fn train(store: &GalleryStore) -> Self {
        match store.identity_count() {
            0 => ClassifierSnapshot::Empty,
            1 => {
                let label = store.distinct_labels()[0].to_string();
                let references = store.rows_for(&label).iter().map(|r| r.to_vec()).collect();
                tracing::info!(%label, rows = store.len(), "single-identity snapshot built");
                ClassifierSnapshot::Single { label, references }
            }
            n => {
                let model = SvmModel::train(store.rows(), store.labels());
                tracing::info!(classes = n, rows = store.len(), "multi-class model trained");
                ClassifierSnapshot::Multi(model)
            }
        }
    }

    pub fn state_name(&self) -> &'static str {
        match self {
            ClassifierSnapshot::Empty => "empty",
            ClassifierSnapshot::Single { .. } => "single",
            ClassifierSnapshot::Multi(_) => "multi",
        }
    }

    /// Classify a probe embedding under the given thresholds.
    pub fn classify(&self, probe: &Embedding, thresholds: &DecisionThresholds) -> Decision {
        match self {
            ClassifierSnapshot::Empty => Decision::no_match(),

            ClassifierSnapshot::Single { label, references } => {
                let best = references
                    .iter()
                    .map(|r| cosine(&probe.values, r))
                    .fold(f32::NEG_INFINITY, f32::max);
                let best = if best == f32::NEG_INFINITY { 0.0 } else { best };

                // Remap [-1, 1] similarity into a [0, 1] confidence; the
                // acceptance test uses the raw similarity.
                let confidence = (best + 1.0) / 2.0;
                let accepted = best >= thresholds.single_cosine;
                tracing::debug!(
                    %label,
                    similarity = best,
                    threshold = thresholds.single_cosine,
                    accepted,
                    "single-identity decision"
                );

                Decision {
                    label: accepted.then(|| label.clone()),
                    confidence,
                    gap: None,
                }
            }

            ClassifierSnapshot::Multi(model) => {
                let probs = model.probabilities(&probe.values);

                let (top_idx, top_p) = argmax(&probs);
                let runner_p = probs
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != top_idx)
                    .map(|(_, &p)| p)
                    .fold(0.0f32, f32::max);
                let gap = top_p - runner_p;

                let accepted = top_p >= thresholds.accept && gap >= thresholds.min_gap;
                tracing::debug!(
                    top = %model.classes[top_idx],
                    top_probability = top_p,
                    runner_up = runner_p,
                    gap,
                    accept_threshold = thresholds.accept,
                    min_gap = thresholds.min_gap,
                    accepted,
                    "multi-class decision"
                );

                Decision {
                    label: accepted.then(|| model.classes[top_idx].clone()),
                    confidence: top_p,
                    gap: Some(gap),
                }
            }
        }
    }

    /// Persist the trained model, or remove the file in EMPTY/SINGLE where
    /// no discriminative model exists.
    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        match self {
            ClassifierSnapshot::Multi(model) => {
                write_atomic(path, &serde_json::to_vec(model)?)?;
                tracing::debug!(path = %path.display(), "classifier persisted");
            }
            _ => match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }

    /// Rebuild the snapshot for a loaded gallery, reusing the persisted
    /// model when it is consistent with the store and retraining otherwise.
    pub fn load_or_train(store: &GalleryStore, path: &Path) -> Self {
        if store.identity_count() >= 2 && path.exists() {
            if let Ok(bytes) = fs::read(path) {
                if let Ok(model) = serde_json::from_slice::<SvmModel>(&bytes) {
                    let mut stored: Vec<&str> = store.distinct_labels();
                    stored.sort_unstable();
                    let mut trained: Vec<&str> =
                        model.classes.iter().map(String::as_str).collect();
                    trained.sort_unstable();
                    // Both the class set and the row count must match: rows
                    // added for an already-enrolled identity shift the
                    // decision boundary without changing any class name.
                    if stored == trained && model.trained_rows == store.len() {
                        tracing::info!(path = %path.display(), "classifier snapshot reused");
                        return ClassifierSnapshot::Multi(model);
                    }
                    tracing::warn!(
                        path = %path.display(),
                        "persisted classifier is stale relative to the gallery, retraining"
                    );
                }
            }
        }
        Self::train(store)
    }
}

/// One-vs-rest linear SVM with per-class Platt sigmoid calibration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmModel {
    pub classes: Vec<String>,
    /// Gallery row count the model was trained on. A persisted model is
    /// only reusable while the gallery still has exactly these rows; a
    /// mutation that grows an already-known class changes no class name,
    /// so the class list alone cannot detect staleness.
    trained_rows: usize,
    /// One weight vector per class.
    weights: Vec<Vec<f32>>,
    biases: Vec<f32>,
    /// Per-class sigmoid (a, b): p = 1 / (1 + exp(a·d + b)).
    platt: Vec<(f32, f32)>,
}

impl SvmModel {
    /// Train one-vs-rest Pegasos classifiers over all current rows, then
    /// fit a Platt sigmoid per class on the training decision values.
    /// Synchronous and blocking; galleries are small.
    pub fn train(rows: &[Vec<f32>], labels: &[String]) -> Self {
        // Labels that only differ in numeric form ("007" vs "7") are one
        // class, consistent with the gallery's identity counting.
        let classes: Vec<String> = {
            let mut seen: Vec<String> = Vec::new();
            for label in labels {
                if !seen.iter().any(|s| labels_match(s, label)) {
                    seen.push(label.clone());
                }
            }
            seen
        };

        let mut weights = Vec::with_capacity(classes.len());
        let mut biases = Vec::with_capacity(classes.len());
        let mut platt = Vec::with_capacity(classes.len());

        for (k, class) in classes.iter().enumerate() {
            let targets: Vec<bool> = labels.iter().map(|l| labels_match(l, class)).collect();
            let (w, b) = pegasos(rows, &targets, TRAIN_SEED.wrapping_add(k as u64));

            let decisions: Vec<f32> = rows.iter().map(|x| dot(&w, x) + b).collect();
            let sigmoid = fit_sigmoid(&decisions, &targets);

            weights.push(w);
            biases.push(b);
            platt.push(sigmoid);
        }

        Self { classes, trained_rows: rows.len(), weights, biases, platt }
    }

    /// Calibrated per-class probabilities, normalized to sum to 1, aligned
    /// with `self.classes`.
    pub fn probabilities(&self, x: &[f32]) -> Vec<f32> {
        let mut probs: Vec<f32> = (0..self.classes.len())
            .map(|k| {
                let d = dot(&self.weights[k], x) + self.biases[k];
                let (a, b) = self.platt[k];
                1.0 / (1.0 + (a * d + b).exp())
            })
            .collect();

        let sum: f32 = probs.iter().sum();
        if sum > 0.0 {
            for p in probs.iter_mut() {
                *p /= sum;
            }
        } else {
            let uniform = 1.0 / probs.len().max(1) as f32;
            probs.iter_mut().for_each(|p| *p = uniform);
        }
        probs
    }
}

/// Pegasos subgradient training for a single binary margin classifier.
///
/// Deterministic for a given seed: epoch order is shuffled with a seeded
/// RNG and the learning-rate schedule is fixed.
fn pegasos(rows: &[Vec<f32>], targets: &[bool], seed: u64) -> (Vec<f32>, f32) {
    let dim = rows.first().map_or(0, Vec::len);
    let mut w = vec![0.0f32; dim];
    let mut b = 0.0f32;

    let mut order: Vec<usize> = (0..rows.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut t = 0usize;

    for _ in 0..PEGASOS_EPOCHS {
        order.shuffle(&mut rng);
        for &i in &order {
            t += 1;
            let eta = 1.0 / (PEGASOS_LAMBDA * t as f32);
            let y = if targets[i] { 1.0f32 } else { -1.0f32 };

            let margin = y * (dot(&w, &rows[i]) + b);
            let shrink = 1.0 - eta * PEGASOS_LAMBDA;
            for wj in w.iter_mut() {
                *wj *= shrink;
            }
            if margin < 1.0 {
                for (wj, xj) in w.iter_mut().zip(rows[i].iter()) {
                    *wj += eta * y * xj;
                }
                b += eta * y;
            }
        }
    }

    (w, b)
}

/// Platt's sigmoid fit (Lin–Weng–Keerthi variant): find (a, b) minimizing
/// the cross-entropy of p = 1/(1+exp(a·d + b)) against smoothed targets.
fn fit_sigmoid(decisions: &[f32], targets: &[bool]) -> (f32, f32) {
    let n = decisions.len();
    let prior1 = targets.iter().filter(|&&t| t).count() as f64;
    let prior0 = n as f64 - prior1;

    let hi = (prior1 + 1.0) / (prior1 + 2.0);
    let lo = 1.0 / (prior0 + 2.0);
    let t: Vec<f64> = targets.iter().map(|&p| if p { hi } else { lo }).collect();
    let d: Vec<f64> = decisions.iter().map(|&v| f64::from(v)).collect();

    let mut a = 0.0f64;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();

    let objective = |a: f64, b: f64| -> f64 {
        let mut f = 0.0;
        for i in 0..n {
            let fapb = d[i] * a + b;
            f += if fapb >= 0.0 {
                t[i] * fapb + (1.0 + (-fapb).exp()).ln()
            } else {
                (t[i] - 1.0) * fapb + (1.0 + fapb.exp()).ln()
            };
        }
        f
    };

    let mut fval = objective(a, b);
    const MAX_ITER: usize = 100;
    const MIN_STEP: f64 = 1e-10;
    const SIGMA: f64 = 1e-12;

    for _ in 0..MAX_ITER {
        // Gradient and Hessian of the cross-entropy objective.
        let (mut h11, mut h22) = (SIGMA, SIGMA);
        let mut h21 = 0.0;
        let (mut g1, mut g2) = (0.0, 0.0);

        for i in 0..n {
            let fapb = d[i] * a + b;
            let (p, q) = if fapb >= 0.0 {
                let e = (-fapb).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = fapb.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let w = p * q;
            h11 += d[i] * d[i] * w;
            h22 += w;
            h21 += d[i] * w;
            let diff = t[i] - p;
            g1 += d[i] * diff;
            g2 += diff;
        }

        if g1.abs() < 1e-5 && g2.abs() < 1e-5 {
            break;
        }

        // Newton direction with backtracking line search.
        let det = h11 * h22 - h21 * h21;
        let da = -(h22 * g1 - h21 * g2) / det;
        let db = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * da + g2 * db;

        let mut step = 1.0f64;
        let mut stepped = false;
        while step >= MIN_STEP {
            let new_a = a + step * da;
            let new_b = b + step * db;
            let new_f = objective(new_a, new_b);
            if new_f < fval + 1e-4 * step * gd {
                a = new_a;
                b = new_b;
                fval = new_f;
                stepped = true;
                break;
            }
            step /= 2.0;
        }
        if !stepped {
            break;
        }
    }

    (a as f32, b as f32)
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot = dot(a, b);
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = na * nb;
    if denom > 0.0 {
        dot / denom
    } else {
        0.0
    }
}

fn argmax(values: &[f32]) -> (usize, f32) {
    let mut best = (0usize, f32::NEG_INFINITY);
    for (i, &v) in values.iter().enumerate() {
        if v > best.1 {
            best = (i, v);
        }
    }
    (best.0, if best.1 == f32::NEG_INFINITY { 0.0 } else { best.1 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use facepoint_core::embedder::l2_normalize;

    const DIM: usize = 8;

    /// Unit vector concentrated on `axis` with a small deterministic
    /// perturbation, mimicking a cluster of embeddings for one identity.
    fn clustered(axis: usize, jitter: usize, spread: f32) -> Vec<f32> {
        let mut v = vec![0.0f32; DIM];
        v[axis] = 1.0;
        v[(axis + 1 + jitter) % DIM] += spread * (1.0 + jitter as f32 * 0.3);
        l2_normalize(v)
    }

    fn emb(values: Vec<f32>) -> Embedding {
        Embedding { values }
    }

    fn populate(store: &mut GalleryStore, label: &str, axis: usize, count: usize, spread: f32) {
        let rows: Vec<Embedding> = (0..count)
            .map(|j| emb(clustered(axis, j, spread)))
            .collect();
        store.append(label, &rows);
    }

    fn two_class_store() -> GalleryStore {
        let mut store = GalleryStore::new();
        populate(&mut store, "7", 0, 12, 0.05);
        populate(&mut store, "9", 4, 12, 0.05);
        store
    }

    #[test]
    fn test_state_from_identity_count() {
        let mut store = GalleryStore::new();
        assert_eq!(ClassifierSnapshot::train(&store).state_name(), "empty");
        populate(&mut store, "7", 0, 3, 0.05);
        assert_eq!(ClassifierSnapshot::train(&store).state_name(), "single");
        populate(&mut store, "9", 4, 3, 0.05);
        assert_eq!(ClassifierSnapshot::train(&store).state_name(), "multi");
    }

    #[test]
    fn test_empty_never_matches() {
        let snapshot = ClassifierSnapshot::train(&GalleryStore::new());
        let d = snapshot.classify(&emb(clustered(0, 0, 0.05)), &DecisionThresholds::default());
        assert!(d.label.is_none());
        assert_eq!(d.confidence, 0.0);
    }

    #[test]
    fn test_single_accepts_enrolled_probe() {
        let mut store = GalleryStore::new();
        populate(&mut store, "7", 0, 5, 0.05);
        let snapshot = ClassifierSnapshot::train(&store);

        let probe = emb(clustered(0, 0, 0.05)); // identical to a stored row
        let d = snapshot.classify(&probe, &DecisionThresholds::default());
        assert_eq!(d.label.as_deref(), Some("7"));
        assert!(d.confidence > 0.99, "confidence {}", d.confidence);
        assert!(d.gap.is_none());
    }

    #[test]
    fn test_single_rejects_off_manifold_probe_but_reports_confidence() {
        let mut store = GalleryStore::new();
        populate(&mut store, "7", 0, 5, 0.05);
        let snapshot = ClassifierSnapshot::train(&store);

        // Orthogonal to the enrolled cluster: similarity ≈ 0, confidence ≈ 0.5.
        let mut noise = vec![0.0f32; DIM];
        noise[6] = 1.0;
        let d = snapshot.classify(&emb(noise), &DecisionThresholds::default());
        assert!(d.label.is_none());
        assert!((d.confidence - 0.5).abs() < 0.1, "confidence {}", d.confidence);
    }

    #[test]
    fn test_multi_accepts_clear_probe() {
        let snapshot = ClassifierSnapshot::train(&two_class_store());
        let d = snapshot.classify(&emb(clustered(0, 1, 0.05)), &DecisionThresholds::default());
        assert_eq!(d.label.as_deref(), Some("7"));
        assert!(d.confidence >= 0.7, "confidence {}", d.confidence);
        assert!(d.gap.unwrap() >= 0.1, "gap {:?}", d.gap);
    }

    #[test]
    fn test_multi_rejects_ambiguous_probe_by_gap() {
        let snapshot = ClassifierSnapshot::train(&two_class_store());

        // Exactly between the two clusters: probabilities near-tied.
        let mut mid = vec![0.0f32; DIM];
        mid[0] = 1.0;
        mid[4] = 1.0;
        let d = snapshot.classify(&emb(l2_normalize(mid)), &DecisionThresholds::default());
        assert!(d.label.is_none(), "ambiguous probe must not match");
        assert!(d.gap.unwrap() < 0.1, "gap {:?}", d.gap);
    }

    #[test]
    fn test_gap_check_rejects_even_with_permissive_accept() {
        // Lower the acceptance threshold so only the gap check can reject.
        let thresholds = DecisionThresholds { accept: 0.4, min_gap: 0.1, single_cosine: 0.5 };
        let snapshot = ClassifierSnapshot::train(&two_class_store());

        let mut mid = vec![0.0f32; DIM];
        mid[0] = 1.0;
        mid[4] = 1.0;
        let d = snapshot.classify(&emb(l2_normalize(mid)), &thresholds);
        assert!(d.confidence >= 0.4 || d.gap.unwrap() < 0.1);
        assert!(d.label.is_none());
    }

    #[test]
    fn test_near_duplicate_identity_lowers_gap() {
        let separated = ClassifierSnapshot::train(&two_class_store());

        let mut crowded_store = two_class_store();
        // A near-duplicate of identity "7" on almost the same axis.
        populate(&mut crowded_store, "77", 0, 12, 0.25);
        let crowded = ClassifierSnapshot::train(&crowded_store);

        let probe = emb(clustered(0, 2, 0.15));
        let gap_separated = separated
            .classify(&probe, &DecisionThresholds::default())
            .gap
            .unwrap();
        let gap_crowded = crowded
            .classify(&probe, &DecisionThresholds::default())
            .gap
            .unwrap();
        assert!(
            gap_crowded < gap_separated,
            "near-duplicate should lower the gap: {gap_crowded} vs {gap_separated}"
        );
    }

    #[test]
    fn test_training_is_deterministic() {
        let store = two_class_store();
        let a = SvmModel::train(store.rows(), store.labels());
        let b = SvmModel::train(store.rows(), store.labels());
        assert_eq!(a.weights, b.weights);
        assert_eq!(a.biases, b.biases);
        assert_eq!(a.platt, b.platt);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let store = two_class_store();
        let model = SvmModel::train(store.rows(), store.labels());
        let probs = model.probabilities(&clustered(0, 0, 0.05));
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_snapshot_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classifier.json");
        let store = two_class_store();

        let snapshot = ClassifierSnapshot::train(&store);
        snapshot.save(&path).unwrap();
        assert!(path.exists());

        let reloaded = ClassifierSnapshot::load_or_train(&store, &path);
        let probe = emb(clustered(0, 1, 0.05));
        let d1 = snapshot.classify(&probe, &DecisionThresholds::default());
        let d2 = reloaded.classify(&probe, &DecisionThresholds::default());
        assert_eq!(d1.label, d2.label);
        assert!((d1.confidence - d2.confidence).abs() < 1e-6);
    }

    #[test]
    fn test_save_removes_file_in_single_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classifier.json");
        std::fs::write(&path, b"stale").unwrap();

        let mut store = GalleryStore::new();
        populate(&mut store, "7", 0, 3, 0.05);
        ClassifierSnapshot::train(&store).save(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_stale_snapshot_is_retrained() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classifier.json");

        ClassifierSnapshot::train(&two_class_store()).save(&path).unwrap();

        // Gallery gains an identity the persisted model does not know.
        let mut bigger = two_class_store();
        populate(&mut bigger, "11", 2, 12, 0.05);
        let snapshot = ClassifierSnapshot::load_or_train(&bigger, &path);
        match snapshot {
            ClassifierSnapshot::Multi(model) => assert_eq!(model.classes.len(), 3),
            other => panic!("expected multi, got {}", other.state_name()),
        }
    }

    #[test]
    fn test_snapshot_retrained_after_same_class_growth() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classifier.json");

        ClassifierSnapshot::train(&two_class_store()).save(&path).unwrap();

        // Same class set, but identity "7" gains rows: the persisted model
        // no longer reflects the gallery and must not be reused.
        let mut grown = two_class_store();
        populate(&mut grown, "7", 1, 12, 0.05);
        let snapshot = ClassifierSnapshot::load_or_train(&grown, &path);
        match snapshot {
            ClassifierSnapshot::Multi(model) => {
                assert_eq!(model.trained_rows, grown.len());
            }
            other => panic!("expected multi, got {}", other.state_name()),
        }
    }

    #[test]
    fn test_mixed_numeric_label_forms_train_as_one_class() {
        let mut store = GalleryStore::new();
        populate(&mut store, "007", 0, 6, 0.05);
        populate(&mut store, "7", 0, 6, 0.05);
        assert_eq!(ClassifierSnapshot::train(&store).state_name(), "single");

        populate(&mut store, "9", 4, 12, 0.05);
        let snapshot = ClassifierSnapshot::train(&store);
        match &snapshot {
            ClassifierSnapshot::Multi(model) => assert_eq!(model.classes.len(), 2),
            other => panic!("expected multi, got {}", other.state_name()),
        }

        let d = snapshot.classify(&emb(clustered(0, 1, 0.05)), &DecisionThresholds::default());
        assert_eq!(d.label.as_deref(), Some("007"));
        assert!(d.gap.unwrap() >= 0.1, "gap {:?}", d.gap);
    }

    #[test]
    fn test_fit_sigmoid_orders_probabilities() {
        // Positive decisions far above negatives: sigmoid must map high
        // decision values to high probabilities.
        let decisions = vec![2.0, 1.8, 2.2, -2.0, -1.9, -2.1];
        let targets = vec![true, true, true, false, false, false];
        let (a, b) = fit_sigmoid(&decisions, &targets);
        let p = |d: f32| 1.0 / (1.0 + (a * d + b).exp());
        assert!(p(2.0) > 0.7, "p(+2) = {}", p(2.0));
        assert!(p(-2.0) < 0.3, "p(-2) = {}", p(-2.0));
        assert!(p(2.0) > p(0.0) && p(0.0) > p(-2.0));
    }
}
