//! Enrollment store: ordered embedding matrix + parallel label array.
//!
//! Append-only per mutation, persisted as a single versioned JSON file
//! written via temp-file-then-rename so a reader never observes a torn
//! write. A row/label count mismatch on load is corruption — fail closed.

use crate::error::EngineError;
use facepoint_core::Embedding;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const STORE_VERSION: u32 = 1;

/// On-disk layout of the gallery file. Labels and embeddings are versioned
/// together so they can never drift independently.
#[derive(Serialize, Deserialize)]
struct GalleryFile {
    version: u32,
    dim: usize,
    labels: Vec<String>,
    embeddings: Vec<Vec<f32>>,
}

/// In-memory gallery: one row per enrolled (augmented) sample.
///
/// Invariant: `labels.len() == embeddings.len()` and every row has the same
/// dimension.
#[derive(Debug, Clone, Default)]
pub struct GalleryStore {
    labels: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    dim: usize,
}

impl GalleryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total stored rows (one per augmented sample).
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Distinct identity labels in first-seen order.
    ///
    /// Labels that only differ in numeric form ("007" vs "7") are one
    /// identity, matching `remove_label` and `rows_for`. The first-seen
    /// form is the representative.
    pub fn distinct_labels(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for label in &self.labels {
            if !seen.iter().any(|s| labels_match(s, label)) {
                seen.push(label);
            }
        }
        seen
    }

    /// Number of distinct enrolled identities.
    pub fn identity_count(&self) -> usize {
        self.distinct_labels().len()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn rows(&self) -> &[Vec<f32>] {
        &self.embeddings
    }

    /// All rows stored for one identity.
    pub fn rows_for(&self, label: &str) -> Vec<&[f32]> {
        self.labels
            .iter()
            .zip(self.embeddings.iter())
            .filter(|(l, _)| labels_match(l, label))
            .map(|(_, row)| row.as_slice())
            .collect()
    }

    /// Append one identity's embeddings.
    pub fn append(&mut self, label: &str, embeddings: &[Embedding]) {
        for embedding in embeddings {
            if self.embeddings.is_empty() {
                self.dim = embedding.values.len();
            }
            self.labels.push(label.to_string());
            self.embeddings.push(embedding.values.clone());
        }
    }

    /// Remove every row whose label matches `label`, returning the removed
    /// row count. Matching tolerates numeric-vs-string label forms since
    /// legacy stores mixed both. Zero removals is a valid outcome.
    pub fn remove_label(&mut self, label: &str) -> usize {
        let before = self.labels.len();
        let mut kept_labels = Vec::with_capacity(before);
        let mut kept_rows = Vec::with_capacity(before);

        for (l, row) in self.labels.drain(..).zip(self.embeddings.drain(..)) {
            if !labels_match(&l, label) {
                kept_labels.push(l);
                kept_rows.push(row);
            }
        }

        self.labels = kept_labels;
        self.embeddings = kept_rows;
        if self.embeddings.is_empty() {
            self.dim = 0;
        }
        before - self.labels.len()
    }

    /// Load the gallery from disk. A missing file is an empty store; an
    /// inconsistent file is `StoreCorrupted`.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no gallery file, starting empty");
            return Ok(Self::new());
        }

        let bytes = fs::read(path)?;
        let file: GalleryFile = serde_json::from_slice(&bytes)?;

        if file.version != STORE_VERSION {
            return Err(EngineError::StoreCorrupted(format!(
                "unsupported gallery version {}",
                file.version
            )));
        }
        if file.labels.len() != file.embeddings.len() {
            return Err(EngineError::StoreCorrupted(format!(
                "{} labels but {} embedding rows",
                file.labels.len(),
                file.embeddings.len()
            )));
        }
        if let Some(bad) = file.embeddings.iter().find(|row| row.len() != file.dim) {
            return Err(EngineError::StoreCorrupted(format!(
                "embedding row of dimension {} in a dim-{} gallery",
                bad.len(),
                file.dim
            )));
        }

        tracing::info!(
            path = %path.display(),
            rows = file.embeddings.len(),
            identities = file.labels.iter().collect::<std::collections::BTreeSet<_>>().len(),
            "gallery loaded"
        );

        Ok(Self {
            labels: file.labels,
            embeddings: file.embeddings,
            dim: file.dim,
        })
    }

    /// Persist the gallery atomically (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        let file = GalleryFile {
            version: STORE_VERSION,
            dim: self.dim,
            labels: self.labels.clone(),
            embeddings: self.embeddings.clone(),
        };
        let bytes = serde_json::to_vec(&file)?;
        write_atomic(path, &bytes)?;
        tracing::debug!(path = %path.display(), rows = self.len(), "gallery persisted");
        Ok(())
    }
}

/// Whether a stored label refers to the same identity as `target`.
///
/// Legacy stores recorded user ids both as raw strings and as stringified
/// integers, so "007" and "7" must match.
pub fn labels_match(stored: &str, target: &str) -> bool {
    if stored == target {
        return true;
    }
    match (stored.parse::<i64>(), target.parse::<i64>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Write `bytes` to `path` through a sibling temp file and an atomic rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), EngineError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
