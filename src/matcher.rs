use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::harvest::DownloadedImage;
use crate::providers::FaceEncoder;
use crate::{TARGET_MODEL_REQUEST, TARGET_PIPELINE};

/// Maximum Euclidean distance between two encodings still considered the
/// same face. The conventional default for 128-dimension face embeddings;
/// held constant for every comparison.
pub const MATCH_THRESHOLD: f32 = 0.6;

/// Fixed-length embedding of one face.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceEncoding(Vec<f32>);

impl FaceEncoding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// Euclidean distance to another encoding.
    pub fn distance(&self, other: &FaceEncoding) -> f32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// A face in a harvested image matched a known-suspect reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspectMatch {
    pub label: String,
}

/// Reference encodings for the known-suspect dataset. Built once at process
/// start and shared read-only for the process lifetime.
pub struct FaceMatcher {
    encoder: Arc<dyn FaceEncoder>,
    references: Vec<(FaceEncoding, String)>,
}

impl FaceMatcher {
    /// Encodes every file in `dataset_dir`, visiting entries in file-name
    /// order. One encoding attempt per file; files with no detectable face
    /// and files the encoder rejects are skipped. An entirely empty cache
    /// is fatal.
    pub async fn build(
        encoder: Arc<dyn FaceEncoder>,
        dataset_dir: &Path,
    ) -> Result<Self, ConfigError> {
        let entries = fs::read_dir(dataset_dir).map_err(|source| ConfigError::DatasetDir {
            path: dataset_dir.display().to_string(),
            source,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        let mut references = Vec::new();
        for path in files {
            let label = match path.file_name().and_then(|name| name.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            match encoder.encode(&path).await {
                Ok(encodings) => match encodings.into_iter().next() {
                    Some(encoding) => {
                        debug!(target: TARGET_MODEL_REQUEST, "encoded reference face {}", label);
                        references.push((encoding, label));
                    }
                    None => {
                        warn!(target: TARGET_MODEL_REQUEST, "no face detected in reference image {}, skipping", label);
                    }
                },
                Err(e) => {
                    warn!(target: TARGET_MODEL_REQUEST, "failed to encode reference image {}: {}, skipping", label, e);
                }
            }
        }

        if references.is_empty() {
            return Err(ConfigError::EmptyDataset {
                path: dataset_dir.display().to_string(),
            });
        }

        info!(target: TARGET_PIPELINE, "face reference cache holds {} encodings", references.len());
        Ok(Self {
            encoder,
            references,
        })
    }

    pub fn reference_labels(&self) -> impl Iterator<Item = &str> {
        self.references.iter().map(|(_, label)| label.as_str())
    }

    /// Scans images in input order; within an image, faces in detection
    /// order; within a face, references in cache insertion order. The first
    /// encoding within `MATCH_THRESHOLD` wins and stops the scan. Images
    /// the encoder rejects are skipped.
    pub async fn find_match(&self, images: &[DownloadedImage]) -> Option<SuspectMatch> {
        for image in images {
            let encodings = match self.encoder.encode(&image.path).await {
                Ok(encodings) => encodings,
                Err(e) => {
                    warn!(target: TARGET_MODEL_REQUEST, "face encoding failed for {}: {}, skipping", image.path.display(), e);
                    continue;
                }
            };
            for face in &encodings {
                for (reference, label) in &self.references {
                    let distance = face.distance(reference);
                    if distance <= MATCH_THRESHOLD {
                        debug!(target: TARGET_PIPELINE, "face in {} matched {} at distance {:.3}", image.path.display(), label, distance);
                        return Some(SuspectMatch {
                            label: label.clone(),
                        });
                    }
                }
            }
        }
        None
    }
}
