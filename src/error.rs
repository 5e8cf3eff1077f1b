use std::fmt;
use std::io;

use thiserror::Error;

/// Fatal startup failures. Without a keyword list and a reference dataset
/// the pipeline cannot produce meaningful verdicts, so these abort the
/// process instead of degrading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read keyword file {path}: {source}")]
    KeywordFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("keyword file {path} contains no keywords")]
    NoKeywords { path: String },

    #[error("failed to read reference dataset directory {path}: {source}")]
    DatasetDir {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("reference dataset {path} yielded no face encodings")]
    EmptyDataset { path: String },

    #[error("failed to prepare scratch directory {path}: {source}")]
    ScratchDir {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Why one item (a page, an image, a face) was dropped. Per-item failures
/// are recorded against the item that produced them and never escalated to
/// the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Fetch,
    Decode,
    Inference,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::Fetch => "fetch failed",
            SkipReason::Decode => "decode failed",
            SkipReason::Inference => "inference failed",
        };
        write!(f, "{}", reason)
    }
}
