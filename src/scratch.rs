use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::TARGET_PIPELINE;

/// Root directory for transient downloaded images. Everything under it is
/// process-owned.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    /// Creates the directory if it does not exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| ConfigError::ScratchDir {
            path: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Starts a batch owning the scratch files of one pipeline invocation.
    pub fn begin_batch(&self) -> ScratchBatch {
        ScratchBatch {
            dir: self.root.clone(),
            files: Vec::new(),
        }
    }
}

/// The scratch files created by one pipeline invocation. `cleanup` drains
/// the file list, so every registered file is deleted exactly once no
/// matter how often it is called.
#[derive(Debug)]
pub struct ScratchBatch {
    dir: PathBuf,
    files: Vec<PathBuf>,
}

impl ScratchBatch {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn register(&mut self, path: PathBuf) {
        self.files.push(path);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn cleanup(&mut self) {
        for path in self.files.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => debug!(target: TARGET_PIPELINE, "removed scratch file {}", path.display()),
                Err(e) => {
                    warn!(target: TARGET_PIPELINE, "failed to remove scratch file {}: {}", path.display(), e)
                }
            }
        }
    }
}

impl Drop for ScratchBatch {
    fn drop(&mut self) {
        if !self.files.is_empty() {
            self.cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_with_files(dir: &Path, count: usize) -> ScratchBatch {
        let scratch = ScratchDir::new(dir).unwrap();
        let mut batch = scratch.begin_batch();
        for i in 0..count {
            let path = dir.join(format!("{}.jpg", i));
            fs::write(&path, b"bytes").unwrap();
            batch.register(path);
        }
        batch
    }

    #[test]
    fn cleanup_removes_registered_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut batch = batch_with_files(dir.path(), 3);
        assert_eq!(batch.len(), 3);

        batch.cleanup();
        assert!(batch.is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn second_cleanup_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut batch = batch_with_files(dir.path(), 1);
        batch.cleanup();
        batch.cleanup();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn drop_removes_leftover_files() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _batch = batch_with_files(dir.path(), 2);
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn batches_do_not_own_unregistered_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.jpg"), b"bytes").unwrap();
        let mut batch = batch_with_files(dir.path(), 1);
        batch.cleanup();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
