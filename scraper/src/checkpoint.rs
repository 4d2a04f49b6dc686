use moltscrape_core::{Checkpoint, CheckpointError, CoreError};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Serialize a value to JSON and move it into place with a
/// write-to-temp-then-rename, so a crash mid-write never leaves a
/// truncated file behind.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("tmp");
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(&tmp_path, bytes)?;
    fs::rename(&tmp_path, path)?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// Owner of the checkpoint file for the duration of a run.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the checkpoint if one exists. A missing file is a fresh
    /// start; a file that exists but cannot be read or decoded is
    /// fatal, since resuming from it would silently lose progress.
    pub fn load(&self) -> Result<Option<Checkpoint>, CoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&self.path).map_err(|e| CheckpointError::Corrupted {
            path: self.path.display().to_string(),
            details: e.to_string(),
        })?;

        let checkpoint: Checkpoint =
            serde_json::from_slice(&bytes).map_err(|e| CheckpointError::Corrupted {
                path: self.path.display().to_string(),
                details: e.to_string(),
            })?;

        info!(
            "Resuming from checkpoint: {} posts, cursor {}",
            checkpoint.posts.len(),
            checkpoint.cursor
        );
        Ok(Some(checkpoint))
    }

    /// Overwrite the checkpoint atomically.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), CoreError> {
        write_json_atomic(&self.path, checkpoint)
    }

    /// Discard the checkpoint file, if present.
    pub fn remove(&self) -> Result<(), CoreError> {
        if self.path.exists() {
            warn!("Discarding checkpoint at {}", self.path.display());
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
