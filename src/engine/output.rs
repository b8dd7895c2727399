//! Output staging and atomic finalization
//!
//! Every encode writes to a hidden staging file in the destination directory
//! and is promoted to its final name with a single `rename` on success, so a
//! concurrent reader never sees a partial rendition and a crash mid-encode
//! never leaves a corrupt final artifact. Staging next to the final name
//! keeps the rename on one filesystem.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::ladder::QualityTier;

/// Container extension for finalized renditions.
pub const OUTPUT_EXT: &str = "mp4";

/// Owns the destination directory and the staging/finalize discipline.
#[derive(Debug, Clone)]
pub struct OutputManager {
    dest_dir: PathBuf,
}

impl OutputManager {
    /// Create the manager, creating the destination directory if absent.
    pub fn new(dest_dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dest_dir)?;
        Ok(Self {
            dest_dir: dest_dir.to_path_buf(),
        })
    }

    pub fn dest_dir(&self) -> &Path {
        &self.dest_dir
    }

    fn stem(input: &Path) -> String {
        input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string())
    }

    /// Final artifact path: `<input-stem>-<tier>.<ext>`.
    pub fn final_path(&self, input: &Path, tier: QualityTier) -> PathBuf {
        self.dest_dir
            .join(format!("{}-{}.{}", Self::stem(input), tier, OUTPUT_EXT))
    }

    /// Per-job staging path, unique per job id so two runs can't collide.
    pub fn staging_path(&self, input: &Path, tier: QualityTier, job_id: Uuid) -> PathBuf {
        self.dest_dir.join(format!(
            ".{}-{}.{}.{}.part",
            Self::stem(input),
            tier,
            OUTPUT_EXT,
            job_id.as_simple()
        ))
    }

    /// Promote a fully staged file to its final name. Replaces an existing
    /// artifact atomically; the old file stays intact until this rename.
    pub fn finalize(&self, staged: &Path, final_path: &Path) -> io::Result<()> {
        fs::rename(staged, final_path)
    }

    /// Remove a staged file after failure or cancellation. Missing files are
    /// fine; a job that never launched has nothing to clean up.
    pub fn discard(&self, staged: &Path) {
        if let Err(e) = fs::remove_file(staged) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %staged.display(), error = %e, "failed to remove staged file");
            }
        }
    }

    /// Final paths that already exist for the given tiers.
    pub fn existing_finals(&self, input: &Path, tiers: &[QualityTier]) -> Vec<PathBuf> {
        tiers
            .iter()
            .map(|&tier| self.final_path(input, tier))
            .filter(|p| p.exists())
            .collect()
    }
}
