use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

/// Every temporary file a job creates, removed exactly once.
///
/// Paths are registered before anything is written to them, so a stage that
/// fails halfway still has its partial output cleaned up.
pub struct JobScratch {
    dir: PathBuf,
    job_id: String,
    paths: Vec<PathBuf>,
    cleaned: bool,
}

impl JobScratch {
    pub fn new(dir: impl Into<PathBuf>, job_id: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            job_id: job_id.into(),
            paths: Vec::new(),
            cleaned: false,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reserve a fresh `<job_id>-<uuid>.<ext>` path in the scratch directory
    pub fn reserve(&mut self, extension: &str) -> PathBuf {
        let path = self
            .dir
            .join(format!("{}-{}.{extension}", self.job_id, uuid::Uuid::new_v4()));
        self.register(path.clone());
        path
    }

    pub fn register(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Remove every registered file. Missing files are skipped, errors are
    /// logged, and later calls do nothing. Returns the number removed.
    pub fn cleanup(&mut self) -> usize {
        if self.cleaned {
            return 0;
        }
        self.cleaned = true;

        let mut removed = 0;
        for path in &self.paths {
            match fs::remove_file(path) {
                Ok(()) => {
                    debug!("Removed {}", path.display());
                    removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {e}", path.display()),
            }
        }

        info!("Job {}: removed {removed} scratch file(s)", self.job_id);
        removed
    }
}

impl Drop for JobScratch {
    fn drop(&mut self) {
        self.cleanup();
    }
}
