use std::fs;
use std::path::PathBuf;

use log::{debug, info};

use im_core::error::{Error, Result};

/// A file inside a model repository
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelCheckpoint {
    pub repo_id: &'static str,
    pub filename: &'static str,
}

/// Default reconstruction weights, in named MessagePack form
pub const INSTANT_MESH_BASE: ModelCheckpoint = ModelCheckpoint {
    repo_id: "TencentARC/InstantMesh",
    filename: "instant_mesh_base.mpk",
};

pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

/// Downloads checkpoint files once and serves them from a local cache.
///
/// Layout: `<cache_dir>/<owner>--<name>/<filename>`.
pub struct ModelRegistry {
    endpoint: String,
    cache_dir: PathBuf,
}

impl ModelRegistry {
    pub fn new(endpoint: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            cache_dir: cache_dir.into(),
        }
    }

    /// Local path a checkpoint is cached at
    pub fn cached_path(&self, checkpoint: &ModelCheckpoint) -> PathBuf {
        self.cache_dir
            .join(checkpoint.repo_id.replace('/', "--"))
            .join(checkpoint.filename)
    }

    /// Return the cached file, downloading it first if missing
    pub fn fetch(&self, checkpoint: &ModelCheckpoint) -> Result<PathBuf> {
        let path = self.cached_path(checkpoint);
        if path.is_file() {
            debug!("Using cached {}", path.display());
            return Ok(path);
        }

        let url = format!(
            "{}/{}/resolve/main/{}",
            self.endpoint, checkpoint.repo_id, checkpoint.filename
        );
        info!("Downloading {url}");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut response = reqwest::blocking::get(&url)
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::ModelLoad(format!("failed to download {url}: {e}")))?;

        // Partial downloads never land at the final path
        let partial = path.with_extension("part");
        let mut file = fs::File::create(&partial)?;
        let copied = response
            .copy_to(&mut file)
            .map_err(|e| Error::ModelLoad(format!("failed to download {url}: {e}")));
        drop(file);

        if let Err(e) = copied {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }
        fs::rename(&partial, &path)?;

        info!("Cached {} at {}", checkpoint.filename, path.display());
        Ok(path)
    }
}
