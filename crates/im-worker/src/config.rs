use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::json;

use im_core::mesh::MeshExport;
use im_recon::registry::DEFAULT_ENDPOINT;

pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_DISCORD_API: &str = "https://discord.com/api/v9";

/// Process-wide settings read once at startup
#[derive(Clone, Debug, Default)]
pub struct WorkerConfig {
    // Defaults for sentinel job fields
    pub notify_uri: Option<String>,
    pub notify_token: Option<String>,
    pub discord_id: Option<String>,
    pub discord_channel: Option<String>,
    pub discord_token: Option<String>,

    pub discord_api: String,
    pub diffusion_url: String,
    pub segmentation_url: String,
    pub scratch_dir: PathBuf,
    pub registry_endpoint: String,
    pub cache_dir: PathBuf,
    /// Local reconstruction weights, bypassing the registry
    pub recon_weights: Option<PathBuf>,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or empty keys fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let scratch_dir = get("INSTAMESH_SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("instamesh"));
        let cache_dir = get("INSTAMESH_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| scratch_dir.join("checkpoints"));

        Self {
            notify_uri: get("com_camenduru_notify_uri"),
            notify_token: get("com_camenduru_notify_token"),
            discord_id: get("com_camenduru_discord_id"),
            discord_channel: get("com_camenduru_discord_channel"),
            discord_token: get("com_camenduru_discord_token"),

            discord_api: or("INSTAMESH_DISCORD_API", DEFAULT_DISCORD_API),
            diffusion_url: or("INSTAMESH_DIFFUSION_URL", DEFAULT_SERVICE_URL),
            segmentation_url: or("INSTAMESH_SEGMENTATION_URL", DEFAULT_SERVICE_URL),
            scratch_dir,
            registry_endpoint: or("INSTAMESH_REGISTRY_ENDPOINT", DEFAULT_ENDPOINT),
            cache_dir,
            recon_weights: get("INSTAMESH_RECON_WEIGHTS").map(PathBuf::from),
        }
    }
}

/// Per-job pipeline knobs
#[derive(Clone, Copy, Debug)]
pub struct PipelineSettings {
    /// Orbit cameras in the preview video
    pub render_views: usize,
    pub render_radius: f32,
    pub render_elevation: f32,
    pub render_size: u32,
    /// Distance of the conditioning cameras
    pub input_radius: f32,
    pub fps: u32,
    pub export: MeshExport,
    pub remove_background: bool,
    pub export_video: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            render_views: 120,
            render_radius: 4.5,
            render_elevation: 20.0,
            render_size: 384,
            input_radius: 4.0,
            fps: 30,
            export: MeshExport::TextureMapped,
            remove_background: true,
            export_video: true,
        }
    }
}

fn default_sample_steps() -> usize {
    75
}

fn default_seed() -> u64 {
    42
}

/// Job record as submitted by the queue.
///
/// Routing fields may hold their own name as a sentinel meaning
/// "use the worker default".
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct JobInput {
    #[serde(alias = "inputImage")]
    pub input_image: String,
    #[serde(alias = "sampleSteps", default = "default_sample_steps")]
    pub sample_steps: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(alias = "notifyUri", default)]
    pub notify_uri: Option<String>,
    #[serde(alias = "notifyToken", default)]
    pub notify_token: Option<String>,
    #[serde(alias = "discordId", default)]
    pub discord_id: Option<String>,
    #[serde(alias = "discordChannel", default)]
    pub discord_channel: Option<String>,
    #[serde(alias = "discordToken", default)]
    pub discord_token: Option<String>,
    #[serde(alias = "jobId", default)]
    pub job_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JobEnvelope {
    Wrapped { input: JobInput },
    Bare(JobInput),
}

/// Parse a job record, bare or wrapped as `{"input": {...}}`
pub fn parse_job(text: &str) -> serde_json::Result<JobInput> {
    Ok(match serde_json::from_str(text)? {
        JobEnvelope::Wrapped { input } => input,
        JobEnvelope::Bare(input) => input,
    })
}

/// Replace a sentinel, missing or empty value with the worker default
fn resolve(value: Option<String>, snake: &str, camel: &str, default: &Option<String>) -> Option<String> {
    match value {
        Some(v) if v == snake || v == camel || v.is_empty() => default.clone(),
        Some(v) => Some(v),
        None => default.clone(),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NotifyTarget {
    pub uri: Option<String>,
    pub token: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DiscordTarget {
    pub user_id: Option<String>,
    pub channel: Option<String>,
    pub token: Option<String>,
}

/// Job with every routing field resolved
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedJob {
    pub job_id: String,
    pub input_image: String,
    pub sample_steps: usize,
    pub seed: u64,
    pub notify: NotifyTarget,
    pub discord: DiscordTarget,
}

impl JobInput {
    pub fn resolve(self, config: &WorkerConfig) -> ResolvedJob {
        // A sentinel notify uri also pulls in the default token
        let notify_default = matches!(self.notify_uri.as_deref(), Some("notify_uri" | "notifyUri") | None);
        let notify_token = if notify_default {
            config.notify_token.clone()
        } else {
            resolve(self.notify_token, "notify_token", "notifyToken", &config.notify_token)
        };

        ResolvedJob {
            job_id: self
                .job_id
                .filter(|id| !id.is_empty() && id != "job_id" && id != "jobId")
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            input_image: self.input_image,
            sample_steps: self.sample_steps,
            seed: self.seed,
            notify: NotifyTarget {
                uri: resolve(self.notify_uri, "notify_uri", "notifyUri", &config.notify_uri),
                token: notify_token,
            },
            discord: DiscordTarget {
                user_id: resolve(self.discord_id, "discord_id", "discordId", &config.discord_id),
                channel: resolve(
                    self.discord_channel,
                    "discord_channel",
                    "discordChannel",
                    &config.discord_channel,
                ),
                token: resolve(self.discord_token, "discord_token", "discordToken", &config.discord_token),
            },
        }
    }
}

impl ResolvedJob {
    /// Generation parameters echoed alongside delivered assets
    pub fn params(&self) -> serde_json::Value {
        json!({
            "input_image": self.input_image,
            "sample_steps": self.sample_steps,
            "seed": self.seed,
        })
    }
}
