use std::io::Cursor;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use im_core::error::{Error, Result};
use im_core::grid::MultiViewGrid;
use im_core::pipeline::{MultiViewSynthesizer, Segmenter};

use crate::registry::ModelCheckpoint;

/// Diffusion pipeline served by the synthesis service
pub const ZERO123PLUS_PIPELINE: &str = "sudo-ai/zero123plus-v1.2";

/// Fine-tuned UNet swapped into the diffusion pipeline
pub const ZERO123PLUS_UNET: ModelCheckpoint = ModelCheckpoint {
    repo_id: "TencentARC/InstantMesh",
    filename: "diffusion_pytorch_model.bin",
};

/// Location of an inference service
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub service_url: String,
}

impl ServiceConfig {
    pub fn new(service_url: impl Into<String>) -> Self {
        Self {
            service_url: service_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.service_url)
    }
}

#[derive(Serialize)]
struct LoadRequest<'a> {
    pipeline: &'a str,
    custom_pipeline: &'a str,
    unet_repo: &'a str,
    unet_file: &'a str,
    scheduler: &'a str,
    timestep_spacing: &'a str,
    dtype: &'a str,
}

#[derive(Serialize)]
struct GenerateRequest {
    image: String,
    num_inference_steps: usize,
    seed: u64,
}

#[derive(Serialize)]
struct SegmentRequest {
    image: String,
}

#[derive(Deserialize)]
struct ServiceResponse {
    status: String,
    image: Option<String>,
    error: Option<String>,
}

impl ServiceResponse {
    fn into_image(self) -> std::result::Result<DynamicImage, String> {
        match self.status.as_str() {
            "success" => {
                let encoded = self.image.ok_or("no image returned")?;
                let bytes = STANDARD
                    .decode(encoded)
                    .map_err(|e| format!("invalid base64 image: {e}"))?;
                image::load_from_memory(&bytes).map_err(|e| format!("invalid image: {e}"))
            }
            "error" => Err(self.error.unwrap_or_else(|| "Unknown error".to_string())),
            other => Err(format!("Unexpected status: {other}")),
        }
    }
}

fn encode_png(image: &DynamicImage) -> Result<String> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(STANDARD.encode(bytes))
}

/// Blocking client without a request timeout; sampling can take minutes
fn http_client() -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(None::<Duration>)
        .build()
        .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))
}

fn post<T: Serialize>(
    client: &reqwest::blocking::Client,
    url: &str,
    body: &T,
) -> std::result::Result<ServiceResponse, String> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .map_err(|e| format!("Failed to connect to {url}: {e}"))?;

    if !response.status().is_success() {
        return Err(format!("{url} returned error: {}", response.status()));
    }

    response
        .json()
        .map_err(|e| format!("Failed to parse response: {e}"))
}

/// Multi-view diffusion sampler hosted by a separate service.
///
/// The service holds the pipeline in accelerator memory from `load` until
/// this client is dropped.
pub struct Zero123Client {
    config: ServiceConfig,
    client: reqwest::blocking::Client,
}

impl Zero123Client {
    /// Ask the service to load the pipeline and fine-tuned UNet
    pub fn load(config: ServiceConfig) -> Result<Self> {
        let client = http_client()?;
        let request = LoadRequest {
            pipeline: ZERO123PLUS_PIPELINE,
            custom_pipeline: "zero123plus",
            unet_repo: ZERO123PLUS_UNET.repo_id,
            unet_file: ZERO123PLUS_UNET.filename,
            scheduler: "euler_ancestral",
            timestep_spacing: "trailing",
            dtype: "float16",
        };

        info!("Loading {ZERO123PLUS_PIPELINE} on {}", config.service_url);
        let response = post(&client, &config.endpoint("load"), &request).map_err(Error::ModelLoad)?;
        if response.status != "success" {
            return Err(Error::ModelLoad(
                response.error.unwrap_or_else(|| format!("Unexpected status: {}", response.status)),
            ));
        }

        Ok(Self { config, client })
    }
}

impl MultiViewSynthesizer for Zero123Client {
    fn synthesize(&mut self, image: &RgbImage, steps: usize, seed: u64) -> Result<MultiViewGrid> {
        let request = GenerateRequest {
            image: encode_png(&DynamicImage::ImageRgb8(image.clone()))?,
            num_inference_steps: steps,
            seed,
        };

        info!("Sampling multi-view grid ({steps} steps, seed {seed})");
        let grid = post(&self.client, &self.config.endpoint("generate"), &request)
            .and_then(ServiceResponse::into_image)
            .map_err(Error::Inference)?;

        MultiViewGrid::new(grid.to_rgb8())
    }

    fn name(&self) -> &str {
        ZERO123PLUS_PIPELINE
    }
}

impl Drop for Zero123Client {
    fn drop(&mut self) {
        let url = self.config.endpoint("unload");
        match self.client.post(&url).send() {
            Ok(r) if r.status().is_success() => info!("Unloaded {ZERO123PLUS_PIPELINE}"),
            Ok(r) => warn!("Unload returned {}", r.status()),
            Err(e) => warn!("Failed to unload {ZERO123PLUS_PIPELINE}: {e}"),
        }
    }
}

/// Background removal service
pub struct SegmentationClient {
    config: ServiceConfig,
    client: reqwest::blocking::Client,
}

impl SegmentationClient {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        Ok(Self {
            config,
            client: http_client()?,
        })
    }
}

impl Segmenter for SegmentationClient {
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage> {
        let request = SegmentRequest {
            image: encode_png(&DynamicImage::ImageRgba8(image.clone()))?,
        };

        let cutout = post(&self.client, &self.config.endpoint("remove"), &request)
            .and_then(ServiceResponse::into_image)
            .map_err(Error::Inference)?;

        Ok(cutout.to_rgba8())
    }
}

/// Check if a service is running
pub fn check_service_health(config: &ServiceConfig) -> bool {
    reqwest::blocking::Client::new()
        .get(config.endpoint("health"))
        .send()
        .map(|r| r.status().is_success())
        .unwrap_or(false)
}
