use std::path::PathBuf;

use burn::tensor::backend::Backend;
use burn::tensor::Device;
use log::{debug, info};

use im_core::error::Result;
use im_core::pipeline::{ModelProvider, MultiViewSynthesizer, ReconstructionModel, SynthesizerReleased};
use im_recon::model::TriplaneConfig;
use im_recon::pipeline::TriplaneReconstructor;
use im_recon::registry::{INSTANT_MESH_BASE, ModelRegistry};
use im_recon::service::{ServiceConfig, Zero123Client};

use crate::config::WorkerConfig;

/// Diffusion model behind the synthesis service, reconstruction model on a burn backend.
///
/// Both are loaded fresh for every job.
pub struct HostedModels<B: Backend> {
    diffusion: ServiceConfig,
    registry: ModelRegistry,
    local_weights: Option<PathBuf>,
    triplane: TriplaneConfig,
    device: Device<B>,
}

impl<B: Backend> HostedModels<B> {
    pub fn new(config: &WorkerConfig, triplane: TriplaneConfig, device: Device<B>) -> Self {
        Self {
            diffusion: ServiceConfig::new(config.diffusion_url.clone()),
            registry: ModelRegistry::new(config.registry_endpoint.clone(), config.cache_dir.clone()),
            local_weights: config.recon_weights.clone(),
            triplane,
            device,
        }
    }
}

impl<B: Backend> ModelProvider for HostedModels<B> {
    fn load_synthesizer(&self) -> Result<Box<dyn MultiViewSynthesizer>> {
        Ok(Box::new(Zero123Client::load(self.diffusion.clone())?))
    }

    fn load_reconstructor(&self, _released: SynthesizerReleased) -> Result<Box<dyn ReconstructionModel>> {
        let weights = match &self.local_weights {
            Some(path) => path.clone(),
            None => self.registry.fetch(&INSTANT_MESH_BASE)?,
        };

        let model = TriplaneReconstructor::<B>::load(&weights, self.triplane.clone(), self.device.clone())?;
        info!("Reconstruction model ready on {:?}", self.device);
        Ok(Box::new(model))
    }

    fn reclaim_memory(&self) {
        debug!("Synthesizer unloaded from {}", self.diffusion.service_url);
    }
}
