use image::{RgbImage, RgbaImage};
use log::debug;

use crate::camera::{CameraMode, CameraPose, CameraSet};
use crate::error::{Error, Result};
use crate::grid::MultiViewGrid;
use crate::mesh::{MeshAsset, MeshExport};

/// Volumetric latent produced once per job: `[3, channels, resolution, resolution]`.
///
/// Only the reconstruction model that produced it knows how to decode it.
#[derive(Clone, Debug)]
pub struct TriplanePlanes {
    pub channels: usize,
    pub resolution: usize,
    pub data: Vec<f32>,
}

impl TriplanePlanes {
    pub fn new(channels: usize, resolution: usize, data: Vec<f32>) -> Result<Self> {
        let expected = 3 * channels * resolution * resolution;
        if data.len() != expected {
            return Err(Error::Inference(format!(
                "triplane buffer has {} values, expected {expected}",
                data.len()
            )));
        }
        Ok(Self { channels, resolution, data })
    }

    /// Feature `channel` of plane `plane` at texel (`u`, `v`).
    ///
    /// Planes are ordered xy, xz, yz.
    pub fn value(&self, plane: usize, channel: usize, u: usize, v: usize) -> f32 {
        let r = self.resolution;
        self.data[((plane * self.channels + channel) * r + v) * r + u]
    }
}

/// One rendered RGB image, HWC, values nominally in [0, 1]
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<f32>,
}

impl RenderedFrame {
    pub fn new(width: u32, height: u32, pixels: Vec<f32>) -> Self {
        Self { width, height, pixels }
    }

    pub fn filled(width: u32, height: u32, rgb: [f32; 3]) -> Self {
        let pixels = (0..(width * height) as usize).flat_map(|_| rgb).collect();
        Self { width, height, pixels }
    }
}

/// Foreground segmentation (background removal)
pub trait Segmenter {
    /// Return the image with background pixels made transparent
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage>;
}

/// Multi-view diffusion sampler
pub trait MultiViewSynthesizer {
    /// Sample six views of `image`. The sampler must be seeded from `seed` only.
    fn synthesize(&mut self, image: &RgbImage, steps: usize, seed: u64) -> Result<MultiViewGrid>;

    fn name(&self) -> &str;
}

/// Triplane reconstruction network
pub trait ReconstructionModel {
    /// Camera layout the renderer expects
    fn camera_mode(&self) -> CameraMode;

    /// Encode six views into triplanes
    fn forward_planes(&self, views: &[RgbImage], cameras: &CameraSet) -> Result<TriplanePlanes>;

    /// Render one chunk of cameras; must return exactly one frame per camera
    fn render(
        &self,
        planes: &TriplanePlanes,
        cameras: &[CameraPose],
        render_size: u32,
    ) -> Result<Vec<RenderedFrame>>;

    /// Extract a mesh with the attributes `variant` needs
    fn extract_mesh(&self, planes: &TriplanePlanes, variant: MeshExport) -> Result<MeshAsset>;
}

/// Proof that the synthesizer has been dropped and accelerator memory reclaimed.
///
/// Only [`release_synthesizer`] can create one.
#[derive(Debug)]
pub struct SynthesizerReleased {
    _private: (),
}

/// Loads the two large models. At most one may be resident at a time.
pub trait ModelProvider {
    fn load_synthesizer(&self) -> Result<Box<dyn MultiViewSynthesizer>>;

    fn load_reconstructor(&self, released: SynthesizerReleased) -> Result<Box<dyn ReconstructionModel>>;

    /// Return freed accelerator memory to the device allocator
    fn reclaim_memory(&self) {}
}

/// Drop the synthesizer and reclaim its memory before anything else is loaded
pub fn release_synthesizer(
    provider: &dyn ModelProvider,
    synthesizer: Box<dyn MultiViewSynthesizer>,
) -> SynthesizerReleased {
    debug!("Releasing synthesizer '{}'", synthesizer.name());
    drop(synthesizer);
    provider.reclaim_memory();
    SynthesizerReleased { _private: () }
}
