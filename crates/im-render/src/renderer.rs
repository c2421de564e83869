use log::{debug, info};

use im_core::camera::CameraSet;
use im_core::error::{Error, Result};
use im_core::pipeline::{ReconstructionModel, RenderedFrame, TriplanePlanes};
use im_core::progress::{ProgressCallback, ProgressTracker};

/// Default edge length of rendered frames
pub const DEFAULT_RENDER_SIZE: u32 = 384;

/// Renders an orbit camera set in memory-bounded chunks
#[derive(Clone, Debug)]
pub struct OrbitRenderer {
    pub render_size: u32,
    pub chunk_size: usize,
}

impl OrbitRenderer {
    pub fn new(render_size: u32, chunk_size: usize) -> Self {
        Self {
            render_size,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Chunk size picked from the camera layout of `cameras`
    pub fn for_cameras(cameras: &CameraSet, render_size: u32) -> Self {
        Self::new(render_size, cameras.mode.render_chunk_size())
    }

    /// Render every camera in order. Chunks run one after another and frame
    /// `i` always belongs to camera `i`.
    pub fn render(
        &self,
        model: &dyn ReconstructionModel,
        planes: &TriplanePlanes,
        cameras: &CameraSet,
        progress: &mut dyn ProgressCallback,
    ) -> Result<Vec<RenderedFrame>> {
        let total = cameras.len();
        let chunks = total.div_ceil(self.chunk_size);
        let mut tracker = ProgressTracker::new(chunks);
        let mut frames = Vec::with_capacity(total);

        info!(
            "Rendering {total} cameras at {0}x{0} in {chunks} chunk(s) of {1}",
            self.render_size, self.chunk_size
        );

        for start in (0..total).step_by(self.chunk_size) {
            let chunk = cameras.slice(start..start + self.chunk_size);
            let rendered = model.render(planes, chunk, self.render_size)?;

            if rendered.len() != chunk.len() {
                return Err(Error::Render(format!(
                    "chunk at camera {start} returned {} frames for {} cameras",
                    rendered.len(),
                    chunk.len()
                )));
            }

            frames.extend(rendered);
            tracker.step_and_report(
                format!("Rendered chunk {}/{chunks}", tracker.current_step + 1),
                progress,
            );
            debug!("{} ({} frames)", tracker.message, frames.len());
        }

        if frames.len() != total {
            return Err(Error::Render(format!(
                "rendered {} frames for {total} cameras",
                frames.len()
            )));
        }

        Ok(frames)
    }
}
