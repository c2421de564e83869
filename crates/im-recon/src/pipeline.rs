use std::path::Path;

use burn::module::Module;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn::tensor::{backend::Backend, Device, Tensor};
use glam::Vec3;
use image::RgbImage;
use log::{debug, info};

use im_core::camera::{CameraMode, CameraPose, CameraSet};
use im_core::error::{Error, Result};
use im_core::grid::VIEW_COUNT;
use im_core::mesh::{MeshAsset, MeshExport};
use im_core::pipeline::{ReconstructionModel, RenderedFrame, TriplanePlanes};

use crate::extract;
use crate::model::{TriplaneConfig, TriplaneModel, TriplaneModelRecord, VIEW_CHANNELS};
use crate::volume::{self, Ray};

/// Points decoded per model call
const DECODE_BATCH: usize = 1 << 16;

/// Triplane reconstruction model: views + cameras to planes, planes to frames and meshes
pub struct TriplaneReconstructor<B: Backend> {
    model: TriplaneModel<B>,
    config: TriplaneConfig,
    device: Device<B>,
}

impl<B: Backend> TriplaneReconstructor<B> {
    /// Create with freshly initialized weights
    pub fn new(config: TriplaneConfig, device: Device<B>) -> Self {
        let model = TriplaneModel::new(&config, &device);
        Self { model, config, device }
    }

    /// Load weights from a named MessagePack record
    pub fn load(path: &Path, config: TriplaneConfig, device: Device<B>) -> Result<Self> {
        info!("Loading reconstruction weights from {}", path.display());

        let record: TriplaneModelRecord<B> = NamedMpkFileRecorder::<FullPrecisionSettings>::new()
            .load(path.to_path_buf(), &device)
            .map_err(|e| Error::ModelLoad(format!("{}: {e}", path.display())))?;
        let model = TriplaneModel::new(&config, &device).load_record(record);

        Ok(Self { model, config, device })
    }

    /// Build the [V, 19, R, R] encoder input
    fn view_tensor(&self, views: &[RgbImage], cameras: &CameraSet) -> Tensor<B, 4> {
        let r = self.config.plane_resolution;
        let plane = r * r;
        let mut data = vec![0.0f32; views.len() * VIEW_CHANNELS * plane];

        for (v, (img, camera)) in views.iter().zip(cameras.poses.iter()).enumerate() {
            let img = image::imageops::resize(
                img,
                r as u32,
                r as u32,
                image::imageops::FilterType::Triangle,
            );
            let base = v * VIEW_CHANNELS * plane;

            for (x, y, pixel) in img.enumerate_pixels() {
                let idx = y as usize * r + x as usize;
                for ch in 0..3 {
                    data[base + ch * plane + idx] = pixel[ch] as f32 / 255.0;
                }
            }

            // Camera descriptor, constant across the spatial dimensions
            for (ch, value) in camera.descriptor().into_iter().enumerate().take(VIEW_CHANNELS - 3) {
                let start = base + (3 + ch) * plane;
                data[start..start + plane].fill(value);
            }
        }

        Tensor::<B, 1>::from_floats(data.as_slice(), &self.device)
            .reshape([views.len(), VIEW_CHANNELS, r, r])
    }

    /// (density, r, g, b) at each world point
    fn query(&self, planes: &TriplanePlanes, points: &[Vec3]) -> Vec<[f32; 4]> {
        let mut out = Vec::with_capacity(points.len());
        let mut features = Vec::with_capacity(DECODE_BATCH.min(points.len()) * planes.channels);

        for batch in points.chunks(DECODE_BATCH) {
            features.clear();
            for &p in batch {
                volume::sample_features(planes, p, &mut features);
            }
            out.extend(self.model.decode(&features, batch.len(), &self.device));
        }
        out
    }

    fn render_camera(&self, planes: &TriplanePlanes, camera: &CameraPose, size: u32) -> RenderedFrame {
        let samples = self.config.samples_per_ray.max(1);
        let rays = volume::camera_rays(camera, size, self.config.fovy);
        let mut pixels = Vec::with_capacity(rays.len() * 3);

        let rays_per_batch = (DECODE_BATCH / samples).max(1);
        for batch in rays.chunks(rays_per_batch) {
            let spans: Vec<Option<(f32, f32)>> = batch.iter().map(volume::ray_box).collect();
            let points: Vec<Vec3> = batch
                .iter()
                .zip(&spans)
                .filter_map(|(ray, span)| span.map(|s| (ray, s)))
                .flat_map(|(ray, (t0, t1)): (&Ray, (f32, f32))| {
                    let delta = (t1 - t0) / samples as f32;
                    (0..samples).map(move |s| ray.origin + ray.dir * (t0 + (s as f32 + 0.5) * delta))
                })
                .collect();

            let decoded = self.query(planes, &points);
            let mut hits = decoded.chunks(samples);

            for span in &spans {
                let rgb = match span {
                    Some((t0, t1)) => {
                        let ray_samples = hits.next().unwrap_or(&[]);
                        volume::composite(ray_samples, (t1 - t0) / samples as f32)
                    }
                    None => [volume::BACKGROUND; 3],
                };
                pixels.extend_from_slice(&rgb);
            }
        }

        RenderedFrame::new(size, size, pixels)
    }
}

impl<B: Backend> ReconstructionModel for TriplaneReconstructor<B> {
    fn camera_mode(&self) -> CameraMode {
        if self.config.implicit_surface {
            CameraMode::ImplicitSurface
        } else {
            CameraMode::Standard
        }
    }

    fn forward_planes(&self, views: &[RgbImage], cameras: &CameraSet) -> Result<TriplanePlanes> {
        if views.len() != VIEW_COUNT || cameras.len() != VIEW_COUNT {
            return Err(Error::Inference(format!(
                "expected {VIEW_COUNT} views and cameras, got {} and {}",
                views.len(),
                cameras.len()
            )));
        }

        let input = self.view_tensor(views, cameras);
        let data = self.model.encode(input);
        debug!("Encoded triplanes: {} values", data.len());

        TriplanePlanes::new(self.config.feature_channels, self.config.plane_resolution, data)
    }

    fn render(
        &self,
        planes: &TriplanePlanes,
        cameras: &[CameraPose],
        render_size: u32,
    ) -> Result<Vec<RenderedFrame>> {
        if render_size == 0 {
            return Err(Error::Render("render size must be positive".to_string()));
        }
        Ok(cameras
            .iter()
            .map(|camera| self.render_camera(planes, camera, render_size))
            .collect())
    }

    fn extract_mesh(&self, planes: &TriplanePlanes, variant: MeshExport) -> Result<MeshAsset> {
        extract::extract_mesh(
            &|points| self.query(planes, points),
            self.config.mesh_resolution,
            self.config.density_threshold,
            self.config.texture_tile,
            variant,
        )
    }
}
