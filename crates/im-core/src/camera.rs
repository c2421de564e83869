use std::ops::Range;

use glam::{Mat3, Mat4};

/// Descriptor layout used when feeding cameras to a model
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraMode {
    /// Flattened camera-to-world extrinsics followed by intrinsics
    Standard,
    /// Bare world-to-camera matrices, used by implicit-surface (flexicubes) renderers
    ImplicitSurface,
}

impl CameraMode {
    /// Number of render cameras processed per renderer call
    pub fn render_chunk_size(self) -> usize {
        match self {
            CameraMode::ImplicitSurface => 20,
            CameraMode::Standard => 1,
        }
    }
}

/// A single camera descriptor
#[derive(Clone, Debug, PartialEq)]
pub enum CameraPose {
    /// Conditioning camera: 3x4 row-major camera-to-world + [fx, fy, cx, cy]
    Input {
        extrinsics: [f32; 12],
        intrinsics: [f32; 4],
    },
    /// Render camera: 4x4 row-major camera-to-world + 3x3 row-major intrinsics
    Projective {
        extrinsics: [f32; 16],
        intrinsics: [f32; 9],
    },
    /// Render camera for implicit-surface mode: 4x4 row-major world-to-camera
    WorldToCamera([f32; 16]),
}

impl CameraPose {
    /// Flat descriptor, in the order models consume it
    pub fn descriptor(&self) -> Vec<f32> {
        match self {
            CameraPose::Input { extrinsics, intrinsics } => {
                extrinsics.iter().chain(intrinsics.iter()).copied().collect()
            }
            CameraPose::Projective { extrinsics, intrinsics } => {
                extrinsics.iter().chain(intrinsics.iter()).copied().collect()
            }
            CameraPose::WorldToCamera(matrix) => matrix.to_vec(),
        }
    }

    /// Camera-to-world transform regardless of the stored layout
    pub fn camera_to_world(&self) -> Mat4 {
        match self {
            CameraPose::Input { extrinsics, .. } => {
                let mut rows = [0.0f32; 16];
                rows[..12].copy_from_slice(extrinsics);
                rows[15] = 1.0;
                Mat4::from_cols_array(&rows).transpose()
            }
            CameraPose::Projective { extrinsics, .. } => {
                Mat4::from_cols_array(extrinsics).transpose()
            }
            CameraPose::WorldToCamera(matrix) => {
                Mat4::from_cols_array(matrix).transpose().inverse()
            }
        }
    }

    /// Normalized focal lengths and principal point `[fx, fy, cx, cy]`.
    ///
    /// World-to-camera poses carry no intrinsics; `fallback_fovy` (degrees)
    /// is used for them.
    pub fn normalized_intrinsics(&self, fallback_fovy: f32) -> [f32; 4] {
        match self {
            CameraPose::Input { intrinsics, .. } => *intrinsics,
            CameraPose::Projective { intrinsics, .. } => {
                let k = Mat3::from_cols_array(intrinsics).transpose();
                [k.x_axis.x, k.y_axis.y, k.z_axis.x, k.z_axis.y]
            }
            CameraPose::WorldToCamera(_) => {
                let focal = 0.5 / (fallback_fovy.to_radians() * 0.5).tan();
                [focal, focal, 0.5, 0.5]
            }
        }
    }
}

/// Ordered camera poses, repeated for every entry of a batch
#[derive(Clone, Debug, PartialEq)]
pub struct CameraSet {
    pub batch_size: usize,
    pub mode: CameraMode,
    pub poses: Vec<CameraPose>,
}

impl CameraSet {
    pub fn new(batch_size: usize, mode: CameraMode, poses: Vec<CameraPose>) -> Self {
        Self { batch_size, mode, poses }
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Width of a single descriptor (0 for an empty set)
    pub fn descriptor_len(&self) -> usize {
        self.poses.first().map(|p| p.descriptor().len()).unwrap_or(0)
    }

    /// Poses in `range`, clipped to the set length
    pub fn slice(&self, range: Range<usize>) -> &[CameraPose] {
        let end = range.end.min(self.poses.len());
        let start = range.start.min(end);
        &self.poses[start..end]
    }

    /// `[batch, M, D]` row-major buffer
    pub fn batched(&self) -> Vec<f32> {
        let single: Vec<f32> = self.poses.iter().flat_map(|p| p.descriptor()).collect();
        let mut out = Vec::with_capacity(single.len() * self.batch_size);
        for _ in 0..self.batch_size {
            out.extend_from_slice(&single);
        }
        out
    }
}
