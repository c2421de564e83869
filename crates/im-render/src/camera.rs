use glam::{Mat3, Mat4, Vec3};

use im_core::camera::{CameraMode, CameraPose, CameraSet};
use im_core::error::{Error, Result};

/// Vertical field of view shared by conditioning and render cameras (degrees)
pub const DEFAULT_FOV: f32 = 30.0;

/// Azimuths of the six synthesized views (degrees)
pub const INPUT_AZIMUTHS: [f32; 6] = [30.0, 90.0, 150.0, 210.0, 270.0, 330.0];
/// Elevations of the six synthesized views (degrees)
pub const INPUT_ELEVATIONS: [f32; 6] = [20.0, -10.0, 20.0, -10.0, 20.0, -10.0];

/// Point on a sphere around the origin, world up is +Z
pub fn spherical_position(azimuth_deg: f32, elevation_deg: f32, radius: f32) -> Vec3 {
    let azimuth = azimuth_deg.to_radians();
    let elevation = elevation_deg.to_radians();

    Vec3::new(
        radius * elevation.cos() * azimuth.cos(),
        radius * elevation.cos() * azimuth.sin(),
        radius * elevation.sin(),
    )
}

/// Camera-to-world pose at `position` looking at the origin.
///
/// The camera looks down its -Z axis; +Y is as close to world +Z as possible.
pub fn look_at_origin(position: Vec3) -> Mat4 {
    let z_axis = position.normalize();
    let x_axis = Vec3::Z.cross(z_axis).normalize();
    let y_axis = z_axis.cross(x_axis).normalize();

    Mat4::from_cols(
        x_axis.extend(0.0),
        y_axis.extend(0.0),
        z_axis.extend(0.0),
        position.extend(1.0),
    )
}

/// `M` camera-to-world poses evenly spaced on a circle at fixed elevation
pub fn circular_poses(m: usize, radius: f32, elevation_deg: f32) -> Vec<Mat4> {
    (0..m)
        .map(|i| {
            let azimuth = (360.0 * i as f64 / m as f64) as f32;
            look_at_origin(spherical_position(azimuth, elevation_deg, radius))
        })
        .collect()
}

/// Normalized intrinsics (principal point at the image center)
pub fn fov_to_intrinsics(fov_deg: f32) -> Mat3 {
    let focal = 0.5 / (fov_deg.to_radians() * 0.5).tan();
    Mat3::from_cols(
        Vec3::new(focal, 0.0, 0.0),
        Vec3::new(0.0, focal, 0.0),
        Vec3::new(0.5, 0.5, 1.0),
    )
}

fn row_major4(m: &Mat4) -> [f32; 16] {
    m.transpose().to_cols_array()
}

fn row_major3(m: &Mat3) -> [f32; 9] {
    m.transpose().to_cols_array()
}

/// The six conditioning cameras matching the synthesizer's view layout
pub fn input_cameras(batch_size: usize, radius: f32) -> CameraSet {
    let k = fov_to_intrinsics(DEFAULT_FOV);
    let intrinsics = [k.x_axis.x, k.y_axis.y, k.z_axis.x, k.z_axis.y];

    let poses = INPUT_AZIMUTHS
        .iter()
        .zip(INPUT_ELEVATIONS.iter())
        .map(|(&azimuth, &elevation)| {
            let c2w = look_at_origin(spherical_position(azimuth, elevation, radius));
            let rows = row_major4(&c2w);
            let mut extrinsics = [0.0f32; 12];
            extrinsics.copy_from_slice(&rows[..12]);
            CameraPose::Input { extrinsics, intrinsics }
        })
        .collect();

    CameraSet::new(batch_size, CameraMode::Standard, poses)
}

/// Orbit cameras used for the preview video
pub fn render_cameras(
    batch_size: usize,
    m: usize,
    radius: f32,
    elevation_deg: f32,
    mode: CameraMode,
) -> Result<CameraSet> {
    if m == 0 {
        return Err(Error::InvalidConfig("render camera count must be positive".to_string()));
    }
    if !(radius > 0.0) {
        return Err(Error::InvalidConfig(format!("orbit radius must be positive, got {radius}")));
    }
    if !(elevation_deg.abs() < 90.0) {
        return Err(Error::InvalidConfig(format!(
            "orbit elevation must be within (-90, 90), got {elevation_deg}"
        )));
    }

    let intrinsics = row_major3(&fov_to_intrinsics(DEFAULT_FOV));
    let poses = circular_poses(m, radius, elevation_deg)
        .iter()
        .map(|c2w| match mode {
            CameraMode::ImplicitSurface => CameraPose::WorldToCamera(row_major4(&c2w.inverse())),
            CameraMode::Standard => CameraPose::Projective {
                extrinsics: row_major4(c2w),
                intrinsics,
            },
        })
        .collect();

    Ok(CameraSet::new(batch_size, mode, poses))
}
