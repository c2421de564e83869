use glam::Vec3;

use im_core::camera::CameraPose;
use im_core::pipeline::TriplanePlanes;

/// Half extent of the reconstructed volume, centered at the origin
pub const SCENE_BOUND: f32 = 1.0;

/// White background behind the object
pub const BACKGROUND: f32 = 1.0;

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

/// One ray per pixel, row-major, through pixel centers
pub fn camera_rays(pose: &CameraPose, size: u32, fallback_fovy: f32) -> Vec<Ray> {
    let c2w = pose.camera_to_world();
    let [fx, fy, cx, cy] = pose.normalized_intrinsics(fallback_fovy);
    let origin = c2w.w_axis.truncate();
    let size_f = size as f32;

    let mut rays = Vec::with_capacity((size * size) as usize);
    for py in 0..size {
        for px in 0..size {
            let u = (px as f32 + 0.5) / size_f;
            let v = (py as f32 + 0.5) / size_f;
            let dir_cam = Vec3::new((u - cx) / fx, -(v - cy) / fy, -1.0);
            let dir = c2w.transform_vector3(dir_cam).normalize();
            rays.push(Ray { origin, dir });
        }
    }
    rays
}

/// Entry and exit distances of `ray` through the scene cube
pub fn ray_box(ray: &Ray) -> Option<(f32, f32)> {
    let mut t_near = 0.0f32;
    let mut t_far = f32::INFINITY;

    for axis in 0..3 {
        let o = ray.origin[axis];
        let d = ray.dir[axis];
        if d.abs() < 1e-8 {
            if o.abs() > SCENE_BOUND {
                return None;
            }
            continue;
        }
        let t0 = (-SCENE_BOUND - o) / d;
        let t1 = (SCENE_BOUND - o) / d;
        let (t0, t1) = if t0 < t1 { (t0, t1) } else { (t1, t0) };
        t_near = t_near.max(t0);
        t_far = t_far.min(t1);
    }

    (t_near < t_far).then_some((t_near, t_far))
}

/// Append the summed bilinear features of the xy, xz and yz planes at `p`
pub fn sample_features(planes: &TriplanePlanes, p: Vec3, out: &mut Vec<f32>) {
    let channels = planes.channels;
    let last = (planes.resolution - 1) as f32;
    let start = out.len();
    out.resize(start + channels, 0.0);

    for (plane, (a, b)) in [(p.x, p.y), (p.x, p.z), (p.y, p.z)].into_iter().enumerate() {
        let fu = ((a / SCENE_BOUND + 1.0) * 0.5 * last).clamp(0.0, last);
        let fv = ((b / SCENE_BOUND + 1.0) * 0.5 * last).clamp(0.0, last);
        let (u0, v0) = (fu.floor() as usize, fv.floor() as usize);
        let (u1, v1) = ((u0 + 1).min(planes.resolution - 1), (v0 + 1).min(planes.resolution - 1));
        let (du, dv) = (fu - u0 as f32, fv - v0 as f32);

        for c in 0..channels {
            let top = planes.value(plane, c, u0, v0) * (1.0 - du) + planes.value(plane, c, u1, v0) * du;
            let bottom = planes.value(plane, c, u0, v1) * (1.0 - du) + planes.value(plane, c, u1, v1) * du;
            out[start + c] += top * (1.0 - dv) + bottom * dv;
        }
    }
}

/// Front-to-back alpha compositing of (density, r, g, b) samples
pub fn composite(samples: &[[f32; 4]], delta: f32) -> [f32; 3] {
    let mut transmittance = 1.0f32;
    let mut color = [0.0f32; 3];

    for s in samples {
        let alpha = 1.0 - (-s[0] * delta).exp();
        let weight = transmittance * alpha;
        for c in 0..3 {
            color[c] += weight * s[c + 1];
        }
        transmittance *= 1.0 - alpha;
        if transmittance < 1e-4 {
            break;
        }
    }

    color.map(|c| (c + transmittance * BACKGROUND).clamp(0.0, 1.0))
}
