use std::collections::HashMap;

use glam::Vec3;
use image::{Rgb, RgbImage};
use log::{debug, warn};

use im_core::error::{Error, Result};
use im_core::mesh::{MeshAsset, MeshAttributes, MeshExport};

use crate::volume::SCENE_BOUND;

/// Neighbor offset and outward-wound corner offsets for each voxel face
const FACES: [([i32; 3], [[usize; 3]; 4]); 6] = [
    ([1, 0, 0], [[1, 0, 0], [1, 1, 0], [1, 1, 1], [1, 0, 1]]),
    ([-1, 0, 0], [[0, 0, 0], [0, 0, 1], [0, 1, 1], [0, 1, 0]]),
    ([0, 1, 0], [[0, 1, 0], [0, 1, 1], [1, 1, 1], [1, 1, 0]]),
    ([0, -1, 0], [[0, 0, 0], [1, 0, 0], [1, 0, 1], [0, 0, 1]]),
    ([0, 0, 1], [[0, 0, 1], [1, 0, 1], [1, 1, 1], [0, 1, 1]]),
    ([0, 0, -1], [[0, 0, 0], [0, 1, 0], [1, 1, 0], [1, 0, 0]]),
];

/// Density grid sampled at voxel centers, x fastest
pub struct DensityGrid {
    pub resolution: usize,
    pub density: Vec<f32>,
}

impl DensityGrid {
    pub fn sample(resolution: usize, query: &dyn Fn(&[Vec3]) -> Vec<[f32; 4]>) -> Self {
        let centers: Vec<Vec3> = (0..resolution)
            .flat_map(|k| (0..resolution).flat_map(move |j| (0..resolution).map(move |i| [i, j, k])))
            .map(|[i, j, k]| {
                let c = |n: usize| -SCENE_BOUND + (n as f32 + 0.5) * 2.0 * SCENE_BOUND / resolution as f32;
                Vec3::new(c(i), c(j), c(k))
            })
            .collect();

        let density = query(&centers).iter().map(|s| s[0]).collect();
        Self { resolution, density }
    }

    fn solid(&self, i: i32, j: i32, k: i32, threshold: f32) -> bool {
        let g = self.resolution as i32;
        if i < 0 || j < 0 || k < 0 || i >= g || j >= g || k >= g {
            return false;
        }
        self.density[(k * g * g + j * g + i) as usize] > threshold
    }
}

/// Outward-facing quads on the boundary of solid voxels.
///
/// Returns shared corner vertices and quads as four vertex indices each.
pub fn boundary_quads(grid: &DensityGrid, threshold: f32) -> (Vec<Vec3>, Vec<[u32; 4]>) {
    let g = grid.resolution as i32;
    let step = 2.0 * SCENE_BOUND / grid.resolution as f32;
    let mut corner_index: HashMap<[usize; 3], u32> = HashMap::new();
    let mut vertices = Vec::new();
    let mut quads = Vec::new();

    for k in 0..g {
        for j in 0..g {
            for i in 0..g {
                if !grid.solid(i, j, k, threshold) {
                    continue;
                }
                for (offset, corners) in FACES {
                    if grid.solid(i + offset[0], j + offset[1], k + offset[2], threshold) {
                        continue;
                    }
                    let quad = corners.map(|c| {
                        let key = [i as usize + c[0], j as usize + c[1], k as usize + c[2]];
                        *corner_index.entry(key).or_insert_with(|| {
                            vertices.push(Vec3::new(
                                -SCENE_BOUND + key[0] as f32 * step,
                                -SCENE_BOUND + key[1] as f32 * step,
                                -SCENE_BOUND + key[2] as f32 * step,
                            ));
                            (vertices.len() - 1) as u32
                        })
                    });
                    quads.push(quad);
                }
            }
        }
    }

    (vertices, quads)
}

fn triangulate(quads: &[[u32; 4]]) -> Vec<[u32; 3]> {
    quads
        .iter()
        .flat_map(|q| [[q[0], q[1], q[2]], [q[0], q[2], q[3]]])
        .collect()
}

fn to_u8(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// One bilinear-shaded tile per quad; UV v axis points up (OBJ convention)
fn texture_atlas(
    quads: &[[u32; 4]],
    colors: &[[f32; 3]],
    tile: u32,
) -> Result<(Vec<[f32; 2]>, Vec<[u32; 3]>, RgbImage)> {
    if tile < 2 {
        return Err(Error::InvalidConfig(format!("texture tile must be at least 2 texels, got {tile}")));
    }

    let count = quads.len().max(1) as u32;
    let cols = (count as f64).sqrt().ceil() as u32;
    let rows = count.div_ceil(cols);
    let (width, height) = (cols * tile, rows * tile);
    let mut texture = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    let mut uvs = Vec::with_capacity(quads.len() * 4);
    let mut face_uvs = Vec::with_capacity(quads.len() * 2);
    let span = (tile - 1) as f32;

    for (q, quad) in quads.iter().enumerate() {
        let (tx, ty) = ((q as u32 % cols) * tile, (q as u32 / cols) * tile);
        let [c0, c1, c2, c3] = quad.map(|v| colors[v as usize]);

        for y in 0..tile {
            for x in 0..tile {
                let (s, t) = (x as f32 / span, y as f32 / span);
                let rgb: [u8; 3] = std::array::from_fn(|ch| {
                    let top = c0[ch] * (1.0 - s) + c1[ch] * s;
                    let bottom = c3[ch] * (1.0 - s) + c2[ch] * s;
                    to_u8(top * (1.0 - t) + bottom * t)
                });
                texture.put_pixel(tx + x, ty + y, Rgb(rgb));
            }
        }

        for (s, t) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            let u = (tx as f32 + 0.5 + s * span) / width as f32;
            let v = (ty as f32 + 0.5 + t * span) / height as f32;
            uvs.push([u, 1.0 - v]);
        }
        let base = (q * 4) as u32;
        face_uvs.push([base, base + 1, base + 2]);
        face_uvs.push([base, base + 2, base + 3]);
    }

    Ok((uvs, face_uvs, texture))
}

/// Extract a mesh from a density/color field.
///
/// `query` maps world points to (density, r, g, b).
pub fn extract_mesh(
    query: &dyn Fn(&[Vec3]) -> Vec<[f32; 4]>,
    resolution: usize,
    threshold: f32,
    texture_tile: u32,
    variant: MeshExport,
) -> Result<MeshAsset> {
    if resolution == 0 {
        return Err(Error::InvalidConfig("mesh resolution must be positive".to_string()));
    }

    let grid = DensityGrid::sample(resolution, query);
    let (corners, quads) = boundary_quads(&grid, threshold);
    if quads.is_empty() {
        warn!("No voxel above density {threshold}; exporting an empty mesh");
    }
    debug!("Extracted {} vertices, {} quads", corners.len(), quads.len());

    let colors: Vec<[f32; 3]> = query(&corners).iter().map(|s| [s[1], s[2], s[3]]).collect();
    let vertices = corners.iter().map(|v| v.to_array()).collect();
    let faces = triangulate(&quads);

    let attributes = match variant {
        MeshExport::VertexColored => MeshAttributes::VertexColors(colors),
        MeshExport::TextureMapped => {
            let (uvs, face_uvs, texture) = texture_atlas(&quads, &colors, texture_tile)?;
            MeshAttributes::TextureMap { uvs, face_uvs, texture }
        }
    };

    let mesh = MeshAsset::new(vertices, faces, attributes);
    mesh.validate()?;
    Ok(mesh)
}
