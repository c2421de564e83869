use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::RgbImage;
use log::info;

use crate::error::{Error, Result};

/// Whether the export axis remap has been applied
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AxisConvention {
    /// Coordinates as produced by the reconstruction model
    Model,
    /// (x, y, z) -> (y, z, -x) with reversed winding
    Export,
}

/// Per-mesh appearance data
#[derive(Clone, Debug)]
pub enum MeshAttributes {
    /// RGB in [0, 1], one per vertex
    VertexColors(Vec<[f32; 3]>),
    /// UV coordinates, per-face UV indices and the texture they address
    TextureMap {
        uvs: Vec<[f32; 2]>,
        face_uvs: Vec<[u32; 3]>,
        texture: RgbImage,
    },
}

#[derive(Clone, Debug)]
pub struct MeshAsset {
    pub vertices: Vec<[f32; 3]>,
    pub faces: Vec<[u32; 3]>,
    pub attributes: MeshAttributes,
    pub convention: AxisConvention,
}

impl MeshAsset {
    pub fn new(vertices: Vec<[f32; 3]>, faces: Vec<[u32; 3]>, attributes: MeshAttributes) -> Self {
        Self {
            vertices,
            faces,
            attributes,
            convention: AxisConvention::Model,
        }
    }

    /// Validate index ranges and attribute lengths
    pub fn validate(&self) -> Result<()> {
        let n = self.vertices.len() as u32;
        if let Some(face) = self.faces.iter().find(|f| f.iter().any(|&i| i >= n)) {
            return Err(Error::DataIntegrity(format!(
                "face {face:?} references a vertex outside 0..{n}"
            )));
        }

        match &self.attributes {
            MeshAttributes::VertexColors(colors) => {
                if colors.len() != self.vertices.len() {
                    return Err(Error::DataIntegrity(format!(
                        "{} vertex colors for {} vertices",
                        colors.len(),
                        self.vertices.len()
                    )));
                }
            }
            MeshAttributes::TextureMap { uvs, face_uvs, .. } => {
                if face_uvs.len() != self.faces.len() {
                    return Err(Error::DataIntegrity(format!(
                        "{} uv faces for {} faces",
                        face_uvs.len(),
                        self.faces.len()
                    )));
                }
                let m = uvs.len() as u32;
                if face_uvs.iter().any(|f| f.iter().any(|&i| i >= m)) {
                    return Err(Error::DataIntegrity(format!(
                        "uv face references a uv outside 0..{m}"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Apply (x, y, z) -> (y, z, -x) and reverse winding so normals stay outward.
    ///
    /// No-op if already in export convention.
    pub fn into_export_convention(mut self) -> Self {
        if self.convention == AxisConvention::Export {
            return self;
        }

        for v in &mut self.vertices {
            *v = [v[1], v[2], -v[0]];
        }
        for f in &mut self.faces {
            f.reverse();
        }
        if let MeshAttributes::TextureMap { face_uvs, .. } = &mut self.attributes {
            for f in face_uvs.iter_mut() {
                f.reverse();
            }
        }

        self.convention = AxisConvention::Export;
        self
    }
}

/// Mesh export variant. Each variant owns the set of files it writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshExport {
    /// `<base>.obj` + `<base>.mtl` + `<base>.png`
    TextureMapped,
    /// Single `<base>.obj` with per-vertex colors, in export convention
    VertexColored,
}

impl MeshExport {
    pub fn file_count(self) -> usize {
        match self {
            MeshExport::TextureMapped => 3,
            MeshExport::VertexColored => 1,
        }
    }

    /// Every file this variant writes for `geometry_path`, geometry first
    pub fn output_paths(self, geometry_path: &Path) -> Vec<PathBuf> {
        match self {
            MeshExport::TextureMapped => vec![
                geometry_path.to_path_buf(),
                geometry_path.with_extension("mtl"),
                geometry_path.with_extension("png"),
            ],
            MeshExport::VertexColored => vec![geometry_path.to_path_buf()],
        }
    }

    /// Write `mesh` and return the written paths
    pub fn write(self, mesh: MeshAsset, geometry_path: &Path) -> Result<Vec<PathBuf>> {
        mesh.validate()?;

        match (self, &mesh.attributes) {
            (MeshExport::TextureMapped, MeshAttributes::TextureMap { .. }) => {
                write_obj_with_mtl(&mesh, geometry_path)?;
                info!("Mesh with texture map saved to {}", geometry_path.display());
            }
            (MeshExport::VertexColored, MeshAttributes::VertexColors(_)) => {
                let mesh = mesh.into_export_convention();
                write_obj_vertex_colors(&mesh, geometry_path)?;
                info!("Mesh saved to {}", geometry_path.display());
            }
            _ => {
                return Err(Error::InvalidInput(format!(
                    "{self:?} export needs matching mesh attributes"
                )));
            }
        }

        Ok(self.output_paths(geometry_path))
    }
}

fn base_name(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_owned)
        .ok_or_else(|| Error::InvalidInput(format!("no file name in {}", path.display())))
}

fn write_obj_vertex_colors(mesh: &MeshAsset, path: &Path) -> Result<()> {
    let MeshAttributes::VertexColors(colors) = &mesh.attributes else {
        return Err(Error::InvalidInput("mesh has no vertex colors".to_string()));
    };

    let mut out = BufWriter::new(File::create(path)?);
    for (v, c) in mesh.vertices.iter().zip(colors) {
        writeln!(out, "v {} {} {} {} {} {}", v[0], v[1], v[2], c[0], c[1], c[2])?;
    }
    for f in &mesh.faces {
        writeln!(out, "f {} {} {}", f[0] + 1, f[1] + 1, f[2] + 1)?;
    }
    out.flush()?;
    Ok(())
}

fn write_obj_with_mtl(mesh: &MeshAsset, path: &Path) -> Result<()> {
    let MeshAttributes::TextureMap { uvs, face_uvs, texture } = &mesh.attributes else {
        return Err(Error::InvalidInput("mesh has no texture map".to_string()));
    };

    let base = base_name(path)?;
    let mtl_path = path.with_extension("mtl");
    let texture_path = path.with_extension("png");

    texture.save(&texture_path)?;

    let mut mtl = BufWriter::new(File::create(&mtl_path)?);
    writeln!(mtl, "newmtl material_0")?;
    writeln!(mtl, "Ka 1.000 1.000 1.000")?;
    writeln!(mtl, "Kd 1.000 1.000 1.000")?;
    writeln!(mtl, "Ks 0.000 0.000 0.000")?;
    writeln!(mtl, "d 1.0")?;
    writeln!(mtl, "illum 1")?;
    writeln!(mtl, "map_Kd {base}.png")?;
    mtl.flush()?;

    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "mtllib {base}.mtl")?;
    for v in &mesh.vertices {
        writeln!(out, "v {} {} {}", v[0], v[1], v[2])?;
    }
    for uv in uvs {
        writeln!(out, "vt {} {}", uv[0], uv[1])?;
    }
    writeln!(out, "usemtl material_0")?;
    for (f, t) in mesh.faces.iter().zip(face_uvs) {
        writeln!(
            out,
            "f {}/{} {}/{} {}/{}",
            f[0] + 1,
            t[0] + 1,
            f[1] + 1,
            t[1] + 1,
            f[2] + 1,
            t[2] + 1
        )?;
    }
    out.flush()?;
    Ok(())
}
