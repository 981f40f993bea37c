//! Mesh file I/O for STL, OBJ, PLY and 3MF.
//!
//! Every loader returns a single [`Mesh`]: multi-object containers (OBJ
//! groups, 3MF build items and components) are concatenated into one shape
//! with per-part vertex offsets. Writers emit one object in millimeters;
//! STL is always written binary and PLY as ASCII.

mod obj;
mod ply;
mod stl;
mod threemf;

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{MeshError, MeshResult};
use crate::validate::validate_mesh_data;
use crate::{Mesh, Vertex};

/// Parts smaller than this in every direction were probably exported in meters.
const SUSPICIOUSLY_SMALL_MM: f64 = 0.1;

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Stl,
    Obj,
    ThreeMf,
    Ply,
}

impl MeshFormat {
    pub const ALL: [MeshFormat; 4] = [MeshFormat::Stl, MeshFormat::Obj, MeshFormat::Ply, MeshFormat::ThreeMf];

    /// Detect format from the file extension, ignoring case.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::ALL
            .into_iter()
            .find(|format| format.extension().eq_ignore_ascii_case(ext))
    }

    /// Like [`MeshFormat::from_path`], but an unknown extension is an error.
    pub fn require(path: &Path) -> MeshResult<Self> {
        Self::from_path(path).ok_or_else(|| MeshError::UnsupportedFormat {
            extension: path.extension().and_then(|e| e.to_str()).map(String::from),
        })
    }

    /// Canonical lowercase file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            MeshFormat::Stl => "stl",
            MeshFormat::Obj => "obj",
            MeshFormat::ThreeMf => "3mf",
            MeshFormat::Ply => "ply",
        }
    }

    fn read(self, path: &Path) -> MeshResult<Mesh> {
        match self {
            MeshFormat::Stl => stl::read(path),
            MeshFormat::Obj => obj::read(path),
            MeshFormat::ThreeMf => threemf::read(path),
            MeshFormat::Ply => ply::read(path),
        }
    }

    fn write(self, mesh: &Mesh, path: &Path) -> MeshResult<()> {
        match self {
            MeshFormat::Stl => stl::write(mesh, path),
            MeshFormat::Obj => obj::write(mesh, path),
            MeshFormat::ThreeMf => threemf::write(mesh, path),
            MeshFormat::Ply => ply::write(mesh, path),
        }
    }
}

/// Load a mesh from file, auto-detecting format from extension.
///
/// The result is the merged geometry in file coordinates; see
/// [`load_normalized`] for the canonical resting frame.
pub fn load_mesh(path: &Path) -> MeshResult<Mesh> {
    if !path.exists() {
        return Err(MeshError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let format = MeshFormat::require(path)?;
    debug!(path = %path.display(), ?format, "reading mesh");

    let mesh = format.read(path)?;
    if mesh.faces.is_empty() {
        return Err(MeshError::empty_mesh("Scene is empty"));
    }
    validate_mesh_data(&mesh)?;

    let dims = mesh.extents();
    info!(
        path = %path.display(),
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        "Loaded mesh ({:.1} x {:.1} x {:.1} mm)",
        dims.x,
        dims.y,
        dims.z
    );
    if dims.max() < SUSPICIOUSLY_SMALL_MM {
        warn!(largest = dims.max(), "mesh is tiny; was it exported in meters?");
    }

    Ok(mesh)
}

/// Load a mesh and move it into the canonical resting frame.
pub fn load_normalized(path: &Path) -> MeshResult<Mesh> {
    Ok(load_mesh(path)?.normalized())
}

/// Save mesh to file, choosing the format from the extension.
pub fn save_mesh(mesh: &Mesh, path: &Path) -> MeshResult<()> {
    save_mesh_as(mesh, path, MeshFormat::require(path)?)
}

/// Save mesh to file in an explicit format, regardless of the extension.
pub fn save_mesh_as(mesh: &Mesh, path: &Path, format: MeshFormat) -> MeshResult<()> {
    format.write(mesh, path)?;
    info!(
        path = %path.display(),
        ?format,
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        "Saved mesh"
    );
    Ok(())
}

/// Write `mesh` over `path` in the given format.
///
/// The data goes to a hidden sibling file first and is renamed into place,
/// so a failed write leaves the original untouched.
pub fn overwrite_mesh(mesh: &Mesh, path: &Path, format: MeshFormat) -> MeshResult<()> {
    let staging = staging_path(path, format);
    let result = save_mesh_as(mesh, &staging, format)
        .and_then(|()| std::fs::rename(&staging, path).map_err(|e| MeshError::io_write(path, e)));
    if result.is_err() {
        let _ = std::fs::remove_file(&staging);
    }
    result
}

fn staging_path(path: &Path, format: MeshFormat) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("mesh");
    path.with_file_name(format!(
        ".{}.{}.partial.{}",
        stem,
        std::process::id(),
        format.extension()
    ))
}

/// Append a part to `target`, shifting its indices past the existing vertices.
fn append_part(
    target: &mut Mesh,
    positions: impl IntoIterator<Item = [f64; 3]>,
    faces: impl IntoIterator<Item = [u32; 3]>,
) {
    let base = target.vertices.len() as u32;
    target
        .vertices
        .extend(positions.into_iter().map(|[x, y, z]| Vertex::from_coords(x, y, z)));
    target
        .faces
        .extend(faces.into_iter().map(|[a, b, c]| [a + base, b + base, c + base]));
}
