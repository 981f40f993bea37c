//! STL, binary or ASCII on input, binary on output.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use hashbrown::HashMap;
use stl_io::{Normal, Triangle as StlTriangle, Vertex as StlVertex};

use super::append_part;
use crate::error::{MeshError, MeshResult};
use crate::Mesh;

/// Coincident corners share one vertex. Keys are the raw float bits with
/// `-0.0` folded onto `0.0`.
fn weld_key(corner: &StlVertex) -> [u32; 3] {
    [0, 1, 2].map(|i| {
        let c = corner[i];
        if c == 0.0 { 0 } else { c.to_bits() }
    })
}

pub(super) fn read(path: &Path) -> MeshResult<Mesh> {
    let file = File::open(path).map_err(|e| MeshError::io_read(path, e))?;
    let mut reader = BufReader::new(file);
    let triangles = stl_io::create_stl_reader(&mut reader)
        .map_err(|e| MeshError::parse_error(path, e.to_string()))?;

    let mut index: HashMap<[u32; 3], u32> = HashMap::new();
    let mut positions: Vec<[f64; 3]> = Vec::new();
    let mut faces: Vec<[u32; 3]> = Vec::new();
    let mut collapsed = 0usize;

    for triangle in triangles {
        let triangle = triangle.map_err(|e| MeshError::parse_error(path, e.to_string()))?;
        let face = triangle.vertices.each_ref().map(|corner| {
            *index.entry(weld_key(corner)).or_insert_with(|| {
                positions.push([corner[0] as f64, corner[1] as f64, corner[2] as f64]);
                (positions.len() - 1) as u32
            })
        });
        if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
            collapsed += 1;
        } else {
            faces.push(face);
        }
    }

    tracing::debug!(
        vertices = positions.len(),
        faces = faces.len(),
        collapsed,
        "STL welded"
    );

    let mut mesh = Mesh::with_capacity(positions.len(), faces.len());
    append_part(&mut mesh, positions, faces);
    Ok(mesh)
}

pub(super) fn write(mesh: &Mesh, path: &Path) -> MeshResult<()> {
    let corner = |p: nalgebra::Point3<f64>| StlVertex::new([p.x as f32, p.y as f32, p.z as f32]);
    let triangles: Vec<StlTriangle> = mesh
        .triangles()
        .map(|tri| {
            let n = tri.normal().unwrap_or_else(nalgebra::Vector3::zeros);
            StlTriangle {
                normal: Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                vertices: [corner(tri.v0), corner(tri.v1), corner(tri.v2)],
            }
        })
        .collect();

    let file = File::create(path).map_err(|e| MeshError::io_write(path, e))?;
    let mut out = BufWriter::new(file);
    stl_io::write_stl(&mut out, triangles.iter()).map_err(|e| MeshError::write_failed(path, e))?;
    out.flush().map_err(|e| MeshError::io_write(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn ascii_stl(body: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".stl").unwrap();
        write!(file, "solid t\n{}endsolid t\n", body).unwrap();
        file
    }

    fn facet(corners: [[f32; 3]; 3]) -> String {
        let mut s = String::from("facet normal 0 0 0\nouter loop\n");
        for [x, y, z] in corners {
            s.push_str(&format!("vertex {} {} {}\n", x, y, z));
        }
        s.push_str("endloop\nendfacet\n");
        s
    }

    #[test]
    fn shared_corners_are_welded() {
        let body = facet([[0.0, 0.0, 0.0], [5.0, 0.0, 0.0], [0.0, 5.0, 0.0]])
            + &facet([[5.0, 0.0, 0.0], [5.0, 5.0, 0.0], [0.0, 5.0, 0.0]]);
        let mesh = read(ascii_stl(&body).path()).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.faces, vec![[0, 1, 2], [1, 3, 2]]);
    }

    #[test]
    fn negative_zero_welds_with_zero() {
        let body = facet([[0.0, 0.0, 0.0], [5.0, 0.0, 0.0], [0.0, 5.0, 0.0]])
            + &facet([[-0.0, 0.0, -0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 5.0]]);
        let mesh = read(ascii_stl(&body).path()).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
    }

    #[test]
    fn collapsed_facets_are_dropped() {
        let body = facet([[0.0, 0.0, 0.0], [5.0, 0.0, 0.0], [0.0, 5.0, 0.0]])
            + &facet([[1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [2.0, 1.0, 1.0]]);
        let mesh = read(ascii_stl(&body).path()).unwrap();
        assert_eq!(mesh.face_count(), 1);
    }

    #[test]
    fn output_is_binary() {
        let mesh = Mesh::from_parts([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], vec![[0, 1, 2]]);
        let file = NamedTempFile::with_suffix(".stl").unwrap();
        write(&mesh, file.path()).unwrap();
        // 80-byte header, u32 count, 50 bytes per triangle.
        assert_eq!(std::fs::metadata(file.path()).unwrap().len(), 84 + 50);
    }
}
