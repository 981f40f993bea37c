//! Wavefront OBJ. Every group is merged; polygons are triangulated by tobj.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::append_part;
use crate::error::{MeshError, MeshResult};
use crate::Mesh;

pub(super) fn read(path: &Path) -> MeshResult<Mesh> {
    let options = tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    };
    // Materials are irrelevant for geometry; a missing .mtl is not an error.
    let (models, _) = tobj::load_obj(path, &options).map_err(|e| MeshError::parse_error(path, e.to_string()))?;

    let mut mesh = Mesh::new();
    for model in &models {
        let part = &model.mesh;
        append_part(
            &mut mesh,
            part.positions
                .chunks_exact(3)
                .map(|p| [p[0] as f64, p[1] as f64, p[2] as f64]),
            part.indices.chunks_exact(3).map(|f| [f[0], f[1], f[2]]),
        );
    }
    tracing::debug!(groups = models.len(), faces = mesh.face_count(), "OBJ merged");
    Ok(mesh)
}

pub(super) fn write(mesh: &Mesh, path: &Path) -> MeshResult<()> {
    let file = File::create(path).map_err(|e| MeshError::io_write(path, e))?;
    let mut out = BufWriter::new(file);
    write_body(mesh, &mut out)
        .and_then(|()| out.flush())
        .map_err(|e| MeshError::io_write(path, e))
}

fn write_body(mesh: &Mesh, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "# mesh-prep: {} vertices, {} faces", mesh.vertex_count(), mesh.face_count())?;
    writeln!(out, "o part")?;
    for v in &mesh.vertices {
        let p = v.position;
        writeln!(out, "v {} {} {}", p.x, p.y, p.z)?;
    }
    // OBJ indices start at 1.
    for [a, b, c] in &mesh.faces {
        writeln!(out, "f {} {} {}", a + 1, b + 1, c + 1)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn groups_and_quads_are_merged_into_triangles() {
        let mut file = NamedTempFile::with_suffix(".obj").unwrap();
        writeln!(
            file,
            "mtllib missing.mtl\n\
             o base\nv 0 0 0\nv 4 0 0\nv 4 4 0\nv 0 4 0\nf 1 2 3 4\n\
             o flag\nv 0 0 1\nv 1 0 1\nv 0 1 1\nf 5 6 7\n\
             l 1 5"
        )
        .unwrap();

        let mesh = read(file.path()).unwrap();
        assert_eq!(mesh.face_count(), 3);
        assert_eq!(mesh.vertex_count(), 7);
        assert!(mesh.faces[2].iter().all(|&i| i >= 4));
    }

    #[test]
    fn written_indices_are_one_based() {
        let mesh = Mesh::from_parts([[0.0, 0.0, 0.0], [1.5, 0.0, 0.0], [0.0, 2.0, 0.0]], vec![[0, 1, 2]]);
        let mut buf = Vec::new();
        write_body(&mesh, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("v 1.5 0 0\n"));
        assert!(text.ends_with("f 1 2 3\n"));
    }
}
