//! Stanford PLY. Any encoding on input, ASCII with double coordinates on output.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use ply_rs::parser::Parser;
use ply_rs::ply::{
    Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
    ScalarType,
};
use ply_rs::writer::Writer;

use crate::error::{MeshError, MeshResult};
use crate::{Mesh, Vertex};

const AXES: [&str; 3] = ["x", "y", "z"];

/// The names exporters use for the face index list.
const INDEX_LISTS: [&str; 2] = ["vertex_indices", "vertex_index"];

fn scalar(prop: &Property) -> Option<f64> {
    Some(match *prop {
        Property::Float(v) => v as f64,
        Property::Double(v) => v,
        Property::Int(v) => v as f64,
        Property::UInt(v) => v as f64,
        Property::Short(v) => v as f64,
        Property::UShort(v) => v as f64,
        Property::Char(v) => v as f64,
        Property::UChar(v) => v as f64,
        _ => return None,
    })
}

/// Negative indices become `u32::MAX` so index validation rejects them.
fn index_list(prop: &Property) -> Option<Vec<u32>> {
    fn signed<T: Copy + Into<i64>>(v: &[T]) -> Vec<u32> {
        v.iter().map(|&i| u32::try_from(i.into()).unwrap_or(u32::MAX)).collect()
    }
    match prop {
        Property::ListUInt(v) => Some(v.clone()),
        Property::ListUShort(v) => Some(v.iter().map(|&i| i as u32).collect()),
        Property::ListUChar(v) => Some(v.iter().map(|&i| i as u32).collect()),
        Property::ListInt(v) => Some(signed(v)),
        Property::ListShort(v) => Some(signed(v)),
        Property::ListChar(v) => Some(signed(v)),
        _ => None,
    }
}

pub(super) fn read(path: &Path) -> MeshResult<Mesh> {
    let file = File::open(path).map_err(|e| MeshError::io_read(path, e))?;
    let ply = Parser::<DefaultElement>::new()
        .read_ply(&mut BufReader::new(file))
        .map_err(|e| MeshError::parse_error(path, format!("PLY: {}", e)))?;

    let mut mesh = Mesh::new();
    for (n, element) in ply.payload.get("vertex").into_iter().flatten().enumerate() {
        let mut xyz = [0.0; 3];
        for (slot, axis) in xyz.iter_mut().zip(AXES) {
            *slot = element.get(axis).and_then(scalar).ok_or_else(|| {
                MeshError::parse_error(path, format!("PLY vertex {} has no numeric '{}'", n, axis))
            })?;
        }
        mesh.vertices.push(Vertex::from_coords(xyz[0], xyz[1], xyz[2]));
    }

    for element in ply.payload.get("face").into_iter().flatten() {
        let Some(polygon) = INDEX_LISTS
            .iter()
            .find_map(|name| element.get(*name))
            .and_then(index_list)
        else {
            continue;
        };
        // Fan triangulation; fewer than three corners yields nothing.
        for pair in polygon.windows(2).skip(1) {
            mesh.faces.push([polygon[0], pair[0], pair[1]]);
        }
    }

    Ok(mesh)
}

pub(super) fn write(mesh: &Mesh, path: &Path) -> MeshResult<()> {
    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = Encoding::Ascii;

    let mut vertex = ElementDef::new("vertex".to_string());
    for axis in AXES {
        vertex
            .properties
            .add(PropertyDef::new(axis.to_string(), PropertyType::Scalar(ScalarType::Double)));
    }
    let mut face = ElementDef::new("face".to_string());
    face.properties.add(PropertyDef::new(
        INDEX_LISTS[0].to_string(),
        PropertyType::List(ScalarType::UChar, ScalarType::UInt),
    ));
    ply.header.elements.add(vertex);
    ply.header.elements.add(face);

    let vertices = mesh
        .vertices
        .iter()
        .map(|v| {
            let mut element = DefaultElement::new();
            for (axis, value) in AXES.into_iter().zip(v.position.coords.iter()) {
                element.insert(axis.to_string(), Property::Double(*value));
            }
            element
        })
        .collect();
    let faces = mesh
        .faces
        .iter()
        .map(|f| {
            let mut element = DefaultElement::new();
            element.insert(INDEX_LISTS[0].to_string(), Property::ListUInt(f.to_vec()));
            element
        })
        .collect();
    ply.payload.insert("vertex".to_string(), vertices);
    ply.payload.insert("face".to_string(), faces);

    ply.make_consistent()
        .map_err(|e| MeshError::write_failed(path, format!("PLY header: {:?}", e)))?;

    let file = File::create(path).map_err(|e| MeshError::io_write(path, e))?;
    let mut out = BufWriter::new(file);
    Writer::new()
        .write_ply(&mut out, &mut ply)
        .map_err(|e| MeshError::io_write(path, e))?;
    out.flush().map_err(|e| MeshError::io_write(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn ply_file(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".ply").unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    const HEADER: &str = "ply\nformat ascii 1.0\nelement vertex 4\nproperty float x\nproperty float y\nproperty float z\n";

    #[test]
    fn polygons_are_fan_triangulated() {
        let text = format!(
            "{}element face 1\nproperty list uchar int vertex_index\nend_header\n\
             0 0 0\n2 0 0\n2 2 0\n0 2 0\n4 0 1 2 3\n",
            HEADER
        );
        let mesh = read(ply_file(&text).path()).unwrap();
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn negative_index_cannot_alias_a_vertex() {
        let text = format!(
            "{}element face 1\nproperty list uchar int vertex_indices\nend_header\n\
             0 0 0\n2 0 0\n2 2 0\n0 2 0\n3 0 1 -1\n",
            HEADER
        );
        let mesh = read(ply_file(&text).path()).unwrap();
        assert_eq!(mesh.faces, vec![[0, 1, u32::MAX]]);
    }

    #[test]
    fn coordinates_survive_at_double_precision() {
        let x = 0.1 + 0.2;
        let mesh = Mesh::from_parts([[x, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], vec![[0, 1, 2]]);
        let file = NamedTempFile::with_suffix(".ply").unwrap();
        write(&mesh, file.path()).unwrap();
        assert_eq!(read(file.path()).unwrap().vertices[0].position.x, x);
    }
}
