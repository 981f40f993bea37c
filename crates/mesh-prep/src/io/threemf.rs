//! 3MF: a ZIP package whose model part lists objects (meshes or assemblies
//! of other objects) and a build section placing them.
//!
//! Every placed object is flattened into one mesh with its composed
//! transform applied, then scaled from the model unit to millimeters.

use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;

use hashbrown::HashMap;
use nalgebra::{Matrix3, Point3, Vector3};
use quick_xml::Reader;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};

use super::append_part;
use crate::error::{MeshError, MeshResult};
use crate::validate::validate_mesh_data;
use crate::Mesh;

const MODEL_PART: &str = "3D/3dmodel.model";
const CORE_NAMESPACE: &str = "http://schemas.microsoft.com/3dmanufacturing/core/2015/02";
const CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="model" ContentType="application/vnd.ms-package.3dmanufacturing-3dmodel+xml"/>"#,
    r#"</Types>"#,
);
const RELATIONSHIPS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Target="/3D/3dmodel.model" Id="rel0" Type="http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel"/>"#,
    r#"</Relationships>"#,
);

/// Deeper component chains are treated as cycles.
const MAX_NESTING: usize = 16;

/// Affine placement `p -> linear * p + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Placement {
    linear: Matrix3<f64>,
    offset: Vector3<f64>,
}

impl Placement {
    fn identity() -> Self {
        Placement {
            linear: Matrix3::identity(),
            offset: Vector3::zeros(),
        }
    }

    /// 3MF writes `m00 m01 m02 m10 m11 m12 m20 m21 m22 m30 m31 m32` for
    /// row vectors; stored here transposed for column vectors.
    fn from_3mf(m: [f64; 12]) -> Self {
        Placement {
            linear: Matrix3::new(m[0], m[3], m[6], m[1], m[4], m[7], m[2], m[5], m[8]),
            offset: Vector3::new(m[9], m[10], m[11]),
        }
    }

    /// `self` applied after `inner`.
    fn compose(&self, inner: &Placement) -> Placement {
        Placement {
            linear: self.linear * inner.linear,
            offset: self.linear * inner.offset + self.offset,
        }
    }

    fn apply(&self, p: &Point3<f64>) -> [f64; 3] {
        let q = self.linear * p.coords + self.offset;
        [q.x, q.y, q.z]
    }
}

#[derive(Debug, Default)]
struct Object {
    mesh: Mesh,
    components: Vec<(u32, Placement)>,
}

/// Streaming state while walking the model XML.
struct ModelParser<'p> {
    path: &'p Path,
    objects: HashMap<u32, Object>,
    declared: Vec<u32>,
    open: Option<(u32, Object)>,
    items: Vec<(u32, Placement)>,
    unit_scale: f64,
    in_build: bool,
}

impl<'p> ModelParser<'p> {
    fn new(path: &'p Path) -> Self {
        ModelParser {
            path,
            objects: HashMap::new(),
            declared: Vec::new(),
            open: None,
            items: Vec::new(),
            unit_scale: 1.0,
            in_build: false,
        }
    }

    fn error(&self, details: impl Into<String>) -> MeshError {
        MeshError::parse_error(self.path, details)
    }

    fn attr<T: std::str::FromStr>(&self, e: &BytesStart<'_>, name: &str) -> MeshResult<T> {
        let raw = self
            .raw_attr(e, name)
            .ok_or_else(|| self.error(format!("<{}> lacks '{}'", local_name(e), name)))?;
        raw.trim()
            .parse()
            .map_err(|_| self.error(format!("bad value {}=\"{}\"", name, raw)))
    }

    fn raw_attr(&self, e: &BytesStart<'_>, name: &str) -> Option<String> {
        e.attributes()
            .flatten()
            .find(|a| a.key.local_name().as_ref() == name.as_bytes())
            .map(|a| String::from_utf8_lossy(&a.value).into_owned())
    }

    fn placement(&self, e: &BytesStart<'_>) -> MeshResult<Placement> {
        let Some(raw) = self.raw_attr(e, "transform") else {
            return Ok(Placement::identity());
        };
        let values: Vec<f64> = raw
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|_| self.error(format!("bad transform \"{}\"", raw)))?;
        let m: [f64; 12] = values
            .try_into()
            .map_err(|_| self.error(format!("transform needs 12 values: \"{}\"", raw)))?;
        Ok(Placement::from_3mf(m))
    }

    fn start(&mut self, e: &BytesStart<'_>, self_closing: bool) -> MeshResult<()> {
        match e.local_name().as_ref() {
            b"model" => {
                if let Some(unit) = self.raw_attr(e, "unit") {
                    self.unit_scale = unit_to_mm(&unit).ok_or_else(|| self.error(format!("unknown unit '{}'", unit)))?;
                }
            }
            b"object" => {
                let id = self.attr(e, "id")?;
                self.declared.push(id);
                if self_closing {
                    self.objects.insert(id, Object::default());
                } else {
                    self.open = Some((id, Object::default()));
                }
            }
            b"vertex" => {
                let p = Point3::new(self.attr(e, "x")?, self.attr(e, "y")?, self.attr(e, "z")?);
                if let Some((_, object)) = self.open.as_mut() {
                    object.mesh.vertices.push(crate::Vertex::new(p));
                }
            }
            b"triangle" => {
                let face = [self.attr(e, "v1")?, self.attr(e, "v2")?, self.attr(e, "v3")?];
                if let Some((_, object)) = self.open.as_mut() {
                    object.mesh.faces.push(face);
                }
            }
            b"component" => {
                let child = self.attr(e, "objectid")?;
                let placement = self.placement(e)?;
                if let Some((_, object)) = self.open.as_mut() {
                    object.components.push((child, placement));
                }
            }
            b"build" => self.in_build = !self_closing,
            b"item" if self.in_build => {
                let id = self.attr(e, "objectid")?;
                let placement = self.placement(e)?;
                self.items.push((id, placement));
            }
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, e: &BytesEnd<'_>) {
        match e.local_name().as_ref() {
            b"object" => {
                if let Some((id, object)) = self.open.take() {
                    self.objects.insert(id, object);
                }
            }
            b"build" => self.in_build = false,
            _ => {}
        }
    }

    fn finish(self) -> MeshResult<Mesh> {
        // Without a build section every object is part of the scene.
        let items = if self.items.is_empty() {
            self.declared.iter().map(|&id| (id, Placement::identity())).collect()
        } else {
            self.items.clone()
        };

        let mut mesh = Mesh::new();
        for (id, placement) in &items {
            self.place(&mut mesh, *id, placement, 0)?;
        }
        if self.unit_scale != 1.0 {
            for v in &mut mesh.vertices {
                v.position.coords *= self.unit_scale;
            }
        }
        tracing::debug!(
            objects = self.objects.len(),
            items = items.len(),
            faces = mesh.face_count(),
            "3MF flattened"
        );
        Ok(mesh)
    }

    /// Append object `id` and, recursively, its components.
    fn place(&self, target: &mut Mesh, id: u32, placement: &Placement, depth: usize) -> MeshResult<()> {
        if depth > MAX_NESTING {
            return Err(self.error(format!("components nest deeper than {} levels", MAX_NESTING)));
        }
        let object = self
            .objects
            .get(&id)
            .ok_or_else(|| self.error(format!("reference to unknown object {}", id)))?;

        // Indices are object-local until appended.
        validate_mesh_data(&object.mesh)?;
        append_part(
            target,
            object.mesh.vertices.iter().map(|v| placement.apply(&v.position)),
            object.mesh.faces.iter().copied(),
        );
        for (child, inner) in &object.components {
            self.place(target, *child, &placement.compose(inner), depth + 1)?;
        }
        Ok(())
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn unit_to_mm(unit: &str) -> Option<f64> {
    Some(match unit {
        "micron" => 0.001,
        "millimeter" => 1.0,
        "centimeter" => 10.0,
        "meter" => 1000.0,
        "inch" => 25.4,
        "foot" => 304.8,
        _ => return None,
    })
}

/// The model part: the conventional name, else any `.model` entry.
fn model_part_name<R: Read + Seek>(archive: &mut zip::ZipArchive<R>) -> Option<String> {
    if archive.by_name(MODEL_PART).is_ok() {
        return Some(MODEL_PART.to_string());
    }
    archive
        .file_names()
        .find(|name| name.to_ascii_lowercase().ends_with(".model"))
        .map(String::from)
}

pub(super) fn read(path: &Path) -> MeshResult<Mesh> {
    let file = File::open(path).map_err(|e| MeshError::io_read(path, e))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| MeshError::parse_error(path, format!("not a 3MF package: {}", e)))?;
    let part = model_part_name(&mut archive)
        .ok_or_else(|| MeshError::parse_error(path, "3MF package has no model part"))?;

    let mut xml = String::new();
    archive
        .by_name(&part)
        .map_err(|e| MeshError::parse_error(path, format!("cannot open {}: {}", part, e)))?
        .read_to_string(&mut xml)
        .map_err(|e| MeshError::io_read(path, e))?;

    parse_model(&xml, path)
}

fn parse_model(xml: &str, path: &Path) -> MeshResult<Mesh> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut parser = ModelParser::new(path);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => parser.start(&e, false)?,
            Ok(Event::Empty(e)) => parser.start(&e, true)?,
            Ok(Event::End(e)) => parser.end(&e),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(MeshError::parse_error(path, format!("XML: {}", e))),
        }
    }
    parser.finish()
}

pub(super) fn write(mesh: &Mesh, path: &Path) -> MeshResult<()> {
    let model = model_xml(mesh).map_err(|e| MeshError::write_failed(path, e))?;

    let file = File::create(path).map_err(|e| MeshError::io_write(path, e))?;
    let mut zip = zip::ZipWriter::new(file);
    let options =
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, bytes) in [
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", RELATIONSHIPS.as_bytes()),
        (MODEL_PART, model.as_slice()),
    ] {
        zip.start_file(name, options)
            .map_err(|e| MeshError::write_failed(path, e))?;
        zip.write_all(bytes).map_err(|e| MeshError::io_write(path, e))?;
    }
    zip.finish().map_err(|e| MeshError::write_failed(path, e))?;
    Ok(())
}

/// One object in millimeters, placed once by the build section.
fn model_xml(mesh: &Mesh) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
    let mut w = quick_xml::Writer::new_with_indent(Vec::new(), b' ', 1);
    let open = |name: &'static str| BytesStart::new(name);

    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    w.write_event(Event::Start(
        open("model").with_attributes([("unit", "millimeter"), ("xmlns", CORE_NAMESPACE)]),
    ))?;
    w.write_event(Event::Start(open("resources")))?;
    w.write_event(Event::Start(open("object").with_attributes([("id", "1"), ("type", "model")])))?;
    w.write_event(Event::Start(open("mesh")))?;

    w.write_event(Event::Start(open("vertices")))?;
    for v in &mesh.vertices {
        let p = v.position;
        let (x, y, z) = (p.x.to_string(), p.y.to_string(), p.z.to_string());
        w.write_event(Event::Empty(
            open("vertex").with_attributes([("x", x.as_str()), ("y", y.as_str()), ("z", z.as_str())]),
        ))?;
    }
    w.write_event(Event::End(BytesEnd::new("vertices")))?;

    w.write_event(Event::Start(open("triangles")))?;
    for [a, b, c] in &mesh.faces {
        let (a, b, c) = (a.to_string(), b.to_string(), c.to_string());
        w.write_event(Event::Empty(
            open("triangle").with_attributes([("v1", a.as_str()), ("v2", b.as_str()), ("v3", c.as_str())]),
        ))?;
    }
    w.write_event(Event::End(BytesEnd::new("triangles")))?;

    for name in ["mesh", "object", "resources"] {
        w.write_event(Event::End(BytesEnd::new(name)))?;
    }
    w.write_event(Event::Start(open("build")))?;
    w.write_event(Event::Empty(open("item").with_attributes([("objectid", "1")])))?;
    w.write_event(Event::End(BytesEnd::new("build")))?;
    w.write_event(Event::End(BytesEnd::new("model")))?;

    Ok(w.into_inner())
}
