//! mesh-prep info command - size, bodies and (optionally) edge topology.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use mesh_prep::{Mesh, MeshAdjacency, MeshFormat};
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct MeshInfo {
    path: String,
    format: Option<&'static str>,
    vertices: usize,
    faces: usize,
    components: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    bounds: Option<Bounds>,
    scale: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Topology>,
}

#[derive(Serialize)]
struct Bounds {
    min: [f64; 3],
    max: [f64; 3],
    dimensions: [f64; 3],
}

#[derive(Serialize)]
struct Topology {
    volume: f64,
    surface_area: f64,
    edges: usize,
    boundary_edges: usize,
    non_manifold_edges: usize,
    watertight: bool,
}

impl MeshInfo {
    fn gather(input: &Path, mesh: &Mesh, detailed: bool) -> Self {
        MeshInfo {
            path: input.display().to_string(),
            format: MeshFormat::from_path(input).map(|f| f.extension()),
            vertices: mesh.vertex_count(),
            faces: mesh.face_count(),
            components: mesh.find_components().component_count,
            bounds: mesh.bounds().map(|(lo, hi)| Bounds {
                min: lo.coords.into(),
                max: hi.coords.into(),
                dimensions: (hi - lo).into(),
            }),
            scale: mesh.scale_factor(),
            details: detailed.then(|| Topology::of(mesh)),
        }
    }

    fn print_text(&self) {
        println!("{}", "Mesh Information".bold().underline());
        output::field("File", &self.path);
        output::field("Vertices", self.vertices);
        output::field("Faces", self.faces);
        output::field("Bodies", self.components);
        if let Some(b) = &self.bounds {
            let [x, y, z] = b.dimensions;
            output::field("Size", format!("{:.2} x {:.2} x {:.2} mm", x, y, z));
            output::field("Min corner", triple(b.min));
            output::field("Max corner", triple(b.max));
        }
        output::field("Scale", format!("{:.2} mm", self.scale));

        let Some(t) = &self.details else {
            return;
        };
        output::field("Volume", format!("{:.2} mm³", t.volume));
        output::field("Surface area", format!("{:.2} mm²", t.surface_area));
        output::field("Edges", t.edges);
        output::field("Open edges", t.boundary_edges);
        output::field("Non-manifold edges", t.non_manifold_edges);
        let watertight = if t.watertight { "yes".green() } else { "no".red() };
        output::field("Watertight", watertight);
    }
}

impl Topology {
    fn of(mesh: &Mesh) -> Self {
        let edges = MeshAdjacency::build(&mesh.faces);
        Topology {
            volume: mesh.signed_volume(),
            surface_area: mesh.surface_area(),
            edges: edges.edge_count(),
            boundary_edges: edges.boundary_edge_count(),
            non_manifold_edges: edges.non_manifold_edge_count(),
            watertight: edges.is_watertight(),
        }
    }
}

fn triple([x, y, z]: [f64; 3]) -> String {
    format!("({:.2}, {:.2}, {:.2})", x, y, z)
}

pub fn run(input: &Path, detailed: bool, cli: &Cli) -> Result<i32> {
    let mesh = Mesh::load(input).with_context(|| format!("Failed to load mesh from {:?}", input))?;
    let info = MeshInfo::gather(input, &mesh, detailed);

    match cli.format {
        OutputFormat::Json => output::print_json(&info),
        OutputFormat::Text => info.print_text(),
    }
    Ok(0)
}
