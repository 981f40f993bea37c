//! Coplanar facet detection.
//!
//! Faces sharing an edge are linked when their normals differ by no more
//! than the angular tolerance; each connected group of linked faces is a
//! facet, a candidate flat surface to rest the part on.

use std::collections::VecDeque;

use nalgebra::{Point3, Vector3};
use tracing::debug;

use crate::adjacency::MeshAdjacency;
use crate::config::FacetConfig;
use crate::Mesh;

/// A maximal group of adjacent, near-coplanar faces.
#[derive(Debug, Clone, PartialEq)]
pub struct Facet {
    /// Member face indices, ascending.
    pub faces: Vec<u32>,
    /// Unit normal of the lowest-index member face.
    pub normal: Vector3<f64>,
    /// Sum of member face areas.
    pub area: f64,
    /// Area-weighted mean of member face centroids.
    pub centroid: Point3<f64>,
}

impl Facet {
    /// Distinct vertex indices used by the facet, ascending.
    pub fn vertex_indices(&self, mesh: &Mesh) -> Vec<u32> {
        let mut indices: Vec<u32> = self
            .faces
            .iter()
            .flat_map(|&f| mesh.faces[f as usize])
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// Positions of the facet's distinct vertices.
    pub fn vertex_positions(&self, mesh: &Mesh) -> Vec<Point3<f64>> {
        self.vertex_indices(mesh)
            .into_iter()
            .map(|i| mesh.vertices[i as usize].position)
            .collect()
    }
}

/// Group faces into facets without any size filtering.
///
/// Degenerate faces have no normal and never join a facet. Facets come out
/// ordered by their lowest face index.
pub fn group_coplanar_faces(mesh: &Mesh, angle_tolerance_deg: f64) -> Vec<Facet> {
    let face_count = mesh.face_count();
    let normals: Vec<Option<Vector3<f64>>> = mesh.triangles().map(|t| t.normal()).collect();
    let areas = mesh.face_areas();
    let min_dot = angle_tolerance_deg.to_radians().cos();

    let neighbors = MeshAdjacency::build(&mesh.faces).face_neighbors(face_count);
    let mut visited = vec![false; face_count];
    let mut facets = Vec::new();

    for start in 0..face_count {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        if normals[start].is_none() {
            continue;
        }

        let mut members = vec![start as u32];
        let mut queue = VecDeque::from([start as u32]);
        while let Some(face) = queue.pop_front() {
            let Some(n) = normals[face as usize] else {
                continue;
            };
            for &other in &neighbors[face as usize] {
                if visited[other as usize] {
                    continue;
                }
                if normals[other as usize].is_some_and(|m| n.dot(&m) >= min_dot) {
                    visited[other as usize] = true;
                    members.push(other);
                    queue.push_back(other);
                }
            }
        }
        members.sort_unstable();

        let area: f64 = members.iter().map(|&f| areas[f as usize]).sum();
        let centroid = if area > 0.0 {
            let weighted: Vector3<f64> = members
                .iter()
                .filter_map(|&f| mesh.triangle(f as usize).map(|t| t.centroid().coords * areas[f as usize]))
                .sum();
            Point3::from(weighted / area)
        } else {
            Point3::origin()
        };

        facets.push(Facet {
            normal: normals[members[0] as usize].unwrap_or_else(Vector3::zeros),
            faces: members,
            area,
            centroid,
        });
    }

    facets
}

/// Minimum facet area for a mesh: `(scale × multiplier)²`.
pub fn min_facet_area(mesh: &Mesh, config: &FacetConfig) -> f64 {
    (mesh.scale_factor() * config.min_area_multiplier).powi(2)
}

/// Detect facets worth testing for stability.
pub fn detect_facets(mesh: &Mesh, config: &FacetConfig) -> Vec<Facet> {
    let all = group_coplanar_faces(mesh, config.angle_tolerance_deg);
    let total = all.len();
    let min_area = min_facet_area(mesh, config);

    let facets: Vec<Facet> = all
        .into_iter()
        .filter(|f| f.faces.len() >= config.min_faces && f.area >= min_area)
        .collect();

    debug!(
        groups = total,
        kept = facets.len(),
        min_area,
        "Facet detection complete"
    );
    facets
}
