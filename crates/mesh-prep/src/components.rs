//! Connected component ("body") analysis.
//!
//! A body is a set of faces joined through shared edges; touching at a
//! single vertex does not connect two faces. Multi-part prints loaded from
//! one file show up as several bodies.

use std::cmp::Reverse;

use tracing::debug;

use crate::adjacency::MeshAdjacency;
use crate::types::Mesh;

#[derive(Debug, Clone, Default)]
pub struct ComponentAnalysis {
    pub component_count: usize,
    /// Sorted face indices per body, largest body first. Bodies of equal
    /// size keep the order of their lowest face index.
    pub components: Vec<Vec<u32>>,
}

impl ComponentAnalysis {
    pub fn is_connected(&self) -> bool {
        self.component_count == 1
    }

    pub fn largest_component_size(&self) -> usize {
        self.components.first().map_or(0, Vec::len)
    }
}

/// Disjoint-set forest over face indices.
struct FaceSets {
    parent: Vec<u32>,
}

impl FaceSets {
    fn new(n: usize) -> Self {
        FaceSets {
            parent: (0..n as u32).collect(),
        }
    }

    fn root(&mut self, mut f: u32) -> u32 {
        while self.parent[f as usize] != f {
            // Path halving.
            let grandparent = self.parent[self.parent[f as usize] as usize];
            self.parent[f as usize] = grandparent;
            f = grandparent;
        }
        f
    }

    /// Join two sets; the lower root survives.
    fn join(&mut self, a: u32, b: u32) {
        let (ra, rb) = (self.root(a), self.root(b));
        if ra != rb {
            self.parent[ra.max(rb) as usize] = ra.min(rb);
        }
    }
}

/// Find all connected components in a mesh.
///
/// ```
/// use mesh_prep::{Mesh, find_connected_components};
///
/// let mesh = Mesh::from_parts(
///     [
///         [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0],
///         [10.0, 0.0, 0.0], [11.0, 0.0, 0.0], [10.0, 1.0, 0.0],
///     ],
///     vec![[0, 1, 2], [3, 4, 5]],
/// );
///
/// assert_eq!(find_connected_components(&mesh).component_count, 2);
/// ```
pub fn find_connected_components(mesh: &Mesh) -> ComponentAnalysis {
    if mesh.faces.is_empty() {
        return ComponentAnalysis::default();
    }
    components_from_adjacency(&MeshAdjacency::build(&mesh.faces), mesh.faces.len())
}

/// Group faces over a prebuilt adjacency.
pub fn components_from_adjacency(adjacency: &MeshAdjacency, face_count: usize) -> ComponentAnalysis {
    let mut sets = FaceSets::new(face_count);
    for faces in adjacency.edge_to_faces.values() {
        if let Some((&first, rest)) = faces.split_first() {
            for &other in rest {
                sets.join(first, other);
            }
        }
    }

    // With the lower root surviving every join, a root is its body's lowest
    // face, so visiting faces in order yields bodies in that order already.
    let mut body_of_root: Vec<Option<usize>> = vec![None; face_count];
    let mut components: Vec<Vec<u32>> = Vec::new();
    for face in 0..face_count as u32 {
        let root = sets.root(face) as usize;
        let body = *body_of_root[root].get_or_insert_with(|| {
            components.push(Vec::new());
            components.len() - 1
        });
        components[body].push(face);
    }
    components.sort_by_key(|c| Reverse(c.len()));

    debug!(
        bodies = components.len(),
        faces = face_count,
        largest = components.first().map_or(0, Vec::len),
        "Connected components"
    );

    ComponentAnalysis {
        component_count: components.len(),
        components,
    }
}
