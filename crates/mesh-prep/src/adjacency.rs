//! Mesh adjacency data structures.
//!
//! Provides edge-to-face lookups and face neighborhoods, the shared basis of
//! the integrity check, body counting, winding repair and facet grouping.

use hashbrown::HashMap;

/// Adjacency information for a mesh.
#[derive(Debug, Clone)]
pub struct MeshAdjacency {
    /// Maps undirected edge (v0, v1) with v0 < v1 to the faces using it,
    /// in ascending face order.
    pub edge_to_faces: HashMap<(u32, u32), Vec<u32>>,
}

impl MeshAdjacency {
    /// Build adjacency information from a list of faces.
    ///
    /// ```
    /// use mesh_prep::MeshAdjacency;
    ///
    /// let faces = vec![[0, 1, 2], [1, 3, 2]];
    /// let adj = MeshAdjacency::build(&faces);
    ///
    /// assert_eq!(adj.edge_count(), 5);
    /// assert_eq!(adj.boundary_edge_count(), 4);
    /// ```
    #[must_use]
    pub fn build(faces: &[[u32; 3]]) -> Self {
        let mut edge_to_faces: HashMap<(u32, u32), Vec<u32>> =
            HashMap::with_capacity(faces.len() * 3 / 2);

        for (face_idx, face) in faces.iter().enumerate() {
            for (a, b) in face_edges(face) {
                edge_to_faces
                    .entry(normalize_edge(a, b))
                    .or_default()
                    .push(face_idx as u32);
            }
        }

        Self { edge_to_faces }
    }

    /// Get faces adjacent to an edge.
    #[must_use]
    pub fn faces_for_edge(&self, v0: u32, v1: u32) -> Option<&[u32]> {
        self.edge_to_faces
            .get(&normalize_edge(v0, v1))
            .map(Vec::as_slice)
    }

    /// Number of unique undirected edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_to_faces.len()
    }

    /// Count the edges used by exactly one face (naked edges).
    #[must_use]
    pub fn boundary_edge_count(&self) -> usize {
        self.edge_to_faces
            .values()
            .filter(|faces| faces.len() == 1)
            .count()
    }

    /// Iterate over all boundary edges.
    pub fn boundary_edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.edge_to_faces
            .iter()
            .filter(|(_, faces)| faces.len() == 1)
            .map(|(&edge, _)| edge)
    }

    /// Count the edges shared by more than two faces.
    #[must_use]
    pub fn non_manifold_edge_count(&self) -> usize {
        self.edge_to_faces
            .values()
            .filter(|faces| faces.len() > 2)
            .count()
    }

    /// Check if every edge is shared by exactly two faces.
    #[must_use]
    pub fn is_watertight(&self) -> bool {
        self.edge_to_faces.values().all(|faces| faces.len() == 2)
    }

    /// For each face, the faces sharing at least one edge with it.
    ///
    /// Neighbor lists are sorted and free of duplicates, so traversals seeded
    /// in face order are deterministic.
    #[must_use]
    pub fn face_neighbors(&self, face_count: usize) -> Vec<Vec<u32>> {
        let mut neighbors: Vec<Vec<u32>> = vec![Vec::new(); face_count];
        for faces in self.edge_to_faces.values() {
            for &f in faces {
                for &g in faces {
                    if f != g {
                        neighbors[f as usize].push(g);
                    }
                }
            }
        }
        for list in &mut neighbors {
            list.sort_unstable();
            list.dedup();
        }
        neighbors
    }

    /// Count the two-face edges traversed in the same direction by both faces,
    /// i.e. places where neighboring faces disagree on orientation.
    #[must_use]
    pub fn inconsistent_edge_count(&self, faces: &[[u32; 3]]) -> usize {
        self.edge_to_faces
            .iter()
            .filter(|(_, adj)| adj.len() == 2)
            .filter(|(&(a, b), adj)| {
                let d0 = edge_direction_in_face(&faces[adj[0] as usize], a, b);
                let d1 = edge_direction_in_face(&faces[adj[1] as usize], a, b);
                d0 == d1
            })
            .count()
    }
}

/// The three directed edges of a face.
#[inline]
pub fn face_edges(face: &[u32; 3]) -> [(u32, u32); 3] {
    [(face[0], face[1]), (face[1], face[2]), (face[2], face[0])]
}

/// Order an edge's endpoints so the smaller index comes first.
#[inline]
pub fn normalize_edge(a: u32, b: u32) -> (u32, u32) {
    if a < b { (a, b) } else { (b, a) }
}

/// Returns true if `face` traverses the edge as a -> b, false for b -> a.
pub fn edge_direction_in_face(face: &[u32; 3], a: u32, b: u32) -> bool {
    face_edges(face).iter().any(|&(x, y)| x == a && y == b)
}
