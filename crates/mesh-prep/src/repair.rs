//! Pure mesh cleanup stages.
//!
//! Every function takes a mesh by reference and returns a new snapshot plus
//! a count of what changed. The integrity check runs [`repair_for_integrity`]
//! on a copy; the analysis pipeline runs [`clean_for_analysis`] after
//! decimation.

use std::collections::VecDeque;

use hashbrown::{HashMap, HashSet};
use nalgebra::{Point3, Vector3};
use tracing::{debug, info, warn};

use crate::adjacency::{MeshAdjacency, edge_direction_in_face, face_edges};
use crate::components::components_from_adjacency;
use crate::{Mesh, Vertex};

/// What a cleanup pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairSummary {
    pub degenerate_removed: usize,
    pub duplicates_removed: usize,
    pub unreferenced_removed: usize,
    pub holes_filled: usize,
    pub faces_flipped: usize,
    pub components_inverted: usize,
}

impl RepairSummary {
    /// True if no stage modified the mesh.
    pub fn is_noop(&self) -> bool {
        *self == RepairSummary::default()
    }
}

/// Area below which a face counts as degenerate, relative to mesh size.
pub fn degenerate_area_threshold(mesh: &Mesh) -> f64 {
    (mesh.scale_factor() * 1e-7).powi(2)
}

/// Remove faces with repeated vertex indices or (near) zero area.
pub fn remove_degenerate_faces(mesh: &Mesh, area_threshold: f64) -> (Mesh, usize) {
    let faces: Vec<[u32; 3]> = mesh
        .faces
        .iter()
        .copied()
        .filter(|&[a, b, c]| {
            if a == b || b == c || a == c {
                return false;
            }
            let p0 = mesh.vertices[a as usize].position;
            let p1 = mesh.vertices[b as usize].position;
            let p2 = mesh.vertices[c as usize].position;
            (p1 - p0).cross(&(p2 - p0)).norm() * 0.5 > area_threshold
        })
        .collect();

    let removed = mesh.faces.len() - faces.len();
    if removed > 0 {
        debug!("Removed {} degenerate faces", removed);
    }
    (
        Mesh {
            vertices: mesh.vertices.clone(),
            faces,
        },
        removed,
    )
}

/// Remove faces using the same three vertices as an earlier face, in either
/// winding.
pub fn remove_duplicate_faces(mesh: &Mesh) -> (Mesh, usize) {
    let mut seen: HashSet<[u32; 3]> = HashSet::with_capacity(mesh.faces.len());
    let faces: Vec<[u32; 3]> = mesh
        .faces
        .iter()
        .copied()
        .filter(|face| seen.insert(face_key(face)))
        .collect();

    let removed = mesh.faces.len() - faces.len();
    if removed > 0 {
        debug!("Removed {} duplicate faces", removed);
    }
    (
        Mesh {
            vertices: mesh.vertices.clone(),
            faces,
        },
        removed,
    )
}

/// Order-independent identity of a face.
#[inline]
fn face_key(face: &[u32; 3]) -> [u32; 3] {
    let mut key = *face;
    key.sort_unstable();
    key
}

/// Drop vertices no face references and compact the indices.
pub fn remove_unreferenced_vertices(mesh: &Mesh) -> (Mesh, usize) {
    let mut remap = vec![u32::MAX; mesh.vertices.len()];
    let mut vertices = Vec::with_capacity(mesh.vertices.len());

    for face in &mesh.faces {
        for &idx in face {
            let slot = &mut remap[idx as usize];
            if *slot == u32::MAX {
                *slot = vertices.len() as u32;
                vertices.push(mesh.vertices[idx as usize]);
            }
        }
    }

    let faces = mesh
        .faces
        .iter()
        .map(|f| [remap[f[0] as usize], remap[f[1] as usize], remap[f[2] as usize]])
        .collect();

    let removed = mesh.vertices.len() - vertices.len();
    (Mesh { vertices, faces }, removed)
}

/// Make winding consistent within each connected component.
///
/// Breadth-first propagation from the lowest-index face of each component:
/// a neighbor traversing a shared edge in the same direction as the current
/// face is flipped. Non-manifold edges are followed but can still leave
/// conflicts, which the integrity check reports.
pub fn fix_winding(mesh: &Mesh) -> (Mesh, usize) {
    let mut faces = mesh.faces.clone();
    if faces.is_empty() {
        return (mesh.clone(), 0);
    }

    let adjacency = MeshAdjacency::build(&faces);
    let face_count = faces.len();
    let mut visited = vec![false; face_count];
    let mut flipped = 0usize;
    let mut component_count = 0usize;

    for start in 0..face_count {
        if visited[start] {
            continue;
        }
        component_count += 1;
        visited[start] = true;
        let mut queue = VecDeque::from([start as u32]);

        while let Some(face_idx) = queue.pop_front() {
            // `faces[face_idx]` already carries its final orientation.
            let face = faces[face_idx as usize];
            for (v0, v1) in face_edges(&face) {
                let Some(neighbors) = adjacency.faces_for_edge(v0, v1) else {
                    continue;
                };
                for &neighbor in neighbors {
                    if visited[neighbor as usize] {
                        continue;
                    }
                    visited[neighbor as usize] = true;

                    let neighbor_face = &mut faces[neighbor as usize];
                    if edge_direction_in_face(neighbor_face, v0, v1) {
                        neighbor_face.swap(1, 2);
                        flipped += 1;
                    }
                    queue.push_back(neighbor);
                }
            }
        }
    }

    if flipped > 0 {
        info!(
            "Fixed winding order: flipped {} faces across {} component(s)",
            flipped, component_count
        );
    } else {
        debug!(
            "Winding order already consistent across {} component(s)",
            component_count
        );
    }

    (
        Mesh {
            vertices: mesh.vertices.clone(),
            faces,
        },
        flipped,
    )
}

/// Flip every closed component whose signed volume is negative.
///
/// Open components have no meaningful inside and are left as they are.
pub fn orient_outward(mesh: &Mesh) -> (Mesh, usize) {
    if mesh.faces.is_empty() {
        return (mesh.clone(), 0);
    }

    let adjacency = MeshAdjacency::build(&mesh.faces);
    let analysis = components_from_adjacency(&adjacency, mesh.faces.len());
    let mut faces = mesh.faces.clone();
    let mut inverted = 0usize;

    for component in &analysis.components {
        let closed = component.iter().all(|&f| {
            face_edges(&mesh.faces[f as usize])
                .iter()
                .all(|&(a, b)| adjacency.faces_for_edge(a, b).is_some_and(|adj| adj.len() == 2))
        });
        if !closed {
            continue;
        }

        let volume: f64 = component
            .iter()
            .map(|&f| {
                let [a, b, c] = mesh.faces[f as usize];
                let v0 = mesh.vertices[a as usize].position.coords;
                let v1 = mesh.vertices[b as usize].position.coords;
                let v2 = mesh.vertices[c as usize].position.coords;
                v0.dot(&v1.cross(&v2))
            })
            .sum();

        if volume < 0.0 {
            for &f in component {
                faces[f as usize].swap(1, 2);
            }
            inverted += 1;
        }
    }

    if inverted > 0 {
        info!("Inverted {} inside-out component(s)", inverted);
    }

    (
        Mesh {
            vertices: mesh.vertices.clone(),
            faces,
        },
        inverted,
    )
}

/// A closed chain of boundary edges, ordered so that consecutive vertices
/// run opposite to the winding of the faces bordering the hole.
#[derive(Debug, Clone)]
pub struct BoundaryLoop {
    pub vertices: Vec<u32>,
}

impl BoundaryLoop {
    /// Number of edges (and vertices) in the loop.
    pub fn edge_count(&self) -> usize {
        self.vertices.len()
    }
}

/// Trace all boundary loops of a mesh.
pub fn detect_holes(mesh: &Mesh, adjacency: &MeshAdjacency) -> Vec<BoundaryLoop> {
    // For boundary edge a -> b in its face, the hole runs b -> a.
    let mut next: HashMap<u32, Vec<u32>> = HashMap::new();
    let mut edge_total = 0usize;
    for (a, b) in adjacency.boundary_edges() {
        let Some(&[face]) = adjacency.faces_for_edge(a, b) else {
            continue;
        };
        let (from, to) = if edge_direction_in_face(&mesh.faces[face as usize], a, b) {
            (b, a)
        } else {
            (a, b)
        };
        next.entry(from).or_default().push(to);
        edge_total += 1;
    }

    if edge_total == 0 {
        return Vec::new();
    }
    debug!("Found {} boundary edges", edge_total);

    for targets in next.values_mut() {
        targets.sort_unstable();
    }
    let mut starts: Vec<u32> = next.keys().copied().collect();
    starts.sort_unstable();

    let mut loops = Vec::new();
    for start in starts {
        while next.get(&start).is_some_and(|t| !t.is_empty()) {
            let mut chain = vec![start];
            let mut current = start;
            let closed = loop {
                let Some(to) = next.get_mut(&current).and_then(Vec::pop) else {
                    break false;
                };
                if to == start {
                    break true;
                }
                chain.push(to);
                current = to;
                if chain.len() > edge_total {
                    break false;
                }
            };

            if closed && chain.len() >= 3 {
                loops.push(BoundaryLoop { vertices: chain });
            } else if !closed {
                warn!("Boundary loop starting at vertex {} is not closed", start);
            }
        }
    }

    debug!(
        "Detected {} holes (boundary loops), sizes: {:?}",
        loops.len(),
        loops.iter().map(|l| l.edge_count()).collect::<Vec<_>>()
    );

    loops
}

/// Fill holes of up to `max_hole_edges` edges.
///
/// Each hole is closed with a fan around a new vertex at the loop's
/// centroid, which stays valid for non-planar loops.
pub fn fill_holes(mesh: &Mesh, max_hole_edges: usize) -> (Mesh, usize) {
    let adjacency = MeshAdjacency::build(&mesh.faces);
    let holes = detect_holes(mesh, &adjacency);
    if holes.is_empty() {
        return (mesh.clone(), 0);
    }

    let mut result = mesh.clone();
    let mut filled = 0usize;

    for hole in &holes {
        if hole.edge_count() > max_hole_edges {
            warn!(
                "Skipping large hole with {} edges (max: {})",
                hole.edge_count(),
                max_hole_edges
            );
            continue;
        }

        let n = hole.vertices.len();
        if n == 3 {
            result
                .faces
                .push([hole.vertices[0], hole.vertices[1], hole.vertices[2]]);
        } else {
            let sum: Vector3<f64> = hole
                .vertices
                .iter()
                .map(|&v| mesh.vertices[v as usize].position.coords)
                .sum();
            let center = result.vertices.len() as u32;
            result.vertices.push(Vertex::new(Point3::from(sum / n as f64)));
            for i in 0..n {
                result
                    .faces
                    .push([center, hole.vertices[i], hole.vertices[(i + 1) % n]]);
            }
        }
        filled += 1;
    }

    if filled > 0 {
        info!("Filled {} holes", filled);
    }
    (result, filled)
}

/// Best-effort repair applied before the integrity verdict: fill small
/// holes, make winding consistent and orient closed parts outward.
pub fn repair_for_integrity(mesh: &Mesh, max_hole_edges: usize) -> (Mesh, RepairSummary) {
    let (mesh, holes_filled) = fill_holes(mesh, max_hole_edges);
    let (mesh, faces_flipped) = fix_winding(&mesh);
    let (mesh, components_inverted) = orient_outward(&mesh);
    (
        mesh,
        RepairSummary {
            holes_filled,
            faces_flipped,
            components_inverted,
            ..Default::default()
        },
    )
}

/// Cleanup between decimation and facet detection.
pub fn clean_for_analysis(mesh: &Mesh) -> (Mesh, RepairSummary) {
    let (cleaned, degenerate_removed) = remove_degenerate_faces(mesh, degenerate_area_threshold(mesh));
    let (cleaned, duplicates_removed) = remove_duplicate_faces(&cleaned);
    let (cleaned, unreferenced_removed) = remove_unreferenced_vertices(&cleaned);
    let (cleaned, faces_flipped) = fix_winding(&cleaned);
    let (cleaned, components_inverted) = orient_outward(&cleaned);

    if cleaned.faces.is_empty() {
        warn!("Cleanup removed every face; keeping the previous mesh");
        return (mesh.clone(), RepairSummary::default());
    }

    let summary = RepairSummary {
        degenerate_removed,
        duplicates_removed,
        unreferenced_removed,
        faces_flipped,
        components_inverted,
        ..Default::default()
    };
    debug!(?summary, "Cleanup complete");
    (cleaned, summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_cube() -> Mesh {
        Mesh::from_parts(
            [
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
                [1.0, 0.0, 1.0],
                [1.0, 1.0, 1.0],
                [0.0, 1.0, 1.0],
            ],
            vec![
                [0, 2, 1],
                [0, 3, 2],
                [4, 5, 6],
                [4, 6, 7],
                [0, 1, 5],
                [0, 5, 4],
                [3, 7, 6],
                [3, 6, 2],
                [0, 4, 7],
                [0, 7, 3],
                [1, 2, 6],
                [1, 6, 5],
            ],
        )
    }

    fn open_box() -> Mesh {
        let mut mesh = unit_cube();
        // Drop the top two faces.
        mesh.faces.remove(3);
        mesh.faces.remove(2);
        mesh
    }

    #[test]
    fn test_remove_degenerate_faces() {
        let mut mesh = unit_cube();
        mesh.faces.push([0, 0, 1]);
        mesh.vertices.push(Vertex::from_coords(2.0, 0.0, 0.0));
        mesh.faces.push([0, 1, 8]); // collinear
        let (cleaned, removed) = remove_degenerate_faces(&mesh, 1e-12);
        assert_eq!(removed, 2);
        assert_eq!(cleaned.face_count(), 12);
    }

    #[test]
    fn test_remove_duplicate_faces_any_winding() {
        let mut mesh = unit_cube();
        mesh.faces.push([2, 1, 0]);
        mesh.faces.push([1, 0, 2]);
        let (cleaned, removed) = remove_duplicate_faces(&mesh);
        assert_eq!(removed, 2);
        assert_eq!(cleaned.faces, unit_cube().faces);
    }

    #[test]
    fn test_remove_unreferenced_vertices() {
        let mut mesh = unit_cube();
        mesh.vertices.insert(0, Vertex::from_coords(9.0, 9.0, 9.0));
        for face in &mut mesh.faces {
            for idx in face.iter_mut() {
                *idx += 1;
            }
        }
        let (cleaned, removed) = remove_unreferenced_vertices(&mesh);
        assert_eq!(removed, 1);
        assert_eq!(cleaned.vertex_count(), 8);
        assert!((cleaned.signed_volume() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fix_winding_restores_consistency() {
        let mut mesh = unit_cube();
        mesh.faces[5].swap(1, 2);
        mesh.faces[9].swap(1, 2);
        let (fixed, flipped) = fix_winding(&mesh);
        assert_eq!(flipped, 2);
        let adjacency = MeshAdjacency::build(&fixed.faces);
        assert_eq!(adjacency.inconsistent_edge_count(&fixed.faces), 0);
        assert!((fixed.signed_volume() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_orient_outward_flips_inside_out_cube() {
        let mut mesh = unit_cube();
        for face in &mut mesh.faces {
            face.swap(1, 2);
        }
        assert!(mesh.is_inside_out());
        let (oriented, inverted) = orient_outward(&mesh);
        assert_eq!(inverted, 1);
        assert!((oriented.signed_volume() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_detect_single_square_hole() {
        let mesh = open_box();
        let adjacency = MeshAdjacency::build(&mesh.faces);
        let holes = detect_holes(&mesh, &adjacency);
        assert_eq!(holes.len(), 1);
        assert_eq!(holes[0].edge_count(), 4);
    }

    #[test]
    fn test_fill_holes_closes_box_with_positive_volume() {
        let (filled, count) = fill_holes(&open_box(), 64);
        assert_eq!(count, 1);
        let adjacency = MeshAdjacency::build(&filled.faces);
        assert!(adjacency.is_watertight());
        assert_eq!(adjacency.inconsistent_edge_count(&filled.faces), 0);
        assert!((filled.signed_volume() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fill_holes_respects_limit() {
        let (unchanged, count) = fill_holes(&open_box(), 3);
        assert_eq!(count, 0);
        assert_eq!(unchanged.face_count(), 10);
    }

    #[test]
    fn test_clean_for_analysis_keeps_clean_mesh() {
        let (cleaned, summary) = clean_for_analysis(&unit_cube());
        assert!(summary.is_noop());
        assert_eq!(cleaned, unit_cube());
    }
}
