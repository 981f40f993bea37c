//! Mesh simplification by vertex clustering.
//!
//! Space is cut into cubic cells whose size is the mesh diagonal divided by
//! a fixed resolution, so the reduction is roughly proportional whatever the
//! absolute scale. Every occupied cell collapses to one vertex at the mean of
//! its members. Decimation is an optimization only: [`decimate_or_keep`]
//! hands back the input whenever clustering fails.

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use tracing::{debug, info, warn};

use crate::budget::Deadline;
use crate::config::DecimationConfig;
use crate::error::{MeshError, MeshResult};
use crate::repair::{degenerate_area_threshold, remove_degenerate_faces, remove_duplicate_faces, remove_unreferenced_vertices};
use crate::tracing_ext::StageTimer;
use crate::{Mesh, Vertex};

/// Vertices processed between deadline polls.
const POLL_INTERVAL: usize = 4096;

/// Result of mesh decimation.
#[derive(Debug, Clone)]
pub struct DecimateResult {
    /// The decimated mesh.
    pub mesh: Mesh,
    /// Number of triangles in original mesh.
    pub original_triangles: usize,
    /// Number of triangles in decimated mesh.
    pub final_triangles: usize,
    /// Edge length of a clustering cell.
    pub voxel_size: f64,
    /// Faces dropped after remapping (collapsed, zero-area or duplicate).
    pub faces_removed: usize,
}

/// What the pipeline's decimation stage did.
#[derive(Debug, Clone, PartialEq)]
pub enum DecimationOutcome {
    /// The mesh was under the face ceiling.
    Skipped,
    /// The mesh was simplified.
    Decimated { from: usize, to: usize },
    /// Decimation failed; the input was kept.
    Fallback { reason: String },
}

#[inline]
fn pos_to_cell(pos: &Point3<f64>, cell_size: f64) -> (i64, i64, i64) {
    (
        (pos.x / cell_size).floor() as i64,
        (pos.y / cell_size).floor() as i64,
        (pos.z / cell_size).floor() as i64,
    )
}

/// Cluster vertices into cells of `voxel_size` and rebuild the faces.
pub fn cluster_vertices(mesh: &Mesh, voxel_size: f64, deadline: &Deadline) -> MeshResult<DecimateResult> {
    if !(voxel_size.is_finite() && voxel_size > 0.0) {
        return Err(MeshError::DecimationFailed {
            details: format!("invalid voxel size {}", voxel_size),
        });
    }
    if mesh.faces.is_empty() {
        return Err(MeshError::DecimationFailed {
            details: "mesh has no faces".to_string(),
        });
    }

    let mut cell_index: HashMap<(i64, i64, i64), u32> = HashMap::new();
    let mut sums: Vec<Vector3<f64>> = Vec::new();
    let mut counts: Vec<u32> = Vec::new();
    let mut remap: Vec<u32> = Vec::with_capacity(mesh.vertices.len());

    for (i, vertex) in mesh.vertices.iter().enumerate() {
        if i % POLL_INTERVAL == 0 && deadline.is_expired() {
            return Err(MeshError::timeout("decimation", deadline.budget()));
        }
        let cell = pos_to_cell(&vertex.position, voxel_size);
        let idx = *cell_index.entry(cell).or_insert_with(|| {
            sums.push(Vector3::zeros());
            counts.push(0);
            (sums.len() - 1) as u32
        });
        sums[idx as usize] += vertex.position.coords;
        counts[idx as usize] += 1;
        remap.push(idx);
    }

    let vertices: Vec<Vertex> = sums
        .iter()
        .zip(&counts)
        .map(|(sum, &count)| Vertex::new(Point3::from(sum / count as f64)))
        .collect();

    let faces: Vec<[u32; 3]> = mesh
        .faces
        .iter()
        .map(|f| [remap[f[0] as usize], remap[f[1] as usize], remap[f[2] as usize]])
        .filter(|&[a, b, c]| a != b && b != c && a != c)
        .collect();

    if deadline.is_expired() {
        return Err(MeshError::timeout("decimation", deadline.budget()));
    }

    let clustered = Mesh { vertices, faces };
    let (clustered, _) = remove_degenerate_faces(&clustered, degenerate_area_threshold(mesh));
    let (clustered, _) = remove_duplicate_faces(&clustered);
    let (clustered, _) = remove_unreferenced_vertices(&clustered);

    if clustered.faces.is_empty() {
        return Err(MeshError::DecimationFailed {
            details: format!("clustering at {:.4} mm left no faces", voxel_size),
        });
    }

    Ok(DecimateResult {
        original_triangles: mesh.face_count(),
        final_triangles: clustered.face_count(),
        faces_removed: mesh.face_count() - clustered.face_count(),
        voxel_size,
        mesh: clustered,
    })
}

/// Decimate with the configured resolution and budget.
pub fn decimate(mesh: &Mesh, config: &DecimationConfig) -> MeshResult<DecimateResult> {
    let mut timer = StageTimer::for_mesh("decimate", mesh);
    let voxel_size = mesh.scale_factor() / config.resolution;
    let deadline = Deadline::new(config.budget());
    let result = cluster_vertices(mesh, voxel_size, &deadline)?;
    timer.finish_with(&result.mesh);
    info!(
        original = result.original_triangles,
        decimated = result.final_triangles,
        voxel_size = result.voxel_size,
        "Decimation complete"
    );
    Ok(result)
}

/// Decimate meshes above the face ceiling; on any failure keep the input.
pub fn decimate_or_keep(mesh: &Mesh, config: &DecimationConfig) -> (Mesh, DecimationOutcome) {
    if mesh.face_count() <= config.target_faces {
        debug!(
            faces = mesh.face_count(),
            target = config.target_faces,
            "Decimation not needed"
        );
        return (mesh.clone(), DecimationOutcome::Skipped);
    }

    match decimate(mesh, config) {
        Ok(result) => {
            let outcome = DecimationOutcome::Decimated {
                from: result.original_triangles,
                to: result.final_triangles,
            };
            (result.mesh, outcome)
        }
        Err(e) => {
            warn!("Decimation failed, using original mesh: {}", e);
            (
                mesh.clone(),
                DecimationOutcome::Fallback {
                    reason: e.to_string(),
                },
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// A flat `n` x `n` grid of unit quads.
    fn grid(n: usize) -> Mesh {
        let mut positions = Vec::new();
        for j in 0..=n {
            for i in 0..=n {
                positions.push([i as f64, j as f64, 0.0]);
            }
        }
        let row = (n + 1) as u32;
        let mut faces = Vec::new();
        for j in 0..n as u32 {
            for i in 0..n as u32 {
                let a = j * row + i;
                faces.push([a, a + 1, a + row + 1]);
                faces.push([a, a + row + 1, a + row]);
            }
        }
        Mesh::from_parts(positions, faces)
    }

    #[test]
    fn test_clustering_reduces_faces() {
        let mesh = grid(64);
        let result = cluster_vertices(&mesh, 4.0, &Deadline::unlimited()).unwrap();
        assert_eq!(result.original_triangles, 64 * 64 * 2);
        assert!(result.final_triangles < result.original_triangles / 4);
        assert!(result.final_triangles > 0);
        assert_eq!(result.mesh.face_count(), result.final_triangles);
    }

    #[test]
    fn test_fine_voxels_keep_everything() {
        let mesh = grid(4);
        let result = cluster_vertices(&mesh, 0.01, &Deadline::unlimited()).unwrap();
        assert_eq!(result.final_triangles, mesh.face_count());
        assert_eq!(result.faces_removed, 0);
    }

    #[test]
    fn test_coarse_voxels_fail() {
        let mesh = grid(4);
        let err = cluster_vertices(&mesh, 1000.0, &Deadline::unlimited()).unwrap_err();
        assert!(matches!(err, MeshError::DecimationFailed { .. }));
    }

    #[test]
    fn test_invalid_voxel_size() {
        assert!(cluster_vertices(&grid(2), 0.0, &Deadline::unlimited()).is_err());
        assert!(cluster_vertices(&grid(2), f64::NAN, &Deadline::unlimited()).is_err());
    }

    #[test]
    fn test_skipped_below_target() {
        let mesh = grid(4);
        let (kept, outcome) = decimate_or_keep(&mesh, &DecimationConfig::default());
        assert_eq!(outcome, DecimationOutcome::Skipped);
        assert_eq!(kept, mesh);
    }

    #[test]
    fn test_decimates_above_target() {
        let mesh = grid(128);
        let config = DecimationConfig {
            target_faces: 10_000,
            ..Default::default()
        };
        let (decimated, outcome) = decimate_or_keep(&mesh, &config);
        assert!(matches!(outcome, DecimationOutcome::Decimated { from: 32_768, .. }));
        assert!(decimated.face_count() < mesh.face_count());
    }

    #[test]
    fn test_expired_budget_falls_back() {
        let mesh = grid(16);
        let err = cluster_vertices(&mesh, 2.0, &Deadline::new(Duration::ZERO)).unwrap_err();
        assert!(matches!(err, MeshError::Timeout { .. }));

        let config = DecimationConfig {
            target_faces: 10,
            budget_secs: 0.0,
            ..Default::default()
        };
        let (kept, outcome) = decimate_or_keep(&mesh, &config);
        assert!(matches!(outcome, DecimationOutcome::Fallback { .. }));
        assert_eq!(kept, mesh);
    }
}
