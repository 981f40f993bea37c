//! Property-based tests for mesh operations.
//!
//! Run with: cargo test -p mesh-prep --test proptest_mesh

use mesh_prep::budget::Deadline;
use mesh_prep::decimate::cluster_vertices;
use mesh_prep::facets::group_coplanar_faces;
use mesh_prep::footprint::distance_to_hull;
use mesh_prep::{Mesh, Vertex, align_vectors, convex_hull_2d, min_area_rect};
use nalgebra::{Point2, Vector3};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

fn arb_position() -> impl Strategy<Value = [f64; 3]> {
    prop::array::uniform3(-100.0..100.0f64)
}

/// A mesh with valid face indices and arbitrary geometry.
fn arb_mesh(max_vertices: usize, max_faces: usize) -> impl Strategy<Value = Mesh> {
    (3..=max_vertices).prop_flat_map(move |num_vertices| {
        let vertices = prop::collection::vec(arb_position(), num_vertices);
        let n = num_vertices as u32;
        let faces = prop::collection::vec(prop::array::uniform3(0..n), 1..=max_faces);
        (vertices, faces).prop_map(|(positions, faces)| Mesh {
            vertices: positions
                .into_iter()
                .map(|[x, y, z]| Vertex::from_coords(x, y, z))
                .collect(),
            faces,
        })
    })
}

fn arb_points_2d() -> impl Strategy<Value = Vec<Point2<f64>>> {
    prop::collection::vec(
        (-50.0..50.0f64, -50.0..50.0f64).prop_map(|(x, y)| Point2::new(x, y)),
        3..40,
    )
}

fn arb_direction() -> impl Strategy<Value = Vector3<f64>> {
    prop::array::uniform3(-1.0..1.0f64)
        .prop_filter("non-zero", |v| Vector3::from(*v).norm() > 1e-3)
        .prop_map(Vector3::from)
}

// =============================================================================
// Normalization
// =============================================================================

proptest! {
    #[test]
    fn normalized_mesh_is_centered_and_on_plate(mesh in arb_mesh(30, 20)) {
        let normalized = mesh.normalized();
        let (min, max) = normalized.bounds().unwrap();
        prop_assert!((min.x + max.x).abs() < 1e-9);
        prop_assert!((min.y + max.y).abs() < 1e-9);
        prop_assert!(min.z.abs() < 1e-9);
        prop_assert!((normalized.extents() - mesh.extents()).norm() < 1e-9);
    }

    #[test]
    fn normalization_is_idempotent(mesh in arb_mesh(20, 10)) {
        let once = mesh.normalized();
        let twice = once.normalized();
        for (a, b) in once.vertices.iter().zip(&twice.vertices) {
            prop_assert!((a.position - b.position).norm() < 1e-9);
        }
    }
}

// =============================================================================
// Decimation
// =============================================================================

proptest! {
    #[test]
    fn clustering_never_grows_the_mesh(mesh in arb_mesh(60, 80), voxel in 0.5..50.0f64) {
        if let Ok(result) = cluster_vertices(&mesh, voxel, &Deadline::unlimited()) {
            prop_assert!(result.final_triangles <= mesh.face_count());
            prop_assert!(result.mesh.vertex_count() <= mesh.vertex_count());
            for face in &result.mesh.faces {
                for &i in face {
                    prop_assert!((i as usize) < result.mesh.vertex_count());
                }
                prop_assert!(face[0] != face[1] && face[1] != face[2] && face[0] != face[2]);
            }
        }
    }
}

// =============================================================================
// Facets
// =============================================================================

proptest! {
    #[test]
    fn facets_partition_faces(mesh in arb_mesh(20, 30), tolerance in 0.1..30.0f64) {
        let facets = group_coplanar_faces(&mesh, tolerance);
        let mut seen = vec![false; mesh.face_count()];
        for facet in &facets {
            prop_assert!(!facet.faces.is_empty());
            for &f in &facet.faces {
                prop_assert!(!seen[f as usize], "face {} in two facets", f);
                seen[f as usize] = true;
            }
        }
    }
}

// =============================================================================
// Planar footprint
// =============================================================================

proptest! {
    #[test]
    fn hull_contains_its_points(points in arb_points_2d()) {
        let hull = convex_hull_2d(&points);
        for p in &points {
            prop_assert!(distance_to_hull(&hull, p) < 1e-6);
        }
    }

    #[test]
    fn min_rect_contains_points_and_beats_bounding_box(points in arb_points_2d()) {
        let hull = convex_hull_2d(&points);
        if let Some(rect) = min_area_rect(&hull) {
            prop_assert!(rect.half_major >= rect.half_minor);
            prop_assert!((rect.major_axis.norm() - 1.0).abs() < 1e-9);
            for p in &points {
                prop_assert!(rect.contains(p, 1e-6));
            }

            let (mut lo, mut hi) = (points[0], points[0]);
            for p in &points {
                lo = Point2::new(lo.x.min(p.x), lo.y.min(p.y));
                hi = Point2::new(hi.x.max(p.x), hi.y.max(p.y));
            }
            let aabb_area = (hi.x - lo.x) * (hi.y - lo.y);
            prop_assert!(rect.area() <= aabb_area + 1e-6);
        }
    }
}

// =============================================================================
// Rotation
// =============================================================================

proptest! {
    #[test]
    fn align_vectors_maps_source_onto_target(a in arb_direction(), b in arb_direction()) {
        let r = align_vectors(&a, &b);
        prop_assert!((r * a.normalize() - b.normalize()).norm() < 1e-9);
    }

    #[test]
    fn align_to_floor_handles_antiparallel(a in arb_direction()) {
        let r = align_vectors(&a, &(-a));
        prop_assert!((r * a.normalize() + a.normalize()).norm() < 1e-9);
    }
}
