//! Convex hull of a mesh, the reference exterior for stability analysis.

use nalgebra::{Point3, Vector3};
use tracing::{debug, warn};

use crate::error::{MeshError, MeshResult};
use crate::Mesh;

/// Convex hull with outward-facing triangles.
///
/// For hull triangle `i`, `origins[i]` is its first vertex and `normals[i]`
/// its outward unit normal, so the supporting plane is
/// `(p - origins[i]) · normals[i] = 0`.
#[derive(Debug, Clone)]
pub struct ConvexHull {
    pub vertices: Vec<Point3<f64>>,
    pub triangles: Vec<[u32; 3]>,
    pub origins: Vec<Point3<f64>>,
    pub normals: Vec<Vector3<f64>>,
}

impl ConvexHull {
    /// Hull of all vertices of `mesh`.
    pub fn compute(mesh: &Mesh) -> MeshResult<Self> {
        let points: Vec<Point3<f64>> = mesh.vertices.iter().map(|v| v.position).collect();
        Self::from_points(&points)
    }

    /// Hull of the mesh vertices, falling back to the hull of the bounding
    /// box corners when that fails. Errors only if both do.
    pub fn compute_or_bounds(mesh: &Mesh) -> MeshResult<Self> {
        Self::compute(mesh).or_else(|e| {
            warn!(error = %e, "Vertex hull failed; using the bounding box");
            Self::from_points(&mesh.bounding_box_corners())
        })
    }

    /// Hull of a point set. Fails for fewer than four points or coplanar input.
    pub fn from_points(points: &[Point3<f64>]) -> MeshResult<Self> {
        if points.len() < 4 {
            return Err(MeshError::HullFailed {
                details: format!("need at least 4 points, got {}", points.len()),
            });
        }

        // parry works in single precision on its own vector type.
        let input: Vec<parry3d::math::Vector3> = points
            .iter()
            .map(|p| parry3d::math::Vector3::new(p.x as f32, p.y as f32, p.z as f32))
            .collect();

        let (hull_points, hull_triangles) = parry3d::transformation::try_convex_hull(&input)
            .map_err(|e| MeshError::HullFailed {
                details: format!("{:?}", e),
            })?;

        let vertices: Vec<Point3<f64>> = hull_points
            .iter()
            .map(|p| Point3::new(p.x as f64, p.y as f64, p.z as f64))
            .collect();

        if vertices.is_empty() {
            return Err(MeshError::HullFailed {
                details: "hull has no vertices".to_string(),
            });
        }
        let center = Point3::from(
            vertices.iter().map(|p| p.coords).sum::<Vector3<f64>>() / vertices.len() as f64,
        );

        let mut triangles = Vec::with_capacity(hull_triangles.len());
        let mut origins = Vec::with_capacity(hull_triangles.len());
        let mut normals = Vec::with_capacity(hull_triangles.len());

        for tri in hull_triangles {
            let [a, b, c] = tri.map(|i| vertices[i as usize]);
            let Some(n) = (b - a).cross(&(c - a)).try_normalize(f64::EPSILON) else {
                continue;
            };
            if (a - center).dot(&n) < 0.0 {
                triangles.push([tri[0], tri[2], tri[1]]);
                normals.push(-n);
            } else {
                triangles.push(tri);
                normals.push(n);
            }
            origins.push(a);
        }

        if triangles.is_empty() {
            return Err(MeshError::HullFailed {
                details: "input points are coplanar".to_string(),
            });
        }

        debug!(
            hull_vertices = vertices.len(),
            hull_faces = triangles.len(),
            "Convex hull computed"
        );

        Ok(Self {
            vertices,
            triangles,
            origins,
            normals,
        })
    }

    /// Number of hull triangles.
    pub fn face_count(&self) -> usize {
        self.triangles.len()
    }

    /// Signed distance from `point` to the supporting plane of hull face `i`,
    /// positive outside.
    #[inline]
    pub fn plane_distance(&self, i: usize, point: &Point3<f64>) -> f64 {
        (point - self.origins[i]).dot(&self.normals[i])
    }

    /// The hull face whose supporting plane is closest to `point`, with the
    /// signed distance to it.
    pub fn closest_face(&self, point: &Point3<f64>) -> Option<(usize, f64)> {
        (0..self.face_count())
            .map(|i| (i, self.plane_distance(i, point)))
            .min_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_points(size: f64) -> Vec<Point3<f64>> {
        let mut points = Vec::new();
        for &x in &[0.0, size] {
            for &y in &[0.0, size] {
                for &z in &[0.0, size] {
                    points.push(Point3::new(x, y, z));
                }
            }
        }
        // An interior point that must not end up on the hull.
        points.push(Point3::new(size / 2.0, size / 2.0, size / 2.0));
        points
    }

    #[test]
    fn test_cube_hull_normals_point_outward() {
        let hull = ConvexHull::from_points(&cube_points(10.0)).unwrap();
        assert_eq!(hull.vertices.len(), 8);
        assert_eq!(hull.face_count(), 12);

        let center = Point3::new(5.0, 5.0, 5.0);
        for i in 0..hull.face_count() {
            assert!(hull.plane_distance(i, &center) < -4.99);
            assert!((hull.normals[i].norm() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_closest_face_to_bottom_centroid() {
        let hull = ConvexHull::from_points(&cube_points(10.0)).unwrap();
        let (face, distance) = hull.closest_face(&Point3::new(5.0, 5.0, 0.0)).unwrap();
        assert!(distance.abs() < 1e-5);
        assert!((hull.normals[face].z + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_hull_vertices_keep_input_coordinates() {
        let offset = Vector3::new(-3.5, 12.25, 0.5);
        let points: Vec<_> = cube_points(4.0).into_iter().map(|p| p + offset).collect();
        let hull = ConvexHull::from_points(&points).unwrap();

        for v in &hull.vertices {
            let local = v - offset;
            for c in local.iter() {
                assert!(c.abs() < 1e-5 || (c - 4.0).abs() < 1e-5, "off-corner vertex {:?}", v);
            }
        }
        for (origin, tri) in hull.origins.iter().zip(&hull.triangles) {
            assert_eq!(*origin, hull.vertices[tri[0] as usize]);
        }
    }

    #[test]
    fn test_failed_vertex_hull_falls_back_to_bounds() {
        let lone = Mesh::from_parts(
            [[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 3.0, 1.0]],
            vec![[0, 1, 2]],
        );
        assert!(ConvexHull::compute(&lone).is_err());

        let hull = ConvexHull::compute_or_bounds(&lone).unwrap();
        assert_eq!(hull.vertices.len(), 8);
        assert_eq!(hull.face_count(), 12);
        let (_, top) = hull.closest_face(&Point3::new(1.0, 1.5, 1.0)).unwrap();
        assert!(top.abs() < 1e-5);
    }

    #[test]
    fn test_too_few_points() {
        let points = [Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        assert!(matches!(
            ConvexHull::from_points(&points),
            Err(MeshError::HullFailed { .. })
        ));
    }
}
