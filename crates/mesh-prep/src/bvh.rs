//! Bounding volume hierarchy over mesh faces for first-hit ray queries.

use nalgebra::{Point3, Vector3};

use crate::types::{Mesh, Triangle};

/// Padding added to every box so rays grazing a face still enter it.
const AABB_EPSILON: f64 = 1e-9;

/// Determinant threshold below which a ray counts as parallel to a face.
const PARALLEL_EPSILON: f64 = 1e-12;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy)]
struct Aabb {
    min: Point3<f64>,
    max: Point3<f64>,
}

impl Aabb {
    fn from_triangle(tri: &Triangle) -> Self {
        let min = Point3::new(
            tri.v0.x.min(tri.v1.x).min(tri.v2.x),
            tri.v0.y.min(tri.v1.y).min(tri.v2.y),
            tri.v0.z.min(tri.v1.z).min(tri.v2.z),
        );
        let max = Point3::new(
            tri.v0.x.max(tri.v1.x).max(tri.v2.x),
            tri.v0.y.max(tri.v1.y).max(tri.v2.y),
            tri.v0.z.max(tri.v1.z).max(tri.v2.z),
        );
        Self { min, max }
    }

    fn union(&self, other: &Aabb) -> Self {
        Self {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    fn expand(&self, epsilon: f64) -> Self {
        let pad = Vector3::repeat(epsilon);
        Self {
            min: self.min - pad,
            max: self.max + pad,
        }
    }

    /// Slab test. Returns the entry distance if the ray hits the box in front
    /// of its origin.
    fn ray_entry(&self, origin: &Point3<f64>, dir_inv: &Vector3<f64>) -> Option<f64> {
        let t1 = (self.min - origin).component_mul(dir_inv);
        let t2 = (self.max - origin).component_mul(dir_inv);

        let t_min = t1.x.min(t2.x).max(t1.y.min(t2.y)).max(t1.z.min(t2.z));
        let t_max = t1.x.max(t2.x).min(t1.y.max(t2.y)).min(t1.z.max(t2.z));

        if t_max >= t_min && t_max >= 0.0 {
            Some(t_min.max(0.0))
        } else {
            None
        }
    }
}

#[derive(Debug)]
enum BvhNode {
    Leaf {
        aabb: Aabb,
        face: usize,
    },
    Internal {
        aabb: Aabb,
        left: Box<BvhNode>,
        right: Box<BvhNode>,
    },
}

impl BvhNode {
    fn build(triangles: &[Triangle], boxes: &[Aabb], indices: &mut [usize]) -> Option<Self> {
        match indices {
            [] => None,
            [face] => Some(BvhNode::Leaf {
                aabb: boxes[*face],
                face: *face,
            }),
            _ => {
                let aabb = indices[1..]
                    .iter()
                    .fold(boxes[indices[0]], |acc, &i| acc.union(&boxes[i]));

                let extent = aabb.max - aabb.min;
                let axis = extent.imax();

                // Median split on the centroid along the longest axis.
                let mid = indices.len() / 2;
                indices.select_nth_unstable_by(mid, |&a, &b| {
                    let ca = triangles[a].centroid()[axis];
                    let cb = triangles[b].centroid()[axis];
                    ca.total_cmp(&cb)
                });
                let (left_indices, right_indices) = indices.split_at_mut(mid);

                let left = BvhNode::build(triangles, boxes, left_indices);
                let right = BvhNode::build(triangles, boxes, right_indices);

                match (left, right) {
                    (Some(l), Some(r)) => Some(BvhNode::Internal {
                        aabb,
                        left: Box::new(l),
                        right: Box::new(r),
                    }),
                    (Some(only), None) | (None, Some(only)) => Some(only),
                    (None, None) => None,
                }
            }
        }
    }

    fn aabb(&self) -> &Aabb {
        match self {
            BvhNode::Leaf { aabb, .. } | BvhNode::Internal { aabb, .. } => aabb,
        }
    }
}

/// The closest intersection along a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Distance from the ray origin.
    pub distance: f64,
    /// Index of the face that was hit.
    pub face: usize,
}

/// Ray-casting acceleration structure built once per mesh snapshot.
#[derive(Debug)]
pub struct TriangleBvh {
    triangles: Vec<Triangle>,
    root: Option<BvhNode>,
}

impl TriangleBvh {
    /// Build the hierarchy over every face of `mesh`.
    pub fn build(mesh: &Mesh) -> Self {
        let triangles: Vec<Triangle> = mesh.triangles().collect();
        let boxes: Vec<Aabb> = triangles
            .iter()
            .map(|t| Aabb::from_triangle(t).expand(AABB_EPSILON))
            .collect();
        let mut indices: Vec<usize> = (0..triangles.len()).collect();
        let root = BvhNode::build(&triangles, &boxes, &mut indices);
        Self { triangles, root }
    }

    /// Number of faces in the hierarchy.
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    /// True if the hierarchy holds no faces.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// First face hit by the ray, ignoring `skip_face`.
    ///
    /// `direction` need not be normalized; distances are in units of its
    /// length.
    pub fn first_hit(
        &self,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        skip_face: Option<usize>,
    ) -> Option<RayHit> {
        let root = self.root.as_ref()?;
        let dir_inv = direction.map(|d| {
            if d.abs() > PARALLEL_EPSILON {
                1.0 / d
            } else {
                1.0 / PARALLEL_EPSILON.copysign(d)
            }
        });
        let mut best: Option<RayHit> = None;
        self.trace(root, origin, direction, &dir_inv, skip_face, &mut best);
        best
    }

    fn trace(
        &self,
        node: &BvhNode,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        dir_inv: &Vector3<f64>,
        skip_face: Option<usize>,
        best: &mut Option<RayHit>,
    ) {
        let Some(t_near) = node.aabb().ray_entry(origin, dir_inv) else {
            return;
        };
        if best.is_some_and(|hit| t_near > hit.distance) {
            return;
        }

        match node {
            BvhNode::Leaf { face, .. } => {
                if skip_face == Some(*face) {
                    return;
                }
                let Some(t) = ray_triangle_intersect(origin, direction, &self.triangles[*face]) else {
                    return;
                };
                if best.is_none_or(|hit| t < hit.distance) {
                    *best = Some(RayHit {
                        distance: t,
                        face: *face,
                    });
                }
            }
            BvhNode::Internal { left, right, .. } => {
                self.trace(left, origin, direction, dir_inv, skip_face, best);
                self.trace(right, origin, direction, dir_inv, skip_face, best);
            }
        }
    }
}

/// Möller–Trumbore ray-triangle intersection. Returns the distance along the
/// ray to a hit strictly in front of the origin.
pub fn ray_triangle_intersect(
    origin: &Point3<f64>,
    direction: &Vector3<f64>,
    tri: &Triangle,
) -> Option<f64> {
    let edge1 = tri.v1 - tri.v0;
    let edge2 = tri.v2 - tri.v0;

    let h = direction.cross(&edge2);
    let a = edge1.dot(&h);

    if a.abs() < PARALLEL_EPSILON {
        return None;
    }

    let f = 1.0 / a;
    let s = origin - tri.v0;
    let u = f * s.dot(&h);

    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(&edge1);
    let v = f * direction.dot(&q);

    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(&q);

    if t > PARALLEL_EPSILON { Some(t) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle() -> Triangle {
        Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        )
    }

    fn stacked_squares(levels: &[f64]) -> Mesh {
        let mut positions = Vec::new();
        let mut faces = Vec::new();
        for &z in levels {
            let base = positions.len() as u32;
            positions.extend([[0.0, 0.0, z], [1.0, 0.0, z], [1.0, 1.0, z], [0.0, 1.0, z]]);
            faces.push([base, base + 1, base + 2]);
            faces.push([base, base + 2, base + 3]);
        }
        Mesh::from_parts(positions, faces)
    }

    #[test]
    fn test_ray_triangle_hit() {
        let t = ray_triangle_intersect(
            &Point3::new(0.25, 0.25, 1.0),
            &Vector3::new(0.0, 0.0, -1.0),
            &unit_triangle(),
        );
        assert!((t.unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ray_triangle_miss_and_parallel() {
        let tri = unit_triangle();
        let down = Vector3::new(0.0, 0.0, -1.0);
        assert!(ray_triangle_intersect(&Point3::new(2.0, 2.0, 1.0), &down, &tri).is_none());
        // Behind the origin.
        assert!(ray_triangle_intersect(&Point3::new(0.25, 0.25, -1.0), &down, &tri).is_none());
        let sideways = Vector3::new(1.0, 0.0, 0.0);
        assert!(ray_triangle_intersect(&Point3::new(-1.0, 0.25, 0.0), &sideways, &tri).is_none());
    }

    #[test]
    fn test_first_hit_is_closest() {
        let mesh = stacked_squares(&[0.0, 3.0, 7.0, 1.5]);
        let bvh = TriangleBvh::build(&mesh);
        assert_eq!(bvh.len(), 8);

        let hit = bvh
            .first_hit(
                &Point3::new(0.3, 0.6, 10.0),
                &Vector3::new(0.0, 0.0, -1.0),
                None,
            )
            .unwrap();
        assert!((hit.distance - 3.0).abs() < 1e-12);
        assert!(hit.face == 4 || hit.face == 5);
    }

    #[test]
    fn test_first_hit_skips_source_face() {
        let mesh = stacked_squares(&[0.0, 2.0]);
        let bvh = TriangleBvh::build(&mesh);
        let origin = Point3::new(0.8, 0.1, 2.0);
        let hit = bvh
            .first_hit(&origin, &Vector3::new(0.0, 0.0, -1.0), Some(2))
            .unwrap();
        assert!((hit.distance - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_bvh() {
        let bvh = TriangleBvh::build(&Mesh::new());
        assert!(bvh.is_empty());
        assert!(bvh
            .first_hit(&Point3::origin(), &Vector3::z(), None)
            .is_none());
    }
}
