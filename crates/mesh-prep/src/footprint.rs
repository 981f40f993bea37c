//! Planar footprint geometry: 2D hulls, buffered containment and the
//! minimum-area oriented rectangle used to describe a resting face.

use std::f64::consts::PI;

use nalgebra::{Point2, Point3, Rotation3, Vector2, Vector3};

use crate::facets::Facet;
use crate::reorient::any_perpendicular;

/// Points closer than this are treated as one when building a hull.
const HULL_EPSILON: f64 = 1e-12;

#[inline]
fn cross(o: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Convex hull by Andrew's monotone chain, counter-clockwise, without
/// collinear points. Degenerate input yields one or two points.
pub fn convex_hull_2d(points: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let mut pts: Vec<Point2<f64>> = points.iter().copied().filter(|p| p.x.is_finite() && p.y.is_finite()).collect();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup_by(|a, b| (*a - *b).norm() <= HULL_EPSILON);

    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<Point2<f64>> = Vec::with_capacity(pts.len());
    for p in &pts {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= HULL_EPSILON {
            lower.pop();
        }
        lower.push(*p);
    }

    let mut upper: Vec<Point2<f64>> = Vec::with_capacity(pts.len());
    for p in pts.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= HULL_EPSILON {
            upper.pop();
        }
        upper.push(*p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);

    // All points collinear: keep the two extremes.
    if lower.len() < 3 {
        return vec![pts[0], pts[pts.len() - 1]];
    }
    lower
}

fn distance_to_segment(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq <= HULL_EPSILON * HULL_EPSILON {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

/// Distance from `p` to a hull as returned by [`convex_hull_2d`]: zero
/// inside, distance to the boundary outside. Infinite for an empty hull.
pub fn distance_to_hull(hull: &[Point2<f64>], p: &Point2<f64>) -> f64 {
    match hull {
        [] => f64::INFINITY,
        [a] => (p - a).norm(),
        [a, b] => distance_to_segment(p, a, b),
        _ => {
            let n = hull.len();
            let inside = (0..n).all(|i| cross(&hull[i], &hull[(i + 1) % n], p) >= 0.0);
            if inside {
                return 0.0;
            }
            (0..n)
                .map(|i| distance_to_segment(p, &hull[i], &hull[(i + 1) % n]))
                .fold(f64::INFINITY, f64::min)
        }
    }
}

/// True if `p` lies inside the hull grown by `buffer`.
pub fn contains_buffered(hull: &[Point2<f64>], p: &Point2<f64>, buffer: f64) -> bool {
    distance_to_hull(hull, p) <= buffer
}

/// A rectangle with its long side along `major_axis`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedRect {
    pub center: Point2<f64>,
    /// Unit direction of the long side.
    pub major_axis: Vector2<f64>,
    pub half_major: f64,
    pub half_minor: f64,
}

impl OrientedRect {
    pub fn area(&self) -> f64 {
        4.0 * self.half_major * self.half_minor
    }

    /// True if `p` is inside, allowing `tolerance` on every side.
    pub fn contains(&self, p: &Point2<f64>, tolerance: f64) -> bool {
        let d = p - self.center;
        let minor_axis = Vector2::new(-self.major_axis.y, self.major_axis.x);
        d.dot(&self.major_axis).abs() <= self.half_major + tolerance
            && d.dot(&minor_axis).abs() <= self.half_minor + tolerance
    }
}

/// Minimum-area enclosing rectangle of a convex polygon.
///
/// One side of the optimal rectangle is collinear with a hull edge, so every
/// edge direction is tried. Needs at least three hull points.
pub fn min_area_rect(hull: &[Point2<f64>]) -> Option<OrientedRect> {
    if hull.len() < 3 {
        return None;
    }

    let n = hull.len();
    let mut best: Option<(f64, OrientedRect)> = None;

    for i in 0..n {
        let Some(u) = (hull[(i + 1) % n] - hull[i]).try_normalize(HULL_EPSILON) else {
            continue;
        };
        let v = Vector2::new(-u.y, u.x);

        let (mut min_u, mut max_u) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_v, mut max_v) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in hull {
            let pu = p.coords.dot(&u);
            let pv = p.coords.dot(&v);
            min_u = min_u.min(pu);
            max_u = max_u.max(pu);
            min_v = min_v.min(pv);
            max_v = max_v.max(pv);
        }

        let area = (max_u - min_u) * (max_v - min_v);
        if best.as_ref().is_some_and(|(a, _)| *a <= area) {
            continue;
        }

        let mid_u = (min_u + max_u) / 2.0;
        let mid_v = (min_v + max_v) / 2.0;
        let center = Point2::from(u * mid_u + v * mid_v);
        let (half_u, half_v) = ((max_u - min_u) / 2.0, (max_v - min_v) / 2.0);

        let rect = if half_u >= half_v {
            OrientedRect {
                center,
                major_axis: u,
                half_major: half_u,
                half_minor: half_v,
            }
        } else {
            OrientedRect {
                center,
                major_axis: v,
                half_major: half_v,
                half_minor: half_u,
            }
        };
        best = Some((area, rect));
    }

    best.map(|(_, rect)| rect)
}

/// A footprint expressed back in the mesh frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FootprintFit {
    pub center: Point3<f64>,
    /// Unit direction of the major axis.
    pub axis: Vector3<f64>,
    /// `[major, minor]` half extents.
    pub radii: [f64; 2],
}

/// Fit the oriented footprint of a facet.
///
/// `to_plane` rotates the facet normal onto +Z; `vertices` are the facet's
/// distinct vertex positions in the mesh frame.
pub fn fit_footprint(
    facet: &Facet,
    vertices: &[Point3<f64>],
    to_plane: &Rotation3<f64>,
    degenerate_radius_scale: f64,
) -> FootprintFit {
    let rotated: Vec<Point3<f64>> = vertices.iter().map(|p| to_plane * p).collect();
    let flat: Vec<Point2<f64>> = rotated.iter().map(|p| Point2::new(p.x, p.y)).collect();
    let hull = convex_hull_2d(&flat);

    let Some(rect) = min_area_rect(&hull) else {
        return degenerate_footprint(facet, degenerate_radius_scale);
    };

    let mean_z = rotated.iter().map(|p| p.z).sum::<f64>() / rotated.len() as f64;
    let from_plane = to_plane.inverse();

    let center = from_plane * Point3::new(rect.center.x, rect.center.y, mean_z);
    let axis = from_plane * Vector3::new(rect.major_axis.x, rect.major_axis.y, 0.0);
    let axis = axis / (axis.norm() + 1e-9);

    FootprintFit {
        center,
        axis,
        radii: [rect.half_major, rect.half_minor],
    }
}

/// Isotropic stand-in for a footprint that projects to a point or segment.
pub fn degenerate_footprint(facet: &Facet, radius_scale: f64) -> FootprintFit {
    let radius = radius_scale * (facet.area.max(0.0) / PI).sqrt();
    FootprintFit {
        center: facet.centroid,
        axis: any_perpendicular(&facet.normal),
        radii: [radius, radius],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point2<f64> {
        Point2::new(x, y)
    }

    #[test]
    fn test_hull_of_square_with_interior_and_collinear_points() {
        let points = [
            p(0.0, 0.0),
            p(2.0, 0.0),
            p(2.0, 2.0),
            p(0.0, 2.0),
            p(1.0, 1.0),
            p(1.0, 0.0),
            p(2.0, 2.0),
        ];
        let hull = convex_hull_2d(&points);
        assert_eq!(hull, vec![p(0.0, 0.0), p(2.0, 0.0), p(2.0, 2.0), p(0.0, 2.0)]);
    }

    #[test]
    fn test_degenerate_hulls() {
        assert_eq!(convex_hull_2d(&[p(1.0, 1.0), p(1.0, 1.0)]).len(), 1);
        let line = convex_hull_2d(&[p(0.0, 0.0), p(1.0, 1.0), p(2.0, 2.0), p(3.0, 3.0)]);
        assert_eq!(line, vec![p(0.0, 0.0), p(3.0, 3.0)]);
    }

    #[test]
    fn test_buffered_containment() {
        let hull = convex_hull_2d(&[p(0.0, 0.0), p(4.0, 0.0), p(4.0, 4.0), p(0.0, 4.0)]);
        assert!(contains_buffered(&hull, &p(2.0, 2.0), 0.0));
        assert!(contains_buffered(&hull, &p(4.0, 2.0), 0.0));
        assert!(!contains_buffered(&hull, &p(4.5, 2.0), 0.4));
        assert!(contains_buffered(&hull, &p(4.5, 2.0), 0.5));

        let segment = [p(0.0, 0.0), p(4.0, 0.0)];
        assert!((distance_to_hull(&segment, &p(2.0, 3.0)) - 3.0).abs() < 1e-12);
        assert!(distance_to_hull(&[], &p(0.0, 0.0)).is_infinite());
    }

    #[test]
    fn test_min_area_rect_of_rotated_rectangle() {
        let angle = 0.3f64;
        let (c, s) = (angle.cos(), angle.sin());
        let corners: Vec<Point2<f64>> = [(-3.0, -1.0), (3.0, -1.0), (3.0, 1.0), (-3.0, 1.0)]
            .iter()
            .map(|&(x, y)| p(5.0 + c * x - s * y, -2.0 + s * x + c * y))
            .collect();
        let rect = min_area_rect(&convex_hull_2d(&corners)).unwrap();
        assert!((rect.half_major - 3.0).abs() < 1e-9);
        assert!((rect.half_minor - 1.0).abs() < 1e-9);
        assert!((rect.center - p(5.0, -2.0)).norm() < 1e-9);
        assert!(rect.major_axis.dot(&Vector2::new(c, s)).abs() > 1.0 - 1e-9);
        assert!((rect.area() - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_footprint_maps_back_to_mesh_frame() {
        // A 6 x 2 rectangle lying at z = 0, facing down.
        let facet = Facet {
            faces: vec![0, 1],
            normal: Vector3::new(0.0, 0.0, -1.0),
            area: 12.0,
            centroid: Point3::new(0.0, 0.0, 0.0),
        };
        let vertices = [
            Point3::new(-3.0, -1.0, 0.0),
            Point3::new(3.0, -1.0, 0.0),
            Point3::new(3.0, 1.0, 0.0),
            Point3::new(-3.0, 1.0, 0.0),
        ];
        let to_plane = crate::reorient::align_vectors(&facet.normal, &Vector3::z());
        let fit = fit_footprint(&facet, &vertices, &to_plane, 0.9);
        assert!((fit.radii[0] - 3.0).abs() < 1e-9);
        assert!((fit.radii[1] - 1.0).abs() < 1e-9);
        assert!(fit.center.coords.norm() < 1e-9);
        assert!(fit.axis.x.abs() > 1.0 - 1e-6);
    }

    #[test]
    fn test_degenerate_footprint_is_isotropic() {
        let facet = Facet {
            faces: vec![0],
            normal: Vector3::z(),
            area: PI,
            centroid: Point3::new(1.0, 2.0, 3.0),
        };
        let fit = degenerate_footprint(&facet, 0.9);
        assert!((fit.radii[0] - 0.9).abs() < 1e-12);
        assert_eq!(fit.radii[0], fit.radii[1]);
        assert_eq!(fit.center, facet.centroid);
        assert!(fit.axis.dot(&facet.normal).abs() < 1e-12);
        assert!((fit.axis.norm() - 1.0).abs() < 1e-12);
    }
}
