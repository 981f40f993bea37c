//! Stability analysis of candidate resting facets.
//!
//! A facet becomes a placement [`Candidate`] only if it passes, in order:
//!
//! 1. **Hull proximity**: its centroid lies on (or very near) a convex hull
//!    plane whose outward normal roughly agrees with the facet normal.
//! 2. **Tipping**: rotated so the facet faces up, the center of mass projects
//!    inside the facet's footprint, grown by a small buffer.
//! 3. **Floor penetration**: rotated so the facet faces down, no reference
//!    point sits below the facet's resting plane.
//!
//! Every tolerance is a fraction of the mesh scale (`‖extents‖`).

use std::cmp::Ordering;
use std::fmt;

use nalgebra::{Point2, Point3, Vector3};
use rayon::prelude::*;
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{FloorReference, StabilityConfig};
use crate::facets::Facet;
use crate::footprint::{contains_buffered, convex_hull_2d, distance_to_hull, fit_footprint};
use crate::hull::ConvexHull;
use crate::reorient::align_vectors;
use crate::Mesh;

/// Why a facet was not accepted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// The hull has no faces to compare against.
    NoHullFace,
    /// The centroid is too far from the nearest hull plane.
    HullDistance { distance: f64, tolerance: f64 },
    /// The facet faces away from the matched hull face.
    HullNormal { dot: f64, min_dot: f64 },
    /// The center of mass falls outside the buffered footprint.
    Tipping { overhang: f64, buffer: f64 },
    /// Part of the object would sink into the bed.
    FloorPenetration { depth: f64, tolerance: f64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoHullFace => write!(f, "no hull face to match"),
            Self::HullDistance { distance, tolerance } => {
                write!(f, "{distance:.4} mm from the hull (limit {tolerance:.4} mm)")
            }
            Self::HullNormal { dot, min_dot } => {
                write!(f, "normal disagrees with the hull (dot {dot:.3} < {min_dot:.3})")
            }
            Self::Tipping { overhang, buffer } => {
                write!(f, "center of mass {overhang:.4} mm outside the footprint (buffer {buffer:.4} mm)")
            }
            Self::FloorPenetration { depth, tolerance } => {
                write!(f, "geometry {depth:.4} mm below the bed (limit {tolerance:.4} mm)")
            }
        }
    }
}

/// An accepted resting facet with its fitted footprint.
///
/// Serializes to the placement JSON consumed by front ends: every vector is
/// an `{"x", "y", "z"}` object and `ellipseRotation` is always 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Index of the source facet, used as a sort tie-break.
    pub facet_index: usize,
    pub normal: Vector3<f64>,
    pub centroid: Point3<f64>,
    pub area: f64,
    pub footprint_center: Point3<f64>,
    pub footprint_axis: Vector3<f64>,
    /// `[major, minor]`.
    pub radii: [f64; 2],
    /// Lowest facet vertex pushed out along the normal.
    pub marker: Point3<f64>,
}

struct Xyz(f64, f64, f64);

impl Serialize for Xyz {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Xyz", 3)?;
        s.serialize_field("x", &self.0)?;
        s.serialize_field("y", &self.1)?;
        s.serialize_field("z", &self.2)?;
        s.end()
    }
}

impl From<&Vector3<f64>> for Xyz {
    fn from(v: &Vector3<f64>) -> Self {
        Xyz(v.x, v.y, v.z)
    }
}

impl From<&Point3<f64>> for Xyz {
    fn from(p: &Point3<f64>) -> Self {
        Xyz(p.x, p.y, p.z)
    }
}

impl Serialize for Candidate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Candidate", 8)?;
        s.serialize_field("normal", &Xyz::from(&self.normal))?;
        s.serialize_field("centroid", &Xyz::from(&self.centroid))?;
        s.serialize_field("ellipseCenter", &Xyz::from(&self.footprint_center))?;
        s.serialize_field("ellipseAxis", &Xyz::from(&self.footprint_axis))?;
        s.serialize_field("ellipseRadii", &self.radii)?;
        s.serialize_field("ellipseRotation", &0.0)?;
        s.serialize_field("overlapArea", &self.area)?;
        s.serialize_field("bottomVertex", &Xyz::from(&self.marker))?;
        s.end()
    }
}

/// Order candidates by area, largest first; equal areas keep facet order.
pub fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.area
            .partial_cmp(&a.area)
            .unwrap_or(Ordering::Equal)
            .then(a.facet_index.cmp(&b.facet_index))
    });
}

/// Per-run state shared by every facet evaluation.
pub struct StabilityAnalyzer<'a> {
    mesh: &'a Mesh,
    hull: &'a ConvexHull,
    config: &'a StabilityConfig,
    center_of_mass: Point3<f64>,
    scale: f64,
    floor_points: Vec<Point3<f64>>,
}

impl<'a> StabilityAnalyzer<'a> {
    pub fn new(mesh: &'a Mesh, hull: &'a ConvexHull, config: &'a StabilityConfig) -> Self {
        let floor_points = match config.floor_reference {
            FloorReference::ConvexHull => hull.vertices.clone(),
            FloorReference::BoundingBox => mesh.bounding_box_corners(),
        };
        Self {
            mesh,
            hull,
            config,
            center_of_mass: mesh.center_of_mass(),
            scale: mesh.scale_factor(),
            floor_points,
        }
    }

    fn check_hull_proximity(&self, facet: &Facet) -> Result<(), Rejection> {
        let (face, distance) = self.hull.closest_face(&facet.centroid).ok_or(Rejection::NoHullFace)?;

        let tolerance = self.scale * self.config.hull_distance_fraction;
        if distance.abs() > tolerance {
            return Err(Rejection::HullDistance {
                distance: distance.abs(),
                tolerance,
            });
        }

        let dot = facet.normal.dot(&self.hull.normals[face]);
        if dot < self.config.min_hull_normal_dot {
            return Err(Rejection::HullNormal {
                dot,
                min_dot: self.config.min_hull_normal_dot,
            });
        }
        Ok(())
    }

    fn check_tipping(&self, facet: &Facet, vertices: &[Point3<f64>]) -> Result<(), Rejection> {
        let up = align_vectors(&facet.normal, &Vector3::z());
        let footprint: Vec<Point2<f64>> = vertices
            .iter()
            .map(|p| up * p)
            .map(|p| Point2::new(p.x, p.y))
            .collect();
        let hull = convex_hull_2d(&footprint);

        let com = up * self.center_of_mass;
        let com = Point2::new(com.x, com.y);
        let buffer = self.scale * self.config.footprint_buffer_fraction;

        if contains_buffered(&hull, &com, buffer) {
            Ok(())
        } else {
            Err(Rejection::Tipping {
                overhang: distance_to_hull(&hull, &com),
                buffer,
            })
        }
    }

    fn check_floor(&self, facet: &Facet) -> Result<(), Rejection> {
        let down = align_vectors(&facet.normal, &-Vector3::z());
        let plane_z = (down * facet.centroid).z;
        let lowest = self
            .floor_points
            .iter()
            .map(|p| (down * p).z)
            .fold(f64::INFINITY, f64::min);

        let tolerance = self.scale * self.config.floor_tolerance_fraction;
        if lowest < plane_z - tolerance {
            Err(Rejection::FloorPenetration {
                depth: plane_z - lowest,
                tolerance,
            })
        } else {
            Ok(())
        }
    }

    /// Run the three filters on one facet and fit its footprint if it passes.
    pub fn evaluate(&self, facet_index: usize, facet: &Facet) -> Result<Candidate, Rejection> {
        self.check_hull_proximity(facet)?;

        let vertices = facet.vertex_positions(self.mesh);
        self.check_tipping(facet, &vertices)?;
        self.check_floor(facet)?;

        let up = align_vectors(&facet.normal, &Vector3::z());
        let fit = fit_footprint(facet, &vertices, &up, self.config.degenerate_radius_scale);

        let lowest = vertices
            .iter()
            .min_by(|a, b| a.z.total_cmp(&b.z))
            .copied()
            .unwrap_or(facet.centroid);

        Ok(Candidate {
            facet_index,
            normal: facet.normal,
            centroid: facet.centroid,
            area: facet.area,
            footprint_center: fit.center,
            footprint_axis: fit.axis,
            radii: fit.radii,
            marker: lowest + facet.normal * self.config.marker_offset,
        })
    }

    /// Evaluate every facet in parallel and return the accepted ones,
    /// largest first.
    pub fn analyze(&self, facets: &[Facet]) -> Vec<Candidate> {
        let results: Vec<(usize, Result<Candidate, Rejection>)> = facets
            .par_iter()
            .enumerate()
            .map(|(i, facet)| (i, self.evaluate(i, facet)))
            .collect();

        let mut candidates = Vec::with_capacity(results.len());
        let mut rejected = 0usize;
        for (i, result) in results {
            match result {
                Ok(candidate) => candidates.push(candidate),
                Err(reason) => {
                    rejected += 1;
                    debug!(facet = i, area = facets[i].area, "Facet rejected: {}", reason);
                }
            }
        }
        sort_candidates(&mut candidates);

        info!(
            facets = facets.len(),
            accepted = candidates.len(),
            rejected,
            "Stability analysis complete"
        );
        candidates
    }
}

/// Convenience wrapper around [`StabilityAnalyzer::analyze`].
pub fn analyze_stability(
    mesh: &Mesh,
    hull: &ConvexHull,
    facets: &[Facet],
    config: &StabilityConfig,
) -> Vec<Candidate> {
    StabilityAnalyzer::new(mesh, hull, config).analyze(facets)
}
