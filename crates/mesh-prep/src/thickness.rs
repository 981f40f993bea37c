//! Wall thickness check by randomized ray sampling.
//!
//! A sample of faces is drawn (area-weighted for ordinary meshes, uniform
//! for very large ones). From each sampled face a ray is cast inward from
//! just behind its centroid; the distance to the first face it meets is the
//! local wall thickness. The check fails only when the *fraction* of thin
//! samples exceeds a tolerance, so an isolated thin spot or a stray ray does
//! not reject a model.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::budget::Deadline;
use crate::bvh::TriangleBvh;
use crate::config::ThicknessConfig;
use crate::error::{MeshError, MeshResult};
use crate::tracing_ext::StageTimer;
use crate::validate::{Check, ValidationResult};
use crate::Mesh;

/// Metric reported when no ray hit anything.
pub const SKIPPED_METRIC: f64 = 999.0;

/// Statistics from one sampling run.
#[derive(Debug, Clone, PartialEq)]
pub struct ThicknessReport {
    /// Faces drawn.
    pub samples: usize,
    /// Rays that hit the far wall.
    pub hits: usize,
    /// Hits closer than the threshold.
    pub thin: usize,
    /// Smallest measured distance, infinite without hits.
    pub min_thickness: f64,
}

impl ThicknessReport {
    /// Fraction of hits below the threshold.
    pub fn fail_rate(&self) -> f64 {
        if self.hits == 0 {
            0.0
        } else {
            self.thin as f64 / self.hits as f64
        }
    }
}

impl std::fmt::Display for ThicknessReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} samples, {} hits, {} thin, min {:.3} mm",
            self.samples, self.hits, self.thin, self.min_thickness
        )
    }
}

/// Draw face indices to sample.
pub fn sample_faces(mesh: &Mesh, config: &ThicknessConfig, rng: &mut impl Rng) -> MeshResult<Vec<usize>> {
    let face_count = mesh.face_count();
    let count = config.samples_for(face_count);

    if face_count > config.uniform_sampling_above {
        return Ok((0..count).map(|_| rng.gen_range(0..face_count)).collect());
    }

    let weights = WeightedIndex::new(mesh.face_areas())
        .map_err(|e| MeshError::empty_mesh(format!("no face can be sampled by area: {}", e)))?;
    Ok((0..count).map(|_| weights.sample(rng)).collect())
}

/// Cast the sample rays and gather statistics.
pub fn measure_thickness(
    mesh: &Mesh,
    config: &ThicknessConfig,
    deadline: &Deadline,
) -> MeshResult<ThicknessReport> {
    if mesh.is_empty() {
        return Err(MeshError::empty_mesh("nothing to sample"));
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let samples = sample_faces(mesh, config, &mut rng)?;

    let bvh = TriangleBvh::build(mesh);
    let triangles: Vec<_> = mesh.triangles().collect();

    let distances: Vec<Option<f64>> = samples
        .par_iter()
        .map(|&face| {
            if deadline.is_expired() {
                return None;
            }

            let tri = &triangles[face];
            let normal = tri.normal()?;
            let origin = tri.centroid() - normal * config.ray_offset;
            bvh.first_hit(&origin, &(-normal), Some(face))
                .map(|hit| hit.distance)
        })
        .collect();

    if deadline.is_expired() {
        return Err(MeshError::timeout("thickness", deadline.budget()));
    }

    let hits: Vec<f64> = distances.into_iter().flatten().collect();
    let report = ThicknessReport {
        samples: samples.len(),
        hits: hits.len(),
        thin: hits.iter().filter(|&&d| d < config.min_thickness).count(),
        min_thickness: hits.iter().copied().fold(f64::INFINITY, f64::min),
    };
    debug!(%report, "Thickness sampling done");
    Ok(report)
}

/// The wall thickness check. Never fails on numerical trouble: a sampling
/// error or an exhausted budget passes with a warning.
pub fn check_thickness(mesh: &Mesh, config: &ThicknessConfig) -> ValidationResult {
    let _timer = StageTimer::for_mesh("thickness_check", mesh);
    let deadline = Deadline::new(config.budget());

    let report = match measure_thickness(mesh, config, &deadline) {
        Ok(report) => report,
        Err(e) => {
            warn!("Thickness check degraded: {}", e);
            return ValidationResult::pass(
                Check::Thickness,
                format!("Thickness warning: {}", e),
                Some(0.0),
            );
        }
    };

    if report.hits == 0 {
        warn!(samples = report.samples, "No thickness ray hit the mesh");
        return ValidationResult::pass(Check::Thickness, "Thickness Check Skipped", Some(SKIPPED_METRIC));
    }

    let rate = report.fail_rate();
    info!(
        samples = report.samples,
        hits = report.hits,
        thin = report.thin,
        min_thickness = report.min_thickness,
        "Wall thickness measured"
    );

    if rate > config.fail_rate_threshold {
        ValidationResult::fail(
            Check::Thickness,
            format!(
                "Thin walls: {:.2}mm. {} spots ({:.1}%) are too thin.",
                report.min_thickness,
                report.thin,
                rate * 100.0
            ),
            Some(report.min_thickness),
        )
    } else {
        ValidationResult::pass(
            Check::Thickness,
            format!(
                "Wall thickness safe ({:.1}% minor thin spots allowed)",
                rate * 100.0
            ),
            Some(report.min_thickness),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::FailureKind;
    use crate::Vertex;
    use std::time::Duration;

    fn slab(size: f64, thickness: f64) -> Mesh {
        let (s, t) = (size, thickness);
        Mesh::from_parts(
            [
                [0.0, 0.0, 0.0],
                [s, 0.0, 0.0],
                [s, s, 0.0],
                [0.0, s, 0.0],
                [0.0, 0.0, t],
                [s, 0.0, t],
                [s, s, t],
                [0.0, s, t],
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

    fn seeded() -> ThicknessConfig {
        ThicknessConfig {
            seed: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn test_thick_slab_passes_with_measured_minimum() {
        let config = ThicknessConfig {
            seed: Some(1),
            sample_count: 64,
            min_samples: 64,
            ..Default::default()
        };
        let mesh = slab(20.0, 2.0);
        let report = measure_thickness(&mesh, &config, &Deadline::unlimited()).unwrap();
        assert_eq!(report.samples, 12);
        assert_eq!(report.hits, 12);
        assert!((report.min_thickness - 2.0).abs() <= 0.0011, "{}", report);

        let result = check_thickness(&mesh, &config);
        assert!(result.passed());
        assert_eq!(result.details, "Wall thickness safe (0.0% minor thin spots allowed)");
    }

    #[test]
    fn test_thin_slab_fails() {
        let mesh = slab(20.0, 0.4);
        let result = check_thickness(&mesh, &seeded());
        assert_eq!(result.failure_kind(), Some(FailureKind::WallsTooThin));
        let min = result.metric.unwrap();
        assert!((min - 0.4).abs() <= 0.0011);
        assert!(result.details.starts_with("Thin walls: 0.40mm."));
    }

    #[test]
    fn test_fail_rate_tolerance_is_respected() {
        let mesh = slab(20.0, 0.4);
        let lenient = ThicknessConfig {
            fail_rate_threshold: 1.0,
            ..seeded()
        };
        assert!(check_thickness(&mesh, &lenient).passed());
    }

    /// Closed box with every side split into an `n` x `n` grid, so area
    /// sampling has enough faces to draw from.
    fn gridded_box(origin: [f64; 3], size: [f64; 3], n: usize) -> Mesh {
        let mut mesh = Mesh::new();
        for axis in 0..3 {
            let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
            for high in [false, true] {
                for i in 0..n {
                    for j in 0..n {
                        let corner = |di: usize, dj: usize| {
                            let mut p = origin;
                            if high {
                                p[axis] += size[axis];
                            }
                            p[u] += size[u] * (i + di) as f64 / n as f64;
                            p[v] += size[v] * (j + dj) as f64 / n as f64;
                            p
                        };
                        let base = mesh.vertex_count() as u32;
                        for [x, y, z] in [corner(0, 0), corner(1, 0), corner(1, 1), corner(0, 1)] {
                            mesh.vertices.push(Vertex::from_coords(x, y, z));
                        }
                        let quad = if high {
                            [[0, 1, 2], [0, 2, 3]]
                        } else {
                            [[0, 2, 1], [0, 3, 2]]
                        };
                        mesh.faces.extend(quad.map(|f| f.map(|k| base + k)));
                    }
                }
            }
        }
        mesh
    }

    /// A 20 mm block plus a separate 0.4 mm plate of side `plate`.
    fn block_with_plate(plate: f64) -> Mesh {
        let mut mesh = gridded_box([0.0; 3], [20.0; 3], 10);
        let flange = gridded_box([100.0, 0.0, 0.0], [plate, plate, 0.4], 4);
        let base = mesh.vertex_count() as u32;
        mesh.vertices.extend(flange.vertices);
        mesh.faces.extend(flange.faces.iter().map(|f| f.map(|i| i + base)));
        mesh
    }

    fn many_samples() -> ThicknessConfig {
        ThicknessConfig {
            seed: Some(9),
            sample_count: 500,
            min_samples: 500,
            ..Default::default()
        }
    }

    #[test]
    fn test_few_thin_spots_are_tolerated() {
        // The plate is about 2% of the surface.
        let mesh = block_with_plate(5.0);
        let config = many_samples();
        let report = measure_thickness(&mesh, &config, &Deadline::unlimited()).unwrap();
        assert_eq!(report.samples, 500);
        assert_eq!(report.hits, 500);
        assert!(report.thin > 0, "{}", report);
        assert!(report.fail_rate() <= config.fail_rate_threshold, "{}", report);

        let result = check_thickness(&mesh, &config);
        assert!(result.passed());
        assert!(result.details.starts_with("Wall thickness safe ("));
        assert!((result.metric.unwrap() - 0.4).abs() <= 0.0011);
    }

    #[test]
    fn test_thin_spots_over_tolerance_fail() {
        // The plate is about 21% of the surface.
        let mesh = block_with_plate(18.0);
        let config = many_samples();
        let result = check_thickness(&mesh, &config);
        assert_eq!(result.failure_kind(), Some(FailureKind::WallsTooThin));
        assert!(result.details.starts_with("Thin walls: 0.40mm."));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let mesh = block_with_plate(5.0);
        let rate = measure_thickness(&mesh, &many_samples(), &Deadline::unlimited())
            .unwrap()
            .fail_rate();
        assert!(rate > 0.0);

        let at_rate = ThicknessConfig {
            fail_rate_threshold: rate,
            ..many_samples()
        };
        assert!(check_thickness(&mesh, &at_rate).passed());

        let just_below = ThicknessConfig {
            fail_rate_threshold: rate - 1e-9,
            ..many_samples()
        };
        assert_eq!(
            check_thickness(&mesh, &just_below).failure_kind(),
            Some(FailureKind::WallsTooThin)
        );
    }

    #[test]
    fn test_open_surface_is_skipped() {
        let mesh = Mesh::from_parts(
            [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![[0, 1, 2]],
        );
        let result = check_thickness(&mesh, &seeded());
        assert!(result.passed());
        assert_eq!(result.details, "Thickness Check Skipped");
        assert_eq!(result.metric, Some(SKIPPED_METRIC));
    }

    #[test]
    fn test_exhausted_budget_degrades_to_warning() {
        let mesh = slab(20.0, 0.4);
        let err = measure_thickness(&mesh, &seeded(), &Deadline::new(Duration::ZERO)).unwrap_err();
        assert!(matches!(err, MeshError::Timeout { .. }));

        let config = ThicknessConfig {
            budget_secs: 0.0,
            ..seeded()
        };
        let result = check_thickness(&mesh, &config);
        assert!(result.passed());
        assert!(result.details.starts_with("Thickness warning: "));
        assert_eq!(result.metric, Some(0.0));
    }

    #[test]
    fn test_sample_counts() {
        let config = ThicknessConfig::default();
        assert_eq!(config.samples_for(12), 12);
        assert_eq!(config.samples_for(2_000), 200);
        assert_eq!(config.samples_for(50_000), 500);
        assert_eq!(config.samples_for(500), 100);
    }

    #[test]
    fn test_area_weighted_sampling_prefers_large_faces() {
        // One big and one tiny triangle.
        let mesh = Mesh::from_parts(
            [
                [0.0, 0.0, 0.0],
                [100.0, 0.0, 0.0],
                [0.0, 100.0, 0.0],
                [0.0, 0.0, 5.0],
                [0.01, 0.0, 5.0],
                [0.0, 0.01, 5.0],
            ],
            vec![[0, 1, 2], [3, 4, 5]],
        );
        let config = ThicknessConfig {
            min_samples: 2,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        let picks = sample_faces(&mesh, &config, &mut rng).unwrap();
        assert_eq!(picks, vec![0, 0]);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let mesh = slab(20.0, 0.4);
        let a = measure_thickness(&mesh, &seeded(), &Deadline::unlimited()).unwrap();
        let b = measure_thickness(&mesh, &seeded(), &Deadline::unlimited()).unwrap();
        assert_eq!(a, b);
    }
}
