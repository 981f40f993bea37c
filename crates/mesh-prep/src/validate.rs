//! Printability checks.
//!
//! Four checks run against the normalized mesh in a fixed order and the run
//! stops at the first failure. A failing check is an ordinary value
//! ([`CheckStatus::Fail`]), not an error.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::adjacency::MeshAdjacency;
use crate::components::find_connected_components;
use crate::config::{AnalysisConfig, BuildVolume, IntegrityConfig};
use crate::error::{MeshError, MeshResult};
use crate::repair::{RepairSummary, repair_for_integrity};
use crate::thickness::check_thickness;
use crate::Mesh;

/// The four printability checks, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    Dimensions,
    BodyCount,
    Integrity,
    Thickness,
}

impl Check {
    /// Failure tag reported when this check fails.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Check::Dimensions => FailureKind::DimensionOverflow,
            Check::BodyCount => FailureKind::MultipleBodiesDetected,
            Check::Integrity => FailureKind::MeshIntegrityBad,
            Check::Thickness => FailureKind::WallsTooThin,
        }
    }
}

/// Stable machine-readable failure tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    DimensionOverflow,
    MultipleBodiesDetected,
    MeshIntegrityBad,
    WallsTooThin,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::DimensionOverflow => "DIMENSION_OVERFLOW",
            FailureKind::MultipleBodiesDetected => "MULTIPLE_BODIES_DETECTED",
            FailureKind::MeshIntegrityBad => "MESH_INTEGRITY_BAD",
            FailureKind::WallsTooThin => "WALLS_TOO_THIN",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Pass,
    Fail,
}

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub check: Check,
    pub status: CheckStatus,
    /// Human-readable diagnostic.
    pub details: String,
    /// Check-specific measurement, e.g. the minimum wall thickness.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<f64>,
}

impl ValidationResult {
    pub fn pass(check: Check, details: impl Into<String>, metric: Option<f64>) -> Self {
        Self {
            check,
            status: CheckStatus::Pass,
            details: details.into(),
            metric,
        }
    }

    pub fn fail(check: Check, details: impl Into<String>, metric: Option<f64>) -> Self {
        Self {
            check,
            status: CheckStatus::Fail,
            details: details.into(),
            metric,
        }
    }

    #[inline]
    pub fn passed(&self) -> bool {
        self.status == CheckStatus::Pass
    }

    /// The failure tag, if this check failed.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        (self.status == CheckStatus::Fail).then(|| self.check.failure_kind())
    }
}

/// Results of a validation run, in execution order. Ends at the first
/// failure.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub results: Vec<ValidationResult>,
    /// The snapshot the checks after integrity ran on: the auto-repaired
    /// mesh when repair changed anything, otherwise the input.
    #[serde(skip)]
    pub mesh: Mesh,
}

impl ValidationReport {
    /// True if every check ran and passed.
    pub fn passed(&self) -> bool {
        self.results.len() == 4 && self.results.iter().all(ValidationResult::passed)
    }

    /// The failing check, if any.
    pub fn failure(&self) -> Option<&ValidationResult> {
        self.results.iter().find(|r| !r.passed())
    }
}

/// Run all four checks against a normalized mesh, stopping at the first
/// failure.
///
/// Integrity auto-repair is not thrown away: the thickness check and
/// [`ValidationReport::mesh`] see the repaired snapshot.
pub fn validate(mesh: &Mesh, config: &AnalysisConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut repaired: Option<Mesh> = None;
    for check in [
        Check::Dimensions,
        Check::BodyCount,
        Check::Integrity,
        Check::Thickness,
    ] {
        let subject = repaired.as_ref().unwrap_or(mesh);
        let result = match check {
            Check::Dimensions => check_dimensions(subject, &config.build_volume),
            Check::BodyCount => check_body_count(subject, config.integrity.max_bodies),
            Check::Integrity => {
                let (result, snapshot) = integrity_stage(subject, &config.integrity);
                if snapshot.is_some() {
                    repaired = snapshot;
                }
                result
            }
            Check::Thickness => check_thickness(subject, &config.thickness),
        };
        debug!(check = ?result.check, status = ?result.status, "{}", result.details);
        let failed = !result.passed();
        report.results.push(result);
        if failed {
            break;
        }
    }

    match report.failure() {
        Some(failure) => info!(
            error_type = %failure.check.failure_kind(),
            "Validation failed: {}",
            failure.details
        ),
        None => info!("Validation passed"),
    }
    report.mesh = repaired.unwrap_or_else(|| mesh.clone());
    report
}

/// Per-axis extents must fit the build volume. Sizes equal to the limit pass.
pub fn check_dimensions(mesh: &Mesh, volume: &BuildVolume) -> ValidationResult {
    let extents = mesh.extents();
    let axes = [
        ("X", extents.x, volume.x),
        ("Y", extents.y, volume.y),
        ("Z", extents.z, volume.z),
    ];

    for (axis, size, limit) in axes {
        if size > limit {
            return ValidationResult::fail(
                Check::Dimensions,
                format!("{}-axis overflow: {:.2}mm", axis, size),
                Some(size),
            );
        }
    }
    ValidationResult::pass(Check::Dimensions, "Dimensions Safe", None)
}

/// The number of edge-connected bodies must not exceed `max_bodies`.
pub fn check_body_count(mesh: &Mesh, max_bodies: usize) -> ValidationResult {
    let bodies = find_connected_components(mesh).component_count;
    if bodies > max_bodies {
        ValidationResult::fail(
            Check::BodyCount,
            format!("Too many separate objects: {} bodies.", bodies),
            Some(bodies as f64),
        )
    } else {
        ValidationResult::pass(
            Check::BodyCount,
            format!("{} bodies detected", bodies),
            Some(bodies as f64),
        )
    }
}

/// Measurements behind the integrity verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityReport {
    pub face_count: usize,
    /// Unique undirected edges.
    pub edge_count: usize,
    /// Naked edges; `None` when `3F == 2E` made counting unnecessary.
    pub naked_edges: Option<usize>,
    /// Shared edges traversed in the same direction by both faces, measured
    /// after repair.
    pub inconsistent_edges: usize,
    /// Signed volume after repair.
    pub volume: f64,
    pub repair: Option<RepairSummary>,
    /// The repaired mesh, present only when repair changed something.
    pub repaired: Option<Mesh>,
}

impl IntegrityReport {
    /// `3F == 2E`, the edge/face balance of a closed triangle mesh.
    pub fn edges_balanced(&self) -> bool {
        3 * self.face_count == 2 * self.edge_count
    }
}

/// Gather the integrity measurements. Returns `None` for a mesh too small to
/// measure (see [`check_integrity`] for the messages).
pub fn analyze_integrity(mesh: &Mesh, config: &IntegrityConfig) -> Option<IntegrityReport> {
    let face_count = mesh.face_count();
    if face_count == 0 || face_count < config.min_faces {
        return None;
    }

    let adjacency = MeshAdjacency::build(&mesh.faces);
    let edge_count = adjacency.edge_count();
    let naked_edges = if 3 * face_count == 2 * edge_count {
        None
    } else {
        Some(adjacency.boundary_edge_count())
    };

    if naked_edges.is_some_and(|n| n > config.naked_edge_threshold) {
        return Some(IntegrityReport {
            face_count,
            edge_count,
            naked_edges,
            inconsistent_edges: adjacency.inconsistent_edge_count(&mesh.faces),
            volume: mesh.signed_volume(),
            repair: None,
            repaired: None,
        });
    }

    let (repaired, repair) = if config.auto_repair {
        let (repaired, summary) = repair_for_integrity(mesh, config.max_hole_edges);
        if summary.is_noop() {
            (None, Some(summary))
        } else {
            debug!(?summary, "Integrity auto-repair applied");
            (Some(repaired), Some(summary))
        }
    } else {
        (None, None)
    };

    let candidate = repaired.as_ref().unwrap_or(mesh);
    let inconsistent_edges = match &repaired {
        Some(m) => MeshAdjacency::build(&m.faces).inconsistent_edge_count(&m.faces),
        None => adjacency.inconsistent_edge_count(&mesh.faces),
    };
    Some(IntegrityReport {
        face_count,
        edge_count,
        naked_edges,
        inconsistent_edges,
        volume: candidate.signed_volume(),
        repair,
        repaired,
    })
}

/// Non-empty, enough faces, few enough holes, consistent winding and a
/// positive enclosed volume.
pub fn check_integrity(mesh: &Mesh, config: &IntegrityConfig) -> ValidationResult {
    integrity_stage(mesh, config).0
}

/// The integrity verdict together with the repaired snapshot, if repair
/// changed the mesh and the check passed.
pub fn integrity_stage(mesh: &Mesh, config: &IntegrityConfig) -> (ValidationResult, Option<Mesh>) {
    let fail = |details: String| (ValidationResult::fail(Check::Integrity, details, None), None);

    if mesh.faces.is_empty() {
        return fail("Mesh is empty".to_string());
    }
    let Some(report) = analyze_integrity(mesh, config) else {
        return fail(format!("Too few faces ({})", mesh.face_count()));
    };

    if let Some(naked) = report.naked_edges {
        debug!(naked_edges = naked, "Edge balance off, counted naked edges");
        if naked > config.naked_edge_threshold {
            return fail(format!("Too many holes ({})", naked));
        }
    }
    if report.inconsistent_edges > 0 {
        return fail(format!(
            "Inconsistent winding ({} edges)",
            report.inconsistent_edges
        ));
    }
    if report.volume <= 0.0 {
        return fail(format!("Non-positive volume ({:.3})", report.volume));
    }

    (
        ValidationResult::pass(Check::Integrity, "Integrity Good", Some(report.volume)),
        report.repaired,
    )
}

/// Reject meshes whose faces reference missing vertices or whose
/// coordinates are not finite.
pub fn validate_mesh_data(mesh: &Mesh) -> MeshResult<()> {
    for (vertex_index, vertex) in mesh.vertices.iter().enumerate() {
        let p = vertex.position;
        for (coordinate, value) in [("x", p.x), ("y", p.y), ("z", p.z)] {
            if !value.is_finite() {
                warn!(vertex_index, coordinate, value, "Non-finite vertex coordinate");
                return Err(MeshError::InvalidCoordinate {
                    vertex_index,
                    coordinate,
                    value,
                });
            }
        }
    }

    let vertex_count = mesh.vertices.len();
    for (face_index, face) in mesh.faces.iter().enumerate() {
        if let Some(&vertex_index) = face.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(MeshError::InvalidVertexIndex {
                face_index,
                vertex_index,
                vertex_count,
            });
        }
    }
    Ok(())
}
