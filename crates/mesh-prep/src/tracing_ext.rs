//! Tracing helpers shared by the analysis stages.
//!
//! Set `RUST_LOG=mesh_prep=debug` for per-decision output, or
//! `RUST_LOG=mesh_prep::timing=info` to see only stage timings.

use std::time::{Duration, Instant};

use tracing::{Span, debug, info};

use crate::Mesh;

/// Logs how long a pipeline stage took when dropped.
///
/// If the stage produced a mesh, pass it to [`StageTimer::finish_with`] and the
/// completion line carries the output face count next to the input one.
///
/// ```rust,ignore
/// let mut timer = StageTimer::for_mesh("decimate", &mesh);
/// let reduced = cluster(&mesh);
/// timer.finish_with(&reduced);
/// ```
pub struct StageTimer {
    stage: &'static str,
    start: Instant,
    faces_in: Option<usize>,
    faces_out: Option<usize>,
    span: Span,
}

impl StageTimer {
    pub fn start(stage: &'static str) -> Self {
        debug!(target: "mesh_prep::timing", stage, "stage started");
        Self {
            stage,
            start: Instant::now(),
            faces_in: None,
            faces_out: None,
            span: tracing::info_span!("stage", stage),
        }
    }

    /// Start a stage that consumes `mesh`.
    pub fn for_mesh(stage: &'static str, mesh: &Mesh) -> Self {
        let faces = mesh.face_count();
        debug!(
            target: "mesh_prep::timing",
            stage,
            faces,
            vertices = mesh.vertex_count(),
            "stage started"
        );
        Self {
            stage,
            start: Instant::now(),
            faces_in: Some(faces),
            faces_out: None,
            span: tracing::info_span!("stage", stage, faces),
        }
    }

    /// Record the mesh the stage produced.
    pub fn finish_with(&mut self, output: &Mesh) {
        self.faces_out = Some(output.face_count());
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        let elapsed_ms = format!("{:.2}", self.elapsed().as_secs_f64() * 1000.0);
        match (self.faces_in, self.faces_out) {
            (Some(faces_in), Some(faces_out)) => info!(
                target: "mesh_prep::timing",
                stage = self.stage,
                faces_in,
                faces_out,
                elapsed_ms,
                "stage finished"
            ),
            _ => info!(
                target: "mesh_prep::timing",
                stage = self.stage,
                elapsed_ms,
                "stage finished"
            ),
        }
    }
}

/// Log the size and placement of `mesh` at a named pipeline point.
pub fn log_mesh_state(mesh: &Mesh, at: &str) {
    let dims = mesh.extents();
    let floor = mesh.bounds().map_or(0.0, |(min, _)| min.z);
    debug!(
        target: "mesh_prep::mesh_state",
        at,
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        size_mm = format!("{:.2} x {:.2} x {:.2}", dims.x, dims.y, dims.z),
        floor_z = floor,
    );
}
