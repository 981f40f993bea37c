//! Printability validation and stable placement-face detection for triangle
//! meshes.
//!
//! Given a mesh destined for an FDM printer, this crate answers two
//! questions: can it be printed at all, and which flat face should rest on
//! the bed?
//!
//! # Pipeline
//!
//! 1. **Load** ([`io`]): STL, OBJ, PLY or 3MF; multi-object containers are
//!    merged into one mesh, which is then normalized (bounding box centered
//!    on XY, lowest point on Z = 0).
//! 2. **Validate** ([`validate`]): build-volume fit, body count, surface
//!    integrity and wall thickness, stopping at the first failure.
//! 3. **Decimate** ([`decimate`]): vertex clustering for large meshes,
//!    falling back to the original on failure.
//! 4. **Facets** ([`facets`]): adjacent near-coplanar faces grouped into
//!    candidate resting surfaces.
//! 5. **Stability** ([`stability`]): hull proximity, tipping and floor
//!    penetration filters, then an oriented footprint per survivor
//!    ([`footprint`]).
//!
//! [`reorient`] is the companion transform that puts a chosen face down and
//! writes the mesh back in its original format.
//!
//! # Units and Coordinate System
//!
//! **All lengths are millimeters.** Z is up and "down" is -Z. Tolerances of
//! the geometric filters are fractions of the mesh scale (`‖extents‖`), so
//! they behave the same for small and large parts.
//!
//! Face winding is counter-clockwise when viewed from outside, so normals
//! point outward by the right-hand rule.
//!
//! # Quick Start
//!
//! ```no_run
//! use mesh_prep::{AnalysisConfig, PreprocessOutcome, Preprocessor};
//!
//! let result = Preprocessor::new(AnalysisConfig::default())
//!     .run("part.stl")
//!     .unwrap();
//!
//! if let PreprocessOutcome::Accepted { candidates } = &result.outcome {
//!     let best = &candidates[0];
//!     let normal = [best.normal.x, best.normal.y, best.normal.z];
//!     mesh_prep::reorient_file(std::path::Path::new("part.stl"), normal).unwrap();
//! }
//! ```
//!
//! # Logging
//!
//! Stages log through `tracing`. Install any subscriber; for example
//! `RUST_LOG=mesh_prep=debug` shows every facet rejection and
//! `RUST_LOG=mesh_prep::timing=info` only stage timings.

pub mod adjacency;
pub mod budget;
pub mod bvh;
pub mod components;
pub mod config;
pub mod decimate;
pub mod error;
pub mod facets;
pub mod footprint;
pub mod hull;
pub mod io;
pub mod pipeline;
pub mod reorient;
pub mod repair;
pub mod stability;
pub mod thickness;
pub mod tracing_ext;
mod types;
pub mod validate;

pub use types::{Mesh, Triangle, Vertex};

pub use adjacency::MeshAdjacency;
pub use components::{ComponentAnalysis, find_connected_components};
pub use config::{
    AnalysisConfig, BuildVolume, DecimationConfig, FacetConfig, FloorReference, IntegrityConfig,
    StabilityConfig, ThicknessConfig,
};
#[cfg(feature = "pipeline-config")]
pub use config::ConfigError;
pub use decimate::{DecimateResult, DecimationOutcome, decimate, decimate_or_keep};
pub use error::{ErrorCode, MeshError, MeshResult, RecoverySuggestion};
pub use facets::{Facet, detect_facets};
pub use footprint::{FootprintFit, OrientedRect, convex_hull_2d, min_area_rect};
pub use hull::ConvexHull;
pub use io::{MeshFormat, load_mesh, load_normalized, save_mesh};
pub use pipeline::{PreprocessOutcome, PreprocessResult, Preprocessor};
pub use reorient::{align_vectors, reorient_file, reorient_mesh, rotation_to_floor};
pub use repair::{RepairSummary, clean_for_analysis};
pub use stability::{Candidate, Rejection, StabilityAnalyzer, analyze_stability};
pub use thickness::{ThicknessReport, check_thickness};
pub use tracing_ext::{StageTimer, log_mesh_state};
pub use validate::{
    Check, CheckStatus, FailureKind, IntegrityReport, ValidationReport, ValidationResult,
    validate, validate_mesh_data,
};

impl Mesh {
    /// Load a mesh from a file, auto-detecting format from extension.
    ///
    /// The mesh is returned as stored; see [`Mesh::normalized`] for the
    /// canonical resting frame.
    pub fn load(path: impl AsRef<std::path::Path>) -> MeshResult<Self> {
        io::load_mesh(path.as_ref())
    }

    /// Save the mesh to a file, auto-detecting format from extension.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> MeshResult<()> {
        io::save_mesh(self, path.as_ref())
    }

    /// Run the four printability checks with `config`.
    pub fn validate(&self, config: &AnalysisConfig) -> ValidationReport {
        validate::validate(self, config)
    }

    /// Find edge-connected bodies.
    pub fn find_components(&self) -> ComponentAnalysis {
        components::find_connected_components(self)
    }
}
