//! The preprocessing pipeline: load, validate, simplify, find resting faces.
//!
//! Every stage takes the previous mesh snapshot by reference and produces a
//! new one, so each stage can be run and tested on its own.
//!
//! # Example
//!
//! ```no_run
//! use mesh_prep::{AnalysisConfig, PreprocessOutcome, Preprocessor};
//!
//! let result = Preprocessor::new(AnalysisConfig::default())
//!     .run("bracket.stl")
//!     .unwrap();
//!
//! match &result.outcome {
//!     PreprocessOutcome::Accepted { candidates } => {
//!         println!("{} resting faces", candidates.len());
//!     }
//!     PreprocessOutcome::Rejected(failure) => {
//!         println!("{}: {}", failure.check.failure_kind(), failure.details);
//!     }
//! }
//! ```

use std::path::Path;

use tracing::{info, info_span};

use crate::config::AnalysisConfig;
use crate::decimate::{DecimationOutcome, decimate_or_keep};
use crate::error::MeshResult;
use crate::facets::detect_facets;
use crate::hull::ConvexHull;
use crate::io::load_normalized;
use crate::repair::clean_for_analysis;
use crate::stability::{Candidate, analyze_stability};
use crate::tracing_ext::{StageTimer, log_mesh_state};
use crate::validate::{ValidationReport, ValidationResult, validate};
use crate::Mesh;

/// Final answer of a preprocessing run.
#[derive(Debug, Clone)]
pub enum PreprocessOutcome {
    /// The mesh is printable; candidates are ordered by area, largest first.
    Accepted { candidates: Vec<Candidate> },
    /// A check failed. This is an expected result, not an error.
    Rejected(ValidationResult),
}

impl PreprocessOutcome {
    pub fn candidates(&self) -> &[Candidate] {
        match self {
            Self::Accepted { candidates } => candidates,
            Self::Rejected(_) => &[],
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct PreprocessResult {
    pub outcome: PreprocessOutcome,
    /// Checks in execution order.
    pub validation: ValidationReport,
    /// `None` when validation failed before decimation.
    pub decimation: Option<DecimationOutcome>,
    /// Number of facets that reached stability analysis.
    pub facets_analyzed: usize,
    /// The mesh the facets were detected on.
    pub analyzed_mesh: Mesh,
    /// Log of stages performed.
    pub operation_log: Vec<String>,
}

/// Runs the analysis with one immutable configuration.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: AnalysisConfig,
}

impl Preprocessor {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Load and normalize the file at `path`, then analyze it.
    pub fn run(&self, path: impl AsRef<Path>) -> MeshResult<PreprocessResult> {
        let path = path.as_ref();
        let _span = info_span!("preprocess", path = %path.display()).entered();
        let mesh = load_normalized(path)?;
        let mut result = self.run_mesh(&mesh)?;
        result
            .operation_log
            .insert(0, format!("Loaded mesh from {}", path.display()));
        Ok(result)
    }

    /// Analyze an already loaded mesh. The mesh is normalized first, which is
    /// a no-op for meshes returned by [`load_normalized`].
    pub fn run_mesh(&self, mesh: &Mesh) -> MeshResult<PreprocessResult> {
        let _timer = StageTimer::for_mesh("preprocess", mesh);
        let mut log = Vec::new();

        let mesh = mesh.normalized();
        log_mesh_state(&mesh, "normalized");

        let validation = validate(&mesh, &self.config);
        log.push(format!("Validated: {} checks run", validation.results.len()));
        if let Some(failure) = validation.failure() {
            log.push(format!("Rejected: {}", failure.details));
            return Ok(PreprocessResult {
                outcome: PreprocessOutcome::Rejected(failure.clone()),
                validation,
                decimation: None,
                facets_analyzed: 0,
                analyzed_mesh: mesh,
                operation_log: log,
            });
        }

        // Later stages work on the snapshot integrity repair produced.
        let (decimated, decimation) = decimate_or_keep(&validation.mesh, &self.config.decimation);
        match &decimation {
            DecimationOutcome::Skipped => log.push("Decimation skipped".to_string()),
            DecimationOutcome::Decimated { from, to } => {
                log.push(format!("Decimated {} -> {} faces", from, to))
            }
            DecimationOutcome::Fallback { reason } => {
                log.push(format!("Decimation warning: {}", reason))
            }
        }

        let (cleaned, summary) = clean_for_analysis(&decimated);
        if !summary.is_noop() {
            log.push(format!("Cleaned: {:?}", summary));
        }
        log_mesh_state(&cleaned, "analysis");

        let hull = ConvexHull::compute_or_bounds(&cleaned)?;
        let facets = detect_facets(&cleaned, &self.config.facets);
        log.push(format!("Detected {} facets", facets.len()));

        let candidates = analyze_stability(&cleaned, &hull, &facets, &self.config.stability);
        log.push(format!("Accepted {} candidates", candidates.len()));

        info!(
            facets = facets.len(),
            candidates = candidates.len(),
            "Preprocessing complete"
        );

        Ok(PreprocessResult {
            outcome: PreprocessOutcome::Accepted { candidates },
            validation,
            decimation: Some(decimation),
            facets_analyzed: facets.len(),
            analyzed_mesh: cleaned,
            operation_log: log,
        })
    }
}
