//! mesh-prep preprocess command - validate and find resting faces.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use mesh_prep::{
    Candidate, Check, DecimationOutcome, FailureKind, PreprocessOutcome, Preprocessor,
    ValidationResult,
};
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct PreprocessResponse<'a> {
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_type: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
    /// Thinnest measured wall, reported with `WALLS_TOO_THIN`.
    #[serde(skip_serializing_if = "Option::is_none")]
    min_thickness: Option<f64>,
    faces: &'a [Candidate],
}

fn min_thickness(failure: &ValidationResult) -> Option<f64> {
    match failure.check {
        Check::Thickness => failure.metric,
        _ => None,
    }
}

pub fn run(input: &Path, cli: &Cli) -> Result<i32> {
    let config = cli.analysis_config()?;
    let result = Preprocessor::new(config)
        .run(input)
        .with_context(|| format!("Failed to preprocess {:?}", input))?;

    let response = match &result.outcome {
        PreprocessOutcome::Accepted { candidates } => PreprocessResponse {
            message: "Success",
            error_type: None,
            details: None,
            min_thickness: None,
            faces: candidates,
        },
        PreprocessOutcome::Rejected(failure) => PreprocessResponse {
            message: "Validation Failed",
            error_type: failure.failure_kind(),
            details: Some(&failure.details),
            min_thickness: min_thickness(failure),
            faces: &[],
        },
    };

    match cli.format {
        OutputFormat::Json => output::print_json(&response),
        OutputFormat::Text => {
            println!("{}", "Preprocess Report".bold().underline());
            output::field("File", input.display());

            if let PreprocessOutcome::Rejected(failure) = &result.outcome {
                output::field("Status", "Validation Failed".red().bold());
                if let Some(kind) = failure.failure_kind() {
                    output::field("Error type", kind);
                }
                output::field("Details", &failure.details);
                if let Some(thinnest) = min_thickness(failure) {
                    output::field("Min thickness", format!("{:.2} mm", thinnest));
                }
                return Ok(0);
            }

            output::field("Status", "Success".green().bold());
            if !cli.quiet {
                for check in &result.validation.results {
                    output::field(&format!("{:?}", check.check), &check.details);
                }
                match &result.decimation {
                    Some(DecimationOutcome::Decimated { from, to }) => {
                        output::field("Decimated", format!("{} -> {} faces", from, to))
                    }
                    Some(DecimationOutcome::Fallback { reason }) => {
                        output::field("Decimation warning", reason.as_str().yellow())
                    }
                    _ => {}
                }
                output::field("Facets analyzed", result.facets_analyzed);
            }

            let faces = result.outcome.candidates();
            println!("\n{} ({})", "Resting faces".bold(), faces.len());
            for (rank, face) in faces.iter().enumerate() {
                println!(
                    "  {:>3}. area {:>10.2} mm²  normal ({:+.3}, {:+.3}, {:+.3})  radii {:.2} x {:.2} mm",
                    rank + 1,
                    face.area,
                    face.normal.x,
                    face.normal.y,
                    face.normal.z,
                    face.radii[0],
                    face.radii[1]
                );
            }
        }
    }

    Ok(0)
}
