//! mesh-prep validate command - run the printability checks only.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use mesh_prep::{ValidationResult, load_normalized, validate};
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

/// Exit status when a check fails, distinct from the error status 1.
const CHECK_FAILED: i32 = 2;

#[derive(Serialize)]
struct ValidateResponse<'a> {
    path: String,
    passed: bool,
    results: &'a [ValidationResult],
}

pub fn run(input: &Path, cli: &Cli) -> Result<i32> {
    let config = cli.analysis_config()?;
    let mesh = load_normalized(input)
        .with_context(|| format!("Failed to load mesh from {:?}", input))?;

    let report = validate(&mesh, &config);
    let passed = report.passed();

    match cli.format {
        OutputFormat::Json => output::print_json(&ValidateResponse {
            path: input.display().to_string(),
            passed,
            results: &report.results,
        }),
        OutputFormat::Text => {
            println!("{}", "Validation Report".bold().underline());
            output::field("File", input.display());
            if passed {
                output::field("Status", "Printable".green().bold());
            } else {
                output::field("Status", "Not printable".red().bold());
            }

            println!();
            for result in &report.results {
                let icon = if result.passed() { "✓".green() } else { "✗".red() };
                match result.failure_kind() {
                    Some(kind) => println!("  {} [{}] {}", icon, kind, result.details),
                    None => println!("  {} {}", icon, result.details),
                }
            }
        }
    }

    Ok(if passed { 0 } else { CHECK_FAILED })
}
