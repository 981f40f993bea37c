//! mesh-prep rotate command - put a chosen face down and rewrite the file.

use std::path::Path;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

const SUCCESS_DETAILS: &str = "Mesh rotated and saved successfully";

#[derive(Serialize)]
struct RotateResponse {
    message: &'static str,
    details: &'static str,
}

pub fn run(input: &Path, normal: &[f64], cli: &Cli) -> Result<i32> {
    let &[x, y, z] = normal else {
        bail!("Rotation failed: expected 3 normal components, got {}", normal.len());
    };

    let mesh = mesh_prep::reorient_file(input, [x, y, z]).context("Rotation failed")?;

    match cli.format {
        OutputFormat::Json => output::print_json(&RotateResponse {
            message: "Success",
            details: SUCCESS_DETAILS,
        }),
        OutputFormat::Text => {
            println!("{}", SUCCESS_DETAILS.green());
            if !cli.quiet {
                output::field("File", input.display());
                output::field("Normal", format!("({}, {}, {})", x, y, z));
                let dims = mesh.extents();
                output::field(
                    "Dimensions",
                    format!("{:.2} x {:.2} x {:.2} mm", dims.x, dims.y, dims.z),
                );
            }
        }
    }

    Ok(0)
}
