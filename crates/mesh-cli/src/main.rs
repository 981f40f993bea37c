//! mesh-prep: printability checks and placement-face detection from the
//! command line.
//!
//! Results go to stdout as one JSON object (or coloured text with
//! `--format text`); logs and errors go to stderr.
//!
//! # Logging
//!
//! Set the `RUST_LOG` environment variable to control log output:
//! - `RUST_LOG=mesh_prep=info` - One line per stage
//! - `RUST_LOG=mesh_prep=debug` - Every check and facet decision
//! - `RUST_LOG=mesh_prep::timing=info` - Stage timings only
//!
//! # Example
//!
//! ```bash
//! # Find resting faces
//! mesh-prep preprocess bracket.stl
//!
//! # Put the face with normal (0, -1, 0) on the bed
//! mesh-prep rotate bracket.stl --normal 0 -1 0
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mesh_prep::AnalysisConfig;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;

use commands::{info, preprocess, rotate, validate};

/// mesh-prep - Check meshes for printability and find stable resting faces.
#[derive(Parser)]
#[command(name = "mesh-prep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format for results
    #[arg(long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Suppress logging and decorative text output
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Analysis configuration file (TOML or JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the fast preset (lower decimation target, larger minimum facet)
    #[arg(long, global = true, conflicts_with = "config")]
    fast: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// JSON output for scripting
    Json,
    /// Human-readable text output
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a mesh and list its stable resting faces
    Preprocess {
        /// Input mesh file
        input: PathBuf,
    },

    /// Rotate a mesh so a face points down, overwriting the file
    Rotate {
        /// Mesh file to rewrite in place
        input: PathBuf,

        /// Normal of the face that should rest on the bed
        #[arg(
            long,
            num_args = 3,
            value_names = ["X", "Y", "Z"],
            allow_negative_numbers = true,
            required = true
        )]
        normal: Vec<f64>,
    },

    /// Display mesh statistics
    Info {
        /// Input mesh file
        input: PathBuf,

        /// Also compute volume, surface area and edge statistics
        #[arg(long)]
        detailed: bool,
    },

    /// Run only the printability checks
    Validate {
        /// Input mesh file
        input: PathBuf,
    },
}

impl Cli {
    /// The analysis configuration selected on the command line.
    pub fn analysis_config(&self) -> Result<AnalysisConfig> {
        match &self.config {
            Some(path) => AnalysisConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration from {:?}", path)),
            None if self.fast => Ok(AnalysisConfig::fast()),
            None => Ok(AnalysisConfig::default()),
        }
    }
}

/// Logs go to stderr so stdout stays a single JSON document.
///
/// `RUST_LOG` takes precedence over `-v`.
fn init_tracing(cli: &Cli) {
    if cli.quiet {
        return;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match cli.verbose {
            0 => "warn",
            1 => "mesh_prep=info",
            2 => "mesh_prep=debug",
            _ => "trace",
        })
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn dispatch(cli: &Cli) -> Result<i32> {
    match &cli.command {
        Commands::Preprocess { input } => preprocess::run(input, cli),
        Commands::Rotate { input, normal } => rotate::run(input, normal, cli),
        Commands::Info { input, detailed } => info::run(input, *detailed, cli),
        Commands::Validate { input } => validate::run(input, cli),
    }
}

fn main() {
    #[cfg(debug_assertions)]
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(&cli);

    let code = dispatch(&cli).unwrap_or_else(|e| {
        output::print_error(&e, cli.format);
        1
    });
    std::process::exit(code);
}
