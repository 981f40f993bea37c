//! Subcommand implementations. Each `run` returns the process exit code.

pub mod info;
pub mod preprocess;
pub mod rotate;
pub mod validate;
