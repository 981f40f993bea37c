//! Result and error printing shared by the subcommands.

use colored::Colorize;
use mesh_prep::MeshError;
use serde::Serialize;

use crate::OutputFormat;

/// Print `value` as one line of JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("{}", serde_json::json!({ "error": e.to_string() })),
    }
}

/// Report a failed command on stderr.
///
/// JSON mode prints `{"error": "..."}` with the whole context chain in the
/// message. Text mode adds the error code and a recovery suggestion when
/// the root cause is a [`MeshError`].
pub fn print_error(err: &anyhow::Error, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": format!("{:#}", err) }));
        }
        OutputFormat::Text => {
            eprintln!("{}: {}", "Error".red().bold(), err);
            for cause in err.chain().skip(1) {
                eprintln!("  {}: {}", "Caused by".yellow(), cause);
            }
            if let Some(mesh_err) = err.chain().find_map(|c| c.downcast_ref::<MeshError>()) {
                eprintln!("  {}: {}", "Code".cyan(), mesh_err.code());
                eprintln!(
                    "  {}: {}",
                    "Suggestion".green(),
                    mesh_err.recovery_suggestion()
                );
                if let Some(location) = mesh_err.location() {
                    eprintln!("  {}: {}", "Location".yellow(), location.display());
                }
            }
        }
    }
}

/// `label: value` with the label highlighted.
pub fn field(label: &str, value: impl std::fmt::Display) {
    println!("  {}: {}", label.cyan(), value);
}
