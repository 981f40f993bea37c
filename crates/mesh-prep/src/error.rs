//! Error types for mesh loading, analysis and reorientation.
//!
//! Only *unexpected* failures are errors. A mesh that turns out to be
//! unprintable is reported as a failed [`ValidationResult`](crate::ValidationResult),
//! never as a [`MeshError`].
//!
//! Every error carries a stable code, `MESH-<n>`, whose thousands digit is
//! the category:
//!
//! | range | category |
//! |-------|----------|
//! | 1xxx  | file access and parsing |
//! | 2xxx  | mesh data |
//! | 3xxx  | analysis stages |
//! | 4xxx  | file formats |
//! | 5xxx  | reorientation |

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

pub type MeshResult<T> = Result<T, MeshError>;

/// Stable machine-readable code of a [`MeshError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    IoRead = 1001,
    IoWrite = 1002,
    ParseError = 1003,
    FileNotFound = 1004,
    InvalidVertexIndex = 2001,
    InvalidCoordinate = 2002,
    EmptyMesh = 2003,
    HullFailed = 3001,
    DecimationFailed = 3002,
    Timeout = 3003,
    UnsupportedFormat = 4001,
    InvalidNormal = 5001,
}

impl ErrorCode {
    pub fn number(self) -> u16 {
        self as u16
    }

    pub fn category(self) -> &'static str {
        match self.number() / 1000 {
            1 => "io",
            2 => "data",
            3 => "analysis",
            4 => "format",
            _ => "reorientation",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MESH-{:04}", self.number())
    }
}

/// What a user can try after an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Things to verify about the file or its location.
    CheckFile(&'static [&'static str]),
    /// Export the model again, optionally in a specific format.
    Reexport { as_format: Option<&'static str> },
    /// Convert to one of the formats that can be read.
    ConvertTo(&'static [&'static str]),
    /// Loosen an analysis setting.
    RaiseSetting { key: &'static str, hint: &'static str },
    /// Pass the normal of an actual face.
    UseFaceNormal,
    None,
}

impl fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoverySuggestion::CheckFile(checks) => write!(f, "Check: {}", checks.join(", ")),
            RecoverySuggestion::Reexport { as_format: Some(format) } => {
                write!(f, "Export the model again as {}", format)
            }
            RecoverySuggestion::Reexport { as_format: None } => {
                write!(f, "Export the model again from the modelling software")
            }
            RecoverySuggestion::ConvertTo(formats) => {
                write!(f, "Convert the file to {}", formats.join(", "))
            }
            RecoverySuggestion::RaiseSetting { key, hint } => write!(f, "Set {}: {}", key, hint),
            RecoverySuggestion::UseFaceNormal => {
                write!(f, "Use a normal reported by the preprocess command")
            }
            RecoverySuggestion::None => write!(f, "No automatic recovery available"),
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum MeshError {
    #[error("failed to read mesh from {path}")]
    #[diagnostic(code(mesh::io::read), help("Is {} readable?", path.display()))]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write mesh to {path}")]
    #[diagnostic(code(mesh::io::write), help("The target directory must exist and be writable"))]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file not found: {path}")]
    #[diagnostic(code(mesh::io::not_found), help("Check the path passed on the command line"))]
    FileNotFound { path: PathBuf },

    #[error("failed to parse mesh from {path}: {details}")]
    #[diagnostic(
        code(mesh::parse::error),
        help("The file is truncated or uses a variant of the format that is not understood")
    )]
    ParseError { path: PathBuf, details: String },

    #[error("unsupported mesh format: {extension:?}")]
    #[diagnostic(code(mesh::format::unsupported), help("Supported formats: STL, OBJ, PLY, 3MF"))]
    UnsupportedFormat { extension: Option<String> },

    /// No usable geometry. The message is shown verbatim.
    #[error("{details}")]
    #[diagnostic(code(mesh::data::empty))]
    EmptyMesh { details: String },

    #[error(
        "invalid vertex index: face {face_index} references vertex {vertex_index}, but mesh only has {vertex_count} vertices"
    )]
    #[diagnostic(code(mesh::data::vertex_index))]
    InvalidVertexIndex {
        face_index: usize,
        vertex_index: u32,
        vertex_count: usize,
    },

    #[error("invalid coordinate at vertex {vertex_index}: {coordinate} is {value}")]
    #[diagnostic(code(mesh::data::coordinate))]
    InvalidCoordinate {
        vertex_index: usize,
        coordinate: &'static str,
        value: f64,
    },

    #[error("convex hull computation failed: {details}")]
    #[diagnostic(
        code(mesh::hull::failed),
        help("A flat or degenerate mesh has no hull; printable parts need volume")
    )]
    HullFailed { details: String },

    #[error("decimation failed: {details}")]
    #[diagnostic(code(mesh::decimate::failed))]
    DecimationFailed { details: String },

    #[error("{operation} exceeded its time budget of {budget_ms} ms")]
    #[diagnostic(code(mesh::budget::timeout))]
    Timeout { operation: String, budget_ms: u64 },

    #[error("invalid target normal ({x}, {y}, {z}): vector must be finite and non-zero")]
    #[diagnostic(
        code(mesh::rotate::normal),
        help("Pass the normal of the face that should rest on the bed, e.g. --normal 0 0 -1")
    )]
    InvalidNormal { x: f64, y: f64, z: f64 },
}

impl MeshError {
    pub fn code(&self) -> ErrorCode {
        match self {
            MeshError::IoRead { .. } => ErrorCode::IoRead,
            MeshError::IoWrite { .. } => ErrorCode::IoWrite,
            MeshError::FileNotFound { .. } => ErrorCode::FileNotFound,
            MeshError::ParseError { .. } => ErrorCode::ParseError,
            MeshError::UnsupportedFormat { .. } => ErrorCode::UnsupportedFormat,
            MeshError::EmptyMesh { .. } => ErrorCode::EmptyMesh,
            MeshError::InvalidVertexIndex { .. } => ErrorCode::InvalidVertexIndex,
            MeshError::InvalidCoordinate { .. } => ErrorCode::InvalidCoordinate,
            MeshError::HullFailed { .. } => ErrorCode::HullFailed,
            MeshError::DecimationFailed { .. } => ErrorCode::DecimationFailed,
            MeshError::Timeout { .. } => ErrorCode::Timeout,
            MeshError::InvalidNormal { .. } => ErrorCode::InvalidNormal,
        }
    }

    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self {
            MeshError::IoRead { .. } | MeshError::FileNotFound { .. } => {
                RecoverySuggestion::CheckFile(&["the path is correct", "read permission"])
            }
            MeshError::IoWrite { .. } => {
                RecoverySuggestion::CheckFile(&["the directory exists", "write permission"])
            }
            MeshError::ParseError { .. } => RecoverySuggestion::Reexport {
                as_format: Some("binary STL or 3MF"),
            },
            MeshError::UnsupportedFormat { .. } => {
                RecoverySuggestion::ConvertTo(&["STL", "OBJ", "PLY", "3MF"])
            }
            MeshError::EmptyMesh { .. }
            | MeshError::InvalidVertexIndex { .. }
            | MeshError::InvalidCoordinate { .. } => RecoverySuggestion::Reexport { as_format: None },
            MeshError::HullFailed { .. } => {
                RecoverySuggestion::CheckFile(&["the part has volume", "not all points are coplanar"])
            }
            MeshError::DecimationFailed { .. } => RecoverySuggestion::RaiseSetting {
                key: "decimation.resolution",
                hint: "a higher value keeps more detail",
            },
            MeshError::Timeout { .. } => RecoverySuggestion::RaiseSetting {
                key: "budget_secs",
                hint: "allow the stage more time",
            },
            MeshError::InvalidNormal { .. } => RecoverySuggestion::UseFaceNormal,
        }
    }

    /// The file the error is about, if any.
    pub fn location(&self) -> Option<&Path> {
        match self {
            MeshError::IoRead { path, .. }
            | MeshError::IoWrite { path, .. }
            | MeshError::FileNotFound { path }
            | MeshError::ParseError { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn io_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MeshError::IoRead {
            path: path.into(),
            source,
        }
    }

    pub fn io_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MeshError::IoWrite {
            path: path.into(),
            source,
        }
    }

    /// Wrap an encoder failure that is not an `io::Error`.
    pub fn write_failed(path: impl Into<PathBuf>, details: impl fmt::Display) -> Self {
        Self::io_write(path, std::io::Error::other(details.to_string()))
    }

    pub fn parse_error(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        MeshError::ParseError {
            path: path.into(),
            details: details.into(),
        }
    }

    pub fn empty_mesh(details: impl Into<String>) -> Self {
        MeshError::EmptyMesh {
            details: details.into(),
        }
    }

    pub fn invalid_normal([x, y, z]: [f64; 3]) -> Self {
        MeshError::InvalidNormal { x, y, z }
    }

    pub fn timeout(operation: impl Into<String>, budget: Duration) -> Self {
        MeshError::Timeout {
            operation: operation.into(),
            budget_ms: budget.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_render_with_category_prefix() {
        assert_eq!(ErrorCode::IoRead.to_string(), "MESH-1001");
        assert_eq!(ErrorCode::HullFailed.to_string(), "MESH-3001");
        assert_eq!(ErrorCode::InvalidNormal.category(), "reorientation");
        assert_eq!(ErrorCode::EmptyMesh.category(), "data");
    }

    #[test]
    fn parse_error_carries_code_and_location() {
        let err = MeshError::parse_error("/tmp/a.stl", "truncated");
        assert_eq!(err.code(), ErrorCode::ParseError);
        assert_eq!(err.location(), Some(Path::new("/tmp/a.stl")));
        assert_eq!(MeshError::invalid_normal([0.0; 3]).location(), None);
    }

    #[test]
    fn empty_mesh_message_is_bare() {
        let err = MeshError::empty_mesh("Scene is empty");
        assert_eq!(err.to_string(), "Scene is empty");
    }

    #[test]
    fn invalid_normal_lists_components() {
        let err = MeshError::invalid_normal([0.0, f64::NAN, 1.0]);
        assert_eq!(
            err.to_string(),
            "invalid target normal (0, NaN, 1): vector must be finite and non-zero"
        );
        assert_eq!(err.recovery_suggestion(), RecoverySuggestion::UseFaceNormal);
    }

    #[test]
    fn timeout_reports_budget_in_ms() {
        let err = MeshError::timeout("thickness", Duration::from_millis(1500));
        assert_eq!(err.to_string(), "thickness exceeded its time budget of 1500 ms");
    }

    #[test]
    fn unsupported_format_suggests_readable_formats() {
        let suggestion = MeshError::UnsupportedFormat {
            extension: Some("xyz".into()),
        }
        .recovery_suggestion();
        assert_eq!(suggestion.to_string(), "Convert the file to STL, OBJ, PLY, 3MF");
    }
}
