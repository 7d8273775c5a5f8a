//! Error types for pose normalization with rich diagnostics.
//!
//! Every failure is local to the mesh being processed. A batch driver can
//! match on [`PoseError::kind`] to decide how to report it and then move on
//! to the next mesh.
//!
//! # Error Codes
//!
//! Each error has a unique code in the format `POSE-XXXX`:
//! - `POSE-1xxx`: I/O errors (file reading, writing, parsing)
//! - `POSE-2xxx`: Geometry errors (empty meshes, bad indices, rank-deficient clouds)
//! - `POSE-3xxx`: Processing errors (remeshing, landmarks, stage ordering)
//! - `POSE-4xxx`: Configuration errors
//!
//! # Example
//!
//! ```
//! use mesh_pose::{ErrorKind, PoseError};
//!
//! let err = PoseError::degenerate_geometry("all vertices are collinear");
//! assert_eq!(err.code().as_str(), "POSE-2004");
//! assert_eq!(err.kind(), ErrorKind::DegenerateGeometry);
//! ```

use miette::Diagnostic;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::PipelineStage;

/// Result type alias for pose operations.
pub type PoseResult<T> = Result<T, PoseError>;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // I/O errors (1xxx)
    /// POSE-1001: Failed to read file
    IoRead = 1001,
    /// POSE-1002: Failed to write file
    IoWrite = 1002,
    /// POSE-1003: Failed to parse file contents
    ParseError = 1003,
    /// POSE-1004: File extension not recognized
    UnsupportedFormat = 1004,

    // Geometry errors (2xxx)
    /// POSE-2001: Mesh has no vertices or faces
    EmptyMesh = 2001,
    /// POSE-2002: Face references a vertex that does not exist
    InvalidVertexIndex = 2002,
    /// POSE-2003: Vertex has a NaN or infinite coordinate
    InvalidCoordinate = 2003,
    /// POSE-2004: Covariance matrix is rank-deficient
    DegenerateGeometry = 2004,
    /// POSE-2005: Axis vector is zero or non-finite
    InvalidAxis = 2005,
    /// POSE-2006: Replacement vertex cloud has the wrong length
    VertexCountMismatch = 2006,

    // Processing errors (3xxx)
    /// POSE-3001: Remeshing failed
    RemeshFailed = 3001,
    /// POSE-3002: Landmark set does not have 68 points
    InvalidLandmarks = 3002,
    /// POSE-3003: Pipeline stage invoked out of order
    StageOrder = 3003,

    // Configuration errors (4xxx)
    /// POSE-4001: Configuration could not be read or parsed
    ConfigParse = 4001,
    /// POSE-4002: Configuration value out of range
    InvalidConfig = 4002,
}

impl ErrorCode {
    /// Returns the error code as a string in the format `POSE-XXXX`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::IoRead => "POSE-1001",
            ErrorCode::IoWrite => "POSE-1002",
            ErrorCode::ParseError => "POSE-1003",
            ErrorCode::UnsupportedFormat => "POSE-1004",
            ErrorCode::EmptyMesh => "POSE-2001",
            ErrorCode::InvalidVertexIndex => "POSE-2002",
            ErrorCode::InvalidCoordinate => "POSE-2003",
            ErrorCode::DegenerateGeometry => "POSE-2004",
            ErrorCode::InvalidAxis => "POSE-2005",
            ErrorCode::VertexCountMismatch => "POSE-2006",
            ErrorCode::RemeshFailed => "POSE-3001",
            ErrorCode::InvalidLandmarks => "POSE-3002",
            ErrorCode::StageOrder => "POSE-3003",
            ErrorCode::ConfigParse => "POSE-4001",
            ErrorCode::InvalidConfig => "POSE-4002",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse classification of errors, one class per failure mode a batch
/// driver reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The input mesh could not be loaded (missing, corrupt, empty, unknown format).
    UnreadableMesh,
    /// Principal axes could not be computed.
    DegenerateGeometry,
    /// The remesher rejected the mesh or the target length.
    RemeshFailed,
    /// The result could not be written.
    Io,
    /// Bad configuration values.
    Configuration,
    /// Misuse of the API (out-of-order stages, malformed collaborator output).
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::UnreadableMesh => "unreadable mesh",
            ErrorKind::DegenerateGeometry => "degenerate geometry",
            ErrorKind::RemeshFailed => "remesh failed",
            ErrorKind::Io => "i/o",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// What a user can do about a [`PoseError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Re-export the file from the scanning software.
    ReexportFile { format: Option<String> },
    /// Convert the scan to one of the listed formats.
    UseDifferentFormat { suggested: Vec<String> },
    /// Inspect the scan for the listed problems.
    CheckSourceMesh { checks: Vec<String> },
    /// Change the listed settings.
    AdjustParameters { parameters: Vec<(String, String)> },
    /// Nothing obvious to try.
    None,
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoverySuggestion::ReexportFile { format } => match format {
                Some(fmt) => write!(
                    f,
                    "Try re-exporting the mesh as {} from the scanning software",
                    fmt
                ),
                None => write!(f, "Try re-exporting the mesh from the scanning software"),
            },
            RecoverySuggestion::UseDifferentFormat { suggested } => {
                write!(f, "Convert the scan to {}", suggested.join(" or "))
            }
            RecoverySuggestion::CheckSourceMesh { checks } => {
                write!(f, "Inspect the scan: {}", checks.join("; "))
            }
            RecoverySuggestion::AdjustParameters { parameters } => {
                let params: Vec<String> = parameters
                    .iter()
                    .map(|(k, v)| format!("{} = {}", k, v))
                    .collect();
                write!(f, "Change {}", params.join(", "))
            }
            RecoverySuggestion::None => write!(f, "No suggestion"),
        }
    }
}

/// Errors that can occur while normalizing a mesh.
#[derive(Debug, Error, Diagnostic)]
pub enum PoseError {
    /// The scan file could not be opened or read.
    #[error("failed to read mesh from {path}")]
    #[diagnostic(
        code(pose::io::read),
        help("Is {} present and readable?", path.display())
    )]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The normalized mesh could not be written.
    #[error("failed to write mesh to {path}")]
    #[diagnostic(
        code(pose::io::write),
        help("Check that the output directory exists and is writable")
    )]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error parsing a mesh file.
    #[error("failed to parse mesh from {path}: {details}")]
    #[diagnostic(
        code(pose::parse::error),
        help("The file may be truncated or corrupted. Try re-exporting it from the scanner software.")
    )]
    ParseError { path: PathBuf, details: String },

    /// Unrecognized file extension.
    #[error("unsupported mesh format: {extension:?}")]
    #[diagnostic(code(pose::format::unsupported), help("Supported formats: STL, OBJ, PLY"))]
    UnsupportedFormat { extension: Option<String> },

    /// Mesh without vertices or faces.
    #[error("mesh is empty: {details}")]
    #[diagnostic(code(pose::geometry::empty))]
    EmptyMesh { details: String },

    /// Face references a vertex outside the vertex table.
    #[error(
        "invalid vertex index: face {face_index} references vertex {vertex_index}, but mesh only has {vertex_count} vertices"
    )]
    #[diagnostic(code(pose::geometry::vertex_index))]
    InvalidVertexIndex {
        face_index: usize,
        vertex_index: u32,
        vertex_count: usize,
    },

    /// Vertex coordinate is NaN or infinite.
    #[error("invalid coordinate at vertex {vertex_index}: {coordinate} is {value}")]
    #[diagnostic(code(pose::geometry::coordinate))]
    InvalidCoordinate {
        vertex_index: usize,
        coordinate: &'static str,
        value: f64,
    },

    /// No stable principal axis exists.
    #[error("degenerate geometry: {details}")]
    #[diagnostic(
        code(pose::geometry::degenerate),
        help("Principal axes need a cloud that spans all three dimensions (not flat, collinear or coincident).")
    )]
    DegenerateGeometry { details: String },

    /// Zero-length or non-finite axis.
    #[error("invalid axis {axis:?}: {details}")]
    #[diagnostic(code(pose::geometry::axis))]
    InvalidAxis { axis: [f64; 3], details: String },

    /// Replacement vertex cloud does not line up with the face table.
    #[error("vertex cloud has {actual} points but the mesh has {expected} vertices")]
    #[diagnostic(code(pose::geometry::vertex_count))]
    VertexCountMismatch { expected: usize, actual: usize },

    /// Remeshing failed; the input mesh is left untouched.
    #[error("remeshing failed: {details}")]
    #[diagnostic(
        code(pose::remesh::failed),
        help("Try a target edge length smaller than the mesh extent, or skip remeshing.")
    )]
    RemeshFailed { details: String },

    /// Detector produced a landmark set of the wrong size.
    #[error("landmark set must contain {expected} points, got {actual}")]
    #[diagnostic(code(pose::orientation::landmarks))]
    InvalidLandmarks { expected: usize, actual: usize },

    /// Pipeline stage invoked out of order.
    #[error("pipeline stage {requested} cannot run after {current}")]
    #[diagnostic(code(pose::pipeline::stage_order))]
    StageOrder {
        current: PipelineStage,
        requested: PipelineStage,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration: {details}")]
    #[diagnostic(code(pose::config::parse))]
    ConfigParse { details: String },

    /// Configuration value out of range.
    #[error("invalid configuration: {details}")]
    #[diagnostic(code(pose::config::invalid))]
    InvalidConfig { details: String },
}

impl PoseError {
    /// Stable `POSE-XXXX` code for scripts and logs.
    pub fn code(&self) -> ErrorCode {
        match self {
            PoseError::IoRead { .. } => ErrorCode::IoRead,
            PoseError::IoWrite { .. } => ErrorCode::IoWrite,
            PoseError::ParseError { .. } => ErrorCode::ParseError,
            PoseError::UnsupportedFormat { .. } => ErrorCode::UnsupportedFormat,
            PoseError::EmptyMesh { .. } => ErrorCode::EmptyMesh,
            PoseError::InvalidVertexIndex { .. } => ErrorCode::InvalidVertexIndex,
            PoseError::InvalidCoordinate { .. } => ErrorCode::InvalidCoordinate,
            PoseError::DegenerateGeometry { .. } => ErrorCode::DegenerateGeometry,
            PoseError::InvalidAxis { .. } => ErrorCode::InvalidAxis,
            PoseError::VertexCountMismatch { .. } => ErrorCode::VertexCountMismatch,
            PoseError::RemeshFailed { .. } => ErrorCode::RemeshFailed,
            PoseError::InvalidLandmarks { .. } => ErrorCode::InvalidLandmarks,
            PoseError::StageOrder { .. } => ErrorCode::StageOrder,
            PoseError::ConfigParse { .. } => ErrorCode::ConfigParse,
            PoseError::InvalidConfig { .. } => ErrorCode::InvalidConfig,
        }
    }

    /// Classifies the error into the failure modes a batch reports on.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PoseError::IoRead { .. }
            | PoseError::ParseError { .. }
            | PoseError::UnsupportedFormat { .. }
            | PoseError::EmptyMesh { .. }
            | PoseError::InvalidVertexIndex { .. }
            | PoseError::InvalidCoordinate { .. } => ErrorKind::UnreadableMesh,
            PoseError::DegenerateGeometry { .. } => ErrorKind::DegenerateGeometry,
            PoseError::RemeshFailed { .. } => ErrorKind::RemeshFailed,
            PoseError::IoWrite { .. } => ErrorKind::Io,
            PoseError::InvalidAxis { .. }
            | PoseError::ConfigParse { .. }
            | PoseError::InvalidConfig { .. } => ErrorKind::Configuration,
            PoseError::VertexCountMismatch { .. }
            | PoseError::InvalidLandmarks { .. }
            | PoseError::StageOrder { .. } => ErrorKind::Internal,
        }
    }

    /// Next step to offer the user.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self {
            PoseError::IoRead { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["does the path exist".into(), "can this user read it".into()],
            },
            PoseError::IoWrite { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["does the output directory exist".into(), "can this user write there".into()],
            },
            PoseError::ParseError { .. } => RecoverySuggestion::ReexportFile {
                format: Some("binary STL or PLY".into()),
            },
            PoseError::UnsupportedFormat { .. } => RecoverySuggestion::UseDifferentFormat {
                suggested: vec!["STL".into(), "OBJ".into(), "PLY".into()],
            },
            PoseError::EmptyMesh { .. }
            | PoseError::InvalidVertexIndex { .. }
            | PoseError::InvalidCoordinate { .. } => RecoverySuggestion::ReexportFile { format: None },
            PoseError::DegenerateGeometry { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec![
                    "mesh is not flat".into(),
                    "mesh is not a single line of points".into(),
                ],
            },
            PoseError::InvalidAxis { .. } => RecoverySuggestion::AdjustParameters {
                parameters: vec![("target_axis".into(), "a non-zero finite vector".into())],
            },
            PoseError::RemeshFailed { .. } => RecoverySuggestion::AdjustParameters {
                parameters: vec![(
                    "target_edge_length".into(),
                    "a positive value below the mesh extent".into(),
                )],
            },
            PoseError::ConfigParse { .. } | PoseError::InvalidConfig { .. } => {
                RecoverySuggestion::AdjustParameters {
                    parameters: vec![("config".into(), "see the field named in the error".into())],
                }
            }
            PoseError::VertexCountMismatch { .. }
            | PoseError::InvalidLandmarks { .. }
            | PoseError::StageOrder { .. } => RecoverySuggestion::None,
        }
    }

    pub fn io_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PoseError::IoRead {
            path: path.into(),
            source,
        }
    }

    pub fn io_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PoseError::IoWrite {
            path: path.into(),
            source,
        }
    }

    pub fn parse_error(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        PoseError::ParseError {
            path: path.into(),
            details: details.into(),
        }
    }

    pub fn empty_mesh(details: impl Into<String>) -> Self {
        PoseError::EmptyMesh {
            details: details.into(),
        }
    }

    pub fn degenerate_geometry(details: impl Into<String>) -> Self {
        PoseError::DegenerateGeometry {
            details: details.into(),
        }
    }

    pub fn invalid_axis(axis: [f64; 3], details: impl Into<String>) -> Self {
        PoseError::InvalidAxis {
            axis,
            details: details.into(),
        }
    }

    pub fn remesh_failed(details: impl Into<String>) -> Self {
        PoseError::RemeshFailed {
            details: details.into(),
        }
    }

    pub fn invalid_config(details: impl Into<String>) -> Self {
        PoseError::InvalidConfig {
            details: details.into(),
        }
    }

    pub fn unsupported_format(extension: Option<String>) -> Self {
        PoseError::UnsupportedFormat { extension }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = PoseError::remesh_failed("did not converge");
        assert_eq!(err.code(), ErrorCode::RemeshFailed);
        assert_eq!(err.code().as_str(), "POSE-3001");
    }

    #[test]
    fn test_kind_maps_load_failures_to_unreadable() {
        let missing = PoseError::io_read(
            "scan.stl",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(missing.kind(), ErrorKind::UnreadableMesh);
        assert_eq!(
            PoseError::parse_error("scan.stl", "truncated").kind(),
            ErrorKind::UnreadableMesh
        );
        assert_eq!(
            PoseError::unsupported_format(Some("xyz".into())).kind(),
            ErrorKind::UnreadableMesh
        );
    }

    #[test]
    fn test_kind_for_export_failure() {
        let err = PoseError::io_write(
            "out.stl",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_recovery_suggestions() {
        let err = PoseError::remesh_failed("target too large");
        match err.recovery_suggestion() {
            RecoverySuggestion::AdjustParameters { parameters } => {
                assert_eq!(parameters[0].0, "target_edge_length");
            }
            other => panic!("Expected AdjustParameters suggestion, got {:?}", other),
        }
    }

    #[test]
    fn test_stage_order_display() {
        let err = PoseError::StageOrder {
            current: PipelineStage::Loaded,
            requested: PipelineStage::Remeshed,
        };
        let display = err.to_string();
        assert!(display.contains("remeshed"));
        assert!(display.contains("loaded"));
    }

    #[test]
    fn test_error_display() {
        let err = PoseError::InvalidVertexIndex {
            face_index: 5,
            vertex_index: 100,
            vertex_count: 50,
        };
        let display = format!("{}", err);
        assert!(display.contains("face 5"));
        assert!(display.contains("vertex 100"));
        assert!(display.contains("50 vertices"));
    }
}
