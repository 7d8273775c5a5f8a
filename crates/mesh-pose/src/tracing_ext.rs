//! Tracing helpers for pose operations.
//!
//! The library only emits events; installing a subscriber is up to the
//! application:
//!
//! ```rust,ignore
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env())
//!     .init();
//!
//! // RUST_LOG=mesh_pose=debug for per-stage output
//! ```
//!
//! # Targets
//!
//! - `mesh_pose::timing`: operation durations
//! - `mesh_pose::mesh_state`: vertex/face counts and extents
//! - `mesh_pose::stage`: pipeline stage transitions
//! - `mesh_pose::io`: file loads and saves
//! - `mesh_pose::pca`, `mesh_pose::align`, `mesh_pose::center`: per-stage details
//! - `mesh_pose::project`: projector coverage
//! - `mesh_pose::remesh`: per-iteration remeshing statistics
//! - `mesh_pose::orientation`: landmark checks and flips
//! - `mesh_pose::batch`: per-file batch outcomes

use std::path::Path;
use std::time::Instant;

use nalgebra::Vector3;
use tracing::{Level, Span, debug, info, span, warn};

use crate::pipeline::PipelineStage;
use crate::types::Mesh;

/// Wall-clock timer for one pose operation.
///
/// The duration goes to `mesh_pose::timing` when the timer is dropped:
///
/// ```rust,ignore
/// let _timer = OperationTimer::for_mesh("remesh", &mesh);
/// let result = remesher.run(&mesh)?;
/// ```
pub struct OperationTimer {
    operation: &'static str,
    started: Instant,
    _span: span::EnteredSpan,
}

impl OperationTimer {
    /// Time an operation that has no mesh yet (batch runs, file processing).
    pub fn new(operation: &'static str) -> Self {
        Self::start(operation, span!(Level::INFO, "pose", operation))
    }

    /// Time an operation on `mesh`; the span records its size.
    pub fn for_mesh(operation: &'static str, mesh: &Mesh) -> Self {
        let span = span!(
            Level::INFO,
            "pose",
            operation,
            vertices = mesh.vertex_count(),
            faces = mesh.face_count()
        );
        Self::start(operation, span)
    }

    fn start(operation: &'static str, span: Span) -> Self {
        debug!(target: "mesh_pose::timing", operation, "started");
        Self {
            operation,
            started: Instant::now(),
            _span: span.entered(),
        }
    }

    /// Milliseconds since the timer started.
    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1e3
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        info!(
            target: "mesh_pose::timing",
            operation = self.operation,
            elapsed_ms = format!("{:.2}", self.elapsed_ms()),
            "finished"
        );
    }
}

/// Vertex and face counts plus bounding-box extent, at debug level.
pub fn log_mesh_stats(mesh: &Mesh, context: &str) {
    let extent = mesh
        .bounds()
        .map(|(min, max)| max - min)
        .unwrap_or_else(Vector3::zeros);

    debug!(
        target: "mesh_pose::mesh_state",
        context,
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        extent = format!("{:.2} x {:.2} x {:.2}", extent.x, extent.y, extent.z),
        "mesh state"
    );
}

pub fn log_stage_transition(from: PipelineStage, to: PipelineStage, detail: &str) {
    info!(target: "mesh_pose::stage", %from, %to, detail, "stage finished");
}

/// Record a load or save. Failures are warnings; the caller still returns the error.
pub fn log_io_operation(operation: &str, path: &Path, format: Option<&str>, succeeded: bool) {
    let path = path.display().to_string();
    let format = format.unwrap_or("by extension");
    if succeeded {
        info!(target: "mesh_pose::io", operation, path, format, "mesh {operation} ok");
    } else {
        warn!(target: "mesh_pose::io", operation, path, format, "mesh {operation} failed");
    }
}
