//! Parallel normalization of many files.
//!
//! Meshes are independent, so jobs run on rayon's global pool (or whatever
//! pool the caller installs). A failing mesh is logged and recorded; it never
//! stops the rest of the batch.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{ErrorKind, PoseError, PoseResult};
use crate::io::MeshFormat;
use crate::orient::OrientationOutcome;
use crate::pipeline::{NormalizeReport, Normalizer, RemeshFallback};
use crate::tracing_ext::OperationTimer;

/// One input file and where its normalized copy goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl BatchJob {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

/// Per-file success record.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSuccess {
    pub input: PathBuf,
    pub output: PathBuf,
    pub vertices: usize,
    pub faces: usize,
    pub orientation: Option<OrientationOutcome>,
    /// Present when the file was written without the requested remesh.
    pub remesh_fallback: Option<RemeshFallback>,
}

/// Per-file failure record.
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub input: PathBuf,
    pub code: &'static str,
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of [`normalize_batch`], in job order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<BatchSuccess>,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    /// Failures of one kind.
    pub fn failures_of(&self, kind: ErrorKind) -> impl Iterator<Item = &BatchFailure> {
        self.failed.iter().filter(move |f| f.kind == kind)
    }
}

/// Normalize every job in parallel.
pub fn normalize_batch(normalizer: &Normalizer, jobs: &[BatchJob]) -> BatchReport {
    let _timer = OperationTimer::new("normalize_batch");
    info!(target: "mesh_pose::batch", jobs = jobs.len(), "Starting batch");

    let outcomes: Vec<(&BatchJob, PoseResult<NormalizeReport>)> = jobs
        .par_iter()
        .map(|job| (job, normalizer.process_file(&job.input, &job.output)))
        .collect();

    let mut report = BatchReport::default();
    for (job, outcome) in outcomes {
        match outcome {
            Ok(result) => {
                info!(
                    target: "mesh_pose::batch",
                    input = %job.input.display(),
                    output = %job.output.display(),
                    "Normalized"
                );
                report.succeeded.push(BatchSuccess {
                    input: job.input.clone(),
                    output: job.output.clone(),
                    vertices: result.mesh.vertex_count(),
                    faces: result.mesh.face_count(),
                    orientation: result.orientation,
                    remesh_fallback: result.remesh_fallback,
                });
            }
            Err(e) => {
                warn!(
                    target: "mesh_pose::batch",
                    input = %job.input.display(),
                    code = e.code().as_str(),
                    error = %e,
                    "Failed"
                );
                report.failed.push(BatchFailure {
                    input: job.input.clone(),
                    code: e.code().as_str(),
                    kind: e.kind(),
                    message: e.to_string(),
                });
            }
        }
    }

    info!(
        target: "mesh_pose::batch",
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "Batch complete"
    );
    report
}

/// Supported mesh files directly inside `dir`, sorted by file name.
pub fn list_mesh_files(dir: &Path) -> PoseResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| PoseError::io_read(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| PoseError::io_read(dir, e))?.path();
        if path.is_file() && MeshFormat::from_path(&path).is_some() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// One job per mesh file in `input_dir`, writing to the same file name under
/// `output_dir`.
pub fn jobs_for_directory(input_dir: &Path, output_dir: &Path) -> PoseResult<Vec<BatchJob>> {
    Ok(list_mesh_files(input_dir)?
        .into_iter()
        .filter_map(|input| {
            let name = input.file_name()?.to_owned();
            Some(BatchJob::new(input, output_dir.join(name)))
        })
        .collect())
}
