//! Canonical pose normalization for triangle meshes.
//!
//! Scanned heads and dental arches arrive in whatever frame the scanner
//! used. This crate brings them into one canonical frame so they can be
//! compared, averaged or fed to a model:
//!
//! 1. **Align**: rotate so the direction of maximum variance (first
//!    principal axis) lies along a target axis, `(0, 1, 0)` by default.
//! 2. **Center**: translate the bounding-box midpoint (or the centroid)
//!    to the origin.
//! 3. **Orient**: render the mesh, ask a landmark detector for a face, and
//!    turn the mesh 180° if the mouth sits above the eyes.
//! 4. **Remesh** (optional): re-tessellate toward a uniform edge length.
//!
//! Only vertex positions change in stages 1–3. Face connectivity is
//! untouched until remeshing.
//!
//! # Quick Start
//!
//! ```no_run
//! use mesh_pose::{NormalizeConfig, Normalizer};
//! use std::path::Path;
//!
//! let config = NormalizeConfig::default().with_target_edge_length(Some(0.5));
//! let normalizer = Normalizer::new(config)?;
//! let report = normalizer.process_file(Path::new("scan.ply"), Path::new("canonical.ply"))?;
//! println!("orientation: {:?}", report.orientation);
//! # Ok::<(), mesh_pose::PoseError>(())
//! ```
//!
//! # Landmark Detection
//!
//! No detector ships with the crate. Any `Fn(&GrayImage) -> Option<LandmarkSet>`
//! works, as does any type implementing [`LandmarkDetector`]:
//!
//! ```no_run
//! use mesh_pose::{GrayImage, LandmarkSet, NormalizeConfig, Normalizer};
//!
//! let detector = |_image: &GrayImage| -> Option<LandmarkSet> { None };
//! let normalizer = Normalizer::builder(NormalizeConfig::default())
//!     .detector(detector)
//!     .build()?;
//! # Ok::<(), mesh_pose::PoseError>(())
//! ```
//!
//! # Coordinate System
//!
//! Right-handed. Units are whatever the input file uses; nothing is scaled.
//!
//! # Logging
//!
//! All stages emit [`tracing`] events; see [`tracing_ext`] for the targets.

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod error;
mod pipeline;
pub mod tracing_ext;
mod types;

#[cfg(test)]
mod fixtures;

pub mod adjacency;
pub mod align;
pub mod batch;
pub mod center;
pub mod config;
pub mod io;
pub mod landmarks;
pub mod orient;
pub mod pca;
pub mod project;
pub mod remesh;

// Re-export core types at crate root
pub use error::{ErrorCode, ErrorKind, PoseError, PoseResult, RecoverySuggestion};
pub use types::{Mesh, Triangle, Vertex};

pub use adjacency::MeshAdjacency;
pub use align::{Alignment, RotationPivot, align_to_axis, rotation_between};
pub use batch::{BatchJob, BatchReport, jobs_for_directory, list_mesh_files, normalize_batch};
pub use center::{CenteringPolicy, center};
pub use config::{NormalizeConfig, OrientationConfig};
pub use io::{
    FileMeshIo, MeshExporter, MeshFormat, MeshLoader, load_mesh, save_mesh, save_obj, save_ply,
    save_stl,
};
pub use landmarks::{FixedLandmarks, LandmarkDetector, LandmarkSet, NoFaceDetector};
pub use orient::{FlipAxis, OrientationOutcome, SkipReason, correct_orientation};
pub use pca::{PrincipalAxes, principal_axes};
pub use pipeline::{
    IntoPipeline, NormalizeReport, Normalizer, NormalizerBuilder, Pipeline, PipelineStage,
    RemeshFallback, RemeshRejected, normalize_file,
};
pub use project::{MeshProjector, OrthographicProjector};
pub use remesh::{
    IsotropicRemesher, RemeshParams, RemeshResult, RemeshSummary, Remesher, normalize_resolution,
    remesh_isotropic,
};

pub use image::GrayImage;

// Convenience methods on Mesh
impl Mesh {
    /// Load a mesh from a file, auto-detecting format from extension.
    pub fn load(path: impl AsRef<std::path::Path>) -> PoseResult<Self> {
        io::load_mesh(path.as_ref())
    }

    /// Save the mesh to a file, auto-detecting format from extension.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> PoseResult<()> {
        io::save_mesh(self, path.as_ref())
    }

    /// Principal axes of the vertex cloud.
    pub fn principal_axes(&self) -> PoseResult<PrincipalAxes> {
        pca::principal_axes(&self.positions())
    }

    /// Run the default normalization on a copy of this mesh.
    pub fn normalized(&self) -> PoseResult<Mesh> {
        Ok(Normalizer::new(NormalizeConfig::default())?
            .normalize(self.clone())?
            .mesh)
    }
}
