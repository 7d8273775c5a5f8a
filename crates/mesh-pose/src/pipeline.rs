//! Stage sequencing for pose normalization.
//!
//! [`Pipeline`] is the low-level fluent API: each stage method consumes the
//! pipeline, checks that its predecessor has run, and hands it back.
//! [`Normalizer`] wires a [`NormalizeConfig`] and injected collaborators into
//! the standard sequence.
//!
//! # Example
//!
//! ```no_run
//! use mesh_pose::{CenteringPolicy, Pipeline, RotationPivot};
//! use nalgebra::Vector3;
//!
//! let report = Pipeline::load("head.ply")?
//!     .align(&Vector3::y(), RotationPivot::RestoreMean)?
//!     .center(CenteringPolicy::BoundingBox)?
//!     .finish();
//! println!("{:?}", report.operation_log);
//! # Ok::<(), mesh_pose::PoseError>(())
//! ```

use std::path::Path;

use nalgebra::{Rotation3, Vector3};
use serde::Serialize;
use tracing::warn;

use crate::align::{RotationPivot, align_to_axis};
use crate::center::{CenteringPolicy, center};
use crate::config::NormalizeConfig;
use crate::error::{ErrorKind, PoseError, PoseResult};
use crate::io::{FileMeshIo, MeshExporter, MeshLoader};
use crate::landmarks::LandmarkDetector;
use crate::orient::{OrientationOutcome, SkipReason, correct_orientation};
use crate::pca::PrincipalAxes;
use crate::project::{MeshProjector, OrthographicProjector};
use crate::remesh::{IsotropicRemesher, RemeshSummary, Remesher, normalize_resolution};
use crate::tracing_ext::{OperationTimer, log_mesh_stats, log_stage_transition};
use crate::types::Mesh;

/// Where a mesh is in the normalization sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Loaded,
    PcaAligned,
    Centered,
    OrientationChecked,
    Remeshed,
    Exported,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Loaded => "loaded",
            PipelineStage::PcaAligned => "pca_aligned",
            PipelineStage::Centered => "centered",
            PipelineStage::OrientationChecked => "orientation_checked",
            PipelineStage::Remeshed => "remeshed",
            PipelineStage::Exported => "exported",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a finished pipeline knows about its mesh.
#[derive(Debug, Clone)]
pub struct NormalizeReport {
    /// The processed mesh.
    pub mesh: Mesh,
    /// Last stage reached.
    pub stage: PipelineStage,
    /// Principal axes of the input, before alignment.
    pub axes_before: Option<PrincipalAxes>,
    /// Rotation applied by alignment.
    pub rotation: Option<Rotation3<f64>>,
    /// Translation applied by centering.
    pub translation: Vector3<f64>,
    pub orientation: Option<OrientationOutcome>,
    pub remesh: Option<RemeshSummary>,
    /// Set when remeshing was rejected and the unremeshed mesh was kept.
    pub remesh_fallback: Option<RemeshFallback>,
    /// Number of pipeline stages executed.
    pub stages_executed: usize,
    /// Log of operations performed.
    pub operation_log: Vec<String>,
}

/// Why a requested remesh was dropped in favor of the unremeshed mesh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemeshFallback {
    /// `POSE-XXXX` code of the rejected remesh.
    pub code: &'static str,
    pub message: String,
    pub target_edge_length: f64,
}

/// A remesh that failed, holding the pipeline exactly as it was before.
///
/// The caller either gives up with [`RemeshRejected::into_error`] or carries
/// on with the unremeshed mesh through [`RemeshRejected::keep_unremeshed`].
pub struct RemeshRejected {
    pipeline: Box<Pipeline>,
    error: PoseError,
    target_edge_length: f64,
}

impl RemeshRejected {
    pub fn error(&self) -> &PoseError {
        &self.error
    }

    /// The pipeline as it stood before the attempt.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn into_error(self) -> PoseError {
        self.error
    }

    /// Continue without remeshing; the failure is recorded in the report.
    pub fn keep_unremeshed(self) -> Pipeline {
        let mut pipeline = *self.pipeline;
        warn!(
            target: "mesh_pose::remesh",
            code = self.error.code().as_str(),
            error = %self.error,
            "Keeping unremeshed mesh"
        );
        pipeline.log(format!(
            "Remesh to {:.4} rejected, kept unremeshed mesh: {}",
            self.target_edge_length, self.error
        ));
        pipeline.remesh_fallback = Some(RemeshFallback {
            code: self.error.code().as_str(),
            message: self.error.to_string(),
            target_edge_length: self.target_edge_length,
        });
        pipeline
    }
}

impl std::fmt::Debug for RemeshRejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemeshRejected")
            .field("stage", &self.pipeline.stage)
            .field("error", &self.error)
            .field("target_edge_length", &self.target_edge_length)
            .finish()
    }
}

/// A pose normalization pipeline over one mesh.
///
/// Stages run strictly in order:
/// `Loaded → PcaAligned → Centered → OrientationChecked → Remeshed → Exported`.
/// The orientation check and remeshing may be left out; everything else
/// out of order fails with [`PoseError::StageOrder`].
#[derive(Debug)]
pub struct Pipeline {
    mesh: Mesh,
    stage: PipelineStage,
    axes_before: Option<PrincipalAxes>,
    rotation: Option<Rotation3<f64>>,
    translation: Vector3<f64>,
    orientation: Option<OrientationOutcome>,
    remesh: Option<RemeshSummary>,
    remesh_fallback: Option<RemeshFallback>,
    stages_executed: usize,
    operation_log: Vec<String>,
}

impl Pipeline {
    /// Start a pipeline with an existing mesh.
    pub fn new(mesh: Mesh) -> Self {
        log_mesh_stats(&mesh, "pipeline input");
        Self {
            mesh,
            stage: PipelineStage::Loaded,
            axes_before: None,
            rotation: None,
            translation: Vector3::zeros(),
            orientation: None,
            remesh: None,
            remesh_fallback: None,
            stages_executed: 0,
            operation_log: Vec::new(),
        }
    }

    /// Start a pipeline by loading a mesh from a file.
    pub fn load(path: impl AsRef<Path>) -> PoseResult<Self> {
        Self::load_with(&FileMeshIo, path.as_ref())
    }

    /// Start a pipeline from a custom loader.
    pub fn load_with(loader: &dyn MeshLoader, path: &Path) -> PoseResult<Self> {
        let mesh = loader.load(path)?;
        let mut pipeline = Self::new(mesh);
        pipeline.log(format!(
            "Loaded {} vertices, {} faces from {}",
            pipeline.mesh.vertex_count(),
            pipeline.mesh.face_count(),
            path.display()
        ));
        Ok(pipeline)
    }

    // =========================================================================
    // Stages
    // =========================================================================

    /// Rotate the vertex cloud so its first principal axis lies along `target`.
    pub fn align(mut self, target: &Vector3<f64>, pivot: RotationPivot) -> PoseResult<Self> {
        self.require(&[PipelineStage::Loaded], PipelineStage::PcaAligned)?;

        let alignment = align_to_axis(&self.mesh.positions(), target, pivot)?;
        self.mesh.replace_positions(alignment.points)?;

        let detail = format!(
            "Rotated primary axis by {:.2}° (elongation {:.2})",
            alignment.rotation.angle().to_degrees(),
            alignment.axes.elongation()
        );
        self.axes_before = Some(alignment.axes);
        self.rotation = Some(alignment.rotation);
        self.advance(PipelineStage::PcaAligned, detail);
        Ok(self)
    }

    /// Translate the vertex cloud so the policy's reference point is the origin.
    pub fn center(mut self, policy: CenteringPolicy) -> PoseResult<Self> {
        self.require(&[PipelineStage::PcaAligned], PipelineStage::Centered)?;

        let (points, offset) = center(&self.mesh.positions(), policy);
        self.mesh.replace_positions(points)?;
        self.translation = offset;

        self.advance(
            PipelineStage::Centered,
            format!(
                "Centered by {:?} (offset {:.4}, {:.4}, {:.4})",
                policy, offset.x, offset.y, offset.z
            ),
        );
        Ok(self)
    }

    /// Run the landmark check and flip the cloud if the face is upside down.
    ///
    /// Missing collaborators or no detected face are recorded as a skip, not
    /// an error.
    pub fn check_orientation(
        mut self,
        projector: Option<&dyn MeshProjector>,
        detector: Option<&dyn LandmarkDetector>,
        flip_axis: &Vector3<f64>,
    ) -> PoseResult<Self> {
        self.require(&[PipelineStage::Centered], PipelineStage::OrientationChecked)?;

        let (points, outcome) = correct_orientation(&self.mesh, projector, detector, flip_axis)?;
        if outcome.flipped() {
            self.mesh.replace_positions(points)?;
        }
        self.orientation = Some(outcome);
        self.advance(
            PipelineStage::OrientationChecked,
            format!("Orientation {}", outcome),
        );
        Ok(self)
    }

    /// Record the orientation check as skipped without running it.
    pub fn skip_orientation(mut self, reason: SkipReason) -> PoseResult<Self> {
        self.require(&[PipelineStage::Centered], PipelineStage::OrientationChecked)?;

        let outcome = OrientationOutcome::Skipped { reason };
        self.orientation = Some(outcome);
        self.advance(
            PipelineStage::OrientationChecked,
            format!("Orientation {}", outcome),
        );
        Ok(self)
    }

    /// Re-tessellate to `target_edge_length`.
    ///
    /// Fails with the remesher's error; use [`Pipeline::try_remesh`] to get
    /// the unremeshed pipeline back instead.
    pub fn remesh(self, remesher: &dyn Remesher, target_edge_length: f64) -> PoseResult<Self> {
        self.try_remesh(remesher, target_edge_length)
            .map_err(RemeshRejected::into_error)
    }

    /// Re-tessellate to `target_edge_length`, returning the untouched
    /// pipeline inside the error if the stage is out of order or the
    /// remesher fails.
    pub fn try_remesh(
        mut self,
        remesher: &dyn Remesher,
        target_edge_length: f64,
    ) -> Result<Self, RemeshRejected> {
        let attempt = self
            .require(
                &[PipelineStage::Centered, PipelineStage::OrientationChecked],
                PipelineStage::Remeshed,
            )
            .and_then(|()| normalize_resolution(&self.mesh, remesher, target_edge_length));
        let result = match attempt {
            Ok(result) => result,
            Err(error) => {
                return Err(RemeshRejected {
                    pipeline: Box::new(self),
                    error,
                    target_edge_length,
                });
            }
        };

        let summary = result.summary;
        self.mesh = result.mesh;
        self.remesh = Some(summary);

        self.advance(
            PipelineStage::Remeshed,
            format!(
                "Remeshed to {:.4} edge length ({} → {} triangles)",
                target_edge_length, summary.original_triangles, summary.final_triangles
            ),
        );
        Ok(self)
    }

    /// Write the mesh with `exporter` and finish.
    pub fn export(mut self, exporter: &dyn MeshExporter, path: &Path) -> PoseResult<NormalizeReport> {
        self.require(
            &[
                PipelineStage::Centered,
                PipelineStage::OrientationChecked,
                PipelineStage::Remeshed,
            ],
            PipelineStage::Exported,
        )?;

        exporter.export(&self.mesh, path)?;
        self.advance(
            PipelineStage::Exported,
            format!("Saved mesh to {}", path.display()),
        );
        Ok(self.finish())
    }

    /// Save to a file, format chosen by extension.
    pub fn save(self, path: impl AsRef<Path>) -> PoseResult<NormalizeReport> {
        self.export(&FileMeshIo, path.as_ref())
    }

    /// Finish the pipeline and return the result without saving.
    pub fn finish(self) -> NormalizeReport {
        log_mesh_stats(&self.mesh, "pipeline output");
        NormalizeReport {
            mesh: self.mesh,
            stage: self.stage,
            axes_before: self.axes_before,
            rotation: self.rotation,
            translation: self.translation,
            orientation: self.orientation,
            remesh: self.remesh,
            remesh_fallback: self.remesh_fallback,
            stages_executed: self.stages_executed,
            operation_log: self.operation_log,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn log_entries(&self) -> &[String] {
        &self.operation_log
    }

    pub fn stages_executed(&self) -> usize {
        self.stages_executed
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn require(&self, allowed: &[PipelineStage], requested: PipelineStage) -> PoseResult<()> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(PoseError::StageOrder {
                current: self.stage,
                requested,
            })
        }
    }

    fn advance(&mut self, next: PipelineStage, detail: String) {
        log_stage_transition(self.stage, next, &detail);
        self.stage = next;
        self.stages_executed += 1;
        self.log(detail);
    }

    fn log(&mut self, message: String) {
        self.operation_log.push(message);
    }
}

/// Trait for types that can be converted into a Pipeline.
pub trait IntoPipeline {
    fn into_pipeline(self) -> Pipeline;
}

impl IntoPipeline for Mesh {
    fn into_pipeline(self) -> Pipeline {
        Pipeline::new(self)
    }
}

// =============================================================================
// Normalizer
// =============================================================================

/// Runs the configured stage sequence with injected collaborators.
///
/// A `Normalizer` holds no per-mesh state and can be shared across threads.
pub struct Normalizer {
    config: NormalizeConfig,
    projector: Option<Box<dyn MeshProjector>>,
    detector: Option<Box<dyn LandmarkDetector>>,
    remesher: Box<dyn Remesher>,
    loader: Box<dyn MeshLoader>,
    exporter: Box<dyn MeshExporter>,
}

impl Normalizer {
    /// Normalizer with default collaborators and no landmark detector.
    pub fn new(config: NormalizeConfig) -> PoseResult<Self> {
        NormalizerBuilder::new(config).build()
    }

    pub fn builder(config: NormalizeConfig) -> NormalizerBuilder {
        NormalizerBuilder::new(config)
    }

    pub fn config(&self) -> &NormalizeConfig {
        &self.config
    }

    /// Align, center, check orientation and (if configured) remesh `mesh`.
    ///
    /// A rejected remesh fails the whole run unless
    /// [`NormalizeConfig::keep_unremeshed_on_failure`] is set, in which case
    /// the report carries the unremeshed mesh and a [`RemeshFallback`].
    pub fn normalize(&self, mesh: Mesh) -> PoseResult<NormalizeReport> {
        let _timer = OperationTimer::for_mesh("normalize", &mesh);
        Ok(self.run(Pipeline::new(mesh))?.finish())
    }

    /// Load `input`, normalize it and export the result to `output`.
    pub fn process_file(&self, input: &Path, output: &Path) -> PoseResult<NormalizeReport> {
        let _timer = OperationTimer::new("process_file");
        let pipeline = Pipeline::load_with(self.loader.as_ref(), input)?;
        self.run(pipeline)?.export(self.exporter.as_ref(), output)
    }

    /// Load a mesh through the configured loader.
    pub fn load(&self, path: &Path) -> PoseResult<Mesh> {
        self.loader.load(path)
    }

    fn run(&self, pipeline: Pipeline) -> PoseResult<Pipeline> {
        let config = &self.config;
        let pipeline = pipeline
            .align(&config.target_axis(), config.pivot)?
            .center(config.centering)?;

        let pipeline = if config.orientation.enabled {
            pipeline.check_orientation(
                self.projector.as_deref(),
                self.detector.as_deref(),
                &config.flip_axis(),
            )?
        } else {
            pipeline.skip_orientation(SkipReason::Disabled)?
        };

        let Some(length) = config.target_edge_length else {
            return Ok(pipeline);
        };
        match pipeline.try_remesh(self.remesher.as_ref(), length) {
            Ok(pipeline) => Ok(pipeline),
            Err(rejected)
                if config.keep_unremeshed_on_failure
                    && rejected.error().kind() == ErrorKind::RemeshFailed =>
            {
                Ok(rejected.keep_unremeshed())
            }
            Err(rejected) => Err(rejected.into_error()),
        }
    }
}

/// Builder for [`Normalizer`].
///
/// Unset collaborators default to an [`OrthographicProjector`] built from
/// the orientation settings, an [`IsotropicRemesher`] using the config's
/// remesh parameters, and [`FileMeshIo`] for loading and export. There is
/// no default detector.
pub struct NormalizerBuilder {
    config: NormalizeConfig,
    projector: Option<Box<dyn MeshProjector>>,
    use_projector: bool,
    detector: Option<Box<dyn LandmarkDetector>>,
    remesher: Option<Box<dyn Remesher>>,
    loader: Option<Box<dyn MeshLoader>>,
    exporter: Option<Box<dyn MeshExporter>>,
}

impl NormalizerBuilder {
    pub fn new(config: NormalizeConfig) -> Self {
        Self {
            config,
            projector: None,
            use_projector: true,
            detector: None,
            remesher: None,
            loader: None,
            exporter: None,
        }
    }

    pub fn projector(mut self, projector: impl MeshProjector + 'static) -> Self {
        self.projector = Some(Box::new(projector));
        self.use_projector = true;
        self
    }

    /// Run without any projector; orientation is then always skipped.
    pub fn without_projector(mut self) -> Self {
        self.projector = None;
        self.use_projector = false;
        self
    }

    pub fn detector(mut self, detector: impl LandmarkDetector + 'static) -> Self {
        self.detector = Some(Box::new(detector));
        self
    }

    pub fn remesher(mut self, remesher: impl Remesher + 'static) -> Self {
        self.remesher = Some(Box::new(remesher));
        self
    }

    pub fn loader(mut self, loader: impl MeshLoader + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    pub fn exporter(mut self, exporter: impl MeshExporter + 'static) -> Self {
        self.exporter = Some(Box::new(exporter));
        self
    }

    /// Validate the config and assemble the normalizer.
    pub fn build(self) -> PoseResult<Normalizer> {
        let config = self.config;
        config.validate()?;

        let projector: Option<Box<dyn MeshProjector>> = match (self.projector, self.use_projector) {
            (Some(projector), _) => Some(projector),
            (None, true) => Some(Box::new(OrthographicProjector::new(
                config.orientation.resolution,
                config.orientation.view_direction(),
                config.target_axis(),
            )?)),
            (None, false) => None,
        };
        let remesher = self
            .remesher
            .unwrap_or_else(|| Box::new(IsotropicRemesher::new(config.remesh.clone())));

        Ok(Normalizer {
            projector,
            detector: self.detector,
            remesher,
            loader: self.loader.unwrap_or_else(|| Box::new(FileMeshIo)),
            exporter: self.exporter.unwrap_or_else(|| Box::new(FileMeshIo)),
            config,
        })
    }
}

/// Load, normalize with default settings, and save.
pub fn normalize_file(input: &Path, output: &Path) -> PoseResult<NormalizeReport> {
    Normalizer::new(NormalizeConfig::default())?.process_file(input, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::load_mesh;
    use crate::fixtures::ellipsoid;
    use crate::landmarks::{FixedLandmarks, LandmarkSet, NoFaceDetector};
    use crate::pca::principal_axes;
    use approx::assert_relative_eq;
    use nalgebra::{Point2, Point3, Unit};

    /// Ellipsoid with its long axis tilted away from every coordinate axis.
    fn tilted_ellipsoid() -> Mesh {
        let mut mesh = ellipsoid(Vector3::new(1.0, 4.0, 2.0), 2);
        let rotation = Rotation3::from_axis_angle(
            &Unit::new_normalize(Vector3::new(1.0, 2.0, 3.0)),
            0.9,
        );
        let moved: Vec<Point3<f64>> = mesh
            .positions()
            .iter()
            .map(|p| rotation * p + Vector3::new(5.0, -3.0, 2.0))
            .collect();
        mesh.replace_positions(moved).unwrap();
        mesh
    }

    fn inverted_face() -> FixedLandmarks {
        FixedLandmarks(
            LandmarkSet::upright_template(Point2::new(128.0, 128.0), 40.0).mirrored_vertically(256.0),
        )
    }

    fn upright_face() -> FixedLandmarks {
        FixedLandmarks(LandmarkSet::upright_template(Point2::new(128.0, 128.0), 40.0))
    }

    #[test]
    fn test_pipeline_new() {
        let pipeline = Pipeline::new(tilted_ellipsoid());
        assert_eq!(pipeline.stage(), PipelineStage::Loaded);
        assert_eq!(pipeline.stages_executed(), 0);
        assert!(pipeline.log_entries().is_empty());
    }

    #[test]
    fn test_pipeline_chaining() {
        let report = tilted_ellipsoid()
            .into_pipeline()
            .align(&Vector3::y(), RotationPivot::RestoreMean)
            .unwrap()
            .center(CenteringPolicy::BoundingBox)
            .unwrap()
            .finish();

        assert_eq!(report.stage, PipelineStage::Centered);
        assert_eq!(report.stages_executed, 2);
        assert_eq!(report.operation_log.len(), 2);
        assert!(report.axes_before.is_some());
        assert!(report.orientation.is_none());

        let axes = principal_axes(&report.mesh.positions()).unwrap();
        assert!(axes.primary().dot(&Vector3::y()).abs() > 1.0 - 1e-9);

        let (min, max) = report.mesh.bounds().unwrap();
        let mid = nalgebra::center(&min, &max);
        assert_relative_eq!(mid.coords.norm(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_stage_order_is_enforced() {
        let err = Pipeline::new(tilted_ellipsoid())
            .center(CenteringPolicy::Centroid)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            PoseError::StageOrder {
                current: PipelineStage::Loaded,
                requested: PipelineStage::Centered
            }
        ));

        let err = Pipeline::new(tilted_ellipsoid())
            .align(&Vector3::y(), RotationPivot::RestoreMean)
            .unwrap()
            .remesh(&IsotropicRemesher::default(), 0.5)
            .err()
            .unwrap();
        assert!(matches!(err, PoseError::StageOrder { .. }));
    }

    #[test]
    fn test_align_twice_is_rejected() {
        let result = Pipeline::new(tilted_ellipsoid())
            .align(&Vector3::y(), RotationPivot::RestoreMean)
            .and_then(|p| p.align(&Vector3::x(), RotationPivot::RestoreMean));
        assert!(matches!(result, Err(PoseError::StageOrder { .. })));
    }

    #[test]
    fn test_normalize_defaults() {
        let normalizer = Normalizer::new(NormalizeConfig::default()).unwrap();
        let report = normalizer.normalize(tilted_ellipsoid()).unwrap();

        assert_eq!(report.stage, PipelineStage::OrientationChecked);
        assert_eq!(
            report.orientation,
            Some(OrientationOutcome::Skipped {
                reason: SkipReason::NoDetector
            })
        );
        assert!(report.remesh.is_none());

        let axes = principal_axes(&report.mesh.positions()).unwrap();
        assert!(axes.primary().dot(&Vector3::y()).abs() > 1.0 - 1e-9);
        let (min, max) = report.mesh.bounds().unwrap();
        assert_relative_eq!(nalgebra::center(&min, &max).coords.norm(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_normalize_flips_inverted_face() {
        let normalizer = Normalizer::builder(NormalizeConfig::default())
            .detector(inverted_face())
            .build()
            .unwrap();
        let unflipped = Normalizer::builder(NormalizeConfig::default().with_orientation(false))
            .build()
            .unwrap()
            .normalize(tilted_ellipsoid())
            .unwrap();
        let flipped = normalizer.normalize(tilted_ellipsoid()).unwrap();

        assert_eq!(flipped.orientation, Some(OrientationOutcome::Flipped));
        assert_eq!(
            unflipped.orientation,
            Some(OrientationOutcome::Skipped {
                reason: SkipReason::Disabled
            })
        );
        for (a, b) in unflipped.mesh.vertices.iter().zip(&flipped.mesh.vertices) {
            assert_relative_eq!(b.position.x, -a.position.x, epsilon = 1e-9);
            assert_relative_eq!(b.position.y, a.position.y, epsilon = 1e-9);
            assert_relative_eq!(b.position.z, -a.position.z, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_normalize_upright_and_no_face() {
        let upright = Normalizer::builder(NormalizeConfig::default())
            .detector(upright_face())
            .build()
            .unwrap()
            .normalize(tilted_ellipsoid())
            .unwrap();
        assert_eq!(upright.orientation, Some(OrientationOutcome::Upright));

        let no_face = Normalizer::builder(NormalizeConfig::default())
            .detector(NoFaceDetector)
            .build()
            .unwrap()
            .normalize(tilted_ellipsoid())
            .unwrap();
        assert_eq!(
            no_face.orientation,
            Some(OrientationOutcome::Skipped {
                reason: SkipReason::NoFace
            })
        );

        let no_projector = Normalizer::builder(NormalizeConfig::default())
            .detector(upright_face())
            .without_projector()
            .build()
            .unwrap()
            .normalize(tilted_ellipsoid())
            .unwrap();
        assert_eq!(
            no_projector.orientation,
            Some(OrientationOutcome::Skipped {
                reason: SkipReason::NoProjector
            })
        );
    }

    #[test]
    fn test_normalize_with_remesh() {
        let config = NormalizeConfig::default().with_target_edge_length(Some(0.6));
        let report = Normalizer::new(config).unwrap().normalize(tilted_ellipsoid()).unwrap();

        assert_eq!(report.stage, PipelineStage::Remeshed);
        let summary = report.remesh.unwrap();
        assert_eq!(summary.final_triangles, report.mesh.face_count());
        assert!(report.mesh.check_well_formed().is_ok());
    }

    #[test]
    fn test_remesh_failure_surfaces() {
        let config = NormalizeConfig::default().with_target_edge_length(Some(1000.0));
        let err = Normalizer::new(config)
            .unwrap()
            .normalize(tilted_ellipsoid())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemeshFailed);
    }

    #[test]
    fn test_rejected_remesh_returns_centered_mesh() {
        let dir = tempfile::tempdir().unwrap();
        let centered = Pipeline::new(tilted_ellipsoid())
            .align(&Vector3::y(), RotationPivot::RestoreMean)
            .unwrap()
            .center(CenteringPolicy::BoundingBox)
            .unwrap();
        let before = centered.mesh().clone();

        let remesher = IsotropicRemesher::new(Default::default());
        let rejected = centered.try_remesh(&remesher, 1000.0).unwrap_err();
        assert_eq!(rejected.error().kind(), ErrorKind::RemeshFailed);
        assert_eq!(rejected.pipeline().stage(), PipelineStage::Centered);
        assert_eq!(rejected.pipeline().mesh(), &before);

        let output = dir.path().join("unremeshed.ply");
        let report = rejected.keep_unremeshed().save(&output).unwrap();
        assert_eq!(report.stage, PipelineStage::Exported);
        assert!(report.remesh.is_none());
        let fallback = report.remesh_fallback.unwrap();
        assert_eq!(fallback.code, "POSE-3001");
        assert_eq!(fallback.target_edge_length, 1000.0);
        assert_eq!(load_mesh(&output).unwrap().face_count(), before.face_count());
    }

    #[test]
    fn test_try_remesh_out_of_order_keeps_pipeline() {
        let remesher = IsotropicRemesher::new(Default::default());
        let rejected = Pipeline::new(tilted_ellipsoid())
            .try_remesh(&remesher, 0.5)
            .unwrap_err();
        assert!(matches!(
            rejected.error(),
            PoseError::StageOrder {
                current: PipelineStage::Loaded,
                requested: PipelineStage::Remeshed
            }
        ));
        assert_eq!(rejected.pipeline().stage(), PipelineStage::Loaded);
    }

    #[test]
    fn test_normalizer_keeps_unremeshed_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.stl");
        let output = dir.path().join("out.stl");
        crate::io::save_mesh(&tilted_ellipsoid(), &input).unwrap();

        let config = NormalizeConfig::default()
            .with_target_edge_length(Some(1000.0))
            .with_keep_unremeshed(true);
        let report = Normalizer::new(config)
            .unwrap()
            .process_file(&input, &output)
            .unwrap();

        assert_eq!(report.stage, PipelineStage::Exported);
        assert!(report.remesh.is_none());
        assert!(report.remesh_fallback.is_some());
        assert_eq!(report.mesh.face_count(), tilted_ellipsoid().face_count());
        assert!(output.exists());

        let (min, max) = report.mesh.bounds().unwrap();
        assert_relative_eq!((min.coords + max.coords).norm(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_degenerate_input_fails() {
        let line = Mesh::from_parts(
            (0..6).map(|i| Point3::new(i as f64, 2.0 * i as f64, 0.0)).collect(),
            vec![[0, 1, 2], [3, 4, 5]],
        );
        let err = Normalizer::new(NormalizeConfig::default())
            .unwrap()
            .normalize(line)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DegenerateGeometry);
    }

    #[test]
    fn test_invalid_config_rejected_at_build() {
        let config = NormalizeConfig::default().with_target_axis([0.0, 0.0, 0.0]);
        assert!(Normalizer::new(config).is_err());
    }

    #[test]
    fn test_process_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.ply");
        let output = dir.path().join("out").join("normalized.obj");
        crate::io::save_mesh(&tilted_ellipsoid(), &input).unwrap();

        let report = Normalizer::new(NormalizeConfig::default())
            .unwrap()
            .process_file(&input, &output)
            .unwrap();

        assert_eq!(report.stage, PipelineStage::Exported);
        assert!(report.operation_log[0].starts_with("Loaded"));
        let reloaded = load_mesh(&output).unwrap();
        assert_eq!(reloaded.face_count(), report.mesh.face_count());
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(PipelineStage::PcaAligned.to_string(), "pca_aligned");
        assert_eq!(PipelineStage::OrientationChecked.to_string(), "orientation_checked");
    }
}
