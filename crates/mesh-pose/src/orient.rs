//! Upside-down correction from facial landmarks.
//!
//! The mesh is rendered, a detector looks for a face, and if the mouth sits
//! above the eyes the whole cloud gets one half turn. There is no iteration
//! and no partial correction.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::align::{half_turn, rotate_about};
use crate::error::PoseResult;
use crate::landmarks::LandmarkDetector;
use crate::project::MeshProjector;
use crate::types::Mesh;

/// Axis of the corrective half turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipAxis {
    /// The configured target axis.
    #[default]
    AlignmentAxis,
    /// The projection direction; swaps top and bottom of the rendered view.
    ViewAxis,
}

/// Why the orientation check did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    NoProjector,
    NoDetector,
    EmptyProjection,
    NoFace,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SkipReason::Disabled => "disabled",
            SkipReason::NoProjector => "no projector",
            SkipReason::NoDetector => "no detector",
            SkipReason::EmptyProjection => "empty projection",
            SkipReason::NoFace => "no face found",
        };
        f.write_str(text)
    }
}

/// Result of the orientation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OrientationOutcome {
    /// Face found and already upright.
    Upright,
    /// Face found upside down and rotated.
    Flipped,
    /// Check skipped; the cloud is unchanged.
    Skipped { reason: SkipReason },
}

impl OrientationOutcome {
    /// Whether the cloud was rotated.
    pub fn flipped(&self) -> bool {
        matches!(self, OrientationOutcome::Flipped)
    }
}

impl std::fmt::Display for OrientationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrientationOutcome::Upright => f.write_str("upright"),
            OrientationOutcome::Flipped => f.write_str("flipped"),
            OrientationOutcome::Skipped { reason } => write!(f, "skipped ({})", reason),
        }
    }
}

/// Check `mesh` and return its (possibly rotated) vertex cloud.
///
/// The half turn is about `flip_axis` through the origin, so a centered
/// cloud stays centered. Missing collaborators, an empty render, or no
/// detected face leave the cloud unchanged.
///
/// # Errors
///
/// [`PoseError::InvalidAxis`](crate::PoseError::InvalidAxis) for a zero or
/// non-finite `flip_axis`.
pub fn correct_orientation(
    mesh: &Mesh,
    projector: Option<&dyn MeshProjector>,
    detector: Option<&dyn LandmarkDetector>,
    flip_axis: &Vector3<f64>,
) -> PoseResult<(Vec<Point3<f64>>, OrientationOutcome)> {
    let points = mesh.positions();

    let skip = |reason: SkipReason| {
        debug!(target: "mesh_pose::orientation", %reason, "Orientation check skipped");
        OrientationOutcome::Skipped { reason }
    };

    let Some(projector) = projector else {
        return Ok((points, skip(SkipReason::NoProjector)));
    };
    let Some(detector) = detector else {
        return Ok((points, skip(SkipReason::NoDetector)));
    };
    let Some(image) = projector.project(mesh) else {
        return Ok((points, skip(SkipReason::EmptyProjection)));
    };
    let Some(landmarks) = detector.detect(&image) else {
        return Ok((points, skip(SkipReason::NoFace)));
    };

    if !landmarks.is_upside_down() {
        debug!(target: "mesh_pose::orientation", "Face is upright");
        return Ok((points, OrientationOutcome::Upright));
    }

    let rotation = half_turn(flip_axis)?;
    info!(
        target: "mesh_pose::orientation",
        axis = ?[flip_axis.x, flip_axis.y, flip_axis.z],
        "Face is upside down, applying half turn"
    );
    Ok((
        rotate_about(&points, &rotation, &Point3::origin()),
        OrientationOutcome::Flipped,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{FixedLandmarks, LandmarkSet, NoFaceDetector};
    use crate::project::OrthographicProjector;
    use approx::assert_relative_eq;
    use nalgebra::Point2;

    fn slab() -> Mesh {
        Mesh::from_parts(
            vec![
                Point3::new(-1.0, -2.0, 0.5),
                Point3::new(1.0, -2.0, 0.5),
                Point3::new(1.0, 2.0, -0.5),
                Point3::new(-1.0, 2.0, -0.5),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    fn projector() -> OrthographicProjector {
        OrthographicProjector::new(64, -Vector3::z(), Vector3::y()).unwrap()
    }

    fn upright() -> LandmarkSet {
        LandmarkSet::upright_template(Point2::new(32.0, 32.0), 10.0)
    }

    #[test]
    fn test_upright_face_is_unchanged() {
        let mesh = slab();
        let detector = FixedLandmarks(upright());
        let (points, outcome) =
            correct_orientation(&mesh, Some(&projector()), Some(&detector), &Vector3::y())
                .unwrap();
        assert_eq!(outcome, OrientationOutcome::Upright);
        assert_eq!(points, mesh.positions());
    }

    #[test]
    fn test_inverted_face_is_rotated_about_axis() {
        let mesh = slab();
        let detector = FixedLandmarks(upright().mirrored_vertically(64.0));
        let (points, outcome) =
            correct_orientation(&mesh, Some(&projector()), Some(&detector), &Vector3::y())
                .unwrap();
        assert_eq!(outcome, OrientationOutcome::Flipped);
        for (before, after) in mesh.positions().iter().zip(&points) {
            assert_relative_eq!(after.x, -before.x, epsilon = 1e-12);
            assert_relative_eq!(after.y, before.y, epsilon = 1e-12);
            assert_relative_eq!(after.z, -before.z, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_view_axis_flip_swaps_top_and_bottom() {
        let mesh = slab();
        let detector = FixedLandmarks(upright().mirrored_vertically(64.0));
        let (points, _) =
            correct_orientation(&mesh, Some(&projector()), Some(&detector), &Vector3::z())
                .unwrap();
        assert_relative_eq!(points[0].y, 2.0, epsilon = 1e-12);
        assert_relative_eq!(points[0].z, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_skips() {
        let mesh = slab();
        let p = projector();

        let (_, outcome) =
            correct_orientation(&mesh, None, Some(&NoFaceDetector), &Vector3::y()).unwrap();
        assert_eq!(
            outcome,
            OrientationOutcome::Skipped {
                reason: SkipReason::NoProjector
            }
        );

        let (_, outcome) = correct_orientation(&mesh, Some(&p), None, &Vector3::y()).unwrap();
        assert_eq!(
            outcome,
            OrientationOutcome::Skipped {
                reason: SkipReason::NoDetector
            }
        );

        let (points, outcome) =
            correct_orientation(&mesh, Some(&p), Some(&NoFaceDetector), &Vector3::y()).unwrap();
        assert_eq!(
            outcome,
            OrientationOutcome::Skipped {
                reason: SkipReason::NoFace
            }
        );
        assert_eq!(points, mesh.positions());
        assert!(!outcome.flipped());
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(OrientationOutcome::Flipped.to_string(), "flipped");
        let skipped = OrientationOutcome::Skipped {
            reason: SkipReason::NoFace,
        };
        assert_eq!(skipped.to_string(), "skipped (no face found)");
    }
}
