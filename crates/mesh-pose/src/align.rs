//! Axis alignment of a vertex cloud.
//!
//! The rotation that maps the first principal direction onto the target axis
//! is built with the Rodrigues formula. When source and target are (anti-)
//! parallel the cross product vanishes, so both cases are handled before the
//! general formula. Near the anti-parallel case the rotation is assembled
//! from a small turn onto `-target` and a half turn, which keeps full
//! precision where `1 + c` cancels.

use nalgebra::{Matrix3, Point3, Rotation3, Unit, Vector3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PoseError, PoseResult};
use crate::pca::{PrincipalAxes, principal_axes};

/// `|source × target|` below this is treated as parallel.
pub const PARALLEL_EPSILON: f64 = 1e-12;

/// Where the rotated cloud ends up relative to its mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationPivot {
    /// Rotate about the mean and add it back; the mean does not move.
    #[default]
    RestoreMean,
    /// Rotate the mean-centered cloud and leave it there.
    OriginAtMean,
}

/// Output of [`align_to_axis`].
#[derive(Debug, Clone)]
pub struct Alignment {
    /// Rotated cloud, index-aligned with the input.
    pub points: Vec<Point3<f64>>,
    /// Rotation that was applied.
    pub rotation: Rotation3<f64>,
    /// Principal axes of the input cloud.
    pub axes: PrincipalAxes,
}

/// Validate and normalize a direction vector.
pub fn unit_axis(axis: &Vector3<f64>) -> PoseResult<Unit<Vector3<f64>>> {
    let raw = [axis.x, axis.y, axis.z];
    if raw.iter().any(|c| !c.is_finite()) {
        return Err(PoseError::invalid_axis(raw, "axis has non-finite components"));
    }
    Unit::try_new(*axis, PARALLEL_EPSILON)
        .ok_or_else(|| PoseError::invalid_axis(raw, "axis has zero length"))
}

/// Rotation taking the direction of `source` onto the direction of `target`.
///
/// # Errors
///
/// [`PoseError::InvalidAxis`] if either vector is zero or not finite.
pub fn rotation_between(
    source: &Vector3<f64>,
    target: &Vector3<f64>,
) -> PoseResult<Rotation3<f64>> {
    let a = unit_axis(source)?.into_inner();
    let b = unit_axis(target)?.into_inner();

    let v = a.cross(&b);
    let c = a.dot(&b);
    let s = v.norm();

    if s < PARALLEL_EPSILON {
        return Ok(if c > 0.0 {
            Rotation3::identity()
        } else {
            half_turn_orthogonal_to(&a)
        });
    }

    if c >= 0.0 {
        return Ok(rodrigues(&v, c));
    }

    // a is close to -b: turn a onto -b, then flip -b onto b.
    let onto_negated = rodrigues(&a.cross(&-b), -c);
    Ok(half_turn_orthogonal_to(&b) * onto_negated)
}

/// `I + K + K²·(1 − c)/s²` with `K = [v]ₓ`, written as `1 / (1 + c)`.
///
/// Only called with `c ≥ 0`, where the denominator is in `[1, 2]`.
fn rodrigues(v: &Vector3<f64>, c: f64) -> Rotation3<f64> {
    let k = v.cross_matrix();
    let r = Matrix3::identity() + k + k * k / (1.0 + c);
    Rotation3::from_matrix_unchecked(r)
}

/// Half turn about an axis orthogonal to the unit vector `v`.
fn half_turn_orthogonal_to(v: &Vector3<f64>) -> Rotation3<f64> {
    let u = v.cross(&least_aligned_basis(v)).normalize();
    Rotation3::from_matrix_unchecked(2.0 * u * u.transpose() - Matrix3::identity())
}

/// Half turn about `axis`.
pub fn half_turn(axis: &Vector3<f64>) -> PoseResult<Rotation3<f64>> {
    let axis = unit_axis(axis)?;
    Ok(Rotation3::from_axis_angle(&axis, std::f64::consts::PI))
}

/// Rotate every point about `pivot`.
pub fn rotate_about(
    points: &[Point3<f64>],
    rotation: &Rotation3<f64>,
    pivot: &Point3<f64>,
) -> Vec<Point3<f64>> {
    points
        .iter()
        .map(|p| pivot + rotation * (p - pivot))
        .collect()
}

/// Rotate `points` so their first principal direction lies along `target`.
///
/// With [`RotationPivot::RestoreMean`] the rotation is about the cloud mean,
/// which stays where it was. With [`RotationPivot::OriginAtMean`] the cloud
/// is left centered on the origin.
///
/// # Errors
///
/// [`PoseError::DegenerateGeometry`] if the principal axes are undefined,
/// [`PoseError::InvalidAxis`] for a zero or non-finite `target`.
pub fn align_to_axis(
    points: &[Point3<f64>],
    target: &Vector3<f64>,
    pivot: RotationPivot,
) -> PoseResult<Alignment> {
    unit_axis(target)?;
    let axes = principal_axes(points)?;
    let rotation = rotation_between(&axes.primary(), target)?;

    let rotated = rotate_about(points, &rotation, &axes.mean);
    let points = match pivot {
        RotationPivot::RestoreMean => rotated,
        RotationPivot::OriginAtMean => rotated.into_iter().map(|p| p - axes.mean.coords).collect(),
    };

    debug!(
        target: "mesh_pose::align",
        angle_deg = rotation.angle().to_degrees(),
        pivot = ?pivot,
        "Aligned primary axis"
    );

    Ok(Alignment {
        points,
        rotation,
        axes,
    })
}

/// Standard basis vector with the smallest component along `v`.
fn least_aligned_basis(v: &Vector3<f64>) -> Vector3<f64> {
    let mut basis = Vector3::zeros();
    basis[v.iamin()] = 1.0;
    basis
}
