//! Translation of a vertex cloud to the origin.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which reference point ends up at the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CenteringPolicy {
    /// Midpoint of the axis-aligned bounding box.
    #[default]
    BoundingBox,
    /// Arithmetic mean of the vertices.
    Centroid,
}

impl CenteringPolicy {
    /// Reference point of `points` under this policy, `None` if empty.
    pub fn reference_point(&self, points: &[Point3<f64>]) -> Option<Point3<f64>> {
        let first = *points.first()?;
        match self {
            CenteringPolicy::BoundingBox => {
                let (min, max) = points[1..]
                    .iter()
                    .fold((first, first), |(min, max), p| (min.inf(p), max.sup(p)));
                Some(nalgebra::center(&min, &max))
            }
            CenteringPolicy::Centroid => {
                let sum = points
                    .iter()
                    .fold(Vector3::zeros(), |acc: Vector3<f64>, p| acc + p.coords);
                Some(Point3::from(sum / points.len() as f64))
            }
        }
    }
}

/// Translate `points` so the policy's reference point sits at the origin.
///
/// Returns the translated cloud and the offset that was applied. An empty
/// cloud comes back empty with a zero offset.
pub fn center(points: &[Point3<f64>], policy: CenteringPolicy) -> (Vec<Point3<f64>>, Vector3<f64>) {
    let Some(reference) = policy.reference_point(points) else {
        return (Vec::new(), Vector3::zeros());
    };
    let offset = -reference.coords;

    debug!(
        target: "mesh_pose::center",
        policy = ?policy,
        offset = ?[offset.x, offset.y, offset.z],
        "Centering vertex cloud"
    );

    (points.iter().map(|p| p + offset).collect(), offset)
}
