//! Principal axes of a vertex cloud.
//!
//! The axes are recomputed from whatever cloud is passed in; nothing is
//! cached between stages.

use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};
use tracing::{debug, trace};

use crate::error::{PoseError, PoseResult};

/// Eigenvalues at or below `RANK_TOLERANCE * largest` count as zero.
pub const RANK_TOLERANCE: f64 = 1e-10;

/// Principal axes of a point cloud, sorted by variance (largest first).
#[derive(Debug, Clone, PartialEq)]
pub struct PrincipalAxes {
    /// Mean of the cloud.
    pub mean: Point3<f64>,
    /// Orthonormal, right-handed axes. `axes[0]` is the direction of maximum
    /// variance.
    pub axes: [Vector3<f64>; 3],
    /// Variances along each axis, descending.
    pub eigenvalues: [f64; 3],
}

impl PrincipalAxes {
    /// Direction of maximum variance.
    #[must_use]
    pub fn primary(&self) -> Vector3<f64> {
        self.axes[0]
    }

    /// Direction of second-most variance.
    #[must_use]
    pub fn secondary(&self) -> Vector3<f64> {
        self.axes[1]
    }

    /// Direction of minimum variance.
    #[must_use]
    pub fn tertiary(&self) -> Vector3<f64> {
        self.axes[2]
    }

    /// Ratio of the largest to the second-largest variance.
    ///
    /// Values near 1 mean the primary direction is only weakly defined.
    #[must_use]
    pub fn elongation(&self) -> f64 {
        self.eigenvalues[0] / self.eigenvalues[1]
    }
}

/// Compute the principal axes of `points`.
///
/// # Errors
///
/// [`PoseError::DegenerateGeometry`] when fewer than three points are given,
/// a coordinate is not finite, or the covariance has fewer than three
/// eigenvalues above [`RANK_TOLERANCE`] relative to the largest (coincident,
/// collinear or planar clouds).
pub fn principal_axes(points: &[Point3<f64>]) -> PoseResult<PrincipalAxes> {
    if points.len() < 3 {
        return Err(PoseError::degenerate_geometry(format!(
            "need at least 3 points for principal axes, got {}",
            points.len()
        )));
    }

    let count = points.len() as f64;
    let mean = Point3::from(
        points
            .iter()
            .fold(Vector3::zeros(), |acc: Vector3<f64>, p| acc + p.coords)
            / count,
    );

    let mut covariance = Matrix3::zeros();
    for p in points {
        let d = p - mean;
        covariance += d * d.transpose();
    }
    covariance /= count;

    if covariance.iter().any(|c| !c.is_finite()) {
        return Err(PoseError::degenerate_geometry(
            "covariance is not finite; the cloud has NaN or infinite coordinates",
        ));
    }

    let eigen = SymmetricEigen::new(covariance);

    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .partial_cmp(&eigen.eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let eigenvalues = order.map(|i| eigen.eigenvalues[i]);

    trace!(
        target: "mesh_pose::pca",
        l0 = eigenvalues[0],
        l1 = eigenvalues[1],
        l2 = eigenvalues[2],
        "Covariance eigenvalues"
    );

    let largest = eigenvalues[0];
    let rank = eigenvalues
        .iter()
        .filter(|&&l| largest > 0.0 && l > RANK_TOLERANCE * largest)
        .count();
    if rank < 3 {
        return Err(PoseError::degenerate_geometry(format!(
            "covariance has rank {} (eigenvalues {:.3e}, {:.3e}, {:.3e})",
            rank, eigenvalues[0], eigenvalues[1], eigenvalues[2]
        )));
    }

    let primary = canonical_sign(eigen.eigenvectors.column(order[0]).normalize());
    let secondary = canonical_sign(eigen.eigenvectors.column(order[1]).normalize());
    let tertiary = primary.cross(&secondary);

    debug!(
        target: "mesh_pose::pca",
        points = points.len(),
        primary = ?[primary.x, primary.y, primary.z],
        elongation = eigenvalues[0] / eigenvalues[1],
        "Computed principal axes"
    );

    Ok(PrincipalAxes {
        mean,
        axes: [primary, secondary, tertiary],
        eigenvalues,
    })
}

/// Flip `v` so its largest-magnitude component is positive.
fn canonical_sign(v: Vector3<f64>) -> Vector3<f64> {
    if v[v.iamax()] < 0.0 { -v } else { v }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn box_corners(sx: f64, sy: f64, sz: f64) -> Vec<Point3<f64>> {
        let mut points = Vec::new();
        for &x in &[-sx, sx] {
            for &y in &[-sy, sy] {
                for &z in &[-sz, sz] {
                    points.push(Point3::new(x, y, z));
                }
            }
        }
        points
    }

    #[test]
    fn test_axes_follow_extent() {
        let points: Vec<_> = box_corners(10.0, 3.0, 1.0)
            .into_iter()
            .map(|p| p + Vector3::new(5.0, -2.0, 7.0))
            .collect();
        let pca = principal_axes(&points).unwrap();

        assert_relative_eq!(pca.mean, Point3::new(5.0, -2.0, 7.0), epsilon = 1e-12);
        assert_relative_eq!(pca.primary().x.abs(), 1.0, epsilon = 1e-10);
        assert_relative_eq!(pca.secondary().y.abs(), 1.0, epsilon = 1e-10);
        assert_relative_eq!(pca.tertiary().z.abs(), 1.0, epsilon = 1e-10);
        assert!(pca.eigenvalues[0] > pca.eigenvalues[1]);
        assert!(pca.eigenvalues[1] > pca.eigenvalues[2]);
    }

    #[test]
    fn test_axes_are_orthonormal_and_right_handed() {
        let points = vec![
            Point3::new(1.0, 2.0, 0.5),
            Point3::new(-3.0, 0.1, 2.0),
            Point3::new(4.0, -1.0, -1.0),
            Point3::new(0.2, 5.0, 0.0),
            Point3::new(-2.0, -3.0, 1.5),
        ];
        let pca = principal_axes(&points).unwrap();
        for (i, a) in pca.axes.iter().enumerate() {
            assert_relative_eq!(a.norm(), 1.0, epsilon = 1e-10);
            for b in &pca.axes[i + 1..] {
                assert_relative_eq!(a.dot(b), 0.0, epsilon = 1e-10);
            }
        }
        assert_relative_eq!(
            pca.axes[0].cross(&pca.axes[1]).dot(&pca.axes[2]),
            1.0,
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_collinear_is_degenerate() {
        let points: Vec<_> = (0..10)
            .map(|i| Point3::new(i as f64, 2.0 * i as f64, -(i as f64)))
            .collect();
        assert!(matches!(
            principal_axes(&points),
            Err(PoseError::DegenerateGeometry { .. })
        ));
    }

    #[test]
    fn test_planar_is_degenerate() {
        let points = box_corners(4.0, 2.0, 0.0);
        assert!(matches!(
            principal_axes(&points),
            Err(PoseError::DegenerateGeometry { .. })
        ));
    }

    #[test]
    fn test_coincident_and_too_few_points() {
        let same = vec![Point3::new(1.0, 1.0, 1.0); 5];
        assert!(principal_axes(&same).is_err());
        assert!(principal_axes(&[Point3::origin(), Point3::new(1.0, 0.0, 0.0)]).is_err());
        assert!(principal_axes(&[]).is_err());
    }

    #[test]
    fn test_sign_is_deterministic() {
        let points = box_corners(10.0, 3.0, 1.0);
        let a = principal_axes(&points).unwrap();
        let reversed: Vec<_> = points.iter().rev().copied().collect();
        let b = principal_axes(&reversed).unwrap();
        assert_relative_eq!(a.primary(), b.primary(), epsilon = 1e-10);
        assert!(a.primary().x > 0.0);
    }
}
