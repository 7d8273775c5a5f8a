//! Property-based tests for pose operations.
//!
//! Run with: cargo test -p mesh-pose -- proptest

use mesh_pose::{
    CenteringPolicy, RotationPivot, align_to_axis, center, principal_axes, rotation_between,
};
use nalgebra::{Matrix3, Point3, Vector3};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

/// A direction that is safely away from zero length.
fn arb_direction() -> impl Strategy<Value = Vector3<f64>> {
    prop::array::uniform3(-10.0..10.0f64)
        .prop_filter("non-zero direction", |v| {
            Vector3::new(v[0], v[1], v[2]).norm() > 1e-3
        })
        .prop_map(|[x, y, z]| Vector3::new(x, y, z))
}

/// Random cloud with a clearly dominant direction.
///
/// Points are spread along three orthogonal axes with well separated
/// extents, then rotated and translated.
fn arb_elongated_cloud() -> impl Strategy<Value = Vec<Point3<f64>>> {
    (
        prop::collection::vec(prop::array::uniform3(-1.0..1.0f64), 24..80),
        arb_direction(),
        -3.0..3.0f64,
        prop::array::uniform3(-50.0..50.0f64),
    )
        .prop_map(|(samples, axis, angle, offset)| {
            let rotation = nalgebra::Rotation3::from_axis_angle(
                &nalgebra::Unit::new_normalize(axis),
                angle,
            );
            let offset = Vector3::from(offset);
            let mut points: Vec<Point3<f64>> = samples
                .iter()
                .map(|[a, b, c]| Point3::new(10.0 * a, 3.0 * b, *c))
                .collect();
            // Pin the extremes so the spread never collapses.
            points.extend([
                Point3::new(10.0, 0.0, 0.0),
                Point3::new(-10.0, 0.0, 0.0),
                Point3::new(0.0, 3.0, 0.0),
                Point3::new(0.0, -3.0, 0.0),
                Point3::new(0.0, 0.0, 1.0),
                Point3::new(0.0, 0.0, -1.0),
            ]);
            points
                .into_iter()
                .map(|p| rotation * p + offset)
                .collect()
        })
}

/// Unit pair `(a, b)` with `b` within `10^exp` of `-a`, `exp` in `[-13, -3)`.
fn arb_nearly_opposite() -> impl Strategy<Value = (Vector3<f64>, Vector3<f64>)> {
    (arb_direction(), arb_direction(), -13.0..-3.0f64)
        .prop_filter("directions not parallel", |(a, other, _)| {
            a.normalize().cross(&other.normalize()).norm() > 1e-3
        })
        .prop_map(|(a, other, exp)| {
            let a = a.normalize();
            let perp = a.cross(&other).normalize();
            (a, (-a + perp * 10f64.powf(exp)).normalize())
        })
}

fn arb_cloud() -> impl Strategy<Value = Vec<Point3<f64>>> {
    prop::collection::vec(prop::array::uniform3(-100.0..100.0f64), 1..60)
        .prop_map(|pts| pts.into_iter().map(Point3::from).collect())
}

// =============================================================================
// Rotation
// =============================================================================

proptest! {
    #[test]
    fn proptest_rotation_is_orthonormal(a in arb_direction(), b in arb_direction()) {
        let r = rotation_between(&a, &b).unwrap();
        let m = r.matrix();
        let should_be_identity = m.transpose() * m;
        prop_assert!((should_be_identity - Matrix3::identity()).norm() < 1e-9);
        prop_assert!((m.determinant() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn proptest_rotation_maps_source_onto_target(a in arb_direction(), b in arb_direction()) {
        let r = rotation_between(&a, &b).unwrap();
        let mapped = r * a.normalize();
        prop_assert!((mapped - b.normalize()).norm() < 1e-9);
    }

    #[test]
    fn proptest_nearly_opposite_rotation_is_exact((a, b) in arb_nearly_opposite()) {
        let r = rotation_between(&a, &b).unwrap();
        prop_assert!((r * a - b).norm() < 1e-11);
        prop_assert!((r.matrix().transpose() * r.matrix() - Matrix3::identity()).norm() < 1e-9);
    }

    #[test]
    fn proptest_antiparallel_rotation(a in arb_direction()) {
        let r = rotation_between(&a, &(-a)).unwrap();
        prop_assert!((r * a.normalize() + a.normalize()).norm() < 1e-9);
        prop_assert!((r.matrix().determinant() - 1.0).abs() < 1e-9);
    }
}

// =============================================================================
// Centering
// =============================================================================

proptest! {
    #[test]
    fn proptest_bbox_centering_is_idempotent(points in arb_cloud()) {
        let (once, _) = center(&points, CenteringPolicy::BoundingBox);
        let (twice, offset) = center(&once, CenteringPolicy::BoundingBox);
        prop_assert!(offset.norm() < 1e-9);
        for (a, b) in once.iter().zip(&twice) {
            prop_assert!((a - b).norm() < 1e-9);
        }
    }

    #[test]
    fn proptest_centroid_centering_zeroes_mean(points in arb_cloud()) {
        let (centered, _) = center(&points, CenteringPolicy::Centroid);
        let mean = centered.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords)
            / centered.len() as f64;
        prop_assert!(mean.norm() < 1e-9);
    }

    #[test]
    fn proptest_centering_preserves_shape(points in arb_cloud()) {
        let (centered, offset) = center(&points, CenteringPolicy::BoundingBox);
        prop_assert_eq!(centered.len(), points.len());
        for (before, after) in points.iter().zip(&centered) {
            prop_assert!((after - (before + offset)).norm() < 1e-12);
        }
    }
}

// =============================================================================
// Alignment
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn proptest_alignment_puts_primary_on_target(
        points in arb_elongated_cloud(),
        target in arb_direction(),
    ) {
        let aligned = align_to_axis(&points, &target, RotationPivot::RestoreMean).unwrap();
        let axes = principal_axes(&aligned.points).unwrap();
        let angle = axes.primary().angle(&target);
        let off_axis = angle.min(std::f64::consts::PI - angle);
        prop_assert!(off_axis < 1e-6, "primary axis is {} rad off target", off_axis);
    }

    #[test]
    fn proptest_restore_mean_keeps_mean(points in arb_elongated_cloud()) {
        let before = principal_axes(&points).unwrap().mean;
        let aligned = align_to_axis(&points, &Vector3::y(), RotationPivot::RestoreMean).unwrap();
        let after = principal_axes(&aligned.points).unwrap().mean;
        prop_assert!((before - after).norm() < 1e-9);
    }

    #[test]
    fn proptest_alignment_preserves_distances(points in arb_elongated_cloud()) {
        let aligned = align_to_axis(&points, &Vector3::z(), RotationPivot::OriginAtMean).unwrap();
        for i in 1..points.len() {
            let d_before = (points[i] - points[0]).norm();
            let d_after = (aligned.points[i] - aligned.points[0]).norm();
            prop_assert!((d_before - d_after).abs() < 1e-9);
        }
    }
}
