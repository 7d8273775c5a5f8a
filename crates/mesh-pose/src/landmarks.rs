//! Facial landmarks in the 68-point layout and the detector seam.
//!
//! Image coordinates: x grows to the right, y grows downward.

use std::ops::Range;

use image::GrayImage;
use nalgebra::Point2;

use crate::error::{PoseError, PoseResult};

/// Number of points in a landmark set.
pub const LANDMARK_COUNT: usize = 68;

/// Indices of the left-eye contour.
pub const LEFT_EYE: Range<usize> = 36..42;

/// Indices of the right-eye contour.
pub const RIGHT_EYE: Range<usize> = 42..48;

/// Indices of the outer and inner lip contours.
pub const MOUTH: Range<usize> = 48..68;

/// Exactly 68 ordered 2D landmarks.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Point2<f64>>,
}

impl LandmarkSet {
    /// Wrap a detector's output.
    ///
    /// # Errors
    ///
    /// [`PoseError::InvalidLandmarks`] unless exactly 68 points are given.
    pub fn new(points: Vec<Point2<f64>>) -> PoseResult<Self> {
        if points.len() != LANDMARK_COUNT {
            return Err(PoseError::InvalidLandmarks {
                expected: LANDMARK_COUNT,
                actual: points.len(),
            });
        }
        Ok(Self { points })
    }

    /// Same as [`LandmarkSet::new`] from a slice.
    pub fn from_slice(points: &[Point2<f64>]) -> PoseResult<Self> {
        Self::new(points.to_vec())
    }

    /// All 68 points.
    pub fn points(&self) -> &[Point2<f64>] {
        &self.points
    }

    /// Points 36 to 41, the left-eye contour.
    pub fn left_eye(&self) -> &[Point2<f64>] {
        &self.points[LEFT_EYE]
    }

    /// Points 42 to 47, the right-eye contour.
    pub fn right_eye(&self) -> &[Point2<f64>] {
        &self.points[RIGHT_EYE]
    }

    /// Points 48 to 67, outer and inner lip contours.
    pub fn mouth(&self) -> &[Point2<f64>] {
        &self.points[MOUTH]
    }

    /// Mean image-y over an index range.
    pub fn mean_y(&self, range: Range<usize>) -> f64 {
        let len = range.len() as f64;
        self.points[range].iter().map(|p| p.y).sum::<f64>() / len
    }

    /// Whether the mouth sits above the eyes in image coordinates.
    ///
    /// Compares the mouth's mean y with the midpoint of the two eye means.
    /// A heuristic, not a classifier: tilted or partial faces can fool it.
    pub fn is_upside_down(&self) -> bool {
        let eyes = (self.mean_y(LEFT_EYE) + self.mean_y(RIGHT_EYE)) / 2.0;
        self.mean_y(MOUTH) < eyes
    }

    /// Reflect every point across the horizontal line `y = height / 2`.
    pub fn mirrored_vertically(&self, height: f64) -> Self {
        Self {
            points: self
                .points
                .iter()
                .map(|p| Point2::new(p.x, height - p.y))
                .collect(),
        }
    }

    /// A schematic upright face centered at `center` with eye spacing
    /// `scale`.
    ///
    /// Jaw 0..17, brows 17..27, nose 27..36, eyes and mouth per the region
    /// constants. Useful as a stand-in detector result.
    pub fn upright_template(center: Point2<f64>, scale: f64) -> Self {
        let mut points = Vec::with_capacity(LANDMARK_COUNT);
        let at = |dx: f64, dy: f64| Point2::new(center.x + dx * scale, center.y + dy * scale);

        for i in 0..17 {
            let t = std::f64::consts::PI * i as f64 / 16.0;
            points.push(at(-t.cos(), 0.2 + 0.8 * t.sin()));
        }
        for i in 0..10 {
            let side = if i < 5 { -1.0 } else { 1.0 };
            let k = (i % 5) as f64;
            points.push(at(side * (0.2 + 0.12 * k), -0.55));
        }
        for i in 0..9 {
            let t = i as f64 / 8.0;
            points.push(at(0.0, -0.3 + 0.5 * t));
        }
        for cx in [-0.4, 0.4] {
            for i in 0..6 {
                let t = std::f64::consts::TAU * i as f64 / 6.0;
                points.push(at(cx + 0.12 * t.cos(), -0.35 + 0.05 * t.sin()));
            }
        }
        for i in 0..20 {
            let t = std::f64::consts::TAU * i as f64 / 20.0;
            let r = if i < 12 { 0.3 } else { 0.18 };
            points.push(at(r * t.cos(), 0.5 + 0.08 * t.sin()));
        }

        Self { points }
    }
}

/// Finds 68 facial landmarks in a grayscale image.
///
/// Implementations hold read-only model state; any per-call buffers are
/// allocated inside [`detect`](LandmarkDetector::detect).
pub trait LandmarkDetector: Send + Sync {
    /// Landmarks of the most prominent face, or `None` if no face is found.
    fn detect(&self, image: &GrayImage) -> Option<LandmarkSet>;
}

impl<F> LandmarkDetector for F
where
    F: Fn(&GrayImage) -> Option<LandmarkSet> + Send + Sync,
{
    fn detect(&self, image: &GrayImage) -> Option<LandmarkSet> {
        self(image)
    }
}

/// Detector that never finds a face.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFaceDetector;

impl LandmarkDetector for NoFaceDetector {
    fn detect(&self, _image: &GrayImage) -> Option<LandmarkSet> {
        None
    }
}

/// Detector that always reports the same landmarks.
#[derive(Debug, Clone)]
pub struct FixedLandmarks(pub LandmarkSet);

impl LandmarkDetector for FixedLandmarks {
    fn detect(&self, _image: &GrayImage) -> Option<LandmarkSet> {
        Some(self.0.clone())
    }
}
