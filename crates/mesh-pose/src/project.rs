//! Orthographic grayscale rendering of a mesh for landmark detection.
//!
//! The image frame is fixed by a view direction and an "up" axis: up maps
//! to decreasing row index, so a face whose mouth lies toward `-up` renders
//! upright.

use image::{GrayImage, Luma};
use nalgebra::{Point2, Vector3};
use tracing::trace;

use crate::align::unit_axis;
use crate::error::PoseResult;
use crate::types::Mesh;

/// Renders a mesh into an image a [`LandmarkDetector`](crate::LandmarkDetector)
/// can consume.
pub trait MeshProjector: Send + Sync {
    /// Render `mesh`, or `None` if there is nothing to draw.
    fn project(&self, mesh: &Mesh) -> Option<GrayImage>;
}

/// Fraction of the image left empty on each side.
const MARGIN: f64 = 0.05;

/// Z-buffered orthographic renderer with headlight Lambertian shading.
#[derive(Debug, Clone)]
pub struct OrthographicProjector {
    resolution: u32,
    forward: Vector3<f64>,
    up: Vector3<f64>,
    right: Vector3<f64>,
}

impl OrthographicProjector {
    /// Square `resolution`×`resolution` view looking along `view_direction`
    /// with `up` at the top of the image.
    ///
    /// `up` is projected onto the image plane; if it is parallel to the view
    /// direction a perpendicular fallback is used.
    pub fn new(
        resolution: u32,
        view_direction: Vector3<f64>,
        up: Vector3<f64>,
    ) -> PoseResult<Self> {
        let forward = unit_axis(&view_direction)?.into_inner();
        let up = unit_axis(&up)?.into_inner();

        let mut screen_up = up - forward * forward.dot(&up);
        if screen_up.norm() < 1e-9 {
            let mut fallback = Vector3::zeros();
            fallback[forward.iamin()] = 1.0;
            screen_up = fallback - forward * forward.dot(&fallback);
        }
        let screen_up = screen_up.normalize();
        let right = forward.cross(&screen_up);

        Ok(Self {
            resolution: resolution.max(2),
            forward,
            up: screen_up,
            right,
        })
    }

    /// Image side length in pixels.
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Screen coordinates (x right, y up) and depth along the view.
    fn to_view(&self, p: &nalgebra::Point3<f64>) -> (f64, f64, f64) {
        let v = p.coords;
        (self.right.dot(&v), self.up.dot(&v), self.forward.dot(&v))
    }
}

impl MeshProjector for OrthographicProjector {
    fn project(&self, mesh: &Mesh) -> Option<GrayImage> {
        if mesh.is_empty() {
            return None;
        }

        let view: Vec<(f64, f64, f64)> = mesh
            .vertices
            .iter()
            .map(|v| self.to_view(&v.position))
            .collect();

        let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
        for &(x, y, _) in &view {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
        let extent = (max_x - min_x).max(max_y - min_y);
        if !extent.is_finite() || extent <= f64::EPSILON {
            return None;
        }

        let res = self.resolution as f64;
        let scale = (res - 1.0) * (1.0 - 2.0 * MARGIN) / extent;
        let (cx, cy) = ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);
        let half = (res - 1.0) / 2.0;

        let screen: Vec<(Point2<f64>, f64)> = view
            .iter()
            .map(|&(x, y, depth)| {
                let px = half + (x - cx) * scale;
                let py = half - (y - cy) * scale;
                (Point2::new(px, py), depth)
            })
            .collect();

        let size = self.resolution as usize;
        let mut depth_buffer = vec![f64::INFINITY; size * size];
        let mut image = GrayImage::from_pixel(self.resolution, self.resolution, Luma([0]));
        let mut covered = 0usize;

        for (face, triangle) in mesh.faces.iter().zip(mesh.triangles()) {
            let Some(normal) = triangle.normal() else {
                continue;
            };
            let shade = 0.15 + 0.85 * normal.dot(&self.forward).abs();
            let gray = (shade * 255.0).round().clamp(0.0, 255.0) as u8;

            let [(a, za), (b, zb), (c, zc)] = face.map(|i| screen[i as usize]);
            let area = edge(&a, &b, &c);
            if area.abs() < 1e-12 {
                continue;
            }

            let x0 = a.x.min(b.x).min(c.x).floor().max(0.0) as usize;
            let x1 = (a.x.max(b.x).max(c.x).ceil() as usize).min(size - 1);
            let y0 = a.y.min(b.y).min(c.y).floor().max(0.0) as usize;
            let y1 = (a.y.max(b.y).max(c.y).ceil() as usize).min(size - 1);

            for py in y0..=y1 {
                for px in x0..=x1 {
                    let p = Point2::new(px as f64, py as f64);
                    let w0 = edge(&b, &c, &p) / area;
                    let w1 = edge(&c, &a, &p) / area;
                    let w2 = 1.0 - w0 - w1;
                    if w0 < -1e-9 || w1 < -1e-9 || w2 < -1e-9 {
                        continue;
                    }

                    let depth = w0 * za + w1 * zb + w2 * zc;
                    let slot = &mut depth_buffer[py * size + px];
                    if depth < *slot {
                        if slot.is_infinite() {
                            covered += 1;
                        }
                        *slot = depth;
                        image.put_pixel(px as u32, py as u32, Luma([gray]));
                    }
                }
            }
        }

        trace!(
            target: "mesh_pose::project",
            resolution = self.resolution,
            covered_pixels = covered,
            "Rendered projection"
        );

        (covered > 0).then_some(image)
    }
}

/// Twice the signed area of triangle (a, b, p).
#[inline]
fn edge(a: &Point2<f64>, b: &Point2<f64>, p: &Point2<f64>) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    /// Square in the XY plane plus a small triangle near +Y.
    fn marker_mesh() -> Mesh {
        Mesh::from_parts(
            vec![
                Point3::new(-1.0, -1.0, 0.0),
                Point3::new(1.0, -1.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(-1.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn test_renders_square() {
        let projector =
            OrthographicProjector::new(64, -Vector3::z(), Vector3::y()).unwrap();
        let image = projector.project(&marker_mesh()).unwrap();
        assert_eq!(image.dimensions(), (64, 64));
        assert!(image.get_pixel(32, 32)[0] > 200);
        assert_eq!(image.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_up_axis_maps_to_top_rows() {
        // Triangle entirely at +Y should land in the upper half of the image.
        let mesh = Mesh::from_parts(
            vec![
                Point3::new(-1.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 2.0, 0.0),
                Point3::new(0.0, -2.0, 0.5),
            ],
            vec![[0, 1, 2]],
        );
        let projector =
            OrthographicProjector::new(64, -Vector3::z(), Vector3::y()).unwrap();
        let image = projector.project(&mesh).unwrap();

        let lit_rows: Vec<u32> = (0..64)
            .filter(|&y| (0..64).any(|x| image.get_pixel(x, y)[0] > 0))
            .collect();
        assert!(!lit_rows.is_empty());
        assert!(lit_rows.iter().all(|&y| y < 34));
    }

    #[test]
    fn test_nearest_surface_wins() {
        let mut mesh = marker_mesh();
        // A tilted square behind the first, seen along -Z from +Z.
        let base = mesh.vertex_count() as u32;
        mesh.vertices.extend(
            [
                Point3::new(-1.0, -1.0, -5.0),
                Point3::new(1.0, -1.0, -6.0),
                Point3::new(1.0, 1.0, -6.0),
                Point3::new(-1.0, 1.0, -5.0),
            ]
            .map(crate::Vertex::new),
        );
        mesh.faces.push([base, base + 1, base + 2]);
        mesh.faces.push([base, base + 2, base + 3]);

        let projector =
            OrthographicProjector::new(32, -Vector3::z(), Vector3::y()).unwrap();
        let image = projector.project(&mesh).unwrap();
        // The front square faces the camera head-on, so it is fully lit.
        assert_eq!(image.get_pixel(16, 16)[0], 255);
    }

    #[test]
    fn test_empty_and_flat_meshes_yield_none() {
        let projector =
            OrthographicProjector::new(32, -Vector3::z(), Vector3::y()).unwrap();
        assert!(projector.project(&Mesh::new()).is_none());

        let point = Mesh::from_parts(vec![Point3::new(1.0, 1.0, 1.0); 3], vec![[0, 1, 2]]);
        assert!(projector.project(&point).is_none());
    }

    #[test]
    fn test_up_parallel_to_view_falls_back() {
        let projector = OrthographicProjector::new(32, Vector3::y(), Vector3::y()).unwrap();
        assert!(projector.up.dot(&projector.forward).abs() < 1e-12);
        assert!(OrthographicProjector::new(32, Vector3::zeros(), Vector3::y()).is_err());
    }
}
