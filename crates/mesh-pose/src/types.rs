//! Core mesh data types.
//!
//! A [`Mesh`] is a vertex cloud plus a triangle table. The pose stages only
//! ever replace the vertex positions wholesale through
//! [`Mesh::replace_positions`]; the face table is left alone until the
//! remesher produces a new mesh.

use nalgebra::{Point3, Vector3};

use crate::error::{PoseError, PoseResult};

/// One scanned point.
///
/// Coordinates are whatever unit the scanner exported (usually millimeters);
/// the library is unit-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    /// Position in scanner space until the pose stages move it.
    pub position: Point3<f64>,

    /// Unit normal vector, if the source file carried one.
    pub normal: Option<Vector3<f64>>,
}

impl Vertex {
    /// Vertex at `position` without a normal.
    #[inline]
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            normal: None,
        }
    }

    /// Shorthand for `Vertex::new(Point3::new(x, y, z))`.
    #[inline]
    pub fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }
}

/// Indexed triangle surface produced by a scanner or the remesher.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Vertex table.
    pub vertices: Vec<Vertex>,

    /// Index triples into `vertices`, wound counter-clockwise seen from outside.
    pub faces: Vec<[u32; 3]>,
}

impl Mesh {
    /// Mesh with no vertices and no faces.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty mesh with room reserved for the given table sizes.
    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
        }
    }

    /// Build a mesh from a position table and a face table.
    pub fn from_parts(positions: Vec<Point3<f64>>, faces: Vec<[u32; 3]>) -> Self {
        Self {
            vertices: positions.into_iter().map(Vertex::new).collect(),
            faces,
        }
    }

    /// Length of the vertex table.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Length of the face table.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// True when either table is empty; such a mesh cannot be posed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// The vertex cloud, index-aligned with the face table.
    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.vertices.iter().map(|v| v.position).collect()
    }

    /// Replace every vertex position, keeping order and connectivity.
    ///
    /// Stored normals are dropped since they no longer match the geometry.
    pub fn replace_positions(&mut self, positions: Vec<Point3<f64>>) -> PoseResult<()> {
        if positions.len() != self.vertices.len() {
            return Err(PoseError::VertexCountMismatch {
                expected: self.vertices.len(),
                actual: positions.len(),
            });
        }

        for (vertex, position) in self.vertices.iter_mut().zip(positions) {
            vertex.position = position;
            vertex.normal = None;
        }
        Ok(())
    }

    /// Lower and upper corners of the axis-aligned box around all vertices.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.vertices.first()?.position;
        let (min, max) = self.vertices[1..]
            .iter()
            .fold((first, first), |(min, max), v| {
                (min.inf(&v.position), max.sup(&v.position))
            });
        Some((min, max))
    }

    /// Length of the bounding-box diagonal, or 0 for an empty mesh.
    pub fn bbox_diagonal(&self) -> f64 {
        self.bounds()
            .map(|(min, max)| (max - min).norm())
            .unwrap_or(0.0)
    }

    /// Arithmetic mean of the vertex positions.
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.vertices.is_empty() {
            return None;
        }
        let sum = self
            .vertices
            .iter()
            .fold(Vector3::zeros(), |acc, v| acc + v.position.coords);
        Some(Point3::from(sum / self.vertices.len() as f64))
    }

    /// Faces resolved to their corner positions.
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.faces.iter().map(|&[i0, i1, i2]| Triangle {
            v0: self.vertices[i0 as usize].position,
            v1: self.vertices[i1 as usize].position,
            v2: self.vertices[i2 as usize].position,
        })
    }

    /// Sum of triangle areas.
    pub fn surface_area(&self) -> f64 {
        self.triangles().map(|t| t.area()).sum()
    }

    /// Mean edge length over all face edges (shared edges counted twice).
    pub fn mean_edge_length(&self) -> f64 {
        if self.faces.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .triangles()
            .map(|t| t.edge_lengths().iter().sum::<f64>())
            .sum();
        total / (self.faces.len() * 3) as f64
    }

    /// Check that the mesh is usable as pipeline input.
    ///
    /// Rejects meshes with no vertices or faces, faces with out-of-range
    /// indices, and NaN/infinite coordinates.
    pub fn check_well_formed(&self) -> PoseResult<()> {
        if self.vertices.is_empty() {
            return Err(PoseError::empty_mesh("mesh has no vertices"));
        }
        if self.faces.is_empty() {
            return Err(PoseError::empty_mesh("mesh has no faces"));
        }

        let vertex_count = self.vertices.len();
        for (face_index, face) in self.faces.iter().enumerate() {
            if let Some(&bad) = face.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(PoseError::InvalidVertexIndex {
                    face_index,
                    vertex_index: bad,
                    vertex_count,
                });
            }
        }

        for (vertex_index, vertex) in self.vertices.iter().enumerate() {
            let p = vertex.position;
            for (coordinate, value) in [("x", p.x), ("y", p.y), ("z", p.z)] {
                if !value.is_finite() {
                    return Err(PoseError::InvalidCoordinate {
                        vertex_index,
                        coordinate,
                        value,
                    });
                }
            }
        }

        Ok(())
    }
}

/// A face with its corner positions looked up.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub v0: Point3<f64>,
    pub v1: Point3<f64>,
    pub v2: Point3<f64>,
}

impl Triangle {
    /// Triangle with corners `v0`, `v1`, `v2` in winding order.
    #[inline]
    pub fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self { v0, v1, v2 }
    }

    /// `(v1 - v0) x (v2 - v0)`; its norm is twice the area.
    #[inline]
    pub fn normal_unnormalized(&self) -> Vector3<f64> {
        let e1 = self.v1 - self.v0;
        let e2 = self.v2 - self.v0;
        e1.cross(&e2)
    }

    /// Unit normal, or `None` when the corners are collinear.
    pub fn normal(&self) -> Option<Vector3<f64>> {
        let n = self.normal_unnormalized();
        let len = n.norm();
        if len > f64::EPSILON {
            Some(n / len)
        } else {
            None
        }
    }

    /// Half the norm of the cross product.
    #[inline]
    pub fn area(&self) -> f64 {
        self.normal_unnormalized().norm() * 0.5
    }

    /// Mean of the three corners.
    #[inline]
    pub fn centroid(&self) -> Point3<f64> {
        Point3::from((self.v0.coords + self.v1.coords + self.v2.coords) / 3.0)
    }

    /// Lengths of `v0v1`, `v1v2` and `v2v0`.
    pub fn edge_lengths(&self) -> [f64; 3] {
        [
            (self.v1 - self.v0).norm(),
            (self.v2 - self.v1).norm(),
            (self.v0 - self.v2).norm(),
        ]
    }
}
