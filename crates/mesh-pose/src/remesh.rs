//! Resolution normalization through isotropic remeshing.
//!
//! [`IsotropicRemesher`] drives every edge toward a target length `L` by
//! repeating four passes:
//! 1. **Split** edges longer than `max_edge_ratio · L` at their midpoint
//! 2. **Collapse** edges shorter than `min_edge_ratio · L`, unless that would
//!    pinch the surface, fold a face, or create an edge longer than the split
//!    threshold
//! 3. **Flip** interior edges when it brings vertex valences closer to 6
//!    (4 on the boundary)
//! 4. **Relax** vertices toward their one-ring centroid within the tangent
//!    plane
//!
//! The remesher never modifies its input. Any failure is reported as
//! [`PoseError::RemeshFailed`] and the caller keeps the mesh it had.

use hashbrown::HashSet;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::adjacency::{MeshAdjacency, canonical_edge};
use crate::error::{PoseError, PoseResult};
use crate::tracing_ext::OperationTimer;
use crate::types::Mesh;

/// Parameters for isotropic remeshing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemeshParams {
    /// Number of split/collapse/flip/relax rounds.
    /// Default: 5
    pub iterations: usize,

    /// Keep boundary vertices fixed and boundary edges uncollapsed.
    /// Default: true
    pub preserve_boundary: bool,

    /// Edges shorter than target * min_edge_ratio are collapsed.
    /// Default: 0.8
    pub min_edge_ratio: f64,

    /// Edges longer than target * max_edge_ratio are split.
    /// Default: 4/3
    pub max_edge_ratio: f64,

    /// Step size of tangential relaxation (0 = off, 1 = full step).
    /// Default: 0.5
    pub smoothing_factor: f64,

    /// Refuse targets whose estimated output exceeds this many faces.
    /// Default: 5,000,000
    pub max_faces: usize,
}

impl Default for RemeshParams {
    fn default() -> Self {
        Self {
            iterations: 5,
            preserve_boundary: true,
            min_edge_ratio: 0.8,
            max_edge_ratio: 4.0 / 3.0,
            smoothing_factor: 0.5,
            max_faces: 5_000_000,
        }
    }
}

impl RemeshParams {
    /// Fewer rounds for previews.
    pub fn fast() -> Self {
        Self {
            iterations: 3,
            ..Default::default()
        }
    }

    /// More rounds and stronger relaxation.
    pub fn high_quality() -> Self {
        Self {
            iterations: 10,
            smoothing_factor: 0.7,
            ..Default::default()
        }
    }

    /// Check ratios and factors are in range.
    pub fn validate(&self) -> PoseResult<()> {
        if !(self.min_edge_ratio > 0.0 && self.min_edge_ratio < 1.0) {
            return Err(PoseError::invalid_config(format!(
                "remesh.min_edge_ratio must be in (0, 1), got {}",
                self.min_edge_ratio
            )));
        }
        if !(self.max_edge_ratio > 1.0 && self.max_edge_ratio.is_finite()) {
            return Err(PoseError::invalid_config(format!(
                "remesh.max_edge_ratio must be a finite value above 1, got {}",
                self.max_edge_ratio
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing_factor) {
            return Err(PoseError::invalid_config(format!(
                "remesh.smoothing_factor must be in [0, 1], got {}",
                self.smoothing_factor
            )));
        }
        if self.max_faces == 0 {
            return Err(PoseError::invalid_config("remesh.max_faces must be positive"));
        }
        Ok(())
    }
}

/// Result of remeshing.
#[derive(Debug, Clone)]
pub struct RemeshResult {
    /// The remeshed output mesh.
    pub mesh: Mesh,
    /// Statistics for reporting.
    pub summary: RemeshSummary,
}

/// Remeshing statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RemeshSummary {
    pub target_edge_length: f64,
    pub original_vertices: usize,
    pub original_triangles: usize,
    pub final_vertices: usize,
    pub final_triangles: usize,
    pub iterations_performed: usize,
    pub edges_split: usize,
    pub edges_collapsed: usize,
    pub edges_flipped: usize,
}

/// Re-tessellates a mesh to a target edge length.
///
/// Implementations must not mutate shared state; the same instance may be
/// used from several threads at once.
pub trait Remesher: Send + Sync {
    /// Produce a new mesh whose edges tend toward `target_edge_length`.
    fn remesh(&self, mesh: &Mesh, target_edge_length: f64) -> PoseResult<RemeshResult>;
}

/// Built-in [`Remesher`] using split/collapse/flip/relax rounds.
#[derive(Debug, Clone, Default)]
pub struct IsotropicRemesher {
    params: RemeshParams,
}

impl IsotropicRemesher {
    pub fn new(params: RemeshParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RemeshParams {
        &self.params
    }
}

impl Remesher for IsotropicRemesher {
    fn remesh(&self, mesh: &Mesh, target_edge_length: f64) -> PoseResult<RemeshResult> {
        remesh_isotropic(mesh, target_edge_length, &self.params)
    }
}

/// Run `remesher` and check what it returns.
///
/// The target must be finite and strictly positive; the result must be a
/// well-formed mesh with at least one face.
pub fn normalize_resolution(
    mesh: &Mesh,
    remesher: &dyn Remesher,
    target_edge_length: f64,
) -> PoseResult<RemeshResult> {
    check_target(target_edge_length)?;

    let result = remesher.remesh(mesh, target_edge_length)?;
    if result.mesh.faces.is_empty() {
        return Err(PoseError::remesh_failed("remesher returned a mesh with no faces"));
    }
    result
        .mesh
        .check_well_formed()
        .map_err(|e| PoseError::remesh_failed(format!("remesher returned a malformed mesh: {}", e)))?;

    info!(
        target: "mesh_pose::stage",
        target_edge_length,
        vertices_before = mesh.vertex_count(),
        vertices_after = result.mesh.vertex_count(),
        faces_after = result.mesh.face_count(),
        "Resolution normalized"
    );
    Ok(result)
}

/// Isotropic remeshing toward `target_edge_length`.
///
/// # Errors
///
/// [`PoseError::RemeshFailed`] for an empty mesh, a target that is not a
/// positive finite number, a target larger than the bounding-box diagonal,
/// a target so small the output would exceed `params.max_faces`, or an
/// output with no faces. [`PoseError::InvalidConfig`] for bad `params`.
pub fn remesh_isotropic(
    mesh: &Mesh,
    target_edge_length: f64,
    params: &RemeshParams,
) -> PoseResult<RemeshResult> {
    params.validate()?;
    check_target(target_edge_length)?;

    if mesh.is_empty() {
        return Err(PoseError::remesh_failed("mesh has no faces"));
    }

    let diagonal = mesh.bbox_diagonal();
    if target_edge_length > diagonal {
        return Err(PoseError::remesh_failed(format!(
            "target edge length {} exceeds the mesh extent {:.4}",
            target_edge_length, diagonal
        )));
    }

    let equilateral_area = 3f64.sqrt() / 4.0 * target_edge_length * target_edge_length;
    let estimated_faces = mesh.surface_area() / equilateral_area;
    if estimated_faces > params.max_faces as f64 {
        return Err(PoseError::remesh_failed(format!(
            "target edge length {} would produce about {:.0} faces (limit {})",
            target_edge_length, estimated_faces, params.max_faces
        )));
    }

    let _timer = OperationTimer::for_mesh("remesh", mesh);

    let min_length = target_edge_length * params.min_edge_ratio;
    let max_length = target_edge_length * params.max_edge_ratio;

    let mut current = Mesh::from_parts(mesh.positions(), mesh.faces.clone());
    let mut summary = RemeshSummary {
        target_edge_length,
        original_vertices: mesh.vertex_count(),
        original_triangles: mesh.face_count(),
        final_vertices: 0,
        final_triangles: 0,
        iterations_performed: params.iterations,
        edges_split: 0,
        edges_collapsed: 0,
        edges_flipped: 0,
    };

    for iteration in 0..params.iterations {
        let adj = MeshAdjacency::build(&current.faces, current.vertex_count());
        let (next, splits) = split_long_edges(&current, &adj, max_length);
        current = next;

        let adj = MeshAdjacency::build(&current.faces, current.vertex_count());
        let boundary = adj.boundary_vertices();
        let (next, collapses) =
            collapse_short_edges(&current, &adj, min_length, max_length, params, &boundary);
        current = next;

        let adj = MeshAdjacency::build(&current.faces, current.vertex_count());
        let boundary = adj.boundary_vertices();
        let flips = flip_edges_for_valence(&mut current, &adj, &boundary);

        let adj = MeshAdjacency::build(&current.faces, current.vertex_count());
        let fixed: HashSet<u32> = if params.preserve_boundary {
            adj.boundary_vertices()
        } else {
            HashSet::new()
        };
        smooth_tangential(&mut current, &adj, params.smoothing_factor, &fixed);

        debug!(
            target: "mesh_pose::remesh",
            iteration,
            splits,
            collapses,
            flips,
            faces = current.face_count(),
            "Remesh iteration"
        );
        summary.edges_split += splits;
        summary.edges_collapsed += collapses;
        summary.edges_flipped += flips;
    }

    let current = remove_unreferenced_vertices(&current);
    if current.faces.is_empty() {
        return Err(PoseError::remesh_failed("remeshing removed every face"));
    }

    summary.final_vertices = current.vertex_count();
    summary.final_triangles = current.face_count();

    Ok(RemeshResult {
        mesh: current,
        summary,
    })
}

fn check_target(target_edge_length: f64) -> PoseResult<()> {
    if target_edge_length.is_finite() && target_edge_length > 0.0 {
        Ok(())
    } else {
        Err(PoseError::remesh_failed(format!(
            "target edge length must be a positive finite number, got {}",
            target_edge_length
        )))
    }
}

/// Split edges longer than max_length at their midpoints.
///
/// Midpoints are shared between the faces of an edge, so the result stays
/// conforming.
fn split_long_edges(mesh: &Mesh, adj: &MeshAdjacency, max_length: f64) -> (Mesh, usize) {
    let mut positions = mesh.positions();
    let mut edges: Vec<(u32, u32)> = adj.edge_to_faces.keys().copied().collect();
    edges.sort_unstable();

    let mut midpoints: hashbrown::HashMap<(u32, u32), u32> = hashbrown::HashMap::new();
    for (v0, v1) in edges {
        let p0 = positions[v0 as usize];
        let p1 = positions[v1 as usize];
        if (p1 - p0).norm() > max_length {
            midpoints.insert((v0, v1), positions.len() as u32);
            positions.push(nalgebra::center(&p0, &p1));
        }
    }

    if midpoints.is_empty() {
        return (mesh.clone(), 0);
    }

    let mid = |a: u32, b: u32| midpoints.get(&canonical_edge(a, b)).copied();
    let mut faces = Vec::with_capacity(mesh.faces.len() * 2);
    for &[a, b, c] in &mesh.faces {
        match (mid(a, b), mid(b, c), mid(c, a)) {
            (None, None, None) => faces.push([a, b, c]),
            (Some(mab), None, None) => {
                faces.push([a, mab, c]);
                faces.push([mab, b, c]);
            }
            (None, Some(mbc), None) => {
                faces.push([b, mbc, a]);
                faces.push([mbc, c, a]);
            }
            (None, None, Some(mca)) => {
                faces.push([c, mca, b]);
                faces.push([mca, a, b]);
            }
            (None, Some(mbc), Some(mca)) => {
                faces.push([a, b, mbc]);
                faces.push([a, mbc, mca]);
                faces.push([mbc, c, mca]);
            }
            (Some(mab), None, Some(mca)) => {
                faces.push([b, c, mca]);
                faces.push([b, mca, mab]);
                faces.push([mca, a, mab]);
            }
            (Some(mab), Some(mbc), None) => {
                faces.push([c, a, mab]);
                faces.push([c, mab, mbc]);
                faces.push([mab, b, mbc]);
            }
            (Some(mab), Some(mbc), Some(mca)) => {
                faces.push([a, mab, mca]);
                faces.push([mab, b, mbc]);
                faces.push([mca, mbc, c]);
                faces.push([mab, mbc, mca]);
            }
        }
    }

    let count = midpoints.len();
    (Mesh::from_parts(positions, faces), count)
}

/// Collapse edges shorter than min_length, shortest first.
///
/// Once an edge collapses, both endpoints and their one-rings are locked for
/// the rest of the pass so every later check sees up-to-date geometry.
fn collapse_short_edges(
    mesh: &Mesh,
    adj: &MeshAdjacency,
    min_length: f64,
    max_length: f64,
    params: &RemeshParams,
    boundary: &HashSet<u32>,
) -> (Mesh, usize) {
    let mut positions = mesh.positions();
    let n = positions.len();
    let mut vertex_map: Vec<u32> = (0..n as u32).collect();
    let mut locked = vec![false; n];
    let mut collapse_count = 0;

    let mut candidates: Vec<((u32, u32), f64)> = adj
        .edge_to_faces
        .iter()
        .filter_map(|(&(a, b), faces)| {
            let length = (positions[b as usize] - positions[a as usize]).norm();
            let collapsible = match faces.len() {
                1 => !params.preserve_boundary,
                2 => true,
                _ => false,
            };
            (collapsible && length < min_length).then_some(((a, b), length))
        })
        .collect();
    candidates.sort_by(|x, y| x.1.total_cmp(&y.1).then(x.0.cmp(&y.0)));

    for ((a, b), _) in candidates {
        if locked[a as usize] || locked[b as usize] {
            continue;
        }

        let edge_faces = adj.faces_of_edge(a, b);
        let a_boundary = boundary.contains(&a);
        let b_boundary = boundary.contains(&b);

        // An interior edge between two boundary vertices would pinch the surface.
        if edge_faces.len() == 2 && a_boundary && b_boundary {
            continue;
        }

        let ring_a = adj.neighbors(a);
        let ring_b = adj.neighbors(b);
        let common: Vec<u32> = ring_a
            .iter()
            .copied()
            .filter(|v| ring_b.binary_search(v).is_ok())
            .collect();
        if common.len() != edge_faces.len() {
            continue;
        }
        if common.iter().any(|&v| adj.valence(v) <= 3) {
            continue;
        }
        if ring_a.len() + ring_b.len() - 2 - common.len() < 3 {
            continue;
        }

        let (keep, remove, target) = if params.preserve_boundary && a_boundary {
            (a, b, positions[a as usize])
        } else if params.preserve_boundary && b_boundary {
            (b, a, positions[b as usize])
        } else {
            (
                a,
                b,
                nalgebra::center(&positions[a as usize], &positions[b as usize]),
            )
        };

        let too_long = ring_a
            .iter()
            .chain(ring_b)
            .filter(|&&v| v != a && v != b)
            .any(|&v| (positions[v as usize] - target).norm() > max_length);
        if too_long {
            continue;
        }

        let folds = adj.vertex_faces[a as usize]
            .iter()
            .chain(&adj.vertex_faces[b as usize])
            .copied()
            .filter(|fi| !edge_faces.contains(fi))
            .any(|fi| {
                let face = mesh.faces[fi];
                let before = face_normal(&positions, face, None);
                let after = face_normal(&positions, face, Some((a, b, target)));
                after.norm() < 1e-12 || after.dot(&before) <= 0.0
            });
        if folds {
            continue;
        }

        positions[keep as usize] = target;
        vertex_map[remove as usize] = keep;
        for &v in ring_a.iter().chain(ring_b).chain([a, b].iter()) {
            locked[v as usize] = true;
        }
        collapse_count += 1;
    }

    if collapse_count == 0 {
        return (mesh.clone(), 0);
    }

    let faces = mesh
        .faces
        .iter()
        .map(|f| f.map(|v| vertex_map[v as usize]))
        .filter(|[v0, v1, v2]| v0 != v1 && v1 != v2 && v2 != v0)
        .collect();

    (Mesh::from_parts(positions, faces), collapse_count)
}

/// Unnormalized normal of `face`, optionally with both endpoints of a
/// collapsing edge moved to a new position.
fn face_normal(
    positions: &[Point3<f64>],
    face: [u32; 3],
    moved: Option<(u32, u32, Point3<f64>)>,
) -> Vector3<f64> {
    let [p0, p1, p2] = face.map(|v| match moved {
        Some((a, b, target)) if v == a || v == b => target,
        _ => positions[v as usize],
    });
    (p1 - p0).cross(&(p2 - p0))
}

/// Flip interior edges where that improves valence, in place.
fn flip_edges_for_valence(mesh: &mut Mesh, adj: &MeshAdjacency, boundary: &HashSet<u32>) -> usize {
    let mut valence: Vec<i32> = adj.vertex_neighbors.iter().map(|r| r.len() as i32).collect();
    let mut edges: HashSet<(u32, u32)> = adj.edge_to_faces.keys().copied().collect();
    let mut touched = vec![false; mesh.faces.len()];
    let mut flip_count = 0;

    let mut interior: Vec<(u32, u32)> = adj
        .edge_to_faces
        .iter()
        .filter(|(_, faces)| faces.len() == 2)
        .map(|(&edge, _)| edge)
        .collect();
    interior.sort_unstable();

    let ideal = |v: u32| if boundary.contains(&v) { 4 } else { 6 };

    for (u, w) in interior {
        let &[f0, f1] = adj.faces_of_edge(u, w) else {
            continue;
        };
        if touched[f0] || touched[f1] {
            continue;
        }

        let Some((a, b, c)) = directed_edge(mesh.faces[f0], u, w) else {
            continue;
        };
        // The other face must traverse the edge the opposite way.
        let Some((_, _, d)) = directed_edge(mesh.faces[f1], b, a).filter(|&(x, _, _)| x == b)
        else {
            continue;
        };
        if c == d || edges.contains(&canonical_edge(c, d)) {
            continue;
        }
        if valence[a as usize] <= 3 || valence[b as usize] <= 3 {
            continue;
        }

        let deviation = |v: u32, delta: i32| (valence[v as usize] + delta - ideal(v)).abs();
        let before = deviation(a, 0) + deviation(b, 0) + deviation(c, 0) + deviation(d, 0);
        let after = deviation(a, -1) + deviation(b, -1) + deviation(c, 1) + deviation(d, 1);
        if after >= before {
            continue;
        }

        let positions = &mesh.vertices;
        let p = |v: u32| positions[v as usize].position;
        let n0 = (p(b) - p(a)).cross(&(p(c) - p(a)));
        let n1 = (p(a) - p(b)).cross(&(p(d) - p(b)));
        let (len0, len1) = (n0.norm(), n1.norm());
        if len0 < 1e-12 || len1 < 1e-12 {
            continue;
        }
        // Leave creases alone.
        if (n0 / len0).dot(&(n1 / len1)) < 0.5 {
            continue;
        }
        let reference = n0 / len0 + n1 / len1;
        let t0 = (p(a) - p(c)).cross(&(p(d) - p(c)));
        let t1 = (p(b) - p(d)).cross(&(p(c) - p(d)));
        if t0.dot(&reference) <= 1e-12 || t1.dot(&reference) <= 1e-12 {
            continue;
        }

        mesh.faces[f0] = [c, a, d];
        mesh.faces[f1] = [d, b, c];
        touched[f0] = true;
        touched[f1] = true;
        edges.remove(&canonical_edge(a, b));
        edges.insert(canonical_edge(c, d));
        valence[a as usize] -= 1;
        valence[b as usize] -= 1;
        valence[c as usize] += 1;
        valence[d as usize] += 1;
        flip_count += 1;
    }

    flip_count
}

/// Find `u`/`w` in `face` as a directed edge and return it with the
/// opposite vertex: `(from, to, opposite)`.
fn directed_edge(face: [u32; 3], u: u32, w: u32) -> Option<(u32, u32, u32)> {
    (0..3).find_map(|i| {
        let (from, to, opposite) = (face[i], face[(i + 1) % 3], face[(i + 2) % 3]);
        ((from == u && to == w) || (from == w && to == u)).then_some((from, to, opposite))
    })
}

/// Move vertices toward their one-ring centroid, keeping only the component
/// in the tangent plane so the surface does not shrink.
fn smooth_tangential(mesh: &mut Mesh, adj: &MeshAdjacency, factor: f64, fixed: &HashSet<u32>) {
    if factor <= 0.0 {
        return;
    }

    let positions = mesh.positions();
    let mut normals = vec![Vector3::zeros(); positions.len()];
    for &face in &mesh.faces {
        let n = face_normal(&positions, face, None);
        for v in face {
            normals[v as usize] += n;
        }
    }

    for (vi, vertex) in mesh.vertices.iter_mut().enumerate() {
        let ring = adj.neighbors(vi as u32);
        if ring.is_empty() || fixed.contains(&(vi as u32)) {
            continue;
        }

        let centroid = ring
            .iter()
            .fold(Vector3::zeros(), |acc: Vector3<f64>, &n| acc + positions[n as usize].coords)
            / ring.len() as f64;
        let displacement = centroid - positions[vi].coords;

        let normal = normals[vi];
        let tangential = match normal.try_normalize(1e-12) {
            Some(n) => displacement - n * n.dot(&displacement),
            None => displacement,
        };
        vertex.position = positions[vi] + tangential * factor;
    }
}

/// Drop vertices no face references, renumbering the rest in order.
fn remove_unreferenced_vertices(mesh: &Mesh) -> Mesh {
    let mut referenced = vec![false; mesh.vertex_count()];
    for face in &mesh.faces {
        for &v in face {
            referenced[v as usize] = true;
        }
    }

    let mut remap = vec![u32::MAX; mesh.vertex_count()];
    let mut positions = Vec::with_capacity(mesh.vertex_count());
    for (old, vertex) in mesh.vertices.iter().enumerate() {
        if referenced[old] {
            remap[old] = positions.len() as u32;
            positions.push(vertex.position);
        }
    }

    let faces = mesh
        .faces
        .iter()
        .map(|f| f.map(|v| remap[v as usize]))
        .collect();
    Mesh::from_parts(positions, faces)
}
