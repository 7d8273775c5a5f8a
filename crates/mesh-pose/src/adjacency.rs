//! Edge and vertex adjacency for triangle meshes.
//!
//! The remesher rebuilds this index after every pass, so construction is a
//! single sweep over the face table.

use hashbrown::{HashMap, HashSet};

/// Create a canonical edge key (smaller index first).
#[inline]
pub fn canonical_edge(v0: u32, v1: u32) -> (u32, u32) {
    if v0 < v1 { (v0, v1) } else { (v1, v0) }
}

/// Connectivity index over a face table.
#[derive(Debug, Clone, Default)]
pub struct MeshAdjacency {
    /// Faces incident to each undirected edge, keyed by [`canonical_edge`].
    pub edge_to_faces: HashMap<(u32, u32), Vec<usize>>,

    /// Faces incident to each vertex.
    pub vertex_faces: Vec<Vec<usize>>,

    /// Sorted, deduplicated one-ring of each vertex.
    pub vertex_neighbors: Vec<Vec<u32>>,
}

impl MeshAdjacency {
    /// Build adjacency for `faces` over `vertex_count` vertices.
    ///
    /// Indices at or above `vertex_count` grow the per-vertex tables, so a
    /// face table with unreferenced trailing vertices is still indexed.
    pub fn build(faces: &[[u32; 3]], vertex_count: usize) -> Self {
        let max_index = faces
            .iter()
            .flat_map(|f| f.iter().copied())
            .max()
            .map(|m| m as usize + 1)
            .unwrap_or(0);
        let n = vertex_count.max(max_index);

        let mut edge_to_faces: HashMap<(u32, u32), Vec<usize>> =
            HashMap::with_capacity(faces.len() * 3 / 2);
        let mut vertex_faces = vec![Vec::new(); n];
        let mut vertex_neighbors: Vec<Vec<u32>> = vec![Vec::new(); n];

        for (fi, face) in faces.iter().enumerate() {
            for i in 0..3 {
                let a = face[i];
                let b = face[(i + 1) % 3];
                edge_to_faces
                    .entry(canonical_edge(a, b))
                    .or_default()
                    .push(fi);
                vertex_faces[a as usize].push(fi);
                vertex_neighbors[a as usize].push(b);
                vertex_neighbors[b as usize].push(a);
            }
        }

        for ring in &mut vertex_neighbors {
            ring.sort_unstable();
            ring.dedup();
        }

        Self {
            edge_to_faces,
            vertex_faces,
            vertex_neighbors,
        }
    }

    /// Edges with exactly one incident face.
    pub fn boundary_edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.edge_to_faces
            .iter()
            .filter(|(_, faces)| faces.len() == 1)
            .map(|(&edge, _)| edge)
    }

    /// Vertices touching a boundary edge.
    pub fn boundary_vertices(&self) -> HashSet<u32> {
        self.boundary_edges().flat_map(|(a, b)| [a, b]).collect()
    }

    /// Whether the (undirected) edge exists in the mesh.
    #[inline]
    pub fn has_edge(&self, a: u32, b: u32) -> bool {
        self.edge_to_faces.contains_key(&canonical_edge(a, b))
    }

    /// Faces incident to an edge, empty if it does not exist.
    pub fn faces_of_edge(&self, a: u32, b: u32) -> &[usize] {
        self.edge_to_faces
            .get(&canonical_edge(a, b))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// One-ring of vertex `v`.
    #[inline]
    pub fn neighbors(&self, v: u32) -> &[u32] {
        self.vertex_neighbors
            .get(v as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of edges incident to `v`.
    #[inline]
    pub fn valence(&self, v: u32) -> usize {
        self.neighbors(v).len()
    }

    /// Number of distinct edges.
    pub fn edge_count(&self) -> usize {
        self.edge_to_faces.len()
    }
}
