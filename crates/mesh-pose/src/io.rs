//! Mesh file I/O for STL, OBJ, and PLY formats.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{PoseError, PoseResult};
use crate::tracing_ext::log_io_operation;
use crate::types::{Mesh, Vertex};

/// Scan formats the loader and exporter understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Stl,
    Obj,
    Ply,
}

impl MeshFormat {
    /// Format implied by the extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .and_then(|ext| match ext.as_str() {
                "stl" => Some(MeshFormat::Stl),
                "obj" => Some(MeshFormat::Obj),
                "ply" => Some(MeshFormat::Ply),
                _ => None,
            })
    }

    /// Lowercase extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            MeshFormat::Stl => "stl",
            MeshFormat::Obj => "obj",
            MeshFormat::Ply => "ply",
        }
    }

    fn require(path: &Path) -> PoseResult<Self> {
        Self::from_path(path).ok_or_else(|| {
            PoseError::unsupported_format(
                path.extension().and_then(|e| e.to_str()).map(String::from),
            )
        })
    }
}

/// Reads a mesh from storage.
pub trait MeshLoader: Send + Sync {
    fn load(&self, path: &Path) -> PoseResult<Mesh>;
}

/// Writes a mesh to storage.
pub trait MeshExporter: Send + Sync {
    fn export(&self, mesh: &Mesh, path: &Path) -> PoseResult<()>;
}

/// Loader and exporter backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileMeshIo;

impl MeshLoader for FileMeshIo {
    fn load(&self, path: &Path) -> PoseResult<Mesh> {
        load_mesh(path)
    }
}

impl MeshExporter for FileMeshIo {
    fn export(&self, mesh: &Mesh, path: &Path) -> PoseResult<()> {
        save_mesh(mesh, path)
    }
}

/// Read a scan, choosing the parser from the file extension.
///
/// Faces that repeat a vertex index are dropped. The result is rejected if
/// it has no vertices or faces, an out-of-range index, or a non-finite
/// coordinate.
pub fn load_mesh(path: &Path) -> PoseResult<Mesh> {
    let format = MeshFormat::require(path)?;
    debug!(target: "mesh_pose::io", path = %path.display(), ?format, "Loading mesh");

    let loaded = match format {
        MeshFormat::Stl => load_stl(path),
        MeshFormat::Obj => load_obj(path),
        MeshFormat::Ply => load_ply(path),
    };
    let mesh = match loaded.and_then(|m| m.check_well_formed().map(|_| m)) {
        Ok(mesh) => mesh,
        Err(e) => {
            log_io_operation("load", path, Some(format.extension()), false);
            return Err(e);
        }
    };

    if let Some((min, max)) = mesh.bounds() {
        let dims = max - min;
        info!(
            target: "mesh_pose::io",
            vertices = mesh.vertex_count(),
            faces = mesh.face_count(),
            "Loaded mesh"
        );
        debug!(
            target: "mesh_pose::io",
            "Dimensions: {:.3} x {:.3} x {:.3}",
            dims.x, dims.y, dims.z
        );
        if dims.x.max(dims.y).max(dims.z) < 1e-6 {
            warn!(target: "mesh_pose::io", path = %path.display(), "Mesh has almost no extent");
        }
    }

    Ok(mesh)
}

/// Push `[a, b, c]` unless it repeats a vertex.
fn push_face(mesh: &mut Mesh, face: [u32; 3]) {
    let [a, b, c] = face;
    if a != b && b != c && a != c {
        mesh.faces.push(face);
    }
}

/// STL reader; `stl_io` sniffs binary versus ASCII.
fn load_stl(path: &Path) -> PoseResult<Mesh> {
    let file = File::open(path).map_err(|e| PoseError::io_read(path, e))?;
    let mut reader = BufReader::new(file);

    // stl_io merges coincident corners into an indexed mesh.
    let stl = stl_io::read_stl(&mut reader).map_err(|e| PoseError::parse_error(path, e.to_string()))?;

    let mut mesh = Mesh::with_capacity(stl.vertices.len(), stl.faces.len());
    for v in &stl.vertices {
        mesh.vertices
            .push(Vertex::from_coords(v.0[0] as f64, v.0[1] as f64, v.0[2] as f64));
    }
    for face in &stl.faces {
        let [a, b, c] = face.vertices;
        push_face(&mut mesh, [a as u32, b as u32, c as u32]);
    }

    debug!(
        target: "mesh_pose::io",
        "STL: {} vertices, {} of {} triangles kept",
        mesh.vertex_count(),
        mesh.face_count(),
        stl.faces.len()
    );
    Ok(mesh)
}

/// Load mesh from OBJ file, merging all models.
fn load_obj(path: &Path) -> PoseResult<Mesh> {
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|e| match e {
        tobj::LoadError::OpenFileFailed => PoseError::io_read(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "could not open OBJ file"),
        ),
        other => PoseError::parse_error(path, other.to_string()),
    })?;

    let mut mesh = Mesh::new();
    for model in &models {
        let offset = mesh.vertices.len() as u32;
        mesh.vertices.extend(
            model
                .mesh
                .positions
                .chunks_exact(3)
                .map(|c| Vertex::from_coords(c[0] as f64, c[1] as f64, c[2] as f64)),
        );
        for c in model.mesh.indices.chunks_exact(3) {
            push_face(&mut mesh, [c[0] + offset, c[1] + offset, c[2] + offset]);
        }
    }

    debug!(
        target: "mesh_pose::io",
        "OBJ: {} vertices, {} faces from {} models",
        mesh.vertex_count(),
        mesh.face_count(),
        models.len()
    );
    Ok(mesh)
}

/// PLY reader for ASCII and binary encodings.
///
/// Expects `vertex` elements with `x`, `y`, `z` and `face` elements with a
/// `vertex_indices` (or `vertex_index`) list. Polygons are fan-triangulated.
fn load_ply(path: &Path) -> PoseResult<Mesh> {
    use ply_rs::parser::Parser;

    let file = File::open(path).map_err(|e| PoseError::io_read(path, e))?;
    let mut reader = BufReader::new(file);

    let parser = Parser::<ply_rs::ply::DefaultElement>::new();
    let ply = parser
        .read_ply(&mut reader)
        .map_err(|e| PoseError::parse_error(path, format!("PLY parse error: {}", e)))?;

    let mut mesh = Mesh::new();

    if let Some(vertices) = ply.payload.get("vertex") {
        mesh.vertices.reserve(vertices.len());
        for element in vertices {
            let x = ply_float(element.get("x"), "x", path)?;
            let y = ply_float(element.get("y"), "y", path)?;
            let z = ply_float(element.get("z"), "z", path)?;
            let mut vertex = Vertex::from_coords(x, y, z);

            if let (Ok(nx), Ok(ny), Ok(nz)) = (
                ply_float(element.get("nx"), "nx", path),
                ply_float(element.get("ny"), "ny", path),
                ply_float(element.get("nz"), "nz", path),
            ) {
                vertex.normal = Some(nalgebra::Vector3::new(nx, ny, nz));
            }
            mesh.vertices.push(vertex);
        }
    }

    if let Some(faces) = ply.payload.get("face") {
        for element in faces {
            let property = element
                .get("vertex_indices")
                .or_else(|| element.get("vertex_index"));
            let Some(indices) = ply_indices(property) else {
                return Err(PoseError::parse_error(
                    path,
                    "face without a valid vertex_indices list",
                ));
            };
            for i in 1..indices.len().saturating_sub(1) {
                push_face(&mut mesh, [indices[0], indices[i], indices[i + 1]]);
            }
        }
    }

    debug!(
        target: "mesh_pose::io",
        "PLY: {} vertices, {} faces",
        mesh.vertex_count(),
        mesh.face_count()
    );
    Ok(mesh)
}

/// Extract a float value from a PLY property.
fn ply_float(prop: Option<&ply_rs::ply::Property>, name: &str, path: &Path) -> PoseResult<f64> {
    use ply_rs::ply::Property;

    match prop {
        Some(Property::Float(v)) => Ok(*v as f64),
        Some(Property::Double(v)) => Ok(*v),
        Some(Property::Int(v)) => Ok(*v as f64),
        Some(Property::UInt(v)) => Ok(*v as f64),
        Some(Property::Short(v)) => Ok(*v as f64),
        Some(Property::UShort(v)) => Ok(*v as f64),
        Some(Property::Char(v)) => Ok(*v as f64),
        Some(Property::UChar(v)) => Ok(*v as f64),
        _ => Err(PoseError::parse_error(
            path,
            format!("missing or invalid PLY property: {}", name),
        )),
    }
}

/// Extract a face index list; `None` for other property kinds or negative
/// indices.
fn ply_indices(prop: Option<&ply_rs::ply::Property>) -> Option<Vec<u32>> {
    use ply_rs::ply::Property;

    fn signed<T: Copy + TryInto<u32>>(values: &[T]) -> Option<Vec<u32>> {
        values.iter().map(|&v| v.try_into().ok()).collect()
    }

    match prop? {
        Property::ListInt(v) => signed(v),
        Property::ListShort(v) => signed(v),
        Property::ListChar(v) => signed(v),
        Property::ListUInt(v) => Some(v.clone()),
        Property::ListUShort(v) => Some(v.iter().map(|&i| i as u32).collect()),
        Property::ListUChar(v) => Some(v.iter().map(|&i| i as u32).collect()),
        _ => None,
    }
}

/// Write `mesh` in the format its extension names. Missing parent directories are created.
pub fn save_mesh(mesh: &Mesh, path: &Path) -> PoseResult<()> {
    let format = MeshFormat::require(path)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PoseError::io_write(parent, e))?;
    }

    let result = match format {
        MeshFormat::Stl => save_stl(mesh, path),
        MeshFormat::Obj => save_obj(mesh, path),
        MeshFormat::Ply => save_ply(mesh, path),
    };
    log_io_operation("save", path, Some(format.extension()), result.is_ok());
    result
}

fn create(path: &Path) -> PoseResult<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| PoseError::io_write(path, e))
}

/// Save mesh to STL file (binary format) with per-face normals.
pub fn save_stl(mesh: &Mesh, path: &Path) -> PoseResult<()> {
    let mut writer = create(path)?;

    let to_f32 = |p: nalgebra::Point3<f64>| [p.x as f32, p.y as f32, p.z as f32];
    let triangles: Vec<stl_io::Triangle> = mesh
        .triangles()
        .map(|t| {
            let n = t.normal().unwrap_or_default();
            stl_io::Triangle {
                normal: stl_io::Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                vertices: [
                    stl_io::Vertex::new(to_f32(t.v0)),
                    stl_io::Vertex::new(to_f32(t.v1)),
                    stl_io::Vertex::new(to_f32(t.v2)),
                ],
            }
        })
        .collect();

    stl_io::write_stl(&mut writer, triangles.iter()).map_err(|e| PoseError::io_write(path, e))?;
    writer.flush().map_err(|e| PoseError::io_write(path, e))?;

    debug!(target: "mesh_pose::io", "Saved {} triangles to {:?}", mesh.face_count(), path);
    Ok(())
}

/// Save mesh to OBJ file (ASCII, 1-based indices).
pub fn save_obj(mesh: &Mesh, path: &Path) -> PoseResult<()> {
    let mut writer = create(path)?;

    let write = |w: &mut BufWriter<File>| -> std::io::Result<()> {
        writeln!(w, "# OBJ file exported by mesh-pose")?;
        writeln!(w, "# Vertices: {}", mesh.vertex_count())?;
        writeln!(w, "# Faces: {}", mesh.face_count())?;
        for v in &mesh.vertices {
            let p = v.position;
            writeln!(w, "v {:.9} {:.9} {:.9}", p.x, p.y, p.z)?;
        }
        for [a, b, c] in &mesh.faces {
            writeln!(w, "f {} {} {}", a + 1, b + 1, c + 1)?;
        }
        w.flush()
    };
    write(&mut writer).map_err(|e| PoseError::io_write(path, e))?;

    debug!(target: "mesh_pose::io", "Saved {} faces to {:?} (OBJ)", mesh.face_count(), path);
    Ok(())
}

/// Save mesh to PLY file (ASCII format).
pub fn save_ply(mesh: &Mesh, path: &Path) -> PoseResult<()> {
    use ply_rs::ply::{
        Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
        ScalarType,
    };
    use ply_rs::writer::Writer;

    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = Encoding::Ascii;

    let mut vertex_def = ElementDef::new("vertex".to_string());
    for axis in ["x", "y", "z"] {
        vertex_def.properties.add(PropertyDef::new(
            axis.to_string(),
            PropertyType::Scalar(ScalarType::Double),
        ));
    }
    ply.header.elements.add(vertex_def);

    let mut face_def = ElementDef::new("face".to_string());
    face_def.properties.add(PropertyDef::new(
        "vertex_indices".to_string(),
        PropertyType::List(ScalarType::UChar, ScalarType::UInt),
    ));
    ply.header.elements.add(face_def);

    let vertices: Vec<DefaultElement> = mesh
        .vertices
        .iter()
        .map(|v| {
            let mut element = DefaultElement::new();
            element.insert("x".to_string(), Property::Double(v.position.x));
            element.insert("y".to_string(), Property::Double(v.position.y));
            element.insert("z".to_string(), Property::Double(v.position.z));
            element
        })
        .collect();
    ply.payload.insert("vertex".to_string(), vertices);

    let faces: Vec<DefaultElement> = mesh
        .faces
        .iter()
        .map(|face| {
            let mut element = DefaultElement::new();
            element.insert("vertex_indices".to_string(), Property::ListUInt(face.to_vec()));
            element
        })
        .collect();
    ply.payload.insert("face".to_string(), faces);

    let invalid = |details: String| {
        PoseError::io_write(path, std::io::Error::new(std::io::ErrorKind::InvalidData, details))
    };
    ply.make_consistent()
        .map_err(|e| invalid(format!("PLY consistency error: {:?}", e)))?;

    let mut writer = create(path)?;
    Writer::new()
        .write_ply(&mut writer, &mut ply)
        .map_err(|e| PoseError::io_write(path, e))?;
    writer.flush().map_err(|e| PoseError::io_write(path, e))?;

    debug!(
        target: "mesh_pose::io",
        "Saved {} vertices and {} faces to {:?} (PLY)",
        mesh.vertex_count(),
        mesh.face_count(),
        path
    );
    Ok(())
}
