//! Wavefront OBJ reading (through `tobj`) and writing.

use std::fmt::Write as _;
use std::io::BufReader;
use std::path::Path;

use lumen_core::errors::{LumenError, Result};
use lumen_core::logging::targets;

use crate::mesh::{MeshVertex, ObjMeshData};

fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    }
}

fn merge_models(models: Vec<tobj::Model>, origin: &str) -> Result<ObjMeshData> {
    let mut mesh = ObjMeshData::default();
    for model in models {
        let source = model.mesh;
        let base = u32::try_from(mesh.vertices.len())
            .map_err(|_| LumenError::parse(origin, "too many vertices for 32-bit indices"))?;
        let vertex_count = source.positions.len() / 3;
        let has_normals = source.normals.len() == source.positions.len();
        let has_uvs = source.texcoords.len() / 2 == vertex_count;

        for i in 0..vertex_count {
            let position = [
                source.positions[3 * i],
                source.positions[3 * i + 1],
                source.positions[3 * i + 2],
            ];
            let normal = if has_normals {
                [source.normals[3 * i], source.normals[3 * i + 1], source.normals[3 * i + 2]]
            } else {
                [0.0; 3]
            };
            let uv = if has_uvs {
                [source.texcoords[2 * i], source.texcoords[2 * i + 1]]
            } else {
                [0.0; 2]
            };
            mesh.vertices.push(MeshVertex { position, uv, normal });
        }
        mesh.indices.extend(source.indices.iter().map(|index| index + base));
    }
    log::debug!(
        target: targets::OBJ_IO,
        "Parsed '{origin}': {} vertices, {} triangles",
        mesh.vertices.len(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

/// Loads and merges every object of an OBJ file into one indexed mesh.
pub fn load_obj(path: &Path) -> Result<ObjMeshData> {
    let origin = path.display().to_string();
    let (models, _materials) =
        tobj::load_obj(path, &load_options()).map_err(|err| LumenError::parse(&origin, err.to_string()))?;
    merge_models(models, &origin)
}

/// Parses OBJ text. Material libraries are ignored.
pub fn parse_obj(text: &str, origin: &str) -> Result<ObjMeshData> {
    let mut reader = BufReader::new(text.as_bytes());
    let (models, _materials) = tobj::load_obj_buf(&mut reader, &load_options(), |_| {
        Err(tobj::LoadError::OpenFileFailed)
    })
    .map_err(|err| LumenError::parse(origin, err.to_string()))?;
    merge_models(models, origin)
}

/// Serializes `mesh` with positions, texture coordinates and normals.
#[must_use]
pub fn to_obj_string(mesh: &ObjMeshData) -> String {
    let mut out = String::with_capacity(mesh.vertices.len() * 96 + mesh.indices.len() * 8);
    for v in &mesh.vertices {
        let _ = writeln!(out, "v {} {} {}", v.position[0], v.position[1], v.position[2]);
    }
    for v in &mesh.vertices {
        let _ = writeln!(out, "vt {} {}", v.uv[0], v.uv[1]);
    }
    for v in &mesh.vertices {
        let _ = writeln!(out, "vn {} {} {}", v.normal[0], v.normal[1], v.normal[2]);
    }
    for tri in mesh.indices.chunks_exact(3) {
        let (a, b, c) = (tri[0] + 1, tri[1] + 1, tri[2] + 1);
        let _ = writeln!(out, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}");
    }
    out
}

pub fn write_obj(mesh: &ObjMeshData, path: &Path) -> Result<()> {
    std::fs::write(path, to_obj_string(mesh)).map_err(|source| LumenError::io(path, source))
}
