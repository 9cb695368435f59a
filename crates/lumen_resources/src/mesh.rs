use std::path::Path;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use lumen_core::errors::{LumenError, Result};
use lumen_core::rhi::{Buffer, BufferDesc, BufferUsage, Device};

use crate::handle::Handle;
use crate::kind::ResourceKind;
use crate::obj_io;

/// Interleaved vertex layout shared with the forward shaders.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
}

/// Indexed triangle mesh.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjMeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl ObjMeshData {
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Corners of triangle `index`, or `None` past the end.
    #[must_use]
    pub fn triangle(&self, index: usize) -> Option<[Vec3; 3]> {
        let tri = self.indices.get(3 * index..3 * index + 3)?;
        let corner = |i: u32| self.vertices.get(i as usize).map(|v| Vec3::from_array(v.position));
        Some([corner(tri[0])?, corner(tri[1])?, corner(tri[2])?])
    }

    /// Fills zero normals with area-weighted vertex normals.
    fn with_generated_normals(mut self) -> Self {
        let has_normals = self
            .vertices
            .iter()
            .any(|v| Vec3::from_array(v.normal).length_squared() > 0.0);
        if has_normals {
            return self;
        }
        let mut accumulated = vec![Vec3::ZERO; self.vertices.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let pa = Vec3::from_array(self.vertices[a].position);
            let pb = Vec3::from_array(self.vertices[b].position);
            let pc = Vec3::from_array(self.vertices[c].position);
            let face = (pb - pa).cross(pc - pa);
            accumulated[a] += face;
            accumulated[b] += face;
            accumulated[c] += face;
        }
        for (vertex, normal) in self.vertices.iter_mut().zip(accumulated) {
            vertex.normal = normal.normalize_or_zero().to_array();
        }
        self
    }
}

/// GPU form of a mesh: vertex and index buffers.
#[derive(Debug)]
pub struct MeshGpu {
    pub vertex_buffer: Buffer,
    pub index_buffer: Buffer,
    pub index_count: u32,
}

#[derive(Clone, Debug, Default)]
pub struct MeshOptions {
    /// Generate normals when the source has none.
    pub generate_normals: bool,
}

/// Resource kind for [`ObjMeshData`].
pub struct MeshKind;

pub type MeshHandle = Handle<MeshKind>;

impl ResourceKind for MeshKind {
    type Cpu = ObjMeshData;
    type Gpu = MeshGpu;
    type Options = MeshOptions;

    const NAME: &'static str = "mesh";

    fn validate_cpu(cpu: &ObjMeshData) -> Result<()> {
        if cpu.vertices.is_empty() {
            return Err(LumenError::invalid_argument("mesh has no vertices"));
        }
        if cpu.indices.is_empty() || cpu.indices.len() % 3 != 0 {
            return Err(LumenError::invalid_argument(format!(
                "mesh index count {} is not a positive multiple of 3",
                cpu.indices.len()
            )));
        }
        let vertex_count = cpu.vertices.len();
        if let Some(bad) = cpu.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(LumenError::invariant(format!(
                "mesh index {bad} out of range for {vertex_count} vertices"
            )));
        }
        Ok(())
    }

    fn normalize_cpu(cpu: ObjMeshData, options: &MeshOptions) -> Result<ObjMeshData> {
        if options.generate_normals {
            Ok(cpu.with_generated_normals())
        } else {
            Ok(cpu)
        }
    }

    fn load_from_path(abs_path: &Path, _options: &MeshOptions) -> Result<ObjMeshData> {
        obj_io::load_obj(abs_path)
    }

    fn save_to_path(cpu: &ObjMeshData, abs_path: &Path) -> Result<()> {
        obj_io::write_obj(cpu, abs_path)
    }

    fn upload_to_gpu(device: &dyn Device, cpu: &ObjMeshData, _options: &MeshOptions) -> Result<MeshGpu> {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&cpu.vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(&cpu.indices);

        let vertex_buffer = device.create_buffer(&BufferDesc {
            label: "mesh.vertices".into(),
            size: vertex_bytes.len() as u64,
            usage: BufferUsage::VERTEX | BufferUsage::TRANSFER_DST,
        })?;
        device.write_buffer(vertex_buffer.id(), 0, vertex_bytes)?;

        let index_buffer = device.create_buffer(&BufferDesc {
            label: "mesh.indices".into(),
            size: index_bytes.len() as u64,
            usage: BufferUsage::INDEX | BufferUsage::TRANSFER_DST,
        })?;
        device.write_buffer(index_buffer.id(), 0, index_bytes)?;

        let index_count = u32::try_from(cpu.indices.len())
            .map_err(|_| LumenError::gpu("mesh index count exceeds u32"))?;
        Ok(MeshGpu {
            vertex_buffer,
            index_buffer,
            index_count,
        })
    }
}
