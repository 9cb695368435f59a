//! Resource Manager Integration Tests
//!
//! Tests for:
//! - Creation, validation and normalization (mesh, texture)
//! - Relative path resolution and dedup by normalized path
//! - Lazy GPU upload and frame-deferred retirement
//! - OBJ / image round trips through the manager

use std::fs;

use anyhow::Result;
use lumen::core::rhi::GpuObjectKind;
use lumen::core::rhi::headless::HeadlessDevice;
use lumen::resources::{
    ImageData, MeshHandle, MeshKind, MeshOptions, MeshVertex, ObjMeshData, ResourceManager, TextureKind,
    TextureOptions,
};
use tempfile::TempDir;

const TRIANGLE_OBJ: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

fn vertex(x: f32, y: f32, z: f32) -> MeshVertex {
    MeshVertex {
        position: [x, y, z],
        uv: [0.0, 0.0],
        normal: [0.0, 0.0, 1.0],
    }
}

fn triangle_mesh() -> ObjMeshData {
    ObjMeshData {
        vertices: vec![vertex(0.0, 0.0, 0.0), vertex(1.0, 0.0, 0.0), vertex(0.0, 1.0, 0.0)],
        indices: vec![0, 1, 2],
    }
}

fn manager(frames_in_flight: u32) -> Result<(TempDir, ResourceManager)> {
    let root = tempfile::tempdir()?;
    let manager = ResourceManager::new(root.path(), frames_in_flight)?;
    Ok((root, manager))
}

fn write_file(root: &TempDir, rel: &str, contents: &str) -> Result<()> {
    let path = root.path().join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}

// ============================================================================
// Creation & Validation
// ============================================================================

#[test]
fn created_handles_are_valid_and_alive() -> Result<()> {
    let (_root, mut resources) = manager(2)?;
    let handle = resources.create::<MeshKind>(triangle_mesh(), MeshOptions::default())?;
    assert!(handle.is_valid());
    assert!(resources.alive(handle));
    assert_eq!(resources.cpu(handle)?.triangle_count(), 1);
    assert_eq!(resources.live_count::<MeshKind>(), 1);
    assert!(resources.path_of(handle).is_none());
    Ok(())
}

#[test]
fn invalid_meshes_are_rejected() -> Result<()> {
    let (_root, mut resources) = manager(2)?;
    let mut not_triangles = triangle_mesh();
    not_triangles.indices.pop();
    assert!(resources.create::<MeshKind>(not_triangles, MeshOptions::default()).is_err());

    let mut out_of_range = triangle_mesh();
    out_of_range.indices[2] = 7;
    assert!(resources.create::<MeshKind>(out_of_range, MeshOptions::default()).is_err());

    assert!(resources.create::<MeshKind>(ObjMeshData::default(), MeshOptions::default()).is_err());
    assert_eq!(resources.live_count::<MeshKind>(), 0);
    Ok(())
}

#[test]
fn textures_are_normalized_to_rgba8() -> Result<()> {
    let (_root, mut resources) = manager(2)?;
    let rgb = ImageData {
        width: 2,
        height: 1,
        channels: 3,
        pixels: vec![10, 20, 30, 40, 50, 60],
    };
    let handle = resources.create::<TextureKind>(rgb, TextureOptions::default())?;
    let stored = resources.cpu(handle)?;
    assert_eq!(stored.channels, 4);
    assert_eq!(stored.pixels, vec![10, 20, 30, 255, 40, 50, 60, 255]);

    let empty = ImageData {
        width: 0,
        height: 4,
        channels: 4,
        pixels: Vec::new(),
    };
    assert!(resources.create::<TextureKind>(empty, TextureOptions::default()).is_err());
    Ok(())
}

#[test]
fn dead_and_invalid_handles_fail_access() -> Result<()> {
    let (_root, mut resources) = manager(2)?;
    let handle = resources.create::<MeshKind>(triangle_mesh(), MeshOptions::default())?;
    resources.unload(handle);
    assert!(!resources.alive(handle));
    assert!(resources.cpu(handle).is_err());
    resources.unload(handle);

    assert!(resources.cpu(MeshHandle::INVALID).is_err());
    assert!(!resources.alive(MeshHandle::INVALID));
    Ok(())
}

#[test]
fn handle_ids_start_at_one_and_are_never_reused() -> Result<()> {
    let (_root, mut resources) = manager(2)?;
    let first = resources.create::<MeshKind>(triangle_mesh(), MeshOptions::default())?;
    assert_eq!(first.value(), 1);

    resources.unload(first);
    let second = resources.create::<MeshKind>(triangle_mesh(), MeshOptions::default())?;
    assert_eq!(second.value(), 2);
    assert!(!resources.alive(first));
    assert!(resources.alive(second));

    // A raw value only resolves when it was actually handed out.
    assert!(resources.alive(MeshHandle::from_raw(2)));
    assert!(!resources.alive(MeshHandle::from_raw(3)));
    Ok(())
}

// ============================================================================
// Paths
// ============================================================================

#[test]
fn equivalent_relative_paths_share_a_handle() -> Result<()> {
    let (root, mut resources) = manager(2)?;
    write_file(&root, "a/mesh.obj", TRIANGLE_OBJ)?;

    let first = resources.create_from_relative_path::<MeshKind>("a/mesh.obj", MeshOptions::default())?;
    let second = resources.create_from_relative_path::<MeshKind>("a/./mesh.obj", MeshOptions::default())?;
    let third = resources.create_from_relative_path::<MeshKind>("a/b/../mesh.obj", MeshOptions::default())?;
    assert_eq!(first, second);
    assert_eq!(first, third);
    assert_eq!(resources.live_count::<MeshKind>(), 1);

    let path = resources.path_of(first).expect("file-backed mesh has a path");
    assert!(path.ends_with("a/mesh.obj"));
    Ok(())
}

#[test]
fn unload_forgets_the_path_mapping() -> Result<()> {
    let (root, mut resources) = manager(2)?;
    write_file(&root, "mesh.obj", TRIANGLE_OBJ)?;
    let first = resources.create_from_relative_path::<MeshKind>("mesh.obj", MeshOptions::default())?;
    resources.unload(first);
    let second = resources.create_from_relative_path::<MeshKind>("mesh.obj", MeshOptions::default())?;
    assert_ne!(first, second);
    assert!(resources.alive(second));
    Ok(())
}

#[test]
fn paths_outside_the_root_are_rejected() -> Result<()> {
    let (_root, resources) = manager(2)?;
    assert!(resources.resolve_relative_path("".as_ref()).is_err());
    assert!(resources.resolve_relative_path("../escape.obj".as_ref()).is_err());
    assert!(resources.resolve_relative_path("a/../../escape.obj".as_ref()).is_err());
    assert!(resources.resolve_relative_path("/etc/passwd".as_ref()).is_err());
    assert!(resources.resolve_relative_path("a/..".as_ref()).is_err());

    let inside = resources.resolve_relative_path("a/../b.obj".as_ref())?;
    assert_eq!(inside, resources.root_dir().join("b.obj"));
    Ok(())
}

#[test]
fn missing_file_is_an_error_mentioning_the_path() -> Result<()> {
    let (_root, mut resources) = manager(2)?;
    let err = resources
        .create_from_relative_path::<MeshKind>("missing.obj", MeshOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("missing.obj"));
    Ok(())
}

#[test]
fn saved_mesh_loads_back() -> Result<()> {
    let (_root, mut resources) = manager(2)?;
    let handle = resources.create::<MeshKind>(triangle_mesh(), MeshOptions::default())?;
    resources.save_cpu_to_relative_path(handle, "out/tri.obj")?;

    let loaded = resources.create_from_relative_path::<MeshKind>("out/tri.obj", MeshOptions::default())?;
    let mesh = resources.cpu(loaded)?;
    assert_eq!(mesh.triangle_count(), 1);
    assert_eq!(mesh.triangle(0), triangle_mesh().triangle(0));
    Ok(())
}

#[test]
fn saved_texture_loads_back() -> Result<()> {
    let (_root, mut resources) = manager(2)?;
    let handle = resources.create::<TextureKind>(ImageData::solid_rgba(3, 2, [200, 100, 50, 255]), TextureOptions::default())?;
    resources.save_cpu_to_relative_path(handle, "textures/solid.png")?;

    let loaded = resources.create_from_relative_path::<TextureKind>("textures/solid.png", TextureOptions::default())?;
    let image = resources.cpu(loaded)?;
    assert_eq!((image.width, image.height, image.channels), (3, 2, 4));
    assert_eq!(&image.pixels[..4], &[200, 100, 50, 255]);
    Ok(())
}

// ============================================================================
// GPU Upload & Retirement
// ============================================================================

#[test]
fn gpu_upload_is_lazy_and_cached() -> Result<()> {
    let (_root, mut resources) = manager(2)?;
    let device = HeadlessDevice::new();
    let handle = resources.create::<MeshKind>(triangle_mesh(), MeshOptions::default())?;
    assert!(resources.gpu(handle).is_none());
    assert_eq!(device.live_count(), 0);

    let index_count = resources.require_gpu(handle, &device)?.index_count;
    assert_eq!(index_count, 3);
    assert_eq!(device.live_count_of(GpuObjectKind::Buffer), 2);

    resources.require_gpu(handle, &device)?;
    assert_eq!(device.total_allocations(), 2);
    assert!(resources.gpu(handle).is_some());
    Ok(())
}

#[test]
fn failed_upload_leaves_resource_without_gpu_object() -> Result<()> {
    let (_root, mut resources) = manager(2)?;
    let device = HeadlessDevice::new();
    let handle = resources.create::<TextureKind>(ImageData::solid_rgba(1, 1, [0, 0, 0, 255]), TextureOptions::default())?;
    device.set_fail_allocations(true);
    assert!(resources.require_gpu(handle, &device).is_err());
    assert!(resources.gpu(handle).is_none());

    device.set_fail_allocations(false);
    resources.require_gpu(handle, &device)?;
    assert!(resources.gpu(handle).is_some());
    Ok(())
}

#[test]
fn retired_gpu_objects_survive_frames_in_flight() -> Result<()> {
    const FRAMES_IN_FLIGHT: u32 = 3;
    let (_root, mut resources) = manager(FRAMES_IN_FLIGHT)?;
    let device = HeadlessDevice::new();
    let handle = resources.create::<MeshKind>(triangle_mesh(), MeshOptions::default())?;
    resources.require_gpu(handle, &device)?;

    let n = 10;
    resources.tick(n);
    resources.unload(handle);
    assert_eq!(resources.retired_count(), 1);
    assert_eq!(device.live_count(), 2);

    for serial in n..n + u64::from(FRAMES_IN_FLIGHT) {
        resources.tick(serial);
        assert_eq!(device.live_count(), 2, "destroyed too early at frame {serial}");
    }
    let destroyed = resources.tick(n + u64::from(FRAMES_IN_FLIGHT));
    assert_eq!(destroyed, 1);
    assert_eq!(resources.retired_count(), 0);
    assert_eq!(device.live_count(), 0);
    Ok(())
}

#[test]
fn flush_after_wait_idle_releases_everything_but_keeps_cpu_data() -> Result<()> {
    let (_root, mut resources) = manager(2)?;
    let device = HeadlessDevice::new();
    let kept = resources.create::<MeshKind>(triangle_mesh(), MeshOptions::default())?;
    let dropped = resources.create::<MeshKind>(triangle_mesh(), MeshOptions::default())?;
    resources.require_gpu(kept, &device)?;
    resources.require_gpu(dropped, &device)?;
    resources.unload(dropped);

    let released = resources.flush_after_wait_idle();
    assert_eq!(released, 2);
    assert_eq!(device.live_count(), 0);
    assert!(resources.alive(kept));
    assert!(resources.gpu(kept).is_none());
    Ok(())
}

#[test]
fn frames_in_flight_is_at_least_one() -> Result<()> {
    let (_root, mut resources) = manager(0)?;
    assert_eq!(resources.frames_in_flight(), 1);
    resources.set_frames_in_flight(0);
    assert_eq!(resources.frames_in_flight(), 1);
    Ok(())
}
