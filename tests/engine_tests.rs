//! Engine & Runtime Integration Tests
//!
//! Tests for:
//! - Fixed-step accumulation, pause and stop requests
//! - EngineConfig JSON loading and validation
//! - Runtime frame order: tick, prepare, record, present, retire
//! - Swapchain changes forwarded to the pipeline and shutdown

use std::sync::Arc;

use anyhow::Result;
use glam::{Vec3, Vec4};
use lumen::core::rhi::headless::HeadlessDevice;
use lumen::core::rhi::{Device, Extent2D, GpuObjectKind};
use lumen::render::{ForwardPipeline, ForwardPipelineConfig, FrameScheduler, HeadlessFrameScheduler};
use lumen::resources::{MeshKind, MeshOptions, MeshVertex, ObjMeshData, ResourceManager};
use lumen::scene::{Component, ComponentContext, FixedTickContext, FrameTickContext, MeshRenderer};
use lumen::{Engine, EngineConfig, Runtime};
use parking_lot::Mutex;
use tempfile::TempDir;

/// Counts fixed and frame ticks.
#[derive(Default)]
struct TickCounter {
    counts: Arc<Mutex<(u64, u64)>>,
}

impl Component for TickCounter {
    fn on_fixed_update(&mut self, _ctx: &mut ComponentContext<'_>, _tick: &FixedTickContext) -> lumen::Result<()> {
        self.counts.lock().0 += 1;
        Ok(())
    }

    fn on_update(&mut self, _ctx: &mut ComponentContext<'_>, _tick: &FrameTickContext) -> lumen::Result<()> {
        self.counts.lock().1 += 1;
        Ok(())
    }
}

fn engine(config: EngineConfig) -> Result<(TempDir, Engine)> {
    let root = tempfile::tempdir()?;
    let config = EngineConfig {
        resource_root_dir: root.path().to_path_buf(),
        ..config
    };
    let engine = Engine::new(config)?;
    Ok((root, engine))
}

fn engine_with_counter(config: EngineConfig) -> Result<(TempDir, Engine, Arc<Mutex<(u64, u64)>>)> {
    let (root, mut engine) = engine(config)?;
    let counter = TickCounter::default();
    let counts = Arc::clone(&counter.counts);
    let scene = engine.world_mut().create_scene("main");
    let id = scene.create_game_object("Counter");
    scene.add_component(id, counter)?;
    Ok((root, engine, counts))
}

// ============================================================================
// Engine Loop
// ============================================================================

#[test]
fn fixed_steps_follow_accumulated_time() -> Result<()> {
    let (_root, mut engine, counts) = engine_with_counter(EngineConfig {
        fixed_delta_seconds: 0.02,
        ..EngineConfig::default()
    })?;

    engine.run_frame(0.05)?;
    assert_eq!(*counts.lock(), (2, 1));
    engine.run_frame(0.011)?;
    assert_eq!(*counts.lock(), (3, 2));
    assert_eq!(engine.frame_index(), 2);
    assert_eq!(engine.fixed_tick_index(), 3);
    Ok(())
}

#[test]
fn paused_engine_counts_frames_without_ticking() -> Result<()> {
    let (_root, mut engine, counts) = engine_with_counter(EngineConfig {
        start_paused: true,
        ..EngineConfig::default()
    })?;
    assert!(engine.is_paused());

    engine.run_for_frames(3, 1.0 / 30.0)?;
    assert_eq!(*counts.lock(), (0, 0));
    assert_eq!(engine.frame_index(), 3);

    engine.resume();
    engine.run_frame(1.0 / 60.0)?;
    assert_eq!(counts.lock().1, 1);
    Ok(())
}

#[test]
fn stop_request_ends_run_for_frames() -> Result<()> {
    let (_root, mut engine) = engine(EngineConfig::default())?;
    assert_eq!(engine.run_for_frames(4, 0.01)?, 4);

    engine.request_stop();
    assert_eq!(engine.run_for_frames(4, 0.01)?, 0);
    engine.reset_stop_request();
    assert_eq!(engine.run_for_frames(2, 0.01)?, 2);
    Ok(())
}

#[test]
fn engine_without_scenes_still_runs() -> Result<()> {
    let (_root, mut engine) = engine(EngineConfig::default())?;
    engine.run_frame(0.5)?;
    assert_eq!(engine.frame_index(), 1);
    Ok(())
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn config_file_overrides_only_given_keys() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("engine.json");
    std::fs::write(&path, r#"{ "window_title": "Cornell box", "max_frames_in_flight": 3 }"#)?;

    let config = EngineConfig::from_json_file(&path)?;
    assert_eq!(config.window_title, "Cornell box");
    assert_eq!(config.max_frames_in_flight, 3);
    assert_eq!(config.window_width, EngineConfig::default().window_width);

    let text = config.to_json_string()?;
    assert_eq!(EngineConfig::from_json_str(&text)?, config);
    Ok(())
}

#[test]
fn invalid_config_files_are_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{ "fixed_delta_seconds": 0.0 }"#)?;
    assert!(EngineConfig::from_json_file(&path).is_err());

    let err = EngineConfig::from_json_file(dir.path().join("missing.json")).unwrap_err();
    assert!(err.to_string().contains("missing.json"), "{err}");
    assert!(EngineConfig::from_json_str("{ not json").is_err());
    Ok(())
}

// ============================================================================
// Runtime
// ============================================================================

struct Harness {
    _root: TempDir,
    device: HeadlessDevice,
    runtime: Runtime<HeadlessFrameScheduler, ForwardPipeline>,
}

fn harness() -> Result<Harness> {
    let root = tempfile::tempdir()?;
    let config = EngineConfig {
        resource_root_dir: root.path().to_path_buf(),
        shader_root_dir: Some("/opt/lumen/shaders".into()),
        ..EngineConfig::default()
    };
    let frames_in_flight = config.max_frames_in_flight;
    let resources = ResourceManager::new(root.path(), frames_in_flight)?;
    let mut engine = Engine::with_resources(config.clone(), resources)?;

    let (world, resources) = engine.world_and_resources_mut();
    let vertex = |x: f32, y: f32| MeshVertex {
        position: [x, y, 0.0],
        uv: [0.0, 0.0],
        normal: [0.0, 0.0, 1.0],
    };
    let mesh = resources.create::<MeshKind>(
        ObjMeshData {
            vertices: vec![vertex(0.0, 0.0), vertex(1.0, 0.0), vertex(0.0, 1.0)],
            indices: vec![0, 1, 2],
        },
        MeshOptions::default(),
    )?;
    let scene = world.create_scene("main");
    let camera = scene.create_game_object("Camera");
    scene
        .node_mut(camera)
        .unwrap()
        .set_local_position(Vec3::new(0.0, 0.0, 3.0));
    scene.create_perspective_camera(camera)?;
    let triangle = scene.create_game_object("Triangle");
    scene.add_component(triangle, MeshRenderer::new(mesh, Vec4::new(1.0, 0.5, 0.25, 1.0))?)?;

    let device = HeadlessDevice::new();
    let scheduler =
        HeadlessFrameScheduler::new(Box::new(device.clone()), Extent2D::new(64, 64), frames_in_flight)?;
    let shared: Arc<dyn Device> = Arc::new(device.clone());
    let pipeline = ForwardPipeline::new(
        Arc::clone(&shared),
        scheduler.swapchain_state(),
        frames_in_flight,
        ForwardPipelineConfig {
            shader_root: config.shader_root_dir.clone(),
            ..ForwardPipelineConfig::default()
        },
    )?;
    let runtime = Runtime::new(engine, scheduler, pipeline, shared);
    Ok(Harness {
        _root: root,
        device,
        runtime,
    })
}

#[test]
fn runtime_records_and_presents_each_frame() -> Result<()> {
    let mut harness = harness()?;
    let ran = harness.runtime.run_for_frames(3, 1.0 / 60.0)?;
    assert_eq!(ran, 3);

    let runtime = &harness.runtime;
    assert_eq!(runtime.scheduler().presented_frames(), 3);
    assert_eq!(runtime.engine().frame_index(), 3);
    for frame_index in 0..runtime.scheduler().frames_in_flight() {
        assert_eq!(runtime.scheduler().command_buffer(frame_index).unwrap().draw_count(), 1);
    }
    // Vertex and index buffers were uploaded lazily on the first frame.
    assert!(harness.device.live_count_of(GpuObjectKind::Buffer) >= 2);
    Ok(())
}

#[test]
fn resize_skips_a_frame_and_updates_the_pipeline() -> Result<()> {
    let mut harness = harness()?;
    harness.runtime.run_frame(1.0 / 60.0)?;

    harness.runtime.on_window_resized(128, 32);
    assert!(harness.runtime.run_frame(1.0 / 60.0)?.is_none());
    let ticket = harness.runtime.run_frame(1.0 / 60.0)?.expect("frame after resize is recorded");
    assert_eq!(ticket.extent, Extent2D::new(128, 32));
    assert_eq!(
        harness.runtime.pipeline().scene_targets().scene_extent(),
        Extent2D::new(128, 32)
    );
    Ok(())
}

#[test]
fn unloaded_meshes_are_destroyed_after_frames_in_flight() -> Result<()> {
    let mut harness = harness()?;
    harness.runtime.run_frame(1.0 / 60.0)?;
    let buffers_before = harness.device.live_count_of(GpuObjectKind::Buffer);

    // Remove the renderer first so the next frames no longer reference the mesh.
    let engine = harness.runtime.engine_mut();
    let (world, resources) = engine.world_and_resources_mut();
    let scene = world.active_scene_mut().unwrap();
    let triangle = scene.find_game_object_by_name("Triangle").unwrap();
    let mesh = scene.get_component::<MeshRenderer>(triangle).unwrap().mesh();
    scene.destroy_game_object(triangle);
    resources.unload(mesh);
    assert_eq!(resources.retired_count(), 1);

    harness.runtime.run_for_frames(4, 1.0 / 60.0)?;
    assert_eq!(harness.runtime.resources().retired_count(), 0);
    assert_eq!(harness.device.live_count_of(GpuObjectKind::Buffer), buffers_before - 2);
    Ok(())
}

#[test]
fn shutdown_waits_for_the_device_once() -> Result<()> {
    let mut harness = harness()?;
    harness.runtime.run_frame(1.0 / 60.0)?;
    let waits_before = harness.device.wait_idle_count();

    harness.runtime.shutdown()?;
    harness.runtime.shutdown()?;
    assert_eq!(harness.device.wait_idle_count(), waits_before + 1);
    Ok(())
}
