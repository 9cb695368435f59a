//! Scene & Component Integration Tests
//!
//! Tests for:
//! - GameObject creation, unique naming, rename and lookup
//! - Subtree destruction with on_destroy and camera cleanup
//! - Component uniqueness and on_awake sibling requirements
//! - Tick dispatch: order, disabled components, inactive hierarchy, disabled scene
//! - World: scene lifecycle and active scene routing

use std::sync::Arc;

use anyhow::Result;
use glam::{Vec3, Vec4};
use lumen::core::errors::LumenError;
use lumen::core::ids::{GameObjectId, SceneId};
use lumen::resources::{MeshHandle, MeshKind, MeshOptions, MeshVertex, ObjMeshData, ResourceManager};
use lumen::scene::{
    Component, ComponentContext, FixedTickContext, FrameTickContext, MeshRenderer, PbptLight, PbptMesh,
    PbptSpectrum, PointLight, Scene, World,
};
use parking_lot::Mutex;

type Log = Arc<Mutex<Vec<String>>>;

/// Records every hook it sees as `"<label>:<hook>"`.
struct Recorder {
    label: &'static str,
    log: Log,
}

impl Recorder {
    fn new(label: &'static str, log: &Log) -> Self {
        Self {
            label,
            log: Arc::clone(log),
        }
    }

    fn push(&self, hook: &str) {
        self.log.lock().push(format!("{}:{hook}", self.label));
    }
}

impl Component for Recorder {
    fn on_awake(&mut self, _ctx: &mut ComponentContext<'_>) -> lumen::Result<()> {
        self.push("awake");
        Ok(())
    }

    fn on_fixed_update(&mut self, _ctx: &mut ComponentContext<'_>, _tick: &FixedTickContext) -> lumen::Result<()> {
        self.push("fixed");
        Ok(())
    }

    fn on_update(&mut self, _ctx: &mut ComponentContext<'_>, _tick: &FrameTickContext) -> lumen::Result<()> {
        self.push("update");
        Ok(())
    }

    fn on_late_update(&mut self, _ctx: &mut ComponentContext<'_>, _tick: &FrameTickContext) -> lumen::Result<()> {
        self.push("late");
        Ok(())
    }

    fn on_destroy(&mut self, _ctx: &mut ComponentContext<'_>) -> lumen::Result<()> {
        self.push("destroy");
        Ok(())
    }
}

/// Second recorder type so one object can carry two components.
struct Follower(Recorder);

impl Component for Follower {
    fn on_update(&mut self, _ctx: &mut ComponentContext<'_>, _tick: &FrameTickContext) -> lumen::Result<()> {
        self.0.push("update");
        Ok(())
    }
}

/// Moves its owner one unit along +X per update.
struct Mover;

impl Component for Mover {
    fn on_update(&mut self, ctx: &mut ComponentContext<'_>, _tick: &FrameTickContext) -> lumen::Result<()> {
        if let Some(mut node) = ctx.node_mut() {
            node.translate(Vec3::X, 1.0);
        }
        Ok(())
    }
}

fn frame() -> FrameTickContext {
    FrameTickContext {
        delta_seconds: 1.0 / 60.0,
        unscaled_delta_seconds: 1.0 / 60.0,
        frame_index: 0,
    }
}

fn scene() -> Scene {
    Scene::new(SceneId::new(1), "test")
}

fn triangle_handle() -> Result<(tempfile::TempDir, ResourceManager, MeshHandle)> {
    let root = tempfile::tempdir()?;
    let mut resources = ResourceManager::new(root.path(), 2)?;
    let vertex = |x: f32, y: f32| MeshVertex {
        position: [x, y, 0.0],
        uv: [0.0, 0.0],
        normal: [0.0, 0.0, 1.0],
    };
    let mesh = ObjMeshData {
        vertices: vec![vertex(0.0, 0.0), vertex(1.0, 0.0), vertex(0.0, 1.0)],
        indices: vec![0, 1, 2],
    };
    let handle = resources.create::<MeshKind>(mesh, MeshOptions::default())?;
    Ok((root, resources, handle))
}

// ============================================================================
// Game Objects & Names
// ============================================================================

#[test]
fn duplicate_names_get_numeric_suffixes() {
    let mut scene = scene();
    let a = scene.create_game_object("Cube");
    let b = scene.create_game_object("Cube");
    let c = scene.create_game_object("Cube");
    let unnamed = scene.create_game_object("");

    assert_eq!(scene.game_object_name(a), Some("Cube"));
    assert_eq!(scene.game_object_name(b), Some("Cube_1"));
    assert_eq!(scene.game_object_name(c), Some("Cube_2"));
    assert_eq!(scene.game_object_name(unnamed), Some("GameObject"));
    assert_eq!(scene.game_object_ids(), &[a, b, c, unnamed]);
    assert!(a.is_valid() && a != b);
}

#[test]
fn rename_keeps_names_unique_and_updates_lookup() {
    let mut scene = scene();
    let a = scene.create_game_object("Light");
    let b = scene.create_game_object("Lamp");

    assert!(scene.rename_game_object(b, "Light"));
    assert_eq!(scene.game_object_name(b), Some("Light_1"));
    assert_eq!(scene.find_game_object_by_name("Light"), Some(a));
    assert_eq!(scene.find_game_object_by_name("Light_1"), Some(b));
    assert_eq!(scene.find_game_object_by_name("Lamp"), None);

    assert!(scene.rename_game_object(a, "Light"));
    assert_eq!(scene.game_object_name(a), Some("Light"));
    assert!(!scene.rename_game_object(GameObjectId::new(999), "Ghost"));
}

#[test]
fn destroying_a_parent_removes_the_subtree_children_first() {
    let mut scene = scene();
    let log: Log = Arc::default();
    let parent = scene.create_game_object("Parent");
    let child = scene.create_game_object("Child");
    let sibling = scene.create_game_object("Sibling");
    assert!(scene.set_parent(child, parent, false));
    scene.add_component(parent, Recorder::new("parent", &log)).unwrap();
    scene.add_component(child, Recorder::new("child", &log)).unwrap();
    log.lock().clear();

    assert!(scene.destroy_game_object(parent));
    assert_eq!(*log.lock(), vec!["child:destroy", "parent:destroy"]);
    assert!(!scene.has_game_object(parent));
    assert!(!scene.has_game_object(child));
    assert!(!scene.graph().has_node(child));
    assert_eq!(scene.find_game_object_by_name("Child"), None);
    assert_eq!(scene.game_object_ids(), &[sibling]);

    // Names are free again.
    let reborn = scene.create_game_object("Parent");
    assert_eq!(scene.game_object_name(reborn), Some("Parent"));
    assert!(!scene.destroy_game_object(parent));
}

#[test]
fn destroying_a_camera_owner_drops_its_camera() {
    let mut scene = scene();
    let first = scene.create_game_object("CamA");
    let second = scene.create_game_object("CamB");
    scene.create_perspective_camera(first).unwrap();
    scene.create_perspective_camera(second).unwrap();
    assert_eq!(scene.cameras().active_camera_owner(), first);

    assert!(scene.destroy_game_object(first));
    assert_eq!(scene.cameras().camera_count(), 1);
    assert_eq!(scene.cameras().active_camera_owner(), second);

    assert!(scene.destroy_game_object(second));
    assert!(scene.active_camera().is_none());
    assert!(!scene.cameras().active_camera_owner().is_valid());
}

// ============================================================================
// Components
// ============================================================================

#[test]
fn second_component_of_the_same_type_is_rejected() {
    let mut scene = scene();
    let log: Log = Arc::default();
    let id = scene.create_game_object("Obj");
    scene.add_component(id, Recorder::new("first", &log)).unwrap();

    let err = scene.add_component(id, Recorder::new("second", &log)).err().unwrap();
    assert!(matches!(err, LumenError::InvariantViolation(_)), "{err}");
    assert_eq!(scene.game_object(id).unwrap().component_count(), 1);
    assert_eq!(*log.lock(), vec!["first:awake"]);
}

#[test]
fn pbpt_components_require_a_mesh_renderer() -> Result<()> {
    let (_root, _resources, mesh) = triangle_handle()?;
    let mut scene = scene();
    let id = scene.create_game_object("Shape");

    assert!(scene.add_component(id, PbptMesh).is_err());
    let light = PbptLight::new(PbptSpectrum::constant(17.0))?;
    assert!(scene.add_component(id, light.clone()).is_err());
    assert_eq!(scene.game_object(id).unwrap().component_count(), 0);

    scene.add_component(id, MeshRenderer::new(mesh, Vec4::ONE)?)?;
    scene.add_component(id, PbptMesh)?;
    scene.add_component(id, light)?;
    assert!(scene.has_component::<PbptLight>(id));
    assert_eq!(scene.game_object(id).unwrap().component_count(), 3);
    Ok(())
}

#[test]
fn mesh_renderer_rejects_the_invalid_handle() {
    assert!(MeshRenderer::new(MeshHandle::INVALID, Vec4::ONE).is_err());
}

#[test]
fn component_or_err_names_the_missing_type() {
    let mut scene = scene();
    let id = scene.create_game_object("Obj");
    let err = scene.component_or_err::<PointLight>(id).unwrap_err();
    assert!(err.to_string().contains("PointLight"), "{err}");
    assert!(scene.component_or_err::<PointLight>(GameObjectId::new(42)).is_err());

    scene.add_component(id, PointLight::default()).unwrap();
    assert!(scene.component_or_err::<PointLight>(id).is_ok());
}

#[test]
fn components_mutate_through_the_scene() {
    let mut scene = scene();
    let id = scene.create_game_object("Lamp");
    scene.add_component(id, PointLight::default()).unwrap();
    scene
        .get_component_mut::<PointLight>(id)
        .unwrap()
        .set_intensity(25.0)
        .unwrap();
    assert!((scene.get_component::<PointLight>(id).unwrap().intensity() - 25.0).abs() < 1e-6);
}

// ============================================================================
// Tick Dispatch
// ============================================================================

#[test]
fn ticks_run_in_creation_then_insertion_order() {
    let mut scene = scene();
    let log: Log = Arc::default();
    let a = scene.create_game_object("A");
    let b = scene.create_game_object("B");
    scene.add_component(a, Recorder::new("a", &log)).unwrap();
    scene.add_component(a, Follower(Recorder::new("a2", &log))).unwrap();
    scene.add_component(b, Recorder::new("b", &log)).unwrap();
    log.lock().clear();

    scene.fixed_tick(&FixedTickContext::default()).unwrap();
    scene.tick(&frame()).unwrap();
    scene.late_tick(&frame()).unwrap();

    assert_eq!(
        *log.lock(),
        vec!["a:fixed", "b:fixed", "a:update", "a2:update", "b:update", "a:late", "b:late"]
    );
}

#[test]
fn disabled_components_and_inactive_objects_do_not_tick() {
    let mut scene = scene();
    let log: Log = Arc::default();
    let parent = scene.create_game_object("Parent");
    let child = scene.create_game_object("Child");
    let other = scene.create_game_object("Other");
    scene.set_parent(child, parent, false);
    scene.add_component(child, Recorder::new("child", &log)).unwrap();
    scene.add_component(other, Recorder::new("other", &log)).unwrap();
    log.lock().clear();

    scene.set_game_object_enabled(parent, false);
    assert!(!scene.is_game_object_enabled(child));
    assert!(scene.set_component_enabled::<Recorder>(other, false));
    scene.tick(&frame()).unwrap();
    assert!(log.lock().is_empty());

    scene.set_game_object_enabled(parent, true);
    scene.set_component_enabled::<Recorder>(other, true);
    scene.tick(&frame()).unwrap();
    assert_eq!(*log.lock(), vec!["child:update", "other:update"]);
    assert!(!scene.set_component_enabled::<PointLight>(other, false));
}

#[test]
fn disabled_scene_skips_all_ticks() {
    let mut scene = scene();
    let log: Log = Arc::default();
    let id = scene.create_game_object("Obj");
    scene.add_component(id, Recorder::new("obj", &log)).unwrap();
    log.lock().clear();

    scene.set_enabled(false);
    scene.fixed_tick(&FixedTickContext::default()).unwrap();
    scene.tick(&frame()).unwrap();
    scene.late_tick(&frame()).unwrap();
    assert!(log.lock().is_empty());
}

#[test]
fn world_transforms_are_fresh_after_tick() {
    let mut scene = scene();
    let id = scene.create_game_object("Moving");
    scene.add_component(id, Mover).unwrap();
    scene.tick(&frame()).unwrap();
    scene.tick(&frame()).unwrap();

    let position = scene.node(id).unwrap().world_position();
    assert!((position - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-5);
    assert!(!scene.graph().record(id).unwrap().is_dirty());
}

// ============================================================================
// World
// ============================================================================

#[test]
fn first_scene_becomes_active() {
    let mut world = World::new();
    assert!(world.active_scene().is_none());
    let first = world.create_scene("Main").id();
    let second = world.create_scene("Main").id();

    assert_eq!(world.active_scene_id(), first);
    assert_eq!(world.scene(second).unwrap().name(), "Main_1");
    assert_eq!(world.find_scene_by_name("Main_1"), Some(second));
    assert_eq!(world.scene_count(), 2);
}

#[test]
fn active_scene_cannot_be_destroyed() {
    let mut world = World::new();
    let first = world.create_scene("A").id();
    let second = world.create_scene("B").id();

    assert!(!world.destroy_scene(first));
    assert!(world.set_active_scene(second));
    assert!(world.destroy_scene(first));
    assert!(!world.has_scene(first));
    assert!(!world.set_active_scene(first));
    assert!(world.rename_scene(second, "Renamed"));
    assert_eq!(world.find_scene_by_name("Renamed"), Some(second));
}

#[test]
fn world_ticks_only_the_active_scene() {
    let mut world = World::new();
    let log: Log = Arc::default();
    let active = world.create_scene("Active");
    let id = active.create_game_object("Obj");
    active.add_component(id, Recorder::new("active", &log)).unwrap();

    let idle = world.create_scene("Idle");
    let idle_obj = idle.create_game_object("Obj");
    idle.add_component(idle_obj, Recorder::new("idle", &log)).unwrap();
    log.lock().clear();

    world.fixed_tick(&FixedTickContext::default()).unwrap();
    world.tick(&frame()).unwrap();
    world.late_tick(&frame()).unwrap();
    assert_eq!(*log.lock(), vec!["active:fixed", "active:update", "active:late"]);
}
