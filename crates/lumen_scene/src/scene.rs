//! Scene: game objects, their names, the scene graph and the cameras.

use lumen_core::errors::{LumenError, Result};
use lumen_core::ids::{GameObjectId, IdAllocator, SceneId};
use lumen_core::logging::targets;
use rustc_hash::FxHashMap;

use crate::camera::Camera;
use crate::camera_manager::CameraManager;
use crate::component::Component;
use crate::game_object::GameObject;
use crate::graph::SceneGraph;
use crate::node::{NodeMut, NodeRef};
use crate::tick::{FixedTickContext, FrameTickContext};

/// Name given to game objects created with an empty name.
pub const DEFAULT_GAME_OBJECT_NAME: &str = "GameObject";

pub struct Scene {
    id: SceneId,
    name: String,
    enabled: bool,

    ids: IdAllocator,
    graph: SceneGraph,
    cameras: CameraManager,
    objects: FxHashMap<GameObjectId, GameObject>,
    order: Vec<GameObjectId>,
    name_by_id: FxHashMap<GameObjectId, String>,
    id_by_name: FxHashMap<String, GameObjectId>,
}

impl Scene {
    #[must_use]
    pub fn new(id: SceneId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            enabled: true,
            ids: IdAllocator::new(),
            graph: SceneGraph::new(),
            cameras: CameraManager::new(),
            objects: FxHashMap::default(),
            order: Vec::new(),
            name_by_id: FxHashMap::default(),
            id_by_name: FxHashMap::default(),
        }
    }

    // ========================================================================
    // Identity & state
    // ========================================================================

    #[must_use]
    pub fn id(&self) -> SceneId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// A disabled scene skips all ticks.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        log::info!(target: targets::SCENE, "Scene {} enabled set to {enabled}.", self.id);
    }

    #[must_use]
    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    #[must_use]
    pub fn cameras(&self) -> &CameraManager {
        &self.cameras
    }

    pub fn cameras_mut(&mut self) -> &mut CameraManager {
        &mut self.cameras
    }

    /// Borrows the graph and the cameras at the same time.
    pub fn graph_and_cameras_mut(&mut self) -> (&mut SceneGraph, &mut CameraManager) {
        (&mut self.graph, &mut self.cameras)
    }

    // ========================================================================
    // Game objects
    // ========================================================================

    fn is_name_occupied(&self, name: &str, ignore: GameObjectId) -> bool {
        self.id_by_name.get(name).is_some_and(|id| *id != ignore)
    }

    fn make_unique_name(&self, requested: &str, ignore: GameObjectId) -> String {
        let base = if requested.is_empty() {
            DEFAULT_GAME_OBJECT_NAME
        } else {
            requested
        };
        if !self.is_name_occupied(base, ignore) {
            return base.to_string();
        }
        (1usize..)
            .map(|suffix| format!("{base}_{suffix}"))
            .find(|candidate| !self.is_name_occupied(candidate, ignore))
            .unwrap_or_else(|| base.to_string())
    }

    /// Creates a top-level game object. Empty names fall back to
    /// [`DEFAULT_GAME_OBJECT_NAME`]; taken names get a `_N` suffix.
    pub fn create_game_object(&mut self, name: &str) -> GameObjectId {
        let unique = self.make_unique_name(name, GameObjectId::INVALID);
        let id = GameObjectId::new(self.ids.allocate());
        self.graph.register_node(id);
        self.objects.insert(id, GameObject::new(id));
        self.order.push(id);
        self.name_by_id.insert(id, unique.clone());
        self.id_by_name.insert(unique.clone(), id);
        log::debug!(
            target: targets::SCENE,
            "GameObject created (scene_id={}, game_object_id={id}, name='{unique}', count={})",
            self.id,
            self.order.len()
        );
        id
    }

    /// Destroys `id` and its whole subtree, leaves first. Returns `false` for unknown ids.
    pub fn destroy_game_object(&mut self, id: GameObjectId) -> bool {
        if !self.graph.has_node(id) {
            log::warn!(
                target: targets::SCENE,
                "destroy_game_object ignored: node {id} does not exist in Scene {}.",
                self.id
            );
            return false;
        }
        let victims = self.graph.collect_subtree_postorder(id);
        for victim in &victims {
            if let Some(object) = self.objects.get_mut(victim) {
                object.destroy_components(&mut self.graph, &mut self.cameras);
            }
        }
        for victim in &victims {
            if let Some(name) = self.name_by_id.remove(victim) {
                self.id_by_name.remove(&name);
            }
            self.objects.remove(victim);
        }
        self.order.retain(|existing| !victims.contains(existing));
        self.cameras.on_game_objects_destroyed(&victims);
        self.graph.unregister_subtree(id);
        log::info!(
            target: targets::SCENE,
            "GameObject subtree destroyed (scene_id={}, root_game_object_id={id}, removed_count={}, remaining={})",
            self.id,
            victims.len(),
            self.order.len()
        );
        true
    }

    #[must_use]
    pub fn game_object(&self, id: GameObjectId) -> Option<&GameObject> {
        self.objects.get(&id)
    }

    pub fn game_object_mut(&mut self, id: GameObjectId) -> Option<&mut GameObject> {
        self.objects.get_mut(&id)
    }

    #[must_use]
    pub fn has_game_object(&self, id: GameObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    #[must_use]
    pub fn game_object_count(&self) -> usize {
        self.order.len()
    }

    /// Ids in creation order.
    #[must_use]
    pub fn game_object_ids(&self) -> &[GameObjectId] {
        &self.order
    }

    #[must_use]
    pub fn game_object_name(&self, id: GameObjectId) -> Option<&str> {
        self.name_by_id.get(&id).map(String::as_str)
    }

    #[must_use]
    pub fn find_game_object_by_name(&self, name: &str) -> Option<GameObjectId> {
        self.id_by_name.get(name).copied()
    }

    /// Renames `id`, uniquifying against the other objects. Returns `false` for unknown ids.
    pub fn rename_game_object(&mut self, id: GameObjectId, new_name: &str) -> bool {
        let Some(old_name) = self.name_by_id.get(&id).cloned() else {
            log::warn!(
                target: targets::SCENE,
                "rename_game_object ignored: game_object_id={id} does not exist in Scene {}.",
                self.id
            );
            return false;
        };
        let unique = self.make_unique_name(new_name, id);
        if unique == old_name {
            return true;
        }
        self.id_by_name.remove(&old_name);
        self.id_by_name.insert(unique.clone(), id);
        self.name_by_id.insert(id, unique.clone());
        log::debug!(
            target: targets::SCENE,
            "GameObject renamed (scene_id={}, game_object_id={id}, old_name='{old_name}', new_name='{unique}').",
            self.id
        );
        true
    }

    /// Whether `id` ticks: its node and every ancestor are enabled.
    #[must_use]
    pub fn is_game_object_enabled(&self, id: GameObjectId) -> bool {
        self.graph.is_active_in_hierarchy(id)
    }

    pub fn set_game_object_enabled(&mut self, id: GameObjectId, enabled: bool) -> bool {
        self.graph.set_enabled(id, enabled)
    }

    pub fn set_parent(&mut self, child: GameObjectId, parent: GameObjectId, world_position_stays: bool) -> bool {
        self.graph.set_parent(child, parent, world_position_stays)
    }

    #[must_use]
    pub fn node(&self, id: GameObjectId) -> Option<NodeRef<'_>> {
        self.graph.node(id)
    }

    pub fn node_mut(&mut self, id: GameObjectId) -> Option<NodeMut<'_>> {
        self.graph.node_mut(id)
    }

    // ========================================================================
    // Components
    // ========================================================================

    /// Attaches `component` to `id` and runs its `on_awake`. A second component
    /// of the same type, or an `on_awake` error, leaves the object unchanged.
    pub fn add_component<T: Component>(&mut self, id: GameObjectId, component: T) -> Result<&mut T> {
        let object = self
            .objects
            .get_mut(&id)
            .ok_or_else(|| LumenError::not_found(format!("GameObject {id} does not exist in Scene {}", self.id)))?;
        object.attach(&mut self.graph, &mut self.cameras, component)
    }

    #[must_use]
    pub fn get_component<T: Component>(&self, id: GameObjectId) -> Option<&T> {
        self.objects.get(&id)?.get_component::<T>()
    }

    pub fn get_component_mut<T: Component>(&mut self, id: GameObjectId) -> Option<&mut T> {
        self.objects.get_mut(&id)?.get_component_mut::<T>()
    }

    pub fn component_or_err<T: Component>(&self, id: GameObjectId) -> Result<&T> {
        self.objects
            .get(&id)
            .ok_or_else(|| LumenError::not_found(format!("GameObject {id} does not exist in Scene {}", self.id)))?
            .component_or_err::<T>()
    }

    #[must_use]
    pub fn has_component<T: Component>(&self, id: GameObjectId) -> bool {
        self.objects.get(&id).is_some_and(GameObject::has_component::<T>)
    }

    /// Enables or disables the `T` component of `id`. Returns `false` if absent.
    pub fn set_component_enabled<T: Component>(&mut self, id: GameObjectId, enabled: bool) -> bool {
        self.objects
            .get_mut(&id)
            .is_some_and(|object| object.set_component_enabled::<T>(enabled))
    }

    // ========================================================================
    // Cameras
    // ========================================================================

    pub fn create_perspective_camera(&mut self, owner: GameObjectId) -> Result<&mut Camera> {
        self.cameras.create_perspective_camera(&self.graph, owner)
    }

    pub fn create_orthographic_camera(&mut self, owner: GameObjectId) -> Result<&mut Camera> {
        self.cameras.create_orthographic_camera(&self.graph, owner)
    }

    #[must_use]
    pub fn active_camera(&self) -> Option<&Camera> {
        self.cameras.active_camera()
    }

    pub fn set_active_camera(&mut self, owner: GameObjectId) -> bool {
        self.cameras.set_active_camera(owner)
    }

    // ========================================================================
    // Ticks
    // ========================================================================

    fn dispatch_all<F>(&mut self, stage: &str, mut hook: F) -> Result<()>
    where
        F: FnMut(&mut dyn Component, &mut crate::component::ComponentContext<'_>) -> Result<()>,
    {
        self.graph.update_world_transforms();
        for index in 0..self.order.len() {
            let Some(id) = self.order.get(index).copied() else {
                break;
            };
            if let Some(object) = self.objects.get_mut(&id) {
                object.dispatch(&mut self.graph, &mut self.cameras, stage, &mut hook)?;
            }
        }
        self.graph.update_world_transforms();
        Ok(())
    }

    pub fn fixed_tick(&mut self, tick: &FixedTickContext) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.dispatch_all("on_fixed_update", |component, ctx| component.on_fixed_update(ctx, tick))
    }

    pub fn tick(&mut self, tick: &FrameTickContext) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.dispatch_all("on_update", |component, ctx| component.on_update(ctx, tick))
    }

    pub fn late_tick(&mut self, tick: &FrameTickContext) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.dispatch_all("on_late_update", |component, ctx| component.on_late_update(ctx, tick))
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("game_objects", &self.order.len())
            .finish_non_exhaustive()
    }
}
