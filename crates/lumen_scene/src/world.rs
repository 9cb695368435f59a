//! The set of scenes and which one is active.

use lumen_core::errors::Result;
use lumen_core::ids::{IdAllocator, SceneId};
use lumen_core::logging::targets;
use rustc_hash::FxHashMap;

use crate::scene::Scene;
use crate::tick::{FixedTickContext, FrameTickContext};

pub const DEFAULT_SCENE_NAME: &str = "Scene";

/// Owns every scene. Only the active scene ticks.
///
/// The first scene created becomes active; the active scene cannot be
/// destroyed.
#[derive(Debug, Default)]
pub struct World {
    ids: IdAllocator,
    scenes: Vec<Scene>,
    id_by_name: FxHashMap<String, SceneId>,
    active: SceneId,
}

impl World {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn is_name_occupied(&self, name: &str, ignore: SceneId) -> bool {
        self.id_by_name.get(name).is_some_and(|id| *id != ignore)
    }

    fn make_unique_name(&self, requested: &str, ignore: SceneId) -> String {
        let base = if requested.is_empty() { DEFAULT_SCENE_NAME } else { requested };
        if !self.is_name_occupied(base, ignore) {
            return base.to_string();
        }
        (1usize..)
            .map(|suffix| format!("{base}_{suffix}"))
            .find(|candidate| !self.is_name_occupied(candidate, ignore))
            .unwrap_or_else(|| base.to_string())
    }

    pub fn create_scene(&mut self, name: &str) -> &mut Scene {
        let unique = self.make_unique_name(name, SceneId::INVALID);
        let id = SceneId::new(self.ids.allocate());
        self.id_by_name.insert(unique.clone(), id);
        if !self.active.is_valid() {
            self.active = id;
        }
        log::info!(
            target: targets::WORLD,
            "Scene created (scene_id={id}, name='{unique}', scene_count={}, active_scene_id={})",
            self.scenes.len() + 1,
            self.active
        );
        let index = self.scenes.len();
        self.scenes.push(Scene::new(id, unique));
        &mut self.scenes[index]
    }

    #[must_use]
    pub fn scene(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.iter().find(|scene| scene.id() == id)
    }

    pub fn scene_mut(&mut self, id: SceneId) -> Option<&mut Scene> {
        self.scenes.iter_mut().find(|scene| scene.id() == id)
    }

    #[must_use]
    pub fn find_scene_by_name(&self, name: &str) -> Option<SceneId> {
        self.id_by_name.get(name).copied()
    }

    #[must_use]
    pub fn has_scene(&self, id: SceneId) -> bool {
        self.scene(id).is_some()
    }

    #[must_use]
    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    /// Scenes in creation order.
    pub fn scenes(&self) -> impl Iterator<Item = &Scene> {
        self.scenes.iter()
    }

    pub fn rename_scene(&mut self, id: SceneId, new_name: &str) -> bool {
        let Some(old_name) = self.scene(id).map(|scene| scene.name().to_string()) else {
            log::warn!(target: targets::WORLD, "rename_scene ignored: scene {id} does not exist.");
            return false;
        };
        let unique = self.make_unique_name(new_name, id);
        if unique == old_name {
            return true;
        }
        self.id_by_name.remove(&old_name);
        self.id_by_name.insert(unique.clone(), id);
        if let Some(scene) = self.scene_mut(id) {
            scene.set_name(unique);
        }
        true
    }

    #[must_use]
    pub fn active_scene_id(&self) -> SceneId {
        self.active
    }

    #[must_use]
    pub fn active_scene(&self) -> Option<&Scene> {
        self.scene(self.active)
    }

    pub fn active_scene_mut(&mut self) -> Option<&mut Scene> {
        let active = self.active;
        self.scene_mut(active)
    }

    pub fn set_active_scene(&mut self, id: SceneId) -> bool {
        if !self.has_scene(id) {
            log::warn!(target: targets::WORLD, "set_active_scene failed: scene {id} does not exist.");
            return false;
        }
        self.active = id;
        log::info!(target: targets::WORLD, "Active scene changed to {id}.");
        true
    }

    /// Removes a scene. The active scene and unknown ids are refused.
    pub fn destroy_scene(&mut self, id: SceneId) -> bool {
        if id == self.active {
            log::warn!(target: targets::WORLD, "destroy_scene rejected: scene {id} is active.");
            return false;
        }
        let Some(index) = self.scenes.iter().position(|scene| scene.id() == id) else {
            log::warn!(target: targets::WORLD, "destroy_scene ignored: scene {id} does not exist.");
            return false;
        };
        let scene = self.scenes.remove(index);
        self.id_by_name.remove(scene.name());
        log::info!(
            target: targets::WORLD,
            "Scene destroyed (scene_id={id}, name='{}', scene_count={}, active_scene_id={})",
            scene.name(),
            self.scenes.len(),
            self.active
        );
        true
    }

    pub fn fixed_tick(&mut self, tick: &FixedTickContext) -> Result<()> {
        match self.active_scene_mut() {
            Some(scene) => scene.fixed_tick(tick),
            None => Ok(()),
        }
    }

    pub fn tick(&mut self, tick: &FrameTickContext) -> Result<()> {
        match self.active_scene_mut() {
            Some(scene) => scene.tick(tick),
            None => Ok(()),
        }
    }

    pub fn late_tick(&mut self, tick: &FrameTickContext) -> Result<()> {
        match self.active_scene_mut() {
            Some(scene) => scene.late_tick(tick),
            None => Ok(()),
        }
    }
}
