//! Per-scene camera registry with one active camera.

use lumen_core::errors::{LumenError, Result};
use lumen_core::ids::GameObjectId;
use lumen_core::logging::targets;
use rustc_hash::FxHashMap;

use crate::camera::Camera;
use crate::graph::SceneGraph;

/// Owns every camera of a scene, keyed by owner id, in creation order.
///
/// The first camera created becomes active. Destroying the active camera
/// activates the camera that followed it in creation order (wrapping around).
#[derive(Debug, Default)]
pub struct CameraManager {
    cameras: FxHashMap<GameObjectId, Camera>,
    order: Vec<GameObjectId>,
    active_owner: GameObjectId,
}

impl CameraManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, graph: &SceneGraph, camera: Camera) -> Result<&mut Camera> {
        let owner = camera.owner();
        if !owner.is_valid() || !graph.has_node(owner) {
            log::error!(target: targets::CAMERA_MANAGER, "create_camera failed: invalid owner id {owner}.");
            return Err(LumenError::not_found(format!(
                "camera owner id {owner} is invalid or does not exist in the scene graph"
            )));
        }
        if self.cameras.contains_key(&owner) {
            log::warn!(target: targets::CAMERA_MANAGER, "create_camera rejected: owner {owner} already has a camera.");
            return Err(LumenError::invariant(format!("game object {owner} already has a camera")));
        }
        self.order.push(owner);
        if !self.active_owner.is_valid() {
            self.active_owner = owner;
        }
        log::info!(
            target: targets::CAMERA_MANAGER,
            "Camera created (owner_id={owner}, camera_count={}, active_owner_id={})",
            self.order.len(),
            self.active_owner
        );
        Ok(self.cameras.entry(owner).or_insert(camera))
    }

    pub fn create_perspective_camera(&mut self, graph: &SceneGraph, owner: GameObjectId) -> Result<&mut Camera> {
        self.insert(graph, Camera::perspective(owner))
    }

    pub fn create_orthographic_camera(&mut self, graph: &SceneGraph, owner: GameObjectId) -> Result<&mut Camera> {
        self.insert(graph, Camera::orthographic(owner))
    }

    /// Removes the camera owned by `owner`. Returns `false` if there was none.
    pub fn destroy_camera(&mut self, owner: GameObjectId) -> bool {
        if self.cameras.remove(&owner).is_none() {
            log::warn!(target: targets::CAMERA_MANAGER, "destroy_camera ignored: owner {owner} has no camera.");
            return false;
        }
        let Some(removed_index) = self.order.iter().position(|id| *id == owner) else {
            log::error!(target: targets::CAMERA_MANAGER, "Camera order/storage mismatch while destroying owner {owner}.");
            return true;
        };
        self.order.remove(removed_index);

        if self.order.is_empty() {
            self.active_owner = GameObjectId::INVALID;
        } else if self.active_owner == owner {
            self.active_owner = self.order[removed_index % self.order.len()];
        }
        log::info!(
            target: targets::CAMERA_MANAGER,
            "Camera destroyed (owner_id={owner}, camera_count={}, active_owner_id={})",
            self.order.len(),
            self.active_owner
        );
        true
    }

    /// Drops the cameras of destroyed game objects.
    pub fn on_game_objects_destroyed(&mut self, ids: &[GameObjectId]) {
        for id in ids {
            if self.cameras.contains_key(id) {
                self.destroy_camera(*id);
            }
        }
    }

    #[must_use]
    pub fn camera(&self, owner: GameObjectId) -> Option<&Camera> {
        self.cameras.get(&owner)
    }

    pub fn camera_mut(&mut self, owner: GameObjectId) -> Option<&mut Camera> {
        self.cameras.get_mut(&owner)
    }

    #[must_use]
    pub fn has_camera(&self, owner: GameObjectId) -> bool {
        self.cameras.contains_key(&owner)
    }

    #[must_use]
    pub fn camera_count(&self) -> usize {
        self.order.len()
    }

    /// Owners in creation order.
    #[must_use]
    pub fn camera_owners(&self) -> &[GameObjectId] {
        &self.order
    }

    #[must_use]
    pub fn active_camera_owner(&self) -> GameObjectId {
        self.active_owner
    }

    #[must_use]
    pub fn active_camera(&self) -> Option<&Camera> {
        self.cameras.get(&self.active_owner)
    }

    pub fn active_camera_mut(&mut self) -> Option<&mut Camera> {
        self.cameras.get_mut(&self.active_owner)
    }

    pub fn set_active_camera(&mut self, owner: GameObjectId) -> bool {
        if !self.cameras.contains_key(&owner) {
            log::warn!(target: targets::CAMERA_MANAGER, "set_active_camera failed: owner {owner} has no camera.");
            return false;
        }
        self.active_owner = owner;
        log::info!(target: targets::CAMERA_MANAGER, "Active camera owner changed to {owner}.");
        true
    }
}
