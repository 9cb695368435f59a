use lumen_core::errors::{LumenError, Result};
use lumen_core::ids::GameObjectId;
use lumen_core::logging::targets;

use crate::camera_manager::CameraManager;
use crate::component::{Component, ComponentContext, ComponentSlot};
use crate::graph::SceneGraph;

/// An identified scene entity: a scene-graph node plus unique-per-type components.
///
/// The transform lives in the scene's [`SceneGraph`] under the same id; the
/// object itself only owns its components. Names are kept by the [`Scene`].
///
/// [`Scene`]: crate::scene::Scene
pub struct GameObject {
    id: GameObjectId,
    pub(crate) components: Vec<ComponentSlot>,
}

impl GameObject {
    pub(crate) fn new(id: GameObjectId) -> Self {
        Self {
            id,
            components: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> GameObjectId {
        self.id
    }

    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Type names of the attached components, in insertion order.
    #[must_use]
    pub fn component_names(&self) -> Vec<&'static str> {
        self.components.iter().map(ComponentSlot::name).collect()
    }

    #[must_use]
    pub fn get_component<T: Component>(&self) -> Option<&T> {
        self.components.iter().find_map(ComponentSlot::downcast_ref::<T>)
    }

    pub fn get_component_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.components.iter_mut().find_map(ComponentSlot::downcast_mut::<T>)
    }

    #[must_use]
    pub fn has_component<T: Component>(&self) -> bool {
        self.components.iter().any(ComponentSlot::is::<T>)
    }

    /// Like [`get_component`](Self::get_component), but a missing component is an error.
    pub fn component_or_err<T: Component>(&self) -> Result<&T> {
        self.get_component::<T>().ok_or_else(|| {
            log::error!(
                target: targets::COMPONENT,
                "component_or_err failed: GameObject {} missing component type '{}'.",
                self.id,
                std::any::type_name::<T>()
            );
            LumenError::not_found(format!(
                "GameObject {} missing required component: {}",
                self.id,
                std::any::type_name::<T>()
            ))
        })
    }

    #[must_use]
    pub fn is_component_enabled<T: Component>(&self) -> Option<bool> {
        self.components
            .iter()
            .find(|slot| slot.is::<T>())
            .map(ComponentSlot::is_enabled)
    }

    pub(crate) fn set_component_enabled<T: Component>(&mut self, enabled: bool) -> bool {
        match self.components.iter_mut().find(|slot| slot.is::<T>()) {
            Some(slot) => {
                slot.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub(crate) fn attach<T: Component>(
        &mut self,
        graph: &mut SceneGraph,
        cameras: &mut CameraManager,
        mut component: T,
    ) -> Result<&mut T> {
        let type_name = std::any::type_name::<T>();
        if self.has_component::<T>() {
            log::warn!(
                target: targets::COMPONENT,
                "add_component rejected: duplicate component type '{type_name}' on GameObject {}.",
                self.id
            );
            return Err(LumenError::invariant(format!(
                "GameObject {} already has a component of type {type_name}",
                self.id
            )));
        }

        let mut ctx = ComponentContext::new(self.id, graph, cameras, &self.components, &[]);
        component
            .on_awake(&mut ctx)
            .map_err(|err| err.with_context(format!("on_awake of {type_name} on GameObject {}", self.id)))?;

        self.components.push(ComponentSlot::new(Box::new(component)));
        log::debug!(
            target: targets::COMPONENT,
            "Component added (game_object_id={}, component_type='{type_name}', component_count={})",
            self.id,
            self.components.len()
        );
        self.components
            .last_mut()
            .and_then(ComponentSlot::downcast_mut::<T>)
            .ok_or_else(|| LumenError::invariant(format!("component {type_name} missing right after insertion")))
    }

    /// Runs `hook` on every enabled component in insertion order, handing each
    /// one a context with its siblings. Stops at the first error.
    pub(crate) fn dispatch<F>(
        &mut self,
        graph: &mut SceneGraph,
        cameras: &mut CameraManager,
        stage: &str,
        mut hook: F,
    ) -> Result<()>
    where
        F: FnMut(&mut dyn Component, &mut ComponentContext<'_>) -> Result<()>,
    {
        if !graph.is_active_in_hierarchy(self.id) {
            return Ok(());
        }
        for index in 0..self.components.len() {
            let (before, rest) = self.components.split_at_mut(index);
            let Some((slot, after)) = rest.split_first_mut() else {
                break;
            };
            if !slot.enabled {
                continue;
            }
            let name = slot.component.component_name();
            let mut ctx = ComponentContext::new(self.id, graph, cameras, before, after);
            hook(slot.component.as_mut(), &mut ctx)
                .map_err(|err| err.with_context(format!("{stage} of {name} on GameObject {}", self.id)))?;
        }
        Ok(())
    }

    /// Calls `on_destroy` on every component in insertion order and drops them.
    pub(crate) fn destroy_components(&mut self, graph: &mut SceneGraph, cameras: &mut CameraManager) {
        for index in 0..self.components.len() {
            let (before, rest) = self.components.split_at_mut(index);
            let Some((slot, after)) = rest.split_first_mut() else {
                break;
            };
            let mut ctx = ComponentContext::new(self.id, graph, cameras, before, after);
            if let Err(err) = slot.component.on_destroy(&mut ctx) {
                log::error!(
                    target: targets::COMPONENT,
                    "on_destroy of {} failed on GameObject {}: {err}",
                    slot.component.component_name(),
                    self.id
                );
            }
        }
        self.components.clear();
    }
}

impl std::fmt::Debug for GameObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameObject")
            .field("id", &self.id)
            .field("components", &self.component_names())
            .finish()
    }
}
