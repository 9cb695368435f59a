//! Component model.
//!
//! A component is a boxed [`Component`] trait object owned by one
//! [`GameObject`](crate::game_object::GameObject); at most one component of
//! each concrete type exists per object. Every hook receives a
//! [`ComponentContext`] that lends the owner's scene-graph node, the scene's
//! camera manager and read access to the sibling components.

use std::any::Any;

use lumen_core::errors::Result;
use lumen_core::ids::GameObjectId;

use crate::camera_manager::CameraManager;
use crate::graph::SceneGraph;
use crate::node::{NodeMut, NodeRef};
use crate::tick::{FixedTickContext, FrameTickContext};

/// Lifecycle hooks of a component. All hooks default to doing nothing.
pub trait Component: Any + Send {
    /// Type name used in error messages and logs.
    fn component_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Runs once, right after the component is attached.
    fn on_awake(&mut self, _ctx: &mut ComponentContext<'_>) -> Result<()> {
        Ok(())
    }

    fn on_fixed_update(&mut self, _ctx: &mut ComponentContext<'_>, _tick: &FixedTickContext) -> Result<()> {
        Ok(())
    }

    fn on_update(&mut self, _ctx: &mut ComponentContext<'_>, _tick: &FrameTickContext) -> Result<()> {
        Ok(())
    }

    fn on_late_update(&mut self, _ctx: &mut ComponentContext<'_>, _tick: &FrameTickContext) -> Result<()> {
        Ok(())
    }

    /// Runs once when the owner is destroyed. Errors are logged, never propagated.
    fn on_destroy(&mut self, _ctx: &mut ComponentContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// A component together with its enable flag.
pub struct ComponentSlot {
    pub(crate) component: Box<dyn Component>,
    pub(crate) enabled: bool,
}

impl ComponentSlot {
    pub(crate) fn new(component: Box<dyn Component>) -> Self {
        Self {
            component,
            enabled: true,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.component.component_name()
    }

    #[must_use]
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        let any: &dyn Any = self.component.as_ref();
        any.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        let any: &mut dyn Any = self.component.as_mut();
        any.downcast_mut::<T>()
    }

    #[must_use]
    pub fn is<T: Component>(&self) -> bool {
        let any: &dyn Any = self.component.as_ref();
        any.is::<T>()
    }
}

/// What a component hook may touch while it runs.
pub struct ComponentContext<'a> {
    pub(crate) owner: GameObjectId,
    pub(crate) graph: &'a mut SceneGraph,
    pub(crate) cameras: &'a mut CameraManager,
    pub(crate) before: &'a [ComponentSlot],
    pub(crate) after: &'a [ComponentSlot],
}

impl<'a> ComponentContext<'a> {
    pub(crate) fn new(
        owner: GameObjectId,
        graph: &'a mut SceneGraph,
        cameras: &'a mut CameraManager,
        before: &'a [ComponentSlot],
        after: &'a [ComponentSlot],
    ) -> Self {
        Self {
            owner,
            graph,
            cameras,
            before,
            after,
        }
    }

    #[must_use]
    pub fn owner(&self) -> GameObjectId {
        self.owner
    }

    #[must_use]
    pub fn graph(&self) -> &SceneGraph {
        self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        self.graph
    }

    #[must_use]
    pub fn cameras(&self) -> &CameraManager {
        self.cameras
    }

    pub fn cameras_mut(&mut self) -> &mut CameraManager {
        self.cameras
    }

    /// Read view of the owner's node.
    #[must_use]
    pub fn node(&self) -> Option<NodeRef<'_>> {
        self.graph.node(self.owner)
    }

    /// Write view of the owner's node.
    pub fn node_mut(&mut self) -> Option<NodeMut<'_>> {
        self.graph.node_mut(self.owner)
    }

    /// Another component attached to the same owner, enabled or not.
    #[must_use]
    pub fn sibling<T: Component>(&self) -> Option<&T> {
        self.before
            .iter()
            .chain(self.after.iter())
            .find_map(ComponentSlot::downcast_ref::<T>)
    }

    #[must_use]
    pub fn has_sibling<T: Component>(&self) -> bool {
        self.sibling::<T>().is_some()
    }

    /// `true` if the owner is the active camera of the scene.
    #[must_use]
    pub fn owner_is_active_camera(&self) -> bool {
        self.cameras.active_camera_owner() == self.owner
    }
}
