//! Cameras bound to a scene-graph node.
//!
//! A camera looks along its owner's `back` axis (-Z), so "camera front" in
//! scene space is the node's back. The view matrix is the inverse of the
//! owner's world matrix.

use glam::{Mat4, Vec3};
use lumen_core::errors::{LumenError, Result};
use lumen_core::ids::GameObjectId;

use crate::graph::SceneGraph;

/// Smallest half-extent an orthographic camera can be zoomed to.
pub const MIN_ORTHO_HALF_EXTENT: f32 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerspectiveProjection {
    pub fov_degrees: f32,
    pub aspect_ratio: f32,
}

impl Default for PerspectiveProjection {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            aspect_ratio: 16.0 / 9.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrthographicProjection {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
}

impl Default for OrthographicProjection {
    fn default() -> Self {
        Self {
            left: -5.0,
            right: 5.0,
            bottom: -5.0,
            top: 5.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Projection {
    Perspective(PerspectiveProjection),
    Orthographic(OrthographicProjection),
}

#[derive(Clone, Debug)]
pub struct Camera {
    owner: GameObjectId,
    pub near: f32,
    pub far: f32,
    pub projection: Projection,
}

impl Camera {
    #[must_use]
    pub fn perspective(owner: GameObjectId) -> Self {
        Self {
            owner,
            near: 0.1,
            far: 100.0,
            projection: Projection::Perspective(PerspectiveProjection::default()),
        }
    }

    #[must_use]
    pub fn orthographic(owner: GameObjectId) -> Self {
        Self {
            owner,
            near: -5.0,
            far: 5.0,
            projection: Projection::Orthographic(OrthographicProjection::default()),
        }
    }

    #[must_use]
    pub fn owner(&self) -> GameObjectId {
        self.owner
    }

    #[must_use]
    pub fn is_perspective(&self) -> bool {
        matches!(self.projection, Projection::Perspective(_))
    }

    #[must_use]
    pub fn perspective_params(&self) -> Option<&PerspectiveProjection> {
        match &self.projection {
            Projection::Perspective(params) => Some(params),
            Projection::Orthographic(_) => None,
        }
    }

    pub fn perspective_params_mut(&mut self) -> Option<&mut PerspectiveProjection> {
        match &mut self.projection {
            Projection::Perspective(params) => Some(params),
            Projection::Orthographic(_) => None,
        }
    }

    #[must_use]
    pub fn orthographic_params(&self) -> Option<&OrthographicProjection> {
        match &self.projection {
            Projection::Orthographic(params) => Some(params),
            Projection::Perspective(_) => None,
        }
    }

    /// Updates the perspective aspect ratio; orthographic cameras ignore it.
    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        if let Some(params) = self.perspective_params_mut()
            && aspect_ratio.is_finite()
            && aspect_ratio > 0.0
        {
            params.aspect_ratio = aspect_ratio;
        }
    }

    /// Right-handed projection with a `[0, 1]` depth range.
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        match &self.projection {
            Projection::Perspective(params) => Mat4::perspective_rh(
                params.fov_degrees.to_radians(),
                params.aspect_ratio,
                self.near,
                self.far,
            ),
            Projection::Orthographic(params) => Mat4::orthographic_rh(
                params.left,
                params.right,
                params.bottom,
                params.top,
                self.near,
                self.far,
            ),
        }
    }

    fn owner_world(&self, graph: &SceneGraph) -> Result<Mat4> {
        graph
            .world_matrix(self.owner)
            .ok_or_else(|| LumenError::not_found(format!("camera owner {} has no scene-graph node", self.owner)))
    }

    pub fn view_matrix(&self, graph: &SceneGraph) -> Result<Mat4> {
        Ok(self.owner_world(graph)?.inverse())
    }

    pub fn world_position(&self, graph: &SceneGraph) -> Result<Vec3> {
        Ok(self.owner_world(graph)?.w_axis.truncate())
    }

    /// Direction the camera looks along, in world space.
    pub fn world_front(&self, graph: &SceneGraph) -> Result<Vec3> {
        graph
            .node(self.owner)
            .map(|node| node.world_back())
            .ok_or_else(|| LumenError::not_found(format!("camera owner {} has no scene-graph node", self.owner)))
    }

    /// Turns the owner so the camera looks at `point` (world space).
    pub fn look_at_point_world(&self, graph: &mut SceneGraph, point: Vec3) -> Result<()> {
        let mut node = graph
            .node_mut(self.owner)
            .ok_or_else(|| LumenError::not_found(format!("camera owner {} has no scene-graph node", self.owner)))?;
        let to_target = point - node.world_position();
        node.look_at_direction_world(-to_target);
        Ok(())
    }

    /// Turns the owner so the camera looks along `direction` (world space).
    pub fn look_at_direction_world(&self, graph: &mut SceneGraph, direction: Vec3) -> Result<()> {
        let mut node = graph
            .node_mut(self.owner)
            .ok_or_else(|| LumenError::not_found(format!("camera owner {} has no scene-graph node", self.owner)))?;
        node.look_at_direction_world(-direction);
        Ok(())
    }

    /// Perspective: dolly the owner along the camera front by `delta`.
    /// Orthographic: grow both half-extents by `delta` around the frame center.
    pub fn adjust_zoom(&mut self, graph: &mut SceneGraph, delta: f32) -> Result<()> {
        if let Projection::Orthographic(params) = &mut self.projection {
            let center_x = (params.left + params.right) * 0.5;
            let center_y = (params.bottom + params.top) * 0.5;
            let half_w = ((params.right - params.left) * 0.5 + delta).max(MIN_ORTHO_HALF_EXTENT);
            let half_h = ((params.top - params.bottom) * 0.5 + delta).max(MIN_ORTHO_HALF_EXTENT);
            params.left = center_x - half_w;
            params.right = center_x + half_w;
            params.bottom = center_y - half_h;
            params.top = center_y + half_h;
            return Ok(());
        }
        let front = self.world_front(graph)?;
        let position = self.world_position(graph)?;
        graph.set_world_position(self.owner, position + front * delta);
        Ok(())
    }
}
