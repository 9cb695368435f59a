//! Borrowed views of one scene-graph node.
//!
//! [`NodeRef`] reads, [`NodeMut`] reads and writes. Both are created by
//! [`SceneGraph::node`] / [`SceneGraph::node_mut`] only for registered ids, so
//! their accessors fall back to identity values instead of failing.
//!
//! Axis convention: up `+Y`, right `+X`, front `+Z`, back `-Z`. Local axes use
//! the local rotation, world axes the rotation extracted from the world matrix.

use glam::{Mat4, Quat, Vec3};
use lumen_core::ids::GameObjectId;

use crate::graph::SceneGraph;
use crate::transform::{DIRECTION_EPSILON, LocalTransform, rotation_of, scale_of};

macro_rules! node_getters {
    () => {
        #[must_use]
        pub fn id(&self) -> GameObjectId {
            self.id
        }

        #[must_use]
        pub fn parent(&self) -> GameObjectId {
            self.graph.parent(self.id).unwrap_or(GameObjectId::INVALID)
        }

        #[must_use]
        pub fn local_transform(&self) -> LocalTransform {
            self.graph.local_transform(self.id).unwrap_or_default()
        }

        #[must_use]
        pub fn local_position(&self) -> Vec3 {
            self.local_transform().position
        }

        #[must_use]
        pub fn local_rotation(&self) -> Quat {
            self.local_transform().rotation
        }

        #[must_use]
        pub fn local_scale(&self) -> Vec3 {
            self.local_transform().scale
        }

        #[must_use]
        pub fn local_model_matrix(&self) -> Mat4 {
            self.local_transform().to_matrix()
        }

        #[must_use]
        pub fn world_matrix(&self) -> Mat4 {
            self.graph.world_matrix(self.id).unwrap_or(Mat4::IDENTITY)
        }

        #[must_use]
        pub fn world_position(&self) -> Vec3 {
            self.world_matrix().w_axis.truncate()
        }

        #[must_use]
        pub fn world_rotation(&self) -> Quat {
            rotation_of(&self.world_matrix())
        }

        #[must_use]
        pub fn world_scale(&self) -> Vec3 {
            scale_of(&self.world_matrix())
        }

        /// `transpose(inverse(world))`.
        #[must_use]
        pub fn normal_matrix(&self) -> Mat4 {
            self.world_matrix().inverse().transpose()
        }

        #[must_use]
        pub fn up(&self) -> Vec3 {
            self.local_rotation() * Vec3::Y
        }

        #[must_use]
        pub fn down(&self) -> Vec3 {
            self.local_rotation() * Vec3::NEG_Y
        }

        #[must_use]
        pub fn right(&self) -> Vec3 {
            self.local_rotation() * Vec3::X
        }

        #[must_use]
        pub fn left(&self) -> Vec3 {
            self.local_rotation() * Vec3::NEG_X
        }

        #[must_use]
        pub fn front(&self) -> Vec3 {
            self.local_rotation() * Vec3::Z
        }

        #[must_use]
        pub fn back(&self) -> Vec3 {
            self.local_rotation() * Vec3::NEG_Z
        }

        #[must_use]
        pub fn world_up(&self) -> Vec3 {
            self.world_rotation() * Vec3::Y
        }

        #[must_use]
        pub fn world_down(&self) -> Vec3 {
            self.world_rotation() * Vec3::NEG_Y
        }

        #[must_use]
        pub fn world_right(&self) -> Vec3 {
            self.world_rotation() * Vec3::X
        }

        #[must_use]
        pub fn world_left(&self) -> Vec3 {
            self.world_rotation() * Vec3::NEG_X
        }

        #[must_use]
        pub fn world_front(&self) -> Vec3 {
            self.world_rotation() * Vec3::Z
        }

        #[must_use]
        pub fn world_back(&self) -> Vec3 {
            self.world_rotation() * Vec3::NEG_Z
        }

        #[must_use]
        pub fn is_enabled(&self) -> bool {
            self.graph.is_enabled(self.id)
        }

        #[must_use]
        pub fn is_active_in_hierarchy(&self) -> bool {
            self.graph.is_active_in_hierarchy(self.id)
        }
    };
}

#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    graph: &'a SceneGraph,
    id: GameObjectId,
}

impl<'a> NodeRef<'a> {
    pub(crate) fn new(graph: &'a SceneGraph, id: GameObjectId) -> Self {
        Self { graph, id }
    }

    node_getters!();
}

pub struct NodeMut<'a> {
    graph: &'a mut SceneGraph,
    id: GameObjectId,
}

impl<'a> NodeMut<'a> {
    pub(crate) fn new(graph: &'a mut SceneGraph, id: GameObjectId) -> Self {
        Self { graph, id }
    }

    node_getters!();

    pub fn set_local_position(&mut self, position: Vec3) -> &mut Self {
        self.graph.set_local_position(self.id, position);
        self
    }

    pub fn set_local_rotation(&mut self, rotation: Quat) -> &mut Self {
        self.graph.set_local_rotation(self.id, rotation);
        self
    }

    pub fn set_local_scale(&mut self, scale: Vec3) -> &mut Self {
        self.graph.set_local_scale(self.id, scale);
        self
    }

    pub fn set_local_model_matrix(&mut self, matrix: &Mat4) -> &mut Self {
        self.graph.set_local_model_matrix(self.id, matrix);
        self
    }

    pub fn set_world_position(&mut self, position: Vec3) -> &mut Self {
        self.graph.set_world_position(self.id, position);
        self
    }

    pub fn set_world_rotation(&mut self, rotation: Quat) -> &mut Self {
        self.graph.set_world_rotation(self.id, rotation);
        self
    }

    pub fn set_world_scale(&mut self, scale: Vec3) -> &mut Self {
        self.graph.set_world_scale(self.id, scale);
        self
    }

    /// Turns the node so its local [`front`](Self::front) points along
    /// `direction` (parent space). Zero-length input is ignored; a direction
    /// opposite to the current front flips around the current up axis.
    pub fn look_at_direction(&mut self, direction: Vec3) -> &mut Self {
        if direction.length() < DIRECTION_EPSILON {
            return self;
        }
        let direction = direction.normalize();
        let front = self.front();
        let rotation = self.local_rotation();

        if front.cross(direction).length() < DIRECTION_EPSILON {
            if front.dot(direction) < 0.0 {
                let flip = Quat::from_axis_angle(self.up().normalize(), std::f32::consts::PI);
                self.set_local_rotation(flip * rotation);
            }
            return self;
        }

        let delta = Quat::from_rotation_arc(front.normalize(), direction);
        self.set_local_rotation((delta * rotation).normalize())
    }

    /// Like [`look_at_direction`](Self::look_at_direction) with a world-space direction.
    pub fn look_at_direction_world(&mut self, direction: Vec3) -> &mut Self {
        let parent_rotation = match self.graph.parent(self.id) {
            Some(parent) if parent.is_valid() => self
                .graph
                .world_matrix(parent)
                .map_or(Quat::IDENTITY, |matrix| rotation_of(&matrix)),
            _ => Quat::IDENTITY,
        };
        self.look_at_direction(parent_rotation.inverse() * direction)
    }

    /// Points the front axis at `point` given in parent space.
    pub fn look_at_point(&mut self, point: Vec3) -> &mut Self {
        let position = self.local_position();
        self.look_at_direction(point - position)
    }

    pub fn look_at_point_world(&mut self, point: Vec3) -> &mut Self {
        let position = self.world_position();
        self.look_at_direction_world(point - position)
    }

    pub fn translate(&mut self, direction: Vec3, distance: f32) -> &mut Self {
        let position = self.local_position();
        self.set_local_position(position + direction * distance)
    }

    /// Pre-multiplies the local rotation by `angle_degrees` around `axis`.
    pub fn rotate(&mut self, angle_degrees: f32, axis: Vec3) -> &mut Self {
        if axis.length() < DIRECTION_EPSILON {
            return self;
        }
        let delta = Quat::from_axis_angle(axis.normalize(), angle_degrees.to_radians());
        let rotation = self.local_rotation();
        self.set_local_rotation(delta * rotation)
    }

    pub fn set_enabled(&mut self, enabled: bool) -> &mut Self {
        self.graph.set_enabled(self.id, enabled);
        self
    }

    #[must_use]
    pub fn view(&self) -> NodeRef<'_> {
        NodeRef::new(self.graph, self.id)
    }
}
