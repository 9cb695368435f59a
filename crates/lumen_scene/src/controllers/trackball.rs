use glam::Vec3;
use lumen_core::errors::{LumenError, Result};
use lumen_core::ids::GameObjectId;
use lumen_core::logging::targets;

use super::{require_camera, spherical_direction, validate_pitch_range};
use crate::component::{Component, ComponentContext};
use crate::graph::SceneGraph;
use crate::input::{MouseButton, SharedInput};
use crate::tick::FrameTickContext;
use crate::transform::{DIRECTION_EPSILON, rotation_looking_to};

const MIN_RADIUS: f32 = 1e-5;

#[derive(Clone, Debug, PartialEq)]
pub struct TrackballConfig {
    /// Degrees per pixel
    pub rotate_speed: f32,
    /// World units per pixel and per unit of orbit radius
    pub pan_speed: f32,
    pub zoom_speed: f32,
    pub pitch_min_degrees: f32,
    pub pitch_max_degrees: f32,
    pub world_up: Vec3,
    pub default_target: Vec3,
}

impl Default for TrackballConfig {
    fn default() -> Self {
        Self {
            rotate_speed: 0.06,
            pan_speed: 0.0012,
            zoom_speed: 0.35,
            pitch_min_degrees: -89.0,
            pitch_max_degrees: 89.0,
            world_up: Vec3::Y,
            default_target: Vec3::ZERO,
        }
    }
}

fn validate_config(config: &TrackballConfig) -> Result<()> {
    validate_pitch_range(config.pitch_min_degrees, config.pitch_max_degrees, "TrackballConfig")?;
    if config.world_up.length() <= DIRECTION_EPSILON {
        return Err(LumenError::invalid_argument(
            "TrackballConfig world_up must have non-zero length.",
        ));
    }
    Ok(())
}

/// Orbits the owner around a target: left drag rotates, middle drag pans,
/// scroll dollies.
pub struct TrackballCameraController {
    input: SharedInput,
    config: TrackballConfig,
    orbit_initialized: bool,
    target: Vec3,
    radius: f32,
    yaw_degrees: f32,
    pitch_degrees: f32,
}

impl TrackballCameraController {
    pub fn new(input: SharedInput, config: TrackballConfig) -> Result<Self> {
        validate_config(&config)?;
        Ok(Self {
            input,
            target: config.default_target,
            config,
            orbit_initialized: false,
            radius: 1.0,
            yaw_degrees: 0.0,
            pitch_degrees: 0.0,
        })
    }

    #[must_use]
    pub fn config(&self) -> &TrackballConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: TrackballConfig) -> Result<()> {
        validate_config(&config)?;
        self.config = config;
        Ok(())
    }

    #[must_use]
    pub fn target(&self) -> Vec3 {
        self.target
    }

    /// Moves the orbit center; the orbit re-syncs on the next update.
    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
        self.orbit_initialized = false;
    }

    #[must_use]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    fn look_rotation(&self, direction: Vec3) -> glam::Quat {
        rotation_looking_to(direction, self.config.world_up)
    }

    fn sync_spherical(&mut self, graph: &SceneGraph, owner: GameObjectId) {
        let position = graph.node(owner).map_or(Vec3::ZERO, |node| node.world_position());
        let offset = position - self.target;
        self.radius = offset.length().max(MIN_RADIUS);
        self.yaw_degrees = offset.x.atan2(offset.z).to_degrees();
        self.pitch_degrees = (offset.y / self.radius)
            .clamp(-1.0, 1.0)
            .asin()
            .to_degrees()
            .clamp(self.config.pitch_min_degrees, self.config.pitch_max_degrees);
    }

    fn face_target(&self, graph: &mut SceneGraph, owner: GameObjectId) {
        let position = graph.node(owner).map_or(Vec3::ZERO, |node| node.world_position());
        let look = self.target - position;
        if look.length() > MIN_RADIUS {
            graph.set_world_rotation(owner, self.look_rotation(look));
        }
    }

    fn apply_orbit_pose(&self, graph: &mut SceneGraph, owner: GameObjectId) {
        let position = self.target + spherical_direction(self.yaw_degrees, self.pitch_degrees) * self.radius;
        let look = self.target - position;
        if look.length() <= MIN_RADIUS {
            return;
        }
        graph.set_world_position(owner, position);
        graph.set_world_rotation(owner, self.look_rotation(look));
    }
}

impl Component for TrackballCameraController {
    fn on_awake(&mut self, ctx: &mut ComponentContext<'_>) -> Result<()> {
        require_camera(ctx, "TrackballCameraController")
    }

    fn on_update(&mut self, ctx: &mut ComponentContext<'_>, _tick: &FrameTickContext) -> Result<()> {
        if !ctx.owner_is_active_camera() {
            return Ok(());
        }
        require_camera(ctx, "TrackballCameraController")?;
        let owner = ctx.owner;

        if !self.orbit_initialized {
            self.sync_spherical(&*ctx.graph, owner);
            self.face_target(ctx.graph, owner);
            self.orbit_initialized = true;
        }

        let input = self.input.read().clone();
        if input.mouse_button_down(MouseButton::Left) {
            self.yaw_degrees += input.mouse_dx() * self.config.rotate_speed;
            self.pitch_degrees = (self.pitch_degrees + input.mouse_dy() * self.config.rotate_speed)
                .clamp(self.config.pitch_min_degrees, self.config.pitch_max_degrees);
            self.apply_orbit_pose(ctx.graph, owner);
            log::trace!(
                target: targets::TRACKBALL,
                "Trackball orbit updated (owner_id={owner}, yaw_deg={}, pitch_deg={}, radius={:.4})",
                self.yaw_degrees,
                self.pitch_degrees,
                self.radius
            );
        } else if input.mouse_button_down(MouseButton::Middle) {
            let Some(node) = ctx.graph.node(owner) else {
                return Err(LumenError::not_found(format!("camera owner {owner} has no scene-graph node")));
            };
            let scale = self.config.pan_speed * self.radius.max(MIN_RADIUS);
            let delta = node.world_right() * input.mouse_dx() * scale + node.world_up() * input.mouse_dy() * scale;
            let position = node.world_position() + delta;
            self.target += delta;
            ctx.graph.set_world_position(owner, position);
            self.face_target(ctx.graph, owner);
            log::trace!(target: targets::TRACKBALL, "Trackball pan updated (owner_id={owner}, delta={delta:?})");
        }

        let scroll = input.scroll_dy();
        if scroll != 0.0 {
            let camera = ctx.cameras.camera_mut(owner).ok_or_else(|| {
                LumenError::invariant(format!(
                    "TrackballCameraController owner {owner} does not have a bound camera."
                ))
            })?;
            camera.adjust_zoom(ctx.graph, scroll * self.config.zoom_speed)?;
            if camera.is_perspective() {
                self.sync_spherical(&*ctx.graph, owner);
            }
        }
        Ok(())
    }
}
