use glam::Vec3;
use lumen_core::errors::{LumenError, Result};
use lumen_core::logging::targets;

use super::{require_camera, spherical_direction, validate_pitch_range};
use crate::component::{Component, ComponentContext};
use crate::input::{Key, MouseButton, SharedInput};
use crate::tick::FrameTickContext;
use crate::transform::rotation_looking_to;

#[derive(Clone, Debug, PartialEq)]
pub struct FreeLookConfig {
    pub move_speed: f32,
    pub sprint_multiplier: f32,
    /// Degrees per pixel
    pub mouse_sensitivity: f32,
    pub zoom_speed: f32,
    pub pitch_min_degrees: f32,
    pub pitch_max_degrees: f32,
}

impl Default for FreeLookConfig {
    fn default() -> Self {
        Self {
            move_speed: 5.0,
            sprint_multiplier: 3.0,
            mouse_sensitivity: 0.12,
            zoom_speed: 0.8,
            pitch_min_degrees: -89.0,
            pitch_max_degrees: 89.0,
        }
    }
}

/// Fly camera: right mouse to look, WASD/QE to move, shift to sprint, scroll to zoom.
pub struct FreeLookCameraController {
    input: SharedInput,
    config: FreeLookConfig,
    angles_initialized: bool,
    yaw_degrees: f32,
    pitch_degrees: f32,
}

impl FreeLookCameraController {
    pub fn new(input: SharedInput, config: FreeLookConfig) -> Result<Self> {
        validate_pitch_range(config.pitch_min_degrees, config.pitch_max_degrees, "FreeLookConfig")?;
        Ok(Self {
            input,
            config,
            angles_initialized: false,
            yaw_degrees: 0.0,
            pitch_degrees: 0.0,
        })
    }

    #[must_use]
    pub fn config(&self) -> &FreeLookConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: FreeLookConfig) -> Result<()> {
        validate_pitch_range(config.pitch_min_degrees, config.pitch_max_degrees, "FreeLookConfig")?;
        self.config = config;
        Ok(())
    }

    /// Current `(yaw, pitch)` in degrees.
    #[must_use]
    pub fn angles(&self) -> (f32, f32) {
        (self.yaw_degrees, self.pitch_degrees)
    }

    fn clamp_pitch(&self, pitch: f32) -> f32 {
        pitch.clamp(self.config.pitch_min_degrees, self.config.pitch_max_degrees)
    }

    fn camera_front(ctx: &ComponentContext<'_>) -> Result<Vec3> {
        let camera = ctx.cameras.camera(ctx.owner).ok_or_else(|| {
            LumenError::invariant(format!(
                "FreeLookCameraController owner {} does not have a bound camera.",
                ctx.owner
            ))
        })?;
        camera.world_front(ctx.graph())
    }
}

impl Component for FreeLookCameraController {
    fn on_awake(&mut self, ctx: &mut ComponentContext<'_>) -> Result<()> {
        require_camera(ctx, "FreeLookCameraController")
    }

    fn on_update(&mut self, ctx: &mut ComponentContext<'_>, tick: &FrameTickContext) -> Result<()> {
        if !ctx.owner_is_active_camera() {
            return Ok(());
        }
        require_camera(ctx, "FreeLookCameraController")?;

        if !self.angles_initialized {
            let front = Self::camera_front(ctx)?.normalize_or_zero();
            self.yaw_degrees = front.x.atan2(front.z).to_degrees();
            self.pitch_degrees = self.clamp_pitch(front.y.clamp(-1.0, 1.0).asin().to_degrees());
            self.angles_initialized = true;
        }

        let input = self.input.read().clone();
        let owner = ctx.owner;

        if input.mouse_button_down(MouseButton::Right) {
            self.yaw_degrees += input.mouse_dx() * self.config.mouse_sensitivity;
            self.pitch_degrees = self.clamp_pitch(self.pitch_degrees - input.mouse_dy() * self.config.mouse_sensitivity);
            let front = spherical_direction(self.yaw_degrees, self.pitch_degrees);
            ctx.graph.set_world_rotation(owner, rotation_looking_to(front, Vec3::Y));
            log::trace!(
                target: targets::FREE_LOOK,
                "FreeLook rotation updated (owner_id={owner}, yaw_deg={}, pitch_deg={})",
                self.yaw_degrees,
                self.pitch_degrees
            );
        }

        let mut speed = self.config.move_speed;
        if input.key_down(Key::LeftShift) {
            speed *= self.config.sprint_multiplier;
        }

        let front = Self::camera_front(ctx)?;
        let (right, up, position) = match ctx.graph.node(owner) {
            Some(node) => (node.world_right(), node.world_up(), node.world_position()),
            None => return Err(LumenError::not_found(format!("camera owner {owner} has no scene-graph node"))),
        };

        let mut direction = Vec3::ZERO;
        for (key, axis) in [
            (Key::W, front),
            (Key::S, -front),
            (Key::D, right),
            (Key::A, -right),
            (Key::E, up),
            (Key::Q, -up),
        ] {
            if input.key_down(key) {
                direction += axis;
            }
        }
        if direction.length() > 0.0 {
            let dt = tick.delta_f32().max(0.0);
            let delta = direction.normalize() * speed * dt;
            ctx.graph.set_world_position(owner, position + delta);
            log::trace!(
                target: targets::FREE_LOOK,
                "FreeLook position updated (owner_id={owner}, delta={delta:?}, speed={speed:.4}, dt={dt:.4})"
            );
        }

        let scroll = input.scroll_dy();
        if scroll != 0.0
            && let Some(camera) = ctx.cameras.camera_mut(owner)
        {
            camera.adjust_zoom(ctx.graph, scroll * self.config.zoom_speed)?;
        }
        Ok(())
    }
}
