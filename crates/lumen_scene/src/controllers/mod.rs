//! Input-driven camera controllers.
//!
//! Controllers only act while their owner is the active camera of the scene.
//! Both require the owner to have a camera when attached.

mod free_look;
mod trackball;

pub use free_look::{FreeLookCameraController, FreeLookConfig};
pub use trackball::{TrackballCameraController, TrackballConfig};

use glam::Vec3;
use lumen_core::errors::{LumenError, Result};

use crate::component::ComponentContext;

/// Unit vector for yaw around +Y (from +Z toward +X) and pitch above the XZ plane.
pub(crate) fn spherical_direction(yaw_degrees: f32, pitch_degrees: f32) -> Vec3 {
    let (yaw, pitch) = (yaw_degrees.to_radians(), pitch_degrees.to_radians());
    Vec3::new(yaw.sin() * pitch.cos(), pitch.sin(), yaw.cos() * pitch.cos()).normalize()
}

pub(crate) fn require_camera(ctx: &ComponentContext<'_>, controller: &str) -> Result<()> {
    if ctx.cameras().has_camera(ctx.owner()) {
        return Ok(());
    }
    Err(LumenError::invariant(format!(
        "{controller} owner {} does not have a bound camera.",
        ctx.owner()
    )))
}

pub(crate) fn validate_pitch_range(min: f32, max: f32, config: &str) -> Result<()> {
    if min > max {
        return Err(LumenError::invalid_argument(format!(
            "{config} pitch_min_degrees must be <= pitch_max_degrees."
        )));
    }
    Ok(())
}
