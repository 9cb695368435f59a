//! The contract between the engine loop and a render pipeline.

use std::path::{Path, PathBuf};

use lumen_core::errors::{LumenError, Result};
use lumen_core::event::TypedEventCenter;
use lumen_core::paths::lexically_normal;
use lumen_resources::ResourceManager;
use lumen_scene::World;

use crate::scheduler::{FrameTargets, FrameTicket, SwapchainState};

/// Environment variable consulted when no shader root is configured.
pub const SHADER_ROOT_ENV: &str = "LUMEN_SHADER_ROOT";

/// Inputs of the CPU-side preparation step that precedes recording.
pub struct FramePrepareContext<'a> {
    pub world: &'a World,
    pub resources: &'a mut ResourceManager,
    pub frame_serial: u64,
    pub delta_seconds: f64,
}

/// Which parts of the swapchain changed between two states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SwapchainChangeSummary {
    pub extent_changed: bool,
    pub image_count_changed: bool,
    pub color_format_changed: bool,
    pub depth_format_changed: bool,
}

impl SwapchainChangeSummary {
    #[must_use]
    pub fn between(previous: &SwapchainState, next: &SwapchainState) -> Self {
        Self {
            extent_changed: previous.extent != next.extent,
            image_count_changed: previous.image_count != next.image_count,
            color_format_changed: previous.color_format != next.color_format,
            depth_format_changed: previous.depth_format != next.depth_format,
        }
    }

    #[must_use]
    pub fn extent_or_depth_changed(&self) -> bool {
        self.extent_changed || self.depth_format_changed
    }

    #[must_use]
    pub fn color_or_depth_changed(&self) -> bool {
        self.color_format_changed || self.depth_format_changed
    }

    #[must_use]
    pub fn any(&self) -> bool {
        self.extent_changed || self.image_count_changed || self.color_format_changed || self.depth_format_changed
    }
}

pub trait RenderPipeline {
    fn name(&self) -> &str;

    /// Per-pipeline event center; hosts publish `SceneViewportResizeEvent` here.
    fn events(&self) -> &TypedEventCenter;

    /// Snapshots whatever the frame needs from the world. Runs before recording.
    fn prepare_frame(&mut self, _ctx: &mut FramePrepareContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Records the frame identified by `ticket` into `targets`.
    fn render(&mut self, ticket: &FrameTicket, targets: FrameTargets<'_>) -> Result<()>;

    fn on_resize(&mut self, _width: u32, _height: u32) {}

    /// Called whenever the scheduler reports a new swapchain generation.
    fn on_swapchain_state_changed(&mut self, state: &SwapchainState) -> Result<()>;

    /// Blocks until scene targets about to be replaced are no longer in use.
    fn wait_for_scene_target_rebuild(&self) -> Result<()> {
        Ok(())
    }
}

/// Resolves `filename` below the configured shader root, else below
/// `$LUMEN_SHADER_ROOT`.
pub fn resolve_shader_path(configured_root: Option<&Path>, filename: &str) -> Result<PathBuf> {
    if filename.is_empty() {
        return Err(LumenError::invalid_argument("Shader filename must not be empty."));
    }
    let root = match configured_root {
        Some(root) if !root.as_os_str().is_empty() => root.to_path_buf(),
        _ => match std::env::var_os(SHADER_ROOT_ENV) {
            Some(root) if !root.is_empty() => PathBuf::from(root),
            _ => return Err(LumenError::invariant("Shader root directory is not configured.")),
        },
    };
    Ok(lexically_normal(&root.join(filename)))
}
