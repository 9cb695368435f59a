use lumen_core::errors::{LumenError, Result, ResultExt};
use lumen_core::rhi::{BufferId, DescriptorSetId, ImageLayout, IndexType, PipelineId, RenderingInfo};

use crate::frame_context::FrameContext;
use crate::graph::{RenderPass, ResourceDependency};

pub const FORWARD_PASS_NAME: &str = "forward_main";
pub const PER_OBJECT_RESOURCE: &str = "forward.per_object";
pub const SWAPCHAIN_COLOR_RESOURCE: &str = "swapchain_color";
pub const DEPTH_RESOURCE: &str = "depth";

pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
pub const CLEAR_DEPTH: f32 = 1.0;

/// One indexed draw with its per-object descriptor set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForwardDrawItem {
    pub vertex_buffer: BufferId,
    pub index_buffer: BufferId,
    pub index_count: u32,
    pub per_object_set: DescriptorSetId,
}

/// Records UI or debug geometry on top of the scene, inside the forward
/// render scope.
pub trait OverlayRenderer: Send {
    fn name(&self) -> &str;

    fn record(&mut self, ctx: &mut FrameContext<'_>) -> Result<()>;
}

/// Clears the swapchain image and depth, draws every bound item, runs the
/// overlay and leaves the swapchain image ready for presentation.
pub struct ForwardPass {
    pipeline: Option<PipelineId>,
    dependencies: Vec<ResourceDependency>,
    draw_items: Vec<ForwardDrawItem>,
    overlay: Option<Box<dyn OverlayRenderer>>,
}

impl Default for ForwardPass {
    fn default() -> Self {
        Self::new()
    }
}

impl ForwardPass {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pipeline: None,
            dependencies: vec![
                ResourceDependency::read(PER_OBJECT_RESOURCE),
                ResourceDependency::read_write(SWAPCHAIN_COLOR_RESOURCE),
                ResourceDependency::read_write(DEPTH_RESOURCE),
            ],
            draw_items: Vec::new(),
            overlay: None,
        }
    }

    pub fn set_pipeline(&mut self, pipeline: PipelineId) {
        self.pipeline = Some(pipeline);
    }

    #[must_use]
    pub fn pipeline(&self) -> Option<PipelineId> {
        self.pipeline
    }

    /// Replaces the draws of the next `execute`.
    pub fn bind_draw_items(&mut self, draw_items: Vec<ForwardDrawItem>) {
        self.draw_items = draw_items;
    }

    #[must_use]
    pub fn draw_items(&self) -> &[ForwardDrawItem] {
        &self.draw_items
    }

    pub fn set_overlay(&mut self, overlay: Box<dyn OverlayRenderer>) {
        self.overlay = Some(overlay);
    }

    pub fn clear_overlay(&mut self) -> Option<Box<dyn OverlayRenderer>> {
        self.overlay.take()
    }

    #[must_use]
    pub fn has_overlay(&self) -> bool {
        self.overlay.is_some()
    }
}

impl RenderPass for ForwardPass {
    fn name(&self) -> &str {
        FORWARD_PASS_NAME
    }

    fn dependencies(&self) -> &[ResourceDependency] {
        &self.dependencies
    }

    fn execute(&mut self, ctx: &mut FrameContext<'_>) -> Result<()> {
        let pipeline = self
            .pipeline
            .ok_or_else(|| LumenError::invariant("ForwardPass frame resources are not bound."))?;
        let color = ctx.image(SWAPCHAIN_COLOR_RESOURCE)?;
        let depth = ctx.image(DEPTH_RESOURCE)?;
        let extent = ctx.render_extent();

        let cmd = ctx.cmd();
        cmd.image_barrier(color, ImageLayout::Undefined, ImageLayout::ColorAttachment);
        cmd.image_barrier(depth, ImageLayout::Undefined, ImageLayout::DepthAttachment);
        cmd.begin_rendering(&RenderingInfo {
            color,
            depth: Some(depth),
            clear_color: CLEAR_COLOR,
            clear_depth: CLEAR_DEPTH,
            extent,
        });
        cmd.bind_graphics_pipeline(pipeline);
        cmd.set_viewport_scissor(extent);

        for item in &self.draw_items {
            cmd.bind_vertex_buffer(item.vertex_buffer);
            cmd.bind_index_buffer(item.index_buffer, IndexType::U32);
            cmd.bind_descriptor_set(0, item.per_object_set);
            cmd.draw_indexed(item.index_count, 1);
        }

        let overlay_result = match self.overlay.as_mut() {
            Some(overlay) => overlay
                .record(ctx)
                .with_context(|| format!("overlay '{}' failed", overlay.name())),
            None => Ok(()),
        };

        let cmd = ctx.cmd();
        cmd.end_rendering();
        cmd.image_barrier(color, ImageLayout::ColorAttachment, ImageLayout::PresentSrc);
        overlay_result
    }
}
