//! Forward pipeline: one pass, one uniform block and one albedo texture per object.

use std::path::PathBuf;
use std::sync::Arc;

use lumen_core::errors::{LumenError, Result, ResultExt};
use lumen_core::event::TypedEventCenter;
use lumen_core::logging::targets;
use lumen_core::rhi::{
    Buffer, BufferDesc, BufferId, BufferUsage, DescriptorBinding, DescriptorResource, DescriptorSet,
    DescriptorSetDesc, Device, Extent2D, GraphicsPipeline, GraphicsPipelineDesc, Image, ImageDesc, ImageId,
    ImageUsage, Sampler, SamplerDesc, SamplerId,
};
use lumen_resources::{MeshKind, MeshVertex, TextureKind};

use super::pass::{
    DEPTH_RESOURCE, ForwardDrawItem, ForwardPass, OverlayRenderer, PER_OBJECT_RESOURCE, SWAPCHAIN_COLOR_RESOURCE,
};
use super::scene_view::{ForwardSceneView, build_forward_scene_view};
use super::uniforms::{ForwardObjectUniforms, flip_projection_y};
use crate::binder::{BoundRegistries, FrameResourceBinder};
use crate::frame_context::{FrameContext, FrameRegistries};
use crate::graph::RenderGraph;
use crate::pipeline::{FramePrepareContext, RenderPipeline, SwapchainChangeSummary, resolve_shader_path};
use crate::scene_target::SceneTargetController;
use crate::scheduler::{FrameTargets, FrameTicket, SwapchainState, validate_frames_in_flight};

/// Renderables a single frame can hold.
pub const MAX_RENDERABLES: usize = 256;

pub const DEFAULT_ALBEDO_RESOURCE: &str = "forward.default_albedo";

#[derive(Clone, Debug)]
pub struct ForwardPipelineConfig {
    /// Directory of compiled shaders; `$LUMEN_SHADER_ROOT` when unset
    pub shader_root: Option<PathBuf>,
    pub vertex_shader_filename: String,
    pub fragment_shader_filename: String,
}

impl Default for ForwardPipelineConfig {
    fn default() -> Self {
        Self {
            shader_root: None,
            vertex_shader_filename: "vert_buffer_vert.spv".to_string(),
            fragment_shader_filename: "vert_buffer_frag.spv".to_string(),
        }
    }
}

/// Depth attachments sized to the scene viewport, one per frame slot.
#[derive(Debug)]
pub struct ForwardSceneTargets {
    pub extent: Extent2D,
    pub depth_images: Vec<Image>,
}

struct ObjectSlot {
    set: DescriptorSet,
    albedo: ImageId,
}

struct FrameResources {
    per_object: Buffer,
    slots: Vec<Option<ObjectSlot>>,
}

struct DefaultAlbedo {
    image: Image,
    sampler: Sampler,
}

/// A renderable resolved to GPU objects during `prepare_frame`.
#[derive(Clone, Copy, Debug)]
struct PreparedDraw {
    vertex_buffer: BufferId,
    index_buffer: BufferId,
    index_count: u32,
    albedo: Option<(ImageId, SamplerId)>,
    uniforms: ForwardObjectUniforms,
}

struct ForwardFrameBinder {
    per_object: Vec<BufferId>,
    default_albedo: ImageId,
}

impl FrameResourceBinder for ForwardFrameBinder {
    fn name(&self) -> &str {
        "forward"
    }

    fn bind_static_resources(&mut self, registries: &mut FrameRegistries) -> Result<()> {
        registries.images.set_global(DEFAULT_ALBEDO_RESOURCE, self.default_albedo)
    }

    fn bind_frame_resources(&mut self, frame_index: u32, registries: &mut FrameRegistries) -> Result<()> {
        let buffer = self.per_object.get(frame_index as usize).copied().ok_or_else(|| {
            LumenError::invalid_argument(format!("forward binder has no buffer for frame {frame_index}"))
        })?;
        registries.buffers.set_per_frame(PER_OBJECT_RESOURCE, frame_index, buffer)
    }
}

pub struct ForwardPipeline {
    device: Arc<dyn Device>,
    config: ForwardPipelineConfig,
    events: TypedEventCenter,
    frames_in_flight: u32,
    swapchain: SwapchainState,
    graphics_pipeline: GraphicsPipeline,
    uniform_stride: u64,
    frames: Vec<FrameResources>,
    default_albedo: DefaultAlbedo,
    scene_targets: SceneTargetController<ForwardSceneTargets>,
    registries: BoundRegistries,
    graph: RenderGraph,
    scene_view: Option<ForwardSceneView>,
    prepared: Vec<PreparedDraw>,
}

impl ForwardPipeline {
    pub fn new(
        device: Arc<dyn Device>,
        swapchain: SwapchainState,
        frames_in_flight: u32,
        config: ForwardPipelineConfig,
    ) -> Result<Self> {
        validate_frames_in_flight(frames_in_flight)?;
        let uniform_stride = ForwardObjectUniforms::aligned_size();

        let frames = (0..frames_in_flight)
            .map(|frame| {
                let per_object = device.create_buffer(&BufferDesc {
                    label: format!("{PER_OBJECT_RESOURCE}[{frame}]"),
                    size: uniform_stride * MAX_RENDERABLES as u64,
                    usage: BufferUsage::UNIFORM,
                })?;
                Ok(FrameResources {
                    per_object,
                    slots: (0..MAX_RENDERABLES).map(|_| None).collect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let default_albedo = Self::create_default_albedo(&*device)?;
        let graphics_pipeline = Self::create_graphics_pipeline(&*device, &config, &swapchain)?;

        let events = TypedEventCenter::new();
        let scene_targets = SceneTargetController::new(&events, "forward.scene_targets", frames_in_flight)?;

        let mut registries = BoundRegistries::new(frames_in_flight);
        registries.attach(Box::new(ForwardFrameBinder {
            per_object: frames.iter().map(|frame| frame.per_object.id()).collect(),
            default_albedo: default_albedo.image.id(),
        }))?;

        let mut forward_pass = ForwardPass::new();
        forward_pass.set_pipeline(graphics_pipeline.id());
        let mut graph = RenderGraph::with_capacity(1);
        graph.add_pass(Box::new(forward_pass))?;
        graph.validate()?;
        graph.create_resources(&*device)?;

        log::info!(
            target: targets::FORWARD_PIPELINE,
            "ForwardPipeline created (frames_in_flight={frames_in_flight}, max_renderables={MAX_RENDERABLES}, uniform_stride={uniform_stride})"
        );

        Ok(Self {
            device,
            config,
            events,
            frames_in_flight,
            swapchain,
            graphics_pipeline,
            uniform_stride,
            frames,
            default_albedo,
            scene_targets,
            registries,
            graph,
            scene_view: None,
            prepared: Vec::new(),
        })
    }

    fn create_default_albedo(device: &dyn Device) -> Result<DefaultAlbedo> {
        let image = device.create_image(&ImageDesc {
            label: DEFAULT_ALBEDO_RESOURCE.to_string(),
            extent: Extent2D::new(1, 1),
            format: lumen_core::rhi::Format::Rgba8Srgb,
            usage: ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST,
        })?;
        device.write_image(image.id(), &[255, 255, 255, 255])?;
        let sampler = device.create_sampler(&SamplerDesc {
            label: format!("{DEFAULT_ALBEDO_RESOURCE}.sampler"),
        })?;
        Ok(DefaultAlbedo { image, sampler })
    }

    fn create_graphics_pipeline(
        device: &dyn Device,
        config: &ForwardPipelineConfig,
        swapchain: &SwapchainState,
    ) -> Result<GraphicsPipeline> {
        let root = config.shader_root.as_deref();
        device
            .create_graphics_pipeline(&GraphicsPipelineDesc {
                label: "forward".to_string(),
                vertex_shader: resolve_shader_path(root, &config.vertex_shader_filename)?,
                fragment_shader: resolve_shader_path(root, &config.fragment_shader_filename)?,
                color_format: swapchain.color_format,
                depth_format: swapchain.depth_format,
                vertex_stride: std::mem::size_of::<MeshVertex>() as u32,
            })
            .context("ForwardPipeline graphics pipeline creation failed")
    }

    #[must_use]
    pub fn config(&self) -> &ForwardPipelineConfig {
        &self.config
    }

    #[must_use]
    pub fn scene_view(&self) -> Option<&ForwardSceneView> {
        self.scene_view.as_ref()
    }

    /// Overrides the view built by `prepare_frame`. Draws are resolved on the
    /// next `prepare_frame`.
    pub fn set_scene_view(&mut self, scene_view: ForwardSceneView) {
        self.scene_view = Some(scene_view);
    }

    #[must_use]
    pub fn scene_targets(&self) -> &SceneTargetController<ForwardSceneTargets> {
        &self.scene_targets
    }

    #[must_use]
    pub fn graph(&self) -> &RenderGraph {
        &self.graph
    }

    #[must_use]
    pub fn graphics_pipeline(&self) -> &GraphicsPipeline {
        &self.graphics_pipeline
    }

    /// Buffer holding the per-object uniform blocks of `frame_index`.
    #[must_use]
    pub fn per_object_buffer(&self, frame_index: u32) -> Option<BufferId> {
        self.frames.get(frame_index as usize).map(|frame| frame.per_object.id())
    }

    #[must_use]
    pub fn uniform_stride(&self) -> u64 {
        self.uniform_stride
    }

    pub fn set_overlay(&mut self, overlay: Box<dyn OverlayRenderer>) -> Result<()> {
        self.forward_pass_mut()?.set_overlay(overlay);
        Ok(())
    }

    pub fn clear_overlay(&mut self) {
        if let Ok(pass) = self.forward_pass_mut() {
            pass.clear_overlay();
        }
    }

    fn forward_pass_mut(&mut self) -> Result<&mut ForwardPass> {
        self.graph
            .pass_mut::<ForwardPass>()
            .ok_or_else(|| LumenError::invariant("Forward pipeline passes are not initialized."))
    }

    fn prepare_draws(&mut self, view: &ForwardSceneView, ctx: &mut FramePrepareContext<'_>) -> Result<()> {
        if view.renderables.len() > MAX_RENDERABLES {
            return Err(LumenError::invariant(format!(
                "Renderable count {} exceeds preallocated ForwardPipeline capacity {MAX_RENDERABLES}.",
                view.renderables.len()
            )));
        }
        let proj = flip_projection_y(&view.camera.proj);
        self.prepared.clear();
        for renderable in &view.renderables {
            let mesh = ctx
                .resources
                .require_gpu::<MeshKind>(renderable.mesh, &*self.device)
                .with_context(|| format!("mesh of instance {} unavailable", renderable.instance_id))?;
            let (vertex_buffer, index_buffer, index_count) =
                (mesh.vertex_buffer.id(), mesh.index_buffer.id(), mesh.index_count);
            let albedo = match renderable.albedo {
                Some(texture) => {
                    let texture = ctx
                        .resources
                        .require_gpu::<TextureKind>(texture, &*self.device)
                        .with_context(|| format!("albedo of instance {} unavailable", renderable.instance_id))?;
                    Some((texture.image.id(), texture.sampler.id()))
                }
                None => None,
            };
            self.prepared.push(PreparedDraw {
                vertex_buffer,
                index_buffer,
                index_count,
                albedo,
                uniforms: ForwardObjectUniforms::new(
                    &renderable.model,
                    &view.camera.view,
                    &proj,
                    &renderable.normal,
                    renderable.base_color,
                ),
            });
        }
        Ok(())
    }

    /// Writes uniforms and refreshes descriptor sets of `frame_index`.
    fn build_draw_items(&mut self, frame_index: u32) -> Result<Vec<ForwardDrawItem>> {
        let device = &*self.device;
        let stride = self.uniform_stride;
        let default_albedo = (self.default_albedo.image.id(), self.default_albedo.sampler.id());
        let frame = self
            .frames
            .get_mut(frame_index as usize)
            .ok_or_else(|| LumenError::invariant("ForwardPipeline frame resources are not ready."))?;
        let buffer = frame.per_object.id();

        let mut items = Vec::with_capacity(self.prepared.len());
        for (slot_index, draw) in self.prepared.iter().enumerate() {
            let offset = slot_index as u64 * stride;
            device.write_buffer(buffer, offset, bytemuck::bytes_of(&draw.uniforms))?;

            let (image, sampler) = draw.albedo.unwrap_or(default_albedo);
            let slot = &mut frame.slots[slot_index];
            if slot.as_ref().is_none_or(|existing| existing.albedo != image) {
                let set = device.create_descriptor_set(&DescriptorSetDesc {
                    label: format!("forward.per_object_set[{frame_index}][{slot_index}]"),
                    bindings: vec![
                        DescriptorBinding {
                            binding: 0,
                            resource: DescriptorResource::UniformBuffer {
                                buffer,
                                offset,
                                range: std::mem::size_of::<ForwardObjectUniforms>() as u64,
                            },
                        },
                        DescriptorBinding {
                            binding: 1,
                            resource: DescriptorResource::SampledImage { image, sampler },
                        },
                    ],
                })?;
                *slot = Some(ObjectSlot { set, albedo: image });
            }
            let per_object_set = slot
                .as_ref()
                .map(|slot| slot.set.id())
                .ok_or_else(|| LumenError::invariant("forward descriptor slot missing after refresh"))?;
            items.push(ForwardDrawItem {
                vertex_buffer: draw.vertex_buffer,
                index_buffer: draw.index_buffer,
                index_count: draw.index_count,
                per_object_set,
            });
        }
        Ok(items)
    }

    fn ensure_scene_targets(&mut self, frame_index: u32, fallback: Extent2D) -> Result<()> {
        let device = Arc::clone(&self.device);
        let wait_device = Arc::clone(&self.device);
        let depth_format = self.swapchain.depth_format;
        let frames_in_flight = self.frames_in_flight;
        let registries = self.registries.registries_mut();
        self.scene_targets.ensure(
            frame_index,
            fallback,
            || wait_device.wait_idle(),
            |extent| {
                let depth_images = (0..frames_in_flight)
                    .map(|frame| {
                        device.create_image(&ImageDesc {
                            label: format!("{DEPTH_RESOURCE}[{frame}]"),
                            extent,
                            format: depth_format,
                            usage: ImageUsage::DEPTH_ATTACHMENT,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(ForwardSceneTargets { extent, depth_images })
            },
            |targets| {
                for (frame, image) in (0..).zip(&targets.depth_images) {
                    registries.images.set_per_frame(DEPTH_RESOURCE, frame, image.id())?;
                }
                Ok(())
            },
        )?;
        Ok(())
    }
}

impl RenderPipeline for ForwardPipeline {
    fn name(&self) -> &str {
        "forward"
    }

    fn events(&self) -> &TypedEventCenter {
        &self.events
    }

    fn prepare_frame(&mut self, ctx: &mut FramePrepareContext<'_>) -> Result<()> {
        let scene = ctx
            .world
            .active_scene()
            .ok_or_else(|| LumenError::invariant("ForwardPipeline prepare_frame requires an active scene."))?;

        if scene.active_camera().is_none() {
            log::error!(
                target: targets::FORWARD_PIPELINE,
                "Active scene has no active camera. Rendering black frame."
            );
            self.scene_view = Some(ForwardSceneView::default());
            self.prepared.clear();
            return Ok(());
        }

        let view = build_forward_scene_view(scene, ctx.resources)?;
        self.prepare_draws(&view, ctx)?;
        self.scene_view = Some(view);
        Ok(())
    }

    fn render(&mut self, ticket: &FrameTicket, frame: FrameTargets<'_>) -> Result<()> {
        if !ticket.extent.is_valid() {
            return Ok(());
        }
        if self.scene_view.is_none() {
            return Err(LumenError::invariant("ForwardPipeline requires scene view before render()."));
        }
        let frame_index = ticket.frame_index;
        if frame_index >= self.frames_in_flight {
            return Err(LumenError::invariant("ForwardPipeline frame resources are not ready."));
        }

        self.ensure_scene_targets(frame_index, ticket.extent)?;
        self.registries.bind_frame(frame_index)?;
        self.registries
            .registries_mut()
            .images
            .set_per_frame(SWAPCHAIN_COLOR_RESOURCE, frame_index, frame.swapchain_image)?;

        let draw_items = self.build_draw_items(frame_index)?;
        let draw_count = draw_items.len();
        self.forward_pass_mut()?.bind_draw_items(draw_items);

        let mut ctx = FrameContext::new(
            &*self.device,
            frame.command_buffer,
            self.registries.registries(),
            frame_index,
            ticket.frame_serial,
            frame.swapchain_image,
            ticket.extent,
        );
        self.graph.execute(&mut ctx)?;
        log::trace!(
            target: targets::FORWARD_PIPELINE,
            "Frame {} recorded (frame_index={frame_index}, draws={draw_count})",
            ticket.frame_serial
        );
        Ok(())
    }

    fn on_swapchain_state_changed(&mut self, state: &SwapchainState) -> Result<()> {
        let diff = SwapchainChangeSummary::between(&self.swapchain, state);
        self.swapchain = *state;
        if diff.extent_or_depth_changed() {
            self.scene_targets.on_swapchain_extent_changed();
        }
        if diff.color_or_depth_changed() {
            self.graphics_pipeline = Self::create_graphics_pipeline(&*self.device, &self.config, &self.swapchain)?;
            let pipeline = self.graphics_pipeline.id();
            self.forward_pass_mut()?.set_pipeline(pipeline);
        }
        log::debug!(
            target: targets::FORWARD_PIPELINE,
            "Swapchain state applied (generation={}, diff={diff:?})",
            state.generation
        );
        Ok(())
    }

    fn wait_for_scene_target_rebuild(&self) -> Result<()> {
        self.device.wait_idle()
    }
}
