//! In-memory [`Device`] and [`CommandRecorder`].
//!
//! Nothing is executed. The device tracks which objects are alive, keeps buffer
//! contents, and counts `wait_idle` calls so lifetime rules can be verified
//! without a GPU.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::{
    Buffer, BufferDesc, BufferId, CommandRecorder, DescriptorResource, DescriptorSet,
    DescriptorSetDesc, DescriptorSetId, Device, Extent2D, GpuAllocation, GpuObjectId,
    GpuObjectKind, GraphicsPipeline, GraphicsPipelineDesc, Image, ImageDesc, ImageId,
    ImageLayout, IndexType, PipelineId, ReleaseFn, RenderingInfo, Sampler, SamplerDesc,
};
use crate::errors::{LumenError, Result};
use crate::logging::targets;

struct LiveObject {
    kind: GpuObjectKind,
    label: String,
    contents: Vec<u8>,
}

#[derive(Default)]
struct HeadlessState {
    next_id: u64,
    live: FxHashMap<GpuObjectId, LiveObject>,
    destroyed: Vec<GpuObjectId>,
    total_allocations: u64,
    wait_idle_calls: u64,
    fail_allocations: bool,
}

/// A [`Device`] that only keeps books.
#[derive(Clone, Default)]
pub struct HeadlessDevice {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&self, kind: GpuObjectKind, label: &str, size: usize) -> Result<GpuAllocation> {
        let mut state = self.state.lock();
        if state.fail_allocations {
            return Err(LumenError::gpu(format!("allocation of '{label}' refused")));
        }
        state.next_id += 1;
        state.total_allocations += 1;
        let id = GpuObjectId(state.next_id);
        state.live.insert(
            id,
            LiveObject {
                kind,
                label: label.to_string(),
                contents: vec![0; size],
            },
        );
        drop(state);

        let weak: Weak<Mutex<HeadlessState>> = Arc::downgrade(&self.state);
        let release: ReleaseFn = Box::new(move |id| {
            if let Some(state) = weak.upgrade() {
                let mut state = state.lock();
                if let Some(object) = state.live.remove(&id) {
                    log::trace!(target: targets::RHI_DEVICE, "Destroyed {:?} '{}'", object.kind, object.label);
                }
                state.destroyed.push(id);
            }
        });
        Ok(GpuAllocation::new(id, label, Some(release)))
    }

    fn require_live(state: &HeadlessState, id: GpuObjectId, kind: GpuObjectKind) -> Result<()> {
        match state.live.get(&id) {
            Some(object) if object.kind == kind => Ok(()),
            Some(object) => Err(LumenError::gpu(format!(
                "object {id:?} is a {:?}, expected {kind:?}",
                object.kind
            ))),
            None => Err(LumenError::gpu(format!("object {id:?} is not alive"))),
        }
    }

    /// Makes every following allocation fail until switched off again.
    pub fn set_fail_allocations(&self, fail: bool) {
        self.state.lock().fail_allocations = fail;
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }

    #[must_use]
    pub fn live_count_of(&self, kind: GpuObjectKind) -> usize {
        self.state
            .lock()
            .live
            .values()
            .filter(|object| object.kind == kind)
            .count()
    }

    #[must_use]
    pub fn is_alive(&self, id: GpuObjectId) -> bool {
        self.state.lock().live.contains_key(&id)
    }

    /// Ids in destruction order.
    #[must_use]
    pub fn destroyed_ids(&self) -> Vec<GpuObjectId> {
        self.state.lock().destroyed.clone()
    }

    #[must_use]
    pub fn total_allocations(&self) -> u64 {
        self.state.lock().total_allocations
    }

    #[must_use]
    pub fn wait_idle_count(&self) -> u64 {
        self.state.lock().wait_idle_calls
    }

    #[must_use]
    pub fn buffer_contents(&self, buffer: BufferId) -> Option<Vec<u8>> {
        self.state
            .lock()
            .live
            .get(&buffer.raw())
            .map(|object| object.contents.clone())
    }

    #[must_use]
    pub fn image_contents(&self, image: ImageId) -> Option<Vec<u8>> {
        self.state
            .lock()
            .live
            .get(&image.raw())
            .map(|object| object.contents.clone())
    }
}

impl Device for HeadlessDevice {
    fn create_buffer(&self, desc: &BufferDesc) -> Result<Buffer> {
        if desc.size == 0 {
            return Err(LumenError::invalid_argument(format!(
                "buffer '{}' must have a non-zero size",
                desc.label
            )));
        }
        let allocation = self.allocate(GpuObjectKind::Buffer, &desc.label, desc.size as usize)?;
        Ok(Buffer {
            allocation,
            size: desc.size,
            usage: desc.usage,
        })
    }

    fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        Self::require_live(&state, buffer.raw(), GpuObjectKind::Buffer)?;
        let Some(object) = state.live.get_mut(&buffer.raw()) else {
            return Err(LumenError::gpu(format!("buffer {buffer:?} is not alive")));
        };
        let start = offset as usize;
        let end = start + data.len();
        if end > object.contents.len() {
            return Err(LumenError::gpu(format!(
                "write [{start}, {end}) exceeds buffer '{}' of {} bytes",
                object.label,
                object.contents.len()
            )));
        }
        object.contents[start..end].copy_from_slice(data);
        Ok(())
    }

    fn create_image(&self, desc: &ImageDesc) -> Result<Image> {
        if !desc.extent.is_valid() {
            return Err(LumenError::invalid_argument(format!(
                "image '{}' has empty extent {}x{}",
                desc.label, desc.extent.width, desc.extent.height
            )));
        }
        let allocation = self.allocate(GpuObjectKind::Image, &desc.label, 0)?;
        Ok(Image {
            allocation,
            extent: desc.extent,
            format: desc.format,
            usage: desc.usage,
        })
    }

    fn write_image(&self, image: ImageId, pixels: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        Self::require_live(&state, image.raw(), GpuObjectKind::Image)?;
        if let Some(object) = state.live.get_mut(&image.raw()) {
            object.contents = pixels.to_vec();
        }
        Ok(())
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Sampler> {
        let allocation = self.allocate(GpuObjectKind::Sampler, &desc.label, 0)?;
        Ok(Sampler { allocation })
    }

    fn create_descriptor_set(&self, desc: &DescriptorSetDesc) -> Result<DescriptorSet> {
        {
            let state = self.state.lock();
            for binding in &desc.bindings {
                match binding.resource {
                    DescriptorResource::UniformBuffer { buffer, offset, range } => {
                        Self::require_live(&state, buffer.raw(), GpuObjectKind::Buffer)?;
                        let size = state.live.get(&buffer.raw()).map_or(0, |o| o.contents.len() as u64);
                        if offset + range > size {
                            return Err(LumenError::gpu(format!(
                                "descriptor '{}' binding {} range exceeds buffer",
                                desc.label, binding.binding
                            )));
                        }
                    }
                    DescriptorResource::SampledImage { image, sampler } => {
                        Self::require_live(&state, image.raw(), GpuObjectKind::Image)?;
                        Self::require_live(&state, sampler.raw(), GpuObjectKind::Sampler)?;
                    }
                }
            }
        }
        let allocation = self.allocate(GpuObjectKind::DescriptorSet, &desc.label, 0)?;
        Ok(DescriptorSet {
            allocation,
            bindings: desc.bindings.clone(),
        })
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<GraphicsPipeline> {
        if desc.vertex_shader.as_os_str().is_empty() || desc.fragment_shader.as_os_str().is_empty() {
            return Err(LumenError::invalid_argument(format!(
                "pipeline '{}' requires vertex and fragment shaders",
                desc.label
            )));
        }
        let allocation = self.allocate(GpuObjectKind::GraphicsPipeline, &desc.label, 0)?;
        Ok(GraphicsPipeline {
            allocation,
            desc: desc.clone(),
        })
    }

    fn wait_idle(&self) -> Result<()> {
        self.state.lock().wait_idle_calls += 1;
        Ok(())
    }
}

/// One command captured by [`RecordingCommandBuffer`].
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedCommand {
    BeginDebugLabel(String),
    EndDebugLabel,
    ImageBarrier {
        image: ImageId,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
    },
    BeginRendering(RenderingInfo),
    EndRendering,
    BindGraphicsPipeline(PipelineId),
    SetViewportScissor(Extent2D),
    BindDescriptorSet {
        set_index: u32,
        set: DescriptorSetId,
    },
    BindVertexBuffer(BufferId),
    BindIndexBuffer {
        buffer: BufferId,
        index_type: IndexType,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
    },
}

/// A [`CommandRecorder`] that appends to a list.
#[derive(Debug, Default)]
pub struct RecordingCommandBuffer {
    commands: Vec<RecordedCommand>,
}

impl RecordingCommandBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    #[must_use]
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, RecordedCommand::DrawIndexed { .. }))
            .count()
    }

    pub fn reset(&mut self) {
        self.commands.clear();
    }
}

impl CommandRecorder for RecordingCommandBuffer {
    fn begin_debug_label(&mut self, name: &str) {
        self.commands.push(RecordedCommand::BeginDebugLabel(name.to_string()));
    }

    fn end_debug_label(&mut self) {
        self.commands.push(RecordedCommand::EndDebugLabel);
    }

    fn image_barrier(&mut self, image: ImageId, old_layout: ImageLayout, new_layout: ImageLayout) {
        self.commands.push(RecordedCommand::ImageBarrier {
            image,
            old_layout,
            new_layout,
        });
    }

    fn begin_rendering(&mut self, info: &RenderingInfo) {
        self.commands.push(RecordedCommand::BeginRendering(*info));
    }

    fn end_rendering(&mut self) {
        self.commands.push(RecordedCommand::EndRendering);
    }

    fn bind_graphics_pipeline(&mut self, pipeline: PipelineId) {
        self.commands.push(RecordedCommand::BindGraphicsPipeline(pipeline));
    }

    fn set_viewport_scissor(&mut self, extent: Extent2D) {
        self.commands.push(RecordedCommand::SetViewportScissor(extent));
    }

    fn bind_descriptor_set(&mut self, set_index: u32, set: DescriptorSetId) {
        self.commands.push(RecordedCommand::BindDescriptorSet { set_index, set });
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferId) {
        self.commands.push(RecordedCommand::BindVertexBuffer(buffer));
    }

    fn bind_index_buffer(&mut self, buffer: BufferId, index_type: IndexType) {
        self.commands.push(RecordedCommand::BindIndexBuffer { buffer, index_type });
    }

    fn draw_indexed(&mut self, index_count: u32, instance_count: u32) {
        self.commands.push(RecordedCommand::DrawIndexed {
            index_count,
            instance_count,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhi::BufferUsage;

    #[test]
    fn dropping_an_object_releases_it() {
        let device = HeadlessDevice::new();
        let buffer = device
            .create_buffer(&BufferDesc {
                label: "ubo".into(),
                size: 64,
                usage: BufferUsage::UNIFORM,
            })
            .unwrap();
        let id = buffer.allocation.id();
        assert!(device.is_alive(id));
        drop(buffer);
        assert!(!device.is_alive(id));
        assert_eq!(device.destroyed_ids(), vec![id]);
    }

    #[test]
    fn out_of_range_write_is_rejected() {
        let device = HeadlessDevice::new();
        let buffer = device
            .create_buffer(&BufferDesc {
                label: "small".into(),
                size: 4,
                usage: BufferUsage::UNIFORM,
            })
            .unwrap();
        assert!(device.write_buffer(buffer.id(), 0, &[1, 2, 3, 4]).is_ok());
        assert!(device.write_buffer(buffer.id(), 2, &[1, 2, 3]).is_err());
        assert_eq!(device.buffer_contents(buffer.id()).unwrap(), vec![1, 2, 3, 4]);
    }
}
