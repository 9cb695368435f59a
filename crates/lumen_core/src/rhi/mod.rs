//! The GPU surface the engine core consumes.
//!
//! Device, queue, swapchain and command pool construction belong to a concrete
//! backend. The core only needs the small surface defined here:
//!
//! - [`Device`] allocates GPU objects and writes buffers.
//! - [`CommandRecorder`] records the commands of one frame.
//! - GPU objects ([`Buffer`], [`Image`], [`Sampler`], [`DescriptorSet`],
//!   [`GraphicsPipeline`]) are owned values; dropping one destroys it on the device.
//!
//! Commands and descriptor bindings refer to objects through typed ids, so the
//! lifetime of a GPU object is decided only by who owns it.
//!
//! [`headless`] provides an in-memory implementation used by tests and tools.

pub mod headless;

use std::path::PathBuf;

use bitflags::bitflags;

use crate::errors::Result;

// ============================================================================
// Object identities
// ============================================================================

/// Raw identity of any object allocated by a [`Device`]. Never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GpuObjectId(pub u64);

macro_rules! typed_gpu_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct $name(pub GpuObjectId);

        impl $name {
            #[inline]
            #[must_use]
            pub fn raw(self) -> GpuObjectId {
                self.0
            }
        }
    };
}

typed_gpu_id!(
    /// Id of a [`Buffer`].
    BufferId
);
typed_gpu_id!(
    /// Id of an [`Image`].
    ImageId
);
typed_gpu_id!(
    /// Id of a [`Sampler`].
    SamplerId
);
typed_gpu_id!(
    /// Id of a [`DescriptorSet`].
    DescriptorSetId
);
typed_gpu_id!(
    /// Id of a [`GraphicsPipeline`].
    PipelineId
);

/// Object category, reported by backends for bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GpuObjectKind {
    Buffer,
    Image,
    Sampler,
    DescriptorSet,
    GraphicsPipeline,
}

// ============================================================================
// Descriptors
// ============================================================================

/// Width and height of an image or render area in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Both dimensions are non-zero.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.width > 0 && self.height > 0
    }

    #[must_use]
    pub fn aspect(self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    Undefined,
    Rgba8Unorm,
    Rgba8Srgb,
    Bgra8Srgb,
    Rgba16Float,
    D32Float,
    D24UnormS8Uint,
}

impl Format {
    #[must_use]
    pub fn is_depth(self) -> bool {
        matches!(self, Self::D32Float | Self::D24UnormS8Uint)
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX       = 1 << 0;
        const INDEX        = 1 << 1;
        const UNIFORM      = 1 << 2;
        const TRANSFER_DST = 1 << 3;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const SAMPLED          = 1 << 0;
        const COLOR_ATTACHMENT = 1 << 1;
        const DEPTH_ATTACHMENT = 1 << 2;
        const TRANSFER_DST     = 1 << 3;
        const PRESENT          = 1 << 4;
    }
}

#[derive(Clone, Debug)]
pub struct BufferDesc {
    pub label: String,
    pub size: u64,
    pub usage: BufferUsage,
}

#[derive(Clone, Debug)]
pub struct ImageDesc {
    pub label: String,
    pub extent: Extent2D,
    pub format: Format,
    pub usage: ImageUsage,
}

#[derive(Clone, Debug, Default)]
pub struct SamplerDesc {
    pub label: String,
}

/// What a descriptor binding points at.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DescriptorResource {
    UniformBuffer {
        buffer: BufferId,
        offset: u64,
        range: u64,
    },
    SampledImage {
        image: ImageId,
        sampler: SamplerId,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub resource: DescriptorResource,
}

#[derive(Clone, Debug)]
pub struct DescriptorSetDesc {
    pub label: String,
    pub bindings: Vec<DescriptorBinding>,
}

#[derive(Clone, Debug)]
pub struct GraphicsPipelineDesc {
    pub label: String,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    pub color_format: Format,
    pub depth_format: Format,
    pub vertex_stride: u32,
}

// ============================================================================
// Owned GPU objects
// ============================================================================

/// Callback a backend installs to destroy an object when its owner drops it.
pub type ReleaseFn = Box<dyn FnOnce(GpuObjectId) + Send + Sync>;

/// Identity plus destruction hook shared by every GPU object.
pub struct GpuAllocation {
    id: GpuObjectId,
    label: String,
    release: Option<ReleaseFn>,
}

impl GpuAllocation {
    pub fn new(id: GpuObjectId, label: impl Into<String>, release: Option<ReleaseFn>) -> Self {
        Self {
            id,
            label: label.into(),
            release,
        }
    }

    #[must_use]
    pub fn id(&self) -> GpuObjectId {
        self.id
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for GpuAllocation {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.id);
        }
    }
}

impl std::fmt::Debug for GpuAllocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuAllocation")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct Buffer {
    pub allocation: GpuAllocation,
    pub size: u64,
    pub usage: BufferUsage,
}

impl Buffer {
    #[must_use]
    pub fn id(&self) -> BufferId {
        BufferId(self.allocation.id())
    }
}

#[derive(Debug)]
pub struct Image {
    pub allocation: GpuAllocation,
    pub extent: Extent2D,
    pub format: Format,
    pub usage: ImageUsage,
}

impl Image {
    #[must_use]
    pub fn id(&self) -> ImageId {
        ImageId(self.allocation.id())
    }
}

#[derive(Debug)]
pub struct Sampler {
    pub allocation: GpuAllocation,
}

impl Sampler {
    #[must_use]
    pub fn id(&self) -> SamplerId {
        SamplerId(self.allocation.id())
    }
}

#[derive(Debug)]
pub struct DescriptorSet {
    pub allocation: GpuAllocation,
    pub bindings: Vec<DescriptorBinding>,
}

impl DescriptorSet {
    #[must_use]
    pub fn id(&self) -> DescriptorSetId {
        DescriptorSetId(self.allocation.id())
    }
}

#[derive(Debug)]
pub struct GraphicsPipeline {
    pub allocation: GpuAllocation,
    pub desc: GraphicsPipelineDesc,
}

impl GraphicsPipeline {
    #[must_use]
    pub fn id(&self) -> PipelineId {
        PipelineId(self.allocation.id())
    }
}

// ============================================================================
// Device & command recording
// ============================================================================

/// GPU device surface required by the engine core.
///
/// A single device with a single graphics queue is assumed; the frame scheduler
/// provides external synchronization.
pub trait Device: Send + Sync {
    fn create_buffer(&self, desc: &BufferDesc) -> Result<Buffer>;

    /// Writes `data` at `offset`. The range must lie inside the buffer.
    fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<()>;

    fn create_image(&self, desc: &ImageDesc) -> Result<Image>;

    /// Uploads tightly packed pixels covering the whole image.
    fn write_image(&self, image: ImageId, pixels: &[u8]) -> Result<()>;

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Sampler>;

    fn create_descriptor_set(&self, desc: &DescriptorSetDesc) -> Result<DescriptorSet>;

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<GraphicsPipeline>;

    /// Blocks until every submitted command has finished.
    fn wait_idle(&self) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageLayout {
    Undefined,
    ColorAttachment,
    DepthAttachment,
    ShaderReadOnly,
    TransferDst,
    PresentSrc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

/// Parameters of one dynamic-rendering scope.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderingInfo {
    pub color: ImageId,
    pub depth: Option<ImageId>,
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub extent: Extent2D,
}

/// Records the commands of one frame.
pub trait CommandRecorder {
    fn begin_debug_label(&mut self, name: &str);
    fn end_debug_label(&mut self);
    fn image_barrier(&mut self, image: ImageId, old_layout: ImageLayout, new_layout: ImageLayout);
    fn begin_rendering(&mut self, info: &RenderingInfo);
    fn end_rendering(&mut self);
    fn bind_graphics_pipeline(&mut self, pipeline: PipelineId);
    fn set_viewport_scissor(&mut self, extent: Extent2D);
    fn bind_descriptor_set(&mut self, set_index: u32, set: DescriptorSetId);
    fn bind_vertex_buffer(&mut self, buffer: BufferId);
    fn bind_index_buffer(&mut self, buffer: BufferId, index_type: IndexType);
    fn draw_indexed(&mut self, index_count: u32, instance_count: u32);
}
