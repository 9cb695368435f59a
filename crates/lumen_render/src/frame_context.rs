//! Per-frame view handed to render passes.
//!
//! Passes find the GPU objects they declared as dependencies by name. Names
//! resolve per frame slot first and fall back to the global entry, so a pass
//! can ask for `"depth"` without knowing whether depth is per-frame.

use lumen_core::errors::{LumenError, Result};
use lumen_core::rhi::{BufferId, CommandRecorder, DescriptorSetId, Device, Extent2D, ImageId};
use rustc_hash::FxHashMap;

use crate::graph::ResourceDependency;

/// Name-keyed table of GPU object ids with global and per-frame entries.
#[derive(Clone, Debug)]
pub struct ResourceRegistry<T> {
    kind: &'static str,
    frames_in_flight: u32,
    global: FxHashMap<String, T>,
    per_frame: FxHashMap<String, Vec<Option<T>>>,
}

impl<T: Copy> ResourceRegistry<T> {
    #[must_use]
    pub fn new(kind: &'static str, frames_in_flight: u32) -> Self {
        Self {
            kind,
            frames_in_flight: frames_in_flight.max(1),
            global: FxHashMap::default(),
            per_frame: FxHashMap::default(),
        }
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(LumenError::invalid_argument(format!("{} registry name must not be empty", self.kind)));
        }
        Ok(())
    }

    fn check_frame(&self, frame_index: u32) -> Result<()> {
        if frame_index >= self.frames_in_flight {
            return Err(LumenError::invalid_argument(format!(
                "{} registry frame index {frame_index} out of range (frames in flight {})",
                self.kind, self.frames_in_flight
            )));
        }
        Ok(())
    }

    /// Registers a value shared by every frame slot.
    pub fn set_global(&mut self, name: &str, value: T) -> Result<()> {
        self.check_name(name)?;
        self.global.insert(name.to_string(), value);
        Ok(())
    }

    /// Registers the value used while recording `frame_index`.
    pub fn set_per_frame(&mut self, name: &str, frame_index: u32, value: T) -> Result<()> {
        self.check_name(name)?;
        self.check_frame(frame_index)?;
        let frames = self.frames_in_flight as usize;
        let slots = self
            .per_frame
            .entry(name.to_string())
            .or_insert_with(|| vec![None; frames]);
        slots[frame_index as usize] = Some(value);
        Ok(())
    }

    /// Per-frame entry for `frame_index`, else the global entry.
    #[must_use]
    pub fn resolve(&self, name: &str, frame_index: u32) -> Option<T> {
        self.per_frame
            .get(name)
            .and_then(|slots| slots.get(frame_index as usize).copied().flatten())
            .or_else(|| self.global.get(name).copied())
    }

    pub fn require(&self, name: &str, frame_index: u32) -> Result<T> {
        self.resolve(name, frame_index).ok_or_else(|| {
            LumenError::not_found(format!(
                "{} '{name}' is not registered for frame {frame_index}",
                self.kind
            ))
        })
    }

    #[must_use]
    pub fn contains(&self, name: &str, frame_index: u32) -> bool {
        self.resolve(name, frame_index).is_some()
    }

    /// Drops both the global and the per-frame entries of `name`.
    pub fn remove(&mut self, name: &str) {
        self.global.remove(name);
        self.per_frame.remove(name);
    }

    pub fn clear(&mut self) {
        self.global.clear();
        self.per_frame.clear();
    }
}

/// The three registries a pipeline publishes to its passes.
#[derive(Clone, Debug)]
pub struct FrameRegistries {
    pub buffers: ResourceRegistry<BufferId>,
    pub images: ResourceRegistry<ImageId>,
    pub descriptor_sets: ResourceRegistry<DescriptorSetId>,
}

impl FrameRegistries {
    #[must_use]
    pub fn new(frames_in_flight: u32) -> Self {
        Self {
            buffers: ResourceRegistry::new("buffer", frames_in_flight),
            images: ResourceRegistry::new("image", frames_in_flight),
            descriptor_sets: ResourceRegistry::new("descriptor set", frames_in_flight),
        }
    }

    /// True when `name` resolves in any registry for `frame_index`.
    #[must_use]
    pub fn resolves(&self, name: &str, frame_index: u32) -> bool {
        self.buffers.contains(name, frame_index)
            || self.images.contains(name, frame_index)
            || self.descriptor_sets.contains(name, frame_index)
    }
}

/// Everything a pass may touch while recording one frame.
pub struct FrameContext<'a> {
    device: &'a dyn Device,
    cmd: &'a mut dyn CommandRecorder,
    registries: &'a FrameRegistries,
    frame_index: u32,
    frame_serial: u64,
    swapchain_image: ImageId,
    render_extent: Extent2D,
}

impl<'a> FrameContext<'a> {
    pub fn new(
        device: &'a dyn Device,
        cmd: &'a mut dyn CommandRecorder,
        registries: &'a FrameRegistries,
        frame_index: u32,
        frame_serial: u64,
        swapchain_image: ImageId,
        render_extent: Extent2D,
    ) -> Self {
        Self {
            device,
            cmd,
            registries,
            frame_index,
            frame_serial,
            swapchain_image,
            render_extent,
        }
    }

    #[must_use]
    pub fn device(&self) -> &dyn Device {
        self.device
    }

    pub fn cmd(&mut self) -> &mut dyn CommandRecorder {
        &mut *self.cmd
    }

    #[must_use]
    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    #[must_use]
    pub fn frame_serial(&self) -> u64 {
        self.frame_serial
    }

    #[must_use]
    pub fn swapchain_image(&self) -> ImageId {
        self.swapchain_image
    }

    #[must_use]
    pub fn render_extent(&self) -> Extent2D {
        self.render_extent
    }

    #[must_use]
    pub fn registries(&self) -> &FrameRegistries {
        self.registries
    }

    pub fn buffer(&self, name: &str) -> Result<BufferId> {
        self.registries.buffers.require(name, self.frame_index)
    }

    pub fn image(&self, name: &str) -> Result<ImageId> {
        self.registries.images.require(name, self.frame_index)
    }

    pub fn descriptor_set(&self, name: &str) -> Result<DescriptorSetId> {
        self.registries.descriptor_sets.require(name, self.frame_index)
    }

    /// Fails on the first dependency of `pass` that no registry resolves.
    pub fn check_dependencies(&self, pass: &str, dependencies: &[ResourceDependency]) -> Result<()> {
        match dependencies
            .iter()
            .find(|dependency| !self.registries.resolves(&dependency.name, self.frame_index))
        {
            Some(missing) => Err(LumenError::not_found(format!(
                "pass '{pass}' depends on '{}' which is not registered for frame {}",
                missing.name, self.frame_index
            ))),
            None => Ok(()),
        }
    }
}
