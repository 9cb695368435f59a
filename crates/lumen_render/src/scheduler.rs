//! Frame orchestration.
//!
//! A [`FrameScheduler`] owns the swapchain and per-frame synchronization and
//! hands out one [`FrameTicket`] per frame, so pipelines only record commands.
//! [`HeadlessFrameScheduler`] drives the loop without a window.

use lumen_core::errors::{LumenError, Result};
use lumen_core::logging::targets;
use lumen_core::rhi::headless::RecordingCommandBuffer;
use lumen_core::rhi::{CommandRecorder, Device, Extent2D, Format, Image, ImageDesc, ImageId, ImageUsage};

/// Largest number of frames in flight a scheduler accepts.
pub const MAX_FRAMES_IN_FLIGHT: u32 = 32;

/// Identifies one frame between `begin_frame` and `submit_and_present`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameTicket {
    /// Slot in `[0, frames_in_flight)`
    pub frame_index: u32,
    /// Acquired swapchain image
    pub image_index: u32,
    /// Monotonic frame counter, starts at 1
    pub frame_serial: u64,
    pub extent: Extent2D,
}

/// Snapshot of the swapchain configuration. `generation` changes on every
/// recreation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainState {
    pub generation: u64,
    pub extent: Extent2D,
    pub image_count: u32,
    pub color_format: Format,
    pub depth_format: Format,
}

/// What a pipeline records into for one frame.
pub struct FrameTargets<'a> {
    pub command_buffer: &'a mut dyn CommandRecorder,
    pub swapchain_image: ImageId,
}

pub trait FrameScheduler {
    fn frames_in_flight(&self) -> u32;

    fn swapchain_state(&self) -> SwapchainState;

    /// Starts a frame. `None` means the frame must be skipped, for example
    /// while the window is minimized or right after a swapchain recreation.
    fn begin_frame(&mut self) -> Result<Option<FrameTicket>>;

    fn frame_targets(&mut self, ticket: &FrameTicket) -> Result<FrameTargets<'_>>;

    fn submit_and_present(&mut self, ticket: FrameTicket) -> Result<()>;

    fn on_window_resized(&mut self, width: u32, height: u32);
}

/// Validates a frames-in-flight count against [`MAX_FRAMES_IN_FLIGHT`].
pub fn validate_frames_in_flight(frames_in_flight: u32) -> Result<()> {
    if frames_in_flight == 0 || frames_in_flight > MAX_FRAMES_IN_FLIGHT {
        return Err(LumenError::invalid_argument(format!(
            "frames in flight must be in [1, {MAX_FRAMES_IN_FLIGHT}], got {frames_in_flight}"
        )));
    }
    Ok(())
}

/// Scheduler over in-memory swapchain images and recording command buffers.
pub struct HeadlessFrameScheduler {
    device: Box<dyn Device>,
    frames_in_flight: u32,
    image_count: u32,
    color_format: Format,
    depth_format: Format,
    extent: Extent2D,
    pending_extent: Option<Extent2D>,
    generation: u64,
    frame_index: u32,
    next_image_index: u32,
    frame_serial: u64,
    presented_frames: u64,
    in_flight: Option<FrameTicket>,
    swapchain_images: Vec<Image>,
    command_buffers: Vec<RecordingCommandBuffer>,
}

impl HeadlessFrameScheduler {
    pub fn new(device: Box<dyn Device>, extent: Extent2D, frames_in_flight: u32) -> Result<Self> {
        validate_frames_in_flight(frames_in_flight)?;
        let mut scheduler = Self {
            device,
            frames_in_flight,
            image_count: frames_in_flight + 1,
            color_format: Format::Bgra8Srgb,
            depth_format: Format::D32Float,
            extent,
            pending_extent: None,
            generation: 1,
            frame_index: 0,
            next_image_index: 0,
            frame_serial: 0,
            presented_frames: 0,
            in_flight: None,
            swapchain_images: Vec::new(),
            command_buffers: (0..frames_in_flight).map(|_| RecordingCommandBuffer::new()).collect(),
        };
        scheduler.create_swapchain_images()?;
        log::info!(
            target: targets::FRAME_SCHEDULER,
            "FrameScheduler initialized (max_frames_in_flight={frames_in_flight}, image_count={})",
            scheduler.image_count
        );
        Ok(scheduler)
    }

    fn create_swapchain_images(&mut self) -> Result<()> {
        self.swapchain_images.clear();
        if !self.extent.is_valid() {
            return Ok(());
        }
        for index in 0..self.image_count {
            let image = self.device.create_image(&ImageDesc {
                label: format!("swapchain_image_{index}"),
                extent: self.extent,
                format: self.color_format,
                usage: ImageUsage::COLOR_ATTACHMENT | ImageUsage::PRESENT,
            })?;
            self.swapchain_images.push(image);
        }
        Ok(())
    }

    fn recreate_swapchain(&mut self, extent: Extent2D) -> Result<()> {
        self.device.wait_idle()?;
        let old_generation = self.generation;
        self.extent = extent;
        self.create_swapchain_images()?;
        self.next_image_index = 0;
        self.generation += 1;
        log::info!(
            target: targets::FRAME_SCHEDULER,
            "Swapchain resources recreated (generation {old_generation} -> {}).",
            self.generation
        );
        Ok(())
    }

    /// Commands recorded into the command buffer of `frame_index`.
    #[must_use]
    pub fn command_buffer(&self, frame_index: u32) -> Option<&RecordingCommandBuffer> {
        self.command_buffers.get(frame_index as usize)
    }

    #[must_use]
    pub fn presented_frames(&self) -> u64 {
        self.presented_frames
    }

    #[must_use]
    pub fn current_frame_index(&self) -> u32 {
        self.frame_index
    }

    #[must_use]
    pub fn swapchain_image_ids(&self) -> Vec<ImageId> {
        self.swapchain_images.iter().map(Image::id).collect()
    }
}

impl FrameScheduler for HeadlessFrameScheduler {
    fn frames_in_flight(&self) -> u32 {
        self.frames_in_flight
    }

    fn swapchain_state(&self) -> SwapchainState {
        SwapchainState {
            generation: self.generation,
            extent: self.extent,
            image_count: self.image_count,
            color_format: self.color_format,
            depth_format: self.depth_format,
        }
    }

    fn begin_frame(&mut self) -> Result<Option<FrameTicket>> {
        if let Some(ticket) = self.in_flight {
            return Err(LumenError::invariant(format!(
                "begin_frame called while frame {} is still open",
                ticket.frame_serial
            )));
        }
        if let Some(extent) = self.pending_extent.take() {
            self.recreate_swapchain(extent)?;
            return Ok(None);
        }
        if !self.extent.is_valid() {
            return Ok(None);
        }

        let image_index = self.next_image_index;
        self.next_image_index = (self.next_image_index + 1) % self.image_count;
        self.frame_serial += 1;
        let ticket = FrameTicket {
            frame_index: self.frame_index,
            image_index,
            frame_serial: self.frame_serial,
            extent: self.extent,
        };
        if let Some(command_buffer) = self.command_buffers.get_mut(self.frame_index as usize) {
            command_buffer.reset();
        }
        self.in_flight = Some(ticket);
        Ok(Some(ticket))
    }

    fn frame_targets(&mut self, ticket: &FrameTicket) -> Result<FrameTargets<'_>> {
        if self.in_flight != Some(*ticket) {
            return Err(LumenError::invalid_argument(format!(
                "frame ticket {} is not the open frame",
                ticket.frame_serial
            )));
        }
        let swapchain_image = self
            .swapchain_images
            .get(ticket.image_index as usize)
            .map(Image::id)
            .ok_or_else(|| LumenError::invariant(format!("swapchain image {} does not exist", ticket.image_index)))?;
        let command_buffer = self
            .command_buffers
            .get_mut(ticket.frame_index as usize)
            .ok_or_else(|| LumenError::invariant(format!("frame slot {} does not exist", ticket.frame_index)))?;
        Ok(FrameTargets {
            command_buffer,
            swapchain_image,
        })
    }

    fn submit_and_present(&mut self, ticket: FrameTicket) -> Result<()> {
        if self.in_flight != Some(ticket) {
            return Err(LumenError::invalid_argument(format!(
                "frame ticket {} is not the open frame",
                ticket.frame_serial
            )));
        }
        self.in_flight = None;
        self.presented_frames += 1;
        self.frame_index = (self.frame_index + 1) % self.frames_in_flight;
        Ok(())
    }

    fn on_window_resized(&mut self, width: u32, height: u32) {
        log::info!(
            target: targets::FRAME_SCHEDULER,
            "Window resized to ({width}, {height}), scheduling swapchain recreation."
        );
        self.pending_extent = Some(Extent2D::new(width, height));
    }
}

#[cfg(test)]
mod tests {
    use lumen_core::rhi::headless::HeadlessDevice;

    use super::*;

    fn scheduler(frames_in_flight: u32) -> HeadlessFrameScheduler {
        HeadlessFrameScheduler::new(Box::new(HeadlessDevice::new()), Extent2D::new(64, 32), frames_in_flight).unwrap()
    }

    fn run_frame(scheduler: &mut HeadlessFrameScheduler) -> Option<FrameTicket> {
        let ticket = scheduler.begin_frame().unwrap()?;
        scheduler.submit_and_present(ticket).unwrap();
        Some(ticket)
    }

    #[test]
    fn frame_indices_rotate_and_serials_increase() {
        let mut scheduler = scheduler(2);
        let tickets: Vec<_> = (0..5).filter_map(|_| run_frame(&mut scheduler)).collect();
        let indices: Vec<_> = tickets.iter().map(|t| t.frame_index).collect();
        let serials: Vec<_> = tickets.iter().map(|t| t.frame_serial).collect();
        assert_eq!(indices, vec![0, 1, 0, 1, 0]);
        assert_eq!(serials, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn resize_skips_one_frame_and_bumps_generation() {
        let mut scheduler = scheduler(2);
        run_frame(&mut scheduler);
        let before = scheduler.swapchain_state();
        scheduler.on_window_resized(128, 96);
        assert!(scheduler.begin_frame().unwrap().is_none());
        let after = scheduler.swapchain_state();
        assert_eq!(after.generation, before.generation + 1);
        assert_eq!(after.extent, Extent2D::new(128, 96));
        assert_eq!(run_frame(&mut scheduler).unwrap().extent, Extent2D::new(128, 96));
    }

    #[test]
    fn zero_extent_yields_no_frames() {
        let mut scheduler = scheduler(2);
        scheduler.on_window_resized(0, 0);
        assert!(scheduler.begin_frame().unwrap().is_none());
        assert!(scheduler.begin_frame().unwrap().is_none());
        assert_eq!(scheduler.presented_frames(), 0);
    }

    #[test]
    fn out_of_range_frames_in_flight_is_rejected() {
        let device = Box::new(HeadlessDevice::new());
        assert!(HeadlessFrameScheduler::new(device, Extent2D::new(1, 1), 0).is_err());
        let device = Box::new(HeadlessDevice::new());
        assert!(HeadlessFrameScheduler::new(device, Extent2D::new(1, 1), 33).is_err());
    }
}
