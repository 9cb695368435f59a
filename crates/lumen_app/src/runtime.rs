//! Frame orchestration around the engine loop.
//!
//! One [`Runtime::run_frame`] call performs, in order:
//!
//! - [`Engine::run_frame`] (fixed ticks, tick, late tick)
//! - [`RenderPipeline::prepare_frame`] against the active scene
//! - [`FrameScheduler::begin_frame`]; a skipped frame ends here
//! - [`RenderPipeline::render`] into the ticket's command buffer
//! - [`FrameScheduler::submit_and_present`]
//! - [`ResourceManager::tick`] with the frame serial, destroying retired GPU objects
//!
//! Swapchain changes reported by the scheduler are forwarded to the pipeline
//! before it records.

use std::sync::Arc;

use lumen_core::errors::{Result, ResultExt};
use lumen_core::logging::targets;
use lumen_core::rhi::Device;
use lumen_render::{FramePrepareContext, FrameScheduler, FrameTicket, RenderPipeline};
use lumen_resources::ResourceManager;

use crate::engine::Engine;

pub struct Runtime<S: FrameScheduler, P: RenderPipeline> {
    engine: Engine,
    scheduler: S,
    pipeline: P,
    device: Arc<dyn Device>,
    swapchain_generation: u64,
    shut_down: bool,
}

impl<S: FrameScheduler, P: RenderPipeline> Runtime<S, P> {
    pub fn new(engine: Engine, scheduler: S, pipeline: P, device: Arc<dyn Device>) -> Self {
        let swapchain_generation = scheduler.swapchain_state().generation;
        log::info!(
            target: targets::ENGINE,
            "Runtime created (pipeline='{}', frames_in_flight={})",
            pipeline.name(),
            scheduler.frames_in_flight()
        );
        Self {
            engine,
            scheduler,
            pipeline,
            device,
            swapchain_generation,
            shut_down: false,
        }
    }

    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    #[must_use]
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    #[must_use]
    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut P {
        &mut self.pipeline
    }

    #[must_use]
    pub fn resources(&self) -> &ResourceManager {
        self.engine.resources()
    }

    pub fn on_window_resized(&mut self, width: u32, height: u32) {
        self.scheduler.on_window_resized(width, height);
        self.pipeline.on_resize(width, height);
    }

    fn sync_swapchain_state(&mut self) -> Result<()> {
        let state = self.scheduler.swapchain_state();
        if state.generation != self.swapchain_generation {
            self.pipeline.on_swapchain_state_changed(&state)?;
            self.swapchain_generation = state.generation;
        }
        Ok(())
    }

    /// Runs one frame. Returns the presented frame's ticket, or `None` when
    /// the scheduler skipped the frame.
    pub fn run_frame(&mut self, delta_seconds: f64) -> Result<Option<FrameTicket>> {
        self.engine.run_frame(delta_seconds)?;

        let frame_serial = self.engine.frame_index();
        let (world, resources) = self.engine.world_and_resources_mut();
        let mut prepare = FramePrepareContext {
            world,
            resources,
            frame_serial,
            delta_seconds,
        };
        self.pipeline
            .prepare_frame(&mut prepare)
            .with_context(|| format!("pipeline '{}' prepare_frame", self.pipeline.name()))?;

        let ticket = self.scheduler.begin_frame()?;
        self.sync_swapchain_state()?;
        let Some(ticket) = ticket else {
            log::trace!(target: targets::ENGINE, "Frame skipped by scheduler.");
            return Ok(None);
        };

        let frame = self.scheduler.frame_targets(&ticket)?;
        self.pipeline
            .render(&ticket, frame)
            .with_context(|| format!("pipeline '{}' render", self.pipeline.name()))?;
        self.scheduler.submit_and_present(ticket)?;
        self.engine.resources_mut().tick(ticket.frame_serial);
        Ok(Some(ticket))
    }

    /// Runs up to `frame_count` frames, stopping early on
    /// [`Engine::request_stop`]. Returns the number of frames run.
    pub fn run_for_frames(&mut self, frame_count: u64, delta_seconds: f64) -> Result<u64> {
        let mut frames = 0;
        while frames < frame_count && !self.engine.is_stop_requested() {
            self.run_frame(delta_seconds)?;
            frames += 1;
        }
        Ok(frames)
    }

    /// Waits for the device and releases every GPU resource. Idempotent.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        self.device.wait_idle()?;
        let released = self.engine.resources_mut().flush_after_wait_idle();
        self.shut_down = true;
        log::info!(target: targets::ENGINE, "Runtime shut down ({released} GPU object(s) released).");
        Ok(())
    }
}

impl<S: FrameScheduler, P: RenderPipeline> Drop for Runtime<S, P> {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::error!(target: targets::ENGINE, "Runtime shutdown failed: {err}");
        }
    }
}
