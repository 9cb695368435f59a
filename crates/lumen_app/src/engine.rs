//! The engine loop.
//!
//! [`Engine`] owns the [`World`] and the [`ResourceManager`] side by side and
//! advances the world with a fixed-step accumulator:
//!
//! 1. `dt` is added to the accumulator.
//! 2. While a whole fixed step is available (and the per-frame cap is not
//!    reached) the world runs `fixed_tick`. Hitting the cap drops the rest of
//!    the accumulated time.
//! 3. The world runs `tick` and then `late_tick`.
//! 4. The frame index advances.
//!
//! A paused engine still advances the frame index but skips every tick.

use lumen_core::errors::{LumenError, Result};
use lumen_core::logging::targets;
use lumen_resources::ResourceManager;
use lumen_scene::{FixedTickContext, FrameTickContext, World};

use crate::config::EngineConfig;

pub struct Engine {
    config: EngineConfig,
    world: World,
    resources: ResourceManager,
    accumulator: f64,
    frame_index: u64,
    fixed_tick_index: u64,
    paused: bool,
    stop_requested: bool,
}

impl Engine {
    /// Validates `config` and creates the resource manager rooted at
    /// `config.resource_root_dir`.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let resources = ResourceManager::new(&config.resource_root_dir, config.max_frames_in_flight)?;
        Self::with_resources(config, resources)
    }

    /// Uses an existing resource manager.
    pub fn with_resources(config: EngineConfig, resources: ResourceManager) -> Result<Self> {
        config.validate()?;
        log::info!(
            target: targets::ENGINE,
            "Engine created (fixed_delta_seconds={}, max_fixed_steps_per_frame={}, start_paused={})",
            config.fixed_delta_seconds,
            config.max_fixed_steps_per_frame,
            config.start_paused
        );
        Ok(Self {
            paused: config.start_paused,
            config,
            world: World::new(),
            resources,
            accumulator: 0.0,
            frame_index: 0,
            fixed_tick_index: 0,
            stop_requested: false,
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    #[must_use]
    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourceManager {
        &mut self.resources
    }

    /// Borrows the world and the resource manager at the same time.
    pub fn world_and_resources_mut(&mut self) -> (&mut World, &mut ResourceManager) {
        (&mut self.world, &mut self.resources)
    }

    #[inline]
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    #[inline]
    #[must_use]
    pub fn fixed_tick_index(&self) -> u64 {
        self.fixed_tick_index
    }

    /// Simulation time not yet consumed by fixed steps.
    #[inline]
    #[must_use]
    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    pub fn pause(&mut self) {
        if !self.paused {
            log::info!(target: targets::ENGINE, "Engine paused at frame {}.", self.frame_index);
        }
        self.paused = true;
    }

    pub fn resume(&mut self) {
        if self.paused {
            log::info!(target: targets::ENGINE, "Engine resumed at frame {}.", self.frame_index);
        }
        self.paused = false;
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Asks [`run_for_frames`](Self::run_for_frames) to stop after the
    /// current frame.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    pub fn reset_stop_request(&mut self) {
        self.stop_requested = false;
    }

    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// Advances the world by `delta_seconds`.
    pub fn run_frame(&mut self, delta_seconds: f64) -> Result<()> {
        if !delta_seconds.is_finite() || delta_seconds < 0.0 {
            return Err(LumenError::invalid_argument(format!(
                "delta_seconds must be finite and >= 0, got {delta_seconds}"
            )));
        }

        if self.paused {
            self.frame_index += 1;
            return Ok(());
        }

        let fixed_delta_seconds = self.config.fixed_delta_seconds;
        self.accumulator += delta_seconds;
        let mut steps = 0;
        while self.accumulator >= fixed_delta_seconds {
            if steps >= self.config.max_fixed_steps_per_frame {
                log::debug!(
                    target: targets::ENGINE,
                    "Fixed step cap reached at frame {}; dropping {:.4}s of accumulated time.",
                    self.frame_index,
                    self.accumulator
                );
                self.accumulator = 0.0;
                break;
            }
            self.world.fixed_tick(&FixedTickContext {
                fixed_delta_seconds,
                fixed_tick_index: self.fixed_tick_index,
            })?;
            self.accumulator -= fixed_delta_seconds;
            self.fixed_tick_index += 1;
            steps += 1;
        }

        let tick = FrameTickContext {
            delta_seconds,
            unscaled_delta_seconds: delta_seconds,
            frame_index: self.frame_index,
        };
        self.world.tick(&tick)?;
        self.world.late_tick(&tick)?;
        self.frame_index += 1;
        Ok(())
    }

    /// Runs up to `frame_count` frames of `delta_seconds` each, stopping early
    /// once a stop is requested. Returns the number of frames run.
    pub fn run_for_frames(&mut self, frame_count: u64, delta_seconds: f64) -> Result<u64> {
        let mut frames = 0;
        while frames < frame_count && !self.stop_requested {
            self.run_frame(delta_seconds)?;
            frames += 1;
        }
        Ok(frames)
    }
}
