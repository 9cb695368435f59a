//! Scene-sized offscreen targets with frame-safe retirement.
//!
//! A [`SceneTargetController`] rebuilds its targets when the scene viewport or
//! the swapchain changes size. The previous targets are kept alive until every
//! other frame slot has been recorded again, since command buffers still in
//! flight in those slots may reference them.

use std::sync::Arc;

use lumen_core::errors::{LumenError, Result};
use lumen_core::event::{SubscriptionToken, TypedEventCenter};
use lumen_core::logging::targets;
use lumen_core::rhi::Extent2D;
use parking_lot::Mutex;

use crate::scheduler::validate_frames_in_flight;

/// Published by the host when the scene viewport changes size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SceneViewportResizeEvent {
    pub width: u32,
    pub height: u32,
}

struct RetiredTargets<T> {
    targets: T,
    pending_frame_mask: u32,
    generation: u64,
}

#[derive(Default)]
struct ViewportRequest {
    extent: Extent2D,
    dirty: bool,
}

pub struct SceneTargetController<T> {
    debug_name: String,
    frames_in_flight: u32,
    targets: Option<T>,
    retired: Vec<RetiredTargets<T>>,
    scene_extent: Extent2D,
    request: Arc<Mutex<ViewportRequest>>,
    active_generation: u64,
    recreated_this_frame: bool,
    _resize_subscription: SubscriptionToken,
}

impl<T> SceneTargetController<T> {
    /// Creates a controller listening for [`SceneViewportResizeEvent`] on `events`.
    pub fn new(events: &TypedEventCenter, debug_name: impl Into<String>, frames_in_flight: u32) -> Result<Self> {
        validate_frames_in_flight(frames_in_flight)?;
        let request = Arc::new(Mutex::new(ViewportRequest::default()));
        let handler_request = Arc::clone(&request);
        let subscription = events.subscribe(move |event: &SceneViewportResizeEvent| {
            let extent = Extent2D::new(event.width, event.height);
            if !extent.is_valid() {
                return Ok(());
            }
            let mut request = handler_request.lock();
            if request.extent != extent {
                request.extent = extent;
                request.dirty = true;
            }
            Ok(())
        });
        Ok(Self {
            debug_name: debug_name.into(),
            frames_in_flight,
            targets: None,
            retired: Vec::new(),
            scene_extent: Extent2D::default(),
            request,
            active_generation: 0,
            recreated_this_frame: false,
            _resize_subscription: subscription,
        })
    }

    fn all_frames_mask(&self) -> u32 {
        if self.frames_in_flight == 32 {
            u32::MAX
        } else {
            (1u32 << self.frames_in_flight) - 1
        }
    }

    fn collect_retired(&mut self, frame_index: u32) {
        let frame_bit = 1u32 << frame_index;
        let before = self.retired.len();
        for retired in &mut self.retired {
            retired.pending_frame_mask &= !frame_bit;
        }
        self.retired.retain(|retired| retired.pending_frame_mask != 0);
        let released = before - self.retired.len();
        if released > 0 {
            log::debug!(
                target: targets::SCENE_TARGET_CONTROLLER,
                "[{}] collect_retired: released={released}, remaining={}",
                self.debug_name,
                self.retired.len()
            );
        }
    }

    fn retire(&mut self, frame_index: u32, previous: T) {
        let pending_frame_mask = self.all_frames_mask() & !(1u32 << frame_index);
        if pending_frame_mask == 0 {
            log::debug!(
                target: targets::SCENE_TARGET_CONTROLLER,
                "[{}] enqueue_retired: dropped immediately (all frame slots already safe).",
                self.debug_name
            );
            return;
        }
        self.retired.push(RetiredTargets {
            targets: previous,
            pending_frame_mask,
            generation: self.active_generation,
        });
        log::debug!(
            target: targets::SCENE_TARGET_CONTROLLER,
            "[{}] enqueue_retired: pending_mask={pending_frame_mask:#x}, retired_count={}",
            self.debug_name,
            self.retired.len()
        );
    }

    /// Forces a rebuild on the next `ensure`.
    pub fn request_recreate(&mut self) {
        self.request.lock().dirty = true;
    }

    pub fn on_swapchain_extent_changed(&mut self) {
        self.request_recreate();
    }

    /// Returns targets valid for `frame_index`, rebuilding them first when the
    /// desired extent changed or a rebuild was requested.
    ///
    /// The desired extent is the last viewport size published, else
    /// `fallback_extent`. A rebuild calls `wait_fn`, then `create_fn` with the
    /// desired extent, then `post_fn` with the new targets.
    pub fn ensure<W, C, P>(
        &mut self,
        frame_index: u32,
        fallback_extent: Extent2D,
        wait_fn: W,
        create_fn: C,
        post_fn: P,
    ) -> Result<&T>
    where
        W: FnOnce() -> Result<()>,
        C: FnOnce(Extent2D) -> Result<T>,
        P: FnOnce(&T) -> Result<()>,
    {
        if frame_index >= self.frames_in_flight {
            return Err(LumenError::invalid_argument(format!(
                "{} frame index out of range.",
                self.debug_name
            )));
        }
        if !fallback_extent.is_valid() {
            return Err(LumenError::invalid_argument(format!(
                "{} fallback extent is invalid.",
                self.debug_name
            )));
        }
        self.collect_retired(frame_index);
        self.recreated_this_frame = false;

        let (requested, dirty) = {
            let request = self.request.lock();
            (request.extent, request.dirty)
        };
        let desired = if requested.is_valid() { requested } else { fallback_extent };
        let need_recreate = dirty || self.targets.is_none() || self.scene_extent != desired;

        if need_recreate {
            wait_fn()?;
            let new_targets = create_fn(desired)?;
            if let Some(previous) = self.targets.take() {
                self.retire(frame_index, previous);
            }
            self.scene_extent = desired;
            self.active_generation += 1;
            self.recreated_this_frame = true;
            let active = self.targets.insert(new_targets);
            post_fn(active)?;
            self.request.lock().dirty = false;
            log::debug!(
                target: targets::SCENE_TARGET_CONTROLLER,
                "[{}] recreate: generation={}, extent=({}, {}), retired_count={}",
                self.debug_name,
                self.active_generation,
                desired.width,
                desired.height,
                self.retired.len()
            );
        }
        self.require_targets()
    }

    pub fn require_targets(&self) -> Result<&T> {
        self.targets.as_ref().ok_or_else(|| {
            LumenError::invariant(format!("{} scene targets are not initialized.", self.debug_name))
        })
    }

    #[must_use]
    pub fn scene_extent(&self) -> Extent2D {
        self.scene_extent
    }

    #[must_use]
    pub fn active_generation(&self) -> u64 {
        self.active_generation
    }

    #[must_use]
    pub fn recreated_this_frame(&self) -> bool {
        self.recreated_this_frame
    }

    #[must_use]
    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    /// Targets still waiting for retirement, oldest first.
    pub fn retired_targets(&self) -> impl Iterator<Item = &T> {
        self.retired.iter().map(|retired| &retired.targets)
    }

    /// Generations of the targets still waiting for retirement, oldest first.
    #[must_use]
    pub fn retired_generations(&self) -> Vec<u64> {
        self.retired.iter().map(|retired| retired.generation).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn ensure_counting(
        controller: &mut SceneTargetController<Extent2D>,
        frame_index: u32,
        fallback: Extent2D,
        waits: &Cell<u32>,
    ) -> Extent2D {
        *controller
            .ensure(
                frame_index,
                fallback,
                || {
                    waits.set(waits.get() + 1);
                    Ok(())
                },
                Ok,
                |_| Ok(()),
            )
            .unwrap()
    }

    #[test]
    fn rebuilds_only_on_change() {
        let events = TypedEventCenter::new();
        let mut controller = SceneTargetController::new(&events, "test", 2).unwrap();
        let waits = Cell::new(0);
        let extent = Extent2D::new(100, 50);

        assert_eq!(ensure_counting(&mut controller, 0, extent, &waits), extent);
        assert!(controller.recreated_this_frame());
        assert_eq!(controller.active_generation(), 1);

        ensure_counting(&mut controller, 1, extent, &waits);
        assert!(!controller.recreated_this_frame());
        assert_eq!(controller.active_generation(), 1);
        assert_eq!(waits.get(), 1);
    }

    #[test]
    fn viewport_resize_wins_over_fallback_and_zero_is_ignored() {
        let events = TypedEventCenter::new();
        let mut controller = SceneTargetController::new(&events, "test", 2).unwrap();
        let waits = Cell::new(0);
        let fallback = Extent2D::new(100, 50);
        ensure_counting(&mut controller, 0, fallback, &waits);

        events.publish(&SceneViewportResizeEvent { width: 0, height: 10 }).unwrap();
        ensure_counting(&mut controller, 1, fallback, &waits);
        assert!(!controller.recreated_this_frame());

        events.publish(&SceneViewportResizeEvent { width: 40, height: 30 }).unwrap();
        assert_eq!(ensure_counting(&mut controller, 0, fallback, &waits), Extent2D::new(40, 30));
        assert_eq!(controller.active_generation(), 2);
    }

    #[test]
    fn retired_targets_wait_for_other_frame_slots() {
        let events = TypedEventCenter::new();
        let mut controller = SceneTargetController::new(&events, "test", 3).unwrap();
        let waits = Cell::new(0);
        ensure_counting(&mut controller, 0, Extent2D::new(8, 8), &waits);

        // Rebuilt in slot 1: slots 0 and 2 may still use generation 1.
        ensure_counting(&mut controller, 1, Extent2D::new(16, 16), &waits);
        assert_eq!(controller.retired_generations(), vec![1]);
        ensure_counting(&mut controller, 2, Extent2D::new(16, 16), &waits);
        assert_eq!(controller.retired_count(), 1);
        ensure_counting(&mut controller, 0, Extent2D::new(16, 16), &waits);
        assert_eq!(controller.retired_count(), 0);
    }

    #[test]
    fn single_frame_in_flight_drops_immediately() {
        let events = TypedEventCenter::new();
        let mut controller = SceneTargetController::new(&events, "test", 1).unwrap();
        let waits = Cell::new(0);
        ensure_counting(&mut controller, 0, Extent2D::new(8, 8), &waits);
        controller.request_recreate();
        ensure_counting(&mut controller, 0, Extent2D::new(8, 8), &waits);
        assert_eq!(controller.retired_count(), 0);
        assert_eq!(controller.active_generation(), 2);
    }

    #[test]
    fn invalid_arguments_are_rejected() {
        let events = TypedEventCenter::new();
        let mut controller: SceneTargetController<Extent2D> = SceneTargetController::new(&events, "test", 2).unwrap();
        assert!(controller.ensure(2, Extent2D::new(1, 1), || Ok(()), Ok, |_| Ok(())).is_err());
        assert!(controller.ensure(0, Extent2D::new(0, 1), || Ok(()), Ok, |_| Ok(())).is_err());
        assert!(controller.require_targets().is_err());
        assert!(SceneTargetController::<Extent2D>::new(&events, "test", 33).is_err());
    }
}
