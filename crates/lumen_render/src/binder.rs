//! Publishing pipeline-owned GPU objects into [`FrameRegistries`].

use lumen_core::errors::{Result, ResultExt};

use crate::frame_context::FrameRegistries;

/// Fills registries for the passes of one pipeline.
///
/// `bind_static_resources` runs once when the binder is attached;
/// `bind_frame_resources` runs before every frame is recorded.
pub trait FrameResourceBinder: Send {
    fn name(&self) -> &str;

    fn bind_static_resources(&mut self, _registries: &mut FrameRegistries) -> Result<()> {
        Ok(())
    }

    fn bind_frame_resources(&mut self, frame_index: u32, registries: &mut FrameRegistries) -> Result<()>;
}

/// Registries plus the binders that populate them.
pub struct BoundRegistries {
    registries: FrameRegistries,
    binders: Vec<Box<dyn FrameResourceBinder>>,
}

impl BoundRegistries {
    #[must_use]
    pub fn new(frames_in_flight: u32) -> Self {
        Self {
            registries: FrameRegistries::new(frames_in_flight),
            binders: Vec::new(),
        }
    }

    /// Runs the static binding of `binder` and keeps it for later frames.
    pub fn attach(&mut self, mut binder: Box<dyn FrameResourceBinder>) -> Result<()> {
        binder
            .bind_static_resources(&mut self.registries)
            .with_context(|| format!("static binding of '{}' failed", binder.name()))?;
        self.binders.push(binder);
        Ok(())
    }

    pub fn bind_frame(&mut self, frame_index: u32) -> Result<()> {
        for binder in &mut self.binders {
            binder
                .bind_frame_resources(frame_index, &mut self.registries)
                .with_context(|| format!("frame binding of '{}' failed", binder.name()))?;
        }
        Ok(())
    }

    #[must_use]
    pub fn registries(&self) -> &FrameRegistries {
        &self.registries
    }

    pub fn registries_mut(&mut self) -> &mut FrameRegistries {
        &mut self.registries
    }

    #[must_use]
    pub fn binder_count(&self) -> usize {
        self.binders.len()
    }
}

#[cfg(test)]
mod tests {
    use lumen_core::rhi::{BufferId, GpuObjectId};

    use super::*;

    struct TestBinder;

    impl FrameResourceBinder for TestBinder {
        fn name(&self) -> &str {
            "test"
        }

        fn bind_static_resources(&mut self, registries: &mut FrameRegistries) -> Result<()> {
            registries.buffers.set_global("shared", BufferId(GpuObjectId(1)))
        }

        fn bind_frame_resources(&mut self, frame_index: u32, registries: &mut FrameRegistries) -> Result<()> {
            registries
                .buffers
                .set_per_frame("per_frame", frame_index, BufferId(GpuObjectId(10 + u64::from(frame_index))))
        }
    }

    #[test]
    fn static_binding_happens_at_attach() {
        let mut bound = BoundRegistries::new(2);
        bound.attach(Box::new(TestBinder)).unwrap();
        assert!(bound.registries().buffers.contains("shared", 0));
        assert!(!bound.registries().buffers.contains("per_frame", 1));
        bound.bind_frame(1).unwrap();
        assert_eq!(
            bound.registries().buffers.resolve("per_frame", 1),
            Some(BufferId(GpuObjectId(11)))
        );
        assert_eq!(bound.binder_count(), 1);
    }
}
