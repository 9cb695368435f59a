//! Render graph executor
//!
//! `RenderGraph` runs passes in insertion order. Declared dependencies are
//! checked, not scheduled: a pass may not read a resource that only a later
//! pass produces, and every dependency must resolve in the frame registries
//! before the pass runs.

use std::any::Any;

use lumen_core::errors::{LumenError, Result, ResultExt};
use lumen_core::logging::targets;
use lumen_core::rhi::Device;
use rustc_hash::FxHashMap;

use crate::frame_context::FrameContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceAccess {
    Read,
    Write,
    ReadWrite,
}

impl ResourceAccess {
    #[must_use]
    pub fn reads(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    #[must_use]
    pub fn writes(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

/// A named resource a pass touches and how.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceDependency {
    pub name: String,
    pub access: ResourceAccess,
}

impl ResourceDependency {
    pub fn new(name: impl Into<String>, access: ResourceAccess) -> Self {
        Self {
            name: name.into(),
            access,
        }
    }

    pub fn read(name: impl Into<String>) -> Self {
        Self::new(name, ResourceAccess::Read)
    }

    pub fn write(name: impl Into<String>) -> Self {
        Self::new(name, ResourceAccess::Write)
    }

    pub fn read_write(name: impl Into<String>) -> Self {
        Self::new(name, ResourceAccess::ReadWrite)
    }
}

/// One unit of recorded GPU work.
pub trait RenderPass: Any + Send {
    fn name(&self) -> &str;

    fn dependencies(&self) -> &[ResourceDependency];

    /// Creates pass-owned GPU state. Called once by [`RenderGraph::create_resources`].
    fn create_resources(&mut self, _device: &dyn Device) -> Result<()> {
        Ok(())
    }

    fn execute(&mut self, ctx: &mut FrameContext<'_>) -> Result<()>;
}

/// Ordered list of passes.
#[derive(Default)]
pub struct RenderGraph {
    passes: Vec<Box<dyn RenderPass>>,
}

impl RenderGraph {
    #[must_use]
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            passes: Vec::with_capacity(capacity),
        }
    }

    /// Appends a pass. Duplicate pass names and empty resource names are rejected.
    pub fn add_pass(&mut self, pass: Box<dyn RenderPass>) -> Result<()> {
        let name = pass.name();
        if name.is_empty() {
            return Err(LumenError::invalid_argument("render pass name must not be empty"));
        }
        if self.passes.iter().any(|existing| existing.name() == name) {
            return Err(LumenError::invalid_argument(format!("render pass '{name}' is already registered")));
        }
        if pass.dependencies().iter().any(|dependency| dependency.name.is_empty()) {
            return Err(LumenError::invalid_argument(format!(
                "render pass '{name}' declares a dependency with an empty resource name"
            )));
        }
        log::debug!(target: targets::RENDER_GRAPH, "Render pass '{name}' added at position {}", self.passes.len());
        self.passes.push(pass);
        Ok(())
    }

    /// Appends a pass (chained).
    pub fn with_pass(mut self, pass: Box<dyn RenderPass>) -> Result<Self> {
        self.add_pass(pass)?;
        Ok(self)
    }

    /// Rejects graphs where a pass reads a resource whose only producers run
    /// after it. Resources nobody writes are treated as external inputs.
    pub fn validate(&self) -> Result<()> {
        let mut first_writer: FxHashMap<&str, usize> = FxHashMap::default();
        for (index, pass) in self.passes.iter().enumerate() {
            for dependency in pass.dependencies() {
                if dependency.access.writes() {
                    first_writer.entry(dependency.name.as_str()).or_insert(index);
                }
            }
        }
        for (index, pass) in self.passes.iter().enumerate() {
            for dependency in pass.dependencies().iter().filter(|d| d.access == ResourceAccess::Read) {
                if let Some(&writer) = first_writer.get(dependency.name.as_str())
                    && writer > index
                {
                    return Err(LumenError::invariant(format!(
                        "render pass '{}' reads '{}' before its producer '{}'",
                        pass.name(),
                        dependency.name,
                        self.passes[writer].name()
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn create_resources(&mut self, device: &dyn Device) -> Result<()> {
        for pass in &mut self.passes {
            pass.create_resources(device)
                .with_context(|| format!("render pass '{}' create_resources failed", pass.name()))?;
        }
        Ok(())
    }

    /// Runs every pass in order, each inside a debug label.
    pub fn execute(&mut self, ctx: &mut FrameContext<'_>) -> Result<()> {
        for pass in &mut self.passes {
            ctx.check_dependencies(pass.name(), pass.dependencies())?;
            ctx.cmd().begin_debug_label(pass.name());
            let result = pass.execute(ctx);
            ctx.cmd().end_debug_label();
            result.with_context(|| format!("render pass '{}' failed", pass.name()))?;
        }
        Ok(())
    }

    #[must_use]
    pub fn pass<T: RenderPass>(&self) -> Option<&T> {
        self.passes.iter().find_map(|pass| {
            let pass: &dyn Any = &**pass;
            pass.downcast_ref::<T>()
        })
    }

    pub fn pass_mut<T: RenderPass>(&mut self) -> Option<&mut T> {
        self.passes.iter_mut().find_map(|pass| {
            let pass: &mut dyn Any = &mut **pass;
            pass.downcast_mut::<T>()
        })
    }

    #[must_use]
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    #[inline]
    #[must_use]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.passes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named {
        name: &'static str,
        dependencies: Vec<ResourceDependency>,
    }

    impl RenderPass for Named {
        fn name(&self) -> &str {
            self.name
        }

        fn dependencies(&self) -> &[ResourceDependency] {
            &self.dependencies
        }

        fn execute(&mut self, _ctx: &mut FrameContext<'_>) -> Result<()> {
            Ok(())
        }
    }

    fn pass(name: &'static str, dependencies: Vec<ResourceDependency>) -> Box<dyn RenderPass> {
        Box::new(Named { name, dependencies })
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut graph = RenderGraph::new();
        graph.add_pass(pass("a", vec![])).unwrap();
        assert!(graph.add_pass(pass("a", vec![])).is_err());
        assert!(graph.add_pass(pass("b", vec![ResourceDependency::read("")])).is_err());
        assert_eq!(graph.pass_count(), 1);
    }

    #[test]
    fn reading_before_the_producer_fails_validation() {
        let graph = RenderGraph::new()
            .with_pass(pass("consumer", vec![ResourceDependency::read("shadow")]))
            .unwrap()
            .with_pass(pass("producer", vec![ResourceDependency::write("shadow")]))
            .unwrap();
        assert!(graph.validate().is_err());

        let graph = RenderGraph::new()
            .with_pass(pass("producer", vec![ResourceDependency::write("shadow")]))
            .unwrap()
            .with_pass(pass("consumer", vec![ResourceDependency::read("shadow")]))
            .unwrap()
            .with_pass(pass("external", vec![ResourceDependency::read("swapchain_color")]))
            .unwrap();
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn passes_are_found_by_type() {
        let mut graph = RenderGraph::with_capacity(1);
        graph.add_pass(pass("a", vec![])).unwrap();
        assert_eq!(graph.pass::<Named>().map(|p| p.name), Some("a"));
        assert!(graph.pass_mut::<Named>().is_some());
        graph.clear();
        assert!(graph.pass::<Named>().is_none());
    }
}
