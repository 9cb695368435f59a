//! Render coordination for the Lumen engine.
//!
//! - [`FrameScheduler`]: begin / submit-present around one command buffer per frame
//! - [`RenderGraph`] / [`RenderPass`]: ordered passes with declared dependencies
//! - [`FrameContext`]: name-keyed buffers, images and descriptor sets per frame
//! - [`SceneTargetController`]: scene-sized targets with frame-safe retirement
//! - [`RenderPipeline`]: what the engine loop drives; [`forward`] is the built-in one

pub mod binder;
pub mod forward;
pub mod frame_context;
pub mod graph;
pub mod pipeline;
pub mod scene_target;
pub mod scheduler;

pub use binder::{BoundRegistries, FrameResourceBinder};
pub use forward::{ForwardPipeline, ForwardPipelineConfig, ForwardSceneView, build_forward_scene_view};
pub use frame_context::{FrameContext, FrameRegistries, ResourceRegistry};
pub use graph::{RenderGraph, RenderPass, ResourceAccess, ResourceDependency};
pub use pipeline::{FramePrepareContext, RenderPipeline, SwapchainChangeSummary, resolve_shader_path};
pub use scene_target::{SceneTargetController, SceneViewportResizeEvent};
pub use scheduler::{FrameScheduler, FrameTargets, FrameTicket, HeadlessFrameScheduler, SwapchainState};
