//! # Lumen
//!
//! Scene, resource and render coordination core for a Vulkan-style real-time
//! renderer, with a bridge to the PBPT offline path tracer.
//!
//! This crate re-exports the workspace members:
//!
//! - [`core`]: ids, error taxonomy, event bus, logging targets, GPU surface
//! - [`resources`]: handle-based resource manager with deferred GPU retirement
//! - [`scene`]: scene graph, game objects, components, cameras, world
//! - [`render`]: frame scheduler, render graph, forward pipeline
//! - [`pbpt`]: PBPT scene import/export and the offline render service
//! - [`app`]: engine loop, runtime and configuration
//!
//! ```rust,ignore
//! use lumen::prelude::*;
//!
//! let mut engine = Engine::new(EngineConfig::default())?;
//! let (world, resources) = engine.world_and_resources_mut();
//! let scene = world.create_scene("cbox");
//! let package = load_scene_file("assets/cbox/cbox.xml".as_ref(), scene, resources, &ImportOptions::default())?;
//! engine.run_frame(1.0 / 60.0)?;
//! ```

pub use lumen_app as app;
pub use lumen_core as core;
pub use lumen_pbpt as pbpt;
pub use lumen_render as render;
pub use lumen_resources as resources;
pub use lumen_scene as scene;

pub use glam as math;

pub use lumen_app::{Engine, EngineConfig, Runtime, init_logging};
pub use lumen_core::errors::{LumenError, Result};
pub use lumen_core::ids::{GameObjectId, SceneId};
pub use lumen_resources::ResourceManager;
pub use lumen_scene::{GameObject, Scene, SceneGraph, World};

/// Commonly used types in one import.
pub mod prelude {
    pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

    pub use lumen_app::{Engine, EngineConfig, Runtime};
    pub use lumen_core::errors::{LumenError, Result, ResultExt};
    pub use lumen_core::event::TypedEventCenter;
    pub use lumen_core::ids::{GameObjectId, SceneId};
    pub use lumen_pbpt::{
        CompatibleInfo, ImportOptions, ImportPackage, OfflineRenderConfig, OfflineRenderState,
        PbptOfflineRenderService, build_scene_result, export_scene_file, load_scene_file,
    };
    pub use lumen_render::{ForwardPipeline, ForwardPipelineConfig, FrameScheduler, RenderPipeline};
    pub use lumen_resources::{MeshKind, ResourceManager, TextureKind};
    pub use lumen_scene::{
        Camera, Component, GameObject, MeshRenderer, PbptLight, PbptMesh, PointLight, Scene, SceneGraph, World,
    };
}
