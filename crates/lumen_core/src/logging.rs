//! Central registry of log targets.
//!
//! Every subsystem logs through the `log` facade with one of these targets so
//! that `RUST_LOG` filters such as `framework.integration.pbpt=debug` work
//! across crates.

pub mod targets {
    pub const SCENE: &str = "framework.core.scene";
    pub const SCENE_GRAPH: &str = "framework.core.scene_graph";
    pub const CAMERA_MANAGER: &str = "framework.core.camera_manager";
    pub const WORLD: &str = "framework.core.world";
    pub const ENGINE: &str = "framework.core.engine";
    pub const COMPONENT: &str = "framework.component";
    pub const FREE_LOOK: &str = "framework.component.free_look";
    pub const TRACKBALL: &str = "framework.component.trackball";

    pub const RESOURCE_MANAGER: &str = "resource.manager";

    pub const FRAME_SCHEDULER: &str = "render.frame_scheduler";
    pub const RENDER_GRAPH: &str = "render.graph";
    pub const FORWARD_PIPELINE: &str = "render.pipeline.forward";
    pub const SCENE_TARGET_CONTROLLER: &str = "system.render.scene_target_controller";
    pub const FORWARD_SCENE_VIEW: &str = "system.render.forward_scene_view_builder";

    pub const PBPT_IMPORT: &str = "framework.integration.pbpt.import";
    pub const PBPT_EXPORT: &str = "framework.integration.pbpt.export";
    pub const PBPT_OFFLINE: &str = "framework.integration.pbpt.offline_service";

    pub const RHI_DEVICE: &str = "rhi.device";

    pub const EVENT: &str = "utils.event";
    pub const OBJ_IO: &str = "utils.obj_io";
    pub const IMAGE_IO: &str = "utils.image_io";
}
