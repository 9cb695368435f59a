//! Forward rendering of the active scene.

pub mod pass;
pub mod pipeline;
pub mod scene_view;
pub mod uniforms;

pub use pass::{ForwardDrawItem, ForwardPass, OverlayRenderer};
pub use pipeline::{ForwardPipeline, ForwardPipelineConfig, ForwardSceneTargets, MAX_RENDERABLES};
pub use scene_view::{
    ForwardSceneCamera, ForwardScenePointLight, ForwardSceneRenderable, ForwardSceneView, MAX_POINT_LIGHTS,
    build_forward_scene_view,
};
pub use uniforms::{ForwardObjectUniforms, pack_mat4_row_major};
