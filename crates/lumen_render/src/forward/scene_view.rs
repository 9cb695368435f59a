//! Frame-owned snapshot of what the forward pipeline draws.

use glam::{Mat4, Vec3, Vec4};
use lumen_core::errors::{LumenError, Result};
use lumen_core::logging::targets;
use lumen_resources::{MeshHandle, ResourceManager, TextureHandle};
use lumen_scene::{MeshRenderer, PointLight, Scene};
use smallvec::SmallVec;

pub const MAX_POINT_LIGHTS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForwardSceneCamera {
    pub view: Mat4,
    pub proj: Mat4,
    pub world_position: Vec3,
}

impl Default for ForwardSceneCamera {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
            world_position: Vec3::ZERO,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForwardScenePointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub range: f32,
    pub specular_strength: f32,
    pub shininess: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForwardSceneRenderable {
    pub instance_id: u64,
    pub mesh: MeshHandle,
    pub albedo: Option<TextureHandle>,
    pub base_color: Vec4,
    pub model: Mat4,
    /// `transpose(inverse(model))`
    pub normal: Mat4,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ForwardSceneView {
    pub camera: ForwardSceneCamera,
    pub point_lights: SmallVec<[ForwardScenePointLight; MAX_POINT_LIGHTS]>,
    pub renderables: Vec<ForwardSceneRenderable>,
}

impl ForwardSceneView {
    /// True when nothing would be drawn.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.renderables.is_empty()
    }
}

/// Collects the active camera, up to [`MAX_POINT_LIGHTS`] point lights and
/// every enabled `MeshRenderer` on an active node, in hierarchy order.
///
/// Fails when the scene has no active camera or a renderer references a
/// mesh or texture that is invalid or no longer loaded.
pub fn build_forward_scene_view(scene: &Scene, resources: &ResourceManager) -> Result<ForwardSceneView> {
    let graph = scene.graph();
    let camera = scene
        .active_camera()
        .ok_or_else(|| LumenError::not_found("Active scene has no active camera."))?;

    let mut view = ForwardSceneView {
        camera: ForwardSceneCamera {
            view: camera.view_matrix(graph)?,
            proj: camera.projection_matrix(),
            world_position: camera.world_position(graph)?,
        },
        ..ForwardSceneView::default()
    };

    let active_nodes = graph.active_nodes();
    view.renderables.reserve(active_nodes.len());

    for id in active_nodes {
        let Some(game_object) = scene.game_object(id) else {
            continue;
        };
        let Some(model) = graph.world_matrix(id) else {
            continue;
        };

        if game_object.is_component_enabled::<PointLight>() == Some(true)
            && let Some(light) = game_object.get_component::<PointLight>()
        {
            if view.point_lights.len() < MAX_POINT_LIGHTS {
                view.point_lights.push(ForwardScenePointLight {
                    position: model.w_axis.truncate(),
                    color: light.color,
                    intensity: light.intensity(),
                    range: light.range(),
                    specular_strength: light.specular_strength(),
                    shininess: light.shininess(),
                });
            } else {
                log::trace!(target: targets::FORWARD_SCENE_VIEW, "Point light on {id} skipped, limit reached.");
            }
        }

        if game_object.is_component_enabled::<MeshRenderer>() != Some(true) {
            continue;
        }
        let Some(renderer) = game_object.get_component::<MeshRenderer>() else {
            continue;
        };

        let mesh = renderer.mesh();
        if !resources.alive(mesh) {
            return Err(LumenError::invalid_argument(format!(
                "MeshRenderer mesh handle is invalid or unloaded (game_object={id}, mesh={mesh})."
            )));
        }
        let albedo = renderer.albedo();
        if let Some(texture) = albedo
            && !resources.alive(texture)
        {
            return Err(LumenError::invalid_argument(format!(
                "MeshRenderer albedo texture is invalid or unloaded (game_object={id}, texture={texture})."
            )));
        }

        view.renderables.push(ForwardSceneRenderable {
            instance_id: id.value(),
            mesh,
            albedo,
            base_color: renderer.base_color(),
            model,
            normal: model.inverse().transpose(),
        });
    }

    log::trace!(
        target: targets::FORWARD_SCENE_VIEW,
        "Scene view built (scene_id={}, renderables={}, point_lights={})",
        scene.id(),
        view.renderables.len(),
        view.point_lights.len()
    );
    Ok(view)
}
