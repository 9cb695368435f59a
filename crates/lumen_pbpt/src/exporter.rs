//! Building PBPT scenes from a [`Scene`].

use std::path::Path;

use lumen_core::errors::{LumenError, Result, ResultExt};
use lumen_core::logging::targets;
use lumen_resources::ResourceManager;
use lumen_scene::{PbptLight, PbptMesh, Scene};
use rustc_hash::FxHashSet;

use crate::bridge::{ExportContext, MapperDomain, SHAPE_EXPORT_MAPPERS, ShapeExport, dispatch};
use crate::compatible::CompatibleInfo;
use crate::model::{PbptCamera, PbptResources, PbptScene, SCENE_FORMAT_VERSION, SensorRecord};
use crate::writer::write_scene_file;

/// Sensor of the active perspective camera. Film, focus and fov axis come
/// from the imported sensor when there was one.
fn export_sensor(scene: &Scene, compatible_info: &CompatibleInfo) -> Result<SensorRecord> {
    let camera = scene
        .active_camera()
        .filter(|camera| camera.is_perspective())
        .ok_or_else(|| LumenError::invariant("PBPT export requires an active perspective camera."))?;
    let params = camera
        .perspective_params()
        .ok_or_else(|| LumenError::invariant("PBPT export requires an active perspective camera."))?;
    let to_world = scene
        .graph()
        .world_matrix(camera.owner())
        .ok_or_else(|| LumenError::not_found(format!("Camera owner {} has no scene-graph node.", camera.owner())))?;

    let mut sensor = compatible_info.passthrough_sensor.clone().unwrap_or_default();
    sensor.to_world = to_world;
    sensor.fov_degrees = params.fov_degrees;
    sensor.near_clip = camera.near;
    sensor.far_clip = camera.far;
    sensor.sample_count = compatible_info.passthrough_spp;
    Ok(sensor)
}

/// Passthrough resources reduced to what the passthrough shapes reference.
fn passthrough_resources(compatible_info: &CompatibleInfo) -> PbptResources {
    let mut resources = compatible_info.passthrough_resources.clone();
    resources
        .shape_instances
        .retain(|shape| compatible_info.is_passthrough_shape(&shape.shape_id));

    let meshes: FxHashSet<String> = resources.shape_instances.iter().map(|s| s.mesh_name.clone()).collect();
    let materials: FxHashSet<String> = resources
        .shape_instances
        .iter()
        .map(|s| s.material_ref_name.clone())
        .collect();
    let spectra: FxHashSet<String> = resources
        .shape_instances
        .iter()
        .filter_map(|s| s.emission_spectrum_name.clone())
        .collect();

    resources.meshes.retain(|name, _| meshes.contains(name));
    resources.materials.retain(|name, _| materials.contains(name));
    resources.spectra.retain(|name, _| spectra.contains(name));
    resources
        .lights
        .retain(|_, light| compatible_info.is_passthrough_shape(&light.shape_id));
    resources
}

/// Builds a PBPT scene from the enabled objects of `scene` plus the
/// passthrough data in `compatible_info`.
pub fn build_scene_result(
    scene: &Scene,
    resources: &ResourceManager,
    compatible_info: &CompatibleInfo,
) -> Result<PbptScene> {
    compatible_info.validate()?;

    let mut result = PbptScene {
        version: SCENE_FORMAT_VERSION.to_string(),
        integrator: compatible_info.passthrough_integrator.clone().unwrap_or_default(),
        camera: PbptCamera::ThinLensPerspective(export_sensor(scene, compatible_info)?),
        resources: passthrough_resources(compatible_info),
    };
    let passthrough_count = result.resources.shape_instances.len();

    let mut ctx = ExportContext::new(scene, resources, compatible_info);
    for id in scene.graph().active_nodes() {
        if !scene.is_game_object_enabled(id) {
            continue;
        }
        if scene.has_component::<PbptLight>(id) && !scene.has_component::<PbptMesh>(id) {
            return Err(LumenError::invariant(
                "PbptLight requires PbptMesh on the same GameObject for export.",
            ));
        }
        dispatch(SHAPE_EXPORT_MAPPERS, &id, &mut ctx, &mut result)
            .with_context(|| format!("[domain={}] GameObject {id}", ShapeExport::NAME))?;
    }

    log::debug!(
        target: targets::PBPT_EXPORT,
        "Built PBPT scene (mapped_shapes={}, passthrough_shapes={passthrough_count}, materials={}, meshes={})",
        result.resources.shape_instances.len() - passthrough_count,
        result.resources.materials.len(),
        result.resources.meshes.len()
    );
    Ok(result)
}

/// Builds the scene and writes it with its meshes to `path`.
pub fn export_scene_file(
    scene: &Scene,
    resources: &ResourceManager,
    compatible_info: &CompatibleInfo,
    path: &Path,
) -> Result<PbptScene> {
    if path.as_os_str().is_empty() {
        return Err(LumenError::invalid_argument("scene_xml_path must not be empty."));
    }
    let result = build_scene_result(scene, resources, compatible_info)?;
    write_scene_file(&result, path)?;
    Ok(result)
}
