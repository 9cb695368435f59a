//! Loading PBPT scenes into a [`Scene`].

use std::path::{Component, Path, PathBuf};

use lumen_core::errors::{LumenError, Result, ResultExt};
use lumen_core::logging::targets;
use lumen_resources::ResourceManager;
use lumen_scene::Scene;

use crate::bridge::{
    CAMERA_IMPORT_MAPPERS, CameraImport, INTEGRATOR_IMPORT_MAPPERS, ImportContext, ImportOptions, ImportPackage,
    IntegratorImport, MapperDomain, SHAPE_IMPORT_MAPPERS, ShapeImport, dispatch,
};
use crate::model::PbptScene;
use crate::reader::{ReadOptions, read_scene_file};

/// A scene file addressed relative to the resource root.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PbptSceneLocation {
    pub scene_root_rel_to_resource_dir: PathBuf,
    /// Bare file name inside the scene root.
    pub xml_filename: String,
}

impl PbptSceneLocation {
    pub fn new(scene_root_rel_to_resource_dir: impl Into<PathBuf>, xml_filename: impl Into<String>) -> Self {
        Self {
            scene_root_rel_to_resource_dir: scene_root_rel_to_resource_dir.into(),
            xml_filename: xml_filename.into(),
        }
    }

    /// Absolute path of the scene file below `resources`' root.
    pub fn resolve(&self, resources: &ResourceManager) -> Result<PathBuf> {
        if self.xml_filename.is_empty() {
            return Err(LumenError::invalid_argument("xml_filename must not be empty."));
        }
        let mut parts = Path::new(&self.xml_filename).components();
        if !matches!((parts.next(), parts.next()), (Some(Component::Normal(_)), None)) {
            return Err(LumenError::invalid_argument(
                "xml_filename must be a filename without path separator.",
            ));
        }
        resources.resolve_relative_path(&self.scene_root_rel_to_resource_dir.join(&self.xml_filename))
    }
}

/// Maps an already parsed scene onto `scene`.
///
/// The integrator and the camera must be mappable. Shapes no mapper accepts
/// become passthrough entries, or an error in strict mode.
pub fn import_scene(
    source: &PbptScene,
    scene: &mut Scene,
    resources: &mut ResourceManager,
    options: &ImportOptions,
) -> Result<ImportPackage> {
    let mut package = ImportPackage::default();
    package.compatible_info.passthrough_resources = source.resources.clone();
    package.compatible_info.passthrough_integrator = Some(source.integrator.clone());
    package.compatible_info.passthrough_spp = source.spp().max(1);
    package.compatible_info.passthrough_sensor = source.sensor().cloned();

    let mut ctx = ImportContext {
        source,
        scene,
        resources,
        options,
    };

    let integrator = dispatch(INTEGRATOR_IMPORT_MAPPERS, &source.integrator, &mut ctx, &mut package)
        .with_context(|| format!("[domain={}]", IntegratorImport::NAME))?;
    if !integrator.matched {
        return Err(LumenError::unsupported("Unsupported PBPT integrator in import."));
    }

    let camera = dispatch(CAMERA_IMPORT_MAPPERS, &source.camera, &mut ctx, &mut package)
        .with_context(|| format!("[domain={}]", CameraImport::NAME))?;
    if !camera.matched {
        return Err(LumenError::unsupported("Unsupported PBPT camera in import."));
    }

    for shape in &source.resources.shape_instances {
        let shape_result = dispatch(SHAPE_IMPORT_MAPPERS, shape, &mut ctx, &mut package)
            .with_context(|| format!("[domain={}] shape '{}'", ShapeImport::NAME, shape.shape_id))?;
        if shape_result.matched {
            continue;
        }
        if options.require_supported_cbox_subset {
            return Err(LumenError::unsupported(format!(
                "Unsupported PBPT shape '{}' (type={}) in strict import.",
                shape.shape_id, shape.shape_type
            )));
        }
        log::warn!(
            target: targets::PBPT_IMPORT,
            "Keeping unmapped shape '{}' (type={}) as passthrough.",
            shape.shape_id,
            shape.shape_type
        );
        package.compatible_info.passthrough_shape_ids.insert(shape.shape_id.clone());
    }

    ctx.scene.graph_mut().update_world_transforms();

    let result = &package.result;
    log::info!(
        target: targets::PBPT_IMPORT,
        "PBPT XML import completed (shapes={}, lights={}, camera_imported={}, passthrough={}).",
        result.imported_shape_count,
        result.imported_light_shape_count,
        result.sensor.is_some(),
        package.compatible_info.passthrough_shape_ids.len()
    );
    Ok(package)
}

fn read_options(options: &ImportOptions) -> ReadOptions {
    ReadOptions {
        strict: options.require_supported_cbox_subset,
    }
}

/// Reads `path` and imports it.
pub fn load_scene_file(
    path: &Path,
    scene: &mut Scene,
    resources: &mut ResourceManager,
    options: &ImportOptions,
) -> Result<ImportPackage> {
    read_scene_file(path, read_options(options))
        .and_then(|source| import_scene(&source, scene, resources, options))
        .with_context(|| format!("load_scene failed for '{}'", path.display()))
}

/// Imports a scene stored under the resource root.
pub fn import_scene_from_resources(
    location: &PbptSceneLocation,
    scene: &mut Scene,
    resources: &mut ResourceManager,
    options: &ImportOptions,
) -> Result<ImportPackage> {
    let path = location.resolve(resources)?;
    load_scene_file(&path, scene, resources, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_rejects_nested_file_names() {
        let root = tempfile::tempdir().unwrap();
        let resources = ResourceManager::new(root.path(), 2).unwrap();

        let ok = PbptSceneLocation::new("scenes/cbox", "cbox.xml").resolve(&resources).unwrap();
        assert!(ok.ends_with("scenes/cbox/cbox.xml"));

        assert!(PbptSceneLocation::new("scenes", "").resolve(&resources).is_err());
        assert!(PbptSceneLocation::new("scenes", "a/b.xml").resolve(&resources).is_err());
        assert!(PbptSceneLocation::new("../outside", "a.xml").resolve(&resources).is_err());
    }
}
