//! Scene objects → PBPT records.

use lumen_core::errors::{LumenError, Result};
use lumen_core::ids::GameObjectId;
use lumen_resources::{MeshHandle, MeshKind, ResourceManager};
use lumen_scene::{MeshRenderer, PbptLight, PbptMesh, Scene};
use rustc_hash::FxHashMap;

use super::{Mapper, MapperDomain};
use crate::compatible::CompatibleInfo;
use crate::model::{PbptMaterial, PbptMeshRecord, PbptScene, Reflectance, ShapeInstanceRecord, make_unique_name};
use crate::reader::MESH_DIRECTORY;
use crate::spectrum::{rgb_key, validate_rgb};

pub struct ExportContext<'a> {
    pub scene: &'a Scene,
    pub resources: &'a ResourceManager,
    pub compatible_info: &'a CompatibleInfo,
    pub material_name_by_reflectance: FxHashMap<String, String>,
    pub mesh_name_by_handle: FxHashMap<MeshHandle, String>,
}

impl<'a> ExportContext<'a> {
    #[must_use]
    pub fn new(scene: &'a Scene, resources: &'a ResourceManager, compatible_info: &'a CompatibleInfo) -> Self {
        Self {
            scene,
            resources,
            compatible_info,
            material_name_by_reflectance: FxHashMap::default(),
            mesh_name_by_handle: FxHashMap::default(),
        }
    }
}

pub struct ShapeExport;

impl MapperDomain for ShapeExport {
    const NAME: &'static str = "shape";
    type Item = GameObjectId;
    type Context<'a> = ExportContext<'a>;
    type Package = PbptScene;
}

/// `MeshRenderer` + `PbptMesh` (+ `PbptLight`) → mesh, diffuse material and
/// shape instance. Meshes are shared per handle, materials per RGB value.
pub struct MeshRendererPbptMeshExportMapper;

impl MeshRendererPbptMeshExportMapper {
    fn export_mesh(handle: MeshHandle, ctx: &mut ExportContext<'_>, package: &mut PbptScene) -> Result<String> {
        if let Some(name) = ctx.mesh_name_by_handle.get(&handle) {
            return Ok(name.clone());
        }
        let data = ctx.resources.cpu::<MeshKind>(handle)?.clone();
        let meshes = &mut package.resources.meshes;
        let name = make_unique_name(&format!("rtr_mesh_{}", handle.value()), |candidate| meshes.contains(candidate));
        let file_name = make_unique_name(&format!("{MESH_DIRECTORY}/mesh_{}", handle.value()), |candidate| {
            meshes.iter().any(|(_, mesh)| mesh.file_name == format!("{candidate}.obj"))
        }) + ".obj";
        meshes.add(
            name.clone(),
            PbptMeshRecord {
                data,
                file_name,
                source_path: None,
            },
        )?;
        ctx.mesh_name_by_handle.insert(handle, name.clone());
        Ok(name)
    }

    fn export_material(renderer: &MeshRenderer, ctx: &mut ExportContext<'_>, package: &mut PbptScene) -> Result<String> {
        let rgb = renderer.base_color().truncate();
        validate_rgb(rgb, "MeshRenderer.base_color")?;
        let key = rgb_key(rgb);
        if let Some(name) = ctx.material_name_by_reflectance.get(&key) {
            return Ok(name.clone());
        }
        let materials = &mut package.resources.materials;
        let name = make_unique_name(&format!("rtr_mat_{}", ctx.material_name_by_reflectance.len()), |candidate| {
            materials.contains(candidate)
        });
        materials.add(
            name.clone(),
            PbptMaterial::Lambertian {
                reflectance: Reflectance::Rgb(rgb),
            },
        )?;
        ctx.material_name_by_reflectance.insert(key, name.clone());
        Ok(name)
    }
}

impl Mapper<ShapeExport> for MeshRendererPbptMeshExportMapper {
    fn name(&self) -> &'static str {
        "MeshRendererPbptMeshExportMapper"
    }

    fn matches(&self, id: &GameObjectId, ctx: &ExportContext<'_>, _: &PbptScene) -> Result<bool> {
        Ok(ctx.scene.game_object(*id).is_some_and(|object| {
            object.is_component_enabled::<MeshRenderer>() == Some(true)
                && object.is_component_enabled::<PbptMesh>() == Some(true)
        }))
    }

    fn map(&self, id: &GameObjectId, ctx: &mut ExportContext<'_>, package: &mut PbptScene) -> Result<()> {
        let id = *id;
        let scene = ctx.scene;
        let object = scene
            .game_object(id)
            .ok_or_else(|| LumenError::not_found(format!("GameObject {id} does not exist.")))?;
        let renderer = object.component_or_err::<MeshRenderer>()?;
        let mesh = renderer.mesh();
        if !mesh.is_valid() || !ctx.resources.alive(mesh) {
            return Err(LumenError::invariant("Pbpt export requires valid and alive mesh handle."));
        }
        let object_to_world = scene
            .graph()
            .world_matrix(id)
            .ok_or_else(|| LumenError::not_found(format!("GameObject {id} has no scene-graph node.")))?;

        let mesh_name = Self::export_mesh(mesh, ctx, package)?;
        let material_name = Self::export_material(renderer, ctx, package)?;

        let base = match scene.game_object_name(id) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("go_{id}"),
        };
        let shape_id = make_unique_name(&base, |candidate| package.resources.has_shape(candidate));

        let light = object
            .get_component::<PbptLight>()
            .filter(|_| object.is_component_enabled::<PbptLight>() == Some(true));
        let emission_spectrum_name = match light {
            Some(light) => {
                let spectra = &mut package.resources.spectra;
                let name = make_unique_name(&format!("{shape_id}_emission"), |candidate| spectra.contains(candidate));
                spectra.add(name.clone(), light.radiance_spectrum().clone())?;
                Some(name)
            }
            None => None,
        };
        if let Some(spectrum_name) = &emission_spectrum_name {
            package.resources.add_area_lights(&shape_id, &mesh_name, spectrum_name)?;
        }

        package.resources.shape_instances.push(ShapeInstanceRecord {
            shape_id,
            shape_type: "obj".to_string(),
            mesh_name,
            material_ref_name: material_name,
            object_to_world,
            emission_spectrum_name,
            raw: None,
        });
        Ok(())
    }
}
