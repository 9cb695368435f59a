//! PBPT records → scene objects.

use std::path::Path;

use glam::Vec3;
use lumen_core::errors::{LumenError, Result};
use lumen_core::ids::GameObjectId;
use lumen_core::logging::targets;
use lumen_resources::{MeshHandle, MeshKind, MeshOptions, ResourceManager};
use lumen_scene::controllers::{FreeLookCameraController, FreeLookConfig};
use lumen_scene::{MeshRenderer, PbptLight, PbptMesh, PointLight, Scene, SharedInput};
use rustc_hash::FxHashMap;

use super::{Mapper, MapperDomain};
use crate::compatible::{CompatibleInfo, MappedShapeInfo};
use crate::model::{
    IntegratorRecord, PbptCamera, PbptIntegrator, PbptMaterial, PbptMeshRecord, PbptScene, Reflectance,
    SensorRecord, ShapeInstanceRecord, make_unique_name,
};
use crate::spectrum::{spectrum_to_linear_rgb, spectrum_to_rgb};

const CAMERA_OBJECT_NAME: &str = "pbpt_camera";
const MIN_NEAR_CLIP: f32 = 1e-4;
const MIN_CLIP_RANGE: f32 = 1e-3;

#[derive(Clone)]
pub struct ImportOptions {
    /// Strict mode: anything outside the supported Cornell-box subset is an error.
    pub require_supported_cbox_subset: bool,
    /// Attaches a free-look controller to the imported camera when set.
    pub free_look_input: Option<SharedInput>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            require_supported_cbox_subset: true,
            free_look_input: None,
        }
    }
}

impl std::fmt::Debug for ImportOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportOptions")
            .field("require_supported_cbox_subset", &self.require_supported_cbox_subset)
            .field("free_look_input", &self.free_look_input.is_some())
            .finish()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ImportResult {
    pub imported_shape_count: usize,
    pub imported_light_shape_count: usize,
    pub imported_game_object_id_by_name: FxHashMap<String, GameObjectId>,
    pub integrator: Option<IntegratorRecord>,
    pub sensor: Option<SensorRecord>,
}

impl ImportResult {
    fn register(&mut self, name: &str, id: GameObjectId) -> Result<()> {
        if self.imported_game_object_id_by_name.contains_key(name) {
            return Err(LumenError::invariant(format!("Duplicate imported game object name: {name}")));
        }
        self.imported_game_object_id_by_name.insert(name.to_string(), id);
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ImportPackage {
    pub result: ImportResult,
    pub compatible_info: CompatibleInfo,
}

pub struct ImportContext<'a> {
    pub source: &'a PbptScene,
    pub scene: &'a mut Scene,
    pub resources: &'a mut ResourceManager,
    pub options: &'a ImportOptions,
}

impl ImportContext<'_> {
    /// Creates a game object named `base`, or `base_N` if the name is taken in
    /// the scene or in this import.
    fn create_game_object(&mut self, base: &str, package: &mut ImportPackage) -> Result<GameObjectId> {
        let name = make_unique_name(base, |candidate| {
            package.result.imported_game_object_id_by_name.contains_key(candidate)
                || self.scene.find_game_object_by_name(candidate).is_some()
        });
        let id = self.scene.create_game_object(&name);
        let actual = self.scene.game_object_name(id).unwrap_or(&name).to_string();
        package.result.register(&actual, id)?;
        Ok(id)
    }
}

pub struct ShapeImport;
pub struct CameraImport;
pub struct IntegratorImport;

impl MapperDomain for ShapeImport {
    const NAME: &'static str = "shape";
    type Item = ShapeInstanceRecord;
    type Context<'a> = ImportContext<'a>;
    type Package = ImportPackage;
}

impl MapperDomain for CameraImport {
    const NAME: &'static str = "camera";
    type Item = PbptCamera;
    type Context<'a> = ImportContext<'a>;
    type Package = ImportPackage;
}

impl MapperDomain for IntegratorImport {
    const NAME: &'static str = "integrator";
    type Item = PbptIntegrator;
    type Context<'a> = ImportContext<'a>;
    type Package = ImportPackage;
}

// ============================================================================
// Shapes
// ============================================================================

/// Triangle mesh with a diffuse RGB or spectral reflectance, optionally
/// emissive.
pub struct ObjLambertianShapeImportMapper;

impl ObjLambertianShapeImportMapper {
    fn base_color(reflectance: &Reflectance) -> Result<Vec3> {
        match reflectance {
            Reflectance::Rgb(rgb) => Ok(*rgb),
            Reflectance::Spectrum(spectrum) => spectrum_to_rgb(spectrum),
            Reflectance::Texture(_) => Err(LumenError::unsupported("Texture reflectance cannot be imported.")),
        }
    }

    /// Loads through the resource manager when the OBJ lives below its root so
    /// repeated imports share one handle.
    fn create_mesh(resources: &mut ResourceManager, record: &PbptMeshRecord) -> Result<MeshHandle> {
        let options = MeshOptions { generate_normals: true };
        if let Some(source) = &record.source_path
            && let Ok(relative) = source.strip_prefix(resources.root_dir())
            && relative != Path::new("")
        {
            let relative = relative.to_path_buf();
            return resources.create_from_relative_path::<MeshKind>(relative, options);
        }
        resources.create::<MeshKind>(record.data.clone(), options)
    }

    /// Preview light color and intensity for an emission spectrum.
    fn preview_light(ctx: &ImportContext<'_>, spectrum_name: &str) -> Result<(PbptLight, PointLight)> {
        let spectrum = ctx.source.resources.spectra.require(spectrum_name, "spectrum")?;
        let rgb = spectrum_to_linear_rgb(spectrum)?;
        let intensity = rgb.max_element();
        let mut point_light = PointLight::default();
        point_light.set_color(if intensity > 0.0 { rgb / intensity } else { Vec3::ONE });
        point_light.set_intensity(intensity)?;
        Ok((PbptLight::new(spectrum.clone())?, point_light))
    }
}

impl Mapper<ShapeImport> for ObjLambertianShapeImportMapper {
    fn name(&self) -> &'static str {
        "ObjLambertianShapeImportMapper"
    }

    fn matches(&self, shape: &ShapeInstanceRecord, ctx: &ImportContext<'_>, _: &ImportPackage) -> Result<bool> {
        if shape.shape_type != "obj" || shape.raw.is_some() {
            return Ok(false);
        }
        let resources = &ctx.source.resources;
        if !resources.meshes.contains(&shape.mesh_name) {
            return Ok(false);
        }
        let lambertian = matches!(
            resources.materials.get(&shape.material_ref_name),
            Some(PbptMaterial::Lambertian {
                reflectance: Reflectance::Rgb(_) | Reflectance::Spectrum(_)
            })
        );
        let emission_known = shape
            .emission_spectrum_name
            .as_deref()
            .is_none_or(|name| resources.spectra.contains(name));
        Ok(lambertian && emission_known)
    }

    fn map(&self, shape: &ShapeInstanceRecord, ctx: &mut ImportContext<'_>, package: &mut ImportPackage) -> Result<()> {
        let source = ctx.source;
        let mesh_record = source.resources.meshes.require(&shape.mesh_name, "mesh")?;
        let PbptMaterial::Lambertian { reflectance } =
            source.resources.materials.require(&shape.material_ref_name, "material")?
        else {
            return Err(LumenError::invariant(format!(
                "Material '{}' is not Lambertian.",
                shape.material_ref_name
            )));
        };
        let base_color = Self::base_color(reflectance)?;
        let lights = shape
            .emission_spectrum_name
            .as_deref()
            .map(|name| Self::preview_light(&*ctx, name))
            .transpose()?;

        let mesh = Self::create_mesh(ctx.resources, mesh_record)?;
        let base = if !shape.shape_id.is_empty() {
            shape.shape_id.as_str()
        } else if !shape.mesh_name.is_empty() {
            shape.mesh_name.as_str()
        } else {
            "shape"
        };
        let id = ctx.create_game_object(base, package)?;

        ctx.scene.add_component(id, MeshRenderer::new(mesh, base_color.extend(1.0))?)?;
        ctx.scene.add_component(id, PbptMesh)?;
        ctx.scene.graph_mut().set_local_model_matrix(id, &shape.object_to_world);

        if let Some((pbpt_light, point_light)) = lights {
            ctx.scene.add_component(id, pbpt_light)?;
            ctx.scene.add_component(id, point_light)?;
            package.result.imported_light_shape_count += 1;
        }

        package.compatible_info.mapped_shape_info_by_game_object.insert(
            id,
            MappedShapeInfo {
                source_shape_id: shape.shape_id.clone(),
                source_mesh_name: shape.mesh_name.clone(),
                source_material_ref_name: shape.material_ref_name.clone(),
            },
        );
        package.result.imported_shape_count += 1;
        log::debug!(
            target: targets::PBPT_IMPORT,
            "Imported shape '{}' as GameObject {id} (mesh={mesh})",
            shape.shape_id
        );
        Ok(())
    }
}

// ============================================================================
// Camera
// ============================================================================

pub struct ThinLensPerspectiveImportMapper;

impl Mapper<CameraImport> for ThinLensPerspectiveImportMapper {
    fn name(&self) -> &'static str {
        "ThinLensPerspectiveImportMapper"
    }

    fn matches(&self, camera: &PbptCamera, _: &ImportContext<'_>, _: &ImportPackage) -> Result<bool> {
        Ok(matches!(camera, PbptCamera::ThinLensPerspective(_)))
    }

    fn map(&self, camera: &PbptCamera, ctx: &mut ImportContext<'_>, package: &mut ImportPackage) -> Result<()> {
        let PbptCamera::ThinLensPerspective(sensor) = camera else {
            return Err(LumenError::invariant("camera is not a thin-lens perspective sensor."));
        };
        package.result.sensor = Some(sensor.clone());

        let id = ctx.create_game_object(CAMERA_OBJECT_NAME, package)?;
        let near = sensor.near_clip.max(MIN_NEAR_CLIP);
        let far = sensor.far_clip.max(near + MIN_CLIP_RANGE);
        let camera = ctx.scene.create_perspective_camera(id)?;
        camera.near = near;
        camera.far = far;
        if let Some(params) = camera.perspective_params_mut() {
            params.fov_degrees = sensor.fov_degrees;
        }
        #[allow(clippy::cast_precision_loss)]
        camera.set_aspect_ratio(sensor.film_width as f32 / sensor.film_height.max(1) as f32);

        ctx.scene.graph_mut().set_local_model_matrix(id, &sensor.to_world);
        ctx.scene.set_active_camera(id);

        if let Some(input) = &ctx.options.free_look_input {
            let controller = FreeLookCameraController::new(input.clone(), FreeLookConfig::default())?;
            ctx.scene.add_component(id, controller)?;
        }
        Ok(())
    }
}

// ============================================================================
// Integrator
// ============================================================================

pub struct PathIntegratorImportMapper;

impl Mapper<IntegratorImport> for PathIntegratorImportMapper {
    fn name(&self) -> &'static str {
        "PathIntegratorImportMapper"
    }

    fn matches(&self, integrator: &PbptIntegrator, _: &ImportContext<'_>, _: &ImportPackage) -> Result<bool> {
        Ok(matches!(integrator, PbptIntegrator::Path { .. }))
    }

    fn map(&self, integrator: &PbptIntegrator, _: &mut ImportContext<'_>, package: &mut ImportPackage) -> Result<()> {
        let PbptIntegrator::Path { max_depth } = integrator else {
            return Err(LumenError::invariant("integrator is not a path tracer."));
        };
        package.result.integrator = Some(IntegratorRecord {
            type_name: "path".to_string(),
            max_depth: *max_depth,
        });
        Ok(())
    }
}
