//! In-memory form of a PBPT scene.
//!
//! [`PbptScene`] is what the XML reader produces and the writer consumes.
//! The importer maps it onto a [`lumen_scene::Scene`]; the exporter builds one
//! from a scene plus whatever the importer could not map.

use std::path::PathBuf;

use glam::{Mat4, Vec3};
use lumen_core::errors::{LumenError, Result};
use lumen_resources::ObjMeshData;
use lumen_scene::PbptSpectrum;
use rustc_hash::FxHashMap;

use crate::xml::XmlElement;

pub const SCENE_FORMAT_VERSION: &str = "0.4.0";
pub const DEFAULT_SAMPLE_COUNT: i32 = 4;

// ============================================================================
// Named libraries
// ============================================================================

/// Insertion-ordered name → item map. Ids are insertion indices.
#[derive(Clone, Debug)]
pub struct NamedLibrary<T> {
    items: Vec<(String, T)>,
    index: FxHashMap<String, usize>,
}

impl<T> Default for NamedLibrary<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: FxHashMap::default(),
        }
    }
}

impl<T> NamedLibrary<T> {
    /// Adds `item` under `name` and returns its id. Names must be unique.
    pub fn add(&mut self, name: impl Into<String>, item: T) -> Result<usize> {
        let name = name.into();
        if name.is_empty() {
            return Err(LumenError::invalid_argument("Library item name must not be empty."));
        }
        if self.index.contains_key(&name) {
            return Err(LumenError::invariant(format!("Duplicate library item name: {name}")));
        }
        let id = self.items.len();
        self.index.insert(name.clone(), id);
        self.items.push((name, item));
        Ok(id)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&T> {
        self.id_of(name).map(|id| &self.items[id].1)
    }

    pub fn require(&self, name: &str, what: &str) -> Result<&T> {
        self.get(name)
            .ok_or_else(|| LumenError::not_found(format!("{what} '{name}' does not exist.")))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.items.iter().map(|(name, item)| (name.as_str(), item))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Keeps the items for which `keep` returns true, preserving order.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &T) -> bool) {
        self.items.retain(|(name, item)| keep(name, item));
        self.index = self
            .items
            .iter()
            .enumerate()
            .map(|(id, (name, _))| (name.clone(), id))
            .collect();
    }
}

/// `base` if `taken` rejects it, else the first free `base_N`.
pub fn make_unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    (1u64..)
        .map(|suffix| format!("{base}_{suffix}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

// ============================================================================
// Resources
// ============================================================================

/// Diffuse reflectance source.
#[derive(Clone, Debug, PartialEq)]
pub enum Reflectance {
    Rgb(Vec3),
    Spectrum(PbptSpectrum),
    /// A texture reference the bridge cannot express; kept verbatim.
    Texture(XmlElement),
}

#[derive(Clone, Debug, PartialEq)]
pub enum PbptMaterial {
    Lambertian { reflectance: Reflectance },
    /// Any other `<bsdf>`; kept verbatim.
    Raw(XmlElement),
}

impl PbptMaterial {
    #[must_use]
    pub fn is_lambertian(&self) -> bool {
        matches!(self, Self::Lambertian { .. })
    }
}

/// Triangle mesh in object space.
#[derive(Clone, Debug, PartialEq)]
pub struct PbptMeshRecord {
    pub data: ObjMeshData,
    /// Path of the OBJ file relative to the scene file, always below `meshes/`.
    pub file_name: String,
    /// Absolute path the mesh was read from.
    pub source_path: Option<PathBuf>,
}

/// One placed shape.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeInstanceRecord {
    pub shape_id: String,
    pub shape_type: String,
    pub mesh_name: String,
    pub material_ref_name: String,
    pub object_to_world: Mat4,
    pub emission_spectrum_name: Option<String>,
    /// Original element of shapes that are not triangle meshes.
    pub raw: Option<XmlElement>,
}

/// Area light bound to one triangle of an emissive shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AreaLightRecord {
    pub shape_id: String,
    pub mesh_name: String,
    pub triangle_index: usize,
    pub spectrum_name: String,
}

#[derive(Clone, Debug, Default)]
pub struct PbptResources {
    pub meshes: NamedLibrary<PbptMeshRecord>,
    pub materials: NamedLibrary<PbptMaterial>,
    pub spectra: NamedLibrary<PbptSpectrum>,
    pub lights: NamedLibrary<AreaLightRecord>,
    pub shape_instances: Vec<ShapeInstanceRecord>,
}

impl PbptResources {
    #[must_use]
    pub fn has_shape(&self, shape_id: &str) -> bool {
        self.shape_instances.iter().any(|shape| shape.shape_id == shape_id)
    }

    /// Adds one area light per triangle of `mesh_name`, named `<shape_id>_light_<i>`.
    pub fn add_area_lights(&mut self, shape_id: &str, mesh_name: &str, spectrum_name: &str) -> Result<usize> {
        let triangle_count = self.meshes.require(mesh_name, "mesh")?.data.triangle_count();
        for triangle_index in 0..triangle_count {
            let name = make_unique_name(&format!("{shape_id}_light_{triangle_index}"), |candidate| {
                self.lights.contains(candidate)
            });
            self.lights.add(
                name,
                AreaLightRecord {
                    shape_id: shape_id.to_string(),
                    mesh_name: mesh_name.to_string(),
                    triangle_index,
                    spectrum_name: spectrum_name.to_string(),
                },
            )?;
        }
        Ok(triangle_count)
    }
}

// ============================================================================
// Integrator & sensor
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntegratorRecord {
    pub type_name: String,
    /// `-1` means unbounded.
    pub max_depth: i32,
}

impl Default for IntegratorRecord {
    fn default() -> Self {
        Self {
            type_name: "path".to_string(),
            max_depth: -1,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PbptIntegrator {
    Path { max_depth: i32 },
    Raw(XmlElement),
}

impl Default for PbptIntegrator {
    fn default() -> Self {
        Self::Path { max_depth: -1 }
    }
}

/// Perspective sensor with film and sampler settings.
#[derive(Clone, Debug, PartialEq)]
pub struct SensorRecord {
    pub to_world: Mat4,
    pub fov_degrees: f32,
    pub near_clip: f32,
    pub far_clip: f32,
    pub focus_distance: f32,
    pub film_width: i32,
    pub film_height: i32,
    pub sample_count: i32,
    pub fov_axis: String,
}

impl Default for SensorRecord {
    fn default() -> Self {
        Self {
            to_world: Mat4::IDENTITY,
            fov_degrees: 45.0,
            near_clip: 0.1,
            far_clip: 1000.0,
            focus_distance: 1000.0,
            film_width: 512,
            film_height: 512,
            sample_count: DEFAULT_SAMPLE_COUNT,
            fov_axis: "smaller".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PbptCamera {
    ThinLensPerspective(SensorRecord),
    Raw(XmlElement),
}

// ============================================================================
// Scene
// ============================================================================

#[derive(Clone, Debug)]
pub struct PbptScene {
    pub version: String,
    pub integrator: PbptIntegrator,
    pub camera: PbptCamera,
    pub resources: PbptResources,
}

impl PbptScene {
    /// Samples per pixel of the perspective sensor, [`DEFAULT_SAMPLE_COUNT`] otherwise.
    #[must_use]
    pub fn spp(&self) -> i32 {
        match &self.camera {
            PbptCamera::ThinLensPerspective(sensor) => sensor.sample_count,
            PbptCamera::Raw(_) => DEFAULT_SAMPLE_COUNT,
        }
    }

    #[must_use]
    pub fn sensor(&self) -> Option<&SensorRecord> {
        match &self.camera {
            PbptCamera::ThinLensPerspective(sensor) => Some(sensor),
            PbptCamera::Raw(_) => None,
        }
    }

    /// True if at least one shape carries an area emitter.
    #[must_use]
    pub fn has_area_emitter(&self) -> bool {
        self.resources
            .shape_instances
            .iter()
            .any(|shape| shape.emission_spectrum_name.is_some())
    }
}
