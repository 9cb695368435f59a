//! PBPT scene XML → [`PbptScene`].
//!
//! In strict mode every element outside the supported Cornell-box subset is
//! an error. Otherwise unknown integrators, sensors, bsdfs and shapes are kept
//! verbatim so that they survive an import/export cycle.

use std::path::{Component, Path, PathBuf};

use glam::{Mat4, Vec3};
use lumen_core::errors::{LumenError, Result, ResultExt};
use lumen_core::logging::targets;
use lumen_core::paths::lexically_normal;
use lumen_resources::obj_io;
use lumen_scene::PbptSpectrum;

use crate::model::{
    PbptCamera, PbptIntegrator, PbptMaterial, PbptMeshRecord, PbptResources, PbptScene, Reflectance, SensorRecord,
    ShapeInstanceRecord, make_unique_name,
};
use crate::spectrum::{parse_float_list, parse_rgb, parse_spectrum, parse_vec3};
use crate::xml::{XmlElement, parse_document};

pub const MESH_DIRECTORY: &str = "meshes";
const DEFAULT_REFLECTANCE: Vec3 = Vec3::splat(0.7);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadOptions {
    pub strict: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { strict: true }
    }
}

// ============================================================================
// Property helpers
// ============================================================================

fn float_property(node: &XmlElement, name: &str, field: &str) -> Result<Option<f32>> {
    let Some(value) = node.named_child("float", name).and_then(|child| child.attr("value")) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| LumenError::invalid_argument(format!("{field} is not a number: '{value}'.")))
}

fn integer_property(node: &XmlElement, name: &str, field: &str) -> Result<Option<i32>> {
    let Some(value) = node.named_child("integer", name).and_then(|child| child.attr("value")) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| LumenError::invalid_argument(format!("{field} is not an integer: '{value}'.")))
}

fn string_property<'a>(node: &'a XmlElement, name: &str) -> Option<&'a str> {
    node.named_child("string", name).and_then(|child| child.non_empty_attr("value"))
}

/// Parses 16 row-major values.
pub fn parse_matrix_row_major(text: &str, field: &str) -> Result<Mat4> {
    let values = parse_float_list(text, field)?;
    let values: [f32; 16] = values
        .try_into()
        .map_err(|_| LumenError::invalid_argument(format!("{field} must contain exactly 16 float values.")))?;
    Ok(Mat4::from_cols_array(&values).transpose())
}

// ============================================================================
// Transforms
// ============================================================================

fn parse_shape_transform(node: &XmlElement, strict: bool) -> Result<Mat4> {
    let mut transform = Mat4::IDENTITY;
    for child in &node.children {
        match child.name.as_str() {
            "matrix" => {
                let value = child
                    .non_empty_attr("value")
                    .ok_or_else(|| LumenError::invalid_argument("shape transform matrix is missing value."))?;
                transform *= parse_matrix_row_major(value, "shape.transform.matrix")?;
            }
            "translate" => {
                let axis = |key: &str| -> Result<f32> {
                    child.attr(key).map_or(Ok(0.0), |value| {
                        value.trim().parse().map_err(|_| {
                            LumenError::invalid_argument(format!("shape.transform.translate.{key} is not a number."))
                        })
                    })
                };
                transform *= Mat4::from_translation(Vec3::new(axis("x")?, axis("y")?, axis("z")?));
            }
            other if strict => {
                return Err(LumenError::unsupported(format!("Unsupported shape transform element: {other}")));
            }
            other => log::warn!(target: targets::PBPT_IMPORT, "Ignoring shape transform element <{other}>."),
        }
    }
    Ok(transform)
}

/// Camera basis for a camera looking from `origin` at `target`. The camera
/// looks down its local -Z axis with +Y up.
fn look_at_to_world(node: &XmlElement) -> Result<Mat4> {
    let (Some(origin), Some(target), Some(up)) = (
        node.non_empty_attr("origin"),
        node.non_empty_attr("target"),
        node.non_empty_attr("up"),
    ) else {
        return Err(LumenError::invalid_argument("Sensor lookAt must provide origin/target/up."));
    };
    let origin = parse_vec3(origin, "sensor.lookAt.origin")?;
    let target = parse_vec3(target, "sensor.lookAt.target")?;
    let up = parse_vec3(up, "sensor.lookAt.up")?;

    let forward = (target - origin).normalize_or_zero();
    if forward == Vec3::ZERO {
        return Err(LumenError::invalid_argument("sensor.lookAt origin and target must be different."));
    }
    let up = up.normalize_or_zero();
    if up == Vec3::ZERO {
        return Err(LumenError::invalid_argument("sensor.lookAt up vector must be non-zero."));
    }
    let right = forward.cross(up).normalize_or_zero();
    if right == Vec3::ZERO {
        return Err(LumenError::invalid_argument(
            "sensor.lookAt up vector must not be parallel to view direction.",
        ));
    }
    let up = right.cross(forward).normalize();
    Ok(Mat4::from_cols(
        right.extend(0.0),
        up.extend(0.0),
        (-forward).extend(0.0),
        origin.extend(1.0),
    ))
}

fn parse_sensor_to_world(node: &XmlElement, strict: bool) -> Result<Mat4> {
    let mut to_world = Mat4::IDENTITY;
    let (mut has_look_at, mut has_matrix) = (false, false);
    for child in &node.children {
        match child.name.as_str() {
            "lookAt" | "matrix" if has_look_at || has_matrix => {
                return Err(LumenError::invalid_argument(
                    "Sensor transform cannot contain both lookAt and matrix.",
                ));
            }
            "lookAt" => {
                to_world = look_at_to_world(child)?;
                has_look_at = true;
            }
            "matrix" => {
                let value = child
                    .non_empty_attr("value")
                    .ok_or_else(|| LumenError::invalid_argument("sensor transform matrix is missing value."))?;
                to_world = parse_matrix_row_major(value, "sensor.transform.matrix")?;
                has_matrix = true;
            }
            other if strict => {
                return Err(LumenError::unsupported(format!("Unsupported sensor transform element: {other}")));
            }
            other => log::warn!(target: targets::PBPT_IMPORT, "Ignoring sensor transform element <{other}>."),
        }
    }
    Ok(to_world)
}

// ============================================================================
// Elements
// ============================================================================

fn parse_integrator(node: &XmlElement, strict: bool) -> Result<PbptIntegrator> {
    let type_name = node
        .non_empty_attr("type")
        .ok_or_else(|| LumenError::invalid_argument("integrator type is required."))?;
    if type_name != "path" {
        if strict {
            return Err(LumenError::unsupported(format!("Unsupported integrator type: {type_name}")));
        }
        return Ok(PbptIntegrator::Raw(node.clone()));
    }
    let max_depth = integer_property(node, "maxDepth", "integrator.maxDepth")?.unwrap_or(-1);
    Ok(PbptIntegrator::Path { max_depth })
}

fn parse_sensor(node: &XmlElement, strict: bool) -> Result<PbptCamera> {
    let type_name = node.attr("type").unwrap_or_default();
    if type_name != "perspective" {
        if strict {
            return Err(LumenError::unsupported(format!("Unsupported sensor type: {type_name}")));
        }
        return Ok(PbptCamera::Raw(node.clone()));
    }

    let mut sensor = SensorRecord::default();
    if let Some(fov_axis) = string_property(node, "fovAxis") {
        sensor.fov_axis = fov_axis.to_string();
    }
    if let Some(near_clip) = float_property(node, "nearClip", "sensor.nearClip")? {
        sensor.near_clip = near_clip;
    }
    if let Some(far_clip) = float_property(node, "farClip", "sensor.farClip")? {
        sensor.far_clip = far_clip;
    }
    if let Some(focus_distance) = float_property(node, "focusDistance", "sensor.focusDistance")? {
        sensor.focus_distance = focus_distance;
    }
    if let Some(fov) = float_property(node, "fov", "sensor.fov")? {
        sensor.fov_degrees = fov;
    }
    if let Some(sampler) = node.child("sampler")
        && let Some(sample_count) = integer_property(sampler, "sampleCount", "sampler.sampleCount")?
    {
        sensor.sample_count = sample_count;
    }
    if let Some(film) = node.child("film") {
        if let Some(width) = integer_property(film, "width", "film.width")? {
            sensor.film_width = width;
        }
        if let Some(height) = integer_property(film, "height", "film.height")? {
            sensor.film_height = height;
        }
    }
    if sensor.film_width <= 0 || sensor.film_height <= 0 {
        return Err(LumenError::invalid_argument("sensor film size must be positive."));
    }
    if let Some(transform) = node.child("transform") {
        sensor.to_world = parse_sensor_to_world(transform, strict)?;
    }
    Ok(PbptCamera::ThinLensPerspective(sensor))
}

fn parse_reflectance(bsdf: &XmlElement) -> Result<Reflectance> {
    for child in &bsdf.children {
        if child.attr("name") != Some("reflectance") {
            continue;
        }
        match child.name.as_str() {
            "texture" => return Ok(Reflectance::Texture(child.clone())),
            "spectrum" | "rgb" => {
                let Some(value) = child.non_empty_attr("value") else {
                    continue;
                };
                return if child.name == "spectrum" {
                    parse_spectrum(value, "bsdf.reflectance").map(Reflectance::Spectrum)
                } else {
                    parse_rgb(value, "bsdf.reflectance").map(Reflectance::Rgb)
                };
            }
            _ => {}
        }
    }
    Ok(Reflectance::Rgb(DEFAULT_REFLECTANCE))
}

fn parse_bsdf(node: &XmlElement, strict: bool) -> Result<(String, PbptMaterial)> {
    let id = node
        .non_empty_attr("id")
        .ok_or_else(|| LumenError::invalid_argument("bsdf id is required."))?;
    let type_name = node.attr("type").unwrap_or_default();
    if type_name != "diffuse" {
        if strict {
            return Err(LumenError::unsupported(format!("Unsupported bsdf type: {type_name}")));
        }
        return Ok((id.to_string(), PbptMaterial::Raw(node.clone())));
    }
    let reflectance =
        parse_reflectance(node).with_context(|| format!("bsdf '{id}' has an invalid reflectance"))?;
    if strict && matches!(reflectance, Reflectance::Texture(_)) {
        return Err(LumenError::unsupported(format!("bsdf '{id}' uses a texture reflectance.")));
    }
    Ok((id.to_string(), PbptMaterial::Lambertian { reflectance }))
}

/// Checks that an OBJ filename is relative, stays below `meshes/` and does
/// not walk up with `..`. Returns the normalized path.
pub fn validate_mesh_path(filename: &str) -> Result<PathBuf> {
    if filename.is_empty() {
        return Err(LumenError::invalid_argument("obj filename must not be empty."));
    }
    let path = Path::new(filename);
    if path.is_absolute() || path.has_root() {
        return Err(LumenError::invalid_argument("obj filename must be a relative path under meshes/."));
    }
    if path.components().any(|part| part == Component::ParentDir) {
        return Err(LumenError::invalid_argument("obj filename must not use parent directory traversal."));
    }
    let normalized = lexically_normal(path);
    let mut parts = normalized.components();
    if parts.next() != Some(Component::Normal(MESH_DIRECTORY.as_ref())) || parts.next().is_none() {
        return Err(LumenError::invalid_argument("obj filename must resolve under meshes/ directory."));
    }
    Ok(normalized)
}

fn default_shape_id(node: &XmlElement, mesh_path: Option<&Path>, index: usize) -> String {
    if let Some(id) = node.non_empty_attr("id") {
        return id.to_string();
    }
    mesh_path
        .and_then(Path::file_stem)
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| format!("shape_{index}"))
}

struct ShapeReader<'a> {
    scene_dir: &'a Path,
    strict: bool,
    resources: &'a mut PbptResources,
}

impl ShapeReader<'_> {
    fn read(&mut self, node: &XmlElement, index: usize) -> Result<()> {
        let type_name = node.attr("type").unwrap_or_default();
        if type_name != "obj" {
            return self.read_raw(node, type_name, index);
        }

        let filename = string_property(node, "filename")
            .ok_or_else(|| LumenError::invalid_argument("obj shape is missing filename property."))?;
        let mesh_path = validate_mesh_path(filename)?;
        let shape_id = self.unique_shape_id(default_shape_id(node, Some(&mesh_path), index));

        let material_ref_name = node
            .child("ref")
            .and_then(|reference| reference.non_empty_attr("id"))
            .ok_or_else(|| LumenError::invalid_argument("shape is missing material ref id."))?;
        if !self.resources.materials.contains(material_ref_name) {
            return Err(LumenError::not_found(format!("shape ref id is unknown: {material_ref_name}")));
        }

        let object_to_world = match node.child("transform") {
            Some(transform) => parse_shape_transform(transform, self.strict)?,
            None => Mat4::IDENTITY,
        };
        let mesh_name = self.load_mesh(&mesh_path)?;

        let emission_spectrum_name = match node.child("emitter") {
            Some(emitter) => self.read_emitter(emitter, &shape_id)?,
            None => None,
        };
        if let Some(spectrum_name) = &emission_spectrum_name {
            self.resources.add_area_lights(&shape_id, &mesh_name, spectrum_name)?;
        }

        self.resources.shape_instances.push(ShapeInstanceRecord {
            shape_id,
            shape_type: type_name.to_string(),
            mesh_name,
            material_ref_name: material_ref_name.to_string(),
            object_to_world,
            emission_spectrum_name,
            raw: None,
        });
        Ok(())
    }

    fn read_raw(&mut self, node: &XmlElement, type_name: &str, index: usize) -> Result<()> {
        if self.strict {
            return Err(LumenError::unsupported(format!("Unsupported shape type: {type_name}")));
        }
        let shape_id = self.unique_shape_id(default_shape_id(node, None, index));
        let material_ref_name = node
            .child("ref")
            .and_then(|reference| reference.attr("id"))
            .unwrap_or_default()
            .to_string();
        self.resources.shape_instances.push(ShapeInstanceRecord {
            shape_id,
            shape_type: type_name.to_string(),
            mesh_name: String::new(),
            material_ref_name,
            object_to_world: Mat4::IDENTITY,
            emission_spectrum_name: None,
            raw: Some(node.clone()),
        });
        Ok(())
    }

    fn unique_shape_id(&self, base: String) -> String {
        make_unique_name(&base, |candidate| self.resources.has_shape(candidate))
    }

    /// Loads `meshes/...` once per distinct path and returns its library name.
    fn load_mesh(&mut self, mesh_path: &Path) -> Result<String> {
        let mesh_name = mesh_path.to_string_lossy().replace('\\', "/");
        if self.resources.meshes.contains(&mesh_name) {
            return Ok(mesh_name);
        }
        let abs_path = lexically_normal(&self.scene_dir.join(mesh_path));
        let data = obj_io::load_obj(&abs_path)?;
        self.resources.meshes.add(
            mesh_name.clone(),
            PbptMeshRecord {
                data,
                file_name: mesh_name.clone(),
                source_path: Some(abs_path),
            },
        )?;
        Ok(mesh_name)
    }

    fn read_emitter(&mut self, emitter: &XmlElement, shape_id: &str) -> Result<Option<String>> {
        let type_name = emitter.attr("type").unwrap_or_default();
        if type_name != "area" {
            if self.strict {
                return Err(LumenError::unsupported(format!("Unsupported emitter type: {type_name}")));
            }
            log::warn!(target: targets::PBPT_IMPORT, "Ignoring emitter type '{type_name}' on shape '{shape_id}'.");
            return Ok(None);
        }
        let radiance = emitter
            .named_child("spectrum", "radiance")
            .ok_or_else(|| LumenError::invalid_argument("area emitter is missing radiance spectrum."))?;
        let value = radiance
            .non_empty_attr("value")
            .ok_or_else(|| LumenError::invalid_argument("area emitter radiance spectrum is empty."))?;
        let spectrum: PbptSpectrum = parse_spectrum(value, "shape.emitter.radiance")?;
        let name = make_unique_name(&format!("{shape_id}_emission"), |candidate| {
            self.resources.spectra.contains(candidate)
        });
        self.resources.spectra.add(name.clone(), spectrum)?;
        Ok(Some(name))
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Parses scene XML text. Mesh filenames resolve against `scene_dir`.
pub fn parse_scene_str(text: &str, origin: &str, scene_dir: &Path, options: ReadOptions) -> Result<PbptScene> {
    let root = parse_document(text, origin)?;
    if root.name != "scene" {
        return Err(LumenError::parse(origin, "XML root node <scene> is missing."));
    }
    let strict = options.strict;

    let integrator = match root.child("integrator") {
        Some(node) => parse_integrator(node, strict)?,
        None => return Err(LumenError::parse(origin, "scene is missing <integrator>.")),
    };
    let camera = match root.child("sensor") {
        Some(node) => parse_sensor(node, strict)?,
        None => return Err(LumenError::parse(origin, "scene is missing <sensor>.")),
    };

    let mut resources = PbptResources::default();
    for node in root.children_named("bsdf") {
        let (id, material) = parse_bsdf(node, strict)?;
        resources.materials.add(id, material)?;
    }

    let mut reader = ShapeReader {
        scene_dir,
        strict,
        resources: &mut resources,
    };
    for (index, node) in root.children_named("shape").enumerate() {
        reader.read(node, index)?;
    }

    for child in &root.children {
        if !matches!(child.name.as_str(), "integrator" | "sensor" | "bsdf" | "shape") {
            if strict {
                return Err(LumenError::unsupported(format!("Unsupported scene element: <{}>", child.name)));
            }
            log::warn!(target: targets::PBPT_IMPORT, "Ignoring scene element <{}>.", child.name);
        }
    }

    log::debug!(
        target: targets::PBPT_IMPORT,
        "Parsed PBPT scene '{origin}' (materials={}, meshes={}, shapes={})",
        resources.materials.len(),
        resources.meshes.len(),
        resources.shape_instances.len()
    );
    Ok(PbptScene {
        version: root.attr("version").unwrap_or_default().to_string(),
        integrator,
        camera,
        resources,
    })
}

/// Reads a scene file and the OBJ meshes it references.
pub fn read_scene_file(path: &Path, options: ReadOptions) -> Result<PbptScene> {
    if path.as_os_str().is_empty() {
        return Err(LumenError::invalid_argument("scene_xml_path must not be empty."));
    }
    let text = std::fs::read_to_string(path).map_err(|source| LumenError::io(path, source))?;
    let scene_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse_scene_str(&text, &path.display().to_string(), scene_dir, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#"<scene version="0.4.0">
  <integrator type="path"><integer name="maxDepth" value="5"/></integrator>
  <sensor type="perspective">
    <transform name="toWorld"><lookAt origin="0, 0, 0" target="0, 0, 1" up="0, 1, 0"/></transform>
    <film type="hdrfilm"><integer name="width" value="64"/><integer name="height" value="32"/></film>
  </sensor>"#;

    fn parse(body: &str, strict: bool) -> Result<PbptScene> {
        let text = format!("{HEADER}{body}</scene>");
        parse_scene_str(&text, "test", Path::new("/nonexistent"), ReadOptions { strict })
    }

    #[test]
    fn row_major_matrix_places_translation_in_last_column() {
        let m = parse_matrix_row_major("1,0,0,1, 0,1,0,2, 0,0,1,3, 0,0,0,1", "m").unwrap();
        assert_eq!(m.w_axis.truncate(), Vec3::new(1.0, 2.0, 3.0));
        assert!(parse_matrix_row_major("1,0,0", "m").is_err());
    }

    #[test]
    fn look_at_points_local_minus_z_at_target() {
        let scene = parse("", true).unwrap();
        let sensor = scene.sensor().unwrap();
        let forward = sensor.to_world.transform_vector3(Vec3::NEG_Z);
        assert!((forward - Vec3::Z).length() < 1e-5);
        assert_eq!((sensor.film_width, sensor.film_height), (64, 32));
        assert_eq!(scene.integrator, PbptIntegrator::Path { max_depth: 5 });
    }

    #[test]
    fn mesh_paths_must_stay_in_meshes_dir() {
        assert_eq!(validate_mesh_path("meshes/./a.obj").unwrap(), PathBuf::from("meshes/a.obj"));
        assert!(validate_mesh_path("").is_err());
        assert!(validate_mesh_path("/meshes/a.obj").is_err());
        assert!(validate_mesh_path("meshes/../a.obj").is_err());
        assert!(validate_mesh_path("models/a.obj").is_err());
        assert!(validate_mesh_path("meshes").is_err());
    }

    #[test]
    fn strict_mode_rejects_unknown_bsdf() {
        let body = r#"<bsdf type="conductor" id="metal"/>"#;
        assert!(parse(body, true).is_err());
        let scene = parse(body, false).unwrap();
        assert!(matches!(scene.resources.materials.get("metal"), Some(PbptMaterial::Raw(_))));
    }

    #[test]
    fn permissive_mode_keeps_unknown_shapes_verbatim() {
        let body = r#"<bsdf type="diffuse" id="white"/><shape type="sphere" id="ball"><ref id="white"/></shape>"#;
        let scene = parse(body, false).unwrap();
        let shape = &scene.resources.shape_instances[0];
        assert_eq!(shape.shape_id, "ball");
        assert_eq!(shape.material_ref_name, "white");
        assert!(shape.raw.is_some());
        assert!(matches!(
            scene.resources.materials.get("white"),
            Some(PbptMaterial::Lambertian { reflectance: Reflectance::Rgb(rgb) }) if *rgb == Vec3::splat(0.7)
        ));
    }

    #[test]
    fn missing_sensor_is_an_error() {
        let text = r#"<scene><integrator type="path"/></scene>"#;
        assert!(parse_scene_str(text, "t", Path::new("."), ReadOptions::default()).is_err());
    }
}
