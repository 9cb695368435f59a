//! [`PbptScene`] → PBPT scene XML plus OBJ mesh files.

use std::path::Path;

use glam::{Mat4, Vec3};
use lumen_core::errors::{LumenError, Result, ResultExt};
use lumen_core::logging::targets;
use lumen_resources::obj_io;

use crate::model::{
    PbptCamera, PbptIntegrator, PbptMaterial, PbptScene, Reflectance, SCENE_FORMAT_VERSION, SensorRecord,
    ShapeInstanceRecord,
};
use crate::reader::validate_mesh_path;
use crate::xml::{XmlElement, to_document_string};

fn property(tag: &str, name: &str, value: impl ToString) -> XmlElement {
    XmlElement::new(tag).with_attr("name", name).with_attr("value", value.to_string())
}

/// Sixteen comma-separated values in row-major order.
#[must_use]
pub fn format_matrix_row_major(matrix: &Mat4) -> String {
    matrix
        .transpose()
        .to_cols_array()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_vec3(value: Vec3) -> String {
    format!("{} {} {}", value.x, value.y, value.z)
}

fn integrator_element(integrator: &PbptIntegrator) -> XmlElement {
    match integrator {
        PbptIntegrator::Path { max_depth } => XmlElement::new("integrator")
            .with_attr("type", "path")
            .with_child(property("integer", "maxDepth", max_depth)),
        PbptIntegrator::Raw(raw) => raw.clone(),
    }
}

fn sensor_element(sensor: &SensorRecord) -> Result<XmlElement> {
    if sensor.film_width <= 0 || sensor.film_height <= 0 {
        return Err(LumenError::invalid_argument("PBPT sensor film size must be positive."));
    }
    if sensor.sample_count <= 0 {
        return Err(LumenError::invalid_argument("PBPT sensor sample count must be positive."));
    }
    let transform = XmlElement::new("transform")
        .with_attr("name", "toWorld")
        .with_child(XmlElement::new("matrix").with_attr("value", format_matrix_row_major(&sensor.to_world)));
    let sampler = XmlElement::new("sampler")
        .with_attr("type", "ldsampler")
        .with_child(property("integer", "sampleCount", sensor.sample_count));
    let film = XmlElement::new("film")
        .with_attr("type", "hdrfilm")
        .with_child(property("integer", "width", sensor.film_width))
        .with_child(property("integer", "height", sensor.film_height))
        .with_child(XmlElement::new("rfilter").with_attr("type", "gaussian"));

    Ok(XmlElement::new("sensor")
        .with_attr("type", "perspective")
        .with_child(property("string", "fovAxis", &sensor.fov_axis))
        .with_child(property("float", "nearClip", sensor.near_clip))
        .with_child(property("float", "farClip", sensor.far_clip))
        .with_child(property("float", "focusDistance", sensor.focus_distance))
        .with_child(transform)
        .with_child(property("float", "fov", sensor.fov_degrees))
        .with_child(sampler)
        .with_child(film))
}

fn bsdf_element(id: &str, material: &PbptMaterial) -> Result<XmlElement> {
    let reflectance = match material {
        PbptMaterial::Raw(raw) => return Ok(raw.clone()),
        PbptMaterial::Lambertian { reflectance } => reflectance,
    };
    let value = match reflectance {
        Reflectance::Rgb(rgb) => property("rgb", "reflectance", format_vec3(*rgb)),
        Reflectance::Spectrum(spectrum) => property("spectrum", "reflectance", spectrum.serialize()?),
        Reflectance::Texture(texture) => texture.clone(),
    };
    Ok(XmlElement::new("bsdf")
        .with_attr("type", "diffuse")
        .with_attr("id", id)
        .with_child(value))
}

fn shape_element(scene: &PbptScene, shape: &ShapeInstanceRecord) -> Result<XmlElement> {
    if let Some(raw) = &shape.raw {
        return Ok(raw.clone());
    }
    let resources = &scene.resources;
    let mesh = resources.meshes.require(&shape.mesh_name, "mesh")?;
    resources.materials.require(&shape.material_ref_name, "material")?;

    let mut element = XmlElement::new("shape")
        .with_attr("type", "obj")
        .with_attr("id", &shape.shape_id)
        .with_child(property("string", "filename", &mesh.file_name))
        .with_child(
            XmlElement::new("transform")
                .with_attr("name", "toWorld")
                .with_child(XmlElement::new("matrix").with_attr("value", format_matrix_row_major(&shape.object_to_world))),
        )
        .with_child(XmlElement::new("ref").with_attr("id", &shape.material_ref_name));

    if let Some(spectrum_name) = &shape.emission_spectrum_name {
        let spectrum = resources.spectra.require(spectrum_name, "spectrum")?;
        element = element.with_child(
            XmlElement::new("emitter")
                .with_attr("type", "area")
                .with_child(property("spectrum", "radiance", spectrum.serialize()?)),
        );
    }
    Ok(element)
}

/// Builds the `<scene>` element tree.
pub fn scene_to_xml(scene: &PbptScene) -> Result<XmlElement> {
    let mut root = XmlElement::new("scene")
        .with_attr("version", SCENE_FORMAT_VERSION)
        .with_child(integrator_element(&scene.integrator));
    root.children.push(match &scene.camera {
        PbptCamera::ThinLensPerspective(sensor) => sensor_element(sensor)?,
        PbptCamera::Raw(raw) => raw.clone(),
    });
    for (id, material) in scene.resources.materials.iter() {
        root.children.push(bsdf_element(id, material)?);
    }
    for shape in &scene.resources.shape_instances {
        let element = shape_element(scene, shape).with_context(|| format!("shape '{}'", shape.shape_id))?;
        root.children.push(element);
    }
    Ok(root)
}

pub fn serialize_scene(scene: &PbptScene) -> Result<String> {
    to_document_string(&scene_to_xml(scene)?)
}

/// Writes `path` and every referenced mesh as `<scene dir>/<file_name>`.
pub fn write_scene_file(scene: &PbptScene, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(LumenError::invalid_argument("scene_xml_path must not be empty."));
    }
    let text = serialize_scene(scene)?;
    let scene_dir = path.parent().unwrap_or_else(|| Path::new("."));

    for (name, mesh) in scene.resources.meshes.iter() {
        let relative = validate_mesh_path(&mesh.file_name).with_context(|| format!("mesh '{name}'"))?;
        let mesh_path = scene_dir.join(relative);
        if let Some(dir) = mesh_path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| LumenError::io(dir, source))?;
        }
        obj_io::write_obj(&mesh.data, &mesh_path)?;
    }
    if !scene_dir.as_os_str().is_empty() {
        std::fs::create_dir_all(scene_dir).map_err(|source| LumenError::io(scene_dir, source))?;
    }
    std::fs::write(path, text).map_err(|source| LumenError::io(path, source))?;

    log::info!(
        target: targets::PBPT_EXPORT,
        "Wrote PBPT scene '{}' (meshes={}, shapes={})",
        path.display(),
        scene.resources.meshes.len(),
        scene.resources.shape_instances.len()
    );
    Ok(())
}
