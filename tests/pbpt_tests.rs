//! PBPT Bridge Integration Tests
//!
//! Tests for:
//! - Importing the supported Cornell-box subset into a Scene
//! - Strict versus permissive handling of unsupported elements
//! - Exporting a Scene back to PBPT XML with passthrough data
//! - Export preconditions and mesh/material sharing

use std::path::Path;

use anyhow::Result;
use approx::assert_abs_diff_eq;
use glam::{Mat4, Vec3, Vec4};
use lumen::core::ids::SceneId;
use lumen::pbpt::{
    ImportOptions, ImportPackage, PbptIntegrator, PbptSceneLocation, ReadOptions, build_scene_result,
    export_scene_file, import_scene_from_resources, load_scene_file, read_scene_file,
};
use lumen::resources::{MeshKind, MeshOptions, MeshVertex, ObjMeshData, ResourceManager};
use lumen::scene::controllers::FreeLookCameraController;
use lumen::scene::{InputState, MeshRenderer, PbptLight, PbptMesh, PbptSpectrum, PointLight, Scene};
use tempfile::TempDir;

const QUAD_OBJ: &str = "\
v -0.5 0 -0.5
v 0.5 0 -0.5
v 0.5 0 0.5
v -0.5 0 0.5
f 1 2 3
f 1 3 4
";

const CBOX_HEAD: &str = r#"<scene version="0.4.0">
  <integrator type="path"><integer name="maxDepth" value="-1"/></integrator>
  <sensor type="perspective">
    <float name="fov" value="39.3077"/>
    <transform name="toWorld"><lookAt origin="0, 1, 3.5" target="0, 1, 0" up="0, 1, 0"/></transform>
    <sampler type="independent"><integer name="sampleCount" value="8"/></sampler>
    <film type="hdrfilm"><integer name="width" value="64"/><integer name="height" value="48"/></film>
  </sensor>
  <bsdf type="diffuse" id="white"><rgb name="reflectance" value="0.8, 0.8, 0.8"/></bsdf>
  <shape type="obj" id="light">
    <string name="filename" value="meshes/quad.obj"/>
    <transform name="toWorld"><translate x="0" y="1.9" z="0"/></transform>
    <ref id="white"/>
    <emitter type="area"><spectrum name="radiance" value="400:10, 700:10"/></emitter>
  </shape>
"#;

const BALL: &str = r#"  <shape type="sphere" id="ball"><ref id="white"/></shape>
"#;

/// Resource root holding `scenes/cbox/cbox.xml` and its quad mesh.
fn cbox_root(extra: &str) -> Result<(TempDir, ResourceManager)> {
    let root = tempfile::tempdir()?;
    let scene_dir = root.path().join("scenes/cbox");
    std::fs::create_dir_all(scene_dir.join("meshes"))?;
    std::fs::write(scene_dir.join("meshes/quad.obj"), QUAD_OBJ)?;
    std::fs::write(scene_dir.join("cbox.xml"), format!("{CBOX_HEAD}{extra}</scene>"))?;
    let resources = ResourceManager::new(root.path(), 2)?;
    Ok((root, resources))
}

fn cbox_location() -> PbptSceneLocation {
    PbptSceneLocation::new("scenes/cbox", "cbox.xml")
}

fn permissive() -> ImportOptions {
    ImportOptions {
        require_supported_cbox_subset: false,
        ..ImportOptions::default()
    }
}

fn import(extra: &str, options: &ImportOptions) -> Result<(TempDir, ResourceManager, Scene, ImportPackage)> {
    let (root, mut resources) = cbox_root(extra)?;
    let mut scene = Scene::new(SceneId::new(1), "cbox");
    let package = import_scene_from_resources(&cbox_location(), &mut scene, &mut resources, options)?;
    Ok((root, resources, scene, package))
}

fn assert_mat4_near(actual: &Mat4, expected: &Mat4) {
    for (a, e) in actual.to_cols_array().iter().zip(expected.to_cols_array()) {
        assert_abs_diff_eq!(*a, e, epsilon = 1e-5);
    }
}

fn triangle_mesh(resources: &mut ResourceManager) -> Result<lumen::resources::MeshHandle> {
    let vertex = |x: f32, y: f32| MeshVertex {
        position: [x, y, 0.0],
        uv: [0.0, 0.0],
        normal: [0.0, 0.0, 1.0],
    };
    Ok(resources.create::<MeshKind>(
        ObjMeshData {
            vertices: vec![vertex(0.0, 0.0), vertex(1.0, 0.0), vertex(0.0, 1.0)],
            indices: vec![0, 1, 2],
        },
        MeshOptions::default(),
    )?)
}

// ============================================================================
// Import
// ============================================================================

#[test]
fn cbox_subset_imports_shapes_lights_and_camera() -> Result<()> {
    let (_root, _resources, scene, package) = import("", &ImportOptions::default())?;
    let result = &package.result;
    assert_eq!(result.imported_shape_count, 1);
    assert_eq!(result.imported_light_shape_count, 1);
    assert_eq!(
        result.integrator.as_ref().map(|integrator| integrator.max_depth),
        Some(-1)
    );

    let light = scene.find_game_object_by_name("light").expect("light object");
    assert_eq!(result.imported_game_object_id_by_name.get("light"), Some(&light));
    assert!(scene.has_component::<MeshRenderer>(light));
    assert!(scene.has_component::<PbptMesh>(light));
    assert!(scene.has_component::<PbptLight>(light));
    let point_light = scene.get_component::<PointLight>(light).expect("preview light");
    assert_abs_diff_eq!(point_light.intensity(), 10.0, epsilon = 1e-2);
    assert_abs_diff_eq!(scene.node(light).unwrap().world_position().y, 1.9, epsilon = 1e-5);

    let renderer = scene.get_component::<MeshRenderer>(light).unwrap();
    assert_abs_diff_eq!(renderer.base_color().x, 0.8, epsilon = 1e-5);
    let info = &package.compatible_info.mapped_shape_info_by_game_object[&light];
    assert_eq!(info.source_shape_id, "light");
    assert_eq!(info.source_material_ref_name, "white");
    assert!(package.compatible_info.passthrough_shape_ids.is_empty());
    Ok(())
}

#[test]
fn imported_camera_becomes_active_with_sensor_settings() -> Result<()> {
    let (_root, _resources, scene, package) = import("", &ImportOptions::default())?;
    let camera_id = scene.find_game_object_by_name("pbpt_camera").expect("camera object");
    let camera = scene.active_camera().expect("active camera");
    assert_eq!(camera.owner(), camera_id);

    let params = camera.perspective_params().unwrap();
    assert_abs_diff_eq!(params.fov_degrees, 39.3077, epsilon = 1e-4);
    assert_abs_diff_eq!(params.aspect_ratio, 64.0 / 48.0, epsilon = 1e-5);

    let position = camera.world_position(scene.graph()).unwrap();
    assert_abs_diff_eq!((position - Vec3::new(0.0, 1.0, 3.5)).length(), 0.0, epsilon = 1e-5);
    let front = camera.world_front(scene.graph()).unwrap();
    assert_abs_diff_eq!((front - Vec3::NEG_Z).length(), 0.0, epsilon = 1e-5);

    let sensor = package.result.sensor.as_ref().expect("sensor record");
    assert_eq!((sensor.film_width, sensor.film_height), (64, 48));
    assert_eq!(package.compatible_info.passthrough_spp, 8);
    Ok(())
}

#[test]
fn free_look_controller_is_attached_on_request() -> Result<()> {
    let options = ImportOptions {
        free_look_input: Some(InputState::shared()),
        ..ImportOptions::default()
    };
    let (_root, _resources, scene, _package) = import("", &options)?;
    let camera_id = scene.find_game_object_by_name("pbpt_camera").unwrap();
    assert!(scene.has_component::<FreeLookCameraController>(camera_id));
    Ok(())
}

#[test]
fn strict_import_rejects_unsupported_shapes() -> Result<()> {
    let (_root, mut resources) = cbox_root(BALL)?;
    let mut scene = Scene::new(SceneId::new(1), "strict");
    let err = import_scene_from_resources(&cbox_location(), &mut scene, &mut resources, &ImportOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("sphere"), "{err}");
    Ok(())
}

#[test]
fn permissive_import_keeps_unsupported_shapes_as_passthrough() -> Result<()> {
    let (_root, _resources, scene, package) = import(BALL, &permissive())?;
    assert_eq!(package.result.imported_shape_count, 1);
    assert!(package.compatible_info.is_passthrough_shape("ball"));
    assert!(scene.find_game_object_by_name("ball").is_none());
    package.compatible_info.validate()?;
    Ok(())
}

#[test]
fn reader_strictness_follows_read_options() -> Result<()> {
    let (root, _resources) = cbox_root(BALL)?;
    let path = root.path().join("scenes/cbox/cbox.xml");
    assert!(read_scene_file(&path, ReadOptions { strict: true }).is_err());

    let parsed = read_scene_file(&path, ReadOptions { strict: false })?;
    assert_eq!(parsed.resources.shape_instances.len(), 2);
    assert_eq!(parsed.integrator, PbptIntegrator::Path { max_depth: -1 });
    assert!(parsed.has_area_emitter());
    Ok(())
}

#[test]
fn missing_scene_file_reports_the_path() -> Result<()> {
    let root = tempfile::tempdir()?;
    let mut resources = ResourceManager::new(root.path(), 2)?;
    let mut scene = Scene::new(SceneId::new(1), "missing");
    let path = root.path().join("nowhere.xml");
    let err = load_scene_file(&path, &mut scene, &mut resources, &ImportOptions::default()).unwrap_err();
    assert!(err.to_string().contains("nowhere.xml"), "{err}");
    assert_eq!(scene.game_object_count(), 0);
    Ok(())
}

#[test]
fn obj_paths_outside_meshes_are_rejected() -> Result<()> {
    let (root, mut resources) = cbox_root("")?;
    let text = CBOX_HEAD.replace("meshes/quad.obj", "../quad.obj");
    std::fs::write(root.path().join("scenes/cbox/cbox.xml"), format!("{text}</scene>"))?;
    let mut scene = Scene::new(SceneId::new(1), "escape");
    assert!(
        import_scene_from_resources(&cbox_location(), &mut scene, &mut resources, &ImportOptions::default()).is_err()
    );
    Ok(())
}

// ============================================================================
// Export
// ============================================================================

#[test]
fn export_round_trip_preserves_shapes_passthrough_and_camera() -> Result<()> {
    let (root, resources, scene, package) = import(BALL, &permissive())?;
    let out = root.path().join("export/cbox_out.xml");
    export_scene_file(&scene, &resources, &package.compatible_info, &out)?;
    assert!(out.parent().unwrap().join("meshes").is_dir());

    let reparsed = read_scene_file(&out, ReadOptions { strict: false })?;
    let ids: Vec<&str> = reparsed
        .resources
        .shape_instances
        .iter()
        .map(|shape| shape.shape_id.as_str())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"ball") && ids.contains(&"light"), "{ids:?}");
    let ball = reparsed
        .resources
        .shape_instances
        .iter()
        .find(|shape| shape.shape_id == "ball")
        .unwrap();
    assert!(ball.raw.is_some());
    assert!(reparsed.has_area_emitter());
    assert_eq!(reparsed.spp(), 8);

    let camera = scene.active_camera().unwrap();
    let expected = scene.graph().world_matrix(camera.owner()).unwrap();
    let sensor = reparsed.sensor().expect("perspective sensor");
    assert_mat4_near(&sensor.to_world, &expected);
    assert_eq!((sensor.film_width, sensor.film_height), (64, 48));

    // A second import of the exported file maps the same shape again.
    let mut again = Scene::new(SceneId::new(2), "again");
    let mut resources_again = ResourceManager::new(root.path(), 2)?;
    let package_again = load_scene_file(&out, &mut again, &mut resources_again, &permissive())?;
    assert_eq!(package_again.result.imported_shape_count, 1);
    assert!(package_again.compatible_info.is_passthrough_shape("ball"));
    Ok(())
}

#[test]
fn export_follows_the_moved_camera() -> Result<()> {
    let (_root, resources, mut scene, package) = import("", &ImportOptions::default())?;
    let camera_id = scene.find_game_object_by_name("pbpt_camera").unwrap();
    scene.node_mut(camera_id).unwrap().set_local_position(Vec3::new(2.0, 1.0, 3.5));
    scene.graph_mut().update_world_transforms();

    let exported = build_scene_result(&scene, &resources, &package.compatible_info)?;
    let sensor = exported.sensor().unwrap();
    assert_abs_diff_eq!(sensor.to_world.w_axis.x, 2.0, epsilon = 1e-5);
    Ok(())
}

#[test]
fn export_shares_meshes_and_materials() -> Result<()> {
    let root = tempfile::tempdir()?;
    let mut resources = ResourceManager::new(root.path(), 2)?;
    let mesh = triangle_mesh(&mut resources)?;
    let mut scene = Scene::new(SceneId::new(1), "shared");
    let camera = scene.create_game_object("Camera");
    scene.create_perspective_camera(camera)?;
    for name in ["A", "B"] {
        let id = scene.create_game_object(name);
        scene.add_component(id, MeshRenderer::new(mesh, Vec4::new(0.5, 0.5, 0.5, 1.0))?)?;
        scene.add_component(id, PbptMesh)?;
    }
    // Without PbptMesh this object is not exported.
    let plain = scene.create_game_object("Plain");
    scene.add_component(plain, MeshRenderer::new(mesh, Vec4::ONE)?)?;

    let exported = build_scene_result(&scene, &resources, &Default::default())?;
    assert_eq!(exported.resources.shape_instances.len(), 2);
    assert_eq!(exported.resources.meshes.len(), 1);
    assert_eq!(exported.resources.materials.len(), 1);
    assert!(!exported.has_area_emitter());
    Ok(())
}

#[test]
fn export_preconditions_are_checked() -> Result<()> {
    let root = tempfile::tempdir()?;
    let mut resources = ResourceManager::new(root.path(), 2)?;
    let mesh = triangle_mesh(&mut resources)?;
    let mut scene = Scene::new(SceneId::new(1), "invalid");
    let lamp = scene.create_game_object("Lamp");
    scene.add_component(lamp, MeshRenderer::new(mesh, Vec4::ONE)?)?;
    scene.add_component(lamp, PbptLight::new(PbptSpectrum::constant(5.0))?)?;

    // No active camera.
    assert!(build_scene_result(&scene, &resources, &Default::default()).is_err());

    let camera = scene.create_game_object("Camera");
    scene.create_perspective_camera(camera)?;
    // PbptLight without PbptMesh.
    let err = build_scene_result(&scene, &resources, &Default::default()).unwrap_err();
    assert!(err.to_string().contains("PbptMesh"), "{err}");

    assert!(export_scene_file(&scene, &resources, &Default::default(), Path::new("")).is_err());
    Ok(())
}
