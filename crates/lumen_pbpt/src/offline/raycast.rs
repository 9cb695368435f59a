//! CPU direct-lighting renderer used as the default offline backend.
//!
//! Every camera ray is traced to its closest triangle; the hit point gathers
//! one shadow-tested sample from each emissive triangle. Surfaces are
//! Lambertian. This is enough to preview exported Cornell-box scenes.

use std::f32::consts::PI;

use glam::{Mat4, Vec3};
use lumen_core::errors::{LumenError, Result};
use lumen_core::logging::targets;
use lumen_resources::image_io;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::OfflineRenderConfig;
use crate::model::{PbptMaterial, PbptScene, Reflectance, SensorRecord};
use crate::reader::{ReadOptions, read_scene_file};
use crate::spectrum::{spectrum_to_linear_rgb, spectrum_to_rgb};

const RAY_EPSILON: f32 = 1e-4;
const FALLBACK_ALBEDO: Vec3 = Vec3::splat(0.5);

#[derive(Clone, Copy, Debug)]
struct Triangle {
    v0: Vec3,
    e1: Vec3,
    e2: Vec3,
    albedo: Vec3,
    emission: Vec3,
}

impl Triangle {
    fn new([a, b, c]: [Vec3; 3], to_world: &Mat4, albedo: Vec3, emission: Vec3) -> Self {
        let (a, b, c) = (
            to_world.transform_point3(a),
            to_world.transform_point3(b),
            to_world.transform_point3(c),
        );
        Self {
            v0: a,
            e1: b - a,
            e2: c - a,
            albedo,
            emission,
        }
    }

    fn normal(&self) -> Vec3 {
        self.e1.cross(self.e2).normalize_or_zero()
    }

    fn area(&self) -> f32 {
        0.5 * self.e1.cross(self.e2).length()
    }

    fn is_emissive(&self) -> bool {
        self.emission.max_element() > 0.0
    }

    /// Möller–Trumbore; returns the ray parameter of the hit.
    fn intersect(&self, origin: Vec3, direction: Vec3) -> Option<f32> {
        let p = direction.cross(self.e2);
        let det = self.e1.dot(p);
        if det.abs() < 1e-9 {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = origin - self.v0;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(self.e1);
        let v = direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = self.e2.dot(q) * inv_det;
        (t > RAY_EPSILON).then_some(t)
    }

    fn sample_point(&self, rng: &mut StdRng) -> Vec3 {
        let (mut u, mut v): (f32, f32) = (rng.r#gen(), rng.r#gen());
        if u + v > 1.0 {
            (u, v) = (1.0 - u, 1.0 - v);
        }
        self.v0 + self.e1 * u + self.e2 * v
    }
}

struct Geometry {
    triangles: Vec<Triangle>,
    emitters: Vec<usize>,
}

impl Geometry {
    fn from_scene(scene: &PbptScene) -> Result<Self> {
        let resources = &scene.resources;
        let mut triangles = Vec::new();
        for shape in resources.shape_instances.iter().filter(|shape| shape.raw.is_none()) {
            let mesh = resources.meshes.require(&shape.mesh_name, "mesh")?;
            let albedo = match resources.materials.get(&shape.material_ref_name) {
                Some(PbptMaterial::Lambertian {
                    reflectance: Reflectance::Rgb(rgb),
                }) => *rgb,
                Some(PbptMaterial::Lambertian {
                    reflectance: Reflectance::Spectrum(spectrum),
                }) => spectrum_to_rgb(spectrum)?,
                _ => FALLBACK_ALBEDO,
            };
            let emission = match &shape.emission_spectrum_name {
                Some(name) => spectrum_to_linear_rgb(resources.spectra.require(name, "spectrum")?)?,
                None => Vec3::ZERO,
            };
            triangles.extend(
                (0..mesh.data.triangle_count())
                    .filter_map(|index| mesh.data.triangle(index))
                    .map(|corners| Triangle::new(corners, &shape.object_to_world, albedo, emission)),
            );
        }
        let emitters = triangles
            .iter()
            .enumerate()
            .filter(|(_, triangle)| triangle.is_emissive())
            .map(|(index, _)| index)
            .collect();
        Ok(Self { triangles, emitters })
    }

    fn closest_hit(&self, origin: Vec3, direction: Vec3) -> Option<(usize, f32)> {
        self.triangles
            .iter()
            .enumerate()
            .filter_map(|(index, triangle)| triangle.intersect(origin, direction).map(|t| (index, t)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    fn occluded(&self, origin: Vec3, direction: Vec3, max_t: f32) -> bool {
        self.triangles
            .iter()
            .any(|triangle| triangle.intersect(origin, direction).is_some_and(|t| t < max_t))
    }

    fn radiance(&self, origin: Vec3, direction: Vec3, rng: &mut StdRng) -> Vec3 {
        let Some((index, t)) = self.closest_hit(origin, direction) else {
            return Vec3::ZERO;
        };
        let surface = &self.triangles[index];
        let point = origin + direction * t;
        let mut normal = surface.normal();
        if normal.dot(direction) > 0.0 {
            normal = -normal;
        }

        let mut radiance = surface.emission;
        for &light_index in &self.emitters {
            if light_index == index {
                continue;
            }
            let light = &self.triangles[light_index];
            let to_light = light.sample_point(rng) - point;
            let distance_sq = to_light.length_squared();
            if distance_sq <= RAY_EPSILON {
                continue;
            }
            let distance = distance_sq.sqrt();
            let wi = to_light / distance;
            let cos_surface = normal.dot(wi);
            let cos_light = light.normal().dot(-wi).abs();
            if cos_surface <= 0.0 || cos_light <= 0.0 {
                continue;
            }
            let shadow_origin = point + normal * RAY_EPSILON;
            if self.occluded(shadow_origin, wi, distance - 2.0 * RAY_EPSILON) {
                continue;
            }
            let geometry_term = cos_surface * cos_light * light.area() / distance_sq;
            radiance += surface.albedo / PI * light.emission * geometry_term;
        }
        radiance
    }
}

/// Camera-space half extents of the image plane at distance 1.
fn image_plane_half_extents(sensor: &SensorRecord, width: u32, height: u32) -> (f32, f32) {
    let tan_half = (sensor.fov_degrees.to_radians() * 0.5).tan();
    let aspect = width as f32 / height as f32;
    let horizontal = match sensor.fov_axis.as_str() {
        "x" => true,
        "y" => false,
        "larger" => width >= height,
        _ => width <= height,
    };
    if horizontal {
        (tan_half, tan_half / aspect)
    } else {
        (tan_half * aspect, tan_half)
    }
}

/// Renders `config.scene_xml_path` into `config.output_exr_path`.
pub fn render_direct_lighting(
    config: &OfflineRenderConfig,
    on_progress: &dyn Fn(f32),
    is_cancel_requested: &dyn Fn() -> bool,
) -> Result<()> {
    let scene = read_scene_file(&config.scene_xml_path, ReadOptions { strict: false })?;
    let sensor = scene
        .sensor()
        .ok_or_else(|| LumenError::unsupported("Offline renderer requires a perspective sensor."))?;
    let (width, height) = (
        u32::try_from(sensor.film_width).unwrap_or(0),
        u32::try_from(sensor.film_height).unwrap_or(0),
    );
    if width == 0 || height == 0 {
        return Err(LumenError::invalid_argument("sensor film size must be positive."));
    }
    let spp = u32::try_from(config.spp.max(1)).unwrap_or(1);
    let geometry = Geometry::from_scene(&scene)?;
    let (half_w, half_h) = image_plane_half_extents(sensor, width, height);
    let origin = sensor.to_world.transform_point3(Vec3::ZERO);

    log::info!(
        target: targets::PBPT_OFFLINE,
        "Direct-lighting render started ({width}x{height}, spp={spp}, triangles={}, emitters={})",
        geometry.triangles.len(),
        geometry.emitters.len()
    );

    let mut rng = StdRng::seed_from_u64(0x5eed_1234);
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        if is_cancel_requested() {
            return Err(LumenError::RenderCanceled);
        }
        for x in 0..width {
            let mut sum = Vec3::ZERO;
            for _ in 0..spp {
                let (jx, jy): (f32, f32) = (rng.r#gen(), rng.r#gen());
                let ndc_x = 2.0 * (x as f32 + jx) / width as f32 - 1.0;
                let ndc_y = 1.0 - 2.0 * (y as f32 + jy) / height as f32;
                let local = Vec3::new(ndc_x * half_w, ndc_y * half_h, -1.0);
                let direction = sensor.to_world.transform_vector3(local).normalize_or_zero();
                if direction != Vec3::ZERO {
                    sum += geometry.radiance(origin, direction, &mut rng);
                }
            }
            pixels.extend_from_slice(&(sum / spp as f32).to_array());
        }
        on_progress((y + 1) as f32 / height as f32);
    }

    if let Some(dir) = config.output_exr_path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir).map_err(|source| LumenError::io(dir, source))?;
    }
    image_io::save_rgb32f(width, height, &pixels, &config.output_exr_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_hit_distance() {
        let triangle = Triangle::new(
            [Vec3::new(-1.0, -1.0, -2.0), Vec3::new(1.0, -1.0, -2.0), Vec3::new(0.0, 1.0, -2.0)],
            &Mat4::IDENTITY,
            Vec3::ONE,
            Vec3::ZERO,
        );
        let t = triangle.intersect(Vec3::ZERO, Vec3::NEG_Z).unwrap();
        assert!((t - 2.0).abs() < 1e-5);
        assert!(triangle.intersect(Vec3::ZERO, Vec3::Z).is_none());
        assert!((triangle.area() - 2.0).abs() < 1e-5);
    }

    #[test]
    fn fov_axis_selects_constrained_dimension() {
        let sensor = SensorRecord {
            fov_degrees: 90.0,
            ..SensorRecord::default()
        };
        let (w, h) = image_plane_half_extents(&sensor, 200, 100);
        assert!((h - 1.0).abs() < 1e-5);
        assert!((w - 2.0).abs() < 1e-5);
    }
}
