use glam::Vec3;
use lumen_core::errors::{LumenError, Result};

use crate::component::Component;

/// Preview point light used by the forward pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct PointLight {
    pub color: Vec3,
    intensity: f32,
    range: f32,
    specular_strength: f32,
    shininess: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 10.0,
            range: 10.0,
            specular_strength: 1.0,
            shininess: 32.0,
        }
    }
}

impl PointLight {
    #[must_use]
    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    #[must_use]
    pub fn range(&self) -> f32 {
        self.range
    }

    #[must_use]
    pub fn specular_strength(&self) -> f32 {
        self.specular_strength
    }

    #[must_use]
    pub fn shininess(&self) -> f32 {
        self.shininess
    }

    pub fn set_color(&mut self, color: Vec3) {
        self.color = color;
    }

    pub fn set_intensity(&mut self, intensity: f32) -> Result<()> {
        if !intensity.is_finite() || intensity < 0.0 {
            return Err(LumenError::invalid_argument(
                "PointLight intensity must be a non-negative finite value.",
            ));
        }
        self.intensity = intensity;
        Ok(())
    }

    pub fn set_range(&mut self, range: f32) -> Result<()> {
        if !range.is_finite() || range <= 0.0 {
            return Err(LumenError::invalid_argument("PointLight range must be a positive finite value."));
        }
        self.range = range;
        Ok(())
    }

    pub fn set_specular_strength(&mut self, strength: f32) -> Result<()> {
        if !strength.is_finite() || strength < 0.0 {
            return Err(LumenError::invalid_argument(
                "PointLight specular_strength must be a non-negative finite value.",
            ));
        }
        self.specular_strength = strength;
        Ok(())
    }

    pub fn set_shininess(&mut self, shininess: f32) -> Result<()> {
        if !shininess.is_finite() || shininess < 1.0 {
            return Err(LumenError::invalid_argument("PointLight shininess must be >= 1.0 and finite."));
        }
        self.shininess = shininess;
        Ok(())
    }
}

impl Component for PointLight {}
