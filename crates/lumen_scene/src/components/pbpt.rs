//! Markers that opt a renderable into the PBPT scene export.

use std::fmt::Write as _;

use lumen_core::errors::{LumenError, Result};
use lumen_core::logging::targets;
use serde::{Deserialize, Serialize};

use super::MeshRenderer;
use crate::component::{Component, ComponentContext};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PbptSpectrumPoint {
    pub lambda_nm: f32,
    pub value: f32,
}

/// Piecewise-linear spectrum sampled at strictly increasing wavelengths.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PbptSpectrum {
    pub points: Vec<PbptSpectrumPoint>,
}

impl PbptSpectrum {
    /// `value` at 400, 500, 600 and 700 nm.
    #[must_use]
    pub fn constant(value: f32) -> Self {
        Self {
            points: [400.0, 500.0, 600.0, 700.0]
                .into_iter()
                .map(|lambda_nm| PbptSpectrumPoint { lambda_nm, value })
                .collect(),
        }
    }

    #[must_use]
    pub fn from_pairs(pairs: &[(f32, f32)]) -> Self {
        Self {
            points: pairs
                .iter()
                .map(|&(lambda_nm, value)| PbptSpectrumPoint { lambda_nm, value })
                .collect(),
        }
    }

    /// Checks that the spectrum is non-empty, wavelengths are positive and
    /// strictly increasing, and values are finite and non-negative.
    pub fn validate(&self, field_name: &str) -> Result<()> {
        if self.points.is_empty() {
            return Err(LumenError::invalid_argument(format!("{field_name} must not be empty.")));
        }
        let mut last_lambda = f32::NEG_INFINITY;
        for (index, point) in self.points.iter().enumerate() {
            if !point.lambda_nm.is_finite() || point.lambda_nm <= 0.0 {
                return Err(LumenError::invalid_argument(format!(
                    "{field_name} has invalid lambda at index {index}."
                )));
            }
            if !point.value.is_finite() || point.value < 0.0 {
                return Err(LumenError::invalid_argument(format!(
                    "{field_name} has invalid value at index {index}."
                )));
            }
            if point.lambda_nm <= last_lambda {
                return Err(LumenError::invalid_argument(format!(
                    "{field_name} lambda must be strictly increasing."
                )));
            }
            last_lambda = point.lambda_nm;
        }
        Ok(())
    }

    /// `"λ:v, λ:v, ..."` with six decimals.
    pub fn serialize(&self) -> Result<String> {
        self.validate("spectrum")?;
        let mut out = String::new();
        for (index, point) in self.points.iter().enumerate() {
            if index > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{:.6}:{:.6}", point.lambda_nm, point.value);
        }
        Ok(out)
    }
}

impl Default for PbptSpectrum {
    fn default() -> Self {
        Self::constant(1.0)
    }
}

fn require_mesh_renderer(ctx: &ComponentContext<'_>, component: &str) -> Result<()> {
    if ctx.has_sibling::<MeshRenderer>() {
        return Ok(());
    }
    log::error!(
        target: targets::COMPONENT,
        "{component} on GameObject {} requires a MeshRenderer.",
        ctx.owner()
    );
    Err(LumenError::invariant(format!(
        "{component} requires MeshRenderer on the same GameObject."
    )))
}

/// Exports the sibling [`MeshRenderer`] as a PBPT shape.
#[derive(Clone, Copy, Debug, Default)]
pub struct PbptMesh;

impl Component for PbptMesh {
    fn on_awake(&mut self, ctx: &mut ComponentContext<'_>) -> Result<()> {
        require_mesh_renderer(ctx, "PbptMesh")
    }
}

/// Turns the exported shape into an area emitter.
#[derive(Clone, Debug, Default)]
pub struct PbptLight {
    radiance: PbptSpectrum,
}

impl PbptLight {
    pub fn new(radiance: PbptSpectrum) -> Result<Self> {
        radiance.validate("PbptLight.radiance_spectrum")?;
        Ok(Self { radiance })
    }

    #[must_use]
    pub fn radiance_spectrum(&self) -> &PbptSpectrum {
        &self.radiance
    }

    pub fn set_radiance_spectrum(&mut self, radiance: PbptSpectrum) -> Result<()> {
        radiance.validate("PbptLight.radiance_spectrum")?;
        self.radiance = radiance;
        Ok(())
    }
}

impl Component for PbptLight {
    fn on_awake(&mut self, ctx: &mut ComponentContext<'_>) -> Result<()> {
        require_mesh_renderer(ctx, "PbptLight")
    }
}
