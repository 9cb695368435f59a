//! Data that survives an import/export cycle without being mapped onto the
//! scene.

use lumen_core::errors::{LumenError, Result};
use lumen_core::ids::GameObjectId;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::{DEFAULT_SAMPLE_COUNT, PbptIntegrator, PbptResources, SensorRecord};

/// Where a mapped game object came from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MappedShapeInfo {
    pub source_shape_id: String,
    pub source_mesh_name: String,
    pub source_material_ref_name: String,
}

#[derive(Clone, Debug)]
pub struct CompatibleInfo {
    pub mapped_shape_info_by_game_object: FxHashMap<GameObjectId, MappedShapeInfo>,
    /// Full resources of the imported file. Export keeps only what the
    /// passthrough shapes reference.
    pub passthrough_resources: PbptResources,
    pub passthrough_shape_ids: FxHashSet<String>,
    pub passthrough_integrator: Option<PbptIntegrator>,
    pub passthrough_spp: i32,
    /// Film, focus and fov axis of the imported sensor.
    pub passthrough_sensor: Option<SensorRecord>,
}

impl Default for CompatibleInfo {
    fn default() -> Self {
        Self {
            mapped_shape_info_by_game_object: FxHashMap::default(),
            passthrough_resources: PbptResources::default(),
            passthrough_shape_ids: FxHashSet::default(),
            passthrough_integrator: None,
            passthrough_spp: DEFAULT_SAMPLE_COUNT,
            passthrough_sensor: None,
        }
    }
}

impl CompatibleInfo {
    /// Checks that mapped and passthrough shapes are disjoint and that every
    /// passthrough shape id exists in the passthrough resources.
    pub fn validate(&self) -> Result<()> {
        for info in self.mapped_shape_info_by_game_object.values() {
            if self.passthrough_shape_ids.contains(&info.source_shape_id) {
                return Err(LumenError::invariant(format!(
                    "Shape '{}' is both mapped and passthrough.",
                    info.source_shape_id
                )));
            }
        }
        for shape_id in &self.passthrough_shape_ids {
            if !self.passthrough_resources.has_shape(shape_id) {
                return Err(LumenError::invariant(format!(
                    "Passthrough shape '{shape_id}' is missing from passthrough resources."
                )));
            }
        }
        if self.passthrough_spp <= 0 {
            return Err(LumenError::invariant("passthrough_spp must be positive."));
        }
        Ok(())
    }

    #[must_use]
    pub fn is_passthrough_shape(&self, shape_id: &str) -> bool {
        self.passthrough_shape_ids.contains(shape_id)
    }
}
