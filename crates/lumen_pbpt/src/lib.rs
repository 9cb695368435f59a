//! PBPT bridge of the Lumen engine.
//!
//! - [`reader`] / [`writer`]: PBPT scene XML ⇄ [`PbptScene`]
//! - [`bridge`]: mapper registry and dispatch
//! - [`importer`]: [`PbptScene`] → [`lumen_scene::Scene`]
//! - [`exporter`]: [`lumen_scene::Scene`] → [`PbptScene`], with passthrough of
//!   everything the importer could not map ([`CompatibleInfo`])
//! - [`offline`]: background offline render service

pub mod bridge;
pub mod compatible;
pub mod exporter;
pub mod importer;
pub mod model;
pub mod offline;
pub mod reader;
pub mod spectrum;
pub mod writer;
pub mod xml;

pub use bridge::{DispatchResult, ImportOptions, ImportPackage, ImportResult, Mapper, MapperDomain, dispatch};
pub use compatible::{CompatibleInfo, MappedShapeInfo};
pub use exporter::{build_scene_result, export_scene_file};
pub use importer::{PbptSceneLocation, import_scene, import_scene_from_resources, load_scene_file};
pub use model::{
    AreaLightRecord, IntegratorRecord, PbptCamera, PbptIntegrator, PbptMaterial, PbptMeshRecord, PbptResources,
    PbptScene, Reflectance, SensorRecord, ShapeInstanceRecord,
};
pub use offline::{OfflineRenderConfig, OfflineRenderState, PbptOfflineRenderService, RenderBackend};
pub use reader::{ReadOptions, parse_scene_str, read_scene_file};
pub use writer::{serialize_scene, write_scene_file};
