//! Built-in components.

mod mesh_renderer;
mod pbpt;
mod point_light;

pub use mesh_renderer::MeshRenderer;
pub use pbpt::{PbptLight, PbptMesh, PbptSpectrum, PbptSpectrumPoint};
pub use point_light::PointLight;
