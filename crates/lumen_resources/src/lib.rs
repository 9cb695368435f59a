//! Handle-based, frame-safe resource management.
//!
//! - [`ResourceManager`]: per-kind CPU records, lazy GPU upload, path dedup and
//!   frame-deferred GPU retirement.
//! - [`ResourceKind`]: the trait bundle a kind implements.
//! - [`MeshKind`] / [`TextureKind`]: the built-in kinds.

pub mod handle;
pub mod image_io;
pub mod kind;
pub mod manager;
pub mod mesh;
pub mod obj_io;
mod storage;
pub mod texture;

pub use handle::Handle;
pub use kind::ResourceKind;
pub use manager::{DEFAULT_FRAMES_IN_FLIGHT, ResourceManager};
pub use mesh::{MeshGpu, MeshHandle, MeshKind, MeshOptions, MeshVertex, ObjMeshData};
pub use texture::{ImageData, TextureGpu, TextureHandle, TextureKind, TextureOptions};
