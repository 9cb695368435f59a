//! Engine loop and host glue for Lumen.
//!
//! - [`EngineConfig`]: serde-backed configuration with validation
//! - [`Engine`]: fixed-step world driver owning the resource manager
//! - [`Runtime`]: engine + frame scheduler + render pipeline, one frame at a time
//! - [`init_logging`]: `env_logger` bootstrap

pub mod config;
pub mod engine;
pub mod logging;
pub mod runtime;

pub use config::EngineConfig;
pub use engine::Engine;
pub use logging::init_logging;
pub use runtime::Runtime;
