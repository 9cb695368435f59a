//! Engine configuration.
//!
//! ```rust,ignore
//! use lumen_app::EngineConfig;
//!
//! let config = EngineConfig {
//!     window_title: "Cornell box".to_string(),
//!     max_frames_in_flight: 3,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```
//!
//! Every field has a default, so a JSON file only needs the keys it changes.

use std::path::{Path, PathBuf};

use lumen_core::errors::{LumenError, Result, ResultExt};
use lumen_render::resolve_shader_path;
use lumen_render::scheduler::MAX_FRAMES_IN_FLIGHT;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub window_width: u32,
    pub window_height: u32,
    pub window_title: String,
    pub max_frames_in_flight: u32,
    /// Length of one fixed step in seconds.
    pub fixed_delta_seconds: f64,
    /// Fixed steps run per frame at most; leftover time is dropped.
    pub max_fixed_steps_per_frame: u32,
    pub start_paused: bool,
    pub resource_root_dir: PathBuf,
    /// Compiled shader directory; `$LUMEN_SHADER_ROOT` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shader_root_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            window_title: "Lumen".to_string(),
            max_frames_in_flight: 2,
            fixed_delta_seconds: 1.0 / 60.0,
            max_fixed_steps_per_frame: 4,
            start_paused: false,
            resource_root_dir: PathBuf::from("./assets/"),
            shader_root_dir: None,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LumenError::io(path, source))?;
        Self::from_json_str(&text).context(format!("config '{}'", path.display()))
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.fixed_delta_seconds.is_finite() || self.fixed_delta_seconds <= 0.0 {
            return Err(LumenError::invalid_argument(format!(
                "fixed_delta_seconds must be finite and > 0, got {}",
                self.fixed_delta_seconds
            )));
        }
        if self.max_fixed_steps_per_frame == 0 {
            return Err(LumenError::invalid_argument("max_fixed_steps_per_frame must be >= 1."));
        }
        if self.max_frames_in_flight == 0 || self.max_frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            return Err(LumenError::invalid_argument(format!(
                "max_frames_in_flight must be in [1, {MAX_FRAMES_IN_FLIGHT}], got {}",
                self.max_frames_in_flight
            )));
        }
        if self.window_width == 0 || self.window_height == 0 {
            return Err(LumenError::invalid_argument(format!(
                "window size must be non-zero, got {}x{}",
                self.window_width, self.window_height
            )));
        }
        Ok(())
    }

    /// Resolves a shader file below the configured root, falling back to
    /// `$LUMEN_SHADER_ROOT`.
    pub fn shader_path(&self, filename: &str) -> Result<PathBuf> {
        resolve_shader_path(self.shader_root_dir.as_deref(), filename)
    }
}
