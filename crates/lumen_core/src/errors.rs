//! Error Types
//!
//! This module defines the error type shared by every Lumen crate.
//!
//! # Overview
//!
//! [`LumenError`] classifies failures by *kind* rather than by subsystem:
//! - caller mistakes ([`LumenError::InvalidArgument`])
//! - broken invariants ([`LumenError::InvariantViolation`])
//! - stale handles and unknown ids ([`LumenError::NotFound`])
//! - foreign scene constructs no mapper understands ([`LumenError::Unsupported`])
//! - file system and parse failures ([`LumenError::Io`], [`LumenError::Parse`])
//! - aggregated event handler failures ([`LumenError::EventDispatch`])
//! - cooperative render cancellation ([`LumenError::RenderCanceled`])
//!
//! # Usage
//!
//! All fallible public APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, LumenError>`.
//!
//! ```rust,ignore
//! use lumen_core::errors::{LumenError, Result, ResultExt};
//!
//! fn load() -> Result<()> {
//!     std::fs::read("scene.xml")
//!         .map_err(|source| LumenError::io("scene.xml", source))
//!         .context("load_scene failed")?;
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Boxed error produced by an event handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for the Lumen engine.
#[derive(Error, Debug)]
pub enum LumenError {
    // ========================================================================
    // Caller & Invariant Errors
    // ========================================================================
    /// The caller passed ill-formed data (empty path, invalid handle, ...).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An internal invariant would be broken (duplicate component, cycle, ...).
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// A handle or id is not alive anymore, or never existed.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A foreign construct no mapper recognizes.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    // ========================================================================
    // I/O & Parsing Errors
    // ========================================================================
    /// File I/O error with the offending path.
    #[error("IO error at '{}': {source}", .path.display())]
    Io {
        /// Path that was being accessed
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed input (XML, OBJ, image, JSON).
    #[error("Parse error in '{origin}': {message}")]
    Parse {
        /// File path or a descriptive origin such as `<memory>`
        origin: String,
        /// Human readable description
        message: String,
    },

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // GPU Errors
    // ========================================================================
    /// Device-side failure (allocation, upload, stale GPU object).
    #[error("GPU error: {0}")]
    Gpu(String),

    // ========================================================================
    // Context-Carrying Errors
    // ========================================================================
    /// Failure raised inside a PBPT mapper.
    #[error("[mapper={mapper}] {stage} failed: {source}")]
    Mapper {
        /// Name of the mapper that failed
        mapper: &'static str,
        /// `matches` or `map`
        stage: &'static str,
        #[source]
        source: Box<LumenError>,
    },

    /// Any error wrapped with a higher-level description.
    #[error("{context}: {source}")]
    Context {
        /// What was being attempted
        context: String,
        #[source]
        source: Box<LumenError>,
    },

    // ========================================================================
    // Event & Cancellation
    // ========================================================================
    /// One or more handlers failed during a single publish.
    #[error("Event dispatch failed: {} handler error(s), first: {}", .0.len(), first_handler_message(.0))]
    EventDispatch(Vec<HandlerError>),

    /// The offline render backend honored a cancel request.
    #[error("Render canceled.")]
    RenderCanceled,
}

fn first_handler_message(errors: &[HandlerError]) -> String {
    errors
        .first()
        .map_or_else(|| "<none>".to_string(), ToString::to_string)
}

impl LumenError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    pub fn gpu(message: impl Into<String>) -> Self {
        Self::Gpu(message.into())
    }

    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn parse(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// Wraps `self` with a description of the operation that failed.
    #[must_use]
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns `true` if this error (or any wrapped source) is a cancellation.
    #[must_use]
    pub fn is_render_canceled(&self) -> bool {
        match self {
            Self::RenderCanceled => true,
            Self::Context { source, .. } | Self::Mapper { source, .. } => source.is_render_canceled(),
            _ => false,
        }
    }
}

/// Adds `.context(...)` to any [`Result`].
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|err| err.with_context(context))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|err| err.with_context(f()))
    }
}

/// Alias for `Result<T, LumenError>`.
pub type Result<T> = std::result::Result<T, LumenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapper_error_carries_mapper_name() {
        let err = LumenError::Mapper {
            mapper: "obj_lambertian",
            stage: "map",
            source: Box::new(LumenError::invariant("reflectance outside [0, 1]")),
        };
        assert!(err.to_string().starts_with("[mapper=obj_lambertian] map failed"));
    }

    #[test]
    fn cancellation_is_detected_through_context() {
        let err = LumenError::RenderCanceled.with_context("worker");
        assert!(err.is_render_canceled());
        assert!(!LumenError::invalid_argument("x").is_render_canceled());
    }

    #[test]
    fn event_dispatch_reports_count() {
        let errors: Vec<HandlerError> = vec!["first".into(), "second".into()];
        let err = LumenError::EventDispatch(errors);
        assert_eq!(err.to_string(), "Event dispatch failed: 2 handler error(s), first: first");
    }
}
