//! Background offline rendering of the current scene.
//!
//! [`PbptOfflineRenderService::start`] snapshots the scene into a PBPT XML
//! file on the calling thread, then runs the render backend on a worker
//! thread. State, progress and the last message can be polled from any
//! thread while the worker runs.

pub mod raycast;

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::thread::JoinHandle;

use lumen_core::errors::{LumenError, Result};
use lumen_core::logging::targets;
use lumen_resources::ResourceManager;
use lumen_scene::Scene;
use parking_lot::Mutex;

use crate::compatible::CompatibleInfo;
use crate::exporter::build_scene_result;
use crate::model::PbptCamera;
use crate::writer::write_scene_file;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OfflineRenderState {
    Idle = 0,
    Running = 1,
    Succeeded = 2,
    Failed = 3,
    Canceled = 4,
}

impl OfflineRenderState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Succeeded,
            3 => Self::Failed,
            4 => Self::Canceled,
            _ => Self::Idle,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Canceled => "Canceled",
        }
    }

    #[must_use]
    pub fn is_start_allowed(self) -> bool {
        self != Self::Running
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OfflineRenderConfig {
    pub scene_xml_path: PathBuf,
    pub output_exr_path: PathBuf,
    pub spp: i32,
    /// Film size override; `0` keeps the exported film size.
    pub film_width: i32,
    pub film_height: i32,
}

impl Default for OfflineRenderConfig {
    fn default() -> Self {
        Self {
            scene_xml_path: PathBuf::new(),
            output_exr_path: PathBuf::new(),
            spp: 16,
            film_width: 0,
            film_height: 0,
        }
    }
}

impl OfflineRenderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.scene_xml_path.as_os_str().is_empty() {
            return Err(LumenError::invalid_argument("scene_xml_path must not be empty."));
        }
        if self.output_exr_path.as_os_str().is_empty() {
            return Err(LumenError::invalid_argument("output_exr_path must not be empty."));
        }
        if self.spp < 1 {
            return Err(LumenError::invalid_argument("spp must be >= 1."));
        }
        if (self.film_width > 0 && self.film_height <= 0) || (self.film_height > 0 && self.film_width <= 0) {
            return Err(LumenError::invalid_argument(
                "film_width and film_height must both be > 0 when overriding film size.",
            ));
        }
        Ok(())
    }

    fn film_override(&self) -> Option<(i32, i32)> {
        (self.film_width > 0 && self.film_height > 0).then_some((self.film_width, self.film_height))
    }
}

/// `(config, on_progress, is_cancel_requested)`. Returning
/// [`LumenError::RenderCanceled`] marks the render as canceled.
pub type RenderBackend =
    Arc<dyn Fn(&OfflineRenderConfig, &dyn Fn(f32), &dyn Fn() -> bool) -> Result<()> + Send + Sync>;

/// State shared with the worker thread.
struct Shared {
    state: AtomicU8,
    progress_bits: AtomicU32,
    cancel_requested: AtomicBool,
    message: Mutex<Arc<str>>,
}

impl Shared {
    fn state(&self) -> OfflineRenderState {
        OfflineRenderState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: OfflineRenderState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn set_progress(&self, progress: f32) {
        let progress = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
        self.progress_bits.store(progress.to_bits(), Ordering::Release);
    }

    fn set_message(&self, message: impl Into<Arc<str>>) {
        *self.message.lock() = message.into();
    }

    fn fail(&self, message: impl Into<Arc<str>>) -> bool {
        let message = message.into();
        log::warn!(target: targets::PBPT_OFFLINE, "Offline render rejected: {message}");
        self.set_state(OfflineRenderState::Failed);
        self.set_message(message);
        false
    }
}

pub struct PbptOfflineRenderService {
    shared: Arc<Shared>,
    /// Held for the whole of `start` so concurrent starts serialize.
    worker: Mutex<Option<JoinHandle<()>>>,
    backend: RenderBackend,
}

impl Default for PbptOfflineRenderService {
    fn default() -> Self {
        Self::new(Arc::new(raycast::render_direct_lighting))
    }
}

impl PbptOfflineRenderService {
    #[must_use]
    pub fn new(backend: RenderBackend) -> Self {
        log::info!(target: targets::PBPT_OFFLINE, "PbptOfflineRenderService initialized.");
        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(OfflineRenderState::Idle as u8),
                progress_bits: AtomicU32::new(0.0f32.to_bits()),
                cancel_requested: AtomicBool::new(false),
                message: Mutex::new(Arc::from("Idle.")),
            }),
            worker: Mutex::new(None),
            backend,
        }
    }

    #[must_use]
    pub fn state(&self) -> OfflineRenderState {
        self.shared.state()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == OfflineRenderState::Running
    }

    /// Progress of the current or last render in `[0, 1]`.
    #[must_use]
    pub fn progress(&self) -> f32 {
        f32::from_bits(self.shared.progress_bits.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn last_message(&self) -> Arc<str> {
        self.shared.message.lock().clone()
    }

    pub fn request_cancel(&self) {
        self.shared.cancel_requested.store(true, Ordering::Release);
        if self.is_running() {
            self.shared.set_message("Cancel requested.");
        }
    }

    /// Writes the scene snapshot and starts the backend. Returns `false` with
    /// the reason in [`last_message`](Self::last_message) if the render could
    /// not start.
    pub fn start(&self, scene: &Scene, resources: &ResourceManager, config: &OfflineRenderConfig) -> bool {
        let mut worker = self.worker.lock();

        if self.is_running() {
            self.shared.set_message("Render already running.");
            return false;
        }
        if let Err(err) = config.validate() {
            return self.shared.fail(validation_message(&err));
        }
        if let Some(finished) = worker.take()
            && finished.join().is_err()
        {
            log::error!(target: targets::PBPT_OFFLINE, "Previous offline render worker panicked.");
        }
        if let Err(err) = write_snapshot(scene, resources, config) {
            return self.shared.fail(validation_message(&err));
        }

        self.shared.cancel_requested.store(false, Ordering::Release);
        self.shared.set_progress(0.0);
        self.shared.set_state(OfflineRenderState::Running);
        self.shared.set_message(format!(
            "Scene snapshot saved to XML: {}",
            config.scene_xml_path.display()
        ));

        let shared = Arc::clone(&self.shared);
        let backend = Arc::clone(&self.backend);
        let config = config.clone();
        let spawned = std::thread::Builder::new()
            .name("pbpt-offline-render".to_string())
            .spawn(move || run_worker(&shared, &backend, &config));
        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                true
            }
            Err(err) => self.shared.fail(format!("Failed to spawn render worker: {err}")),
        }
    }
}

impl Drop for PbptOfflineRenderService {
    fn drop(&mut self) {
        self.request_cancel();
        if let Some(handle) = self.worker.get_mut().take()
            && handle.join().is_err()
        {
            log::error!(target: targets::PBPT_OFFLINE, "Offline render worker panicked.");
        }
    }
}

/// Messages of argument and invariant errors without the kind prefix.
fn validation_message(err: &LumenError) -> String {
    match err {
        LumenError::InvalidArgument(message) | LumenError::InvariantViolation(message) => message.clone(),
        other => other.to_string(),
    }
}

fn write_snapshot(scene: &Scene, resources: &ResourceManager, config: &OfflineRenderConfig) -> Result<()> {
    if scene.active_camera().is_none() {
        return Err(LumenError::invalid_argument("Offline render requires an active camera."));
    }
    let mut record = build_scene_result(scene, resources, &CompatibleInfo::default())?;
    if record.resources.shape_instances.is_empty() {
        return Err(LumenError::invalid_argument("Current scene has no exportable PBPT shapes."));
    }
    if !record.has_area_emitter() {
        return Err(LumenError::invalid_argument(
            "Current scene has no PBPT area emitter; output would be black.",
        ));
    }
    let PbptCamera::ThinLensPerspective(sensor) = &mut record.camera else {
        return Err(LumenError::invalid_argument(
            "Failed to export PBPT sensor from current active camera.",
        ));
    };
    sensor.sample_count = config.spp;
    if let Some((width, height)) = config.film_override() {
        sensor.film_width = width;
        sensor.film_height = height;
    }

    if let Some(dir) = config.output_exr_path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir).map_err(|source| LumenError::io(dir, source))?;
    }
    write_scene_file(&record, &config.scene_xml_path)
}

fn run_worker(shared: &Shared, backend: &RenderBackend, config: &OfflineRenderConfig) {
    let on_progress = |progress: f32| shared.set_progress(progress);
    let is_cancel_requested = || shared.cancel_requested.load(Ordering::Acquire);

    let outcome = catch_unwind(AssertUnwindSafe(|| backend(config, &on_progress, &is_cancel_requested)))
        .unwrap_or_else(|payload| Err(LumenError::invariant(panic_message(payload.as_ref()))));

    match outcome {
        Ok(()) => {
            shared.set_progress(1.0);
            shared.set_state(OfflineRenderState::Succeeded);
            shared.set_message(format!("Render succeeded: {}", config.output_exr_path.display()));
            log::info!(target: targets::PBPT_OFFLINE, "Offline render succeeded.");
        }
        Err(err) if err.is_render_canceled() => {
            shared.set_state(OfflineRenderState::Canceled);
            shared.set_message("Render canceled.");
            log::info!(target: targets::PBPT_OFFLINE, "Offline render canceled.");
        }
        Err(err) => {
            log::error!(target: targets::PBPT_OFFLINE, "Offline render failed: {err}");
            shared.set_state(OfflineRenderState::Failed);
            shared.set_message(err.to_string());
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload");
    format!("Render backend panicked: {detail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_labels_and_start_permission() {
        assert_eq!(OfflineRenderState::Canceled.label(), "Canceled");
        assert!(OfflineRenderState::Failed.is_start_allowed());
        assert!(!OfflineRenderState::Running.is_start_allowed());
        for state in [
            OfflineRenderState::Idle,
            OfflineRenderState::Running,
            OfflineRenderState::Succeeded,
            OfflineRenderState::Failed,
            OfflineRenderState::Canceled,
        ] {
            assert_eq!(OfflineRenderState::from_u8(state as u8), state);
        }
    }

    #[test]
    fn config_validation() {
        let mut config = OfflineRenderConfig {
            scene_xml_path: "a.xml".into(),
            output_exr_path: "a.exr".into(),
            ..OfflineRenderConfig::default()
        };
        config.validate().unwrap();

        config.film_width = 64;
        assert!(config.validate().is_err());
        config.film_height = 32;
        assert_eq!(config.film_override(), Some((64, 32)));

        config.spp = 0;
        assert!(config.validate().is_err());
    }
}
