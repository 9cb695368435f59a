//! Kind-parameterized CPU/GPU resource cache.
//!
//! [`ResourceManager`] stores one record per handle: the validated CPU payload,
//! an optional lazily uploaded GPU object and the creation options. GPU objects
//! of unloaded resources are not destroyed immediately; they wait in a retired
//! queue until `frames_in_flight` more frames have been ticked, so no in-flight
//! command buffer can still reference them.
//!
//! Kinds are registered on first use; any type implementing
//! [`ResourceKind`] can be stored.
//!
//! # Threading
//!
//! The manager is not synchronized. Only the engine thread may use it.

use std::any::{Any, TypeId};
use std::path::{Path, PathBuf};

use lumen_core::errors::{LumenError, Result, ResultExt};
use lumen_core::logging::targets;
use lumen_core::paths::lexically_normal;
use lumen_core::rhi::Device;
use rustc_hash::FxHashMap;

use crate::handle::Handle;
use crate::kind::ResourceKind;
use crate::storage::{ErasedStorage, KindStorage, Record, Retired};

pub const DEFAULT_FRAMES_IN_FLIGHT: u32 = 2;

pub struct ResourceManager {
    root_dir: PathBuf,
    frames_in_flight: u32,
    current_frame_serial: u64,
    next_handle_id: u64,
    storages: FxHashMap<TypeId, Box<dyn ErasedStorage>>,
}

impl ResourceManager {
    /// Creates a manager rooted at `root_dir` (made absolute and normalized).
    pub fn new(root_dir: impl AsRef<Path>, frames_in_flight: u32) -> Result<Self> {
        let root_dir = root_dir.as_ref();
        let absolute = std::path::absolute(root_dir).map_err(|source| LumenError::io(root_dir, source))?;
        Ok(Self {
            root_dir: lexically_normal(&absolute),
            frames_in_flight: frames_in_flight.max(1),
            current_frame_serial: 0,
            next_handle_id: 1,
            storages: FxHashMap::default(),
        })
    }

    #[must_use]
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    #[must_use]
    pub fn frames_in_flight(&self) -> u32 {
        self.frames_in_flight
    }

    pub fn set_frames_in_flight(&mut self, frames_in_flight: u32) {
        self.frames_in_flight = frames_in_flight.max(1);
    }

    #[must_use]
    pub fn current_frame_serial(&self) -> u64 {
        self.current_frame_serial
    }

    fn storage<K: ResourceKind>(&self) -> Option<&KindStorage<K>> {
        let storage: &dyn Any = &**self.storages.get(&TypeId::of::<K>())?;
        storage.downcast_ref::<KindStorage<K>>()
    }

    fn storage_mut<K: ResourceKind>(&mut self) -> Result<&mut KindStorage<K>> {
        let entry = self
            .storages
            .entry(TypeId::of::<K>())
            .or_insert_with(|| Box::new(KindStorage::<K>::default()));
        let storage: &mut dyn Any = &mut **entry;
        storage.downcast_mut::<KindStorage<K>>().ok_or_else(|| {
            LumenError::invariant(format!("storage registered for '{}' has the wrong type", K::NAME))
        })
    }

    fn allocate_handle<K: ResourceKind>(&mut self) -> Handle<K> {
        let handle = Handle::from_raw(self.next_handle_id);
        self.next_handle_id += 1;
        handle
    }

    fn prepare_cpu<K: ResourceKind>(cpu: K::Cpu, options: &K::Options) -> Result<K::Cpu> {
        K::validate_cpu(&cpu)?;
        let cpu = K::normalize_cpu(cpu, options)?;
        K::validate_cpu(&cpu).context("normalized resource failed validation")?;
        Ok(cpu)
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Validates, normalizes and stores `cpu`. Nothing is uploaded.
    pub fn create<K: ResourceKind>(&mut self, cpu: K::Cpu, options: K::Options) -> Result<Handle<K>> {
        let cpu = Self::prepare_cpu::<K>(cpu, &options).with_context(|| format!("create<{}> failed", K::NAME))?;
        let handle = self.allocate_handle::<K>();
        self.storage_mut::<K>()?.insert(
            handle.value(),
            Record {
                cpu,
                gpu: None,
                options,
                path: None,
            },
        );
        log::debug!(target: targets::RESOURCE_MANAGER, "Created {} {}", K::NAME, handle);
        Ok(handle)
    }

    /// Resolves `rel_path` below the root and loads it, reusing the handle of a
    /// previous load of the same normalized path.
    pub fn create_from_relative_path<K: ResourceKind>(
        &mut self,
        rel_path: impl AsRef<Path>,
        options: K::Options,
    ) -> Result<Handle<K>> {
        let abs_path = self.resolve_relative_path(rel_path.as_ref())?;

        if let Some(storage) = self.storage::<K>()
            && let Some(&id) = storage.path_index.get(&abs_path)
            && storage.contains(id)
        {
            log::trace!(target: targets::RESOURCE_MANAGER, "Path cache hit for '{}'", abs_path.display());
            return Ok(Handle::from_raw(id));
        }

        let cpu = K::load_from_path(&abs_path, &options)
            .and_then(|cpu| Self::prepare_cpu::<K>(cpu, &options))
            .with_context(|| format!("load {} from '{}' failed", K::NAME, abs_path.display()))?;

        let handle = self.allocate_handle::<K>();
        let storage = self.storage_mut::<K>()?;
        storage.insert(
            handle.value(),
            Record {
                cpu,
                gpu: None,
                options,
                path: Some(abs_path.clone()),
            },
        );
        storage.path_index.insert(abs_path.clone(), handle.value());
        log::info!(
            target: targets::RESOURCE_MANAGER,
            "Loaded {} {} from '{}'",
            K::NAME,
            handle,
            abs_path.display()
        );
        Ok(handle)
    }

    /// Maps a root-relative path to a normalized absolute path inside the root.
    pub fn resolve_relative_path(&self, rel_path: &Path) -> Result<PathBuf> {
        if rel_path.as_os_str().is_empty() {
            return Err(LumenError::invalid_argument("resource path must not be empty"));
        }
        if rel_path.is_absolute() || rel_path.has_root() {
            return Err(LumenError::invalid_argument(format!(
                "resource path '{}' must be relative to the resource root",
                rel_path.display()
            )));
        }
        let resolved = lexically_normal(&self.root_dir.join(rel_path));
        if !resolved.starts_with(&self.root_dir) || resolved == self.root_dir {
            return Err(LumenError::invalid_argument(format!(
                "resource path '{}' escapes the resource root '{}'",
                rel_path.display(),
                self.root_dir.display()
            )));
        }
        Ok(resolved)
    }

    /// Writes the CPU payload of `handle` to `rel_path` below the root.
    pub fn save_cpu_to_relative_path<K: ResourceKind>(
        &self,
        handle: Handle<K>,
        rel_path: impl AsRef<Path>,
    ) -> Result<()> {
        let abs_path = self.resolve_relative_path(rel_path.as_ref())?;
        let cpu = self.cpu(handle)?;
        if let Some(parent) = abs_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LumenError::io(parent, source))?;
        }
        K::save_to_path(cpu, &abs_path)
    }

    // ========================================================================
    // Access
    // ========================================================================

    #[must_use]
    pub fn alive<K: ResourceKind>(&self, handle: Handle<K>) -> bool {
        handle.is_valid()
            && self
                .storage::<K>()
                .is_some_and(|storage| storage.contains(handle.value()))
    }

    fn record<K: ResourceKind>(&self, handle: Handle<K>) -> Result<&Record<K>> {
        if !handle.is_valid() {
            return Err(LumenError::invalid_argument(format!("invalid {} handle", K::NAME)));
        }
        self.storage::<K>()
            .and_then(|storage| storage.get(handle.value()))
            .ok_or_else(|| LumenError::not_found(format!("{} handle {handle} is not alive", K::NAME)))
    }

    pub fn cpu<K: ResourceKind>(&self, handle: Handle<K>) -> Result<&K::Cpu> {
        self.record(handle).map(|record| &record.cpu)
    }

    pub fn options<K: ResourceKind>(&self, handle: Handle<K>) -> Result<&K::Options> {
        self.record(handle).map(|record| &record.options)
    }

    /// Normalized absolute source path of a file-backed resource.
    #[must_use]
    pub fn path_of<K: ResourceKind>(&self, handle: Handle<K>) -> Option<&Path> {
        self.record(handle).ok()?.path.as_deref()
    }

    /// Cached GPU object, without uploading.
    #[must_use]
    pub fn gpu<K: ResourceKind>(&self, handle: Handle<K>) -> Option<&K::Gpu> {
        self.record(handle).ok()?.gpu.as_ref()
    }

    /// Uploads on first demand and returns the cached GPU object afterwards.
    pub fn require_gpu<K: ResourceKind>(&mut self, handle: Handle<K>, device: &dyn Device) -> Result<&K::Gpu> {
        if !handle.is_valid() {
            return Err(LumenError::invalid_argument(format!("invalid {} handle", K::NAME)));
        }
        let storage = self.storage_mut::<K>()?;
        let record = storage
            .get_mut(handle.value())
            .ok_or_else(|| LumenError::not_found(format!("{} handle {handle} is not alive", K::NAME)))?;

        if record.gpu.is_none() {
            let gpu = K::upload_to_gpu(device, &record.cpu, &record.options)
                .with_context(|| format!("upload of {} {handle} failed", K::NAME))?;
            log::debug!(target: targets::RESOURCE_MANAGER, "Uploaded {} {handle}", K::NAME);
            record.gpu = Some(gpu);
        }
        record
            .gpu
            .as_ref()
            .ok_or_else(|| LumenError::invariant(format!("{} {handle} has no GPU object after upload", K::NAME)))
    }

    #[must_use]
    pub fn live_count<K: ResourceKind>(&self) -> usize {
        self.storage::<K>().map_or(0, |storage| storage.len())
    }

    /// Retired GPU objects still waiting for their frame deadline, all kinds.
    #[must_use]
    pub fn retired_count(&self) -> usize {
        self.storages.values().map(|storage| storage.retired_len()).sum()
    }

    // ========================================================================
    // Lifetime
    // ========================================================================

    /// Removes `handle`. A cached GPU object is retired, not destroyed.
    /// Unloading a dead handle is a no-op.
    pub fn unload<K: ResourceKind>(&mut self, handle: Handle<K>) {
        if !handle.is_valid() {
            return;
        }
        let retire_after = self.current_frame_serial + u64::from(self.frames_in_flight);
        let Ok(storage) = self.storage_mut::<K>() else {
            return;
        };
        let id = handle.value();
        let Some(record) = storage.remove(id) else {
            log::warn!(target: targets::RESOURCE_MANAGER, "Unload of dead {} handle {handle} ignored", K::NAME);
            return;
        };

        if let Some(path) = &record.path
            && storage.path_index.get(path) == Some(&id)
        {
            storage.path_index.remove(path);
        }
        if let Some(gpu) = record.gpu {
            storage.retired.push(Retired {
                gpu,
                retire_after_frame_serial: retire_after,
            });
            log::debug!(
                target: targets::RESOURCE_MANAGER,
                "Retired GPU object of {} {handle} until frame {retire_after}",
                K::NAME
            );
        }
    }

    /// Advances the frame serial and destroys retired objects that are due.
    pub fn tick(&mut self, frame_serial: u64) -> usize {
        self.current_frame_serial = frame_serial;
        let mut destroyed = 0;
        for storage in self.storages.values_mut() {
            let count = storage.collect_retired(frame_serial);
            if count > 0 {
                log::debug!(
                    target: targets::RESOURCE_MANAGER,
                    "Destroyed {count} retired {} GPU object(s) at frame {frame_serial}",
                    storage.kind_name()
                );
            }
            destroyed += count;
        }
        destroyed
    }

    /// Releases every GPU object. The caller guarantees the device is idle.
    /// CPU records and path mappings survive.
    pub fn flush_after_wait_idle(&mut self) -> usize {
        let released: usize = self.storages.values_mut().map(|storage| storage.flush_gpu()).sum();
        log::info!(target: targets::RESOURCE_MANAGER, "Flushed {released} GPU object(s) after wait idle");
        released
    }
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("root_dir", &self.root_dir)
            .field("frames_in_flight", &self.frames_in_flight)
            .field("current_frame_serial", &self.current_frame_serial)
            .field("kinds", &self.storages.len())
            .finish()
    }
}
