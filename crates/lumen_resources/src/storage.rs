use std::any::Any;
use std::path::PathBuf;

use rustc_hash::FxHashMap;
use slotmap::{DefaultKey, SlotMap};

use crate::kind::ResourceKind;

pub(crate) struct Record<K: ResourceKind> {
    pub cpu: K::Cpu,
    pub gpu: Option<K::Gpu>,
    pub options: K::Options,
    pub path: Option<PathBuf>,
}

pub(crate) struct Retired<G> {
    pub gpu: G,
    pub retire_after_frame_serial: u64,
}

// Per-kind records plus the path dedup index and the retirement queue.
// Records live in a slot map; `keys` maps handle values to slots.
pub(crate) struct KindStorage<K: ResourceKind> {
    records: SlotMap<DefaultKey, Record<K>>,
    keys: FxHashMap<u64, DefaultKey>,
    pub path_index: FxHashMap<PathBuf, u64>,
    pub retired: Vec<Retired<K::Gpu>>,
}

impl<K: ResourceKind> Default for KindStorage<K> {
    fn default() -> Self {
        Self {
            records: SlotMap::with_key(),
            keys: FxHashMap::default(),
            path_index: FxHashMap::default(),
            retired: Vec::new(),
        }
    }
}

impl<K: ResourceKind> KindStorage<K> {
    pub fn insert(&mut self, id: u64, record: Record<K>) {
        let key = self.records.insert(record);
        self.keys.insert(id, key);
    }

    pub fn contains(&self, id: u64) -> bool {
        self.keys.contains_key(&id)
    }

    pub fn get(&self, id: u64) -> Option<&Record<K>> {
        self.records.get(*self.keys.get(&id)?)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut Record<K>> {
        self.records.get_mut(*self.keys.get(&id)?)
    }

    pub fn remove(&mut self, id: u64) -> Option<Record<K>> {
        let key = self.keys.remove(&id)?;
        self.records.remove(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

// Kind-independent operations the manager runs over every storage.
pub(crate) trait ErasedStorage: Any {
    fn kind_name(&self) -> &'static str;

    /// Drops retired GPU objects whose deadline is `<= frame_serial`.
    fn collect_retired(&mut self, frame_serial: u64) -> usize;

    /// Drops every retired and every cached GPU object.
    fn flush_gpu(&mut self) -> usize;

    fn retired_len(&self) -> usize;
}

impl<K: ResourceKind> ErasedStorage for KindStorage<K> {
    fn kind_name(&self) -> &'static str {
        K::NAME
    }

    fn collect_retired(&mut self, frame_serial: u64) -> usize {
        let before = self.retired.len();
        self.retired
            .retain(|entry| entry.retire_after_frame_serial > frame_serial);
        before - self.retired.len()
    }

    fn flush_gpu(&mut self) -> usize {
        let mut released = self.retired.len();
        self.retired.clear();
        for record in self.records.values_mut() {
            if record.gpu.take().is_some() {
                released += 1;
            }
        }
        released
    }

    fn retired_len(&self) -> usize {
        self.retired.len()
    }
}
