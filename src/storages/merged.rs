use std::collections::HashMap;
use std::sync::Arc;

use super::{ReadableDynamicStorage, ReadableStorage};
use crate::Value;

/// A read-only view over several stores.
///
/// Lookups return the value from the first store that has the key, while
/// [`dictionary`](ReadableDynamicStorage::dictionary) folds the stores left
/// to right so later stores win on collisions. [`count`](ReadableStorage::count)
/// is the plain sum of every store's count; keys present in several stores
/// are counted once per store.
#[derive(Clone, Default)]
pub struct MergedStorage {
    storages: Vec<Arc<dyn ReadableDynamicStorage + Send + Sync>>,
}

impl MergedStorage {
    /// Creates a view over `storages`, highest lookup priority first.
    pub fn new(storages: Vec<Arc<dyn ReadableDynamicStorage + Send + Sync>>) -> Self {
        Self { storages }
    }

    /// Appends `storage` with the lowest lookup priority so far.
    pub fn with<S>(mut self, storage: Arc<S>) -> Self
    where
        S: ReadableDynamicStorage + Send + Sync + 'static,
    {
        self.storages.push(storage);
        self
    }
}

impl ReadableStorage for MergedStorage {
    fn count(&self) -> usize {
        self.storages.iter().map(|storage| storage.count()).sum()
    }

    fn has_value(&self, key: &str) -> bool {
        self.storages.iter().any(|storage| storage.has_value(key))
    }
}

impl ReadableDynamicStorage for MergedStorage {
    fn value(&self, key: &str) -> Option<Value> {
        self.storages.iter().find_map(|storage| storage.value(key))
    }

    fn dictionary(&self) -> HashMap<String, Value> {
        self.storages
            .iter()
            .fold(HashMap::new(), |mut merged, storage| {
                merged.extend(storage.dictionary());
                merged
            })
    }
}
