use std::collections::HashMap;

use parking_lot::RwLock;

use super::{DynamicStorage, ReadableDynamicStorage, ReadableStorage, Storage};
use crate::Value;

/// A process-local store that lives as long as the value holding it.
///
/// Every mutation succeeds.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl From<HashMap<String, Value>> for MemoryStorage {
    fn from(entries: HashMap<String, Value>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }
}

impl ReadableStorage for MemoryStorage {
    fn count(&self) -> usize {
        self.entries.read().len()
    }

    fn has_value(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }
}

impl ReadableDynamicStorage for MemoryStorage {
    fn value(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    fn dictionary(&self) -> HashMap<String, Value> {
        self.entries.read().clone()
    }
}

impl Storage for MemoryStorage {
    fn remove_value(&self, key: &str) -> bool {
        self.entries.write().remove(key);
        true
    }

    fn remove_all(&self) -> bool {
        self.entries.write().clear();
        true
    }
}

impl DynamicStorage for MemoryStorage {
    fn set(&self, value: Value, key: &str) -> bool {
        self.entries.write().insert(key.to_owned(), value);
        true
    }
}
