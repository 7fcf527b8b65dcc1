use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;

use super::{DynamicStorage, ReadableDynamicStorage, ReadableStorage, Storage};
use crate::Value;

/// A key-value store synchronized across devices by the host platform.
///
/// Implementations are expected to be cheap to call and to buffer writes
/// until [`synchronize`](Self::synchronize).
pub trait UbiquitousKeyValueStore: Send + Sync {
    /// Gets the value stored under `key`.
    fn value(&self, key: &str) -> Option<Value>;

    /// Stores `value` under `key`.
    fn set(&self, value: Value, key: &str);

    /// Removes the value stored under `key`.
    fn remove(&self, key: &str);

    /// Returns every stored pair.
    fn dictionary_representation(&self) -> HashMap<String, Value>;

    /// Pushes buffered changes to the sync service.
    ///
    /// Returns `false` if the changes could not be handed over.
    fn synchronize(&self) -> bool;
}

/// Offline [`UbiquitousKeyValueStore`] that never leaves the process.
///
/// Used when the host does not provide a sync service.
#[derive(Debug, Default)]
pub struct InMemoryUbiquitousStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl UbiquitousKeyValueStore for InMemoryUbiquitousStore {
    fn value(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, value: Value, key: &str) {
        self.entries.write().insert(key.to_owned(), value);
    }

    fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }

    fn dictionary_representation(&self) -> HashMap<String, Value> {
        self.entries.read().clone()
    }

    fn synchronize(&self) -> bool {
        true
    }
}

/// Store shared across devices through a [`UbiquitousKeyValueStore`].
pub struct UbiquitousStorage {
    store: Arc<dyn UbiquitousKeyValueStore>,
}

impl UbiquitousStorage {
    /// Creates a storage delegating to `store`.
    pub fn new(store: Arc<dyn UbiquitousKeyValueStore>) -> Self {
        Self { store }
    }
}

impl Default for UbiquitousStorage {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryUbiquitousStore::default()))
    }
}

impl ReadableStorage for UbiquitousStorage {
    fn count(&self) -> usize {
        self.store.dictionary_representation().len()
    }

    fn has_value(&self, key: &str) -> bool {
        self.store.value(key).is_some()
    }
}

impl ReadableDynamicStorage for UbiquitousStorage {
    fn value(&self, key: &str) -> Option<Value> {
        self.store.value(key)
    }

    fn dictionary(&self) -> HashMap<String, Value> {
        self.store.dictionary_representation()
    }
}

impl Storage for UbiquitousStorage {
    fn remove_value(&self, key: &str) -> bool {
        self.store.remove(key);
        true
    }

    fn remove_all(&self) -> bool {
        for key in self.store.dictionary_representation().keys() {
            self.store.remove(key);
        }
        self.store.synchronize();
        true
    }
}

impl DynamicStorage for UbiquitousStorage {
    fn set(&self, value: Value, key: &str) -> bool {
        self.store.set(value, key);
        true
    }
}

impl Drop for UbiquitousStorage {
    fn drop(&mut self) {
        if !self.store.synchronize() {
            debug!("Ubiquitous store did not accept final synchronization");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingStore {
        inner: InMemoryUbiquitousStore,
        syncs: AtomicUsize,
    }

    impl UbiquitousKeyValueStore for CountingStore {
        fn value(&self, key: &str) -> Option<Value> {
            self.inner.value(key)
        }

        fn set(&self, value: Value, key: &str) {
            self.inner.set(value, key)
        }

        fn remove(&self, key: &str) {
            self.inner.remove(key)
        }

        fn dictionary_representation(&self) -> HashMap<String, Value> {
            self.inner.dictionary_representation()
        }

        fn synchronize(&self) -> bool {
            self.syncs.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn remove_all_and_drop_synchronize() {
        let store = Arc::new(CountingStore::default());
        let storage = UbiquitousStorage::new(store.clone());
        storage.set(Value::from(1i64), "a");
        storage.set(Value::from(2i64), "b");

        assert!(storage.remove_all());
        assert_eq!(storage.count(), 0);
        assert_eq!(store.syncs.load(Ordering::SeqCst), 1);

        drop(storage);
        assert_eq!(store.syncs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn instances_over_same_store_share_writes() {
        let store: Arc<dyn UbiquitousKeyValueStore> = Arc::new(InMemoryUbiquitousStore::default());
        let first = UbiquitousStorage::new(store.clone());
        let second = UbiquitousStorage::new(store);
        first.set(Value::from("synced"), "k");
        assert_eq!(second.value("k"), Some(Value::from("synced")));
    }
}
