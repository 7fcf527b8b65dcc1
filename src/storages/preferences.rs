use std::collections::HashMap;
use std::path::Path;

use log::warn;
use sled::Db;

use super::{DynamicStorage, ReadableDynamicStorage, ReadableStorage, Storage};
use crate::{Result, Value};

/// User preferences persisted in a `sled` database.
///
/// `sled::Db` is internally `Arc`-based, so instances opened from the same
/// `Db` share every write immediately. Values are kept as JSON.
#[derive(Clone)]
pub struct PreferencesStorage {
    db: Db,
}

impl PreferencesStorage {
    /// Creates a `PreferencesStorage` from an already-opened sled `Db`.
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Opens (creating if needed) the preferences database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(sled::open(path)?))
    }

    /// Flushes pending writes to disk.
    pub fn synchronize(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn decode(key: &[u8], bytes: &[u8]) -> Option<Value> {
        match serde_json::from_slice(bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(
                    "Undecodable preference {}: {}",
                    String::from_utf8_lossy(key),
                    e
                );
                None
            }
        }
    }
}

impl ReadableStorage for PreferencesStorage {
    fn count(&self) -> usize {
        self.db.len()
    }

    fn has_value(&self, key: &str) -> bool {
        self.value(key).is_some()
    }
}

impl ReadableDynamicStorage for PreferencesStorage {
    fn value(&self, key: &str) -> Option<Value> {
        match self.db.get(key.as_bytes()) {
            Ok(Some(ivec)) => Self::decode(key.as_bytes(), &ivec),
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read preference {}: {}", key, e);
                None
            }
        }
    }

    fn dictionary(&self) -> HashMap<String, Value> {
        self.db
            .iter()
            .filter_map(|entry| match entry {
                Ok(pair) => Some(pair),
                Err(e) => {
                    warn!("Failed to iterate preferences: {}", e);
                    None
                }
            })
            .filter_map(|(key, bytes)| {
                let value = Self::decode(&key, &bytes)?;
                let key = String::from_utf8(key.to_vec()).ok()?;
                Some((key, value))
            })
            .collect()
    }
}

impl Storage for PreferencesStorage {
    fn remove_value(&self, key: &str) -> bool {
        match self.db.remove(key.as_bytes()) {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to remove preference {}: {}", key, e);
                false
            }
        }
    }

    fn remove_all(&self) -> bool {
        let cleared = self.db.clear().and_then(|()| self.db.flush().map(|_| ()));
        match cleared {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to clear preferences: {}", e);
                false
            }
        }
    }
}

impl DynamicStorage for PreferencesStorage {
    fn set(&self, value: Value, key: &str) -> bool {
        // JSON writes NaN and infinities as `null`, which does not decode.
        if !value.is_finite() {
            warn!("Rejected preference {}: non-finite double", key);
            return false;
        }
        let bytes = match serde_json::to_vec(&value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to encode preference {}: {}", key, e);
                return false;
            }
        };
        match self.db.insert(key.as_bytes(), bytes) {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to write preference {}: {}", key, e);
                false
            }
        }
    }
}

impl Drop for PreferencesStorage {
    fn drop(&mut self) {
        if let Err(e) = self.db.flush() {
            warn!("Failed to synchronize preferences: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ReadableTypedStorage, TypedStorage};
    use tempfile::TempDir;

    #[test]
    fn values_survive_reopen() {
        let temp_dir = TempDir::new().expect("unable to create temporary working directory");
        {
            let storage = PreferencesStorage::open(temp_dir.path()).unwrap();
            assert!(storage.set_string("dark", "theme"));
            assert!(storage.set_int(3, "launches"));
        }
        let storage = PreferencesStorage::open(temp_dir.path()).unwrap();
        assert_eq!(storage.string_value("theme").as_deref(), Some("dark"));
        assert_eq!(storage.int_value("launches"), Some(3));
        assert_eq!(storage.count(), 2);
    }

    #[test]
    fn non_finite_doubles_are_rejected() {
        let temp_dir = TempDir::new().expect("unable to create temporary working directory");
        let storage = PreferencesStorage::open(temp_dir.path()).unwrap();
        assert!(!storage.set_double(f64::INFINITY, "ratio"));
        assert!(!storage.set(Value::Array(vec![Value::from(f64::NAN)]), "list"));
        assert!(!storage.has_value("ratio"));
        assert_eq!(storage.count(), 0);
    }

    #[test]
    fn clones_share_writes() {
        let temp_dir = TempDir::new().expect("unable to create temporary working directory");
        let storage = PreferencesStorage::open(temp_dir.path()).unwrap();
        let other = storage.clone();
        storage.set_bool(true, "onboarded");
        assert_eq!(other.bool_value("onboarded"), Some(true));
        assert!(other.remove_all());
        assert!(!storage.has_value("onboarded"));
    }
}
