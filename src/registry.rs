use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use directories::ProjectDirs;
use log::{debug, info};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::storages::{
    AccessPolicy, DynamicStorage, InMemoryUbiquitousStore, KeychainStorage, MemoryStorage,
    PlistStorage, PreferencesStorage, ReadOnlyPlistStorage, SecureItemStore, TypedStorage,
    UbiquitousKeyValueStore, UbiquitousStorage,
};
use crate::Result;

/// Settings for the well-known stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Namespace of secure items. Defaults to the executable name.
    pub app_identifier: Option<String>,
    /// Directory of the preferences database.
    pub preferences_path: PathBuf,
    /// Directory searched for named read-only property lists.
    pub resources_dir: PathBuf,
    /// Debounce window of read/write property lists, in milliseconds.
    pub debounce_window_ms: u64,
    /// Group shared with cooperating applications for secure items.
    pub keychain_access_group: Option<String>,
    /// Accessibility of secure items.
    pub keychain_access_policy: AccessPolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let preferences_path = ProjectDirs::from("", "", env!("CARGO_PKG_NAME"))
            .map(|dirs| dirs.data_dir().join("preferences"))
            .unwrap_or_else(|| PathBuf::from("preferences"));
        Self {
            app_identifier: None,
            preferences_path,
            resources_dir: PathBuf::from("."),
            debounce_window_ms: 1000,
            keychain_access_group: None,
            keychain_access_policy: AccessPolicy::default(),
        }
    }
}

impl StorageConfig {
    /// Reads a JSON configuration file. Missing fields take default values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Debounce window of read/write property lists.
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }
}

/// The well-known stores of an application.
///
/// Build one at startup and hand it (or the stores it exposes) to the
/// components that need them.
pub struct Storages {
    config: StorageConfig,
    local: Arc<dyn DynamicStorage + Send + Sync>,
    temp: Arc<dyn DynamicStorage + Send + Sync>,
    remote: Arc<dyn DynamicStorage + Send + Sync>,
    secure: Arc<dyn TypedStorage + Send + Sync>,
    plists: Mutex<HashMap<String, Arc<ReadOnlyPlistStorage>>>,
}

impl Storages {
    /// Builds the stores using the platform vault and an offline sync store.
    ///
    /// # Errors
    ///
    /// Fails if the preferences database cannot be opened.
    pub fn new(config: StorageConfig) -> Result<Self> {
        Self::with_backends(
            config,
            Arc::new(InMemoryUbiquitousStore::default()),
            default_vault(),
        )
    }

    /// Builds the stores over the given sync service and vault.
    pub fn with_backends(
        config: StorageConfig,
        ubiquitous: Arc<dyn UbiquitousKeyValueStore>,
        vault: Arc<dyn SecureItemStore>,
    ) -> Result<Self> {
        let local = PreferencesStorage::open(&config.preferences_path)?;
        info!("Preferences at {}", config.preferences_path.display());

        let mut secure =
            KeychainStorage::new(vault).with_access_policy(config.keychain_access_policy);
        if let Some(identifier) = &config.app_identifier {
            secure = secure.with_identifier(identifier.clone());
        }
        if let Some(group) = &config.keychain_access_group {
            secure = secure.with_access_group(group.clone());
        }

        Ok(Self {
            local: Arc::new(local),
            temp: Arc::new(MemoryStorage::new()),
            remote: Arc::new(UbiquitousStorage::new(ubiquitous)),
            secure: Arc::new(secure),
            plists: Mutex::new(HashMap::new()),
            config,
        })
    }

    /// Persistent across launches.
    pub fn local(&self) -> &Arc<dyn DynamicStorage + Send + Sync> {
        &self.local
    }

    /// Lives as long as this registry.
    pub fn temp(&self) -> &Arc<dyn DynamicStorage + Send + Sync> {
        &self.temp
    }

    /// Shared across the user's devices.
    pub fn remote(&self) -> &Arc<dyn DynamicStorage + Send + Sync> {
        &self.remote
    }

    /// Persistent and readable only by this application (or its group).
    pub fn secure(&self) -> &Arc<dyn TypedStorage + Send + Sync> {
        &self.secure
    }

    /// Read-only property list `<resources_dir>/<name>.plist`.
    ///
    /// Loaded on first request and kept for the life of the registry. A
    /// failed load returns `None` and is retried on the next request.
    pub fn plist(&self, name: &str) -> Option<Arc<ReadOnlyPlistStorage>> {
        let mut plists = self.plists.lock();
        if let Some(storage) = plists.get(name) {
            return Some(storage.clone());
        }
        let storage = Arc::new(ReadOnlyPlistStorage::open_resource(
            name,
            &self.config.resources_dir,
        )?);
        debug!("Cached resource {}", name);
        plists.insert(name.to_owned(), storage.clone());
        Some(storage)
    }

    /// Opens a read/write property list with the configured debounce window.
    pub fn open_plist(&self, path: impl Into<PathBuf>) -> Result<PlistStorage> {
        PlistStorage::with_window(path, self.config.debounce_window())
    }

    /// Configuration the stores were built from.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }
}

#[cfg(feature = "keychain")]
fn default_vault() -> Arc<dyn SecureItemStore> {
    Arc::new(crate::storages::KeyringVault::new())
}

#[cfg(not(feature = "keychain"))]
fn default_vault() -> Arc<dyn SecureItemStore> {
    debug!("No OS vault compiled in, secure items live in memory");
    Arc::new(crate::storages::MemoryVault::new())
}
