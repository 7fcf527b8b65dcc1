use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error};
use parking_lot::{Mutex, RwLock};

use super::{DynamicStorage, ReadableDynamicStorage, ReadableStorage, Storage};
use crate::debounce::Debouncer;
use crate::{Result, StorageError, Value};

mod format;
mod openstep;

pub use self::format::PlistFormat;

/// Delay between the last mutation and the write to disk.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_secs(1);

const PLIST_EXTENSION: &str = "plist";

/// In-memory mirror of a property list file.
struct PlistFile {
    path: PathBuf,
    cache: RwLock<HashMap<String, Value>>,
    /// Format of the file as last read or written.
    format: Mutex<PlistFormat>,
}

impl PlistFile {
    /// Reads and decodes the file at `path`.
    fn load(path: PathBuf) -> Result<Self> {
        let bytes = fs::read(&path)?;
        let (entries, format) =
            format::decode(&bytes)?.ok_or_else(|| StorageError::InvalidRoot(path.clone()))?;
        debug!(
            "Loaded {} entries from {} ({})",
            entries.len(),
            path.display(),
            format
        );
        Ok(Self {
            path,
            cache: RwLock::new(entries),
            format: Mutex::new(format),
        })
    }

    /// Writes the current cache to disk.
    ///
    /// Holding the format lock for the whole write keeps concurrent persists
    /// ordered, so a later persist always writes a later snapshot.
    fn persist(&self) -> Result<()> {
        let mut format = self.format.lock();
        let snapshot = self.cache.read().clone();
        let selected = format.select(&snapshot)?;
        if selected != *format {
            debug!(
                "Switching {} from {} to {}",
                self.path.display(),
                *format,
                selected
            );
        }
        write_atomically(&self.path, &selected.encode(&snapshot)?)?;
        *format = selected;
        debug!("Persisted {} entries to {}", snapshot.len(), self.path.display());
        Ok(())
    }
}

/// Checks that `path` names a `.plist` file.
fn validate(path: &Path) -> Result<()> {
    if path.file_name().is_none() || path.is_dir() {
        return Err(StorageError::InvalidPath(path.to_owned()));
    }
    if path.extension().and_then(|ext| ext.to_str()) != Some(PLIST_EXTENSION) {
        return Err(StorageError::InvalidExtension(path.to_owned()));
    }
    Ok(())
}

/// Replaces the file at `path` with `bytes` via a sibling temporary file.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("plist.tmp");
    let written = File::create(&tmp_path)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp_path, path));
    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_file(&tmp_path) {
            debug!("Failed to remove {}: {}", tmp_path.display(), cleanup);
        }
        return Err(e.into());
    }
    Ok(())
}

/// A read/write store over a property list file.
///
/// Reads and writes go to an in-memory cache. Each mutation schedules a
/// write of the whole cache that happens once no further mutation arrived
/// for the debounce window, so a burst of mutations costs one disk write.
/// Mutations made inside the window are lost if the process dies before it
/// elapses. Dropping the store writes the cache one last time.
///
/// Only one instance may work on a given file: instances do not see each
/// other's changes and the last one to persist wins.
pub struct PlistStorage {
    file: Arc<PlistFile>,
    // Dropped before the final persist.
    debouncer: Option<Debouncer>,
}

impl PlistStorage {
    /// Opens the property list at `path`, creating an empty one if needed.
    ///
    /// # Errors
    ///
    /// Fails if `path` is not a `.plist` file path, if the file cannot be
    /// read or created, or if its root is not a dictionary.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_window(path, DEFAULT_DEBOUNCE_WINDOW)
    }

    /// Like [`open`](Self::open), persisting `window` after the last mutation.
    pub fn with_window(path: impl Into<PathBuf>, window: Duration) -> Result<Self> {
        let path = path.into();
        validate(&path)?;
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            write_atomically(&path, &PlistFormat::Xml.encode(&HashMap::new())?)?;
            debug!("Created {}", path.display());
        }

        let file = Arc::new(PlistFile::load(path)?);
        let worker_file = Arc::clone(&file);
        let debouncer = Debouncer::new("plist-persist", window, move || {
            if let Err(e) = worker_file.persist() {
                error!("Failed to persist {}: {}", worker_file.path.display(), e);
            }
        })?;

        Ok(Self {
            file,
            debouncer: Some(debouncer),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.file.path
    }

    /// Format the backing file was last read or written in.
    pub fn format(&self) -> PlistFormat {
        *self.file.format.lock()
    }

    /// Writes the cache to disk now.
    pub fn flush(&self) -> Result<()> {
        self.file.persist()
    }

    fn schedule_persist(&self) {
        if let Some(debouncer) = &self.debouncer {
            debouncer.trigger();
        }
    }
}

impl ReadableStorage for PlistStorage {
    fn count(&self) -> usize {
        self.file.cache.read().len()
    }

    fn has_value(&self, key: &str) -> bool {
        self.file.cache.read().contains_key(key)
    }
}

impl ReadableDynamicStorage for PlistStorage {
    fn value(&self, key: &str) -> Option<Value> {
        self.file.cache.read().get(key).cloned()
    }

    fn dictionary(&self) -> HashMap<String, Value> {
        self.file.cache.read().clone()
    }
}

impl Storage for PlistStorage {
    fn remove_value(&self, key: &str) -> bool {
        self.file.cache.write().remove(key);
        self.schedule_persist();
        true
    }

    fn remove_all(&self) -> bool {
        self.file.cache.write().clear();
        self.schedule_persist();
        true
    }
}

impl DynamicStorage for PlistStorage {
    fn set(&self, value: Value, key: &str) -> bool {
        self.file.cache.write().insert(key.to_owned(), value);
        self.schedule_persist();
        true
    }
}

impl Drop for PlistStorage {
    fn drop(&mut self) {
        drop(self.debouncer.take());
        if let Err(e) = self.file.persist() {
            error!("Failed to persist {} on close: {}", self.file.path.display(), e);
        }
    }
}

/// A read-only store over a property list file, loaded once.
pub struct ReadOnlyPlistStorage {
    file: PlistFile,
}

impl ReadOnlyPlistStorage {
    /// Loads the property list at `path`.
    ///
    /// # Errors
    ///
    /// Fails if `path` is not a `.plist` file path, cannot be read, or its
    /// root is not a dictionary.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        validate(&path)?;
        Ok(Self {
            file: PlistFile::load(path)?,
        })
    }

    /// Loads `<dir>/<name>.plist`, logging and returning `None` on failure.
    pub fn open_resource(name: &str, dir: impl AsRef<Path>) -> Option<Self> {
        let path = dir.as_ref().join(format!("{name}.{PLIST_EXTENSION}"));
        if !path.is_file() {
            error!("Failed to load {}: {}", name, StorageError::ResourceNotFound(name.to_owned()));
            return None;
        }
        match Self::load(path) {
            Ok(storage) => Some(storage),
            Err(e) => {
                error!("Failed to load {}: {}", name, e);
                None
            }
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.file.path
    }

    /// Format the backing file is in.
    pub fn format(&self) -> PlistFormat {
        *self.file.format.lock()
    }
}

impl ReadableStorage for ReadOnlyPlistStorage {
    fn count(&self) -> usize {
        self.file.cache.read().len()
    }

    fn has_value(&self, key: &str) -> bool {
        self.file.cache.read().contains_key(key)
    }
}

impl ReadableDynamicStorage for ReadOnlyPlistStorage {
    fn value(&self, key: &str) -> Option<Value> {
        self.file.cache.read().get(key).cloned()
    }

    fn dictionary(&self) -> HashMap<String, Value> {
        self.file.cache.read().clone()
    }
}
