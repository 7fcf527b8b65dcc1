#![deny(missing_docs)]

//! Cross-backend key-value storage.
//!
//! A small set of read/write contracts ([`ReadableStorage`],
//! [`TypedStorage`], [`DynamicStorage`], ...) implemented by an in-memory
//! map, a preferences database, a cloud-synced store, a secure vault, and
//! property list files cached in memory and flushed to disk in the
//! background. [`MergedStorage`] layers several readable stores into one
//! view, and [`Storages`] wires the well-known stores of an application.

mod debounce;
mod error;
mod registry;
/// Store contracts and backends.
pub mod storages;
mod value;

pub use error::{Result, StorageError};
pub use registry::{StorageConfig, Storages};
pub use storages::{
    DynamicStorage, KeychainStorage, MemoryStorage, MergedStorage, PlistFormat, PlistStorage,
    PreferencesStorage, ReadOnlyPlistStorage, ReadableDynamicStorage, ReadableStorage,
    ReadableTypedStorage, Storage, TypedStorage, UbiquitousStorage,
};
pub use value::{Number, Value};
