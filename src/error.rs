use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for storage construction and persistence.
///
/// Steady-state store operations never return this; they degrade to
/// `false` or `None` instead.
#[derive(Error, Debug)]
pub enum StorageError {
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Property list encoding/decoding error.
    #[error("Plist error: {0}")]
    Plist(#[from] plist::Error),

    /// Serialization/deserialization error.
    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Error from the preferences database.
    #[error("Sled error: {0}")]
    Sled(#[from] sled::Error),

    /// The path does not reference a file.
    #[error("Path {0} does not reference a file")]
    InvalidPath(PathBuf),

    /// The file does not carry the `plist` extension.
    #[error("File {0} is not a property list (expected .plist extension)")]
    InvalidExtension(PathBuf),

    /// The root object of the file is not a dictionary.
    #[error("Root object of {0} is not a dictionary")]
    InvalidRoot(PathBuf),

    /// None of the candidate formats can represent the content.
    #[error("Content cannot be represented in any supported plist format")]
    UnsupportedFormat,

    /// Named resource does not exist in the resources directory.
    #[error("No such resource: {0}")]
    ResourceNotFound(String),

    /// Text could not be parsed as the requested kind of value.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Background worker could not be started.
    #[error("Worker error: {0}")]
    Worker(String),
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
