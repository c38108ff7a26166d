//! Error type shared by all storage backends.

/// Errors that can occur while reading or writing scoped storage.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An underlying file operation failed.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be serialized or deserialized.
    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The in-memory backend's lock was poisoned by a panicking writer.
    #[error("Storage lock poisoned")]
    Poisoned,
}
