//! Error types for session store operations.

/// Error type for session store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The session key cannot be turned into a safe snapshot filename.
    #[error("Invalid session key for snapshot: {0:?}")]
    InvalidKey(String),

    /// Reading or writing a snapshot failed.
    #[error("Session I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A snapshot could not be encoded.
    #[error("Session serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A semantic memory operation requested through the store failed.
    #[error("Semantic memory error: {0}")]
    Semantic(#[from] mnemo_memory::MemoryError),

    /// The background indexer is not running.
    #[error("Semantic indexer is not running")]
    IndexerStopped,
}

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, Error>;
