//! Error types for the memory crate.

use mnemo_embeddings::EmbeddingError;
use thiserror::Error;

use crate::vector::VectorError;

/// Errors that can occur in the memory crate.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Generating an embedding failed.
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// A vector database call failed.
    #[error("Vector database error: {0}")]
    Vector(#[from] VectorError),

    /// The collection could not be verified or created at startup.
    #[error("Failed to ensure collection '{collection}': {source}")]
    CollectionSetup {
        collection: String,
        #[source]
        source: VectorError,
    },

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored payload could not be turned back into a message.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// A recall query was rejected before reaching the store.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Semantic memory is not configured.
    #[error("Semantic memory is not enabled")]
    Disabled,
}

/// Result type alias for memory operations.
pub type Result<T> = std::result::Result<T, MemoryError>;
