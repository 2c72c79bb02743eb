//! Error types for the embeddings crate.

use thiserror::Error;

/// Result type alias using the embedding error type.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Error type for embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The provider answered with a non-success status.
    #[error("Embedding request failed: HTTP {status} - {body}")]
    Backend {
        /// HTTP status code.
        status: u16,
        /// Raw response body, verbatim.
        body: String,
    },

    /// Network/connectivity error, including deadline expiry.
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error (API key missing, unknown provider, etc.).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Response body could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The provider returned fewer vectors than were requested.
    #[error("No embeddings returned: expected {expected}, got {actual}")]
    MissingEmbeddings { expected: usize, actual: usize },

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EmbeddingError {
    /// Returns true if retrying the same request could succeed.
    ///
    /// The clients never retry on their own; this only informs callers.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Backend { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EmbeddingError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            EmbeddingError::Network(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            EmbeddingError::Serialization(err.to_string())
        } else {
            EmbeddingError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for EmbeddingError {
    fn from(err: serde_json::Error) -> Self {
        EmbeddingError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(EmbeddingError::Network("timeout".to_string()).is_retryable());
        assert!(
            EmbeddingError::Backend {
                status: 503,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(
            EmbeddingError::Backend {
                status: 429,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(
            !EmbeddingError::Backend {
                status: 401,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(!EmbeddingError::Config("no key".to_string()).is_retryable());
    }

    #[test]
    fn test_backend_error_keeps_body() {
        let err = EmbeddingError::Backend {
            status: 400,
            body: r#"{"message":"bad input"}"#.to_string(),
        };
        assert!(err.to_string().contains("bad input"));
        assert!(err.to_string().contains("400"));
    }
}
