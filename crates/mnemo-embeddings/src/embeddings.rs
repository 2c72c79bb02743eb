//! Embeddings support for semantic recall.
//!
//! This module provides the [`Embedder`] trait and implementations for
//! generating vector embeddings from text.
//!
//! # Implementations
//!
//! - [`MockEmbedder`]: Returns deterministic embeddings for testing
//! - [`OpenAiEmbedder`]: Any OpenAI-compatible `/embeddings` endpoint
//!   (Mistral by default)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{EmbeddingError, Result};

/// Default API base (Mistral's OpenAI-compatible endpoint).
pub const DEFAULT_API_BASE: &str = "https://api.mistral.ai/v1";

/// Default embedding model.
pub const DEFAULT_MODEL: &str = "mistral-embed";

/// Output dimensions of `mistral-embed`.
pub const DEFAULT_DIMENSIONS: usize = 1024;

/// Per-request deadline for embedding calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// ─────────────────────────────────────────────────────────────────────────────
// Embedder Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for generating text embeddings.
///
/// Embedders convert text into dense vector representations that capture
/// semantic meaning, enabling similarity search and retrieval.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts in a batch.
    ///
    /// Output order matches input order. Default implementation calls
    /// `embed` for each text sequentially.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Get the dimensionality of embeddings produced by this embedder.
    fn dimensions(&self) -> usize;

    /// Get the name of this embedder.
    fn name(&self) -> &str;
}

/// A shared embedder that can be used across threads.
pub type SharedEmbedder = Arc<dyn Embedder>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Embedder
// ─────────────────────────────────────────────────────────────────────────────

/// A mock embedder for testing purposes.
///
/// Generates deterministic embeddings based on text content, useful for
/// testing similarity search and memory retrieval without external dependencies.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dimensions: usize,
}

impl MockEmbedder {
    /// Create a new mock embedder with the specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // Same text always produces the same embedding
        let mut state = simple_hash(text);
        let mut embedding = vec![0.0f32; self.dimensions];

        for value in embedding.iter_mut() {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            *value = ((state >> 16) as f32 / 32768.0) - 1.0;
        }

        // Normalize to unit length
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Simple hash function for deterministic embedding generation.
fn simple_hash(s: &str) -> u64 {
    let mut hash: u64 = 5381;
    for byte in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(byte as u64);
    }
    hash
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI-compatible Embedder
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for an OpenAI-compatible embeddings endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedderConfig {
    /// API key for authentication. Empty means "not configured".
    pub api_key: String,
    /// Base URL for the API (without the trailing `/embeddings`).
    pub base_url: String,
    /// Model to use for embeddings.
    pub model: String,
    /// Dimensionality the model produces.
    pub dimensions: usize,
    /// Request timeout.
    pub timeout: Duration,
}

impl OpenAiEmbedderConfig {
    /// Create a new config with the given API key and Mistral defaults.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            dimensions: DEFAULT_DIMENSIONS,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set a custom base URL. Empty values keep the default.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        if !url.is_empty() {
            self.base_url = url.trim_end_matches('/').to_string();
        }
        self
    }

    /// Set the model to use. Empty values keep the default.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.is_empty() {
            self.model = model;
        }
        self
    }

    /// Set the expected output dimensions.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Client for an OpenAI-compatible embeddings API.
pub struct OpenAiEmbedder {
    client: Client,
    config: OpenAiEmbedderConfig,
}

impl OpenAiEmbedder {
    /// Create a new embedder.
    ///
    /// A missing API key is not an error here; every call fails instead.
    pub fn new(config: OpenAiEmbedderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                EmbeddingError::Internal(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, config })
    }

    /// The resolved configuration.
    pub fn config(&self) -> &OpenAiEmbedderConfig {
        &self.config
    }

    fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.config.base_url)
    }

    fn require_api_key(&self) -> Result<&str> {
        if self.config.api_key.is_empty() {
            return Err(EmbeddingError::Config(format!(
                "API key for embedding model '{}' is not configured",
                self.config.model
            )));
        }
        Ok(&self.config.api_key)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.require_api_key()?;
        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or(EmbeddingError::MissingEmbeddings {
                expected: 1,
                actual: 0,
            })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let api_key = self.require_api_key()?;

        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
            encoding_format: "float",
        };

        debug!(
            model = %self.config.model,
            count = texts.len(),
            "Requesting embeddings"
        );

        let response = self
            .client
            .post(self.embeddings_url())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status, model = %self.config.model, "Embedding request rejected");
            return Err(EmbeddingError::Backend { status, body });
        }

        let result: EmbeddingResponse = response.json().await.map_err(|e| {
            EmbeddingError::Serialization(format!("Failed to parse response: {}", e))
        })?;

        if result.data.len() < texts.len() {
            return Err(EmbeddingError::MissingEmbeddings {
                expected: texts.len(),
                actual: result.data.len(),
            });
        }

        // Sort by index to ensure correct order
        let mut embeddings = result.data;
        embeddings.sort_by_key(|e| e.index);

        Ok(embeddings.into_iter().map(|e| e.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[derive(Debug, serde::Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    encoding_format: &'static str,
}

#[derive(Debug, serde::Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, serde::Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Embedder Factory
// ─────────────────────────────────────────────────────────────────────────────

/// Provider-agnostic description of the embedder to build.
///
/// The binary populates this from the `[embedding]` config section, so this
/// crate does not depend on mnemo-config.
#[derive(Debug, Clone)]
pub struct EmbedderSpec {
    /// Provider name: "openai", "mistral", or "mock".
    pub provider: String,
    /// API key, if any.
    pub api_key: Option<String>,
    /// Model name override.
    pub model: Option<String>,
    /// Base URL override.
    pub base_url: Option<String>,
    /// Output dimensions.
    pub dimensions: Option<usize>,
}

impl Default for EmbedderSpec {
    fn default() -> Self {
        Self {
            provider: "mistral".to_string(),
            api_key: None,
            model: None,
            base_url: None,
            dimensions: None,
        }
    }
}

/// Build a [`SharedEmbedder`] from a spec.
pub fn build_embedder(spec: &EmbedderSpec) -> Result<SharedEmbedder> {
    let dims = spec.dimensions.unwrap_or(DEFAULT_DIMENSIONS);
    match spec.provider.as_str() {
        "openai" | "mistral" => {
            let api_key = spec.api_key.clone().unwrap_or_default();
            if api_key.is_empty() {
                warn!(
                    "No embedding API key configured; semantic memory writes will fail. \
                     Set MNEMO_EMBEDDING_API_KEY or [embedding] api_key."
                );
            }
            let mut config = OpenAiEmbedderConfig::new(api_key).with_dimensions(dims);
            if let Some(ref model) = spec.model {
                config = config.with_model(model);
            }
            if let Some(ref base_url) = spec.base_url {
                config = config.with_base_url(base_url);
            }
            Ok(Arc::new(OpenAiEmbedder::new(config)?))
        }
        "mock" => Ok(Arc::new(MockEmbedder::new(dims))),
        other => Err(EmbeddingError::Config(format!(
            "Unknown embedding provider '{}'. Valid: openai, mistral, mock",
            other
        ))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Utility Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Calculate cosine similarity between two embeddings.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
