//! Text embedding clients for the mnemo memory subsystem.
//!
//! The core abstraction is the [`Embedder`] trait, which turns text into
//! fixed-length vectors. The semantic memory store only ever talks to a
//! [`SharedEmbedder`], so the remote provider can be swapped for the
//! deterministic [`MockEmbedder`] in tests.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Embedder trait                         │
//! │  - embed(text) -> Vec<f32>              │
//! │  - embed_batch(texts) -> Vec<Vec<f32>>  │
//! └─────────────────────────────────────────┘
//!                    │
//!          ┌─────────┴─────────┐
//!          ▼                   ▼
//!   ┌────────────────┐  ┌──────────┐
//!   │ OpenAiEmbedder │  │   Mock   │
//!   │ (Mistral, ...) │  └──────────┘
//!   └────────────────┘
//! ```

pub mod embeddings;
pub mod error;

pub use embeddings::{
    DEFAULT_API_BASE, DEFAULT_DIMENSIONS, DEFAULT_MODEL, Embedder, EmbedderSpec, MockEmbedder,
    OpenAiEmbedder, OpenAiEmbedderConfig, SharedEmbedder, build_embedder, cosine_similarity,
};
pub use error::{EmbeddingError, Result};
