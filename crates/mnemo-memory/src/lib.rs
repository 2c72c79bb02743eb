//! Semantic message memory for mnemo.
//!
//! This crate keeps a secondary, best-effort index over conversation
//! messages: each eligible message is embedded and upserted into a Qdrant
//! collection so the agent can later recall related turns by meaning rather
//! than by key.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  retrieval::recall  (RecallQuery -> ranked MessagePayloads)  │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//! ┌──────────────────────────────────────────────────────────────┐
//! │  SemanticMemory                                              │
//! │  - point-id allocation (counter or hashed)                   │
//! │  - store / batch store / search / delete by session          │
//! └──────────────────────────────────────────────────────────────┘
//!              │                                  │
//!   ┌─────────────────────┐            ┌─────────────────────┐
//!   │ SharedEmbedder      │            │ VectorIndex         │
//!   │ (mnemo-embeddings)  │            │ QdrantClient / Mock │
//!   └─────────────────────┘            └─────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use mnemo_embeddings::MockEmbedder;
//! use mnemo_memory::{PointIdStrategy, QdrantConfig, RecallQuery, SemanticMemory, recall};
//! use mnemo_types::Message;
//!
//! # async fn demo() -> mnemo_memory::Result<()> {
//! let memory = SemanticMemory::from_config(
//!     &QdrantConfig::default(),
//!     Arc::new(MockEmbedder::default()),
//!     PointIdStrategy::Counter,
//! )
//! .await?;
//!
//! memory.store_message("telegram:42", &Message::user("my dog is called Rex"), 0).await?;
//! let hits = recall(&memory, "telegram:42", &RecallQuery::new("dog's name")).await?;
//! # let _ = hits;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod payload;
pub mod retrieval;
pub mod store;
pub mod vector;

pub use error::{MemoryError, Result};
pub use payload::MessagePayload;
pub use retrieval::{
    DEFAULT_RECALL_LIMIT, MAX_RECALL_LIMIT, RecallFilters, RecallQuery, clamp_limit,
    format_results, recall,
};
pub use store::{PointIdStrategy, SemanticMemory, StoredMessage, hashed_point_id};
pub use vector::{
    DEFAULT_COLLECTION, DEFAULT_VECTOR_SIZE, Point, QdrantClient, QdrantConfig, ScoredPoint,
    VectorError, VectorIndex,
};

#[cfg(any(test, feature = "testing"))]
pub use vector::MockVectorIndex;
