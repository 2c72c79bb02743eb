//! Semantic memory: embeds messages and indexes them in a vector database.
//!
//! The store is a best-effort secondary index over the session log. When it
//! is constructed disabled, every operation succeeds without touching the
//! network and searches return nothing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mnemo_embeddings::SharedEmbedder;
use mnemo_types::Message;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{MemoryError, Result};
use crate::payload::MessagePayload;
use crate::vector::{Point, QdrantClient, QdrantConfig, ScoredPoint, VectorIndex};

/// How point identifiers are assigned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointIdStrategy {
    /// Process-local counter starting at 1. Not persisted, so ids from a
    /// previous run can be overwritten after a restart.
    #[default]
    Counter,
    /// Derived from SHA-256 of `(session_key, sequence)`, where the sequence
    /// is the message's append ordinal and never repeats within a session.
    /// Stable across restarts; re-storing the same message replaces its
    /// point.
    Hashed,
}

/// A message bound for the index.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub session_key: String,
    pub message: Message,
    pub timestamp: DateTime<Utc>,
    /// Position in the session log, recorded in the payload.
    pub index: usize,
    /// Append ordinal within the session; keys hashed point ids.
    pub sequence: u64,
}

impl StoredMessage {
    /// Queue `message` at `index` of `session_key`, stamped now. The
    /// sequence defaults to the index.
    pub fn new(session_key: impl Into<String>, message: Message, index: usize) -> Self {
        Self {
            session_key: session_key.into(),
            message,
            timestamp: Utc::now(),
            index,
            sequence: index as u64,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    fn payload(&self) -> MessagePayload {
        MessagePayload::at(
            self.session_key.clone(),
            &self.message,
            self.index,
            self.timestamp,
        )
    }
}

/// Point-id allocator. Lives behind the store's lock.
#[derive(Debug)]
struct IdAllocator {
    strategy: PointIdStrategy,
    counter: u64,
}

impl IdAllocator {
    fn new(strategy: PointIdStrategy) -> Self {
        Self {
            strategy,
            counter: 0,
        }
    }

    fn next(&mut self, session_key: &str, sequence: u64) -> u64 {
        match self.strategy {
            PointIdStrategy::Counter => {
                self.counter += 1;
                self.counter
            }
            PointIdStrategy::Hashed => hashed_point_id(session_key, sequence),
        }
    }
}

/// Deterministic point id for the `sequence`-th message appended to a
/// session.
pub fn hashed_point_id(session_key: &str, sequence: u64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(session_key.as_bytes());
    hasher.update([0u8]);
    hasher.update(sequence.to_be_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

struct Inner {
    index: Arc<dyn VectorIndex>,
    embedder: SharedEmbedder,
    ids: RwLock<IdAllocator>,
}

/// Semantic recall over stored messages.
///
/// Writes hold the allocator lock exclusively for the whole embed + upsert
/// round trip, so concurrent stores never share an id. Searches hold it
/// shared.
pub struct SemanticMemory {
    inner: Option<Inner>,
}

impl std::fmt::Debug for SemanticMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Some(inner) => f
                .debug_struct("SemanticMemory")
                .field("collection", &inner.index.collection())
                .field("embedder", &inner.embedder.name())
                .finish(),
            None => f.write_str("SemanticMemory(disabled)"),
        }
    }
}

impl SemanticMemory {
    /// A store that does nothing.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Wire up an index and embedder, making sure the collection exists.
    ///
    /// Fails with [`MemoryError::CollectionSetup`] if the database cannot be
    /// reached or refuses to create the collection.
    pub async fn connect(
        index: Arc<dyn VectorIndex>,
        embedder: SharedEmbedder,
        strategy: PointIdStrategy,
    ) -> Result<Self> {
        index
            .create_collection()
            .await
            .map_err(|source| MemoryError::CollectionSetup {
                collection: index.collection().to_string(),
                source,
            })?;

        info!(
            collection = %index.collection(),
            embedder = %embedder.name(),
            ?strategy,
            "Semantic memory enabled"
        );

        Ok(Self {
            inner: Some(Inner {
                index,
                embedder,
                ids: RwLock::new(IdAllocator::new(strategy)),
            }),
        })
    }

    /// Connect to Qdrant using `config`.
    pub async fn from_config(
        config: &QdrantConfig,
        embedder: SharedEmbedder,
        strategy: PointIdStrategy,
    ) -> Result<Self> {
        let client = QdrantClient::new(config).map_err(|source| MemoryError::CollectionSetup {
            collection: config.collection.clone(),
            source,
        })?;
        Self::connect(Arc::new(client), embedder, strategy).await
    }

    /// Whether semantic memory is configured and connected.
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Embed and index one message at position `index` of `session_key`.
    pub async fn store_message(
        &self,
        session_key: &str,
        message: &Message,
        index: usize,
    ) -> Result<()> {
        self.store(&StoredMessage::new(session_key, message.clone(), index))
            .await
    }

    /// Embed and index one queued message.
    pub async fn store(&self, stored: &StoredMessage) -> Result<()> {
        let Some(inner) = &self.inner else {
            return Ok(());
        };

        let mut ids = inner.ids.write().await;
        let vector = inner.embedder.embed(&stored.message.content).await?;
        let payload = stored.payload().to_map()?;
        let id = ids.next(&stored.session_key, stored.sequence);

        inner
            .index
            .upsert_points(vec![Point {
                id,
                vector,
                payload,
            }])
            .await?;

        debug!(
            session_key = %stored.session_key,
            index = stored.index,
            sequence = stored.sequence,
            point_id = id,
            "Indexed message"
        );
        Ok(())
    }

    /// Embed all messages in one batch call and upsert them in one request.
    pub async fn store_messages_batch(&self, messages: &[StoredMessage]) -> Result<()> {
        let Some(inner) = &self.inner else {
            return Ok(());
        };
        if messages.is_empty() {
            return Ok(());
        }

        let mut ids = inner.ids.write().await;
        let texts: Vec<&str> = messages.iter().map(|m| m.message.content.as_str()).collect();
        let vectors = inner.embedder.embed_batch(&texts).await?;
        if vectors.len() != messages.len() {
            return Err(mnemo_embeddings::EmbeddingError::MissingEmbeddings {
                expected: messages.len(),
                actual: vectors.len(),
            }
            .into());
        }

        let mut points = Vec::with_capacity(messages.len());
        for (msg, vector) in messages.iter().zip(vectors) {
            points.push(Point {
                id: ids.next(&msg.session_key, msg.sequence),
                vector,
                payload: msg.payload().to_map()?,
            });
        }

        inner.index.upsert_points(points).await?;
        debug!(count = messages.len(), "Indexed message batch");
        Ok(())
    }

    /// Messages most similar to `query`, in database rank order.
    ///
    /// Scoped to `session_key` when non-empty. Hits whose payload cannot be
    /// turned back into a message are skipped.
    pub async fn search_similar(
        &self,
        session_key: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let hits = self.search_hits(session_key, query, limit).await?;
        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                parse_hit(hit)
                    .and_then(MessagePayload::into_message)
                    .inspect_err(|e| debug!(error = %e, "Skipping unparseable search hit"))
                    .ok()
            })
            .collect())
    }

    /// Like [`SemanticMemory::search_similar`] but returns full payloads.
    pub async fn search_similar_with_payload(
        &self,
        session_key: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MessagePayload>> {
        let hits = self.search_hits(session_key, query, limit).await?;
        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                parse_hit(hit)
                    .inspect_err(|e| debug!(error = %e, "Skipping unparseable search hit"))
                    .ok()
            })
            .collect())
    }

    /// Remove every indexed message of `session_key`.
    pub async fn delete_session(&self, session_key: &str) -> Result<()> {
        let Some(inner) = &self.inner else {
            return Ok(());
        };

        let _ids = inner.ids.write().await;
        inner.index.delete_by_session_key(session_key).await?;
        debug!(session_key, "Deleted session from semantic memory");
        Ok(())
    }

    async fn search_hits(
        &self,
        session_key: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let Some(inner) = &self.inner else {
            return Ok(Vec::new());
        };
        if limit == 0 {
            return Ok(Vec::new());
        }

        let _ids = inner.ids.read().await;
        let vector = inner.embedder.embed(query).await?;
        Ok(inner.index.search(&vector, session_key, limit).await?)
    }
}

fn parse_hit(hit: ScoredPoint) -> Result<MessagePayload> {
    let payload = hit
        .payload
        .ok_or_else(|| MemoryError::InvalidPayload(format!("point {} has no payload", hit.id)))?;
    MessagePayload::from_map(payload)
}
