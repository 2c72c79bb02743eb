//! CLI command handlers.

use std::sync::Arc;

use anyhow::Result;
use mnemo_config::{EmbeddingConfig, MnemoConfig, PointIds, VectorStoreConfig};
use mnemo_embeddings::EmbedderSpec;
use mnemo_memory::{PointIdStrategy, QdrantConfig, SemanticMemory};
use mnemo_session::SessionStore;
use tracing::warn;

pub mod check;
pub mod history;
pub mod index;
pub mod search;
pub mod sessions;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration.
    pub config: MnemoConfig,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Open the session store, connecting semantic memory if `semantic` is
    /// set and the config enables it.
    pub async fn open_store(&self, semantic: bool) -> Result<SessionStore> {
        let memory = if semantic {
            connect_semantic_memory(&self.config).await
        } else {
            Arc::new(SemanticMemory::disabled())
        };
        let dir = self.config.session().effective_storage_dir();
        Ok(SessionStore::open(dir, memory)?)
    }
}

/// Build semantic memory from config.
///
/// Any failure (disabled embeddings, bad provider, unreachable database) is
/// logged and yields a disabled store, so the session log keeps working.
pub async fn connect_semantic_memory(config: &MnemoConfig) -> Arc<SemanticMemory> {
    let vector_store = config.vector_store();
    if !vector_store.enabled {
        return Arc::new(SemanticMemory::disabled());
    }

    let embedding = config.embedding();
    if !embedding.enabled {
        warn!("Vector store is enabled but embeddings are disabled; semantic memory is off");
        return Arc::new(SemanticMemory::disabled());
    }

    let embedder = match mnemo_embeddings::build_embedder(&embedder_spec(&embedding, &vector_store))
    {
        Ok(embedder) => embedder,
        Err(e) => {
            warn!(error = %e, "Failed to build embedder; semantic memory is off");
            return Arc::new(SemanticMemory::disabled());
        }
    };

    match SemanticMemory::from_config(
        &qdrant_config(&vector_store),
        embedder,
        point_id_strategy(vector_store.point_ids),
    )
    .await
    {
        Ok(memory) => Arc::new(memory),
        Err(e) => {
            warn!(error = %e, "Semantic memory unavailable; continuing without it");
            Arc::new(SemanticMemory::disabled())
        }
    }
}

/// Map the `[vector_store]` section onto the Qdrant client config.
pub fn qdrant_config(section: &VectorStoreConfig) -> QdrantConfig {
    QdrantConfig {
        host: section.host.clone(),
        port: section.port,
        grpc_port: section.grpc_port,
        api_key: section.api_key().map(str::to_string),
        collection: section.collection.clone(),
        vector_size: section.vector_size,
        secure: section.secure,
        ..Default::default()
    }
}

/// Map the `[embedding]` section onto an embedder spec. Output dimensions
/// default to the collection's vector size.
pub fn embedder_spec(section: &EmbeddingConfig, vector_store: &VectorStoreConfig) -> EmbedderSpec {
    let dimensions = section
        .dimensions
        .or((vector_store.vector_size > 0).then_some(vector_store.vector_size));
    EmbedderSpec {
        provider: section.provider.clone(),
        api_key: section.resolve_api_key(),
        model: Some(section.model.clone()).filter(|m| !m.is_empty()),
        base_url: Some(section.api_base.clone()).filter(|b| !b.is_empty()),
        dimensions,
    }
}

pub fn point_id_strategy(ids: PointIds) -> PointIdStrategy {
    match ids {
        PointIds::Counter => PointIdStrategy::Counter,
        PointIds::Hashed => PointIdStrategy::Hashed,
    }
}

/// Truncate a string for single-line display.
pub fn truncate(s: &str, max: usize) -> String {
    let line = s.lines().next().unwrap_or("");
    if line.chars().count() <= max && line.len() == s.len() {
        return line.to_string();
    }
    let cut: String = line.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qdrant_config_mapping() {
        let section = VectorStoreConfig {
            enabled: true,
            host: "db".into(),
            port: 7000,
            api_key: Some(String::new()),
            secure: true,
            ..Default::default()
        };
        let config = qdrant_config(&section);
        assert_eq!(config.base_url(), "https://db:7000");
        assert_eq!(config.api_key, None);
        assert_eq!(config.collection, "mnemo_messages");
    }

    #[test]
    fn test_embedder_spec_dimensions_follow_collection() {
        let vs = VectorStoreConfig {
            vector_size: 768,
            ..Default::default()
        };
        let spec = embedder_spec(&EmbeddingConfig::default(), &vs);
        assert_eq!(spec.dimensions, Some(768));
        assert_eq!(spec.provider, "mistral");
        assert_eq!(spec.model.as_deref(), Some("mistral-embed"));

        let explicit = EmbeddingConfig {
            dimensions: Some(256),
            ..Default::default()
        };
        assert_eq!(embedder_spec(&explicit, &vs).dimensions, Some(256));
    }

    #[tokio::test]
    async fn test_disabled_vector_store_skips_connection() {
        let memory = connect_semantic_memory(&MnemoConfig::default()).await;
        assert!(!memory.is_enabled());
    }

    #[tokio::test]
    async fn test_disabled_embeddings_disable_semantic_memory() {
        let config = MnemoConfig::from_toml(
            "[vector_store]\nenabled = true\n\n[embedding]\nenabled = false\n",
        )
        .unwrap();
        assert!(!connect_semantic_memory(&config).await.is_enabled());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long line of text", 10), "a long ...");
        assert_eq!(truncate("first\nsecond", 20), "first...");
    }
}
