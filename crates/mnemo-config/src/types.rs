//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [session]        # snapshot directory
//! [vector_store]   # Qdrant connection and collection
//! [embedding]      # embedding provider
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Environment variable consulted for the embedding API key.
pub const EMBEDDING_API_KEY_ENV: &str = "MNEMO_EMBEDDING_API_KEY";

const APP_NAME: &str = "mnemo";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MnemoConfig {
    /// Session snapshot settings.
    pub session: Option<SessionConfig>,

    /// Vector database settings.
    pub vector_store: Option<VectorStoreConfig>,

    /// Embedding provider settings.
    pub embedding: Option<EmbeddingConfig>,
}

impl MnemoConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced whole, matching how a project-local file is
    /// expected to restate the section it overrides.
    pub fn merge(&mut self, other: MnemoConfig) {
        if other.session.is_some() {
            self.session = other.session;
        }
        if other.vector_store.is_some() {
            self.vector_store = other.vector_store;
        }
        if other.embedding.is_some() {
            self.embedding = other.embedding;
        }
    }

    /// Session section, or defaults.
    pub fn session(&self) -> SessionConfig {
        self.session.clone().unwrap_or_default()
    }

    /// Vector store section, or defaults (disabled).
    pub fn vector_store(&self) -> VectorStoreConfig {
        self.vector_store.clone().unwrap_or_default()
    }

    /// Embedding section, or defaults.
    pub fn embedding(&self) -> EmbeddingConfig {
        self.embedding.clone().unwrap_or_default()
    }

    /// Whether semantic memory should be started: the vector store must be
    /// enabled and so must embeddings.
    pub fn semantic_memory_enabled(&self) -> bool {
        self.vector_store().enabled && self.embedding().enabled
    }

    fn validate(&self) -> Result<()> {
        if let Some(vs) = &self.vector_store
            && vs.collection.trim().is_empty()
        {
            return Err(ConfigError::Invalid {
                field: "vector_store.collection".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// `[session]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Snapshot directory. `~` expands to the home directory. Defaults to
    /// `<data dir>/mnemo/sessions`.
    pub storage_dir: Option<PathBuf>,
}

impl SessionConfig {
    /// The directory snapshots are written to, if one can be determined.
    pub fn effective_storage_dir(&self) -> Option<PathBuf> {
        match &self.storage_dir {
            Some(dir) => Some(expand_home(dir)),
            None => dirs::data_dir().map(|d| d.join(APP_NAME).join("sessions")),
        }
    }
}

fn expand_home(path: &std::path::Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Vector store
// ─────────────────────────────────────────────────────────────────────────────

/// How vector point ids are assigned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointIds {
    /// In-process counter (ids may repeat across restarts).
    #[default]
    Counter,
    /// Hash of session key and the message's append sequence.
    Hashed,
}

/// `[vector_store]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Recognized but unused; mnemo talks to Qdrant over REST.
    pub grpc_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub collection: String,
    /// Embedding dimensionality of the collection. 0 means the default.
    pub vector_size: usize,
    /// Use TLS.
    pub secure: bool,
    pub point_ids: PointIds,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 6333,
            grpc_port: 6334,
            api_key: None,
            collection: "mnemo_messages".to_string(),
            vector_size: 1024,
            secure: false,
            point_ids: PointIds::Counter,
        }
    }
}

impl VectorStoreConfig {
    /// API key, treating an empty string as unset.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Embedding
// ─────────────────────────────────────────────────────────────────────────────

/// `[embedding]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub enabled: bool,
    /// "mistral" (default), "openai", or "mock".
    pub provider: String,
    pub model: String,
    pub api_base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Output dimensions. Defaults to the vector store's `vector_size`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "mistral".to_string(),
            model: "mistral-embed".to_string(),
            api_base: "https://api.mistral.ai/v1".to_string(),
            api_key: None,
            dimensions: None,
        }
    }
}

impl EmbeddingConfig {
    /// Resolve the API key: `MNEMO_EMBEDDING_API_KEY` first, then the
    /// config file. Empty values count as unset.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    /// [`EmbeddingConfig::resolve_api_key`] with an injectable environment.
    pub fn resolve_api_key_with(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        env(EMBEDDING_API_KEY_ENV)
            .filter(|k| !k.is_empty())
            .or_else(|| self.api_key.clone().filter(|k| !k.is_empty()))
    }

    /// Whether the config file itself carries a key.
    pub fn has_plaintext_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config() {
        let config = MnemoConfig::from_toml("").unwrap();
        assert!(config.session.is_none());
        assert!(!config.vector_store().enabled);
        assert!(config.embedding().enabled);
        assert!(!config.semantic_memory_enabled());
    }

    #[test]
    fn test_parse_full_example() {
        let toml = r#"
[session]
storage_dir = "/var/lib/mnemo/sessions"

[vector_store]
enabled = true
host = "qdrant.internal"
port = 6334
api_key = "qd-key"
collection = "chat"
vector_size = 768
secure = true
point_ids = "hashed"

[embedding]
enabled = true
provider = "openai"
model = "text-embedding-3-small"
api_base = "https://api.openai.com/v1"
dimensions = 768
"#;
        let config = MnemoConfig::from_toml(toml).unwrap();

        assert_eq!(
            config.session().effective_storage_dir(),
            Some(PathBuf::from("/var/lib/mnemo/sessions"))
        );
        let vs = config.vector_store();
        assert!(vs.enabled);
        assert_eq!(vs.host, "qdrant.internal");
        assert_eq!(vs.port, 6334);
        assert_eq!(vs.grpc_port, 6334);
        assert_eq!(vs.api_key(), Some("qd-key"));
        assert_eq!(vs.collection, "chat");
        assert_eq!(vs.vector_size, 768);
        assert!(vs.secure);
        assert_eq!(vs.point_ids, PointIds::Hashed);

        let emb = config.embedding();
        assert_eq!(emb.provider, "openai");
        assert_eq!(emb.dimensions, Some(768));
        assert!(config.semantic_memory_enabled());
    }

    #[test]
    fn test_vector_store_defaults() {
        let config = MnemoConfig::from_toml("[vector_store]\nenabled = true\n").unwrap();
        let vs = config.vector_store();
        assert_eq!(vs.host, "localhost");
        assert_eq!(vs.port, 6333);
        assert_eq!(vs.collection, "mnemo_messages");
        assert_eq!(vs.vector_size, 1024);
        assert_eq!(vs.point_ids, PointIds::Counter);
        assert_eq!(vs.api_key(), None);
    }

    #[test]
    fn test_embedding_disabled_disables_semantic_memory() {
        let toml = r#"
[vector_store]
enabled = true

[embedding]
enabled = false
"#;
        let config = MnemoConfig::from_toml(toml).unwrap();
        assert!(!config.semantic_memory_enabled());
    }

    #[test]
    fn test_empty_collection_rejected() {
        let err = MnemoConfig::from_toml("[vector_store]\ncollection = \"  \"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_unknown_point_ids_rejected() {
        let err = MnemoConfig::from_toml("[vector_store]\npoint_ids = \"uuid\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_merge_override() {
        let mut base = MnemoConfig::from_toml(
            r#"
[vector_store]
enabled = true
host = "base"

[embedding]
model = "base-model"
"#,
        )
        .unwrap();
        let overlay = MnemoConfig::from_toml("[vector_store]\nhost = \"project\"\n").unwrap();
        base.merge(overlay);

        assert_eq!(base.vector_store().host, "project");
        // Whole-section replacement: `enabled` falls back to its default.
        assert!(!base.vector_store().enabled);
        assert_eq!(base.embedding().model, "base-model");
    }

    #[test]
    fn test_api_key_resolution_order() {
        let config = EmbeddingConfig {
            api_key: Some("from-file".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_api_key_with(|_| Some("from-env".to_string())),
            Some("from-env".to_string())
        );
        assert_eq!(
            config.resolve_api_key_with(|_| Some(String::new())),
            Some("from-file".to_string())
        );
        assert_eq!(
            EmbeddingConfig::default().resolve_api_key_with(|_| None),
            None
        );
    }

    #[test]
    fn test_home_expansion() {
        let session = SessionConfig {
            storage_dir: Some(PathBuf::from("~/sessions")),
        };
        if let Some(home) = dirs::home_dir() {
            assert_eq!(session.effective_storage_dir(), Some(home.join("sessions")));
        }
    }

    #[test]
    fn test_roundtrip_toml() {
        let mut config = MnemoConfig::new();
        config.vector_store = Some(VectorStoreConfig {
            enabled: true,
            ..Default::default()
        });
        let text = config.to_toml().unwrap();
        let back = MnemoConfig::from_toml(&text).unwrap();
        assert_eq!(back, config);
    }
}
