//! The session store.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use mnemo_memory::{SemanticMemory, StoredMessage};
use mnemo_types::{Message, Role};
use parking_lot::RwLock;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::indexer::{IndexJob, Indexer};
use crate::persistence::SnapshotDir;
use crate::policy::should_index;
use crate::session::Session;

/// Authoritative, process-wide map of session key to conversation log.
///
/// All access goes through this type and callers only ever receive copies.
/// The map lock is never held across file I/O or an `.await`; messages bound
/// for semantic memory are handed to a background indexer instead.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    snapshots: Option<SnapshotDir>,
    semantic: Arc<SemanticMemory>,
    indexer: Option<Indexer>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.sessions.read().len())
            .field("storage_dir", &self.snapshots.as_ref().map(|s| s.root()))
            .field("semantic", &self.semantic)
            .finish()
    }
}

impl SessionStore {
    /// A store with no snapshot directory and no semantic memory.
    pub fn in_memory() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            snapshots: None,
            semantic: Arc::new(SemanticMemory::disabled()),
            indexer: None,
        }
    }

    /// Open a store, loading every snapshot under `storage_dir`.
    ///
    /// When `semantic` is enabled the background indexer is spawned on the
    /// current tokio runtime.
    pub fn open(storage_dir: Option<PathBuf>, semantic: Arc<SemanticMemory>) -> Result<Self> {
        let mut sessions = HashMap::new();
        let snapshots = match storage_dir {
            Some(dir) => {
                let snapshots = SnapshotDir::open(dir)?;
                for session in snapshots.load_all()? {
                    sessions.insert(session.key.clone(), session);
                }
                Some(snapshots)
            }
            None => None,
        };

        let indexer = if semantic.is_enabled() {
            Indexer::spawn(semantic.clone())
        } else {
            None
        };

        info!(
            sessions = sessions.len(),
            semantic = indexer.is_some(),
            "Session store opened"
        );

        Ok(Self {
            sessions: RwLock::new(sessions),
            snapshots,
            semantic,
            indexer,
        })
    }

    /// The semantic memory this store forwards to.
    pub fn semantic(&self) -> &Arc<SemanticMemory> {
        &self.semantic
    }

    /// Snapshot directory, if persistence is configured.
    pub fn storage_dir(&self) -> Option<&std::path::Path> {
        self.snapshots.as_ref().map(|s| s.root())
    }

    /// Get a copy of the session for `key`, creating it if absent.
    pub fn get_or_create(&self, key: &str) -> Session {
        if let Some(session) = self.sessions.read().get(key) {
            return session.clone();
        }
        self.sessions
            .write()
            .entry(key.to_string())
            .or_insert_with(|| Session::new(key))
            .clone()
    }

    /// Append `message` to `key`, creating the session if needed.
    ///
    /// Eligible messages are queued for semantic indexing. This never waits
    /// on the network and never fails because of semantic memory.
    pub fn add_message(&self, key: &str, message: Message) {
        let forward = match &self.indexer {
            Some(indexer) if should_index(key, &message) => Some((indexer, message.clone())),
            _ => None,
        };

        // Submitting under the map lock keeps the queue in append order.
        let mut sessions = self.sessions.write();
        let (index, sequence) = sessions
            .entry(key.to_string())
            .or_insert_with(|| Session::new(key))
            .push(message);

        if let Some((indexer, message)) = forward {
            let stored = StoredMessage::new(key, message, index).with_sequence(sequence);
            if let Err(e) = indexer.submit(IndexJob::Store(stored)) {
                debug!(session_key = key, error = %e, "Message not queued for indexing");
            }
        }
    }

    /// Append a plain text message.
    pub fn add_text(&self, key: &str, role: Role, content: impl Into<String>) {
        self.add_message(key, Message::new(role, content));
    }

    /// Copy of the message log (empty if `key` is unknown).
    pub fn get_history(&self, key: &str) -> Vec<Message> {
        self.sessions
            .read()
            .get(key)
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    /// Replace the message log. No-op if `key` is unknown.
    pub fn set_history(&self, key: &str, messages: &[Message]) {
        if let Some(session) = self.sessions.write().get_mut(key) {
            session.replace(messages.to_vec());
        }
    }

    /// Keep only the last `keep_last` messages (`0` clears the log).
    pub fn truncate(&self, key: &str, keep_last: usize) {
        if let Some(session) = self.sessions.write().get_mut(key) {
            session.truncate_front(keep_last);
        }
    }

    /// Summary text (empty if `key` is unknown).
    pub fn get_summary(&self, key: &str) -> String {
        self.sessions
            .read()
            .get(key)
            .map(|s| s.summary.clone())
            .unwrap_or_default()
    }

    /// Set the summary. No-op if `key` is unknown.
    pub fn set_summary(&self, key: &str, summary: impl Into<String>) {
        if let Some(session) = self.sessions.write().get_mut(key) {
            session.summary = summary.into();
            session.touch();
        }
    }

    /// All session keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.sessions.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Write a snapshot of `key` to disk.
    ///
    /// Succeeds without writing when no storage directory is configured or
    /// the key is unknown. Fails with [`Error::InvalidKey`] if the key does
    /// not map to a plain filename.
    pub fn save(&self, key: &str) -> Result<()> {
        let Some(snapshots) = &self.snapshots else {
            return Ok(());
        };
        let path = snapshots.path_for(key)?;

        let snapshot = self.sessions.read().get(key).cloned();
        match snapshot {
            Some(session) => snapshots.write(&path, &session),
            None => Ok(()),
        }
    }

    /// Save every session. Stops at the first failure.
    pub fn save_all(&self) -> Result<usize> {
        let keys = self.keys();
        for key in &keys {
            self.save(key)?;
        }
        Ok(keys.len())
    }

    /// Similar messages from semantic memory (empty when disabled).
    pub async fn search_similar(&self, key: &str, query: &str, limit: usize) -> Result<Vec<Message>> {
        Ok(self.semantic.search_similar(key, query, limit).await?)
    }

    /// Reset a conversation: clear its log and drop its indexed messages.
    pub fn clear(&self, key: &str) {
        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.get_mut(key) {
            session.truncate_front(0);
        }
        if let Some(indexer) = &self.indexer {
            let job = IndexJob::DeleteSession {
                session_key: key.to_string(),
            };
            if let Err(e) = indexer.submit(job) {
                debug!(session_key = key, error = %e, "Session delete not queued");
            }
        }
    }

    /// Rebuild the semantic index for `key` from its current log.
    ///
    /// Returns how many messages were indexed (0 when semantic memory is
    /// disabled).
    pub async fn reindex(&self, key: &str) -> Result<usize> {
        let Some(indexer) = &self.indexer else {
            return Ok(0);
        };

        let (reply, rx) = oneshot::channel();
        {
            let sessions = self.sessions.read();
            let messages: Vec<StoredMessage> = sessions
                .get(key)
                .map(|session| {
                    session
                        .messages
                        .iter()
                        .enumerate()
                        .filter(|(_, m)| should_index(key, m))
                        .map(|(index, m)| {
                            StoredMessage::new(key, m.clone(), index)
                                .with_sequence(session.sequence_at(index))
                        })
                        .collect()
                })
                .unwrap_or_default();

            indexer.submit(IndexJob::Reindex {
                session_key: key.to_string(),
                messages,
                reply,
            })?;
        }
        let count = rx.await.map_err(|_| Error::IndexerStopped)??;
        Ok(count)
    }

    /// Wait until every indexing job queued so far has been processed.
    pub async fn flush(&self) -> Result<()> {
        match &self.indexer {
            Some(indexer) => indexer.flush().await,
            None => Ok(()),
        }
    }
}
