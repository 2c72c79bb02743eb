//! Background forwarding of appended messages to semantic memory.
//!
//! The session store never awaits the network. It pushes jobs onto an
//! unbounded channel while still holding its map lock, and a single task
//! drains them in order, so payload indices within a session are written in
//! append order.

use std::sync::Arc;

use mnemo_memory::{SemanticMemory, StoredMessage};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Work item for the indexer task.
#[derive(Debug)]
pub(crate) enum IndexJob {
    /// Embed and upsert one appended message.
    Store(StoredMessage),
    /// Drop every indexed message of a session.
    DeleteSession { session_key: String },
    /// Replace a session's indexed messages with `messages`.
    Reindex {
        session_key: String,
        messages: Vec<StoredMessage>,
        reply: oneshot::Sender<mnemo_memory::Result<usize>>,
    },
    /// Signal once every earlier job has been handled.
    Flush(oneshot::Sender<()>),
}

/// Handle to the running indexer task.
#[derive(Debug, Clone)]
pub(crate) struct Indexer {
    tx: mpsc::UnboundedSender<IndexJob>,
}

impl Indexer {
    /// Spawn the indexer on the current tokio runtime.
    ///
    /// Returns `None` outside a runtime; callers then run without
    /// forwarding.
    pub(crate) fn spawn(memory: Arc<SemanticMemory>) -> Option<Self> {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime available; semantic indexing is disabled for this store");
                return None;
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        handle.spawn(run(rx, memory));
        Some(Self { tx })
    }

    /// Queue a job. Fails only if the task has stopped.
    pub(crate) fn submit(&self, job: IndexJob) -> Result<()> {
        self.tx.send(job).map_err(|_| Error::IndexerStopped)
    }

    /// Wait for every job queued before this call.
    pub(crate) async fn flush(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.submit(IndexJob::Flush(tx))?;
        rx.await.map_err(|_| Error::IndexerStopped)
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<IndexJob>, memory: Arc<SemanticMemory>) {
    debug!("Semantic indexer started");

    while let Some(job) = rx.recv().await {
        match job {
            IndexJob::Store(stored) => {
                if let Err(e) = memory.store(&stored).await {
                    warn!(
                        session_key = %stored.session_key,
                        index = stored.index,
                        error = %e,
                        "Failed to index message"
                    );
                }
            }
            IndexJob::DeleteSession { session_key } => {
                if let Err(e) = memory.delete_session(&session_key).await {
                    warn!(session_key = %session_key, error = %e, "Failed to delete indexed session");
                }
            }
            IndexJob::Reindex {
                session_key,
                messages,
                reply,
            } => {
                let result = reindex(&memory, &session_key, &messages).await;
                if let Err(e) = &result {
                    warn!(session_key = %session_key, error = %e, "Reindex failed");
                }
                let _ = reply.send(result);
            }
            IndexJob::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    debug!("Semantic indexer stopped");
}

async fn reindex(
    memory: &SemanticMemory,
    session_key: &str,
    messages: &[StoredMessage],
) -> mnemo_memory::Result<usize> {
    memory.delete_session(session_key).await?;
    memory.store_messages_batch(messages).await?;
    debug!(session_key, count = messages.len(), "Reindexed session");
    Ok(messages.len())
}
