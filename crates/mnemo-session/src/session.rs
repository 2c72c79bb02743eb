//! The session record.

use chrono::{DateTime, Utc};
use mnemo_types::Message;
use serde::{Deserialize, Serialize};

/// One conversation's ordered message log.
///
/// This is also the on-disk snapshot format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub key: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Messages ever appended, including those since truncated or replaced.
    /// Snapshots written before this field existed load as 0.
    #[serde(default)]
    pub appended: u64,
}

impl Session {
    /// An empty session stamped now.
    pub fn new(key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            messages: Vec::new(),
            summary: String::new(),
            created: now,
            updated: now,
            appended: 0,
        }
    }

    /// Append a message and return its position and sequence number.
    pub(crate) fn push(&mut self, message: Message) -> (usize, u64) {
        let sequence = self.next_sequence();
        self.messages.push(message);
        self.appended = sequence + 1;
        self.touch();
        (self.messages.len() - 1, sequence)
    }

    /// Replace the log. The new messages get fresh sequence numbers.
    pub(crate) fn replace(&mut self, messages: Vec<Message>) {
        let first = self.next_sequence();
        self.appended = first + messages.len() as u64;
        self.messages = messages;
        self.touch();
    }

    /// Keep only the last `keep_last` messages. Returns whether anything
    /// changed.
    pub(crate) fn truncate_front(&mut self, keep_last: usize) -> bool {
        if keep_last >= self.messages.len() {
            return false;
        }
        self.appended = self.next_sequence();
        let drop = self.messages.len() - keep_last;
        self.messages.drain(..drop);
        self.touch();
        true
    }

    /// Sequence number of the message at `position`.
    ///
    /// Sequences only grow: truncation and replacement never hand out a
    /// number twice within one session.
    pub fn sequence_at(&self, position: usize) -> u64 {
        self.next_sequence() - self.messages.len() as u64 + position as u64
    }

    fn next_sequence(&self) -> u64 {
        self.appended.max(self.messages.len() as u64)
    }

    pub(crate) fn touch(&mut self) {
        self.updated = Utc::now();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
