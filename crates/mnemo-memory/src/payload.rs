//! Point payloads: the metadata stored next to each message embedding.

use chrono::{DateTime, Utc};
use mnemo_types::{Message, Role};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MemoryError, Result};

/// Metadata attached to every stored vector point.
///
/// `timestamp` is the wall-clock storage time in RFC 3339. It is kept as a
/// string so that points written by other tools still reconstruct even if
/// their timestamp format differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub session_key: String,
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub message_index: usize,
}

impl MessagePayload {
    /// Build the payload for `message` at position `index` of `session_key`,
    /// stamped with the current time.
    pub fn new(session_key: impl Into<String>, message: &Message, index: usize) -> Self {
        Self::at(session_key, message, index, Utc::now())
    }

    /// Same as [`MessagePayload::new`] with an explicit storage time.
    pub fn at(
        session_key: impl Into<String>,
        message: &Message,
        index: usize,
        stored_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_key: session_key.into(),
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
            timestamp: stored_at.to_rfc3339(),
            message_index: index,
        }
    }

    /// Convert to the generic JSON object sent to the vector database.
    pub fn to_map(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(MemoryError::InvalidPayload(format!(
                "payload serialized to non-object: {other}"
            ))),
        }
    }

    /// Parse a payload map returned by the vector database.
    pub fn from_map(map: Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(map))
            .map_err(|e| MemoryError::InvalidPayload(e.to_string()))
    }

    /// Storage time, if the timestamp is valid RFC 3339.
    pub fn stored_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Reconstruct the stored message. Tool-call data is not indexed, so the
    /// result carries role and content only.
    pub fn into_message(self) -> Result<Message> {
        let role: Role = self
            .role
            .parse()
            .map_err(|e: mnemo_types::ParseRoleError| MemoryError::InvalidPayload(e.to_string()))?;
        Ok(Message::new(role, self.content))
    }
}
