//! Which messages are worth indexing for semantic recall.

use mnemo_types::{Message, Role};

/// Session key used by the periodic heartbeat task. Never indexed.
pub const HEARTBEAT_SESSION_KEY: &str = "heartbeat";

/// Whether `message` appended to `session_key` should be forwarded to
/// semantic memory.
///
/// Skipped: the heartbeat session, tool and system messages, assistant
/// messages that only request tool calls, and empty content.
pub fn should_index(session_key: &str, message: &Message) -> bool {
    if session_key == HEARTBEAT_SESSION_KEY {
        return false;
    }
    if matches!(message.role, Role::Tool | Role::System) {
        return false;
    }
    if message.role == Role::Assistant && message.has_tool_calls() {
        return false;
    }
    !message.content.is_empty()
}
