//! Recall: the query contract exposed to the agent's tool layer.
//!
//! A [`RecallQuery`] is deserialized straight from the tool-call arguments,
//! run against [`SemanticMemory`] by [`recall`], and rendered for the model
//! with [`format_results`].

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{MemoryError, Result};
use crate::payload::MessagePayload;
use crate::store::SemanticMemory;

/// Results returned when the query does not ask for a specific count.
pub const DEFAULT_RECALL_LIMIT: usize = 5;

/// Upper bound on results per query.
pub const MAX_RECALL_LIMIT: usize = 20;

/// Tool name under which recall is offered to the model.
pub const TOOL_NAME: &str = "search_memory";

/// Tool description shown to the model.
pub const TOOL_DESCRIPTION: &str = "Search for relevant messages in long-term memory using \
semantic search. Use this tool when you need to find past conversations or information stored \
in memory. Supports filtering by role (user/assistant), session key, and time range.";

/// Text returned when nothing matched.
pub const NO_RESULTS: &str = "No relevant messages found in memory.";

/// Client-side narrowing applied after the database search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecallFilters {
    /// Role to keep, compared case-insensitively.
    #[serde(default)]
    pub role: Option<String>,
    /// Session to search instead of the caller's own.
    #[serde(default)]
    pub session_key: Option<String>,
    /// RFC 3339 lower bound (inclusive).
    #[serde(default)]
    pub timestamp_from: Option<String>,
    /// RFC 3339 upper bound (inclusive).
    #[serde(default)]
    pub timestamp_to: Option<String>,
}

impl RecallFilters {
    /// Whether `payload` passes the role and time filters.
    ///
    /// Bounds that are not valid RFC 3339 are ignored, as are payloads whose
    /// own timestamp cannot be parsed.
    pub fn matches(&self, payload: &MessagePayload) -> bool {
        if let Some(role) = self.role.as_deref().filter(|r| !r.is_empty())
            && !payload.role.eq_ignore_ascii_case(role)
        {
            return false;
        }

        let Some(stored_at) = payload.stored_at() else {
            return true;
        };
        if let Some(from) = parse_bound(self.timestamp_from.as_deref())
            && stored_at < from
        {
            return false;
        }
        if let Some(to) = parse_bound(self.timestamp_to.as_deref())
            && stored_at > to
        {
            return false;
        }
        true
    }
}

fn parse_bound(raw: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw?)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// A recall request as issued by the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecallQuery {
    pub query_text: String,
    /// Requested result count; clamped to `[1, MAX_RECALL_LIMIT]`.
    #[serde(default, deserialize_with = "lenient_limit")]
    pub limit: Option<i64>,
    #[serde(default)]
    pub filters: RecallFilters,
}

impl RecallQuery {
    /// Query with default limit and no filters.
    pub fn new(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_filters(mut self, filters: RecallFilters) -> Self {
        self.filters = filters;
        self
    }

    /// The effective result count.
    pub fn effective_limit(&self) -> usize {
        clamp_limit(self.limit)
    }

    /// JSON schema of the tool arguments.
    pub fn parameters_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "query_text": {
                    "type": "string",
                    "description": "The search query - describe what you're looking for in natural language"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default: 5, max: 20)",
                    "default": DEFAULT_RECALL_LIMIT
                },
                "filters": {
                    "type": "object",
                    "description": "Optional filters to narrow search results",
                    "properties": {
                        "role": {
                            "type": "string",
                            "enum": ["user", "assistant", "system"]
                        },
                        "session_key": {
                            "type": "string",
                            "description": "Filter by specific session key (e.g., 'telegram:123456')"
                        },
                        "timestamp_from": {
                            "type": "string",
                            "description": "Messages from this time (RFC 3339, e.g. 2024-01-01T00:00:00Z)"
                        },
                        "timestamp_to": {
                            "type": "string",
                            "description": "Messages until this time (RFC 3339)"
                        }
                    }
                }
            },
            "required": ["query_text"]
        })
    }
}

/// Models send limits as numbers or numeric strings; anything else means
/// "use the default".
fn lenient_limit<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Clamp a requested limit to `[1, MAX_RECALL_LIMIT]`.
pub fn clamp_limit(requested: Option<i64>) -> usize {
    match requested {
        None => DEFAULT_RECALL_LIMIT,
        Some(n) => n.clamp(1, MAX_RECALL_LIMIT as i64) as usize,
    }
}

/// Run `query` against `store`.
///
/// Searches `filters.session_key` when set, otherwise the caller's
/// `current_session_key` (empty searches every session). Results keep the
/// database's ranking.
pub async fn recall(
    store: &SemanticMemory,
    current_session_key: &str,
    query: &RecallQuery,
) -> Result<Vec<MessagePayload>> {
    if !store.is_enabled() {
        return Err(MemoryError::Disabled);
    }
    if query.query_text.trim().is_empty() {
        return Err(MemoryError::InvalidQuery(
            "query_text is required and must be a non-empty string".to_string(),
        ));
    }

    let session_key = query
        .filters
        .session_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .unwrap_or(current_session_key);
    let limit = query.effective_limit();

    let hits = store
        .search_similar_with_payload(session_key, &query.query_text, limit)
        .await?;
    let total = hits.len();
    let kept: Vec<_> = hits
        .into_iter()
        .filter(|p| query.filters.matches(p))
        .collect();

    debug!(session_key, limit, total, kept = kept.len(), "Recall complete");
    Ok(kept)
}

/// Render results as Markdown for the model.
pub fn format_results(results: &[MessagePayload]) -> String {
    if results.is_empty() {
        return NO_RESULTS.to_string();
    }

    let mut out = format!("Found {} relevant message(s):\n", results.len());
    for (i, payload) in results.iter().enumerate() {
        if i > 0 {
            out.push_str("\n---\n");
        }
        let _ = write!(
            out,
            "\n### Message {}\n**Role:** {}\n**Time:** {}\n**Content:** {}\n",
            i + 1,
            payload.role,
            payload.timestamp,
            payload.content
        );
        if !payload.session_key.is_empty() {
            let _ = writeln!(out, "**Session:** {}", payload.session_key);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PointIdStrategy;
    use crate::vector::MockVectorIndex;
    use chrono::TimeZone;
    use mnemo_embeddings::MockEmbedder;
    use mnemo_types::Message;
    use std::sync::Arc;

    fn payload(role: &str, at: DateTime<Utc>) -> MessagePayload {
        MessagePayload {
            session_key: "telegram:1".into(),
            role: role.into(),
            content: "hello".into(),
            timestamp: at.to_rfc3339(),
            message_index: 0,
        }
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), DEFAULT_RECALL_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(-3)), 1);
        assert_eq!(clamp_limit(Some(7)), 7);
        assert_eq!(clamp_limit(Some(100)), MAX_RECALL_LIMIT);
    }

    #[test]
    fn test_query_from_tool_arguments() {
        let query: RecallQuery = serde_json::from_value(json!({
            "query_text": "grocery list",
            "limit": "100",
            "filters": {"role": "User"}
        }))
        .unwrap();
        assert_eq!(query.effective_limit(), MAX_RECALL_LIMIT);
        assert_eq!(query.filters.role.as_deref(), Some("User"));

        let query: RecallQuery =
            serde_json::from_value(json!({"query_text": "x", "limit": 3.0})).unwrap();
        assert_eq!(query.effective_limit(), 3);

        let query: RecallQuery =
            serde_json::from_value(json!({"query_text": "x", "limit": "lots"})).unwrap();
        assert_eq!(query.effective_limit(), DEFAULT_RECALL_LIMIT);
    }

    #[test]
    fn test_parameters_schema_matches_query() {
        let schema = RecallQuery::parameters_schema();

        assert_eq!(TOOL_NAME, "search_memory");
        assert!(TOOL_DESCRIPTION.contains("semantic search"));
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["query_text"]));
        assert_eq!(schema["properties"]["limit"]["default"], DEFAULT_RECALL_LIMIT);

        let filters = schema["properties"]["filters"]["properties"]
            .as_object()
            .unwrap();
        let mut names: Vec<_> = filters.keys().cloned().collect();
        names.sort();
        assert_eq!(
            names,
            vec!["role", "session_key", "timestamp_from", "timestamp_to"]
        );

        // Every field the schema advertises is accepted by the query type.
        let query: RecallQuery = serde_json::from_value(json!({
            "query_text": "x",
            "limit": 2,
            "filters": {
                "role": "user",
                "session_key": "telegram:1",
                "timestamp_from": "2025-01-01T00:00:00Z",
                "timestamp_to": "2025-02-01T00:00:00Z"
            }
        }))
        .unwrap();
        assert_eq!(query.effective_limit(), 2);
        assert_eq!(query.filters.session_key.as_deref(), Some("telegram:1"));
    }

    #[test]
    fn test_filters_role_case_insensitive() {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let filters = RecallFilters {
            role: Some("USER".into()),
            ..Default::default()
        };
        assert!(filters.matches(&payload("user", at)));
        assert!(!filters.matches(&payload("assistant", at)));
    }

    #[test]
    fn test_filters_time_range() {
        let at = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        let p = payload("user", at);

        let inside = RecallFilters {
            timestamp_from: Some("2025-06-01T00:00:00Z".into()),
            timestamp_to: Some("2025-07-01T00:00:00Z".into()),
            ..Default::default()
        };
        assert!(inside.matches(&p));

        let after = RecallFilters {
            timestamp_from: Some("2025-06-16T00:00:00Z".into()),
            ..Default::default()
        };
        assert!(!after.matches(&p));

        let before = RecallFilters {
            timestamp_to: Some("2025-06-15T11:59:59Z".into()),
            ..Default::default()
        };
        assert!(!before.matches(&p));

        let garbage = RecallFilters {
            timestamp_from: Some("last tuesday".into()),
            ..Default::default()
        };
        assert!(garbage.matches(&p));
    }

    #[test]
    fn test_format_results() {
        assert_eq!(format_results(&[]), NO_RESULTS);

        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let text = format_results(&[payload("user", at), payload("assistant", at)]);
        assert!(text.starts_with("Found 2 relevant message(s):"));
        assert!(text.contains("### Message 1\n**Role:** user"));
        assert!(text.contains("### Message 2\n**Role:** assistant"));
        assert!(text.contains("**Session:** telegram:1"));
        assert_eq!(text.matches("---").count(), 1);
    }

    #[tokio::test]
    async fn test_recall_disabled() {
        let err = recall(&SemanticMemory::disabled(), "k", &RecallQuery::new("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::Disabled));
    }

    #[tokio::test]
    async fn test_recall_rejects_empty_query() {
        let store = SemanticMemory::connect(
            Arc::new(MockVectorIndex::new()),
            Arc::new(MockEmbedder::new(16)),
            PointIdStrategy::Counter,
        )
        .await
        .unwrap();

        let err = recall(&store, "k", &RecallQuery::new("  ")).await.unwrap_err();
        assert!(matches!(err, MemoryError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_recall_scope_and_role_filter() {
        let store = SemanticMemory::connect(
            Arc::new(MockVectorIndex::new()),
            Arc::new(MockEmbedder::new(16)),
            PointIdStrategy::Counter,
        )
        .await
        .unwrap();
        store.store_message("mine", &Message::user("pasta recipe"), 0).await.unwrap();
        store
            .store_message("mine", &Message::assistant("boil water"), 1)
            .await
            .unwrap();
        store.store_message("other", &Message::user("pasta recipe"), 0).await.unwrap();

        let own = recall(&store, "mine", &RecallQuery::new("pasta recipe").with_limit(10))
            .await
            .unwrap();
        assert_eq!(own.len(), 2);
        assert!(own.iter().all(|p| p.session_key == "mine"));

        let query = RecallQuery::new("pasta recipe").with_filters(RecallFilters {
            session_key: Some("other".into()),
            role: Some("user".into()),
            ..Default::default()
        });
        let other = recall(&store, "mine", &query).await.unwrap();
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].session_key, "other");
    }
}
