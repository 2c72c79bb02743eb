//! Vector database client for the Qdrant REST API.
//!
//! [`QdrantClient`] is a thin transport: every method is exactly one
//! request/response round trip and errors are surfaced verbatim. Retry
//! policy, if any, belongs to the caller. The [`VectorIndex`] trait lets the
//! semantic store run against an in-memory index in tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, info};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Default vector dimensions (`mistral-embed` produces 1024-dim vectors).
pub const DEFAULT_VECTOR_SIZE: usize = 1024;

/// Default collection name.
pub const DEFAULT_COLLECTION: &str = "mnemo_messages";

/// Payload field holding the session key; used by search and delete filters.
pub const SESSION_KEY_FIELD: &str = "session_key";

/// Per-request deadline for vector database calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors from the vector database transport.
#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    /// Transport-level failure (connect, timeout, TLS, ...).
    #[error("{operation} failed: {source}")]
    Http {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("{operation} failed: status={status}, body={body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// The response body could not be decoded.
    #[error("failed to decode {operation} response: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },

    /// Client construction failed.
    #[error("invalid vector database configuration: {0}")]
    Config(String),
}

impl VectorError {
    /// Returns true if the server reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, VectorError::Status { status: 404, .. })
    }
}

/// Result type for vector database operations.
pub type Result<T> = std::result::Result<T, VectorError>;

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

/// A point to upsert: identifier, embedding and metadata payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: Map<String, Value>,
}

/// A search hit returned by the database, in its own ranking order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    /// Numeric or UUID point id, as the database returned it.
    pub id: Value,
    #[serde(default)]
    pub version: u64,
    pub score: f32,
    #[serde(default)]
    pub payload: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

/// Equality filter on the session-key payload field.
fn session_filter(session_key: &str) -> Value {
    json!({
        "must": [
            { "key": SESSION_KEY_FIELD, "match": { "value": session_key } }
        ]
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// VectorIndex trait
// ─────────────────────────────────────────────────────────────────────────────

/// Operations the semantic store needs from a vector database.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Name of the collection this index operates on.
    fn collection(&self) -> &str;

    /// Whether the collection exists. "Not found" is `Ok(false)`, anything
    /// else unexpected is an error.
    async fn collection_exists(&self) -> Result<bool>;

    /// Create the collection if it does not exist yet.
    async fn create_collection(&self) -> Result<()>;

    /// Insert or replace points by id. Empty input is a no-op.
    async fn upsert_points(&self, points: Vec<Point>) -> Result<()>;

    /// Similarity search, scoped to `session_key` when non-empty.
    async fn search(
        &self,
        vector: &[f32],
        session_key: &str,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>>;

    /// Delete every point whose payload session key equals `session_key`.
    async fn delete_by_session_key(&self, session_key: &str) -> Result<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Qdrant client
// ─────────────────────────────────────────────────────────────────────────────

/// Connection settings for Qdrant.
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub host: String,
    /// REST port.
    pub port: u16,
    /// gRPC port. Recognized for completeness; this client speaks REST only.
    pub grpc_port: u16,
    pub api_key: Option<String>,
    pub collection: String,
    pub vector_size: usize,
    /// Use `https` instead of `http`.
    pub secure: bool,
    pub timeout: Duration,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6333,
            grpc_port: 6334,
            api_key: None,
            collection: DEFAULT_COLLECTION.to_string(),
            vector_size: DEFAULT_VECTOR_SIZE,
            secure: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl QdrantConfig {
    /// Base URL derived from scheme, host and REST port.
    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Vector size to provision, falling back to the default when unset.
    pub fn effective_vector_size(&self) -> usize {
        if self.vector_size == 0 {
            DEFAULT_VECTOR_SIZE
        } else {
            self.vector_size
        }
    }
}

/// Qdrant REST client bound to one collection.
#[derive(Debug, Clone)]
pub struct QdrantClient {
    http: Client,
    base_url: String,
    collection: String,
    vector_size: usize,
}

impl QdrantClient {
    /// Build a client from config. No network traffic happens here.
    pub fn new(config: &QdrantConfig) -> Result<Self> {
        Self::with_base_url(config, config.base_url())
    }

    /// Build a client against an explicit base URL (proxies, tests).
    pub fn with_base_url(config: &QdrantConfig, base_url: impl Into<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            let value = HeaderValue::from_str(api_key)
                .map_err(|_| VectorError::Config("API key is not a valid header value".into()))?;
            headers.insert(HeaderName::from_static("api-key"), value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| VectorError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            vector_size: config.effective_vector_size(),
        })
    }

    /// The base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    fn points_url(&self, suffix: &str) -> String {
        format!("{}/points{}", self.collection_url(), suffix)
    }

    /// Send a request and turn transport errors and non-success statuses
    /// into [`VectorError`]s carrying the response body.
    async fn execute(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|source| VectorError::Http { operation, source })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(VectorError::Status {
            operation,
            status,
            body,
        })
    }
}

#[async_trait]
impl VectorIndex for QdrantClient {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn collection_exists(&self) -> Result<bool> {
        match self
            .execute("check collection", self.http.get(self.collection_url()))
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_collection(&self) -> Result<()> {
        if self.collection_exists().await? {
            debug!(collection = %self.collection, "Collection already exists");
            return Ok(());
        }

        let body = json!({
            "vectors": { "size": self.vector_size, "distance": "Cosine" }
        });
        self.execute(
            "create collection",
            self.http.put(self.collection_url()).json(&body),
        )
        .await?;

        info!(
            collection = %self.collection,
            size = self.vector_size,
            "Created vector collection"
        );
        Ok(())
    }

    async fn upsert_points(&self, points: Vec<Point>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let count = points.len();
        let body = json!({ "points": points });
        self.execute("upsert points", self.http.put(self.points_url("")).json(&body))
            .await?;

        debug!(collection = %self.collection, count, "Upserted points");
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        session_key: &str,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let mut body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        if !session_key.is_empty() {
            body["filter"] = session_filter(session_key);
        }

        let operation = "search";
        let response = self
            .execute(operation, self.http.post(self.points_url("/search")).json(&body))
            .await?;

        let parsed: SearchResponse = response.json().await.map_err(|e| VectorError::Decode {
            operation,
            message: e.to_string(),
        })?;

        debug!(
            collection = %self.collection,
            hits = parsed.result.len(),
            limit,
            "Vector search complete"
        );
        Ok(parsed.result)
    }

    async fn delete_by_session_key(&self, session_key: &str) -> Result<()> {
        let body = json!({ "filter": session_filter(session_key) });
        self.execute(
            "delete points",
            self.http.post(self.points_url("/delete")).json(&body),
        )
        .await?;

        debug!(collection = %self.collection, session_key, "Deleted session points");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory index for tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(any(test, feature = "testing"))]
pub use mock::MockVectorIndex;

#[cfg(any(test, feature = "testing"))]
mod mock {
    use std::collections::BTreeMap;

    use parking_lot::Mutex;
    use tokio::sync::watch;

    use super::*;

    #[derive(Debug, Default)]
    struct MockState {
        exists: bool,
        points: BTreeMap<u64, (Vec<f32>, Map<String, Value>)>,
        upsert_calls: usize,
        unavailable: bool,
    }

    /// In-memory [`VectorIndex`] ranking by cosine similarity.
    ///
    /// Can be switched to "unavailable" to simulate an outage, or have its
    /// upserts held open to simulate a hung database.
    #[derive(Debug)]
    pub struct MockVectorIndex {
        state: Mutex<MockState>,
        /// `true` while upserts may proceed.
        upsert_gate: watch::Sender<bool>,
    }

    impl Default for MockVectorIndex {
        fn default() -> Self {
            Self {
                state: Mutex::default(),
                upsert_gate: watch::Sender::new(true),
            }
        }
    }

    impl MockVectorIndex {
        /// Create an empty index whose collection does not exist yet.
        pub fn new() -> Self {
            Self::default()
        }

        /// Hold every upsert until [`MockVectorIndex::resume_upserts`].
        pub fn pause_upserts(&self) {
            self.upsert_gate.send_replace(false);
        }

        /// Let held and future upserts complete.
        pub fn resume_upserts(&self) {
            self.upsert_gate.send_replace(true);
        }

        /// Number of upserts currently held by [`MockVectorIndex::pause_upserts`].
        pub fn pending_upserts(&self) -> usize {
            self.upsert_gate.receiver_count()
        }

        /// Make every subsequent call fail (or succeed again).
        pub fn set_unavailable(&self, unavailable: bool) {
            self.state.lock().unavailable = unavailable;
        }

        /// Number of stored points.
        pub fn len(&self) -> usize {
            self.state.lock().points.len()
        }

        /// Whether the index holds no points.
        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        /// Number of upsert requests received (including empty ones skipped).
        pub fn upsert_calls(&self) -> usize {
            self.state.lock().upsert_calls
        }

        /// Stored point ids in ascending order.
        pub fn ids(&self) -> Vec<u64> {
            self.state.lock().points.keys().copied().collect()
        }

        /// Stored payloads ordered by point id.
        pub fn payloads(&self) -> Vec<Map<String, Value>> {
            self.state
                .lock()
                .points
                .values()
                .map(|(_, payload)| payload.clone())
                .collect()
        }

        /// Insert a raw payload, bypassing the semantic store.
        pub fn insert_raw(&self, id: u64, vector: Vec<f32>, payload: Map<String, Value>) {
            self.state.lock().points.insert(id, (vector, payload));
        }

        fn check(&self, operation: &'static str) -> Result<()> {
            if self.state.lock().unavailable {
                return Err(VectorError::Status {
                    operation,
                    status: 503,
                    body: "mock index unavailable".to_string(),
                });
            }
            Ok(())
        }
    }

    fn payload_session(payload: &Map<String, Value>) -> Option<&str> {
        payload.get(SESSION_KEY_FIELD).and_then(Value::as_str)
    }

    #[async_trait]
    impl VectorIndex for MockVectorIndex {
        fn collection(&self) -> &str {
            "mock"
        }

        async fn collection_exists(&self) -> Result<bool> {
            self.check("check collection")?;
            Ok(self.state.lock().exists)
        }

        async fn create_collection(&self) -> Result<()> {
            self.check("create collection")?;
            self.state.lock().exists = true;
            Ok(())
        }

        async fn upsert_points(&self, points: Vec<Point>) -> Result<()> {
            let mut gate = self.upsert_gate.subscribe();
            while !*gate.borrow_and_update() {
                if gate.changed().await.is_err() {
                    break;
                }
            }
            drop(gate);

            self.check("upsert points")?;
            let mut state = self.state.lock();
            state.upsert_calls += 1;
            for point in points {
                state.points.insert(point.id, (point.vector, point.payload));
            }
            Ok(())
        }

        async fn search(
            &self,
            vector: &[f32],
            session_key: &str,
            limit: usize,
        ) -> Result<Vec<ScoredPoint>> {
            self.check("search")?;
            let state = self.state.lock();
            let mut hits: Vec<ScoredPoint> = state
                .points
                .iter()
                .filter(|(_, (_, payload))| {
                    session_key.is_empty() || payload_session(payload) == Some(session_key)
                })
                .map(|(id, (stored, payload))| ScoredPoint {
                    id: Value::from(*id),
                    version: 0,
                    score: mnemo_embeddings::cosine_similarity(vector, stored),
                    payload: Some(payload.clone()),
                })
                .collect();
            hits.sort_by(|a, b| b.score.total_cmp(&a.score));
            hits.truncate(limit);
            Ok(hits)
        }

        async fn delete_by_session_key(&self, session_key: &str) -> Result<()> {
            self.check("delete points")?;
            self.state
                .lock()
                .points
                .retain(|_, (_, payload)| payload_session(payload) != Some(session_key));
            Ok(())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> QdrantConfig {
        QdrantConfig {
            collection: "test-collection".to_string(),
            vector_size: 3,
            ..Default::default()
        }
    }

    fn client_for(server: &MockServer, config: &QdrantConfig) -> QdrantClient {
        QdrantClient::with_base_url(config, server.uri()).unwrap()
    }

    #[test]
    fn test_base_url() {
        let config = QdrantConfig {
            host: "localhost".to_string(),
            port: 6333,
            ..Default::default()
        };
        assert_eq!(config.base_url(), "http://localhost:6333");
        assert_eq!(
            QdrantClient::new(&config).unwrap().base_url(),
            "http://localhost:6333"
        );

        let secure = QdrantConfig {
            host: "cloud.qdrant.io".to_string(),
            port: 443,
            secure: true,
            ..Default::default()
        };
        assert_eq!(secure.base_url(), "https://cloud.qdrant.io:443");
    }

    #[test]
    fn test_zero_vector_size_falls_back() {
        let config = QdrantConfig {
            vector_size: 0,
            ..Default::default()
        };
        assert_eq!(config.effective_vector_size(), DEFAULT_VECTOR_SIZE);
    }

    #[tokio::test]
    async fn test_collection_exists_distinguishes_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/test-collection"))
            .respond_with(ResponseTemplate::new(404))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/collections/test-collection"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = client_for(&server, &config());
        assert!(!client.collection_exists().await.unwrap());

        match client.collection_exists().await.unwrap_err() {
            VectorError::Status { status, body, .. } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_collection_when_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/test-collection"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/test-collection"))
            .and(body_json(json!({"vectors": {"size": 3, "distance": "Cosine"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, &config());
        client.create_collection().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_collection_is_idempotent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/test-collection"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, &config());
        client.create_collection().await.unwrap();
    }

    #[tokio::test]
    async fn test_api_key_header_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/test-collection"))
            .and(header("api-key", "secret"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = QdrantConfig {
            api_key: Some("secret".to_string()),
            ..config()
        };
        let client = client_for(&server, &config);
        assert!(client.collection_exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_points() {
        let server = MockServer::start().await;
        let mut payload = Map::new();
        payload.insert("session_key".into(), json!("telegram:1"));
        let point = Point {
            id: 7,
            vector: vec![0.5, 0.25, 0.125],
            payload,
        };

        Mock::given(method("PUT"))
            .and(path("/collections/test-collection/points"))
            .and(body_json(json!({"points": [
                {"id": 7, "vector": [0.5, 0.25, 0.125], "payload": {"session_key": "telegram:1"}}
            ]})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, &config());
        client.upsert_points(vec![point]).await.unwrap();
    }

    #[tokio::test]
    async fn test_upsert_empty_is_noop() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, &config());
        client.upsert_points(Vec::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_search_with_session_filter() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/test-collection/points/search"))
            .and(body_json(json!({
                "vector": [1.0, 0.0, 0.0],
                "limit": 5,
                "with_payload": true,
                "filter": {"must": [{"key": "session_key", "match": {"value": "telegram:1"}}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [
                    {"id": 3, "version": 1, "score": 0.93, "payload": {"content": "hi"}},
                    {"id": 1, "version": 1, "score": 0.41, "payload": {"content": "yo"}}
                ],
                "status": "ok",
                "time": 0.001
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, &config());
        let hits = client.search(&[1.0, 0.0, 0.0], "telegram:1", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, json!(3));
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_search_without_session_has_no_filter() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/test-collection/points/search"))
            .and(body_json(json!({
                "vector": [1.0, 0.0, 0.0],
                "limit": 2,
                "with_payload": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, &config());
        let hits = client.search(&[1.0, 0.0, 0.0], "", 2).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_search_missing_collection_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/test-collection/points/search"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_string(r#"{"status":{"error":"Collection not found"}}"#),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, &config());
        let err = client.search(&[1.0, 0.0, 0.0], "", 2).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("404"));

        let other = VectorError::Status {
            operation: "search",
            status: 500,
            body: String::new(),
        };
        assert!(!other.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_by_session_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/test-collection/points/delete"))
            .and(body_json(json!({
                "filter": {"must": [{"key": "session_key", "match": {"value": "discord:9"}}]}
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, &config());
        client.delete_by_session_key("discord:9").await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let config = QdrantConfig {
            timeout: Duration::from_millis(500),
            ..config()
        };
        // Port 9 (discard) is not expected to serve HTTP.
        let client = QdrantClient::with_base_url(&config, "http://127.0.0.1:9").unwrap();
        let err = client.collection_exists().await.unwrap_err();
        assert!(matches!(err, VectorError::Http { .. }));
    }
}
