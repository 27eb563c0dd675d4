//! Firebase Realtime Database storage backend
//!
//! This module talks to the database's REST interface:
//! - `GET`/`PUT`/`PATCH`/`DELETE` on `{database_url}{path}.json`
//! - Live subscriptions over the REST streaming protocol (server-sent events)
//! - Per-request timeout and exponential-backoff retries

use crate::error::{Error, Result, StorageError, StorageResult};
use crate::storage::adapter::StoreClient;
use crate::storage::storage_api::{with_retry, NodePath, Snapshot, StorageBackend, StorageConfig};
use crate::storage::subscription::{publish, SnapshotSender, Subscription};
use crate::storage::tree::Tree;
use bytes::BytesMut;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, Url};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Environment variable holding the database URL
pub const DATABASE_URL_ENV: &str = "FIREBASE_DATABASE_URL";

/// Environment variable holding the auth token (optional)
pub const AUTH_TOKEN_ENV: &str = "FIREBASE_AUTH_TOKEN";

/// Firebase backend configuration
#[derive(Debug, Clone, Default)]
pub struct FirebaseConfig {
    /// Database URL, e.g. `https://my-app.firebaseio.com`
    pub database_url: String,
    /// ID token or database secret sent as the `auth` query parameter
    pub auth_token: Option<String>,
}

impl FirebaseConfig {
    /// Create a configuration for a database URL without credentials
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            auth_token: None,
        }
    }

    /// Set the auth token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Load the configuration from `FIREBASE_DATABASE_URL` and `FIREBASE_AUTH_TOKEN`
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var(DATABASE_URL_ENV).map_err(|_| Error::Configuration {
            message: format!("{} is not set", DATABASE_URL_ENV),
        })?;
        let auth_token = std::env::var(AUTH_TOKEN_ENV).ok().filter(|t| !t.is_empty());
        Ok(Self {
            database_url,
            auth_token,
        })
    }
}

/// Firebase Realtime Database backend
#[derive(Debug, Clone)]
pub struct FirebaseStore {
    base: Url,
    http: Client,
    stream_http: Client,
    config: FirebaseConfig,
    storage_config: StorageConfig,
}

impl FirebaseStore {
    /// Create a new Firebase backend
    pub fn new(config: FirebaseConfig, storage_config: StorageConfig) -> StorageResult<Self> {
        let base = Url::parse(config.database_url.trim())
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .ok_or_else(|| invalid_url(&config.database_url))?;

        let http = Client::builder()
            .timeout(storage_config.timeout)
            .build()
            .map_err(|e| StorageError::ConnectionError {
                reason: format!("Failed to create HTTP client: {}", e),
            })?;
        // streaming responses stay open indefinitely
        let stream_http = Client::builder()
            .connect_timeout(storage_config.timeout)
            .build()
            .map_err(|e| StorageError::ConnectionError {
                reason: format!("Failed to create streaming HTTP client: {}", e),
            })?;

        Ok(Self {
            base,
            http,
            stream_http,
            config,
            storage_config,
        })
    }

    /// REST URL of a node, with every key and the token percent-encoded
    pub fn node_url(&self, path: &NodePath) -> StorageResult<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| invalid_url(&self.config.database_url))?;
            segments.pop_if_empty();
            let mut keys: Vec<&str> = path.segments().collect();
            let last = keys.pop().unwrap_or_default();
            segments.extend(keys);
            segments.push(&format!("{}.json", last));
        }
        if let Some(token) = &self.config.auth_token {
            url.query_pairs_mut().append_pair("auth", token);
        }
        Ok(url)
    }

    async fn request(&self, method: Method, path: &NodePath, body: Option<&Value>) -> StorageResult<Value> {
        let mut request = self.http.request(method, self.node_url(path)?);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(status_error(status.as_u16(), text, path));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn write(&self, operation: &str, method: Method, path: &NodePath, body: Option<&Value>) -> StorageResult<()> {
        with_retry(
            operation,
            || self.request(method.clone(), path, body),
            self.storage_config.max_retries,
            self.storage_config.timeout,
        )
        .await
        .map_err(|e| {
            warn!(operation, %path, error = %e, "write failed");
            e
        })?;
        debug!(operation, %path, "write acknowledged");
        Ok(())
    }
}

impl StoreClient for FirebaseStore {
    async fn fetch(&self, path: &NodePath) -> StorageResult<Snapshot> {
        let value = with_retry(
            "fetch",
            || self.request(Method::GET, path, None),
            self.storage_config.max_retries,
            self.storage_config.timeout,
        )
        .await?;
        debug!(%path, "fetched node");
        Ok(Snapshot::new(path.clone(), Some(value)))
    }

    async fn set(&self, path: &NodePath, value: Value) -> StorageResult<()> {
        self.write("set", Method::PUT, path, Some(&value)).await
    }

    async fn update(&self, path: &NodePath, value: Value) -> StorageResult<()> {
        // PATCH only accepts objects
        if value.is_object() {
            self.write("update", Method::PATCH, path, Some(&value)).await
        } else {
            self.write("update", Method::PUT, path, Some(&value)).await
        }
    }

    async fn remove(&self, path: &NodePath) -> StorageResult<()> {
        self.write("remove", Method::DELETE, path, None).await
    }

    async fn subscribe(&self, path: &NodePath) -> StorageResult<Subscription> {
        let response = self
            .stream_http
            .get(self.node_url(path)?)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), text, path));
        }

        let (sender, receiver) = watch::channel(None);
        let task = tokio::spawn(run_stream(path.clone(), response, sender));
        debug!(%path, "opened event stream");
        Ok(Subscription::new(path.clone(), receiver, Some(task.abort_handle())))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Firebase
    }
}

fn invalid_url(database_url: &str) -> StorageError {
    StorageError::OperationFailed {
        operation: "create_firebase_store".to_string(),
        reason: format!("Invalid database URL: '{}'", database_url),
    }
}

fn transport_error(error: reqwest::Error) -> StorageError {
    if error.is_timeout() {
        StorageError::Timeout {
            operation: "http_request".to_string(),
        }
    } else {
        StorageError::ConnectionError {
            reason: error.to_string(),
        }
    }
}

fn status_error(status: u16, message: String, path: &NodePath) -> StorageError {
    match status {
        401 => StorageError::AuthenticationFailed { reason: message },
        403 => StorageError::PermissionDenied {
            resource: path.to_string(),
        },
        _ => StorageError::Http { status, message },
    }
}

/// Feed a streaming response into a subscription until either side goes away
async fn run_stream(path: NodePath, response: reqwest::Response, sender: SnapshotSender) {
    let mut body = response.bytes_stream();
    let mut parser = SseParser::default();
    let mut tree = Tree::new();

    loop {
        let chunk = tokio::select! {
            _ = sender.closed() => {
                debug!(%path, "subscriber released, closing event stream");
                return;
            }
            chunk = body.next() => chunk,
        };
        let chunk = match chunk {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => {
                warn!(%path, error = %e, "event stream failed");
                return;
            }
            None => {
                debug!(%path, "event stream ended");
                return;
            }
        };

        for event in parser.push(&chunk) {
            match apply_event(&mut tree, &event) {
                Ok(StreamAction::Changed) => {
                    publish(&sender, Snapshot::new(path.clone(), tree.get(&NodePath::root()).cloned()));
                }
                Ok(StreamAction::Ignored) => {}
                Ok(StreamAction::Close) => {
                    warn!(%path, event = %event.event, "event stream closed by server");
                    return;
                }
                Err(e) => warn!(%path, error = %e, "skipping malformed stream event"),
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum StreamAction {
    Changed,
    Ignored,
    Close,
}

#[derive(Debug, Deserialize)]
struct StreamPayload {
    path: String,
    data: Value,
}

/// Apply one streaming event to the subscription's local tree
fn apply_event(tree: &mut Tree, event: &SseEvent) -> StorageResult<StreamAction> {
    match event.event.as_str() {
        "put" => {
            let payload: StreamPayload = serde_json::from_str(&event.data)?;
            tree.set(&NodePath::new(payload.path), payload.data);
            Ok(StreamAction::Changed)
        }
        "patch" => {
            let payload: StreamPayload = serde_json::from_str(&event.data)?;
            tree.update(&NodePath::new(payload.path), payload.data);
            Ok(StreamAction::Changed)
        }
        "cancel" | "auth_revoked" => Ok(StreamAction::Close),
        _ => Ok(StreamAction::Ignored),
    }
}

/// One server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
struct SseEvent {
    event: String,
    data: String,
}

/// Incremental server-sent events parser; chunks may split events anywhere
#[derive(Debug, Default)]
struct SseParser {
    buffer: BytesMut,
}

impl SseParser {
    fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let block = self.buffer.split_to(end + 2);
            if let Some(event) = parse_block(&String::from_utf8_lossy(&block[..end])) {
                events.push(event);
            }
        }
        events
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();
    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }
    if event.is_none() && data.is_empty() {
        return None;
    }
    Some(SseEvent {
        event: event.unwrap_or_else(|| "message".to_string()),
        data: data.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const STREAM_HEAD: &str = "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n";

    fn store(token: Option<&str>) -> FirebaseStore {
        let mut config = FirebaseConfig::new("https://demo.firebaseio.com/");
        if let Some(token) = token {
            config = config.with_auth_token(token);
        }
        FirebaseStore::new(config, StorageConfig::default()).unwrap()
    }

    #[test]
    fn test_node_url() {
        let store = store(None);
        assert_eq!(
            store.node_url(&NodePath::new("/series/42")).unwrap().as_str(),
            "https://demo.firebaseio.com/series/42.json"
        );
        assert_eq!(
            store.node_url(&NodePath::root()).unwrap().as_str(),
            "https://demo.firebaseio.com/.json"
        );
    }

    #[test]
    fn test_node_url_with_token() {
        let store = store(Some("secret"));
        assert_eq!(
            store.node_url(&NodePath::new("users/u1")).unwrap().as_str(),
            "https://demo.firebaseio.com/users/u1.json?auth=secret"
        );
    }

    #[test]
    fn test_node_url_encodes_keys_and_token() {
        let store = store(Some("a+b&c"));
        let url = store.node_url(&NodePath::new("/series/what?/50% off")).unwrap();
        assert_eq!(url.path(), "/series/what%3F/50%25%20off.json");
        assert_eq!(url.query(), Some("auth=a%2Bb%26c"));
        let segments: Vec<&str> = url.path_segments().unwrap().collect();
        assert_eq!(segments, vec!["series", "what%3F", "50%25%20off.json"]);
    }

    #[test]
    fn test_node_url_keeps_base_path() {
        let store = FirebaseStore::new(
            FirebaseConfig::new("http://127.0.0.1:9000/ns"),
            StorageConfig::default(),
        )
        .unwrap();
        assert_eq!(
            store.node_url(&NodePath::new("/series")).unwrap().as_str(),
            "http://127.0.0.1:9000/ns/series.json"
        );
    }

    #[test]
    fn test_rejects_invalid_url() {
        let result = FirebaseStore::new(FirebaseConfig::new("demo.firebaseio.com"), StorageConfig::default());
        assert!(matches!(result, Err(StorageError::OperationFailed { .. })));
        assert!(FirebaseStore::new(FirebaseConfig::default(), StorageConfig::default()).is_err());
        assert!(FirebaseStore::new(FirebaseConfig::new("ftp://demo.firebaseio.com"), StorageConfig::default()).is_err());
    }

    #[test]
    fn test_backend_type() {
        assert_eq!(store(None).backend_type(), StorageBackend::Firebase);
    }

    #[test]
    fn test_status_error_mapping() {
        let path = NodePath::new("/users/u1");
        assert!(matches!(
            status_error(401, "expired".to_string(), &path),
            StorageError::AuthenticationFailed { .. }
        ));
        assert!(matches!(
            status_error(403, "denied".to_string(), &path),
            StorageError::PermissionDenied { resource } if resource == "/users/u1"
        ));
        assert!(matches!(
            status_error(500, "oops".to_string(), &path),
            StorageError::Http { status: 500, .. }
        ));
    }

    #[test]
    fn test_sse_parser_handles_split_chunks() {
        let mut parser = SseParser::default();
        assert!(parser.push(b"event: put\ndata: {\"path\":\"/\",").is_empty());
        let events = parser.push(b"\"data\":{\"a\":1}}\n\nevent: keep-alive\ndata: null\n\n");
        assert_eq!(
            events,
            vec![
                SseEvent {
                    event: "put".to_string(),
                    data: "{\"path\":\"/\",\"data\":{\"a\":1}}".to_string(),
                },
                SseEvent {
                    event: "keep-alive".to_string(),
                    data: "null".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_sse_parser_crlf_and_comments() {
        let mut parser = SseParser::default();
        let events = parser.push(b": hello\r\n\r\nevent: cancel\r\ndata: permission denied\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "cancel");
        assert_eq!(events[0].data, "permission denied");
    }

    #[test]
    fn test_apply_put_and_patch() {
        let mut tree = Tree::new();
        let put = SseEvent {
            event: "put".to_string(),
            data: json!({"path": "/", "data": {"1": {"t": "a"}, "2": {"t": "b"}}}).to_string(),
        };
        assert_eq!(apply_event(&mut tree, &put).unwrap(), StreamAction::Changed);

        let patch = SseEvent {
            event: "patch".to_string(),
            data: json!({"path": "/1", "data": {"t": "z"}}).to_string(),
        };
        assert_eq!(apply_event(&mut tree, &patch).unwrap(), StreamAction::Changed);

        let delete = SseEvent {
            event: "put".to_string(),
            data: json!({"path": "/2", "data": null}).to_string(),
        };
        apply_event(&mut tree, &delete).unwrap();
        assert_eq!(tree.get(&NodePath::root()), Some(&json!({"1": {"t": "z"}})));
    }

    #[test]
    fn test_apply_control_events() {
        let mut tree = Tree::new();
        let keep_alive = SseEvent {
            event: "keep-alive".to_string(),
            data: "null".to_string(),
        };
        let revoked = SseEvent {
            event: "auth_revoked".to_string(),
            data: "credential is no longer valid".to_string(),
        };
        assert_eq!(apply_event(&mut tree, &keep_alive).unwrap(), StreamAction::Ignored);
        assert_eq!(apply_event(&mut tree, &revoked).unwrap(), StreamAction::Close);

        let malformed = SseEvent {
            event: "put".to_string(),
            data: "not json".to_string(),
        };
        assert!(matches!(apply_event(&mut tree, &malformed), Err(StorageError::Serialization(_))));
    }

    /// Local server standing in for the database; returns a store pointed at it
    async fn local_database(token: Option<&str>) -> (TcpListener, FirebaseStore) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = FirebaseConfig::new(format!("http://{}", listener.local_addr().unwrap()));
        if let Some(token) = token {
            config = config.with_auth_token(token);
        }
        let store = FirebaseStore::new(config, StorageConfig::default()).unwrap();
        (listener, store)
    }

    /// Accept one connection and read its request head
    async fn accept(listener: &TcpListener) -> (TcpStream, String) {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }
        (socket, String::from_utf8_lossy(&head).into_owned())
    }

    fn sse(event: &str, data: Value) -> String {
        format!("event: {}\ndata: {}\n\n", event, data)
    }

    #[tokio::test]
    async fn test_fetch_sends_encoded_url() {
        let (listener, store) = local_database(Some("a+b")).await;
        let server = tokio::spawn(async move {
            let (mut socket, head) = accept(&listener).await;
            let body = r#"{"t":1}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            head
        });

        let snapshot = store.fetch(&NodePath::new("/series/what?")).await.unwrap();
        assert_eq!(snapshot.value(), Some(&json!({"t": 1})));

        let head = server.await.unwrap();
        assert!(head.starts_with("GET /series/what%3F.json?auth=a%2Bb HTTP/1.1"), "{}", head);
    }

    #[tokio::test]
    async fn test_stream_delivers_until_cancel() {
        let (listener, store) = local_database(None).await;
        let server = tokio::spawn(async move {
            let (mut socket, head) = accept(&listener).await;
            socket.write_all(STREAM_HEAD.as_bytes()).await.unwrap();
            let initial = sse("put", json!({"path": "/", "data": null}));
            socket.write_all(initial.as_bytes()).await.unwrap();
            (socket, head)
        });

        let mut subscription = store.subscribe(&NodePath::new("/users/u1/series")).await.unwrap();
        let first = subscription.next().await.unwrap();
        assert!(!first.exists());
        assert_eq!(first.path().as_str(), "/users/u1/series");

        let (mut socket, head) = server.await.unwrap();
        assert!(head.starts_with("GET /users/u1/series.json HTTP/1.1"), "{}", head);
        assert!(head.to_ascii_lowercase().contains("accept: text/event-stream"));

        let rest = [
            sse("keep-alive", Value::Null),
            sse("put", json!({"path": "/", "data": {"1": {"t": "Dark"}}})),
            sse("cancel", json!("permission denied")),
        ]
        .concat();
        socket.write_all(rest.as_bytes()).await.unwrap();

        let second = subscription.next().await.unwrap();
        assert_eq!(second.value(), Some(&json!({"1": {"t": "Dark"}})));
        assert!(subscription.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_subscription_closes_stream() {
        let (listener, store) = local_database(None).await;
        let server = tokio::spawn(async move {
            let (mut socket, _) = accept(&listener).await;
            socket.write_all(STREAM_HEAD.as_bytes()).await.unwrap();
            let initial = sse("put", json!({"path": "/", "data": {"a": 1}}));
            socket.write_all(initial.as_bytes()).await.unwrap();
            // returns once the client hangs up
            let mut buf = [0u8; 64];
            loop {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        });

        let mut subscription = store.subscribe(&NodePath::new("/series")).await.unwrap();
        assert!(subscription.next().await.unwrap().exists());

        drop(subscription);
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("stream still open after the handle was dropped")
            .unwrap();
    }

    #[tokio::test]
    async fn test_subscribe_maps_rejection() {
        let (listener, store) = local_database(Some("expired")).await;
        tokio::spawn(async move {
            let (mut socket, _) = accept(&listener).await;
            let body = r#"{"error":"Unauthorized request."}"#;
            let response = format!(
                "HTTP/1.1 401 Unauthorized\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });

        let result = store.subscribe(&NodePath::new("/users/u1")).await;
        assert!(matches!(
            result,
            Err(StorageError::AuthenticationFailed { reason }) if reason.contains("Unauthorized")
        ));
    }
}
