//! Core storage types shared by every backend
//!
//! Node paths, snapshots, backend configuration and the retry wrapper used by
//! remote backends.

use crate::error::{StorageError, StorageResult};
use crate::storage::tree;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

/// Storage configuration shared by backends
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Timeout applied to each individual request
    pub timeout: Duration,
    /// Maximum retry attempts after the first failure
    pub max_retries: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(super::constants::DEFAULT_TIMEOUT_SECONDS),
            max_retries: super::constants::DEFAULT_MAX_RETRIES,
        }
    }
}

/// Storage backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageBackend {
    /// In-process tree
    Memory,
    /// Firebase Realtime Database over REST
    Firebase,
}

/// A location in the remote tree.
///
/// Paths are never validated. Slashes are normalised the way the database
/// resolves them: a single leading `/`, no empty segments, no trailing `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodePath(String);

impl NodePath {
    /// Create a path from any slash-delimited string
    pub fn new(raw: impl AsRef<str>) -> Self {
        let joined = raw
            .as_ref()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        Self(format!("/{}", joined))
    }

    /// The root of the tree
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Whether this is the root path
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Append a child segment (which may itself contain slashes)
    pub fn child(&self, segment: impl fmt::Display) -> Self {
        Self::new(format!("{}/{}", self.0, segment))
    }

    /// Iterate over path segments, root first
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|segment| !segment.is_empty())
    }

    /// Last segment, `None` for the root
    pub fn key(&self) -> Option<&str> {
        self.segments().last()
    }

    /// Parent path, `None` for the root
    pub fn parent(&self) -> Option<NodePath> {
        if self.is_root() {
            return None;
        }
        let segments: Vec<&str> = self.segments().collect();
        Some(Self::new(segments[..segments.len() - 1].join("/")))
    }

    /// Whether `other` equals this path or lies beneath it
    pub fn contains(&self, other: &NodePath) -> bool {
        let mine: Vec<&str> = self.segments().collect();
        let theirs: Vec<&str> = other.segments().collect();
        theirs.starts_with(&mine)
    }

    /// Whether a change at one path can affect the value at the other
    pub fn overlaps(&self, other: &NodePath) -> bool {
        self.contains(other) || other.contains(self)
    }

    /// Path as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodePath {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for NodePath {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&NodePath> for NodePath {
    fn from(path: &NodePath) -> Self {
        path.clone()
    }
}

/// The value at a node at one instant. Absent nodes carry `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    path: NodePath,
    value: Option<Value>,
}

impl Snapshot {
    /// Create a snapshot; `null` and empty objects count as absent
    pub fn new(path: NodePath, value: Option<Value>) -> Self {
        let value = value.map(tree::normalize).filter(|v| !tree::is_empty(v));
        Self { path, value }
    }

    /// Path the snapshot was taken at
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Key of the node, `None` for the root
    pub fn key(&self) -> Option<&str> {
        self.path.key()
    }

    /// Whether the node holds data
    pub fn exists(&self) -> bool {
        self.value.is_some()
    }

    /// Borrow the value
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Take the value
    pub fn into_value(self) -> Option<Value> {
        self.value
    }

    /// Direct children in database key order.
    ///
    /// Leaf values have no children. Arrays are treated as objects keyed by index.
    pub fn children(&self) -> Vec<(String, Value)> {
        let mut children: Vec<(String, Value)> = match &self.value {
            Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .filter(|(_, v)| !tree::is_empty(v))
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect(),
            _ => Vec::new(),
        };
        children.sort_by(|(a, _), (b, _)| compare_keys(a, b));
        children
    }
}

/// Database key ordering: 32-bit integer keys first in numeric order, then
/// every other key in lexicographic order.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    match (integer_key(a), integer_key(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// A key in canonical decimal form; `"01"` and `"+1"` are plain strings
fn integer_key(key: &str) -> Option<i32> {
    key.parse::<i32>().ok().filter(|n| n.to_string() == key)
}

/// Delay before retry number `attempt + 1`: 100 ms doubling, capped
pub fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    let millis = 100u64.saturating_mul(factor).min(super::constants::MAX_BACKOFF_MS);
    Duration::from_millis(millis)
}

/// Retry wrapper for async operations
pub async fn with_retry<F, Fut, T>(
    operation: &str,
    action: F,
    max_retries: u32,
    timeout_duration: Duration,
) -> StorageResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = StorageResult<T>>,
{
    let mut last_error = None;

    for attempt in 0..=max_retries {
        let error = match timeout(timeout_duration, action()).await {
            Ok(Ok(result)) => return Ok(result),
            Ok(Err(e)) if !is_transient(&e) => return Err(e),
            Ok(Err(e)) => e,
            Err(_) => StorageError::Timeout {
                operation: operation.to_string(),
            },
        };
        warn!(operation, attempt, error = %error, "storage operation failed");
        last_error = Some(error);
        if attempt < max_retries {
            tokio::time::sleep(backoff_delay(attempt)).await;
        }
    }

    Err(last_error.unwrap_or_else(|| StorageError::OperationFailed {
        operation: operation.to_string(),
        reason: "All retry attempts failed".to_string(),
    }))
}

/// Whether retrying could change the outcome
fn is_transient(error: &StorageError) -> bool {
    match error {
        StorageError::ConnectionError { .. } | StorageError::Timeout { .. } => true,
        StorageError::Http { status, .. } => *status >= 500 || *status == 429,
        _ => false,
    }
}
