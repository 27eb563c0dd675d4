//! Store client trait consumed by the series adapter

use crate::error::StorageResult;
use crate::storage::storage_api::{NodePath, Snapshot, StorageBackend};
use crate::storage::subscription::Subscription;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Client for a hierarchical key-value store
pub trait StoreClient: Send + Sync {
    /// Read the current value at a node, once
    fn fetch(&self, path: &NodePath) -> impl Future<Output = StorageResult<Snapshot>> + Send;

    /// Replace the node at a path
    fn set(&self, path: &NodePath, value: Value) -> impl Future<Output = StorageResult<()>> + Send;

    /// Merge the direct children of `value` into the node at a path
    fn update(&self, path: &NodePath, value: Value) -> impl Future<Output = StorageResult<()>> + Send;

    /// Delete the subtree at a path
    fn remove(&self, path: &NodePath) -> impl Future<Output = StorageResult<()>> + Send;

    /// Observe a node until the returned handle is dropped
    fn subscribe(&self, path: &NodePath) -> impl Future<Output = StorageResult<Subscription>> + Send;

    /// Get storage backend type
    fn backend_type(&self) -> StorageBackend;
}

impl<C: StoreClient> StoreClient for Arc<C> {
    fn fetch(&self, path: &NodePath) -> impl Future<Output = StorageResult<Snapshot>> + Send {
        (**self).fetch(path)
    }

    fn set(&self, path: &NodePath, value: Value) -> impl Future<Output = StorageResult<()>> + Send {
        (**self).set(path, value)
    }

    fn update(&self, path: &NodePath, value: Value) -> impl Future<Output = StorageResult<()>> + Send {
        (**self).update(path, value)
    }

    fn remove(&self, path: &NodePath) -> impl Future<Output = StorageResult<()>> + Send {
        (**self).remove(path)
    }

    fn subscribe(&self, path: &NodePath) -> impl Future<Output = StorageResult<Subscription>> + Send {
        (**self).subscribe(path)
    }

    fn backend_type(&self) -> StorageBackend {
        (**self).backend_type()
    }
}
