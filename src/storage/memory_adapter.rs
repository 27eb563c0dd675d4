//! Memory storage adapter

use crate::error::{StorageError, StorageResult};
use crate::storage::adapter::StoreClient;
use crate::storage::storage_api::{NodePath, Snapshot, StorageBackend};
use crate::storage::subscription::{publish, SnapshotSender, Subscription};
use crate::storage::tree::Tree;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Debug)]
struct Watcher {
    path: NodePath,
    sender: SnapshotSender,
}

#[derive(Debug, Default)]
struct MemoryState {
    tree: Tree,
    watchers: Vec<Watcher>,
    fail_writes: bool,
}

impl MemoryState {
    fn snapshot(&self, path: &NodePath) -> Snapshot {
        Snapshot::new(path.clone(), self.tree.get(path).cloned())
    }

    /// Notify every live watcher whose node may have changed
    fn notify(&mut self, changed: &NodePath) {
        self.watchers.retain(|watcher| !watcher.sender.is_closed());
        for watcher in &self.watchers {
            if watcher.path.overlaps(changed) && publish(&watcher.sender, self.snapshot(&watcher.path)) {
                debug!(path = %watcher.path, "notified subscriber");
            }
        }
    }
}

/// In-memory hierarchical store with live subscriptions.
///
/// Clones share the same tree. Useful for testing and local development.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Create an empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail until switched off again
    pub fn set_fail_writes(&self, fail: bool) -> StorageResult<()> {
        self.lock()?.fail_writes = fail;
        Ok(())
    }

    /// Number of subscriptions whose handle is still alive
    pub fn active_subscriptions(&self) -> StorageResult<usize> {
        let mut state = self.lock()?;
        state.watchers.retain(|watcher| !watcher.sender.is_closed());
        Ok(state.watchers.len())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn write<F>(&self, operation: &str, path: &NodePath, apply: F) -> StorageResult<()>
    where
        F: FnOnce(&mut Tree),
    {
        let mut state = self.lock()?;
        if state.fail_writes {
            warn!(operation, %path, "rejecting write");
            return Err(StorageError::OperationFailed {
                operation: operation.to_string(),
                reason: format!("writes to {} are disabled", path),
            });
        }
        apply(&mut state.tree);
        debug!(operation, %path, "applied write");
        state.notify(path);
        Ok(())
    }
}

impl StoreClient for MemoryStore {
    async fn fetch(&self, path: &NodePath) -> StorageResult<Snapshot> {
        Ok(self.lock()?.snapshot(path))
    }

    async fn set(&self, path: &NodePath, value: Value) -> StorageResult<()> {
        self.write("set", path, |tree| tree.set(path, value))
    }

    async fn update(&self, path: &NodePath, value: Value) -> StorageResult<()> {
        self.write("update", path, |tree| tree.update(path, value))
    }

    async fn remove(&self, path: &NodePath) -> StorageResult<()> {
        self.write("remove", path, |tree| tree.remove(path))
    }

    async fn subscribe(&self, path: &NodePath) -> StorageResult<Subscription> {
        let mut state = self.lock()?;
        let (sender, receiver) = watch::channel(Some(state.snapshot(path)));
        state.watchers.push(Watcher {
            path: path.clone(),
            sender,
        });
        debug!(%path, "subscribed");
        Ok(Subscription::new(path.clone(), receiver, None))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
