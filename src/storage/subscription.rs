//! Live observation of a node, owned by a handle.
//!
//! A [`Subscription`] delivers the node's current value once it is loaded and
//! then every distinct value after that. The listener lives exactly as long
//! as the handle: dropping it (or calling [`Subscription::unsubscribe`])
//! releases the backend resources.

use crate::storage::storage_api::{NodePath, Snapshot};
use futures::Stream;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::debug;

/// Sending half held by a backend. `None` means "not loaded yet".
pub(crate) type SnapshotSender = watch::Sender<Option<Snapshot>>;

/// Publish `snapshot` unless it equals the last published value.
///
/// Returns whether subscribers were notified.
pub(crate) fn publish(sender: &SnapshotSender, snapshot: Snapshot) -> bool {
    sender.send_if_modified(|current| {
        if current.as_ref() == Some(&snapshot) {
            false
        } else {
            *current = Some(snapshot);
            true
        }
    })
}

/// Handle to a live subscription
#[derive(Debug)]
pub struct Subscription {
    path: NodePath,
    receiver: watch::Receiver<Option<Snapshot>>,
    task: Option<AbortHandle>,
}

impl Subscription {
    /// Wrap a receiver; `task` is aborted when the handle is released
    pub(crate) fn new(
        path: NodePath,
        mut receiver: watch::Receiver<Option<Snapshot>>,
        task: Option<AbortHandle>,
    ) -> Self {
        // the value already loaded counts as the first delivery
        receiver.mark_changed();
        Self { path, receiver, task }
    }

    /// Path being observed
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Last received snapshot, `None` until the first load completes
    pub fn current(&self) -> Option<Snapshot> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next distinct snapshot.
    ///
    /// Returns `None` once the backend closes the subscription.
    pub async fn next(&mut self) -> Option<Snapshot> {
        loop {
            if self.receiver.changed().await.is_err() {
                debug!(path = %self.path, "subscription source closed");
                return None;
            }
            let loaded = self.receiver.borrow_and_update().clone();
            if let Some(snapshot) = loaded {
                return Some(snapshot);
            }
        }
    }

    /// Turn the handle into a stream of snapshots
    pub fn into_stream(self) -> impl Stream<Item = Snapshot> + Send {
        futures::stream::unfold(self, |mut subscription| async move {
            let snapshot = subscription.next().await?;
            Some((snapshot, subscription))
        })
    }

    /// Release the subscription
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        debug!(path = %self.path, "subscription released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    fn snapshot(value: serde_json::Value) -> Snapshot {
        Snapshot::new(NodePath::new("/n"), Some(value))
    }

    #[test]
    fn test_first_delivery_is_current_value() {
        let (sender, receiver) = watch::channel(Some(snapshot(json!(1))));
        let mut subscription = Subscription::new(NodePath::new("/n"), receiver, None);

        let mut next = task::spawn(subscription.next());
        assert_ready_eq!(next.poll(), Some(snapshot(json!(1))));
        drop(next);

        let mut next = task::spawn(subscription.next());
        assert_pending!(next.poll());
        drop(sender);
        assert_ready_eq!(next.poll(), None);
    }

    #[test]
    fn test_waits_for_initial_load() {
        let (sender, receiver) = watch::channel(None);
        let mut subscription = Subscription::new(NodePath::new("/n"), receiver, None);
        assert!(subscription.current().is_none());

        let mut next = task::spawn(subscription.next());
        assert_pending!(next.poll());
        assert!(publish(&sender, snapshot(json!("loaded"))));
        assert!(next.is_woken());
        assert_ready_eq!(next.poll(), Some(snapshot(json!("loaded"))));
    }

    #[test]
    fn test_publish_skips_identical_values() {
        let (sender, _receiver) = watch::channel(None);
        assert!(publish(&sender, snapshot(json!({"a": 1}))));
        assert!(!publish(&sender, snapshot(json!({"a": 1}))));
        assert!(publish(&sender, snapshot(json!({"a": 2}))));
    }

    #[tokio::test]
    async fn test_into_stream() {
        let (sender, receiver) = watch::channel(Some(snapshot(json!(1))));
        let subscription = Subscription::new(NodePath::new("/n"), receiver, None);
        let mut stream = Box::pin(subscription.into_stream());

        assert_eq!(stream.next().await, Some(snapshot(json!(1))));
        publish(&sender, snapshot(json!(2)));
        assert_eq!(stream.next().await, Some(snapshot(json!(2))));
        drop(sender);
        assert_eq!(stream.next().await, None);
    }

    #[test]
    fn test_drop_closes_receiver() {
        let (sender, receiver) = watch::channel(None);
        let subscription = Subscription::new(NodePath::new("/n"), receiver, None);
        assert!(!sender.is_closed());
        subscription.unsubscribe();
        assert!(sender.is_closed());
    }
}
