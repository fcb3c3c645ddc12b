//! Subscription guard
//!
//! [`Subscription`] ties one logical subscriber to a scope: it subscribes on
//! creation and unsubscribes exactly once when dropped, so the
//! subscribe/unsubscribe pairing the store relies on can't be broken.

use tokio::sync::broadcast::{self, error::RecvError};

use super::state::{PathState, SyncEvent};
use super::store::SyncStore;

/// A live subscription to one path
pub struct Subscription {
    store: SyncStore,
    path: String,
    events: broadcast::Receiver<SyncEvent>,
    released: bool,
}

impl Subscription {
    pub(crate) fn new(store: SyncStore, path: String, events: broadcast::Receiver<SyncEvent>) -> Self {
        Self {
            store,
            path,
            events,
            released: false,
        }
    }

    /// The subscribed path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Current state of the path
    pub fn state(&self) -> PathState {
        self.store.state(&self.path)
    }

    /// Wait for the next change to this path.
    ///
    /// Returns `None` once the store has been dropped. If this receiver fell
    /// behind, the current state is returned instead of the missed ones.
    pub async fn changed(&mut self) -> Option<PathState> {
        loop {
            match self.events.recv().await {
                Ok(SyncEvent::Updated { path, state }) if path == self.path => {
                    return Some(state)
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(_)) => return Some(self.state()),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Wait until the path has settled (first snapshot or error received)
    pub async fn settled(&mut self) -> PathState {
        loop {
            let state = self.state();
            if state.is_settled() {
                return state;
            }
            match self.changed().await {
                Some(state) if state.is_settled() => return state,
                Some(_) => continue,
                None => return self.state(),
            }
        }
    }

    /// Release the subscription now
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.store.unsubscribe(&self.path);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("path", &self.path)
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryStore, RemoteStore};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_drop_unsubscribes_once() {
        let remote = Arc::new(MemoryStore::new());
        let store = SyncStore::new(remote.clone());

        let first = store.watch("messages/c1");
        let second = store.watch("messages/c1");
        assert_eq!(store.subscriber_count("messages/c1"), 2);

        drop(first);
        assert_eq!(store.subscriber_count("messages/c1"), 1);
        assert_eq!(remote.stats().active_listeners, 1);

        second.unsubscribe();
        assert_eq!(store.subscriber_count("messages/c1"), 0);
        assert_eq!(remote.stats().detaches, 1);
    }

    #[tokio::test]
    async fn test_changed_filters_by_path() {
        let remote = Arc::new(MemoryStore::new());
        let store = SyncStore::new(remote.clone());
        let mut messages = store.watch("messages/c1");
        let _presence = store.watch("presence");

        remote.set("presence/u1/isOnline", json!(true)).await.unwrap();
        remote.set("messages/c1/m1", json!({"content": "hi"})).await.unwrap();

        let mut last = None;
        while let Ok(Some(state)) =
            tokio::time::timeout(std::time::Duration::from_millis(20), messages.changed()).await
        {
            last = Some(state);
        }
        assert_eq!(last.unwrap().data, Some(json!({"m1": {"content": "hi"}})));
    }

    #[tokio::test]
    async fn test_settled_returns_loaded_state() {
        let remote = Arc::new(MemoryStore::new());
        remote.set("channels/c1/name", json!("general")).await.unwrap();
        let store = SyncStore::new(remote.clone());

        let mut channel = store.watch("channels/c1");
        let state = channel.settled().await;
        assert_eq!(state.data, Some(json!({"name": "general"})));
        assert_eq!(channel.path(), "channels/c1");
    }
}
