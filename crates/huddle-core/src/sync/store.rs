//! Reference-counted subscription store
//!
//! [`SyncStore`] mirrors remote snapshots into local state keyed by path.
//! Any number of consumers may subscribe to the same path; the remote store
//! only ever sees one listener per path, attached on the first subscribe and
//! detached when the last subscriber leaves.
//!
//! ## Lifecycle
//!
//! ```text
//! subscribe   0 -> 1   attach listener, loading = true
//! snapshot             data = value, loading = false, error = None
//! push error           error = message, loading = false
//! unsubscribe 1 -> 0   detach listener, drop data/loading/error
//! ```
//!
//! Writes and one-shot reads go straight to the remote store. A write never
//! touches local state; it becomes visible only when a listener pushes it
//! back.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::state::{PathState, SyncEvent};
use super::subscription::Subscription;
use crate::error::{ChatError, ChatResult};
use crate::path;
use crate::remote::{ListenerId, RemoteError, RemoteStore, SnapshotCallback};

/// Capacity of the change broadcast channel
const EVENT_CAPACITY: usize = 256;

/// Result of a successful write
#[derive(Debug, Clone, PartialEq)]
pub struct Written {
    pub path: String,
    pub value: Value,
}

struct Entry {
    /// Logical subscribers sharing the listener
    count: usize,
    /// Distinguishes this entry from earlier ones at the same path
    generation: u64,
    listener: Option<ListenerId>,
    state: PathState,
}

struct Inner {
    remote: Arc<dyn RemoteStore>,
    entries: Mutex<HashMap<String, Entry>>,
    next_generation: AtomicU64,
    events: broadcast::Sender<SyncEvent>,
}

impl Inner {
    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: SyncEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    /// Apply a pushed snapshot or error, ignoring stale listeners
    fn apply(&self, path: &str, generation: u64, result: Result<Option<Value>, RemoteError>) {
        let state = {
            let mut entries = self.entries();
            let Some(entry) = entries.get_mut(path) else {
                return;
            };
            if entry.generation != generation {
                return;
            }
            match result {
                Ok(data) => {
                    entry.state.data = data;
                    entry.state.error = None;
                }
                Err(err) => {
                    warn!(path = %path, error = %err, "Subscription reported an error");
                    entry.state.error = Some(err.message);
                }
            }
            entry.state.loading = false;
            entry.state.clone()
        };

        self.emit(SyncEvent::Updated {
            path: path.to_string(),
            state,
        });
    }
}

/// Handle to the synchronization core.
///
/// Cheap to clone; all clones share the same path map. Create one per
/// application and pass it to whatever needs remote data.
#[derive(Clone)]
pub struct SyncStore {
    inner: Arc<Inner>,
}

impl SyncStore {
    /// Create a store over a remote backend
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                remote,
                entries: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
                events,
            }),
        }
    }

    /// The remote backend
    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.inner.remote
    }

    /// Register a subscriber for `path`.
    ///
    /// The first subscriber attaches the remote listener. Every call must be
    /// paired with exactly one [`unsubscribe`](Self::unsubscribe), including
    /// calls that return an error: a failed attach still counts the
    /// subscriber and records the error in the path's state.
    pub fn subscribe(&self, path: &str) -> ChatResult<()> {
        let path = path::normalize(path);

        let generation = {
            let mut entries = self.inner.entries();
            let entry = entries.entry(path.clone()).or_insert_with(|| Entry {
                count: 0,
                generation: self.inner.next_generation.fetch_add(1, Ordering::SeqCst),
                listener: None,
                state: PathState::default(),
            });
            entry.count += 1;
            if entry.count > 1 {
                debug!(path = %path, subscribers = entry.count, "Joined existing subscription");
                return Ok(());
            }
            entry.state = PathState::pending();
            entry.generation
        };

        self.inner.emit(SyncEvent::Updated {
            path: path.clone(),
            state: PathState::pending(),
        });

        let callback = snapshot_callback(Arc::downgrade(&self.inner), path.clone(), generation);
        match self.inner.remote.listen(&path, callback) {
            Ok(id) => {
                let orphaned = {
                    let mut entries = self.inner.entries();
                    match entries.get_mut(&path) {
                        Some(entry) if entry.generation == generation => {
                            entry.listener = Some(id);
                            false
                        }
                        _ => true,
                    }
                };
                if orphaned {
                    // Every subscriber left while the listener was attaching
                    debug!(path = %path, "Detaching listener for abandoned subscription");
                    self.inner.remote.detach(id);
                } else {
                    debug!(path = %path, listener = %id, "Subscribed");
                }
                Ok(())
            }
            Err(err) => {
                warn!(path = %path, error = %err, "Failed to attach listener");
                self.inner.apply(&path, generation, Err(err.clone()));
                Err(ChatError::Subscription {
                    path,
                    message: err.message,
                })
            }
        }
    }

    /// Release one subscriber of `path`.
    ///
    /// The last subscriber detaches the listener and clears the path's
    /// state. Unsubscribing a path nobody subscribed to is a no-op.
    pub fn unsubscribe(&self, path: &str) {
        let path = path::normalize(path);

        let listener = {
            let mut entries = self.inner.entries();
            let Some(entry) = entries.get_mut(&path) else {
                warn!(path = %path, "Unsubscribe without a matching subscribe");
                return;
            };
            entry.count = entry.count.saturating_sub(1);
            if entry.count > 0 {
                debug!(path = %path, subscribers = entry.count, "Left shared subscription");
                return;
            }
            entries.remove(&path).and_then(|entry| entry.listener)
        };

        if let Some(id) = listener {
            self.inner.remote.detach(id);
        }
        debug!(path = %path, "Unsubscribed");
        self.inner.emit(SyncEvent::Cleared { path });
    }

    /// Subscribe to `path` and get a guard that unsubscribes when dropped.
    ///
    /// Attach failures are reported through the guard's state.
    pub fn watch(&self, path: &str) -> Subscription {
        let events = self.inner.events.subscribe();
        let path = path::normalize(path);
        // The error is kept in the path state; the guard still owns the count
        let _ = self.subscribe(&path);
        Subscription::new(self.clone(), path, events)
    }

    /// Watch several paths at once, one guard per path
    pub fn watch_many<I, S>(&self, paths: I) -> Vec<Subscription>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        paths
            .into_iter()
            .map(|p| self.watch(p.as_ref()))
            .collect()
    }

    /// Overwrite the subtree at `path` (last write wins).
    ///
    /// Local state is not updated; listeners on the path will see the new
    /// value when the store pushes it.
    pub async fn write(&self, path: &str, value: Value) -> ChatResult<Written> {
        let path = path::normalize(path);
        match self.inner.remote.set(&path, value.clone()).await {
            Ok(()) => {
                debug!(path = %path, "Write complete");
                Ok(Written { path, value })
            }
            Err(err) => {
                warn!(path = %path, error = %err, "Write failed");
                Err(ChatError::Write {
                    path,
                    message: err.message,
                })
            }
        }
    }

    /// Fetch the current snapshot at `path` without subscribing
    pub async fn read_once(&self, path: &str) -> ChatResult<Option<Value>> {
        let path = path::normalize(path);
        self.inner.remote.get(&path).await.map_err(|err| {
            warn!(path = %path, error = %err, "Read failed");
            ChatError::Read {
                path,
                message: err.message,
            }
        })
    }

    /// Generate a unique child key under `path`
    pub fn push_key(&self, path: &str) -> String {
        self.inner.remote.push_key(&path::normalize(path))
    }

    /// Current state of `path`; idle and empty if nobody subscribes to it
    pub fn state(&self, path: &str) -> PathState {
        let path = path::normalize(path);
        self.inner
            .entries()
            .get(&path)
            .map(|entry| entry.state.clone())
            .unwrap_or_default()
    }

    /// Last snapshot for `path`, if subscribed and loaded
    pub fn data(&self, path: &str) -> Option<Value> {
        self.state(path).data
    }

    /// Number of logical subscribers of `path`
    pub fn subscriber_count(&self, path: &str) -> usize {
        let path = path::normalize(path);
        self.inner
            .entries()
            .get(&path)
            .map(|entry| entry.count)
            .unwrap_or(0)
    }

    /// Paths with at least one subscriber, sorted
    pub fn active_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .inner
            .entries()
            .iter()
            .filter(|(_, entry)| entry.count > 0)
            .map(|(path, _)| path.clone())
            .collect();
        paths.sort();
        paths
    }

    /// Receive every state change from now on
    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }
}

fn snapshot_callback(inner: Weak<Inner>, path: String, generation: u64) -> SnapshotCallback {
    Arc::new(move |result| {
        if let Some(inner) = inner.upgrade() {
            inner.apply(&path, generation, result);
        }
    })
}
