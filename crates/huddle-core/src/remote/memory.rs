//! In-process remote store
//!
//! A JSON tree with the same observable behavior as the hosted database:
//! listeners fire with the full snapshot of their path whenever a write
//! changes it, writing `null` (or an empty object) deletes a subtree and
//! prunes parents left empty, and reads of missing paths return nothing.
//!
//! Faults can be injected per path prefix to exercise error handling, and
//! [`StoreStats`] counts attaches, detaches, reads and writes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use super::push_key::PushKeyGenerator;
use super::{ListenerId, RemoteError, RemoteStore, SnapshotCallback};
use crate::path;

/// Operation a fault applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Read,
    Write,
    Listen,
}

/// Operation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Listeners successfully attached
    pub attaches: usize,
    /// Listeners detached
    pub detaches: usize,
    /// `set` calls, including rejected ones
    pub writes: usize,
    /// `get` calls, including rejected ones
    pub reads: usize,
    /// Listeners currently attached
    pub active_listeners: usize,
}

struct Listener {
    path: String,
    callback: SnapshotCallback,
}

#[derive(Default)]
struct Tree {
    root: Value,
    listeners: HashMap<u64, Listener>,
}

/// In-memory implementation of [`RemoteStore`]
#[derive(Default)]
pub struct MemoryStore {
    tree: Mutex<Tree>,
    /// Held while callbacks run so snapshots reach listeners in write order
    delivery: Mutex<()>,
    faults: Mutex<Vec<(Fault, String)>>,
    keys: PushKeyGenerator,
    next_listener: AtomicU64,
    attaches: AtomicUsize,
    detaches: AtomicUsize,
    writes: AtomicUsize,
    reads: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding an existing tree
    pub fn with_root(root: Value) -> Self {
        let store = Self::new();
        lock(&store.tree).root = normalize_value(root).unwrap_or(Value::Null);
        store
    }

    /// Copy of the whole tree
    pub fn root(&self) -> Value {
        lock(&self.tree).root.clone()
    }

    /// Current snapshot at a path, without counting a read
    pub fn peek(&self, path: &str) -> Option<Value> {
        get_at(&lock(&self.tree).root, path).cloned()
    }

    /// Operation counters
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            attaches: self.attaches.load(Ordering::SeqCst),
            detaches: self.detaches.load(Ordering::SeqCst),
            writes: self.writes.load(Ordering::SeqCst),
            reads: self.reads.load(Ordering::SeqCst),
            active_listeners: lock(&self.tree).listeners.len(),
        }
    }

    /// Reject `fault` operations on `prefix` and everything below it
    pub fn fail(&self, fault: Fault, prefix: &str) {
        lock(&self.faults).push((fault, path::normalize(prefix)));
    }

    /// Remove all injected faults
    pub fn clear_faults(&self) {
        lock(&self.faults).clear();
    }

    /// Report a push error to every listener at or below `path`
    pub fn fail_listeners(&self, path: &str, message: &str) {
        let target = path::normalize(path);
        let callbacks: Vec<SnapshotCallback> = {
            let tree = lock(&self.tree);
            tree.listeners
                .values()
                .filter(|l| path::is_ancestor_or_self(&target, &l.path))
                .map(|l| l.callback.clone())
                .collect()
        };
        let _delivery = lock(&self.delivery);
        for callback in callbacks {
            callback(Err(RemoteError::new("LISTENER_ERROR", message)));
        }
    }

    fn check_fault(&self, fault: Fault, path: &str) -> Result<(), RemoteError> {
        let faults = lock(&self.faults);
        let denied = faults
            .iter()
            .any(|(f, prefix)| *f == fault && path::is_ancestor_or_self(prefix, path));
        if denied {
            Err(RemoteError::permission_denied(path))
        } else {
            Ok(())
        }
    }

    /// Count and fault-check a write, then apply it
    pub(crate) fn write_with<F>(&self, path: &str, value: Value, persist: F) -> Result<(), RemoteError>
    where
        F: FnOnce(&Value) -> Result<(), RemoteError>,
    {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let path = path::normalize(path);
        self.check_fault(Fault::Write, &path)?;
        self.apply(&path, value, persist)
    }

    /// Apply a write, run `persist` on the resulting tree, then notify.
    ///
    /// If `persist` fails the tree is left unchanged and nobody is notified.
    pub(crate) fn apply<F>(&self, path: &str, value: Value, persist: F) -> Result<(), RemoteError>
    where
        F: FnOnce(&Value) -> Result<(), RemoteError>,
    {
        let path = path::normalize(path);
        let segments: Vec<&str> = path::segments(&path).collect();
        let value = normalize_value(value);

        let (deliveries, _delivery) = {
            let mut tree = lock(&self.tree);

            let affected: Vec<(String, SnapshotCallback, Option<Value>)> = tree
                .listeners
                .values()
                .filter(|l| path::overlaps(&l.path, &path))
                .map(|l| {
                    let before = get_at(&tree.root, &l.path).cloned();
                    (l.path.clone(), l.callback.clone(), before)
                })
                .collect();

            let mut next = tree.root.clone();
            set_at(&mut next, &segments, value);
            persist(&next)?;
            tree.root = next;

            let deliveries: Vec<(SnapshotCallback, Option<Value>)> = affected
                .into_iter()
                .filter_map(|(listened, callback, before)| {
                    let after = get_at(&tree.root, &listened).cloned();
                    (after != before).then_some((callback, after))
                })
                .collect();

            // Take the delivery lock before releasing the tree so a later
            // write can't overtake this one's notifications.
            (deliveries, lock(&self.delivery))
        };

        trace!(path = %path, listeners = deliveries.len(), "Delivering snapshots");
        for (callback, snapshot) in deliveries {
            callback(Ok(snapshot));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn listen(&self, path: &str, callback: SnapshotCallback) -> Result<ListenerId, RemoteError> {
        let path = path::normalize(path);
        self.check_fault(Fault::Listen, &path)?;

        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        let (snapshot, _delivery) = {
            let mut tree = lock(&self.tree);
            tree.listeners.insert(
                id,
                Listener {
                    path: path.clone(),
                    callback: callback.clone(),
                },
            );
            let snapshot = get_at(&tree.root, &path).cloned();
            (snapshot, lock(&self.delivery))
        };
        self.attaches.fetch_add(1, Ordering::SeqCst);
        debug!(path = %path, listener = id, "Listener attached");

        callback(Ok(snapshot));
        Ok(ListenerId(id))
    }

    fn detach(&self, id: ListenerId) {
        let removed = lock(&self.tree).listeners.remove(&id.0);
        if let Some(listener) = removed {
            self.detaches.fetch_add(1, Ordering::SeqCst);
            debug!(path = %listener.path, listener = id.0, "Listener detached");
        }
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), RemoteError> {
        self.write_with(path, value, |_| Ok(()))
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, RemoteError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let path = path::normalize(path);
        self.check_fault(Fault::Read, &path)?;
        Ok(self.peek(&path))
    }

    fn push_key(&self, _path: &str) -> String {
        self.keys.generate()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Strip nulls and empty objects; `None` means "no data".
fn normalize_value(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let cleaned: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| normalize_value(v).map(|v| (k, v)))
                .collect();
            (!cleaned.is_empty()).then_some(Value::Object(cleaned))
        }
        other => Some(other),
    }
}

fn get_at<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut node = root;
    for segment in path::segments(path) {
        node = node.as_object()?.get(segment)?;
    }
    (!node.is_null()).then_some(node)
}

fn set_at(node: &mut Value, segments: &[&str], value: Option<Value>) {
    let Some((first, rest)) = segments.split_first() else {
        *node = value.unwrap_or(Value::Null);
        return;
    };

    if !node.is_object() {
        if value.is_none() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    let Some(map) = node.as_object_mut() else {
        return;
    };

    if rest.is_empty() {
        match value {
            Some(v) => {
                map.insert(first.to_string(), v);
            }
            None => {
                map.remove(*first);
            }
        }
    } else {
        if value.is_none() && !map.contains_key(*first) {
            return;
        }
        let child = map.entry(first.to_string()).or_insert(Value::Null);
        set_at(child, rest, value);
        let empty = match child {
            Value::Null => true,
            Value::Object(m) => m.is_empty(),
            _ => false,
        };
        if empty {
            map.remove(*first);
        }
    }

    if map.is_empty() {
        *node = Value::Null;
    }
}
