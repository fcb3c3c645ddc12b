//! Remote data store boundary
//!
//! The hosted realtime database is a path-addressed JSON tree with
//! push-based listeners and last-write-wins writes. [`RemoteStore`] is the
//! slice of it the synchronization core consumes:
//!
//! - `listen` / `detach`: attach a snapshot callback to a path
//! - `set`: overwrite the subtree at a path (`Null` deletes it)
//! - `get`: read the current snapshot once
//! - `push_key`: generate a unique, time-ordered child key
//!
//! Two implementations ship with the crate: [`MemoryStore`] (in-process,
//! used by tests) and [`FileStore`] (a `MemoryStore` persisted to disk, used
//! by the CLI as a local stand-in for the hosted database).

mod file;
mod memory;
mod push_key;

pub use file::FileStore;
pub use memory::{Fault, MemoryStore, StoreStats};
pub use push_key::PushKeyGenerator;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Error reported by the remote store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct RemoteError {
    /// Machine-readable code (`PERMISSION_DENIED`, `NETWORK_ERROR`, ...)
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl RemoteError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn permission_denied(path: &str) -> Self {
        Self::new(
            "PERMISSION_DENIED",
            format!(
                "Client doesn't have permission to access the desired data at /{}",
                path
            ),
        )
    }
}

/// Handle identifying one attached listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Callback receiving every snapshot (or push error) for a listened path.
///
/// `Ok(None)` means the path holds no data. Callbacks run on whatever task
/// delivered the change and must not block or write back to the store.
pub type SnapshotCallback = Arc<dyn Fn(Result<Option<Value>, RemoteError>) + Send + Sync>;

/// The operations the synchronization core needs from the hosted store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Attach a listener. The current snapshot is delivered once attached,
    /// then again after every change under the path.
    fn listen(&self, path: &str, callback: SnapshotCallback) -> Result<ListenerId, RemoteError>;

    /// Detach a listener. Unknown ids are ignored.
    fn detach(&self, id: ListenerId);

    /// Overwrite the subtree at `path`. Writing `Value::Null` deletes it.
    async fn set(&self, path: &str, value: Value) -> Result<(), RemoteError>;

    /// Read the current snapshot without listening
    async fn get(&self, path: &str) -> Result<Option<Value>, RemoteError>;

    /// Generate a unique child key for `path`
    fn push_key(&self, path: &str) -> String;
}
