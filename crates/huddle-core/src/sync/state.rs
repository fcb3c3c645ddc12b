//! Per-path synchronization state
//!
//! What consumers see for a subscribed path: the last snapshot, whether the
//! first snapshot is still pending, and the last error reported for it.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Reactive view of one path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathState {
    /// Last snapshot pushed by the store; `None` when absent or not yet loaded
    pub data: Option<Value>,
    /// True from attach until the first snapshot or error arrives
    pub loading: bool,
    /// Last push or attach error
    pub error: Option<String>,
}

impl PathState {
    /// State of a freshly attached path
    pub fn pending() -> Self {
        Self {
            data: None,
            loading: true,
            error: None,
        }
    }

    /// Decode the snapshot into a typed value.
    ///
    /// Returns `None` when there is no data or it doesn't decode.
    pub fn decode<T: DeserializeOwned>(&self) -> Option<T> {
        self.data
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// True once a snapshot or error has been received
    pub fn is_settled(&self) -> bool {
        !self.loading
    }
}

/// Change notification broadcast by the sync store
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A path's state changed
    Updated { path: String, state: PathState },
    /// The last subscriber left; the path's state was dropped
    Cleared { path: String },
}

impl SyncEvent {
    /// Path this event is about
    pub fn path(&self) -> &str {
        match self {
            SyncEvent::Updated { path, .. } | SyncEvent::Cleared { path } => path,
        }
    }
}
