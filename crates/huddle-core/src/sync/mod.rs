//! Synchronization core
//!
//! Keeps a path-keyed mirror of remote snapshots with reference-counted
//! listeners.
//!
//! ## Usage
//!
//! ```ignore
//! let store = SyncStore::new(Arc::new(MemoryStore::new()));
//!
//! // Guard-based: unsubscribes on drop
//! let mut messages = store.watch("messages/c1");
//! let state = messages.settled().await;
//!
//! // Explicit pairing
//! store.subscribe("presence")?;
//! let presence = store.state("presence");
//! store.unsubscribe("presence");
//! ```

mod state;
mod store;
mod subscription;

pub use state::{PathState, SyncEvent};
pub use store::{SyncStore, Written};
pub use subscription::Subscription;
