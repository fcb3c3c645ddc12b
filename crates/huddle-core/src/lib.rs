//! Huddle Core Library
//!
//! This crate provides the client-side data layer for huddle, a real-time
//! team chat: channels, messages and presence kept in a hierarchical
//! JSON store that pushes changes to subscribers.
//!
//! # Architecture
//!
//! - **Remote store**: Source of truth, addressed by slash-separated paths
//! - **SyncStore**: Reference-counted subscriptions mirroring remote paths
//!   into local state (one remote listener per path)
//! - **ChatService**: Typed channel, message and presence operations
//!
//! Writes go straight to the remote store; local state only changes when a
//! listener pushes the new value back.
//!
//! # Quick Start
//!
//! ```text
//! let remote = Arc::new(FileStore::open(config.store_path())?);
//! let store = SyncStore::new(remote);
//! let chat = ChatService::new(store.clone());
//!
//! let channel = chat.create_channel("u1", "general", ChannelKind::Text).await?;
//! chat.send_message(&channel.id, "u1", "Ada", None, "hello").await?;
//!
//! let mut messages = store.watch(&path::messages(&channel.id));
//! let state = messages.settled().await;
//! let list = views::message_list(state.data.as_ref());
//! ```
//!
//! # Modules
//!
//! - `sync`: Subscription store and path state
//! - `chat`: Channel, message and presence operations
//! - `views`: Derived lists and online status
//! - `session`: Auth-driven session setup
//! - `remote`: Remote store boundary and local implementations
//! - `auth`: Auth provider boundary
//! - `models`: Channel, Message and Presence records
//! - `path`: Store path layout
//! - `config`: Application configuration

pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod models;
pub mod path;
pub mod remote;
pub mod session;
pub mod sync;
pub mod views;

pub use auth::{AuthError, AuthEvent, AuthProvider, AuthUser, MemoryAuth};
pub use chat::{ChatService, DefaultChannel, DeletedChannel};
pub use config::Config;
pub use error::{ChatError, ChatResult};
pub use models::{Channel, ChannelKind, Message, Presence, Profile};
pub use remote::{FileStore, MemoryStore, RemoteError, RemoteStore};
pub use session::{SessionOutcome, SessionReactor};
pub use sync::{PathState, Subscription, SyncEvent, SyncStore, Written};
pub use views::{ChannelDirectory, PresencePartition};
