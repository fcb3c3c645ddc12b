//! Typed chat operations
//!
//! [`ChatService`] implements channel, message and presence operations on
//! top of the generic path reads and writes of [`SyncStore`]. Nothing here
//! touches local state: results become visible through subscriptions once
//! the remote store pushes them back.
//!
//! Multi-write operations (create, join, delete) are not transactional. A
//! failure part-way leaves the earlier writes in place.

use std::collections::BTreeSet;

use futures_util::future::join_all;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{ChatError, ChatResult};
use crate::models::{non_empty, now_millis, Channel, ChannelKind, Message, Presence, Profile};
use crate::path;
use crate::sync::SyncStore;

/// Name of the channel created for users with no channels
pub const DEFAULT_CHANNEL_NAME: &str = "general";

/// Outcome of [`ChatService::ensure_default_channel`]
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultChannel {
    /// The user already belongs to these channels
    Existing(Vec<String>),
    /// The user had none; this one was created
    Created(Channel),
}

/// Outcome of [`ChatService::delete_channel`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedChannel {
    pub channel_id: String,
    /// Users whose channel index entry was removed
    pub unindexed: Vec<String>,
}

/// Channel, message and presence operations
#[derive(Clone)]
pub struct ChatService {
    store: SyncStore,
    default_channel_name: String,
}

impl ChatService {
    pub fn new(store: SyncStore) -> Self {
        Self {
            store,
            default_channel_name: DEFAULT_CHANNEL_NAME.to_string(),
        }
    }

    /// Use a different name for auto-created channels
    pub fn with_default_channel_name(mut self, name: impl Into<String>) -> Self {
        self.default_channel_name = name.into();
        self
    }

    pub fn store(&self) -> &SyncStore {
        &self.store
    }

    // ==================== Channels ====================

    /// Create a channel with `user_id` as its only member.
    ///
    /// Writes the channel record, then the creator's index entry.
    pub async fn create_channel(
        &self,
        user_id: &str,
        name: &str,
        kind: ChannelKind,
    ) -> ChatResult<Channel> {
        let name = validate_name(name)?;
        self.insert_channel(user_id, name, kind).await
    }

    /// Make sure the user belongs to at least one channel.
    ///
    /// Reads the user's channel index; if it is missing or empty, a channel
    /// with the default name is created the same way `create_channel` does.
    pub async fn ensure_default_channel(&self, user_id: &str) -> ChatResult<DefaultChannel> {
        let index = self.store.read_once(&path::user_channels(user_id)).await?;

        let existing: Vec<String> = match index {
            Some(Value::Object(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        };
        if !existing.is_empty() {
            debug!(user = %user_id, channels = existing.len(), "User already has channels");
            return Ok(DefaultChannel::Existing(existing));
        }

        let name = validate_name(&self.default_channel_name)?;
        let channel = self.insert_channel(user_id, name, ChannelKind::Text).await?;
        info!(user = %user_id, channel = %channel.id, "Created default channel");
        Ok(DefaultChannel::Created(channel))
    }

    /// Rename a channel. Only the `name` field is written.
    ///
    /// Whether `user_id` may rename it is up to the store's security rules.
    pub async fn update_channel(
        &self,
        channel_id: &str,
        name: &str,
        user_id: &str,
    ) -> ChatResult<(String, String)> {
        let name = validate_name(name)?;
        self.store
            .write(&path::channel_name(channel_id), json!(name))
            .await?;
        debug!(channel = %channel_id, user = %user_id, "Channel renamed");
        Ok((channel_id.to_string(), name))
    }

    /// Delete a channel and remove it from every member's index.
    ///
    /// The channel is read first to learn its members; the acting user's
    /// entry is removed even if they aren't listed as a member. If the read
    /// is refused only the acting user's entry is removed.
    pub async fn delete_channel(&self, channel_id: &str, user_id: &str) -> ChatResult<DeletedChannel> {
        let channel_path = path::channel(channel_id);
        let snapshot = match self.store.read_once(&channel_path).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(channel = %channel_id, error = %err, "Could not read channel members");
                None
            }
        };

        let mut users: BTreeSet<String> = snapshot
            .as_ref()
            .and_then(|value| Channel::from_snapshot(channel_id, value))
            .map(|channel| channel.member_ids().into_iter().collect())
            .unwrap_or_default();
        users.insert(user_id.to_string());

        self.store.write(&channel_path, Value::Null).await?;

        let removals = users.iter().map(|member| {
            let entry = path::user_channel_entry(member, channel_id);
            async move { self.store.write(&entry, Value::Null).await }
        });
        let results = join_all(removals).await;

        let mut unindexed = Vec::new();
        let mut first_error = None;
        for (member, result) in users.into_iter().zip(results) {
            match result {
                Ok(_) => unindexed.push(member),
                Err(err) => {
                    warn!(channel = %channel_id, user = %member, error = %err, "Failed to remove channel from index");
                    first_error.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        info!(channel = %channel_id, members = unindexed.len(), "Channel deleted");
        Ok(DeletedChannel {
            channel_id: channel_id.to_string(),
            unindexed,
        })
    }

    /// Add `user_id` to an existing channel.
    ///
    /// Returns the channel as it was read before joining.
    pub async fn join_channel(&self, channel_id: &str, user_id: &str) -> ChatResult<Channel> {
        let channel_path = path::channel(channel_id);
        let snapshot = self
            .store
            .read_once(&channel_path)
            .await?
            .ok_or_else(|| ChatError::NotFound {
                what: "Channel",
                id: channel_id.to_string(),
            })?;

        let channel = Channel::from_record(channel_id, &snapshot);

        self.store
            .write(&path::channel_member(channel_id, user_id), json!(true))
            .await?;
        self.store
            .write(&path::user_channel_entry(user_id, channel_id), json!(true))
            .await?;

        info!(channel = %channel_id, user = %user_id, "Joined channel");
        Ok(channel)
    }

    /// Find channels whose name contains `query` (case-insensitive) and
    /// that `user_id` hasn't joined.
    ///
    /// Reads every channel; records that aren't channels are skipped.
    pub async fn search_channels(&self, query: &str, user_id: &str) -> ChatResult<Vec<Channel>> {
        let needle = query.to_lowercase();
        let Some(Value::Object(all)) = self.store.read_once(path::CHANNELS).await? else {
            return Ok(Vec::new());
        };

        let mut results: Vec<Channel> = all
            .iter()
            .filter_map(|(id, value)| Channel::from_snapshot(id, value))
            .filter(|channel| channel.name.to_lowercase().contains(&needle))
            .filter(|channel| !channel.is_member(user_id))
            .collect();
        results.sort_by_key(|channel| channel.created_at);
        Ok(results)
    }

    // ==================== Messages ====================

    /// Post a message to a channel.
    ///
    /// Empty content (after trimming) or an empty channel id is a silent
    /// no-op and returns `Ok(None)`. The avatar is left out of the record
    /// entirely when not given.
    pub async fn send_message(
        &self,
        channel_id: &str,
        user_id: &str,
        user_name: &str,
        user_avatar: Option<&str>,
        content: &str,
    ) -> ChatResult<Option<Message>> {
        let content = content.trim();
        if channel_id.trim().is_empty() || content.is_empty() {
            debug!("Ignoring empty message");
            return Ok(None);
        }

        let messages_path = path::messages(channel_id);
        let id = self.store.push_key(&messages_path);
        let message = Message {
            id: id.clone(),
            channel_id: channel_id.to_string(),
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            user_avatar: non_empty(user_avatar),
            content: content.to_string(),
            timestamp: Some(now_millis()),
        };

        self.store
            .write(&path::child(&messages_path, &id), encode(&messages_path, &message)?)
            .await?;
        Ok(Some(message))
    }

    // ==================== Presence ====================

    /// Overwrite the user's presence record, stamped with the current time
    pub async fn update_presence(
        &self,
        user_id: &str,
        is_online: bool,
        profile: &Profile,
    ) -> ChatResult<Presence> {
        let presence_path = path::presence(user_id);
        let presence = Presence::now(is_online, profile);
        self.store
            .write(&presence_path, encode(&presence_path, &presence)?)
            .await?;
        debug!(user = %user_id, online = is_online, "Presence updated");
        Ok(presence)
    }

    async fn insert_channel(&self, user_id: &str, name: String, kind: ChannelKind) -> ChatResult<Channel> {
        let id = self.store.push_key(path::CHANNELS);
        let channel = Channel::new(id.clone(), name, kind, user_id);
        let channel_path = path::channel(&id);

        self.store
            .write(&channel_path, encode(&channel_path, &channel)?)
            .await?;
        self.store
            .write(&path::user_channel_entry(user_id, &id), json!(true))
            .await?;

        info!(channel = %id, user = %user_id, name = %channel.name, "Channel created");
        Ok(channel)
    }
}

fn validate_name(name: &str) -> ChatResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ChatError::validation("Channel name cannot be empty"));
    }
    Ok(name.to_string())
}

fn encode<T: serde::Serialize>(path: &str, value: &T) -> ChatResult<Value> {
    serde_json::to_value(value).map_err(|e| ChatError::Malformed {
        path: path.to_string(),
        message: e.to_string(),
    })
}
