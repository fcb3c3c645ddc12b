//! Derived view models
//!
//! Pure functions that turn raw snapshots into the lists a client renders,
//! plus [`ChannelDirectory`], which keeps one subscription per channel in
//! step with a user's channel index.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::models::{now_millis, Channel, Message, Presence};
use crate::path;
use crate::sync::{PathState, Subscription, SyncStore};

/// How recently a user must have been seen to count as online
pub const PRESENCE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

// ==================== Channels ====================

/// Build the ordered channel list from a user's channel index.
///
/// `lookup` returns the cached snapshot for a channel id. Channels without a
/// snapshot (not loaded yet, or deleted) are left out.
pub fn channel_list<F>(index: Option<&Value>, lookup: F) -> Vec<Channel>
where
    F: Fn(&str) -> Option<Value>,
{
    let mut channels: Vec<Channel> = index_ids(index)
        .iter()
        .filter_map(|id| {
            let snapshot = lookup(id)?;
            Channel::from_snapshot(id, &snapshot)
        })
        .collect();
    channels.sort_by_key(|channel| channel.created_at);
    channels
}

/// Member ids of a channel, sorted
pub fn channel_members(channel: &Channel) -> Vec<String> {
    channel.member_ids()
}

fn index_ids(index: Option<&Value>) -> Vec<String> {
    match index {
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

/// Keeps `channels/{id}` subscriptions matching a user's channel index
pub struct ChannelDirectory {
    store: SyncStore,
    index: Option<Subscription>,
    channels: BTreeMap<String, Subscription>,
}

impl ChannelDirectory {
    /// Subscribe to `userChannels/{user_id}` and every channel it lists
    pub fn open(store: &SyncStore, user_id: &str) -> Self {
        let mut directory = Self {
            store: store.clone(),
            index: Some(store.watch(&path::user_channels(user_id))),
            channels: BTreeMap::new(),
        };
        directory.reconcile();
        directory
    }

    /// State of the channel index subscription
    pub fn index_state(&self) -> PathState {
        self.index
            .as_ref()
            .map(Subscription::state)
            .unwrap_or_default()
    }

    /// Subscribe to newly listed channels and drop ones no longer listed.
    ///
    /// Returns the ids that were added and removed.
    pub fn reconcile(&mut self) -> (Vec<String>, Vec<String>) {
        let index = self.index_state().data;
        let wanted = index_ids(index.as_ref());

        let removed: Vec<String> = self
            .channels
            .keys()
            .filter(|id| !wanted.contains(id))
            .cloned()
            .collect();
        for id in &removed {
            self.channels.remove(id);
        }

        let mut added = Vec::new();
        for id in wanted {
            if !self.channels.contains_key(&id) {
                let subscription = self.store.watch(&path::channel(&id));
                self.channels.insert(id.clone(), subscription);
                added.push(id);
            }
        }

        if !added.is_empty() || !removed.is_empty() {
            debug!(added = added.len(), removed = removed.len(), "Channel directory reconciled");
        }
        (added, removed)
    }

    /// Wait for the index to change, then reconcile.
    ///
    /// Returns `None` once the directory is cleared or the store is gone.
    pub async fn changed(&mut self) -> Option<(Vec<String>, Vec<String>)> {
        self.index.as_mut()?.changed().await?;
        Some(self.reconcile())
    }

    /// Channels with a loaded snapshot, oldest first
    pub fn channels(&self) -> Vec<Channel> {
        let index = self.index_state().data;
        channel_list(index.as_ref(), |id| {
            self.channels.get(id).and_then(|sub| sub.state().data)
        })
    }

    /// True while the index or any listed channel is still loading
    pub fn is_loading(&self) -> bool {
        self.index_state().loading || self.channels.values().any(|sub| sub.state().loading)
    }

    /// Ids with a live channel subscription, sorted
    pub fn subscribed_ids(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }

    /// Release the index and every channel subscription
    pub fn clear(&mut self) {
        self.channels.clear();
        self.index = None;
    }
}

// ==================== Messages ====================

/// Messages of a channel snapshot, oldest first.
///
/// Messages with equal timestamps keep the order of their keys. A record
/// without a timestamp is treated as sent now.
pub fn message_list(snapshot: Option<&Value>) -> Vec<Message> {
    message_list_at(snapshot, now_millis())
}

fn message_list_at(snapshot: Option<&Value>, now: i64) -> Vec<Message> {
    let Some(Value::Object(map)) = snapshot else {
        return Vec::new();
    };

    let mut messages: Vec<Message> = map
        .iter()
        .filter_map(|(id, value)| match serde_json::from_value::<Message>(value.clone()) {
            Ok(mut message) => {
                message.id = id.clone();
                message.timestamp.get_or_insert(now);
                Some(message)
            }
            Err(e) => {
                debug!(message = %id, error = %e, "Skipping malformed message");
                None
            }
        })
        .collect();
    messages.sort_by_key(Message::sort_key);
    messages
}

// ==================== Presence ====================

/// Decode the `presence` snapshot into a map keyed by user id
pub fn presence_map(snapshot: Option<&Value>) -> BTreeMap<String, Presence> {
    let Some(Value::Object(map)) = snapshot else {
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(uid, value)| {
            serde_json::from_value::<Presence>(value.clone())
                .ok()
                .map(|presence| (uid.clone(), presence))
        })
        .collect()
}

/// Whether `user_id` is online right now under the default window
pub fn is_user_online(presence: &BTreeMap<String, Presence>, user_id: &str) -> bool {
    is_user_online_at(presence, user_id, now_millis(), PRESENCE_TIMEOUT)
}

/// Online means flagged online and seen strictly within `window` of `now`
pub fn is_user_online_at(
    presence: &BTreeMap<String, Presence>,
    user_id: &str,
    now: i64,
    window: Duration,
) -> bool {
    let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
    presence
        .get(user_id)
        .is_some_and(|p| p.is_online && p.last_seen > now.saturating_sub(window_ms))
}

/// Channel members split by online status, each in input order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresencePartition {
    pub online: Vec<String>,
    pub offline: Vec<String>,
}

/// Split `members` into online and offline under the default window
pub fn partition_presence(
    members: &[String],
    presence: &BTreeMap<String, Presence>,
    now: i64,
) -> PresencePartition {
    partition_presence_within(members, presence, now, PRESENCE_TIMEOUT)
}

/// Split `members` into online and offline under `window`
pub fn partition_presence_within(
    members: &[String],
    presence: &BTreeMap<String, Presence>,
    now: i64,
    window: Duration,
) -> PresencePartition {
    let (online, offline): (Vec<String>, Vec<String>) = members
        .iter()
        .cloned()
        .partition(|uid| is_user_online_at(presence, uid, now, window));
    PresencePartition { online, offline }
}

/// Name to show for a user: display name, else the local part of their
/// email, else "Unknown User"
pub fn display_name(presence: &BTreeMap<String, Presence>, user_id: &str) -> String {
    let record = presence.get(user_id);
    record
        .and_then(|p| p.display_name.as_deref())
        .filter(|name| !name.is_empty())
        .or_else(|| {
            record
                .and_then(|p| p.email.as_deref())
                .and_then(|email| email.split('@').next())
                .filter(|local| !local.is_empty())
        })
        .unwrap_or("Unknown User")
        .to_string()
}

/// Human-readable age of a last-seen timestamp
pub fn format_last_seen(last_seen: i64, now: i64) -> String {
    let diff = now.saturating_sub(last_seen);
    let days = diff / DAY_MS;
    let hours = diff / HOUR_MS;
    let minutes = diff / MINUTE_MS;

    if days > 0 {
        format!("{}d ago", days)
    } else if hours > 0 {
        format!("{}h ago", hours)
    } else if minutes > 0 {
        format!("{}m ago", minutes)
    } else {
        "Just now".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryStore, RemoteStore};
    use serde_json::json;
    use std::sync::Arc;

    const NOW: i64 = 1_700_000_000_000;

    fn presence(is_online: bool, last_seen: i64) -> Presence {
        Presence {
            is_online,
            last_seen,
            display_name: None,
            email: None,
        }
    }

    #[test]
    fn test_channel_list_sorted_and_missing_omitted() {
        let index = json!({"a": true, "b": true, "c": true});
        let snapshots = json!({
            "a": {"name": "late", "type": "text", "createdAt": 30, "createdBy": "u1", "members": {"u1": true}},
            "b": {"name": "early", "type": "voice", "createdAt": 10, "createdBy": "u1", "members": {"u1": true}},
        });

        let list = channel_list(Some(&index), |id| snapshots.get(id).cloned());

        let names: Vec<&str> = list.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["early", "late"]);
        assert_eq!(list[0].id, "b");
    }

    #[test]
    fn test_channel_list_without_index() {
        assert!(channel_list(None, |_| Some(json!({}))).is_empty());
        assert!(channel_list(Some(&json!("x")), |_| None).is_empty());
    }

    #[test]
    fn test_message_list_orders_by_timestamp_with_stable_ties() {
        let snapshot = json!({
            "k1": {"content": "second", "userId": "u", "timestamp": 20},
            "k2": {"content": "tie-a", "userId": "u", "timestamp": 30},
            "k3": {"content": "first", "userId": "u", "timestamp": 10},
            "k4": {"content": "tie-b", "userId": "u", "timestamp": 30},
        });

        let contents: Vec<String> = message_list(Some(&snapshot))
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["first", "second", "tie-a", "tie-b"]);
    }

    #[test]
    fn test_message_list_missing_timestamp_becomes_now() {
        let snapshot = json!({
            "k1": {"content": "undated"},
            "k2": {"content": "old", "timestamp": 5},
        });

        let messages = message_list_at(Some(&snapshot), NOW);
        assert_eq!(messages[0].content, "old");
        assert_eq!(messages[1].id, "k1");
        assert_eq!(messages[1].timestamp, Some(NOW));
    }

    #[test]
    fn test_message_list_skips_non_records() {
        let snapshot = json!({"k1": "junk", "k2": {"content": "ok", "timestamp": 1}});
        let messages = message_list(Some(&snapshot));
        assert_eq!(messages.len(), 1);
        assert!(message_list(None).is_empty());
    }

    #[test]
    fn test_online_requires_flag_and_recent_last_seen() {
        let mut map = BTreeMap::new();
        map.insert("recent".to_string(), presence(true, NOW - 60_000));
        map.insert("stale".to_string(), presence(true, NOW - 6 * 60_000));
        map.insert("boundary".to_string(), presence(true, NOW - 5 * 60_000));
        map.insert("away".to_string(), presence(false, NOW));

        assert!(is_user_online_at(&map, "recent", NOW, PRESENCE_TIMEOUT));
        assert!(!is_user_online_at(&map, "stale", NOW, PRESENCE_TIMEOUT));
        assert!(!is_user_online_at(&map, "boundary", NOW, PRESENCE_TIMEOUT));
        assert!(!is_user_online_at(&map, "away", NOW, PRESENCE_TIMEOUT));
        assert!(!is_user_online_at(&map, "unknown", NOW, PRESENCE_TIMEOUT));

        assert!(is_user_online_at(&map, "stale", NOW, Duration::from_secs(600)));
    }

    #[test]
    fn test_partition_presence_keeps_member_order() {
        let mut map = BTreeMap::new();
        map.insert("u2".to_string(), presence(true, NOW - 1_000));
        map.insert("u3".to_string(), presence(false, NOW - 1_000));
        map.insert("u4".to_string(), presence(true, NOW - 1_000));
        let members: Vec<String> = ["u4", "u3", "u2", "u1"].iter().map(|s| s.to_string()).collect();

        let split = partition_presence(&members, &map, NOW);
        assert_eq!(split.online, vec!["u4", "u2"]);
        assert_eq!(split.offline, vec!["u3", "u1"]);
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut map = BTreeMap::new();
        map.insert(
            "named".to_string(),
            Presence {
                display_name: Some("Alice".into()),
                email: Some("alice@example.com".into()),
                ..presence(true, NOW)
            },
        );
        map.insert(
            "emailed".to_string(),
            Presence {
                display_name: Some(String::new()),
                email: Some("bob@example.com".into()),
                ..presence(true, NOW)
            },
        );
        map.insert(
            "bare".to_string(),
            Presence {
                email: Some("@example.com".into()),
                ..presence(true, NOW)
            },
        );

        assert_eq!(display_name(&map, "named"), "Alice");
        assert_eq!(display_name(&map, "emailed"), "bob");
        assert_eq!(display_name(&map, "bare"), "Unknown User");
        assert_eq!(display_name(&map, "nobody"), "Unknown User");
    }

    #[test]
    fn test_format_last_seen() {
        assert_eq!(format_last_seen(NOW, NOW), "Just now");
        assert_eq!(format_last_seen(NOW - 59_999, NOW), "Just now");
        assert_eq!(format_last_seen(NOW - 3 * MINUTE_MS, NOW), "3m ago");
        assert_eq!(format_last_seen(NOW - 2 * HOUR_MS - 5, NOW), "2h ago");
        assert_eq!(format_last_seen(NOW - 3 * DAY_MS, NOW), "3d ago");
        assert_eq!(format_last_seen(NOW + 10_000, NOW), "Just now");
    }

    #[test]
    fn test_presence_map_skips_malformed() {
        let snapshot = json!({
            "u1": {"isOnline": true, "lastSeen": 1},
            "u2": 42,
        });
        let map = presence_map(Some(&snapshot));
        assert_eq!(map.len(), 1);
        assert!(map["u1"].is_online);
    }

    async fn seed_channel(remote: &MemoryStore, id: &str, created_at: i64) {
        remote
            .set(
                &path::channel(id),
                json!({"name": id, "type": "text", "createdAt": created_at, "createdBy": "u1", "members": {"u1": true}}),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_directory_follows_index() {
        let remote = Arc::new(MemoryStore::new());
        seed_channel(&remote, "a", 2).await;
        seed_channel(&remote, "b", 1).await;
        remote
            .set(&path::user_channel_entry("u1", "a"), json!(true))
            .await
            .unwrap();
        let store = SyncStore::new(remote.clone());

        let mut directory = ChannelDirectory::open(&store, "u1");
        assert_eq!(directory.subscribed_ids(), vec!["a"]);
        assert_eq!(directory.channels().len(), 1);
        assert!(!directory.is_loading());

        remote
            .set(&path::user_channel_entry("u1", "b"), json!(true))
            .await
            .unwrap();
        let (added, removed) = directory.changed().await.unwrap();
        assert_eq!(added, vec!["b"]);
        assert!(removed.is_empty());
        let names: Vec<String> = directory.channels().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["b", "a"]);

        remote
            .set(&path::user_channel_entry("u1", "a"), Value::Null)
            .await
            .unwrap();
        let (added, removed) = directory.changed().await.unwrap();
        assert!(added.is_empty());
        assert_eq!(removed, vec!["a"]);
        assert_eq!(store.subscriber_count(&path::channel("a")), 0);

        directory.clear();
        assert!(store.active_paths().is_empty());
        assert!(directory.changed().await.is_none());
        assert_eq!(remote.stats().active_listeners, 0);
    }
}
