//! Data models for huddle
//!
//! Defines the records stored in the remote store: Channel, Message and
//! Presence. Field names on the wire are camelCase to match the data the
//! hosted database already holds.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Kind of channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    #[default]
    Text,
    Voice,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Text => write!(f, "text"),
            ChannelKind::Voice => write!(f, "voice"),
        }
    }
}

impl FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(ChannelKind::Text),
            "voice" => Ok(ChannelKind::Voice),
            other => Err(format!("unknown channel type '{}'", other)),
        }
    }
}

/// A chat channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    /// Unique identifier (the key under `channels/`)
    #[serde(default)]
    pub id: String,
    /// Display name
    pub name: String,
    /// Text or voice
    #[serde(rename = "type", default)]
    pub kind: ChannelKind,
    /// Creation time, epoch millis
    #[serde(default)]
    pub created_at: i64,
    /// User who created the channel
    #[serde(default)]
    pub created_by: String,
    /// Member set, userId -> true
    #[serde(default)]
    pub members: BTreeMap<String, bool>,
}

impl Channel {
    /// Create a new channel owned by `user_id`, with the creator as sole member
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ChannelKind, user_id: &str) -> Self {
        let mut members = BTreeMap::new();
        members.insert(user_id.to_string(), true);
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            created_at: now_millis(),
            created_by: user_id.to_string(),
            members,
        }
    }

    /// Build a channel from the snapshot stored under `channels/{id}`.
    ///
    /// The key is authoritative for the id. Returns `None` when the
    /// snapshot doesn't have the shape of a channel.
    pub fn from_snapshot(id: &str, value: &Value) -> Option<Self> {
        let mut channel: Channel = serde_json::from_value(value.clone()).ok()?;
        channel.id = id.to_string();
        Some(channel)
    }

    /// Build a channel from whatever fields of the record decode.
    ///
    /// Missing or mistyped fields fall back to their defaults, so any
    /// existing record yields a channel.
    pub fn from_record(id: &str, value: &Value) -> Self {
        if let Some(channel) = Self::from_snapshot(id, value) {
            return channel;
        }
        let field = |name: &str| value.get(name).cloned().unwrap_or(Value::Null);
        Self {
            id: id.to_string(),
            name: field("name").as_str().unwrap_or_default().to_string(),
            kind: serde_json::from_value(field("type")).unwrap_or_default(),
            created_at: field("createdAt").as_i64().unwrap_or_default(),
            created_by: field("createdBy").as_str().unwrap_or_default().to_string(),
            members: serde_json::from_value(field("members")).unwrap_or_default(),
        }
    }

    /// Check membership
    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.get(user_id).copied().unwrap_or(false)
    }

    /// Ids of all members, sorted
    pub fn member_ids(&self) -> Vec<String> {
        self.members
            .iter()
            .filter(|(_, joined)| **joined)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

/// A chat message; immutable once written
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    /// Omitted entirely from the record when not set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_avatar: Option<String>,
    #[serde(default)]
    pub content: String,
    /// Epoch millis; absent on malformed records
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl Message {
    /// Timestamp used for ordering
    pub fn sort_key(&self) -> i64 {
        self.timestamp.unwrap_or_default()
    }
}

/// Per-user presence record at `presence/{userId}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Presence {
    #[serde(default)]
    pub is_online: bool,
    /// Epoch millis of the last update
    #[serde(default)]
    pub last_seen: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Presence {
    /// Build a record stamped with the current time.
    ///
    /// Empty display names and emails are dropped rather than stored as
    /// empty strings.
    pub fn now(is_online: bool, profile: &Profile) -> Self {
        Self {
            is_online,
            last_seen: now_millis(),
            display_name: non_empty(profile.display_name.as_deref()),
            email: non_empty(profile.email.as_deref()),
        }
    }
}

/// Optional profile fields carried into presence records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl Profile {
    pub fn new(display_name: Option<String>, email: Option<String>) -> Self {
        Self {
            display_name,
            email,
        }
    }
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
