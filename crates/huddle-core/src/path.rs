//! Path helpers
//!
//! Every piece of remote data lives under a `/`-separated path. These helpers
//! build the paths the chat layer uses so the layout is defined in one place:
//!
//! - `channels/{channelId}`
//! - `messages/{channelId}`
//! - `presence/{userId}`
//! - `userChannels/{userId}/{channelId}`

/// Root of all channel records
pub const CHANNELS: &str = "channels";
/// Root of per-channel message lists
pub const MESSAGES: &str = "messages";
/// Root of per-user presence records
pub const PRESENCE: &str = "presence";
/// Root of per-user channel indexes
pub const USER_CHANNELS: &str = "userChannels";

/// Normalize a path: drop empty segments and surrounding slashes.
///
/// `"/channels//abc/"` becomes `"channels/abc"`. The root is `""`.
pub fn normalize(path: &str) -> String {
    segments(path).collect::<Vec<_>>().join("/")
}

/// Iterate the non-empty segments of a path
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Join a parent path and a child key
pub fn child(parent: &str, key: &str) -> String {
    let parent = normalize(parent);
    let key = normalize(key);
    match (parent.is_empty(), key.is_empty()) {
        (true, _) => key,
        (_, true) => parent,
        _ => format!("{}/{}", parent, key),
    }
}

/// True if `ancestor` equals `path` or contains it, segment-wise.
pub fn is_ancestor_or_self(ancestor: &str, path: &str) -> bool {
    let mut theirs = segments(path);
    for seg in segments(ancestor) {
        if theirs.next() != Some(seg) {
            return false;
        }
    }
    true
}

/// True if a write at one path can change the snapshot at the other.
pub fn overlaps(a: &str, b: &str) -> bool {
    is_ancestor_or_self(a, b) || is_ancestor_or_self(b, a)
}

pub fn channel(channel_id: &str) -> String {
    child(CHANNELS, channel_id)
}

pub fn channel_name(channel_id: &str) -> String {
    child(&channel(channel_id), "name")
}

pub fn channel_member(channel_id: &str, user_id: &str) -> String {
    child(&child(&channel(channel_id), "members"), user_id)
}

pub fn messages(channel_id: &str) -> String {
    child(MESSAGES, channel_id)
}

pub fn presence(user_id: &str) -> String {
    child(PRESENCE, user_id)
}

pub fn user_channels(user_id: &str) -> String {
    child(USER_CHANNELS, user_id)
}

pub fn user_channel_entry(user_id: &str, channel_id: &str) -> String {
    child(&user_channels(user_id), channel_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/channels//abc/"), "channels/abc");
        assert_eq!(normalize("presence"), "presence");
        assert_eq!(normalize("/"), "");
    }

    #[test]
    fn test_domain_paths() {
        assert_eq!(channel("c1"), "channels/c1");
        assert_eq!(channel_name("c1"), "channels/c1/name");
        assert_eq!(channel_member("c1", "u1"), "channels/c1/members/u1");
        assert_eq!(messages("c1"), "messages/c1");
        assert_eq!(presence("u1"), "presence/u1");
        assert_eq!(user_channels("u1"), "userChannels/u1");
        assert_eq!(user_channel_entry("u1", "c1"), "userChannels/u1/c1");
    }

    #[test]
    fn test_child_with_empty_parent() {
        assert_eq!(child("", "channels"), "channels");
        assert_eq!(child("channels", ""), "channels");
    }

    #[test]
    fn test_ancestry() {
        assert!(is_ancestor_or_self("", "channels/c1"));
        assert!(is_ancestor_or_self("channels", "channels/c1/name"));
        assert!(is_ancestor_or_self("channels/c1", "channels/c1"));
        assert!(!is_ancestor_or_self("channels/c1", "channels"));
        // segment-wise, not string prefix
        assert!(!is_ancestor_or_self("channels/c1", "channels/c10"));
    }

    #[test]
    fn test_overlaps() {
        assert!(overlaps("messages", "messages/c1/m1"));
        assert!(overlaps("messages/c1/m1", "messages"));
        assert!(!overlaps("messages/c1", "messages/c2"));
        assert!(!overlaps("presence", "channels"));
    }
}
