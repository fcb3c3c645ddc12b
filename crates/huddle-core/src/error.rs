//! Error handling
//!
//! Every chat operation returns [`ChatError`]. Remote failures are flattened
//! into their message string at the operation boundary, so callers can show
//! them as-is without holding on to store-specific error types.

use thiserror::Error;

/// Errors surfaced by chat operations and subscriptions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// Input rejected before any remote call was made
    #[error("{0}")]
    Validation(String),

    /// The operation targets a record that doesn't exist
    #[error("{what} not found: '{id}'")]
    NotFound { what: &'static str, id: String },

    /// A remote write was rejected
    #[error("Write to '{path}' failed: {message}")]
    Write { path: String, message: String },

    /// A one-shot remote read was rejected
    #[error("Read of '{path}' failed: {message}")]
    Read { path: String, message: String },

    /// Attaching a listener failed, or the store reported a push error
    #[error("Subscription to '{path}' failed: {message}")]
    Subscription { path: String, message: String },

    /// A snapshot didn't have the expected shape
    #[error("Malformed data at '{path}': {message}")]
    Malformed { path: String, message: String },

    /// The auth provider rejected a request
    #[error("{0}")]
    Auth(String),
}

impl ChatError {
    pub fn validation(message: impl Into<String>) -> Self {
        ChatError::Validation(message.into())
    }

    /// True for failures reported by the remote store
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            ChatError::Write { .. } | ChatError::Read { .. } | ChatError::Subscription { .. }
        )
    }

    /// True for input rejected locally
    pub fn is_validation(&self) -> bool {
        matches!(self, ChatError::Validation(_))
    }

    /// True if the target record is missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, ChatError::NotFound { .. })
    }
}

/// Result type for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let err = ChatError::Write {
            path: "channels/c1".into(),
            message: "permission_denied".into(),
        };
        assert!(err.is_remote());
        assert!(!err.is_validation());

        let err = ChatError::validation("Channel name cannot be empty");
        assert!(err.is_validation());
        assert!(!err.is_remote());

        let err = ChatError::NotFound {
            what: "Channel",
            id: "c1".into(),
        };
        assert!(err.is_not_found());
    }

    #[test]
    fn test_display_keeps_remote_message() {
        let err = ChatError::Read {
            path: "channels".into(),
            message: "network unavailable".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("channels"));
        assert!(msg.contains("network unavailable"));
    }

    #[test]
    fn test_not_found_display() {
        let err = ChatError::NotFound {
            what: "Channel",
            id: "missing".into(),
        };
        assert_eq!(err.to_string(), "Channel not found: 'missing'");
    }
}
