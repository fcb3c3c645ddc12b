//! Auth provider boundary
//!
//! The hosted identity service issues sessions and notifies the client when
//! the signed-in user changes. The chat layer only reacts to those state
//! transitions, expressed as [`AuthEvent`]s.

mod memory;

pub use memory::MemoryAuth;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use crate::models::Profile;

/// The signed-in user as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl AuthUser {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Profile fields to publish with presence
    pub fn profile(&self) -> Profile {
        Profile::new(self.display_name.clone(), self.email.clone())
    }
}

/// Error reported by the auth provider, shown as `code: message`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct AuthError {
    pub code: String,
    pub message: String,
}

impl AuthError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<AuthError> for crate::error::ChatError {
    fn from(err: AuthError) -> Self {
        crate::error::ChatError::Auth(err.to_string())
    }
}

/// Auth state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(AuthUser),
    SignedOut,
}

impl AuthEvent {
    /// Event describing a provider state value
    pub fn from_state(user: Option<AuthUser>) -> Self {
        match user {
            Some(user) => AuthEvent::SignedIn(user),
            None => AuthEvent::SignedOut,
        }
    }
}

/// The operations consumed from the hosted identity service
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Register a new account and sign it in
    async fn create_account(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;

    /// Sign in with existing credentials
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;

    /// End the current session
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Current user, updated on every sign-in and sign-out
    fn auth_state(&self) -> watch::Receiver<Option<AuthUser>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;

    #[test]
    fn test_event_from_state() {
        let user = AuthUser::new("u1").with_email("a@example.com");
        assert_eq!(
            AuthEvent::from_state(Some(user.clone())),
            AuthEvent::SignedIn(user)
        );
        assert_eq!(AuthEvent::from_state(None), AuthEvent::SignedOut);
    }

    #[test]
    fn test_error_format() {
        let err = AuthError::new("auth/wrong-password", "Wrong password");
        assert_eq!(err.to_string(), "auth/wrong-password: Wrong password");
        let chat: ChatError = err.into();
        assert_eq!(chat, ChatError::Auth("auth/wrong-password: Wrong password".into()));
    }

    #[test]
    fn test_profile() {
        let user = AuthUser::new("u1").with_display_name("Alice");
        let profile = user.profile();
        assert_eq!(profile.display_name.as_deref(), Some("Alice"));
        assert!(profile.email.is_none());
    }
}
