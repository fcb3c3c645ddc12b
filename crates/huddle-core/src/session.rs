//! Auth-driven session setup
//!
//! [`SessionReactor`] turns auth state transitions into chat side effects.
//! On sign-in it makes sure the user has a channel, keeps the user's channel
//! index and the presence table subscribed, and marks the user online. On
//! sign-out it marks the previous user offline and releases everything it
//! subscribed to.

use std::collections::HashSet;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::auth::{AuthEvent, AuthUser};
use crate::chat::{ChatService, DefaultChannel};
use crate::error::{ChatError, ChatResult};
use crate::path;
use crate::sync::Subscription;

/// What a handled auth event did
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    SignedIn {
        user_id: String,
        /// `None` when the channel check already ran for this user
        default_channel: Option<DefaultChannel>,
    },
    SignedOut {
        /// The user that was signed in, if any
        user_id: Option<String>,
    },
    /// The event didn't change the session
    Unchanged,
}

struct ActiveSession {
    user: AuthUser,
    _subscriptions: Vec<Subscription>,
}

/// Reacts to auth events with channel and presence side effects
pub struct SessionReactor {
    chat: ChatService,
    active: Option<ActiveSession>,
    ensured: HashSet<String>,
}

impl SessionReactor {
    pub fn new(chat: ChatService) -> Self {
        Self {
            chat,
            active: None,
            ensured: HashSet::new(),
        }
    }

    /// The currently signed-in user
    pub fn current_user(&self) -> Option<&AuthUser> {
        self.active.as_ref().map(|session| &session.user)
    }

    /// Apply one auth transition.
    ///
    /// Every step runs even if an earlier one fails; the first failure is
    /// returned.
    pub async fn handle(&mut self, event: AuthEvent) -> ChatResult<SessionOutcome> {
        match event {
            AuthEvent::SignedIn(user) => self.sign_in(user).await,
            AuthEvent::SignedOut => self.sign_out().await,
        }
    }

    /// Follow the provider's auth state until it goes away.
    ///
    /// The current value is handled first. Failures are logged, not fatal.
    /// When the provider is dropped the last user is signed out.
    pub async fn run(&mut self, mut auth_state: watch::Receiver<Option<AuthUser>>) {
        loop {
            let user = auth_state.borrow_and_update().clone();
            if let Err(err) = self.handle(AuthEvent::from_state(user)).await {
                warn!(error = %err, "Session update failed");
            }
            if auth_state.changed().await.is_err() {
                break;
            }
        }

        debug!("Auth provider closed");
        if let Err(err) = self.sign_out().await {
            warn!(error = %err, "Sign-out cleanup failed");
        }
    }

    async fn sign_in(&mut self, user: AuthUser) -> ChatResult<SessionOutcome> {
        if let Some(active) = &self.active {
            if active.user == user {
                return Ok(SessionOutcome::Unchanged);
            }
        }

        let mut first_error: Option<ChatError> = None;
        if self.active.is_some() {
            if let Err(err) = self.sign_out().await {
                first_error.get_or_insert(err);
            }
        }

        let uid = user.uid.clone();
        let mut default_channel = None;
        if self.ensured.insert(uid.clone()) {
            match self.chat.ensure_default_channel(&uid).await {
                Ok(outcome) => default_channel = Some(outcome),
                Err(err) => {
                    warn!(user = %uid, error = %err, "Default channel check failed");
                    // Try again on the next sign-in
                    self.ensured.remove(&uid);
                    first_error.get_or_insert(err);
                }
            }
        }

        let store = self.chat.store();
        let subscriptions = store.watch_many([path::user_channels(&uid), path::PRESENCE.to_string()]);

        if let Err(err) = self.chat.update_presence(&uid, true, &user.profile()).await {
            first_error.get_or_insert(err);
        }

        info!(user = %uid, "Session started");
        self.active = Some(ActiveSession {
            user,
            _subscriptions: subscriptions,
        });

        match first_error {
            Some(err) => Err(err),
            None => Ok(SessionOutcome::SignedIn {
                user_id: uid,
                default_channel,
            }),
        }
    }

    async fn sign_out(&mut self) -> ChatResult<SessionOutcome> {
        let Some(session) = self.active.take() else {
            return Ok(SessionOutcome::Unchanged);
        };
        let uid = session.user.uid.clone();
        let profile = session.user.profile();
        // Release subscriptions before the final write
        drop(session);

        self.chat.update_presence(&uid, false, &profile).await?;
        info!(user = %uid, "Session ended");
        Ok(SessionOutcome::SignedOut { user_id: Some(uid) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthProvider, MemoryAuth};
    use crate::remote::{Fault, MemoryStore};
    use crate::sync::SyncStore;
    use std::sync::Arc;

    fn setup() -> (Arc<MemoryStore>, SyncStore, SessionReactor) {
        let remote = Arc::new(MemoryStore::new());
        let store = SyncStore::new(remote.clone());
        let reactor = SessionReactor::new(ChatService::new(store.clone()));
        (remote, store, reactor)
    }

    fn alice() -> AuthUser {
        AuthUser::new("alice").with_email("alice@example.com")
    }

    #[tokio::test]
    async fn test_sign_in_creates_default_channel_and_goes_online() {
        let (remote, store, mut reactor) = setup();

        let outcome = reactor.handle(AuthEvent::SignedIn(alice())).await.unwrap();

        let SessionOutcome::SignedIn {
            user_id,
            default_channel: Some(DefaultChannel::Created(channel)),
        } = outcome
        else {
            panic!("expected a created channel");
        };
        assert_eq!(user_id, "alice");
        assert_eq!(channel.name, "general");

        assert_eq!(
            store.active_paths(),
            vec!["presence".to_string(), "userChannels/alice".to_string()]
        );
        let presence = remote.peek(&path::presence("alice")).unwrap();
        assert_eq!(presence["isOnline"], true);
        assert_eq!(presence["email"], "alice@example.com");
        assert_eq!(reactor.current_user().map(|u| u.uid.as_str()), Some("alice"));
    }

    #[tokio::test]
    async fn test_default_channel_checked_once_per_user() {
        let (remote, _store, mut reactor) = setup();

        reactor.handle(AuthEvent::SignedIn(alice())).await.unwrap();
        reactor.handle(AuthEvent::SignedOut).await.unwrap();
        let outcome = reactor.handle(AuthEvent::SignedIn(alice())).await.unwrap();

        assert_eq!(
            outcome,
            SessionOutcome::SignedIn {
                user_id: "alice".to_string(),
                default_channel: None,
            }
        );
        let channels = remote.peek(path::CHANNELS).unwrap();
        assert_eq!(channels.as_object().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_out_marks_offline_and_releases() {
        let (remote, store, mut reactor) = setup();
        reactor.handle(AuthEvent::SignedIn(alice())).await.unwrap();

        let outcome = reactor.handle(AuthEvent::SignedOut).await.unwrap();

        assert_eq!(
            outcome,
            SessionOutcome::SignedOut {
                user_id: Some("alice".to_string())
            }
        );
        assert!(store.active_paths().is_empty());
        assert_eq!(remote.stats().active_listeners, 0);
        assert_eq!(remote.peek(&path::presence("alice")).unwrap()["isOnline"], false);

        // Nothing left to sign out
        assert_eq!(
            reactor.handle(AuthEvent::SignedOut).await.unwrap(),
            SessionOutcome::Unchanged
        );
    }

    #[tokio::test]
    async fn test_switching_users_signs_previous_out() {
        let (remote, store, mut reactor) = setup();
        reactor.handle(AuthEvent::SignedIn(alice())).await.unwrap();

        reactor
            .handle(AuthEvent::SignedIn(AuthUser::new("bob")))
            .await
            .unwrap();

        assert_eq!(remote.peek(&path::presence("alice")).unwrap()["isOnline"], false);
        assert_eq!(remote.peek(&path::presence("bob")).unwrap()["isOnline"], true);
        assert_eq!(
            store.active_paths(),
            vec!["presence".to_string(), "userChannels/bob".to_string()]
        );
    }

    #[tokio::test]
    async fn test_repeated_sign_in_is_unchanged() {
        let (remote, _store, mut reactor) = setup();
        reactor.handle(AuthEvent::SignedIn(alice())).await.unwrap();
        let writes = remote.stats().writes;

        let outcome = reactor.handle(AuthEvent::SignedIn(alice())).await.unwrap();

        assert_eq!(outcome, SessionOutcome::Unchanged);
        assert_eq!(remote.stats().writes, writes);
    }

    #[tokio::test]
    async fn test_failed_channel_check_is_retried() {
        let (remote, _store, mut reactor) = setup();
        remote.fail(Fault::Read, "userChannels");

        let err = reactor.handle(AuthEvent::SignedIn(alice())).await.unwrap_err();
        assert!(matches!(err, ChatError::Read { .. }));
        // Still online despite the failure
        assert_eq!(remote.peek(&path::presence("alice")).unwrap()["isOnline"], true);

        remote.clear_faults();
        reactor.handle(AuthEvent::SignedOut).await.unwrap();
        let outcome = reactor.handle(AuthEvent::SignedIn(alice())).await.unwrap();
        assert!(matches!(
            outcome,
            SessionOutcome::SignedIn {
                default_channel: Some(DefaultChannel::Created(_)),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_run_follows_provider() {
        let (remote, store, mut reactor) = setup();
        let auth = Arc::new(MemoryAuth::new());
        let state = auth.auth_state();

        let user = auth.create_account("carol@example.com", "secret1").await.unwrap();
        let uid = user.uid.clone();

        let provider = auth.clone();
        let driver = tokio::spawn(async move {
            reactor.run(state).await;
            reactor
        });

        // Let the reactor pick up the signed-in state
        for _ in 0..100 {
            if remote.peek(&path::presence(&uid)).is_some() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(remote.peek(&path::presence(&uid)).unwrap()["isOnline"], true);

        provider.sign_out().await.unwrap();
        drop(provider);
        drop(auth);

        let reactor = driver.await.unwrap();
        assert!(reactor.current_user().is_none());
        assert!(store.active_paths().is_empty());
        assert_eq!(remote.peek(&path::presence(&uid)).unwrap()["isOnline"], false);
    }
}
