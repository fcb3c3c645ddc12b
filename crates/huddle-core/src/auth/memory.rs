//! In-process auth provider
//!
//! Keeps an account registry in memory and publishes the signed-in user on
//! a `watch` channel. Error codes follow the hosted provider's
//! (`auth/email-already-in-use`, `auth/wrong-password`, ...).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::info;

use super::{AuthError, AuthProvider, AuthUser};

const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    password: String,
    user: AuthUser,
}

/// Auth provider backed by an in-memory account table
pub struct MemoryAuth {
    accounts: Mutex<HashMap<String, Account>>,
    state: watch::Sender<Option<AuthUser>>,
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuth {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(HashMap::new()),
            state,
        }
    }

    /// The user currently signed in
    pub fn current_user(&self) -> Option<AuthUser> {
        self.state.borrow().clone()
    }

    fn accounts(&self) -> std::sync::MutexGuard<'_, HashMap<String, Account>> {
        self.accounts.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn validate_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AuthError::new(
            "auth/invalid-email",
            "The email address is badly formatted.",
        )),
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn create_account(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let email = validate_email(email)?;
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::new(
                "auth/weak-password",
                "Password should be at least 6 characters",
            ));
        }

        let user = {
            let mut accounts = self.accounts();
            if accounts.contains_key(&email) {
                return Err(AuthError::new(
                    "auth/email-already-in-use",
                    "The email address is already in use by another account.",
                ));
            }
            let user = AuthUser::new(uuid::Uuid::new_v4().simple().to_string()).with_email(&email);
            accounts.insert(
                email,
                Account {
                    password: password.to_string(),
                    user: user.clone(),
                },
            );
            user
        };

        info!(uid = %user.uid, "Account created");
        self.state.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let email = validate_email(email)?;
        let user = {
            let accounts = self.accounts();
            let account = accounts.get(&email).ok_or_else(|| {
                AuthError::new(
                    "auth/user-not-found",
                    "There is no user record corresponding to this identifier.",
                )
            })?;
            if account.password != password {
                return Err(AuthError::new(
                    "auth/wrong-password",
                    "The password is invalid or the user does not have a password.",
                ));
            }
            account.user.clone()
        };

        info!(uid = %user.uid, "Signed in");
        self.state.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if self.state.send_replace(None).is_some() {
            info!("Signed out");
        }
        Ok(())
    }

    fn auth_state(&self) -> watch::Receiver<Option<AuthUser>> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_account_signs_in() {
        let auth = MemoryAuth::new();
        let state = auth.auth_state();

        let user = auth.create_account("Alice@Example.com", "secret1").await.unwrap();

        assert_eq!(user.email.as_deref(), Some("alice@example.com"));
        assert_eq!(state.borrow().as_ref(), Some(&user));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let auth = MemoryAuth::new();
        auth.create_account("a@example.com", "secret1").await.unwrap();
        let err = auth.create_account("a@example.com", "secret2").await.unwrap_err();
        assert_eq!(err.code, "auth/email-already-in-use");
    }

    #[tokio::test]
    async fn test_weak_password_and_bad_email() {
        let auth = MemoryAuth::new();
        let err = auth.create_account("a@example.com", "123").await.unwrap_err();
        assert_eq!(err.code, "auth/weak-password");
        let err = auth.create_account("not-an-email", "secret1").await.unwrap_err();
        assert_eq!(err.code, "auth/invalid-email");
    }

    #[tokio::test]
    async fn test_sign_in_and_out() {
        let auth = MemoryAuth::new();
        let created = auth.create_account("a@example.com", "secret1").await.unwrap();
        auth.sign_out().await.unwrap();
        assert!(auth.current_user().is_none());

        let err = auth.sign_in("a@example.com", "wrong!!").await.unwrap_err();
        assert_eq!(err.code, "auth/wrong-password");
        let err = auth.sign_in("b@example.com", "secret1").await.unwrap_err();
        assert_eq!(err.code, "auth/user-not-found");

        let user = auth.sign_in("a@example.com", "secret1").await.unwrap();
        assert_eq!(user, created);
        assert_eq!(auth.current_user(), Some(created));
    }
}
