//! Command handlers

pub mod channel;
pub mod config;
pub mod init;
pub mod message;
pub mod presence;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};

use huddle_core::{AuthUser, ChatService, Config, FileStore, SyncStore};

/// Everything a store-backed command needs
pub struct Context {
    pub config: Config,
    pub store: SyncStore,
    pub chat: ChatService,
    pub user: AuthUser,
}

impl Context {
    /// Load config, resolve the acting user and open the local store
    pub fn open(config_path: Option<&PathBuf>, user_override: Option<String>) -> Result<Self> {
        let config =
            Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
        Self::with_config(config, user_override)
    }

    pub fn with_config(config: Config, user_override: Option<String>) -> Result<Self> {
        let user = resolve_user(&config, user_override)?;

        let remote = FileStore::open(config.store_path())
            .with_context(|| format!("Failed to open store: {:?}", config.store_path()))?;
        let store = SyncStore::new(Arc::new(remote));
        let chat = ChatService::new(store.clone())
            .with_default_channel_name(config.default_channel_name.clone());

        Ok(Self {
            config,
            store,
            chat,
            user,
        })
    }

    /// Name shown on messages sent by the acting user
    pub fn sender_name(&self) -> String {
        self.user
            .display_name
            .clone()
            .or_else(|| {
                self.user
                    .email
                    .as_deref()
                    .and_then(|email| email.split('@').next())
                    .filter(|local| !local.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| self.user.uid.clone())
    }
}

fn resolve_user(config: &Config, user_override: Option<String>) -> Result<AuthUser> {
    let uid = user_override
        .filter(|uid| !uid.trim().is_empty())
        .or_else(|| config.user_id.clone())
        .context(
            "No user configured. Pass --user <id> or run:\n  huddle config set user_id <id>",
        )?;

    let mut user = AuthUser::new(uid.trim());
    if let Some(name) = &config.display_name {
        user = user.with_display_name(name);
    }
    if let Some(email) = &config.email {
        user = user.with_email(email);
    }
    Ok(user)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tempfile::TempDir;

    /// A context backed by a store file in a fresh temp dir
    pub fn context(user: &str) -> (TempDir, Context) {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: temp.path().to_path_buf(),
            display_name: Some(format!("{} name", user)),
            ..Config::default()
        };
        let ctx = Context::with_config(config, Some(user.to_string())).unwrap();
        (temp, ctx)
    }

    /// A fresh context over the store file another context wrote
    pub fn reopen(temp: &TempDir, user: &str) -> Context {
        let config = Config {
            data_dir: temp.path().to_path_buf(),
            ..Config::default()
        };
        Context::with_config(config, Some(user.to_string())).unwrap()
    }
}
