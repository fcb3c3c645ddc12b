//! File-backed remote store
//!
//! A [`MemoryStore`] whose tree is saved to a JSON file after every write.
//! The CLI uses it as a local stand-in for the hosted database, so state
//! survives between invocations.
//!
//! Writes are atomic (write to temp file, sync, rename): the file is never
//! left partially written, and a write that can't be persisted is rejected
//! without changing the in-memory tree.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::memory::MemoryStore;
use super::{ListenerId, RemoteError, RemoteStore, SnapshotCallback};

/// Remote store persisted to a single JSON file
pub struct FileStore {
    path: PathBuf,
    memory: MemoryStore,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file doesn't exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let root = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read store file {:?}", path))?;
            if content.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse store file {:?}", path))?
            }
        } else {
            Value::Null
        };

        Ok(Self {
            path,
            memory: MemoryStore::with_root(root),
        })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The in-memory tree behind this store
    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }
}

#[async_trait]
impl RemoteStore for FileStore {
    fn listen(&self, path: &str, callback: SnapshotCallback) -> Result<ListenerId, RemoteError> {
        self.memory.listen(path, callback)
    }

    fn detach(&self, id: ListenerId) {
        self.memory.detach(id)
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), RemoteError> {
        let file = self.path.clone();
        self.memory.write_with(path, value, move |root| {
            let bytes = serde_json::to_vec_pretty(root)
                .map_err(|e| RemoteError::new("SERIALIZATION_ERROR", e.to_string()))?;
            atomic_write(&file, &bytes).map_err(|e| RemoteError::new("IO_ERROR", format!("{:#}", e)))
        })
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, RemoteError> {
        self.memory.get(path).await
    }

    fn push_key(&self, path: &str) -> String {
        self.memory.push_key(path)
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let temp_path = path.with_extension("tmp");

    let mut file = File::create(&temp_path)
        .with_context(|| format!("Failed to create temp file {:?}", temp_path))?;

    file.write_all(data)
        .with_context(|| format!("Failed to write to temp file {:?}", temp_path))?;

    file.sync_all()
        .with_context(|| format!("Failed to sync temp file {:?}", temp_path))?;

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;

    Ok(())
}
