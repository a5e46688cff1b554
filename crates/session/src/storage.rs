//! Persisted key-value contract for the session.
//!
//! The client only ever stores a handful of string values under fixed keys
//! ([`keys`]). Implementations decide where they live: memory for tests and
//! ephemeral sessions, a JSON file for desktop-style clients.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;

use crate::error::StorageError;

/// Keys the session persists.
pub mod keys {
    pub const AUTH_TOKEN: &str = "auth_token";
    pub const USER_DATA: &str = "user_data";
    pub const CURRENT_TENANT_ID: &str = "current_tenant_id";
    pub const ASSIGNED_TENANT_ID: &str = "assigned_tenant_id";
    pub const CURRENT_ENTITY_ID: &str = "current_entity_id";

    /// Every key a logout must erase.
    pub const ALL: [&str; 5] = [
        AUTH_TOKEN,
        USER_DATA,
        CURRENT_TENANT_ID,
        ASSIGNED_TENANT_ID,
        CURRENT_ENTITY_ID,
    ];
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Set `key` to `value`, or remove it when `value` is `None`.
    fn put(&self, key: &str, value: Option<&str>) -> Result<(), StorageError> {
        match value {
            Some(v) => self.set(key, v),
            None => self.remove(key),
        }
    }

    /// Apply several [`KeyValueStore::put`]s as one change.
    ///
    /// Either every entry is written or the store keeps its previous values.
    /// The default implementation restores the keys already written when a
    /// later write fails.
    fn put_many(&self, entries: &[(&str, Option<&str>)]) -> Result<(), StorageError> {
        let mut previous = Vec::with_capacity(entries.len());
        for (key, _) in entries {
            previous.push((*key, self.get(key)?));
        }

        for (index, (key, value)) in entries.iter().enumerate() {
            if let Err(err) = self.put(key, *value) {
                for (key, old) in &previous[..index] {
                    if let Err(undo) = self.put(key, old.as_deref()) {
                        tracing::warn!(key, error = %undo, "failed to roll back persisted session key");
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }
}

fn apply(entries: &mut BTreeMap<String, String>, batch: &[(&str, Option<&str>)]) {
    for (key, value) in batch {
        match value {
            Some(v) => {
                entries.insert(key.to_string(), v.to_string());
            }
            None => {
                entries.remove(*key);
            }
        }
    }
}

/// In-memory store (tests, ephemeral sessions).
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything currently stored.
    pub fn entries(&self) -> Result<BTreeMap<String, String>, StorageError> {
        Ok(self.entries.lock().map_err(|_| StorageError::Poisoned)?.clone())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn put_many(&self, batch: &[(&str, Option<&str>)]) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        apply(&mut entries, batch);
        Ok(())
    }
}

/// JSON-file backed store. The whole map is rewritten on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> anyhow::Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read session file at {:?}", self.path))?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&raw)
            .with_context(|| format!("session file at {:?} is not a JSON object", self.path))
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create session directory at {:?}", parent))?;
        }

        let tmp = self.path.with_extension("tmp");
        let body = serde_json::to_string_pretty(entries)?;
        std::fs::write(&tmp, body)
            .with_context(|| format!("failed to write session file at {:?}", tmp))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace session file at {:?}", self.path))?;
        Ok(())
    }

    fn modify(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut entries = self.read_all().map_err(io_error)?;
        f(&mut entries);
        self.write_all(&entries).map_err(io_error)
    }
}

fn io_error(err: anyhow::Error) -> StorageError {
    StorageError::Io(format!("{err:#}"))
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let entries = self.read_all().map_err(io_error)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.modify(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.modify(|entries| {
            entries.remove(key);
        })
    }

    fn put_many(&self, batch: &[(&str, Option<&str>)]) -> Result<(), StorageError> {
        self.modify(|entries| apply(entries, batch))
    }
}
