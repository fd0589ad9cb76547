//! Scoped key/value persistence backends
//!
//! The session core persists two artifacts: the token set (profile-scoped,
//! survives restarts) and the in-flight PKCE attempt (session-scoped, carried
//! only across the redirect round trip). Both go through [`StorageBackend`] so
//! the owning components never touch a concrete medium directly and tests can
//! substitute an in-memory backend.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;

/// Persistence backend failures
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Synchronous scoped key/value storage.
///
/// All operations complete before returning; callers rely on this to keep
/// state transitions deterministic across a redirect or reload boundary.
pub trait StorageBackend: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the value stored under `key`. Removing a missing key is not an
    /// error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory backend.
///
/// Used for the session-scoped PKCE attempt (which must not outlive the
/// browsing session) and for tests.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// File-backed backend holding a single JSON object of key/value pairs.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// reader never observes a half-written store.
pub struct JsonFileStorage {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl JsonFileStorage {
    /// Open (or create) the store at `path`, loading any existing contents.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            HashMap::new()
        };
        Ok(Self { path, entries: Mutex::new(entries) })
    }

    fn flush(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        let raw = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StorageBackend for JsonFileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}
