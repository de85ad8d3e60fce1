//! String key-value device storage.
//!
//! SYSTEM CONTEXT
//! ==============
//! The local chat store and the stored-token auth source both sit on top of
//! a `localStorage`-shaped store: string keys, string values, synchronous.
//! `MemoryStorage` backs tests, `FileStorage` backs the CLI, and
//! `BrowserStorage` (feature `hydrate`) is the real browser store.

#[cfg(feature = "hydrate")]
pub mod browser;
pub mod file;

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

#[cfg(feature = "hydrate")]
pub use browser::BrowserStorage;
pub use file::FileStorage;

/// Errors raised by a device store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backing store could not be reached (no window, quota, etc).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A filesystem operation failed.
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),
}

/// `localStorage`-shaped string store.
pub trait KeyValueStore: Send + Sync {
    /// Read the value for `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-process map. Clones share the same map, like two tabs of one profile.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    items: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every key currently stored, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<String> = items.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.remove(key);
        Ok(())
    }
}
