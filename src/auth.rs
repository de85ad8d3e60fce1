//! Auth token sources.
//!
//! SYSTEM CONTEXT
//! ==============
//! The core treats the token as an opaque capability: present means
//! "authenticated", absent means no chats and no sends. The local store uses
//! it to derive a namespace; the remote store sends it as a bearer credential.

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;

use std::sync::Arc;

use crate::storage::{KeyValueStore, StorageError};

/// Device-store key the login flow writes the access token under.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Device-store key the login flow writes the refresh token under.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Yields the current auth token, if any. Looked up on every use so a
/// logout in another part of the app takes effect immediately.
pub trait TokenSource: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// A token fixed at construction time (CLI flag, tests).
#[derive(Clone, Debug, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.is_empty()))
    }
}

impl TokenSource for StaticToken {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Token read from the device store under [`ACCESS_TOKEN_KEY`].
#[derive(Clone)]
pub struct StoredToken {
    storage: Arc<dyn KeyValueStore>,
}

impl StoredToken {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Store the tokens returned by a successful login.
    ///
    /// # Errors
    ///
    /// Returns an error if the device store rejects the write.
    pub fn login(&self, access_token: &str, refresh_token: Option<&str>) -> Result<(), StorageError> {
        self.storage.set(ACCESS_TOKEN_KEY, access_token)?;
        match refresh_token {
            Some(refresh) => self.storage.set(REFRESH_TOKEN_KEY, refresh),
            None => self.storage.remove(REFRESH_TOKEN_KEY),
        }
    }

    /// Forget both tokens. Persisted chats stay on the device under their
    /// namespace and reappear when the same token logs in again.
    ///
    /// # Errors
    ///
    /// Returns an error if the device store rejects the removal.
    pub fn logout(&self) -> Result<(), StorageError> {
        self.storage.remove(ACCESS_TOKEN_KEY)?;
        self.storage.remove(REFRESH_TOKEN_KEY)
    }
}

impl TokenSource for StoredToken {
    fn token(&self) -> Option<String> {
        match self.storage.get(ACCESS_TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "auth: access token unreadable");
                None
            }
        }
    }
}
