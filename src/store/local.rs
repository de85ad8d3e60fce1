//! Device-local chat store.
//!
//! DESIGN
//! ======
//! The whole chat list for one namespace is a single JSON array under
//! `chats_<namespace>`. Every mutation loads the array, edits it and writes
//! it back in one `set`, holding `write_lock` so concurrent mutations in
//! this process cannot interleave. Other processes sharing the device store
//! are last-writer-wins.
//!
//! The namespace is derived from the current token on every call and never
//! cached: a logout or account switch takes effect on the next operation.

#[cfg(test)]
#[path = "local_test.rs"]
mod tests;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use super::{ChatStore, StoreError};
use crate::auth::TokenSource;
use crate::chat::{Chat, ChatSummary, Message};
use crate::identity;
use crate::storage::KeyValueStore;

pub struct LocalChatStore {
    storage: Arc<dyn KeyValueStore>,
    tokens: Arc<dyn TokenSource>,
    write_lock: Mutex<()>,
}

impl LocalChatStore {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>, tokens: Arc<dyn TokenSource>) -> Self {
        Self { storage, tokens, write_lock: Mutex::new(()) }
    }

    fn storage_key(&self) -> Option<String> {
        identity::namespace_for(self.tokens.token().as_deref()).map(|key| identity::chats_storage_key(&key))
    }

    fn load(&self, key: &str) -> Result<Vec<Chat>, StoreError> {
        match self.storage.get(key)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt(e.to_string())),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, key: &str, chats: &[Chat]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(chats).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        self.storage.set(key, &raw)?;
        Ok(())
    }

    fn read(&self) -> Result<Vec<Chat>, StoreError> {
        let key = self.storage_key().ok_or(StoreError::Unauthenticated)?;
        self.load(&key)
    }

    /// Load, edit and persist the namespaced list as one unit.
    fn mutate<T>(&self, edit: impl FnOnce(&mut Vec<Chat>) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let key = self.storage_key().ok_or(StoreError::Unauthenticated)?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut chats = self.load(&key)?;
        let out = edit(&mut chats)?;
        self.save(&key, &chats)?;
        Ok(out)
    }
}

fn now_ms() -> u64 {
    let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    u64::try_from(duration.as_millis()).unwrap_or(0)
}

/// Millisecond-timestamp id, bumped past any id already in `chats`.
fn next_chat_id(chats: &[Chat], now: u64) -> String {
    let mut candidate = now;
    while chats.iter().any(|c| c.id == candidate.to_string()) {
        candidate += 1;
    }
    candidate.to_string()
}

fn find_mut<'a>(chats: &'a mut [Chat], id: &str) -> Result<&'a mut Chat, StoreError> {
    chats
        .iter_mut()
        .find(|c| c.id == id)
        .ok_or_else(|| StoreError::not_found(id))
}

#[async_trait::async_trait]
impl ChatStore for LocalChatStore {
    fn is_authenticated(&self) -> bool {
        self.tokens.token().is_some()
    }

    async fn list(&self) -> Result<Vec<ChatSummary>, StoreError> {
        match self.read() {
            Ok(chats) => Ok(chats.iter().map(Chat::summary).collect()),
            Err(StoreError::Unauthenticated) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn create(&self, title: &str) -> Result<Chat, StoreError> {
        let chat = self.mutate(|chats| {
            let chat = Chat::new(next_chat_id(chats, now_ms()), title);
            chats.insert(0, chat.clone());
            Ok(chat)
        })?;
        debug!(chat_id = %chat.id, "local store: chat created");
        Ok(chat)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.mutate(|chats| {
            chats.retain(|c| c.id != id);
            Ok(())
        })?;
        debug!(chat_id = %id, "local store: chat deleted");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Chat, StoreError> {
        self.read()?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::not_found(id))
    }

    async fn append_message(&self, id: &str, message: &Message) -> Result<(), StoreError> {
        self.mutate(|chats| {
            find_mut(chats, id)?.messages.push(message.clone());
            Ok(())
        })
    }

    async fn update_title(&self, id: &str, title: &str) -> Result<(), StoreError> {
        self.mutate(|chats| {
            find_mut(chats, id)?.title = title.to_owned();
            Ok(())
        })
    }
}
