//! Browser `localStorage` backend (hydrate builds only).

use super::{KeyValueStore, StorageError};

/// Zero-sized handle; every call looks up `window.localStorage` afresh.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserStorage;

fn local_storage() -> Result<web_sys::Storage, StorageError> {
    web_sys::window()
        .and_then(|w| w.local_storage().ok().flatten())
        .ok_or_else(|| StorageError::Unavailable("window.localStorage not available".to_owned()))
}

fn js_error(context: &str) -> StorageError {
    StorageError::Unavailable(format!("localStorage {context} failed"))
}

impl KeyValueStore for BrowserStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        local_storage()?.get_item(key).map_err(|_| js_error("getItem"))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        local_storage()?
            .set_item(key, value)
            .map_err(|_| js_error("setItem"))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        local_storage()?
            .remove_item(key)
            .map_err(|_| js_error("removeItem"))
    }
}
