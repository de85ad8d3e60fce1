//! Chat persistence behind one capability trait.
//!
//! ARCHITECTURE
//! ============
//! `LocalChatStore` keeps the whole chat list (messages embedded) as one
//! JSON document in the device store, namespaced per auth token.
//! `RemoteChatStore` maps each operation onto one or two HTTP calls against
//! the conversation API. The session controller only sees `dyn ChatStore`,
//! so the variant is picked once at construction time.
//!
//! ERROR HANDLING
//! ==============
//! Every mutating call either leaves the persisted state matching its return
//! value or fails; there is no retry here. Callers decide what to do with a
//! failed append (the controller reports it and moves on).

pub mod local;
pub mod remote;

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;

pub use local::LocalChatStore;
pub use remote::RemoteChatStore;

use crate::chat::{Chat, ChatSummary, Message};
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The referenced chat does not exist (deleted, or never created).
    #[error("chat not found: {id}")]
    NotFound { id: String },

    /// No auth token is available, so no chat list can be read or written.
    #[error("not authenticated")]
    Unauthenticated,

    /// The remote store rejected the credential; the session is invalid.
    #[error("unauthorized: status {status}")]
    Unauthorized { status: u16 },

    /// Network failure or a non-success status from the remote store.
    #[error("transport failed: {0}")]
    Transport(String),

    /// The remote store answered with a body we could not decode.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// The persisted chat list could not be parsed.
    #[error("stored chats corrupt: {0}")]
    Corrupt(String),

    /// The device store failed.
    #[error("device storage failed: {0}")]
    Storage(#[from] StorageError),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The remote store base URL cannot carry path segments.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

impl StoreError {
    pub(crate) fn not_found(id: &str) -> Self {
        Self::NotFound { id: id.to_owned() }
    }
}

impl crate::error::ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "E_CHAT_NOT_FOUND",
            Self::Unauthenticated => "E_UNAUTHENTICATED",
            Self::Unauthorized { .. } => "E_UNAUTHORIZED",
            Self::Transport(_) => "E_TRANSPORT",
            Self::Decode(_) => "E_DECODE",
            Self::Corrupt(_) => "E_STORE_CORRUPT",
            Self::Storage(_) => "E_STORAGE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
            Self::InvalidBaseUrl(_) => "E_INVALID_BASE_URL",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Storage(_))
    }
}

/// Durable home of a user's chats.
#[async_trait::async_trait]
pub trait ChatStore: Send + Sync {
    /// Whether an auth token is currently available.
    fn is_authenticated(&self) -> bool;

    /// All chats, most recently created first. Empty when unauthenticated.
    async fn list(&self) -> Result<Vec<ChatSummary>, StoreError>;

    /// Create an empty chat at the front of the list.
    async fn create(&self, title: &str) -> Result<Chat, StoreError>;

    /// Remove a chat and its messages. Missing ids are not an error.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// A chat with its full message sequence.
    async fn get(&self, id: &str) -> Result<Chat, StoreError>;

    /// Append one message to the end of a chat.
    async fn append_message(&self, id: &str, message: &Message) -> Result<(), StoreError>;

    /// Replace a chat's title.
    async fn update_title(&self, id: &str, title: &str) -> Result<(), StoreError>;
}
