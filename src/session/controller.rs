//! Session controller and the send protocol.
//!
//! DESIGN
//! ======
//! State lives in a `std::sync::Mutex` that is never held across an
//! `.await`, so the UI can switch or delete chats while a send waits on the
//! assistant. The `sending` flag is the only mutual exclusion: a send that
//! arrives while another is in flight is rejected, not queued.
//!
//! A send captures its target chat id up front. The reply is persisted to
//! that chat even if the user has switched away in the meantime, and only
//! shown if that chat is still the active one.
//!
//! The working copy is only trusted as "the chat's messages" once a `get`
//! or `create` for that chat has landed (`loaded`). Until then, whether a
//! send is the chat's first message is asked of the store. A message load
//! that overlaps a send is read again if the send changed the chat meanwhile,
//! and keeps whatever the send has shown but not yet persisted.
//!
//! ERROR HANDLING
//! ==============
//! Assistant failures never escape: they become one fallback reply.
//! Persistence failures during a send are not retried or rolled back; the
//! working copy stays ahead of the store and every failure is listed in the
//! returned `SendReport`.

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::state::{Phase, Session};
use crate::assistant::{Assistant, AssistantError, FALLBACK_REPLY, SYSTEM_PROMPT};
use crate::chat::{Chat, ChatSummary, DEFAULT_TITLE, Message, derive_title};
use crate::config::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::store::{ChatStore, StoreError};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The chat id is not in the current list.
    #[error("chat not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl crate::error::ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_CHAT_NOT_FOUND",
            Self::Store(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.retryable())
    }
}

/// Why a send was dropped without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Text was empty after trimming.
    Empty,
    /// Another send is in flight.
    Busy,
    /// No auth token; there is no session to send in.
    Unauthenticated,
}

/// Which persistence step of a send failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistStep {
    UserMessage,
    Title,
    AssistantMessage,
}

#[derive(Debug)]
pub struct PersistFailure {
    pub step: PersistStep,
    pub error: StoreError,
}

/// What happened during an accepted send.
#[derive(Debug)]
pub struct SendReport {
    /// Chat the exchange was written to, captured when the send started.
    pub chat_id: String,
    /// `true` when the assistant failed and the fallback reply was used.
    pub fallback: bool,
    pub assistant_error: Option<AssistantError>,
    pub persist_failures: Vec<PersistFailure>,
}

impl SendReport {
    /// Whether every store write of this send succeeded.
    #[must_use]
    pub fn fully_persisted(&self) -> bool {
        self.persist_failures.is_empty()
    }
}

#[derive(Debug)]
pub enum SendOutcome {
    Rejected(RejectReason),
    Completed(SendReport),
}

#[derive(Default)]
struct Inner {
    session: Session,
    /// Chats the user titled explicitly; first-message titling skips them.
    user_titled: HashSet<String>,
    /// Bumped on every selection change so stale message loads are dropped.
    selection_epoch: u64,
    /// Chat whose stored messages the working copy is known to hold.
    loaded: Option<String>,
    /// Chat of the in-flight send and the messages it has shown so far.
    in_flight: Option<(String, Vec<Message>)>,
    /// Bumped whenever a send changes what a chat holds.
    revision: u64,
}

impl Inner {
    fn select(&mut self, id: Option<String>) -> u64 {
        self.session.active = id;
        self.session.messages.clear();
        self.loaded = None;
        self.selection_epoch += 1;
        self.selection_epoch
    }

    /// A freshly created, empty chat becomes active.
    fn activate_created(&mut self, summary: ChatSummary) {
        self.loaded = Some(summary.id.clone());
        self.session.push_front_active(summary);
        self.selection_epoch += 1;
    }

    /// Record a message of the in-flight send, showing it if its chat is active.
    fn show(&mut self, chat_id: &str, message: &Message) {
        if let Some((id, shown)) = &mut self.in_flight {
            if id.as_str() == chat_id {
                shown.push(message.clone());
            }
        }
        if self.session.is_active(chat_id) {
            self.session.messages.push(message.clone());
        }
        self.revision += 1;
    }
}

/// Append the part of `shown` that `stored` does not already end with.
fn merge_unsaved(stored: &mut Vec<Message>, shown: &[Message]) {
    let saved = (0..=shown.len())
        .rev()
        .find(|&k| stored.ends_with(&shown[..k]))
        .unwrap_or(0);
    stored.extend_from_slice(&shown[saved..]);
}

/// Clears the `sending` flag however the send ends, including cancellation.
struct SendingGuard<'a> {
    controller: &'a SessionController,
}

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.controller.lock();
        inner.session.sending = false;
        if inner.in_flight.take().is_some() {
            inner.revision += 1;
        }
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

pub struct SessionController {
    store: Arc<dyn ChatStore>,
    assistant: Arc<dyn Assistant>,
    reply_timeout: Duration,
    inner: Mutex<Inner>,
}

impl SessionController {
    #[must_use]
    pub fn new(store: Arc<dyn ChatStore>, assistant: Arc<dyn Assistant>) -> Self {
        Self {
            store,
            assistant,
            reply_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Bound on how long a send waits for the assistant before falling back.
    #[must_use]
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current session for rendering.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.lock().session.clone()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.lock().session.phase()
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        self.lock().session.draft = text.into();
    }

    // -------------------------------------------------------------------------
    // chat list
    // -------------------------------------------------------------------------

    /// Refresh the chat list from the store.
    ///
    /// Keeps the active chat if it still exists, otherwise selects the front
    /// of the list (or nothing), then reloads the active chat's messages.
    ///
    /// # Errors
    ///
    /// Returns the store error if listing or loading messages fails.
    pub async fn load(&self) -> Result<(), SessionError> {
        let chats = self.store.list().await?;
        let (target, epoch) = {
            let mut inner = self.lock();
            inner.session.chats = chats;
            let keep = inner
                .session
                .active
                .clone()
                .filter(|id| inner.session.contains(id));
            let target = keep.or_else(|| inner.session.chats.first().map(|c| c.id.clone()));
            let epoch = inner.select(target.clone());
            (target, epoch)
        };
        info!(active = ?target, "session: chats loaded");
        match target {
            Some(id) => self.load_messages(&id, epoch).await,
            None => Ok(()),
        }
    }

    /// Create an empty chat titled "New Chat" and make it active.
    ///
    /// # Errors
    ///
    /// Returns the store error if the chat cannot be created.
    pub async fn new_chat(&self) -> Result<String, SessionError> {
        let chat = self.store.create(DEFAULT_TITLE).await?;
        self.lock().activate_created(chat.summary());
        info!(chat_id = %chat.id, "session: new chat");
        Ok(chat.id)
    }

    /// Make `id` the active chat and load its messages.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` is not in the list, or the store error if
    /// its messages cannot be loaded.
    pub async fn select(&self, id: &str) -> Result<(), SessionError> {
        let epoch = {
            let mut inner = self.lock();
            if !inner.session.contains(id) {
                return Err(SessionError::NotFound(id.to_owned()));
            }
            inner.select(Some(id.to_owned()))
        };
        debug!(chat_id = %id, "session: chat selected");
        self.load_messages(id, epoch).await
    }

    /// Delete a chat. Deleting the active chat selects the new front of the
    /// list, or nothing if the list is now empty.
    ///
    /// # Errors
    ///
    /// Returns the store error if the delete fails, or if the newly
    /// selected chat's messages cannot be loaded.
    pub async fn delete(&self, id: &str) -> Result<(), SessionError> {
        self.store.delete(id).await?;
        let next = {
            let mut inner = self.lock();
            inner.user_titled.remove(id);
            match inner.session.remove(id) {
                Some(next) => {
                    inner.loaded = None;
                    inner.selection_epoch += 1;
                    let epoch = inner.selection_epoch;
                    next.map(|next_id| (next_id, epoch))
                }
                None => None,
            }
        };
        info!(chat_id = %id, "session: chat deleted");
        match next {
            Some((next_id, epoch)) => self.load_messages(&next_id, epoch).await,
            None => Ok(()),
        }
    }

    /// Set a chat's title explicitly. The first message will not retitle it.
    ///
    /// # Errors
    ///
    /// Returns the store error if the title cannot be persisted.
    pub async fn rename(&self, id: &str, title: &str) -> Result<(), SessionError> {
        self.store.update_title(id, title).await?;
        let mut inner = self.lock();
        inner.session.set_title(id, title);
        inner.user_titled.insert(id.to_owned());
        Ok(())
    }

    async fn load_messages(&self, id: &str, epoch: u64) -> Result<(), SessionError> {
        loop {
            let revision = self.lock().revision;
            let chat = self.store.get(id).await?;
            if self.apply_loaded(chat, epoch, revision) {
                return Ok(());
            }
            debug!(chat_id = %id, "session: chat changed during load, reading again");
        }
    }

    /// Install a loaded chat as the working copy. Returns `false` when a
    /// send changed the chat after the read started.
    fn apply_loaded(&self, chat: Chat, epoch: u64, revision: u64) -> bool {
        let mut inner = self.lock();
        if inner.selection_epoch != epoch || !inner.session.is_active(&chat.id) {
            return true;
        }
        if inner.revision != revision {
            return false;
        }
        let mut messages = chat.messages;
        if let Some((sending_id, shown)) = &inner.in_flight {
            if *sending_id == chat.id {
                merge_unsaved(&mut messages, shown);
            }
        }
        inner.session.set_title(&chat.id, &chat.title);
        inner.session.messages = messages;
        inner.loaded = Some(chat.id);
        true
    }

    // -------------------------------------------------------------------------
    // send protocol
    // -------------------------------------------------------------------------

    /// Send the current draft. The draft is cleared once the send is
    /// accepted and its target chat exists.
    ///
    /// # Errors
    ///
    /// See [`SessionController::send`].
    pub async fn submit(&self) -> Result<SendOutcome, SessionError> {
        let draft = self.lock().session.draft.clone();
        self.send_inner(&draft, true).await
    }

    /// Run the send protocol for `text`.
    ///
    /// # Errors
    ///
    /// Returns the store error only when a chat had to be created and the
    /// create failed. Every later failure is absorbed into the report.
    pub async fn send(&self, text: &str) -> Result<SendOutcome, SessionError> {
        self.send_inner(text, false).await
    }

    fn rejection(&self, session: &Session, text: &str) -> Option<RejectReason> {
        if text.trim().is_empty() {
            Some(RejectReason::Empty)
        } else if session.sending {
            Some(RejectReason::Busy)
        } else if !self.store.is_authenticated() {
            Some(RejectReason::Unauthenticated)
        } else {
            None
        }
    }

    async fn send_inner(&self, text: &str, clear_draft: bool) -> Result<SendOutcome, SessionError> {
        let active = {
            let mut inner = self.lock();
            if let Some(reason) = self.rejection(&inner.session, text) {
                debug!(?reason, "session: send rejected");
                return Ok(SendOutcome::Rejected(reason));
            }
            inner.session.sending = true;
            inner.session.active.clone()
        };
        let _sending = SendingGuard { controller: self };

        let chat_id = match active {
            Some(id) => id,
            None => {
                let chat = self.store.create(&derive_title(text)).await?;
                self.lock().activate_created(chat.summary());
                info!(chat_id = %chat.id, "session: chat created for send");
                chat.id
            }
        };

        let mut failures = Vec::new();

        let user_message = Message::user(text);
        let known_first = {
            let mut inner = self.lock();
            if clear_draft && inner.session.draft == text {
                inner.session.draft.clear();
            }
            let trusted = inner.session.is_active(&chat_id) && inner.loaded.as_deref() == Some(chat_id.as_str());
            let known = if inner.user_titled.contains(&chat_id) {
                Some(false)
            } else if trusted {
                Some(inner.session.messages.is_empty())
            } else {
                None
            };
            inner.in_flight = Some((chat_id.clone(), Vec::new()));
            inner.show(&chat_id, &user_message);
            known
        };
        let first_message = match known_first {
            Some(first) => first,
            None => self.stored_chat_is_empty(&chat_id).await,
        };
        if let Err(error) = self.store.append_message(&chat_id, &user_message).await {
            warn!(chat_id = %chat_id, error = %error, "session: user message not persisted");
            failures.push(PersistFailure { step: PersistStep::UserMessage, error });
        }

        if first_message {
            let title = derive_title(text);
            self.lock().session.set_title(&chat_id, &title);
            if let Err(error) = self.store.update_title(&chat_id, &title).await {
                warn!(chat_id = %chat_id, error = %error, "session: title not persisted");
                failures.push(PersistFailure { step: PersistStep::Title, error });
            }
        }

        let (reply, assistant_error) = match self.ask(text).await {
            Ok(reply) => (Message::assistant(reply), None),
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "session: assistant failed, using fallback");
                (Message::assistant(FALLBACK_REPLY), Some(e))
            }
        };

        self.lock().show(&chat_id, &reply);
        if let Err(error) = self.store.append_message(&chat_id, &reply).await {
            warn!(chat_id = %chat_id, error = %error, "session: reply not persisted");
            failures.push(PersistFailure { step: PersistStep::AssistantMessage, error });
        }

        info!(chat_id = %chat_id, fallback = assistant_error.is_some(), "session: send complete");
        Ok(SendOutcome::Completed(SendReport {
            chat_id,
            fallback: assistant_error.is_some(),
            assistant_error,
            persist_failures: failures,
        }))
    }

    /// Whether the stored chat has no messages yet. Unknown counts as
    /// "has history" so an existing title is never overwritten.
    async fn stored_chat_is_empty(&self, id: &str) -> bool {
        match self.store.get(id).await {
            Ok(chat) => chat.messages.is_empty(),
            Err(e) => {
                warn!(chat_id = %id, error = %e, "session: message count unknown, keeping title");
                false
            }
        }
    }

    async fn ask(&self, text: &str) -> Result<String, AssistantError> {
        match tokio::time::timeout(self.reply_timeout, self.assistant.ask(text, SYSTEM_PROMPT)).await {
            Ok(result) => result,
            Err(_) => Err(AssistantError::Timeout(self.reply_timeout.as_secs())),
        }
    }
}
