//! Session value shown by renderers.
//!
//! DESIGN
//! ======
//! Plain data, cloned out of the controller as a snapshot. Only the
//! controller mutates it, so the helpers here are crate-private.

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;

use crate::chat::{ChatSummary, Message};

/// Whether a send is in flight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Sending,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    /// Chat list, most recently created first.
    pub chats: Vec<ChatSummary>,
    /// Displayed chat. Always an id present in `chats` when set.
    pub active: Option<String>,
    /// Working copy of the active chat's messages.
    pub messages: Vec<Message>,
    /// Pending input text.
    pub draft: String,
    pub sending: bool,
}

impl Session {
    #[must_use]
    pub fn phase(&self) -> Phase {
        if self.sending { Phase::Sending } else { Phase::Idle }
    }

    #[must_use]
    pub fn active_chat(&self) -> Option<&ChatSummary> {
        let active = self.active.as_deref()?;
        self.chats.iter().find(|c| c.id == active)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.chats.iter().any(|c| c.id == id)
    }

    pub(crate) fn is_active(&self, id: &str) -> bool {
        self.active.as_deref() == Some(id)
    }

    /// Put a newly created chat at the front and make it active.
    pub(crate) fn push_front_active(&mut self, summary: ChatSummary) {
        self.chats.retain(|c| c.id != summary.id);
        self.active = Some(summary.id.clone());
        self.chats.insert(0, summary);
        self.messages.clear();
    }

    pub(crate) fn set_title(&mut self, id: &str, title: &str) {
        if let Some(chat) = self.chats.iter_mut().find(|c| c.id == id) {
            title.clone_into(&mut chat.title);
        }
    }

    /// Drop a chat from the list. If it was active, the new front (or
    /// nothing) becomes active and the working copy is discarded.
    ///
    /// Returns the new active id when the selection moved.
    pub(crate) fn remove(&mut self, id: &str) -> Option<Option<String>> {
        self.chats.retain(|c| c.id != id);
        if !self.is_active(id) {
            return None;
        }
        self.active = self.chats.first().map(|c| c.id.clone());
        self.messages.clear();
        Some(self.active.clone())
    }
}
