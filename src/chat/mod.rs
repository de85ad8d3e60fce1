//! Chat domain types shared by stores, the session controller and renderers.
//!
//! SYSTEM CONTEXT
//! ==============
//! `model` defines the persisted shapes; `title` owns title derivation so the
//! store-side create and the controller-side first-message rename agree.

pub mod model;
pub mod title;

pub use model::{Chat, ChatSummary, Message, Role};
pub use title::{DEFAULT_TITLE, derive_title};
