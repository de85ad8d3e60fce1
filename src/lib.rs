//! # askai
//!
//! Chat session core for the Ask AI client: chat stores, the session
//! controller that drives the optimistic send protocol, and the assistant
//! completion client.
//!
//! ARCHITECTURE
//! ============
//! UI events go to [`session::SessionController`], which persists through a
//! [`store::ChatStore`] (local device storage or a remote HTTP store) and asks
//! an [`assistant::Assistant`] for replies. Renderers read
//! [`session::Session`] snapshots and never touch stores directly.

pub mod assistant;
pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod identity;
pub mod session;
pub mod storage;
pub mod store;
