//! Chat session state management.
//!
//! SYSTEM CONTEXT
//! ==============
//! `SessionController` is the only writer of the [`Session`] value that
//! renderers display. It owns the active selection and the working copy of
//! the active chat's messages, and runs the optimistic send protocol:
//! user message shown and persisted first, assistant reply (or a fixed
//! fallback) appended when the completion call returns.

pub mod controller;
pub mod state;

pub use controller::{
    PersistFailure, PersistStep, RejectReason, SendOutcome, SendReport, SessionController, SessionError,
};
pub use state::{Phase, Session};
