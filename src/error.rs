//! Shared error classification.
//!
//! DESIGN
//! ======
//! Each layer keeps its own `thiserror` enum. `ErrorCode` gives every one of
//! them a stable machine-readable code and a retry hint so front ends can
//! decide what to show without matching on variants from other layers.

/// Stable code + retry hint for an error value.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
