//! Namespace keys for locally persisted chats.
//!
//! DESIGN
//! ======
//! A browser profile shared by several accounts keeps each account's chats
//! under a key derived from its auth token. The hash is a 32-bit rolling
//! hash over UTF-16 code units: cheap, stable across sessions, and NOT a
//! security boundary. Anyone holding the device can read every namespace.

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;

const KEY_PREFIX: &str = "user_";
const CHATS_PREFIX: &str = "chats_";

/// Derive the namespace key for `token`.
///
/// Same token, same key. Distinct tokens collide only rarely.
#[must_use]
pub fn derive_key(token: &str) -> String {
    let hash = token
        .encode_utf16()
        .fold(0_i32, |hash, unit| {
            (hash << 5).wrapping_sub(hash).wrapping_add(i32::from(unit))
        });
    format!("{KEY_PREFIX}{}", i64::from(hash).abs())
}

/// Device-store key holding the chat list for namespace `key`.
#[must_use]
pub fn chats_storage_key(key: &str) -> String {
    format!("{CHATS_PREFIX}{key}")
}

/// Namespace key for an optional token. No token, no namespace.
#[must_use]
pub fn namespace_for(token: Option<&str>) -> Option<String> {
    token.map(derive_key)
}
