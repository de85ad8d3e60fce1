//! Chat title derivation.

#[cfg(test)]
#[path = "title_test.rs"]
mod tests;

/// Title given to chats created with the "new chat" action.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Longest title prefix, in characters, taken from a first message.
pub const TITLE_MAX_CHARS: usize = 30;

const ELLIPSIS: &str = "...";

/// Derive a chat title from the text of its first message.
///
/// Texts of at most [`TITLE_MAX_CHARS`] characters are used as-is; longer
/// ones are cut to that many characters and suffixed with `...`.
#[must_use]
pub fn derive_title(text: &str) -> String {
    match text.char_indices().nth(TITLE_MAX_CHARS) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &text[..cut]),
        None => text.to_owned(),
    }
}
