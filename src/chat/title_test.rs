use super::*;

#[test]
fn short_text_is_unchanged() {
    assert_eq!(derive_title("hello"), "hello");
}

#[test]
fn exactly_thirty_chars_has_no_ellipsis() {
    let text = "a".repeat(30);
    assert_eq!(derive_title(&text), text);
}

#[test]
fn thirty_one_chars_is_cut_with_ellipsis() {
    let text = format!("{}b", "a".repeat(30));
    assert_eq!(derive_title(&text), format!("{}...", "a".repeat(30)));
}

#[test]
fn cut_counts_characters_not_bytes() {
    // Kannada letters are three bytes each in UTF-8.
    let text = "ಕ".repeat(31);
    let title = derive_title(&text);
    assert_eq!(title.chars().count(), 33);
    assert!(title.ends_with("..."));
    assert!(title.starts_with(&"ಕ".repeat(30)));
}

#[test]
fn whitespace_is_kept_verbatim() {
    assert_eq!(derive_title("  hi  "), "  hi  ");
}

#[test]
fn empty_text_yields_empty_title() {
    assert_eq!(derive_title(""), "");
}
