//! Unicode normalization applied to chunk text before embedding.

use unicode_normalization::{is_nfc_quick, IsNormalized, UnicodeNormalization};

/// Rewrite text to canonical composed form (NFC).
pub fn normalize_nfc(text: &str) -> String {
    if is_nfc_quick(text.chars()) == IsNormalized::Yes {
        return text.to_string();
    }
    text.nfc().collect()
}

/// Normalize in place, returning whether the text changed.
pub fn normalize_in_place(text: &mut String) -> bool {
    let normalized = normalize_nfc(text);
    if normalized == *text {
        return false;
    }
    *text = normalized;
    true
}
