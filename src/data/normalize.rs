use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Strip accents and other combining marks, preserving case.
///
/// `"São Paulo"` and `"Sao Paulo"` both become `"Sao Paulo"`. The result is
/// recomposed (NFC) so characters without marks are left byte-identical.
pub fn strip_diacritics(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).nfc().collect()
}
