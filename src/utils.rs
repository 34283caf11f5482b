use std::{borrow::Cow, sync::LazyLock};

use memchr::memchr;
use percent_encoding::percent_decode_str;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// everything MediaWiki treats as a space inside a title, underscores included
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[ _\x{A0}\x{1680}\x{180E}\x{2000}-\x{200A}\x{2028}\x{2029}\x{202F}\x{205F}\x{3000}]+")
        .unwrap()
});

/// Decode `%XX` escapes into Unicode.
///
/// Invalid UTF-8 produced by the decoding is replaced by `U+FFFD`, which the caller is
/// expected to reject (see [`contains_replacement_char`]). Text without a `%` is returned
/// as is.
pub fn decode_percent(text: &str) -> Cow<'_, str> {
    if memchr(b'%', text.as_bytes()).is_none() {
        return Cow::Borrowed(text);
    }
    percent_decode_str(text).decode_utf8_lossy()
}

/// Decode named and numeric HTML entities (`&amp;`, `&#91;`, `&#x5B;`).
///
/// Unknown named entities are left untouched so that title validation can reject them.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    if memchr(b'&', text.as_bytes()).is_none() {
        return Cow::Borrowed(text);
    }
    html_escape::decode_html_entities(text)
}

pub fn contains_replacement_char(text: &str) -> bool {
    text.contains('\u{FFFD}')
}

/// Returns true if `c` is one of the bidirectional control marks that are stripped from
/// titles (they tend to slip into copy-pasted titles).
pub fn is_bidi_mark(c: char) -> bool {
    matches!(c, '\u{200E}' | '\u{200F}' | '\u{202A}'..='\u{202E}')
}

/// Normalise decoded title text.
///
/// # Steps
///
/// 1. Unicode NFC
/// 2. runs of space-equivalent characters (including `_`) become a single space
/// 3. leading and trailing whitespace is removed
/// 4. bidirectional control marks are removed
pub fn normalize_title_text(text: &str) -> String {
    let composed: String = text.nfc().collect();
    let collapsed = WHITESPACE_RUN.replace_all(&composed, " ");
    let trimmed = collapsed.trim();

    if trimmed.chars().any(is_bidi_mark) {
        trimmed.chars().filter(|c| !is_bidi_mark(*c)).collect()
    } else {
        trimmed.to_string()
    }
}

/// Case-fold a name for case-insensitive lookups (namespace names, interwiki prefixes).
///
/// Spaces and underscores are treated alike and surrounding whitespace is ignored.
pub fn fold_case(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for c in input.trim().chars() {
        let c = if c == '_' { ' ' } else { c };
        match unicode_case_mapping::to_lowercase(c) {
            [0, 0] => result.push(c),
            [l, 0] => result.extend(char::from_u32(l)),
            [l, l2] => {
                result.extend(char::from_u32(l));
                result.extend(char::from_u32(l2));
            }
        }
    }
    result
}

/// Uppercase the first character, leaving the rest of the text unchanged.
///
/// Characters whose uppercase form is more than one character (e.g. `ß`) are kept
/// as they are, the way MediaWiki does for first-letter namespaces.
pub fn first_upper(text: &str) -> Cow<'_, str> {
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return Cow::Borrowed(text);
    };

    let mut upper = first.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) if u != first => {
            let mut result = String::with_capacity(text.len() + 2);
            result.push(u);
            result.push_str(chars.as_str());
            Cow::Owned(result)
        }
        _ => Cow::Borrowed(text),
    }
}

/// Byte position of the next `:` at or after `from`.
pub(crate) fn find_colon(text: &str, from: usize) -> Option<usize> {
    text.get(from..)
        .and_then(|rest| memchr(b':', rest.as_bytes()))
        .map(|pos| pos + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_percent() {
        assert_eq!(decode_percent("Main Page"), Cow::Borrowed("Main Page"));
        assert_eq!(decode_percent("Caf%C3%A9"), "Café");
        assert_eq!(decode_percent("100%25"), "100%");
        assert!(contains_replacement_char(&decode_percent("%FF%FE")));
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("A &amp; B"), "A & B");
        assert_eq!(decode_entities("&#91;x&#x5D;"), "[x]");
        // unknown entities survive and are rejected later
        assert_eq!(decode_entities("&bogus;"), "&bogus;");
    }

    #[test]
    fn test_normalize_title_text() {
        assert_eq!(normalize_title_text("  Main__Page "), "Main Page");
        assert_eq!(normalize_title_text("A\u{3000}\u{a0}b"), "A b");
        assert_eq!(normalize_title_text("\u{200e}Foo\u{200f}"), "Foo");
        // decomposed é composes
        assert_eq!(normalize_title_text("Cafe\u{301}"), "Café");
    }

    #[test]
    fn test_fold_case() {
        assert_eq!(fold_case("User_talk"), "user talk");
        assert_eq!(fold_case(" Benutzer Diskussion "), "benutzer diskussion");
        assert_eq!(fold_case("ÄÖÜ"), "äöü");
    }

    #[test]
    fn test_first_upper() {
        assert_eq!(first_upper("main page"), "Main page");
        assert_eq!(first_upper("Main"), Cow::Borrowed("Main"));
        assert_eq!(first_upper("éclair"), "Éclair");
        assert_eq!(first_upper("ßtraße"), Cow::Borrowed("ßtraße"));
        assert_eq!(first_upper(""), "");
    }

    #[test]
    fn test_find_colon() {
        assert_eq!(find_colon("en:Foo", 0), Some(2));
        assert_eq!(find_colon("en:de:Foo", 3), Some(5));
        assert_eq!(find_colon("Foo", 0), None);
        assert_eq!(find_colon("Foo", 10), None);
    }
}
