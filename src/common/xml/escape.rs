use aho_corasick::{AhoCorasick, MatchKind};
use once_cell::sync::Lazy;
use std::borrow::Cow;

// Text content only needs the three markup-significant characters
static XML_TEXT_ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(["&", "<", ">"])
        .expect("Failed to build XML text escaper")
});

// Spliced content also keeps carriage returns, which readers would fold into LF
static XML_CONTENT_ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(["&", "<", ">", "\r"])
        .expect("Failed to build XML content escaper")
});

// Use LeftmostLongest to ensure longer entities are matched first (e.g., &amp; instead of &lt;)
static XML_UNESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .build(["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"])
        .expect("Failed to build XML unescaper")
});

/// Escape text for use as element content.
///
/// Quotes are left alone since they carry no meaning outside attributes.
///
/// ```
/// use ooxml_translate::common::xml::escape_text;
/// assert_eq!(escape_text("\"a\" < b"), "\"a\" &lt; b");
/// ```
#[inline]
pub fn escape_text(s: &str) -> String {
    XML_TEXT_ESCAPER.replace_all(s, &["&amp;", "&lt;", "&gt;"])
}

/// Escape text written directly into a part's element content.
///
/// Like [`escape_text`], but a carriage return becomes `&#13;` so it
/// survives line-end normalization.
///
/// ```
/// use ooxml_translate::common::xml::escape_content;
/// assert_eq!(escape_content("a\r\nb & c"), "a&#13;\nb &amp; c");
/// ```
#[inline]
pub fn escape_content(s: &str) -> String {
    XML_CONTENT_ESCAPER.replace_all(s, &["&amp;", "&lt;", "&gt;", "&#13;"])
}

/// Whether `c` may appear in an XML 1.0 document.
#[inline]
pub fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\u{9}' | '\u{A}' | '\u{D}'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

/// Drop characters XML 1.0 does not allow (most C0 controls, U+FFFE, U+FFFF).
///
/// ```
/// use ooxml_translate::common::xml::strip_invalid_chars;
/// assert_eq!(strip_invalid_chars("Bon\u{1}jour\u{FFFF}"), "Bonjour");
/// assert!(matches!(strip_invalid_chars("ok\tfine"), std::borrow::Cow::Borrowed(_)));
/// ```
pub fn strip_invalid_chars(s: &str) -> Cow<'_, str> {
    if s.chars().all(is_xml_char) {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(s.chars().filter(|&c| is_xml_char(c)).collect())
    }
}

/// Unescape XML special characters.
///
/// Replaces the five standard XML entities with their corresponding characters.
/// Unknown or malformed entities are left unchanged.
///
/// # Examples
///
/// ```
/// use ooxml_translate::common::xml::unescape_xml;
/// assert_eq!(unescape_xml("&lt;a &amp; b&gt;"), "<a & b>");
/// assert_eq!(unescape_xml("&quot;hello&apos;"), "\"hello'");
/// assert_eq!(unescape_xml("&amp;lt;"), "&lt;"); // &amp; is matched first
/// assert_eq!(unescape_xml("a & b"), "a & b"); // unchanged
/// assert_eq!(unescape_xml("&invalid;"), "&invalid;"); // unknown entity
/// assert_eq!(unescape_xml("&amp"), "&amp"); // incomplete, no semicolon
/// ```
#[inline]
pub fn unescape_xml(s: &str) -> String {
    XML_UNESCAPER.replace_all(s, &["&", "<", ">", "\"", "'"])
}

/// Resolve the name of a general entity reference (the part between `&` and `;`).
///
/// Only the five predefined entities and numeric character references are
/// resolved. Anything else would need a DTD, and DTD-declared entities are
/// never expanded, so `None` is returned for them.
///
/// ```
/// use ooxml_translate::common::xml::resolve_entity;
/// assert_eq!(resolve_entity("amp"), Some('&'));
/// assert_eq!(resolve_entity("#x41"), Some('A'));
/// assert_eq!(resolve_entity("#8212"), Some('\u{2014}'));
/// assert_eq!(resolve_entity("xxe"), None);
/// ```
pub fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let digits = name.strip_prefix('#')?;
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        },
    }
}
