//! XML text helpers shared by the extractor, formatter, merger and rebuilder.

mod escape;

pub use escape::{
    escape_content, escape_text, is_xml_char, resolve_entity, strip_invalid_chars, unescape_xml,
};
