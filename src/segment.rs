//! Text segments and their structural locators.
//!
//! A [`TextSegment`] is one translatable text node. Its `id` is assigned once
//! at extraction in document order and is the only key that ties extraction,
//! translation and rebuild together.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Minimum width of a segment id; longer ids simply grow.
pub const ID_WIDTH: usize = 3;

/// Format the zero-padded id for the `n`th segment (1-based).
///
/// ```
/// use ooxml_translate::segment::format_id;
/// assert_eq!(format_id(7), "007");
/// assert_eq!(format_id(1234), "1234");
/// ```
#[inline]
pub fn format_id(n: usize) -> String {
    format!("{:0width$}", n, width = ID_WIDTH)
}

/// Path of element child ordinals from the part root to a text element.
///
/// Only elements are counted; text, comments and processing instructions do
/// not shift ordinals. The root element itself is step `0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Locator(SmallVec<[u32; 12]>);

impl Locator {
    #[inline]
    pub fn new(steps: &[u32]) -> Self {
        Self(SmallVec::from_slice(steps))
    }

    #[inline]
    pub fn steps(&self) -> &[u32] {
        &self.0
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for step in &self.0 {
            write!(f, "/{}", step)?;
        }
        Ok(())
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> Self {
        locator.to_string()
    }
}

impl TryFrom<String> for Locator {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::str::FromStr for Locator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix('/')
            .ok_or_else(|| format!("locator '{}' must start with '/'", s))?;
        if rest.is_empty() {
            return Ok(Self::default());
        }
        rest.split('/')
            .map(|step| {
                step.parse::<u32>()
                    .map_err(|_| format!("invalid locator step '{}' in '{}'", step, s))
            })
            .collect::<Result<SmallVec<_>, _>>()
            .map(Self)
    }
}

/// Whitespace that must survive translation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpaceInfo {
    /// The element carries `xml:space="preserve"`
    pub preserve_attr: bool,
    /// Exact leading whitespace of the original text
    pub leading: String,
    /// Exact trailing whitespace of the original text
    pub trailing: String,
    /// The trimmed text contains runs of two or more whitespace characters,
    /// or tabs/newlines, that are only kept under `xml:space="preserve"`
    pub internal_runs: bool,
}

impl SpaceInfo {
    /// Split `raw` into its whitespace envelope and trimmed core.
    pub fn analyze(raw: &str, preserve_attr: bool) -> (Self, &str) {
        let core = raw.trim();
        let start = raw.len() - raw.trim_start().len();
        let end = start + core.len();
        let info = Self {
            preserve_attr,
            leading: raw[..start].to_string(),
            trailing: raw[end..].to_string(),
            internal_runs: has_significant_runs(core),
        };
        (info, core)
    }

    /// Reassemble the effective text around a translated core.
    #[inline]
    pub fn wrap(&self, core: &str) -> String {
        let mut out = String::with_capacity(self.leading.len() + core.len() + self.trailing.len());
        out.push_str(&self.leading);
        out.push_str(core);
        out.push_str(&self.trailing);
        out
    }
}

/// Whether `text` has whitespace that a non-preserving consumer would collapse.
pub fn needs_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace)
        || text.ends_with(char::is_whitespace)
        || has_significant_runs(text)
}

fn has_significant_runs(text: &str) -> bool {
    let mut prev_space = false;
    for c in text.chars() {
        if matches!(c, '\t' | '\n' | '\r') {
            return true;
        }
        let space = c.is_whitespace();
        if space && prev_space {
            return true;
        }
        prev_space = space;
    }
    false
}

/// One translatable text node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSegment {
    /// Zero-padded ordinal, e.g. `"001"`
    pub id: String,
    /// Archive path of the XML part holding the node
    pub source_part: String,
    /// Element path to the node inside `source_part`
    pub locator: Locator,
    /// Trimmed text as extracted
    pub original_text: String,
    pub space_info: SpaceInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
}

impl TextSegment {
    /// The node's full text as it appeared in the part.
    #[inline]
    pub fn raw_text(&self) -> String {
        self.space_info.wrap(&self.original_text)
    }

    #[inline]
    pub fn is_translated(&self) -> bool {
        self.translated_text.is_some()
    }

    /// Text to write back: the trimmed translation (or the original when
    /// none is present) inside the original whitespace envelope.
    pub fn final_text(&self) -> String {
        let core = self
            .translated_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.original_text);
        self.space_info.wrap(core)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_display_and_parse() {
        let loc = Locator::new(&[0, 3, 1]);
        assert_eq!(loc.to_string(), "/0/3/1");
        assert_eq!("/0/3/1".parse::<Locator>().unwrap(), loc);
        assert!("0/3".parse::<Locator>().is_err());
        assert!("/0/x".parse::<Locator>().is_err());
    }

    #[test]
    fn test_locator_serializes_as_string() {
        let loc = Locator::new(&[0, 2]);
        let json = serde_json::to_string(&loc).unwrap();
        assert_eq!(json, "\"/0/2\"");
        let back: Locator = serde_json::from_str(&json).unwrap();
        assert_eq!(back, loc);
    }

    #[test]
    fn test_space_info_analyze() {
        let (info, core) = SpaceInfo::analyze("  Hello  world\t", true);
        assert_eq!(core, "Hello  world");
        assert_eq!(info.leading, "  ");
        assert_eq!(info.trailing, "\t");
        assert!(info.internal_runs);
        assert!(info.preserve_attr);
        assert_eq!(info.wrap("Bonjour"), "  Bonjour\t");
    }

    #[test]
    fn test_final_text_keeps_envelope() {
        let (space_info, core) = SpaceInfo::analyze(" Hello ", false);
        let mut seg = TextSegment {
            id: format_id(1),
            source_part: "word/document.xml".to_string(),
            locator: Locator::new(&[0, 0, 0, 1, 0]),
            original_text: core.to_string(),
            space_info,
            translated_text: None,
        };
        assert_eq!(seg.final_text(), " Hello ");
        seg.translated_text = Some("\n  Bonjour   ".to_string());
        assert_eq!(seg.final_text(), " Bonjour ");
        seg.translated_text = Some("   ".to_string());
        assert_eq!(seg.final_text(), " Hello ");
    }

    #[test]
    fn test_needs_preserve() {
        assert!(needs_preserve(" a"));
        assert!(needs_preserve("a  b"));
        assert!(needs_preserve("a\tb"));
        assert!(!needs_preserve("a b"));
    }
}
