//! Translation merger.
//!
//! Translator output arrives as one tagged block, as several chunk strings,
//! or as a single string holding a JSON array of chunk strings. All shapes
//! are normalized to a list of chunks, `<segment id="…">…</segment>` pairs
//! are pulled out of each chunk in order and matched to segments by id.

use crate::common::xml::unescape_xml;
use crate::common::{Error, Result};
use crate::segment::{format_id, TextSegment};
use memchr::memmem;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

const OPEN_TAG: &[u8] = b"<segment";
const CLOSE_TAG: &[u8] = b"</segment>";

/// Translator output as handed to the update call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TranslationInput {
    /// Genuine ordered sequence of chunk strings
    Chunks(Vec<String>),
    /// A single block, or a string-serialized array of chunks
    Text(String),
}

impl From<String> for TranslationInput {
    fn from(text: String) -> Self {
        TranslationInput::Text(text)
    }
}

impl From<&str> for TranslationInput {
    fn from(text: &str) -> Self {
        TranslationInput::Text(text.to_string())
    }
}

impl From<Vec<String>> for TranslationInput {
    fn from(chunks: Vec<String>) -> Self {
        TranslationInput::Chunks(chunks)
    }
}

impl TranslationInput {
    /// Normalize to an ordered list of chunks.
    ///
    /// A text whose trimmed form starts with `[` is tried as a JSON array of
    /// strings first; if that fails it is taken literally.
    pub fn into_chunks(self) -> Vec<String> {
        match self {
            TranslationInput::Chunks(chunks) => chunks,
            TranslationInput::Text(text) => {
                let trimmed = text.trim();
                if trimmed.starts_with('[') {
                    match serde_json::from_str::<Vec<String>>(trimmed) {
                        Ok(chunks) => {
                            log::debug!("translation input is a serialized array of {} chunks", chunks.len());
                            return chunks;
                        },
                        Err(err) => {
                            log::debug!("input starts with '[' but is not a string array: {}", err);
                        },
                    }
                }
                vec![text]
            },
        }
    }
}

/// Outcome of one merge call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    /// Segments that received a translation in this call
    pub updated_count: usize,
    /// Total segments in the session
    pub total: usize,
    /// `updated_count` differs from `total`
    pub mismatch_warning: bool,
    /// Segments still without any translation after this call
    pub skipped_count: usize,
    /// Ids in the input that match no segment
    pub unknown_ids: Vec<String>,
    /// Ids supplied more than once; the first occurrence was kept
    pub duplicate_ids: Vec<String>,
}

/// Remove `<think>…</think>` blocks, matching tags case-insensitively.
pub fn strip_think_blocks(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    while let Some(start) = find_ascii_ci(bytes, b"<think>", pos) {
        let Some(end) = find_ascii_ci(bytes, b"</think>", start) else {
            break;
        };
        out.push_str(&text[pos..start]);
        pos = end + b"</think>".len();
    }
    out.push_str(&text[pos..]);
    out
}

fn find_ascii_ci(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    let first = needle[0];
    let mut i = from;
    while i + needle.len() <= haystack.len() {
        let rel = memchr::memchr(first, &haystack[i..])?;
        let at = i + rel;
        if at + needle.len() > haystack.len() {
            return None;
        }
        if haystack[at..at + needle.len()].eq_ignore_ascii_case(needle) {
            return Some(at);
        }
        i = at + 1;
    }
    None
}

/// Extract `(id, text)` pairs from one chunk, in order.
///
/// The opening tag may use single or double quotes and surrounding
/// whitespace. Text is XML-unescaped and trimmed.
pub fn parse_segments(chunk: &str) -> Vec<(String, String)> {
    let cleaned = strip_think_blocks(chunk);
    let bytes = cleaned.as_bytes();
    let finder = memmem::Finder::new(OPEN_TAG);
    let mut pairs = Vec::new();
    let mut pos = 0;

    while let Some(rel) = finder.find(&bytes[pos..]) {
        let tag_start = pos + rel;
        let Some((id, content_start)) = parse_open_tag(bytes, tag_start + OPEN_TAG.len()) else {
            pos = tag_start + OPEN_TAG.len();
            continue;
        };
        let Some(close_rel) = memmem::find(&bytes[content_start..], CLOSE_TAG) else {
            break;
        };
        let content_end = content_start + close_rel;

        // An unclosed tag followed by another segment: resume at the inner one.
        if let Some(inner) = finder.find(&bytes[content_start..content_end]) {
            pos = content_start + inner;
            continue;
        }

        let text = unescape_xml(cleaned[content_start..content_end].trim());
        pairs.push((id, text));
        pos = content_end + CLOSE_TAG.len();
    }

    pairs
}

/// Parse ` id="…">` starting right after `<segment`. Returns the id and the
/// offset just past `>`.
fn parse_open_tag(bytes: &[u8], mut i: usize) -> Option<(String, usize)> {
    let skip_ws = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        i
    };

    let after_name = i;
    i = skip_ws(i);
    if i == after_name || !bytes[i..].starts_with(b"id") {
        return None;
    }
    i = skip_ws(i + 2);
    if bytes.get(i) != Some(&b'=') {
        return None;
    }
    i = skip_ws(i + 1);
    let quote = *bytes.get(i).filter(|&&q| q == b'"' || q == b'\'')?;
    let id_start = i + 1;
    let id_len = bytes[id_start..]
        .iter()
        .position(|&b| b == quote || b == b'>' || b == b'<')?;
    if bytes.get(id_start + id_len) != Some(&quote) {
        return None;
    }
    let id = std::str::from_utf8(&bytes[id_start..id_start + id_len]).ok()?.trim().to_string();
    i = skip_ws(id_start + id_len + 1);
    if bytes.get(i) != Some(&b'>') || id.is_empty() {
        return None;
    }
    Some((id, i + 1))
}

/// Merge translator output into `segments`.
///
/// Translations accumulate across calls: segments not mentioned keep any
/// earlier translation. Fails with [`Error::MalformedTranslationInput`]
/// when no tagged segment can be found at all.
pub fn merge(segments: &mut [TextSegment], input: TranslationInput) -> Result<MergeOutcome> {
    let chunks = input.into_chunks();
    let pairs: Vec<(String, String)> = chunks.iter().flat_map(|c| parse_segments(c)).collect();
    if pairs.is_empty() {
        return Err(Error::MalformedTranslationInput(format!(
            "no <segment id=\"…\"> tags found in {} chunk(s)",
            chunks.len()
        )));
    }

    let index: HashMap<String, usize> = segments
        .iter()
        .enumerate()
        .map(|(i, seg)| (seg.id.clone(), i))
        .collect();

    let mut outcome = MergeOutcome {
        total: segments.len(),
        ..Default::default()
    };
    let mut seen: HashSet<usize> = HashSet::new();

    for (id, text) in pairs {
        let Some(&i) = index.get(&id).or_else(|| {
            // Tolerate ids that lost their zero padding.
            id.parse::<usize>().ok().and_then(|n| index.get(&format_id(n)))
        }) else {
            outcome.unknown_ids.push(id);
            continue;
        };
        // A blank occurrence does not claim the id.
        if text.is_empty() {
            continue;
        }
        if !seen.insert(i) {
            outcome.duplicate_ids.push(id);
            continue;
        }
        segments[i].translated_text = Some(text);
        outcome.updated_count += 1;
    }

    outcome.mismatch_warning = outcome.updated_count != outcome.total;
    outcome.skipped_count = segments.iter().filter(|s| !s.is_translated()).count();

    if !outcome.unknown_ids.is_empty() {
        log::warn!("ignored {} unknown segment ids: {:?}", outcome.unknown_ids.len(), outcome.unknown_ids);
    }
    if !outcome.duplicate_ids.is_empty() {
        log::warn!("duplicate segment ids kept first occurrence: {:?}", outcome.duplicate_ids);
    }
    if outcome.mismatch_warning {
        let mismatch = Error::SegmentCountMismatch {
            expected: outcome.total,
            matched: outcome.updated_count,
        };
        log::warn!("{}", mismatch);
    }

    Ok(outcome)
}
