//! Chunk formatter.
//!
//! Segments are rendered as `<segment id="NNN">text</segment>` blocks in
//! document order, joined by newlines. In array mode the blocks are grouped
//! greedily into chunks bounded by a character budget and a segment count;
//! a block is never split, so an oversize segment forms a chunk of its own.

use crate::common::xml::escape_text;
use crate::config::{ChunkOptions, OutputFormat};
use crate::segment::TextSegment;
use serde::Serialize;

/// Characters of formatted text included in previews.
pub const PREVIEW_CHARS: usize = 200;

/// Render one segment as a tagged block.
///
/// ```
/// use ooxml_translate::segment::{Locator, SpaceInfo, TextSegment};
/// use ooxml_translate::translate::format_segment;
///
/// let seg = TextSegment {
///     id: "001".into(),
///     source_part: "word/document.xml".into(),
///     locator: Locator::new(&[0, 0]),
///     original_text: "R&D".into(),
///     space_info: SpaceInfo::default(),
///     translated_text: None,
/// };
/// assert_eq!(format_segment(&seg), r#"<segment id="001">R&amp;D</segment>"#);
/// ```
pub fn format_segment(seg: &TextSegment) -> String {
    format!(
        "<segment id=\"{}\">{}</segment>",
        seg.id,
        escape_text(&seg.original_text)
    )
}

/// Formatted segments, serialized as a bare string or array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FormattedTexts {
    Single(String),
    Chunks(Vec<String>),
}

impl FormattedTexts {
    /// Number of chunks (1 for a single block).
    pub fn chunk_count(&self) -> usize {
        match self {
            FormattedTexts::Single(_) => 1,
            FormattedTexts::Chunks(chunks) => chunks.len(),
        }
    }

    /// First [`PREVIEW_CHARS`] characters of the formatted text.
    pub fn preview(&self) -> String {
        let first = match self {
            FormattedTexts::Single(text) => text.as_str(),
            FormattedTexts::Chunks(chunks) => chunks.first().map(String::as_str).unwrap_or(""),
        };
        first.chars().take(PREVIEW_CHARS).collect()
    }
}

/// Format segments according to `options`.
pub fn format_segments(segments: &[TextSegment], options: &ChunkOptions) -> FormattedTexts {
    match options.output_format {
        OutputFormat::String => FormattedTexts::Single(single_block(segments)),
        OutputFormat::Array => FormattedTexts::Chunks(chunk_segments(
            segments,
            options.max_chars,
            options.max_segments,
        )),
    }
}

/// All segments in one newline-joined block.
pub fn single_block(segments: &[TextSegment]) -> String {
    segments
        .iter()
        .map(format_segment)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Group segments into chunks of at most `max_chars` characters (counting
/// one separator per joined block) and `max_segments` segments.
pub fn chunk_segments(segments: &[TextSegment], max_chars: usize, max_segments: usize) -> Vec<String> {
    let max_segments = max_segments.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;
    let mut current_count = 0usize;

    for seg in segments {
        let block = format_segment(seg);
        let block_chars = block.chars().count();
        let added = if current_count == 0 { block_chars } else { block_chars + 1 };

        if current_count > 0 && (current_chars + added > max_chars || current_count >= max_segments) {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
            current_count = 0;
        }

        if current_count > 0 {
            current.push('\n');
            current_chars += 1;
        }
        current.push_str(&block);
        current_chars += block_chars;
        current_count += 1;
    }

    if current_count > 0 {
        chunks.push(current);
    }
    chunks
}
