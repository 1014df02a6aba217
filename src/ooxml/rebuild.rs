//! Rebuilder: splice translated text back into the original parts.
//!
//! Each segment's element is found again through its locator in the
//! original part bytes. Only the element's content bytes are replaced (plus
//! an `xml:space="preserve"` attribute when the new text needs it), so
//! everything else in the part, including attribute order, namespace
//! declarations and formatting, stays byte-identical. Parts without edits
//! are raw-copied by [`Package::repack`].

use super::container::Package;
use super::format::{FileType, ScanMap};
use super::walk::{self, Ns, ParseMode, TextNode};
use crate::common::xml::{escape_content, strip_invalid_chars};
use crate::common::{Error, Result};
use crate::config::{ExtractOptions, RebuildOptions};
use crate::segment::{needs_preserve, Locator, TextSegment};
use base64::Engine as _;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

const PRESERVE_ATTR: &[u8] = b" xml:space=\"preserve\"";

/// Characters after which a following word needs a separating space.
const CLOSERS: &[char] = &[',', '.', ';', ':', '!', '?', ')', ']', '}', '"', '\'', '”', '’'];
/// Characters before which a preceding word needs a separating space.
const OPENERS: &[char] = &['(', '[', '{', '"', '\'', '“', '‘'];

/// Counters and anomalies from one rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    /// Segments written with their translation
    pub replaced_count: usize,
    /// Located segments written back with their original text
    pub fallback_count: usize,
    /// Ids whose locator no longer resolved to the recorded text
    pub locator_misses: Vec<String>,
    pub warnings: Vec<String>,
    /// Parts that were re-serialized
    pub modified_parts: Vec<String>,
}

/// A rebuilt archive.
#[derive(Debug, Clone)]
pub struct Rebuilt {
    pub archive: Vec<u8>,
    pub output_filename: String,
    pub file_type: FileType,
    pub report: RebuildReport,
}

impl Rebuilt {
    /// Standard base64 of the archive.
    pub fn payload_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.archive)
    }

    /// `data:` URL carrying the archive.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.file_type.mime_type(), self.payload_base64())
    }
}

/// Apply the segments' final texts to `pkg` and repack it.
pub fn rebuild(
    pkg: &Package<'_>,
    file_type: FileType,
    segments: &[TextSegment],
    original_filename: &str,
    options: &RebuildOptions,
) -> Result<Rebuilt> {
    let supports_preserve = ScanMap::new(file_type, &ExtractOptions::default()).supports_preserve();

    let mut finals: Vec<String> = segments.iter().map(TextSegment::final_text).collect();
    if options.joint_spacing {
        apply_joint_spacing(segments, &mut finals);
    }

    // Group segment indices by part, keeping first-seen part order.
    let mut part_order: Vec<&str> = Vec::new();
    let mut by_part: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, seg) in segments.iter().enumerate() {
        by_part
            .entry(seg.source_part.as_str())
            .or_insert_with(|| {
                part_order.push(seg.source_part.as_str());
                Vec::new()
            })
            .push(i);
    }

    let mut report = RebuildReport::default();
    let mut replacements = HashMap::new();

    for part in part_order {
        let indices = &by_part[part];
        let Some(xml) = pkg.xml_part(part)? else {
            for &i in indices {
                miss(&mut report, &segments[i], "part is missing");
            }
            continue;
        };

        let wanted: HashSet<&[u32]> = indices.iter().map(|&i| segments[i].locator.steps()).collect();
        let nodes = walk::walk(xml, ParseMode::Tolerant, Ns::Other, |_, _, path| {
            wanted.contains(path).then_some(())
        })?;
        let located: HashMap<Locator, TextNode<()>> =
            nodes.into_iter().map(|node| (node.locator.clone(), node)).collect();

        let mut edits: Vec<Edit> = Vec::new();
        for &i in indices {
            let seg = &segments[i];
            let Some(node) = located.get(&seg.locator) else {
                miss(&mut report, seg, "locator does not resolve");
                continue;
            };
            if !node.plain || node.text != seg.raw_text() || xml.get(node.start_tag.start) != Some(&b'<') {
                miss(&mut report, seg, "element text differs from the extracted text");
                continue;
            }

            if has_translation(seg) {
                report.replaced_count += 1;
            } else {
                report.fallback_count += 1;
            }

            // Translator output is untrusted; originals came out of the part.
            let text = if has_translation(seg) {
                let safe = strip_invalid_chars(&finals[i]);
                if let Cow::Owned(_) = safe {
                    log::warn!("segment {}: removed characters not allowed in XML", seg.id);
                    report
                        .warnings
                        .push(format!("segment {}: removed characters not allowed in XML", seg.id));
                }
                safe
            } else {
                Cow::Borrowed(finals[i].as_str())
            };
            if *text == node.text {
                continue;
            }
            edits.push(Edit {
                range: node.content.clone(),
                bytes: escape_content(&text).into_bytes(),
            });
            if supports_preserve && !node.preserve && needs_preserve(&text) {
                let at = node.start_tag.end.saturating_sub(1);
                if xml.get(at) == Some(&b'>') {
                    edits.push(Edit {
                        range: at..at,
                        bytes: PRESERVE_ATTR.to_vec(),
                    });
                }
            }
        }

        if !edits.is_empty() {
            log::debug!("{}: {} edits", part, edits.len());
            replacements.insert(part.to_string(), splice(xml, edits));
            report.modified_parts.push(part.to_string());
        }
    }

    if !report.locator_misses.is_empty() {
        report.warnings.push(format!(
            "{} segment(s) could not be located and kept their original text",
            report.locator_misses.len()
        ));
    }

    let archive = pkg.repack(&replacements)?;
    Ok(Rebuilt {
        archive,
        output_filename: output_filename(original_filename, &options.filename_marker, file_type),
        file_type,
        report,
    })
}

struct Edit {
    range: std::ops::Range<usize>,
    bytes: Vec<u8>,
}

/// Apply non-overlapping edits to `xml`.
fn splice(xml: &[u8], mut edits: Vec<Edit>) -> Vec<u8> {
    edits.sort_by_key(|e| (e.range.start, e.range.end));
    let extra: usize = edits.iter().map(|e| e.bytes.len()).sum();
    let mut out = Vec::with_capacity(xml.len() + extra);
    let mut pos = 0;
    for edit in edits {
        out.extend_from_slice(&xml[pos..edit.range.start]);
        out.extend_from_slice(&edit.bytes);
        pos = edit.range.end;
    }
    out.extend_from_slice(&xml[pos..]);
    out
}

#[inline]
fn has_translation(seg: &TextSegment) -> bool {
    seg.translated_text
        .as_deref()
        .is_some_and(|t| !t.trim().is_empty())
}

fn miss(report: &mut RebuildReport, seg: &TextSegment, reason: &str) {
    let err = Error::SegmentLocatorNotFound {
        id: seg.id.clone(),
        part: seg.source_part.clone(),
        locator: seg.locator.to_string(),
    };
    log::warn!("{} ({})", err, reason);
    report.warnings.push(format!("{} ({})", err, reason));
    report.locator_misses.push(seg.id.clone());
}

/// Append a space to translated segments that would otherwise run into the
/// next segment of the same part.
fn apply_joint_spacing(segments: &[TextSegment], finals: &mut [String]) {
    for i in 0..segments.len().saturating_sub(1) {
        let (seg, next) = (&segments[i], &segments[i + 1]);
        if seg.source_part != next.source_part || !has_translation(seg) {
            continue;
        }
        if needs_joint(&finals[i], &finals[i + 1]) {
            finals[i].push(' ');
        }
    }
}

fn needs_joint(text: &str, next: &str) -> bool {
    let (Some(last), Some(first)) = (text.chars().last(), next.chars().next()) else {
        return false;
    };
    if last.is_ascii_digit() && first.is_ascii_digit() {
        return false;
    }
    let word_end = last.is_alphanumeric();
    ((word_end || CLOSERS.contains(&last)) && first.is_alphanumeric())
        || (word_end && OPENERS.contains(&first))
}

/// `report.docx` becomes `report_translated.docx`.
pub fn output_filename(original: &str, marker: &str, file_type: FileType) -> String {
    let name = original.rsplit(['/', '\\']).next().unwrap_or(original);
    if name.is_empty() {
        return format!("document{}.{}", marker, file_type.extension());
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}{}.{}", stem, marker, ext),
        _ => format!("{}{}", name, marker),
    }
}
