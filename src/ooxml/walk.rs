//! Streaming XML walker shared by extraction and rebuild.
//!
//! The walker assigns every element a structural path of child ordinals
//! (text, comments and processing instructions are not counted) and records,
//! for each selected element, the byte range of its start tag and content.
//! Because the path only depends on element nesting, the namespace-aware
//! reader and the tolerant reader produce identical locators for the same
//! part bytes.
//!
//! Entity handling: only the five predefined entities and numeric character
//! references are resolved. A DOCTYPE is skipped without being interpreted,
//! so DTD-declared entities (and any external resources they name) are never
//! expanded; an element that references one is reported as not plain.

use crate::common::xml::resolve_entity;
use crate::common::Result;
use crate::segment::Locator;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::{NsReader, Reader};
use smallvec::{smallvec, SmallVec};
use std::ops::Range;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Namespaces relevant to text extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ns {
    Word,
    Spreadsheet,
    Drawing,
    Presentation,
    Other,
}

impl Ns {
    /// Map a namespace URI, transitional or strict.
    pub fn from_uri(uri: &[u8]) -> Self {
        match uri {
            b"http://schemas.openxmlformats.org/wordprocessingml/2006/main"
            | b"http://purl.oclc.org/ooxml/wordprocessingml/main" => Ns::Word,
            b"http://schemas.openxmlformats.org/spreadsheetml/2006/main"
            | b"http://purl.oclc.org/ooxml/spreadsheetml/main" => Ns::Spreadsheet,
            b"http://schemas.openxmlformats.org/drawingml/2006/main"
            | b"http://purl.oclc.org/ooxml/drawingml/main" => Ns::Drawing,
            b"http://schemas.openxmlformats.org/presentationml/2006/main"
            | b"http://purl.oclc.org/ooxml/presentationml/main" => Ns::Presentation,
            _ => Ns::Other,
        }
    }

    /// Guess the namespace from the conventional prefix, for the tolerant
    /// reader. Unprefixed names take `default`.
    pub fn from_prefix(prefix: Option<&[u8]>, default: Ns) -> Self {
        match prefix {
            None => default,
            Some(b"w") => Ns::Word,
            Some(b"x") => Ns::Spreadsheet,
            Some(b"a") => Ns::Drawing,
            Some(b"p") => Ns::Presentation,
            Some(_) => Ns::Other,
        }
    }
}

/// Value of a spreadsheet cell's `t` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    InlineStr,
    Str,
    Other,
}

/// Local names the scan maps care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    T,
    V,
    Text,
    Si,
    RPh,
    Is,
    Cell(CellType),
    Other,
}

/// A classified element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elem {
    pub ns: Ns,
    pub tag: Tag,
}

impl Elem {
    #[inline]
    pub fn is(&self, ns: Ns, tag: Tag) -> bool {
        self.ns == ns && self.tag == tag
    }
}

/// Which reader drives the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// `NsReader` with end-name checks
    Namespaced,
    /// Plain `Reader`, prefix-based namespaces, mismatched ends tolerated
    Tolerant,
}

/// A selected element and its text content.
#[derive(Debug, Clone)]
pub struct TextNode<K> {
    pub kind: K,
    pub locator: Locator,
    /// Decoded content (entities resolved)
    pub text: String,
    /// The start tag carries `xml:space="preserve"`
    pub preserve: bool,
    /// Byte range of the start tag, `<` through `>`
    pub start_tag: Range<usize>,
    /// Byte range between the start and end tags
    pub content: Range<usize>,
    /// Content is only text, CDATA and resolvable references
    pub plain: bool,
}

/// Walk with the namespace-aware reader, falling back to the tolerant one
/// if the part is not well-formed.
pub fn scan<K, F>(xml: &[u8], default_ns: Ns, mut select: F) -> Result<(Vec<TextNode<K>>, ParseMode)>
where
    F: FnMut(&[Elem], &Elem, &[u32]) -> Option<K>,
{
    match walk(xml, ParseMode::Namespaced, default_ns, &mut select) {
        Ok(nodes) => Ok((nodes, ParseMode::Namespaced)),
        Err(err) => {
            log::warn!("namespace-aware parse failed ({}), retrying tolerant", err);
            walk(xml, ParseMode::Tolerant, default_ns, &mut select)
                .map(|nodes| (nodes, ParseMode::Tolerant))
        },
    }
}

/// Walk a part with the given reader.
///
/// `select` sees the open ancestors, the element itself and its path, and
/// returns a kind for elements that should be captured. Elements nested in
/// a captured element are never captured themselves.
pub fn walk<K, F>(xml: &[u8], mode: ParseMode, default_ns: Ns, select: F) -> Result<Vec<TextNode<K>>>
where
    F: FnMut(&[Elem], &Elem, &[u32]) -> Option<K>,
{
    // quick-xml skips a leading BOM without counting it in buffer positions,
    // so walk past it and shift the ranges back onto `xml`.
    let (offset, body) = match xml.strip_prefix(UTF8_BOM) {
        Some(rest) => (UTF8_BOM.len(), rest),
        None => (0, xml),
    };
    let mut nodes = match mode {
        ParseMode::Namespaced => drive(&mut Namespaced::new(body), select)?,
        ParseMode::Tolerant => drive(&mut Tolerant::new(body, default_ns), select)?,
    };
    if offset > 0 {
        for node in &mut nodes {
            node.start_tag = node.start_tag.start + offset..node.start_tag.end + offset;
            node.content = node.content.start + offset..node.content.end + offset;
        }
    }
    Ok(nodes)
}

trait EventSource<'i> {
    /// Next event, with the element namespace for start/empty events.
    fn next(&mut self) -> Result<(Ns, Event<'i>)>;

    fn position(&self) -> usize;
}

struct Namespaced<'i> {
    reader: NsReader<&'i [u8]>,
}

impl<'i> Namespaced<'i> {
    fn new(xml: &'i [u8]) -> Self {
        Self {
            reader: NsReader::from_reader(xml),
        }
    }
}

impl<'i> EventSource<'i> for Namespaced<'i> {
    fn next(&mut self) -> Result<(Ns, Event<'i>)> {
        let (resolved, event) = self.reader.read_resolved_event()?;
        let ns = match resolved {
            ResolveResult::Bound(ns) => Ns::from_uri(ns.as_ref()),
            _ => Ns::Other,
        };
        Ok((ns, event))
    }

    #[inline]
    fn position(&self) -> usize {
        self.reader.buffer_position() as usize
    }
}

struct Tolerant<'i> {
    reader: Reader<&'i [u8]>,
    default_ns: Ns,
}

impl<'i> Tolerant<'i> {
    fn new(xml: &'i [u8], default_ns: Ns) -> Self {
        let mut reader = Reader::from_reader(xml);
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.allow_dangling_amp = true;
        Self { reader, default_ns }
    }
}

impl<'i> EventSource<'i> for Tolerant<'i> {
    fn next(&mut self) -> Result<(Ns, Event<'i>)> {
        let event = self.reader.read_event()?;
        let ns = match &event {
            Event::Start(e) | Event::Empty(e) => {
                Ns::from_prefix(e.name().prefix().map(|p| p.into_inner()), self.default_ns)
            },
            _ => Ns::Other,
        };
        Ok((ns, event))
    }

    #[inline]
    fn position(&self) -> usize {
        self.reader.buffer_position() as usize
    }
}

struct Capture<K> {
    kind: K,
    depth: usize,
    locator: Locator,
    start_tag: Range<usize>,
    content_start: usize,
    text: String,
    preserve: bool,
    plain: bool,
}

fn drive<'i, S, K, F>(source: &mut S, mut select: F) -> Result<Vec<TextNode<K>>>
where
    S: EventSource<'i>,
    F: FnMut(&[Elem], &Elem, &[u32]) -> Option<K>,
{
    let mut path: SmallVec<[u32; 16]> = SmallVec::new();
    // Child counter per open level; index 0 counts root-level elements.
    let mut next_child: SmallVec<[u32; 16]> = smallvec![0];
    let mut open: SmallVec<[Elem; 16]> = SmallVec::new();
    let mut capture: Option<Capture<K>> = None;
    let mut nodes = Vec::new();

    loop {
        let before = source.position();
        let (ns, event) = source.next()?;
        let after = source.position();

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let ordinal = match next_child.last_mut() {
                    Some(counter) => {
                        let ordinal = *counter;
                        *counter += 1;
                        ordinal
                    },
                    None => 0,
                };
                path.push(ordinal);
                let elem = classify(ns, e)?;

                match capture.as_mut() {
                    Some(cap) => cap.plain = false,
                    None if !is_empty => {
                        if let Some(kind) = select(&open, &elem, &path) {
                            capture = Some(Capture {
                                kind,
                                depth: path.len(),
                                locator: Locator::new(&path),
                                start_tag: before..after,
                                content_start: after,
                                text: String::new(),
                                preserve: has_preserve(e)?,
                                plain: true,
                            });
                        }
                    },
                    None => {},
                }

                if is_empty {
                    path.pop();
                } else {
                    open.push(elem);
                    next_child.push(0);
                }
            },
            Event::End(_) => {
                if path.is_empty() {
                    continue;
                }
                if let Some(cap) = capture.take_if(|cap| cap.depth == path.len()) {
                    nodes.push(TextNode {
                        kind: cap.kind,
                        locator: cap.locator,
                        text: cap.text,
                        preserve: cap.preserve,
                        start_tag: cap.start_tag,
                        content: cap.content_start..before,
                        plain: cap.plain,
                    });
                }
                path.pop();
                open.pop();
                next_child.pop();
            },
            Event::Text(ref t) => {
                if let Some(cap) = direct_capture(&mut capture, path.len()) {
                    cap.text.push_str(std::str::from_utf8(t)?);
                }
            },
            Event::CData(ref c) => {
                if let Some(cap) = direct_capture(&mut capture, path.len()) {
                    cap.text.push_str(std::str::from_utf8(c)?);
                }
            },
            Event::GeneralRef(ref r) => {
                if let Some(cap) = direct_capture(&mut capture, path.len()) {
                    match resolve_entity(std::str::from_utf8(r)?) {
                        Some(ch) => cap.text.push(ch),
                        None => cap.plain = false,
                    }
                }
            },
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(nodes)
}

#[inline]
fn direct_capture<K>(capture: &mut Option<Capture<K>>, depth: usize) -> Option<&mut Capture<K>> {
    capture.as_mut().filter(|cap| cap.depth == depth)
}

fn classify(ns: Ns, e: &BytesStart<'_>) -> Result<Elem> {
    let tag = match e.local_name().as_ref() {
        b"t" => Tag::T,
        b"v" => Tag::V,
        b"text" => Tag::Text,
        b"si" => Tag::Si,
        b"rPh" => Tag::RPh,
        b"is" => Tag::Is,
        b"c" if ns == Ns::Spreadsheet => Tag::Cell(cell_type(e)?),
        _ => Tag::Other,
    };
    Ok(Elem { ns, tag })
}

fn cell_type(e: &BytesStart<'_>) -> Result<CellType> {
    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        if attr.key.as_ref() == b"t" {
            return Ok(match attr.value.as_ref() {
                b"inlineStr" => CellType::InlineStr,
                b"str" => CellType::Str,
                _ => CellType::Other,
            });
        }
    }
    Ok(CellType::Other)
}

fn has_preserve(e: &BytesStart<'_>) -> Result<bool> {
    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        if attr.key.as_ref() == b"xml:space" {
            return Ok(attr.value.as_ref() == b"preserve");
        }
    }
    Ok(false)
}
