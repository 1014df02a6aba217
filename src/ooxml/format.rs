//! Format detection and per-format scan maps.
//!
//! Detection looks for the main part of each document family. The result
//! selects a [`ScanMap`], which lists the XML parts to scan (in the order
//! segment ids are assigned) and the rule that picks translatable elements
//! in each of them.

use super::container::Package;
use super::walk::{CellType, Elem, Ns, Tag};
use crate::common::{Error, Result};
use crate::config::ExtractOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported document families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Docx,
    Xlsx,
    Pptx,
}

impl FileType {
    /// The part whose presence identifies the family.
    pub fn marker_part(self) -> &'static str {
        match self {
            FileType::Docx => "word/document.xml",
            FileType::Xlsx => "xl/workbook.xml",
            FileType::Pptx => "ppt/presentation.xml",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            FileType::Docx => "docx",
            FileType::Xlsx => "xlsx",
            FileType::Pptx => "pptx",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            FileType::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            },
            FileType::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            FileType::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            },
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Classify a package by its marker parts.
pub fn detect(pkg: &Package<'_>) -> Result<FileType> {
    [FileType::Docx, FileType::Xlsx, FileType::Pptx]
        .into_iter()
        .find(|ft| pkg.contains(ft.marker_part()))
        .ok_or_else(|| {
            Error::UnsupportedFormat(
                "no word/document.xml, xl/workbook.xml or ppt/presentation.xml part".to_string(),
            )
        })
}

/// Kinds of translatable elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextElement {
    /// `w:t`
    WordText,
    /// `t` inside a shared string item
    SharedString,
    /// `t` inside a cell's inline string
    InlineString,
    /// Cached `v` of a cell whose formula yields a string
    FormulaString,
    /// `a:t`
    DrawingText,
    /// `p:text` in presentation comments
    CommentText,
}

impl TextElement {
    pub fn label(self) -> &'static str {
        match self {
            TextElement::WordText => "w:t",
            TextElement::SharedString => "si/t",
            TextElement::InlineString => "c[@t=inlineStr]/is/t",
            TextElement::FormulaString => "c[@t=str]/v",
            TextElement::DrawingText => "a:t",
            TextElement::CommentText => "p:text",
        }
    }
}

/// Element selection rule for one part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRule {
    Word,
    SharedStrings,
    Worksheet { formula_strings: bool },
    Slide,
    SlideComments,
}

impl TextRule {
    /// Namespace assumed for unprefixed names by the tolerant reader.
    pub fn default_ns(self) -> Ns {
        match self {
            TextRule::Word => Ns::Word,
            TextRule::SharedStrings | TextRule::Worksheet { .. } => Ns::Spreadsheet,
            TextRule::Slide | TextRule::SlideComments => Ns::Other,
        }
    }

    /// Decide whether `elem`, under `ancestors`, carries translatable text.
    pub fn select(self, ancestors: &[Elem], elem: &Elem) -> Option<TextElement> {
        match self {
            TextRule::Word => elem.is(Ns::Word, Tag::T).then_some(TextElement::WordText),
            TextRule::SharedStrings => {
                let inside = ancestors.iter().any(|a| a.is(Ns::Spreadsheet, Tag::Si));
                (elem.is(Ns::Spreadsheet, Tag::T) && inside && !in_phonetic(ancestors))
                    .then_some(TextElement::SharedString)
            },
            TextRule::Worksheet { formula_strings } => {
                if elem.is(Ns::Spreadsheet, Tag::T) {
                    let inline = ancestors.windows(2).any(|pair| {
                        pair[0].is(Ns::Spreadsheet, Tag::Cell(CellType::InlineStr))
                            && pair[1].is(Ns::Spreadsheet, Tag::Is)
                    });
                    (inline && !in_phonetic(ancestors)).then_some(TextElement::InlineString)
                } else if formula_strings && elem.is(Ns::Spreadsheet, Tag::V) {
                    ancestors
                        .last()
                        .filter(|parent| parent.is(Ns::Spreadsheet, Tag::Cell(CellType::Str)))
                        .map(|_| TextElement::FormulaString)
                } else {
                    None
                }
            },
            TextRule::Slide => elem.is(Ns::Drawing, Tag::T).then_some(TextElement::DrawingText),
            TextRule::SlideComments => {
                elem.is(Ns::Presentation, Tag::Text).then_some(TextElement::CommentText)
            },
        }
    }
}

#[inline]
fn in_phonetic(ancestors: &[Elem]) -> bool {
    ancestors.iter().any(|a| a.is(Ns::Spreadsheet, Tag::RPh))
}

/// One part to scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    pub part: String,
    pub rule: TextRule,
}

/// Per-format scan map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMap {
    Word,
    Spreadsheet { formula_strings: bool },
    Presentation,
}

impl ScanMap {
    pub fn new(file_type: FileType, options: &ExtractOptions) -> Self {
        match file_type {
            FileType::Docx => ScanMap::Word,
            FileType::Xlsx => ScanMap::Spreadsheet {
                formula_strings: options.include_formula_strings,
            },
            FileType::Pptx => ScanMap::Presentation,
        }
    }

    /// Whether the text element accepts `xml:space="preserve"`.
    ///
    /// DrawingML text keeps its whitespace without it and the schema does
    /// not allow the attribute on `a:t`.
    pub fn supports_preserve(self) -> bool {
        !matches!(self, ScanMap::Presentation)
    }

    /// Parts present in `pkg`, in id assignment order.
    pub fn targets(self, pkg: &Package<'_>) -> Vec<ScanTarget> {
        let names: Vec<&str> = pkg.names().collect();
        let mut targets = Vec::new();
        let mut push = |part: &str, rule: TextRule| {
            targets.push(ScanTarget {
                part: part.to_string(),
                rule,
            })
        };

        match self {
            ScanMap::Word => {
                push("word/document.xml", TextRule::Word);
                for part in numbered(&names, "word/header") {
                    push(part, TextRule::Word);
                }
                for part in numbered(&names, "word/footer") {
                    push(part, TextRule::Word);
                }
                for part in ["word/comments.xml", "word/footnotes.xml", "word/endnotes.xml"] {
                    if pkg.contains(part) {
                        push(part, TextRule::Word);
                    }
                }
            },
            ScanMap::Spreadsheet { formula_strings } => {
                if pkg.contains("xl/sharedStrings.xml") {
                    push("xl/sharedStrings.xml", TextRule::SharedStrings);
                }
                for part in numbered(&names, "xl/worksheets/sheet") {
                    push(part, TextRule::Worksheet { formula_strings });
                }
            },
            ScanMap::Presentation => {
                for part in numbered(&names, "ppt/slides/slide") {
                    push(part, TextRule::Slide);
                }
                for part in numbered(&names, "ppt/notesSlides/notesSlide") {
                    push(part, TextRule::Slide);
                }
                for part in numbered(&names, "ppt/comments/comment") {
                    push(part, TextRule::SlideComments);
                }
            },
        }

        targets
    }
}

/// Names of the form `{prefix}{digits}.xml`, sorted by number.
fn numbered<'a>(names: &[&'a str], prefix: &str) -> Vec<&'a str> {
    let mut found: Vec<(u64, &'a str)> = names
        .iter()
        .filter_map(|&name| {
            let digits = name.strip_prefix(prefix)?.strip_suffix(".xml")?;
            if !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            Some((digits.parse().unwrap_or(0), name))
        })
        .collect();
    found.sort();
    found.into_iter().map(|(_, name)| name).collect()
}
