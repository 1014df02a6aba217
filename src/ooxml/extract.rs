//! Segment extraction.
//!
//! Walks every part of the scan map in order and turns each translatable,
//! non-blank text element into a [`TextSegment`]. Ids are global across
//! parts and follow document encounter order.
//!
//! Runs are never merged: a sentence split across sibling runs yields one
//! segment per run. Whitespace-only nodes produce no segment and are left
//! untouched at rebuild.

use super::container::Package;
use super::format::{detect, FileType, ScanMap, TextElement};
use super::walk::{self, ParseMode};
use crate::common::Result;
use crate::config::ExtractOptions;
use crate::segment::{format_id, SpaceInfo, TextSegment};

/// Result of extracting a package.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub file_type: FileType,
    pub segments: Vec<TextSegment>,
    /// Element kinds that produced at least one segment, first-seen order
    pub supported_elements: Vec<&'static str>,
    /// Parts that needed the tolerant reader
    pub tolerant_parts: Vec<String>,
}

/// Extract all segments from an opened package.
pub fn extract(pkg: &Package<'_>, options: &ExtractOptions) -> Result<Extraction> {
    let file_type = detect(pkg)?;
    let map = ScanMap::new(file_type, options);

    let mut segments = Vec::new();
    let mut supported_elements = Vec::new();
    let mut tolerant_parts = Vec::new();

    for target in map.targets(pkg) {
        let Some(xml) = pkg.xml_part(&target.part)? else {
            continue;
        };

        let rule = target.rule;
        let (nodes, mode) = walk::scan(xml, rule.default_ns(), |ancestors, elem, _| {
            rule.select(ancestors, elem)
        })?;
        if mode == ParseMode::Tolerant {
            tolerant_parts.push(target.part.clone());
        }

        let before = segments.len();
        for node in nodes {
            if !node.plain || node.text.trim().is_empty() {
                continue;
            }
            if node.kind == TextElement::FormulaString && is_numeric(&node.text) {
                continue;
            }

            let (space_info, core) = SpaceInfo::analyze(&node.text, node.preserve);
            segments.push(TextSegment {
                id: format_id(segments.len() + 1),
                source_part: target.part.clone(),
                locator: node.locator,
                original_text: core.to_string(),
                space_info,
                translated_text: None,
            });

            let label = node.kind.label();
            if !supported_elements.contains(&label) {
                supported_elements.push(label);
            }
        }

        log::debug!(
            "{}: {} segments ({:?} reader)",
            target.part,
            segments.len() - before,
            mode
        );
    }

    Ok(Extraction {
        file_type,
        segments,
        supported_elements,
        tolerant_parts,
    })
}

#[inline]
fn is_numeric(text: &str) -> bool {
    text.trim().parse::<f64>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArchiveLimits;
    use crate::ooxml::fixtures::{self, W_NS};

    fn run(bytes: &[u8], options: &ExtractOptions) -> Extraction {
        let pkg = Package::open(bytes, &ArchiveLimits::default()).unwrap();
        extract(&pkg, options).unwrap()
    }

    fn texts(extraction: &Extraction) -> Vec<&str> {
        extraction.segments.iter().map(|s| s.original_text.as_str()).collect()
    }

    #[test]
    fn test_docx_runs_in_order() {
        let bytes = fixtures::docx(&["First", "Second", "Third"]);
        let result = run(&bytes, &ExtractOptions::default());
        assert_eq!(result.file_type, FileType::Docx);
        assert_eq!(texts(&result), ["First", "Second", "Third"]);
        let ids: Vec<_> = result.segments.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["001", "002", "003"]);
        assert_eq!(result.supported_elements, ["w:t"]);
        assert!(result.tolerant_parts.is_empty());
    }

    #[test]
    fn test_skips_blank_nodes_and_captures_whitespace() {
        let doc = format!(
            r#"<w:document xmlns:w="{W_NS}"><w:body><w:p><w:r><w:t xml:space="preserve">   </w:t></w:r><w:r><w:t xml:space="preserve">  Hello </w:t></w:r><w:r><w:t></w:t></w:r></w:p></w:body></w:document>"#
        );
        let result = run(&fixtures::docx_with(&doc), &ExtractOptions::default());
        assert_eq!(result.segments.len(), 1);
        let seg = &result.segments[0];
        assert_eq!(seg.original_text, "Hello");
        assert_eq!(seg.space_info.leading, "  ");
        assert_eq!(seg.space_info.trailing, " ");
        assert!(seg.space_info.preserve_attr);
        assert_eq!(seg.locator.to_string(), "/0/0/0/1/0");
    }

    #[test]
    fn test_split_sentence_stays_split() {
        let doc = format!(
            r#"<w:document xmlns:w="{W_NS}"><w:body><w:p><w:r><w:t>Hel</w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>lo</w:t></w:r></w:p></w:body></w:document>"#
        );
        let result = run(&fixtures::docx_with(&doc), &ExtractOptions::default());
        assert_eq!(texts(&result), ["Hel", "lo"]);
    }

    #[test]
    fn test_duplicate_text_gets_distinct_locators() {
        let result = run(&fixtures::docx(&["Same", "Same"]), &ExtractOptions::default());
        assert_eq!(result.segments.len(), 2);
        assert_ne!(result.segments[0].locator, result.segments[1].locator);
    }

    #[test]
    fn test_xlsx_shared_then_inline() {
        let bytes = fixtures::xlsx(&["Name", "Price"], &["Inline note"]);
        let result = run(&bytes, &ExtractOptions::default());
        assert_eq!(result.file_type, FileType::Xlsx);
        assert_eq!(texts(&result), ["Name", "Price", "Inline note"]);
        assert_eq!(result.segments[0].source_part, "xl/sharedStrings.xml");
        assert_eq!(result.segments[2].source_part, "xl/worksheets/sheet1.xml");
        assert_eq!(result.supported_elements, ["si/t", "c[@t=inlineStr]/is/t"]);
    }

    #[test]
    fn test_xlsx_phonetic_runs_skipped() {
        let sst = format!(
            r#"<sst xmlns="{}"><si><r><t>東京</t></r><rPh sb="0" eb="2"><t>トウキョウ</t></rPh></si></sst>"#,
            fixtures::S_NS
        );
        let workbook = format!(r#"<workbook xmlns="{}"/>"#, fixtures::S_NS);
        let bytes = fixtures::zip(&[
            ("xl/workbook.xml", workbook.as_bytes()),
            ("xl/sharedStrings.xml", sst.as_bytes()),
        ]);
        let result = run(&bytes, &ExtractOptions::default());
        assert_eq!(texts(&result), ["東京"]);
    }

    #[test]
    fn test_xlsx_formula_strings_opt_in() {
        let sheet = format!(
            r#"<worksheet xmlns="{}"><sheetData><row><c r="A1" t="str"><f>A2&amp;"x"</f><v>Total</v></c><c r="B1" t="str"><f>1+1</f><v>2</v></c></row></sheetData></worksheet>"#,
            fixtures::S_NS
        );
        let workbook = format!(r#"<workbook xmlns="{}"/>"#, fixtures::S_NS);
        let bytes = fixtures::zip(&[
            ("xl/workbook.xml", workbook.as_bytes()),
            ("xl/worksheets/sheet1.xml", sheet.as_bytes()),
        ]);
        assert!(run(&bytes, &ExtractOptions::default()).segments.is_empty());

        let result = run(&bytes, &ExtractOptions::new().with_formula_strings(true));
        assert_eq!(texts(&result), ["Total"]);
    }

    #[test]
    fn test_pptx_slides_then_notes() {
        let bytes = fixtures::pptx(&[&["Title", "Subtitle"], &["Second slide"]], &["Speaker note"]);
        let result = run(&bytes, &ExtractOptions::default());
        assert_eq!(result.file_type, FileType::Pptx);
        assert_eq!(texts(&result), ["Title", "Subtitle", "Second slide", "Speaker note"]);
        assert_eq!(result.segments[3].source_part, "ppt/notesSlides/notesSlide1.xml");
    }

    #[test]
    fn test_docx_header_and_footnotes_follow_body() {
        let bytes = fixtures::docx_with_notes(&["Body"], &["Page header"], &["Note one", "Note two"]);
        let result = run(&bytes, &ExtractOptions::default());
        assert_eq!(texts(&result), ["Body", "Page header", "Note one", "Note two"]);
        let placed: Vec<(&str, &str)> = result
            .segments
            .iter()
            .map(|s| (s.id.as_str(), s.source_part.as_str()))
            .collect();
        assert_eq!(
            placed,
            [
                ("001", "word/document.xml"),
                ("002", "word/header1.xml"),
                ("003", "word/footnotes.xml"),
                ("004", "word/footnotes.xml"),
            ]
        );
        assert_eq!(result.segments[3].locator.to_string(), "/0/1/0/0/0");
    }

    #[test]
    fn test_pptx_comments_after_slides() {
        let bytes = fixtures::pptx_with_comments(&[&["Title"]], &["Note"], &["Check this"]);
        let result = run(&bytes, &ExtractOptions::default());
        assert_eq!(texts(&result), ["Title", "Note", "Check this"]);
        assert_eq!(result.segments[2].id, "003");
        assert_eq!(result.segments[2].source_part, "ppt/comments/comment1.xml");
        assert_eq!(result.supported_elements, ["a:t", "p:text"]);
    }

    #[test]
    fn test_strict_namespace_recognised() {
        let doc = r#"<w:document xmlns:w="http://purl.oclc.org/ooxml/wordprocessingml/main"><w:body><w:p><w:r><w:t>Strict</w:t></w:r></w:p></w:body></w:document>"#;
        let result = run(&fixtures::docx_with(doc), &ExtractOptions::default());
        assert_eq!(texts(&result), ["Strict"]);
    }

    #[test]
    fn test_malformed_part_uses_tolerant_reader() {
        let doc = format!(
            r#"<w:document xmlns:w="{W_NS}"><w:body><w:p><w:r><w:t>Kept</w:t></w:r></w:x></w:body></w:document>"#
        );
        let result = run(&fixtures::docx_with(&doc), &ExtractOptions::default());
        assert_eq!(texts(&result), ["Kept"]);
        assert_eq!(result.tolerant_parts, ["word/document.xml"]);
    }
}
