//! In-memory OOXML packages for tests.

use crate::common::xml::escape_text;
use std::io::{Cursor, Write};
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub const S_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
pub const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub const P_NS: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";

const CONTENT_TYPES: &[u8] = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#;
const ROOT_RELS: &[u8] = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"/>"#;
const IMAGE: &[u8] = b"\x89PNG\r\n\x1a\n fake image bytes";

/// Build a zip archive. `.png` entries are stored, everything else deflated.
pub fn zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        let method = if name.ends_with(".png") {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        };
        let options = SimpleFileOptions::default().compression_method(method);
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Word document body with one run per paragraph.
pub fn document_xml(paragraphs: &[&str]) -> String {
    let body: String = paragraphs
        .iter()
        .map(|text| {
            let space = if text.trim() != *text { r#" xml:space="preserve""# } else { "" };
            format!("<w:p><w:r><w:t{space}>{}</w:t></w:r></w:p>", escape_text(text))
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{W_NS}"><w:body>{body}<w:sectPr/></w:body></w:document>"#
    )
}

/// Word package around a raw `word/document.xml`.
pub fn docx_with(document: &str) -> Vec<u8> {
    zip(&[
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        ("word/document.xml", document.as_bytes()),
        ("word/styles.xml", br#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"/>"#),
        ("word/media/image1.png", IMAGE),
    ])
}

/// Word package with one run per paragraph.
pub fn docx(paragraphs: &[&str]) -> Vec<u8> {
    docx_with(&document_xml(paragraphs))
}

/// Workbook with a shared string table and one sheet of inline strings.
pub fn xlsx(shared: &[&str], inline: &[&str]) -> Vec<u8> {
    let items: String = shared
        .iter()
        .map(|text| format!("<si><t>{}</t></si>", escape_text(text)))
        .collect();
    let sst = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="{S_NS}" count="{n}" uniqueCount="{n}">{items}</sst>"#,
        n = shared.len()
    );

    let mut cells = String::new();
    for i in 0..shared.len() {
        cells.push_str(&format!(r#"<c r="A{}" t="s"><v>{}</v></c>"#, i + 1, i));
    }
    for (i, text) in inline.iter().enumerate() {
        cells.push_str(&format!(
            r#"<c r="B{}" t="inlineStr"><is><t>{}</t></is></c>"#,
            i + 1,
            escape_text(text)
        ));
    }
    let sheet = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="{S_NS}"><sheetData><row r="1">{cells}</row></sheetData></worksheet>"#
    );
    let workbook = format!(r#"<workbook xmlns="{S_NS}"><sheets/></workbook>"#);
    let styles = format!(r#"<styleSheet xmlns="{S_NS}"/>"#);

    zip(&[
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        ("xl/workbook.xml", workbook.as_bytes()),
        ("xl/sharedStrings.xml", sst.as_bytes()),
        ("xl/worksheets/sheet1.xml", sheet.as_bytes()),
        ("xl/styles.xml", styles.as_bytes()),
    ])
}

/// Presentation with one shape per run list and optional notes.
pub fn pptx(slides: &[&[&str]], notes: &[&str]) -> Vec<u8> {
    pptx_with_comments(slides, notes, &[])
}

/// Presentation with one comment list part per entry of `comments`.
pub fn pptx_with_comments(slides: &[&[&str]], notes: &[&str], comments: &[&str]) -> Vec<u8> {
    let sld = |runs: &[&str]| {
        let runs: String = runs
            .iter()
            .map(|text| format!("<a:r><a:rPr lang=\"en-US\"/><a:t>{}</a:t></a:r>", escape_text(text)))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="{A_NS}" xmlns:p="{P_NS}"><p:cSld><p:spTree><p:sp><p:txBody><a:bodyPr/><a:p>{runs}</a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#
        )
    };

    let slide_xml: Vec<String> = slides.iter().map(|runs| sld(runs)).collect();
    let notes_xml: Vec<String> = notes.iter().map(|text| sld(&[*text])).collect();
    let slide_names: Vec<String> = (1..=slides.len())
        .map(|i| format!("ppt/slides/slide{i}.xml"))
        .collect();
    let notes_names: Vec<String> = (1..=notes.len())
        .map(|i| format!("ppt/notesSlides/notesSlide{i}.xml"))
        .collect();
    let presentation = format!(r#"<p:presentation xmlns:p="{P_NS}"/>"#);

    let mut entries: Vec<(&str, &[u8])> = vec![
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        ("ppt/presentation.xml", presentation.as_bytes()),
    ];
    for (name, xml) in slide_names.iter().zip(&slide_xml) {
        entries.push((name.as_str(), xml.as_bytes()));
    }
    for (name, xml) in notes_names.iter().zip(&notes_xml) {
        entries.push((name.as_str(), xml.as_bytes()));
    }
    let comment_xml: Vec<String> = comments
        .iter()
        .map(|text| {
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:cmLst xmlns:p="{P_NS}"><p:cm authorId="0" dt="2024-01-01T00:00:00" idx="1"><p:pos x="10" y="10"/><p:text>{}</p:text></p:cm></p:cmLst>"#,
                escape_text(text)
            )
        })
        .collect();
    let comment_names: Vec<String> = (1..=comments.len())
        .map(|i| format!("ppt/comments/comment{i}.xml"))
        .collect();
    for (name, xml) in comment_names.iter().zip(&comment_xml) {
        entries.push((name.as_str(), xml.as_bytes()));
    }
    entries.push(("ppt/media/image1.png", IMAGE));
    zip(&entries)
}

/// Word package with header and footnote parts next to the body.
///
/// The footnotes part is written first so that scan order, not archive
/// order, decides segment ids.
pub fn docx_with_notes(body: &[&str], header: &[&str], footnotes: &[&str]) -> Vec<u8> {
    let runs = |texts: &[&str]| -> String {
        texts
            .iter()
            .map(|text| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", escape_text(text)))
            .collect()
    };
    let header_xml = format!(r#"<w:hdr xmlns:w="{W_NS}">{}</w:hdr>"#, runs(header));
    let notes: String = footnotes
        .iter()
        .enumerate()
        .map(|(i, text)| {
            format!(
                r#"<w:footnote w:id="{}"><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:footnote>"#,
                i + 1,
                escape_text(text)
            )
        })
        .collect();
    let footnotes_xml = format!(r#"<w:footnotes xmlns:w="{W_NS}">{notes}</w:footnotes>"#);
    let document = document_xml(body);

    zip(&[
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        ("word/footnotes.xml", footnotes_xml.as_bytes()),
        ("word/document.xml", document.as_bytes()),
        ("word/header1.xml", header_xml.as_bytes()),
    ])
}

/// Read every entry of an archive as `(name, bytes)`.
pub fn entries(archive: &[u8]) -> Vec<(String, Vec<u8>)> {
    use std::io::Read;
    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
    (0..zip.len())
        .map(|i| {
            let mut file = zip.by_index(i).unwrap();
            let mut data = Vec::new();
            file.read_to_end(&mut data).unwrap();
            (file.name().to_string(), data)
        })
        .collect()
}
