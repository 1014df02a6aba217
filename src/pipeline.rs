//! The four external calls: extraction, get-texts, update and rebuild.
//!
//! Each call is addressed by a caller-chosen `file_id` and runs against the
//! session persisted by the previous stage, so an [`Engine`] holds no
//! per-document state of its own. Responses serialize to JSON with
//! `success: true`; a failed call is rendered with [`Failure`].
//!
//! # Example
//!
//! ```rust,no_run
//! use ooxml_translate::pipeline::Engine;
//! use ooxml_translate::session::MemoryStore;
//!
//! let engine = Engine::with_store(MemoryStore::new());
//! let bytes = std::fs::read("report.docx")?;
//!
//! engine.extract(&bytes, "job-1", "report.docx")?;
//! let texts = engine.get_texts("job-1")?;
//! // ... send texts.original_texts to a translator ...
//! let translated = String::from(r#"<segment id="001">Hello</segment>"#);
//! engine.update("job-1", translated.into())?;
//! let rebuilt = engine.rebuild("job-1")?;
//! println!("{}", rebuilt.output_filename);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::common::{Error, Result};
use crate::config::{ChunkOptions, EngineConfig};
use crate::ooxml::{self, FileType, Package};
use crate::session::{SessionStore, Sessions, Stage};
use crate::translate::{format_segments, merge, FormattedTexts, TranslationInput};
use serde::Serialize;

/// Response of the extraction call.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractResponse {
    pub success: bool,
    pub file_id: String,
    pub file_type: FileType,
    pub extracted_text_count: usize,
    /// Element kinds the scan map covers for this format
    pub supported_elements: Vec<&'static str>,
    /// Parts that were only readable by the tolerant parser
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tolerant_parts: Vec<String>,
}

/// Response of the get-texts call.
#[derive(Debug, Clone, Serialize)]
pub struct TextsResponse {
    pub success: bool,
    pub file_id: String,
    pub file_type: FileType,
    pub original_texts: FormattedTexts,
    pub text_count: usize,
    pub chunk_count: usize,
    pub preview: String,
}

/// Response of the update call.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateResponse {
    pub success: bool,
    pub file_id: String,
    pub updated_count: usize,
    pub total: usize,
    pub mismatch_warning: bool,
    /// Segments that still have no translation
    pub skipped_count: usize,
    pub unknown_ids: Vec<String>,
    pub duplicate_ids: Vec<String>,
}

/// Response of the rebuild call.
#[derive(Debug, Clone, Serialize)]
pub struct RebuildResponse {
    pub success: bool,
    pub file_id: String,
    pub output_filename: String,
    /// Rebuilt archive, standard base64
    pub download_payload: String,
    pub mime_type: &'static str,
    pub replaced_count: usize,
    pub fallback_count: usize,
    pub locator_misses: Vec<String>,
    pub warnings: Vec<String>,
}

/// Failure response shared by all calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub success: bool,
    pub file_id: String,
    pub error_code: &'static str,
    pub error: String,
}

impl Failure {
    pub fn new(file_id: &str, err: &Error) -> Self {
        Self {
            success: false,
            file_id: file_id.to_string(),
            error_code: err.code(),
            error: err.to_string(),
        }
    }
}

/// Render a call result as its JSON response.
pub fn respond<T: Serialize>(file_id: &str, result: &Result<T>) -> serde_json::Value {
    let rendered = match result {
        Ok(response) => serde_json::to_value(response),
        Err(err) => serde_json::to_value(Failure::new(file_id, err)),
    };
    rendered.unwrap_or_else(|e| {
        serde_json::json!({
            "success": false,
            "file_id": file_id,
            "error_code": "SerializationError",
            "error": e.to_string(),
        })
    })
}

/// Translation engine over a session store.
#[derive(Debug)]
pub struct Engine<S> {
    sessions: Sessions<S>,
    config: EngineConfig,
}

impl<S: SessionStore> Engine<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            sessions: Sessions::new(store, config.storage),
            config,
        }
    }

    /// Engine with the default configuration.
    pub fn with_store(store: S) -> Self {
        Self::new(store, EngineConfig::default())
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn sessions(&self) -> &Sessions<S> {
        &self.sessions
    }

    /// Validate `archive`, extract its segments and open a session.
    ///
    /// An existing session under the same `file_id` is replaced.
    pub fn extract(&self, archive: &[u8], file_id: &str, original_filename: &str) -> Result<ExtractResponse> {
        let pkg = Package::open(archive, &self.config.limits)?;
        let extraction = ooxml::extract(&pkg, &self.config.extract)?;
        let count = extraction.segments.len();

        self.sessions.create(
            file_id,
            extraction.file_type,
            original_filename,
            extraction.segments,
            archive.to_vec(),
        )?;

        log::info!(
            "extracted {} segments from {} ({}) as {}",
            count,
            original_filename,
            extraction.file_type,
            file_id
        );

        Ok(ExtractResponse {
            success: true,
            file_id: file_id.to_string(),
            file_type: extraction.file_type,
            extracted_text_count: count,
            supported_elements: extraction.supported_elements,
            tolerant_parts: extraction.tolerant_parts,
        })
    }

    /// Formatted segments using the configured chunk options.
    pub fn get_texts(&self, file_id: &str) -> Result<TextsResponse> {
        self.get_texts_with(file_id, &self.config.chunk)
    }

    /// Formatted segments for the translator.
    pub fn get_texts_with(&self, file_id: &str, options: &ChunkOptions) -> Result<TextsResponse> {
        let header = self.sessions.load_header(file_id)?;
        let segments = self.sessions.load_segments(&header)?;
        let texts = format_segments(&segments, options);

        log::debug!(
            "{}: {} segments in {} chunk(s)",
            file_id,
            segments.len(),
            texts.chunk_count()
        );

        Ok(TextsResponse {
            success: true,
            file_id: file_id.to_string(),
            file_type: header.file_type,
            chunk_count: texts.chunk_count(),
            preview: texts.preview(),
            original_texts: texts,
            text_count: segments.len(),
        })
    }

    /// Merge translator output into the session.
    pub fn update(&self, file_id: &str, translated: TranslationInput) -> Result<UpdateResponse> {
        let mut header = self.sessions.load_header(file_id)?;
        let mut segments = self.sessions.load_segments(&header)?;
        let outcome = merge(&mut segments, translated)?;

        header.stage = Stage::Translated;
        self.sessions.save_segments(&mut header, &segments)?;

        log::info!(
            "{}: merged {}/{} translations",
            file_id,
            outcome.updated_count,
            outcome.total
        );

        Ok(UpdateResponse {
            success: true,
            file_id: file_id.to_string(),
            updated_count: outcome.updated_count,
            total: outcome.total,
            mismatch_warning: outcome.mismatch_warning,
            skipped_count: outcome.skipped_count,
            unknown_ids: outcome.unknown_ids,
            duplicate_ids: outcome.duplicate_ids,
        })
    }

    /// Rebuild the translated document and retire the session.
    pub fn rebuild(&self, file_id: &str) -> Result<RebuildResponse> {
        let mut session = self.sessions.load(file_id)?;
        let pkg = Package::open(&session.original_archive, &self.config.limits)?;
        let rebuilt = ooxml::rebuild(
            &pkg,
            session.file_type(),
            &session.segments,
            &session.header.original_filename,
            &self.config.rebuild,
        )?;

        session.header.stage = Stage::Rebuilt;
        self.sessions.save_header(&session.header)?;

        let report = rebuilt.report.clone();
        log::info!(
            "{}: rebuilt {} ({} translated, {} original, {} misses)",
            file_id,
            rebuilt.output_filename,
            report.replaced_count,
            report.fallback_count,
            report.locator_misses.len()
        );

        Ok(RebuildResponse {
            success: true,
            file_id: file_id.to_string(),
            download_payload: rebuilt.payload_base64(),
            mime_type: rebuilt.file_type.mime_type(),
            output_filename: rebuilt.output_filename,
            replaced_count: report.replaced_count,
            fallback_count: report.fallback_count,
            locator_misses: report.locator_misses,
            warnings: report.warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArchiveLimits, ExtractOptions, OutputFormat, RebuildOptions, StorageOptions};
    use crate::ooxml::fixtures;
    use crate::session::{MemoryStore, StorageLayout};
    use base64::Engine as _;

    fn engine() -> Engine<MemoryStore> {
        Engine::with_store(MemoryStore::new())
    }

    fn decode_payload(response: &RebuildResponse) -> Vec<u8> {
        base64::engine::general_purpose::STANDARD
            .decode(&response.download_payload)
            .unwrap()
    }

    #[test]
    fn test_three_segment_document_end_to_end() {
        let engine = engine();
        let original = fixtures::docx(&["Hello", "World", "Bye"]);

        let extracted = engine.extract(&original, "f1", "greeting.docx").unwrap();
        assert_eq!(extracted.file_type, FileType::Docx);
        assert_eq!(extracted.extracted_text_count, 3);

        let texts = engine.get_texts("f1").unwrap();
        assert_eq!(texts.text_count, 3);
        assert_eq!(
            texts.original_texts,
            FormattedTexts::Single(
                "<segment id=\"001\">Hello</segment>\n\
                 <segment id=\"002\">World</segment>\n\
                 <segment id=\"003\">Bye</segment>"
                    .to_string()
            )
        );

        let update = engine
            .update(
                "f1",
                "<segment id=\"001\">Bonjour</segment>\n\
                 <segment id=\"002\">Monde</segment>\n\
                 <segment id=\"003\">Au revoir</segment>"
                    .into(),
            )
            .unwrap();
        assert_eq!(update.updated_count, 3);
        assert!(!update.mismatch_warning);

        let rebuilt = engine.rebuild("f1").unwrap();
        assert_eq!(rebuilt.output_filename, "greeting_translated.docx");
        assert_eq!(rebuilt.replaced_count, 3);
        assert_eq!(
            rebuilt.mime_type,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );

        let before = fixtures::entries(&original);
        let after = fixtures::entries(&decode_payload(&rebuilt));
        assert_eq!(before.len(), after.len());
        for ((name_a, data_a), (name_b, data_b)) in before.iter().zip(&after) {
            assert_eq!(name_a, name_b);
            if name_a == "word/document.xml" {
                let restored = String::from_utf8(data_b.clone())
                    .unwrap()
                    .replace("Bonjour", "Hello")
                    .replace("Monde", "World")
                    .replace("Au revoir", "Bye");
                assert_eq!(restored.as_bytes(), data_a.as_slice());
            } else {
                assert_eq!(data_a, data_b, "{name_a} changed");
            }
        }
    }

    #[test]
    fn test_partial_translation_falls_back() {
        let engine = engine();
        let original = fixtures::docx(&["one", "two", "three", "four", "five"]);
        engine.extract(&original, "f2", "five.docx").unwrap();

        let update = engine
            .update(
                "f2",
                TranslationInput::Chunks(vec![
                    "<segment id=\"001\">un</segment>\n<segment id=\"002\">deux</segment>".into(),
                    "<segment id=\"004\">quatre</segment>\n<segment id=\"005\">cinq</segment>".into(),
                ]),
            )
            .unwrap();
        assert_eq!(update.updated_count, 4);
        assert!(update.mismatch_warning);
        assert_eq!(update.skipped_count, 1);

        let rebuilt = engine.rebuild("f2").unwrap();
        assert_eq!(rebuilt.replaced_count, 4);
        assert_eq!(rebuilt.fallback_count, 1);
        let after = fixtures::entries(&decode_payload(&rebuilt));
        let document = after
            .iter()
            .find(|(name, _)| name == "word/document.xml")
            .map(|(_, data)| String::from_utf8_lossy(data).into_owned())
            .unwrap();
        assert!(document.contains("<w:t>three</w:t>"));
        assert!(document.contains("<w:t>quatre</w:t>"));
    }

    #[test]
    fn test_identity_round_trip() {
        let engine = engine();
        let original = fixtures::xlsx(&["Alpha", "Beta"], &["Gamma"]);
        engine.extract(&original, "f3", "book.xlsx").unwrap();
        let rebuilt = engine.rebuild("f3").unwrap();
        assert_eq!(rebuilt.replaced_count, 0);
        assert_eq!(rebuilt.fallback_count, 3);
        assert_eq!(decode_payload(&rebuilt), original);
    }

    #[test]
    fn test_unknown_session_for_every_stage() {
        let engine = engine();
        assert_eq!(engine.get_texts("missing").unwrap_err().code(), "SessionNotFound");
        assert_eq!(
            engine.update("missing", "<segment id=\"001\">x</segment>".into()).unwrap_err().code(),
            "SessionNotFound"
        );
        assert_eq!(engine.rebuild("missing").unwrap_err().code(), "SessionNotFound");
    }

    #[test]
    fn test_failure_response_shape() {
        let engine = engine();
        let result = engine.extract(b"not a zip", "bad", "bad.docx");
        let value = respond("bad", &result);
        assert_eq!(value["success"], false);
        assert_eq!(value["file_id"], "bad");
        assert_eq!(value["error_code"], "InvalidArchive");
        assert!(value["error"].as_str().unwrap().contains("Invalid archive"));

        let archive = fixtures::zip(&[("readme.txt", b"plain".as_slice())]);
        let result = engine.extract(&archive, "bad", "readme.zip");
        assert_eq!(respond("bad", &result)["error_code"], "UnsupportedFormat");
    }

    #[test]
    fn test_success_response_json() {
        let engine = engine();
        let original = fixtures::pptx(&[&["Title", "Body"]], &["Notes"]);
        let result = engine.extract(&original, "deck", "deck.pptx");
        let value = respond("deck", &result);
        assert_eq!(value["success"], true);
        assert_eq!(value["file_type"], "pptx");
        assert_eq!(value["extracted_text_count"], 3);
        assert!(value.get("tolerant_parts").is_none());

        let options = ChunkOptions::new()
            .with_output_format(OutputFormat::Array)
            .with_max_segments(2);
        let value = respond("deck", &engine.get_texts_with("deck", &options));
        assert_eq!(value["chunk_count"], 2);
        assert_eq!(value["original_texts"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_serialized_array_input() {
        let engine = engine();
        engine
            .extract(&fixtures::docx(&["a", "b"]), "f4", "ab.docx")
            .unwrap();
        let chunks = serde_json::to_string(&[
            "<segment id=\"001\">A</segment>",
            "<segment id=\"002\">B</segment>",
        ])
        .unwrap();
        let update = engine.update("f4", TranslationInput::Text(chunks)).unwrap();
        assert_eq!(update.updated_count, 2);
        assert_eq!(update.skipped_count, 0);
    }

    #[test]
    fn test_malformed_update_keeps_session() {
        let engine = engine();
        engine.extract(&fixtures::docx(&["a"]), "f5", "a.docx").unwrap();
        assert_eq!(
            engine.update("f5", "no tags here".into()).unwrap_err().code(),
            "MalformedTranslationInput"
        );
        let header = engine.sessions().load_header("f5").unwrap();
        assert_eq!(header.stage, Stage::Extracted);
    }

    #[test]
    fn test_stage_progression_and_retired_session_stays_readable() {
        let engine = engine();
        engine.extract(&fixtures::docx(&["a"]), "f6", "a.docx").unwrap();
        engine.update("f6", "<segment id=\"001\">b</segment>".into()).unwrap();
        assert_eq!(engine.sessions().load_header("f6").unwrap().stage, Stage::Translated);

        engine.rebuild("f6").unwrap();
        assert_eq!(engine.sessions().load_header("f6").unwrap().stage, Stage::Rebuilt);
        assert_eq!(engine.get_texts("f6").unwrap().text_count, 1);
    }

    #[test]
    fn test_layout_survives_updates() {
        let storage = StorageOptions::new()
            .with_simple_max_bytes(64)
            .with_compressed_max_bytes(256)
            .with_batch_size(2);
        let engine = Engine::new(MemoryStore::new(), EngineConfig::new().with_storage(storage));
        let paragraphs = ["one", "two", "three", "four", "five"];
        engine.extract(&fixtures::docx(&paragraphs), "f7", "five.docx").unwrap();

        let header = engine.sessions().load_header("f7").unwrap();
        assert_eq!(header.layout, StorageLayout::Batched);
        assert_eq!(header.batch_count, 3);

        engine
            .update("f7", "<segment id=\"005\">cinq</segment>".into())
            .unwrap();
        let header = engine.sessions().load_header("f7").unwrap();
        assert_eq!(header.layout, StorageLayout::Batched);
        let segments = engine.sessions().load_segments(&header).unwrap();
        assert_eq!(segments[4].translated_text.as_deref(), Some("cinq"));
    }

    #[test]
    fn test_rebuild_options_come_from_config() {
        let config = EngineConfig::new()
            .with_extract(ExtractOptions::new().with_formula_strings(true))
            .with_rebuild(RebuildOptions::new().with_filename_marker("_fr"));
        let engine = Engine::new(MemoryStore::new(), config);
        let extracted = engine
            .extract(&fixtures::xlsx(&["Alpha"], &["Beta"]), "f9", "dir/book.xlsx")
            .unwrap();
        assert_eq!(extracted.extracted_text_count, 2);
        assert_eq!(extracted.supported_elements, ["si/t", "c[@t=inlineStr]/is/t"]);
        assert_eq!(engine.rebuild("f9").unwrap().output_filename, "book_fr.xlsx");
    }

    #[test]
    fn test_limits_come_from_config() {
        let config = EngineConfig::new().with_limits(ArchiveLimits::new().with_max_entries(3));
        let engine = Engine::new(MemoryStore::new(), config);
        let err = engine
            .extract(&fixtures::docx(&["a"]), "f8", "a.docx")
            .unwrap_err();
        assert_eq!(err.code(), "ResourceLimitExceeded");
        assert!(engine.sessions().store().is_empty());
    }
}
