//! ooxml-translate - format-preserving translation of Office Open XML documents
//!
//! This library pulls translatable text out of Word (.docx), Excel (.xlsx)
//! and PowerPoint (.pptx) packages and writes translations back without
//! disturbing anything else in the document.
//!
//! # Features
//!
//! - **Container Guard**: ZIP validation with entry-count and size ceilings
//!   checked before any decompression
//! - **Format Detection**: docx/xlsx/pptx families, transitional and strict
//! - **Segment Extraction**: document-ordered text segments with structural
//!   locators and exact whitespace envelopes
//! - **Chunk Formatting**: tagged `<segment id="NNN">` wire format, single
//!   block or size-bounded chunks
//! - **Translation Merging**: tolerant parsing of translator output
//! - **Rebuild**: byte splices into the original parts; untouched entries
//!   are copied raw
//! - **Sessions**: per-`file_id` persistence over any key-value store
//!
//! # Example - One document through the pipeline
//!
//! ```no_run
//! use ooxml_translate::{Engine, MemoryStore};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::with_store(MemoryStore::new());
//! let bytes = std::fs::read("contract.docx")?;
//!
//! let extracted = engine.extract(&bytes, "contract-1", "contract.docx")?;
//! println!("{} segments", extracted.extracted_text_count);
//!
//! let texts = engine.get_texts("contract-1")?;
//! // Hand texts.original_texts to a translator, then:
//! let translated = String::from(r#"<segment id="001">Agreement</segment>"#);
//! let update = engine.update("contract-1", translated.into())?;
//! if update.mismatch_warning {
//!     println!("{} segments keep their original text", update.skipped_count);
//! }
//!
//! let rebuilt = engine.rebuild("contract-1")?;
//! println!("{} ({} bytes base64)", rebuilt.output_filename, rebuilt.download_payload.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Lower-level access
//!
//! ```no_run
//! use ooxml_translate::config::{ArchiveLimits, ChunkOptions, ExtractOptions};
//! use ooxml_translate::ooxml::{extract, Package};
//! use ooxml_translate::translate::format_segments;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("book.xlsx")?;
//! let pkg = Package::open(&bytes, &ArchiveLimits::default())?;
//! let extraction = extract(&pkg, &ExtractOptions::default().with_formula_strings(true))?;
//! let texts = format_segments(&extraction.segments, &ChunkOptions::default());
//! println!("{}", texts.preview());
//! # Ok(())
//! # }
//! ```

/// Shared error taxonomy and XML text helpers
pub mod common;

/// Engine configuration
pub mod config;

/// OOXML container, format detection, extraction and rebuild
///
/// This module works directly on package bytes and never builds a DOM; all
/// XML access goes through one streaming walker.
pub mod ooxml;

/// The external calls over persisted sessions
pub mod pipeline;

/// Text segments and their locators
pub mod segment;

/// Session persistence
pub mod session;

/// Translator-facing formatting and merging
pub mod translate;

// Re-export commonly used types for convenience
pub use common::{Error, Result};
pub use config::EngineConfig;
pub use ooxml::FileType;
pub use pipeline::{respond, Engine, Failure};
pub use segment::{Locator, SpaceInfo, TextSegment};
pub use session::{MemoryStore, SessionStore};
pub use translate::TranslationInput;
