//! Office Open XML packages: the container guard, format detection,
//! extraction and rebuild.
//!
//! The module is organized in layers:
//!
//! 1. **Container** (`container`): limit-checked zip access and raw-copy repacking
//! 2. **Format** (`format`): family detection and per-format scan maps
//! 3. **Walker** (`walk`): streaming XML walk that assigns element locators
//! 4. **Stages** (`extract`, `rebuild`): segment extraction and text splicing
//!
//! # Example
//!
//! ```rust,no_run
//! use ooxml_translate::config::{ArchiveLimits, ExtractOptions, RebuildOptions};
//! use ooxml_translate::ooxml::{extract, rebuild, Package};
//!
//! let bytes = std::fs::read("report.docx")?;
//! let pkg = Package::open(&bytes, &ArchiveLimits::default())?;
//! let mut extraction = extract(&pkg, &ExtractOptions::default())?;
//! for segment in &mut extraction.segments {
//!     segment.translated_text = Some(segment.original_text.to_uppercase());
//! }
//! let rebuilt = rebuild(
//!     &pkg,
//!     extraction.file_type,
//!     &extraction.segments,
//!     "report.docx",
//!     &RebuildOptions::default(),
//! )?;
//! std::fs::write(&rebuilt.output_filename, &rebuilt.archive)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
pub mod container;
pub mod extract;
pub mod format;
pub mod rebuild;
pub mod walk;

#[cfg(test)]
pub(crate) mod fixtures;

pub use container::Package;
pub use extract::{extract, Extraction};
pub use format::{detect, FileType, ScanMap};
pub use rebuild::{rebuild, RebuildReport, Rebuilt};
