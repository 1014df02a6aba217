//! Engine configuration.
//!
//! All knobs have defaults matching the documented limits, so
//! `EngineConfig::default()` is a complete configuration. Individual groups
//! can be tuned with `with_*` builders or loaded from YAML.
//!
//! # Examples
//!
//! ```rust
//! use ooxml_translate::config::{ChunkOptions, EngineConfig};
//!
//! let config = EngineConfig::new()
//!     .with_chunk(ChunkOptions::new().with_max_chars(800).with_max_segments(20));
//! assert_eq!(config.chunk.max_chars, 800);
//!
//! let config = EngineConfig::from_yaml_str("chunk:\n  max_segments: 10\n").unwrap();
//! assert_eq!(config.chunk.max_segments, 10);
//! assert_eq!(config.chunk.max_chars, 1500);
//! ```

use crate::common::{Error, Result};
use serde::Deserialize;

/// Maximum total uncompressed size of an archive (100 MB).
pub const MAX_TOTAL_UNCOMPRESSED: u64 = 100 * 1024 * 1024;
/// Maximum number of entries in an archive.
pub const MAX_ENTRIES: u64 = 10_000;
/// Maximum size of a single scanned XML part (50 MB).
pub const MAX_PART_BYTES: u64 = 50 * 1024 * 1024;

/// Default character budget per chunk.
pub const DEFAULT_CHUNK_CHARS: usize = 1500;
/// Default segment budget per chunk.
pub const DEFAULT_CHUNK_SEGMENTS: usize = 50;

/// Top-level configuration for [`crate::pipeline::Engine`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub limits: ArchiveLimits,
    pub chunk: ChunkOptions,
    pub storage: StorageOptions,
    pub extract: ExtractOptions,
    pub rebuild: RebuildOptions,
}

impl EngineConfig {
    /// Create a configuration with default values.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from YAML. Missing keys keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_saphyr::from_str(yaml).map_err(|e| Error::Config(e.to_string()))
    }

    #[inline]
    pub fn with_limits(mut self, limits: ArchiveLimits) -> Self {
        self.limits = limits;
        self
    }

    #[inline]
    pub fn with_chunk(mut self, chunk: ChunkOptions) -> Self {
        self.chunk = chunk;
        self
    }

    #[inline]
    pub fn with_storage(mut self, storage: StorageOptions) -> Self {
        self.storage = storage;
        self
    }

    #[inline]
    pub fn with_extract(mut self, extract: ExtractOptions) -> Self {
        self.extract = extract;
        self
    }

    #[inline]
    pub fn with_rebuild(mut self, rebuild: RebuildOptions) -> Self {
        self.rebuild = rebuild;
        self
    }
}

/// Resource ceilings enforced by the container guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ArchiveLimits {
    /// Ceiling on the sum of uncompressed entry sizes
    pub max_total_uncompressed: u64,
    /// Ceiling on the number of entries
    pub max_entries: u64,
    /// Ceiling on a single XML part handed to the parser
    pub max_part_bytes: u64,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self {
            max_total_uncompressed: MAX_TOTAL_UNCOMPRESSED,
            max_entries: MAX_ENTRIES,
            max_part_bytes: MAX_PART_BYTES,
        }
    }
}

impl ArchiveLimits {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_max_total_uncompressed(mut self, bytes: u64) -> Self {
        self.max_total_uncompressed = bytes;
        self
    }

    #[inline]
    pub fn with_max_entries(mut self, entries: u64) -> Self {
        self.max_entries = entries;
        self
    }

    #[inline]
    pub fn with_max_part_bytes(mut self, bytes: u64) -> Self {
        self.max_part_bytes = bytes;
        self
    }
}

/// How segments are presented to the translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// All segments in one string
    #[default]
    String,
    /// Segments grouped into size-bounded chunks
    Array,
}

/// Defaults for the chunk formatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChunkOptions {
    pub output_format: OutputFormat,
    /// Character budget per chunk
    pub max_chars: usize,
    /// Segment budget per chunk
    pub max_segments: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::String,
            max_chars: DEFAULT_CHUNK_CHARS,
            max_segments: DEFAULT_CHUNK_SEGMENTS,
        }
    }
}

impl ChunkOptions {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    #[inline]
    pub fn with_max_chars(mut self, chars: usize) -> Self {
        self.max_chars = chars;
        self
    }

    #[inline]
    pub fn with_max_segments(mut self, segments: usize) -> Self {
        self.max_segments = segments;
        self
    }
}

/// Thresholds that pick the persisted session layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    /// Serialized segment payloads up to this size are stored as plain JSON
    pub simple_max_bytes: usize,
    /// Payloads up to this size are stored gzip-compressed in one record
    pub compressed_max_bytes: usize,
    /// Segments per record in the batched layout
    pub batch_size: usize,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            simple_max_bytes: 16 * 1024,
            compressed_max_bytes: 1024 * 1024,
            batch_size: 50,
        }
    }
}

impl StorageOptions {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_simple_max_bytes(mut self, bytes: usize) -> Self {
        self.simple_max_bytes = bytes;
        self
    }

    #[inline]
    pub fn with_compressed_max_bytes(mut self, bytes: usize) -> Self {
        self.compressed_max_bytes = bytes;
        self
    }

    #[inline]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }
}

/// Extraction switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Also extract cached string results of formulas (`c[@t="str"]/v`)
    pub include_formula_strings: bool,
}

impl ExtractOptions {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_formula_strings(mut self, include: bool) -> Self {
        self.include_formula_strings = include;
        self
    }
}

/// Rebuild switches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RebuildOptions {
    /// Insert a space between adjacent translated runs that would otherwise
    /// glue two words together
    pub joint_spacing: bool,
    /// Marker appended to the output file stem
    pub filename_marker: String,
}

impl Default for RebuildOptions {
    fn default() -> Self {
        Self {
            joint_spacing: false,
            filename_marker: "_translated".to_string(),
        }
    }
}

impl RebuildOptions {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_joint_spacing(mut self, enabled: bool) -> Self {
        self.joint_spacing = enabled;
        self
    }

    #[inline]
    pub fn with_filename_marker(mut self, marker: impl Into<String>) -> Self {
        self.filename_marker = marker.into();
        self
    }
}
