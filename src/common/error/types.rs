//! Unified error types for the translation engine.
//!
//! Every stage (container guard, format detection, extraction, chunking,
//! merging, rebuild and session persistence) reports failures through this
//! single type so callers can render one consistent failure response.
use thiserror::Error;

/// Main error type for engine operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The input could not be opened as a ZIP container at all
    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    /// A resource ceiling (size, entry count, part size) was exceeded
    #[error("Resource limit exceeded: {resource} is {actual}, limit is {limit}")]
    ResourceLimitExceeded {
        resource: &'static str,
        limit: u64,
        actual: u64,
    },

    /// The container is a ZIP but not a recognised OOXML document
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A recorded locator no longer resolves in the original part
    #[error("Segment {id} locator {locator} not found in {part}")]
    SegmentLocatorNotFound {
        id: String,
        part: String,
        locator: String,
    },

    /// No tag-structured content could be extracted from translator output
    #[error("Malformed translation input: {0}")]
    MalformedTranslationInput(String),

    /// No session exists for the given file id
    #[error("No session found for file_id '{0}'")]
    SessionNotFound(String),

    /// Translation coverage differs from the segment count (non-fatal)
    #[error("Segment count mismatch: expected {expected}, matched {matched}")]
    SegmentCountMismatch { expected: usize, matched: usize },

    /// XML parsing error
    #[error("XML error: {0}")]
    Xml(String),

    /// Session store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Session record (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable name of the error kind, used in failure responses.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidArchive(_) => "InvalidArchive",
            Error::ResourceLimitExceeded { .. } => "ResourceLimitExceeded",
            Error::UnsupportedFormat(_) => "UnsupportedFormat",
            Error::SegmentLocatorNotFound { .. } => "SegmentLocatorNotFound",
            Error::MalformedTranslationInput(_) => "MalformedTranslationInput",
            Error::SessionNotFound(_) => "SessionNotFound",
            Error::SegmentCountMismatch { .. } => "SegmentCountMismatch",
            Error::Xml(_) => "XmlError",
            Error::Storage(_) => "StorageError",
            Error::Serialization(_) => "SerializationError",
            Error::Config(_) => "ConfigError",
            Error::Io(_) => "IoError",
        }
    }

    /// Whether this error aborts a call rather than degrading one segment.
    ///
    /// Locator misses and count mismatches are surfaced in report fields and
    /// never abort a whole document.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::SegmentLocatorNotFound { .. } | Error::SegmentCountMismatch { .. }
        )
    }

    pub(crate) fn limit(resource: &'static str, limit: u64, actual: u64) -> Self {
        Error::ResourceLimitExceeded {
            resource,
            limit,
            actual,
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
