//! Processing sessions and their persisted layout.
//!
//! A session is stored under keys derived from its `file_id`:
//!
//! | key                          | content                                  |
//! |------------------------------|------------------------------------------|
//! | `{file_id}_session`          | [`SessionHeader`] as JSON                |
//! | `{file_id}_original`         | original archive bytes                   |
//! | `{file_id}_texts`            | segments (simple or compressed layout)   |
//! | `{file_id}_texts_batch_{n}`  | segments batch `n` (batched layout)      |
//!
//! The layout is chosen once, at creation, from the size of the serialized
//! segments and recorded in the header; later writes reuse it.

pub mod codec;
pub mod store;

pub use store::{MemoryStore, SessionStore};

use crate::common::{Error, Result};
use crate::config::StorageOptions;
use crate::ooxml::FileType;
use crate::segment::TextSegment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How segments are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageLayout {
    /// One plain JSON record
    Simple,
    /// One gzip-compressed JSON record
    Compressed,
    /// Several gzip-compressed JSON records of `batch_size` segments
    Batched,
}

/// Pipeline progress of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Extracted,
    Translated,
    /// Rebuilt and logically retired; still readable
    Rebuilt,
}

/// Session metadata stored under `{file_id}_session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHeader {
    pub file_id: String,
    pub file_type: FileType,
    pub original_filename: String,
    pub created_at: DateTime<Utc>,
    pub stage: Stage,
    pub layout: StorageLayout,
    pub batch_count: usize,
    pub segment_count: usize,
}

/// Everything the pipeline keeps about one document.
#[derive(Debug, Clone)]
pub struct ProcessingSession {
    pub header: SessionHeader,
    pub segments: Vec<TextSegment>,
    pub original_archive: Vec<u8>,
}

impl ProcessingSession {
    #[inline]
    pub fn file_id(&self) -> &str {
        &self.header.file_id
    }

    #[inline]
    pub fn file_type(&self) -> FileType {
        self.header.file_type
    }
}

#[inline]
fn header_key(file_id: &str) -> String {
    format!("{file_id}_session")
}

#[inline]
fn original_key(file_id: &str) -> String {
    format!("{file_id}_original")
}

#[inline]
fn texts_key(file_id: &str) -> String {
    format!("{file_id}_texts")
}

#[inline]
fn batch_key(file_id: &str, n: usize) -> String {
    format!("{file_id}_texts_batch_{n}")
}

/// Session persistence over a [`SessionStore`].
#[derive(Debug)]
pub struct Sessions<S> {
    store: S,
    options: StorageOptions,
}

impl<S: SessionStore> Sessions<S> {
    pub fn new(store: S, options: StorageOptions) -> Self {
        Self { store, options }
    }

    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persist a freshly extracted session, choosing its layout.
    pub fn create(
        &self,
        file_id: &str,
        file_type: FileType,
        original_filename: &str,
        segments: Vec<TextSegment>,
        original_archive: Vec<u8>,
    ) -> Result<ProcessingSession> {
        let json = serde_json::to_vec(&segments)?;
        let layout = if json.len() <= self.options.simple_max_bytes {
            StorageLayout::Simple
        } else if json.len() <= self.options.compressed_max_bytes {
            StorageLayout::Compressed
        } else {
            StorageLayout::Batched
        };

        let mut session = ProcessingSession {
            header: SessionHeader {
                file_id: file_id.to_string(),
                file_type,
                original_filename: original_filename.to_string(),
                created_at: Utc::now(),
                stage: Stage::Extracted,
                layout,
                batch_count: 0,
                segment_count: segments.len(),
            },
            segments,
            original_archive,
        };

        log::debug!(
            "session {}: {} segments, {} bytes serialized, {:?} layout",
            file_id,
            session.segments.len(),
            json.len(),
            layout
        );

        self.store
            .put(&original_key(file_id), session.original_archive.clone())?;
        self.save_segments(&mut session.header, &session.segments)?;
        Ok(session)
    }

    /// Read the session header.
    pub fn load_header(&self, file_id: &str) -> Result<SessionHeader> {
        let data = self
            .store
            .get(&header_key(file_id))?
            .ok_or_else(|| Error::SessionNotFound(file_id.to_string()))?;
        codec::decode(&data)
    }

    /// Read the segments described by `header`.
    pub fn load_segments(&self, header: &SessionHeader) -> Result<Vec<TextSegment>> {
        let file_id = &header.file_id;
        let segments: Vec<TextSegment> = match header.layout {
            StorageLayout::Simple | StorageLayout::Compressed => {
                let data = self.required(&texts_key(file_id))?;
                codec::decode(&data)?
            },
            StorageLayout::Batched => {
                let mut all = Vec::with_capacity(header.segment_count);
                for n in 0..header.batch_count {
                    let data = self.required(&batch_key(file_id, n))?;
                    all.extend(codec::decode::<Vec<TextSegment>>(&data)?);
                }
                all
            },
        };

        if segments.len() != header.segment_count {
            return Err(Error::Storage(format!(
                "session {} holds {} segments, header says {}",
                file_id,
                segments.len(),
                header.segment_count
            )));
        }
        Ok(segments)
    }

    /// Read the original archive bytes.
    pub fn load_archive(&self, file_id: &str) -> Result<Vec<u8>> {
        self.required(&original_key(file_id))
    }

    /// Read a whole session.
    pub fn load(&self, file_id: &str) -> Result<ProcessingSession> {
        let header = self.load_header(file_id)?;
        let segments = self.load_segments(&header)?;
        let original_archive = self.load_archive(file_id)?;
        Ok(ProcessingSession {
            header,
            segments,
            original_archive,
        })
    }

    /// Write the segments with the header's recorded layout, then the header.
    pub fn save_segments(&self, header: &mut SessionHeader, segments: &[TextSegment]) -> Result<()> {
        let file_id = header.file_id.as_str();
        match header.layout {
            StorageLayout::Simple => {
                self.store.put(&texts_key(file_id), codec::encode(segments, false)?)?;
            },
            StorageLayout::Compressed => {
                self.store.put(&texts_key(file_id), codec::encode(segments, true)?)?;
            },
            StorageLayout::Batched => {
                let batch_size = self.options.batch_size.max(1);
                let mut count = 0;
                for (n, batch) in segments.chunks(batch_size).enumerate() {
                    self.store.put(&batch_key(file_id, n), codec::encode(batch, true)?)?;
                    count += 1;
                }
                header.batch_count = count;
            },
        }
        header.segment_count = segments.len();
        self.save_header(header)
    }

    /// Write the header alone.
    pub fn save_header(&self, header: &SessionHeader) -> Result<()> {
        self.store.put(&header_key(&header.file_id), codec::encode(header, false)?)
    }

    fn required(&self, key: &str) -> Result<Vec<u8>> {
        self.store
            .get(key)?
            .ok_or_else(|| Error::Storage(format!("session record '{key}' is missing")))
    }
}
