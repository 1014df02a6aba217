//! Container guard: safe, in-memory access to an OOXML zip package.
//!
//! The guard enforces the archive limits before and while anything is
//! inflated:
//!
//! 1. The End Of Central Directory record is located and its declared entry
//!    count checked, so a directory claiming too many entries is rejected
//!    before the zip structure is parsed.
//! 2. Declared uncompressed sizes are summed entry by entry.
//! 3. Actual inflated bytes are counted against a running budget, so a
//!    directory that lies about sizes cannot get past the ceiling either.
//!
//! Nothing is ever written to disk. Repacking raw-copies every untouched
//! entry (compressed bytes and metadata) and only re-compresses replaced
//! parts.

use crate::common::{Error, Result};
use crate::config::ArchiveLimits;
use memchr::memmem;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::{CompressionMethod, ZipArchive};

/// End of central directory signature
const EOCD_SIGNATURE: &[u8; 4] = b"PK\x05\x06";
/// Fixed part of the EOCD record
const EOCD_LEN: usize = 22;
/// Largest possible archive comment
const MAX_COMMENT_LEN: usize = u16::MAX as usize;
/// Entry count value that defers to the ZIP64 record
const ZIP64_COUNT_SENTINEL: u16 = u16::MAX;

/// One archive entry held in memory.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Path inside the archive
    pub name: String,
    /// Uncompressed bytes
    pub data: Vec<u8>,
    /// Compression method used by the original archive
    pub compression: CompressionMethod,
    pub is_dir: bool,
    last_modified: Option<zip::DateTime>,
    /// Position in the original central directory
    index: usize,
}

/// A validated OOXML package.
///
/// Borrows the original archive bytes so that untouched entries can be
/// copied verbatim when repacking.
pub struct Package<'data> {
    raw: &'data [u8],
    entries: Vec<Entry>,
    by_name: HashMap<String, usize>,
    max_part_bytes: u64,
}

impl std::fmt::Debug for Package<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package")
            .field("size", &self.raw.len())
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl<'data> Package<'data> {
    /// Open and validate an archive under the given limits.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArchive`] if the bytes are not a readable zip
    /// - [`Error::ResourceLimitExceeded`] if the entry count or the declared
    ///   or actual uncompressed size exceeds the limits
    pub fn open(raw: &'data [u8], limits: &ArchiveLimits) -> Result<Self> {
        if raw.len() < EOCD_LEN || !raw.starts_with(b"PK") {
            return Err(Error::InvalidArchive(
                "input is not a zip container".to_string(),
            ));
        }

        let declared = declared_entry_count(raw).ok_or_else(|| {
            Error::InvalidArchive("end of central directory record not found".to_string())
        })?;
        if declared != ZIP64_COUNT_SENTINEL && u64::from(declared) > limits.max_entries {
            return Err(Error::limit("entry count", limits.max_entries, u64::from(declared)));
        }

        let mut zip = ZipArchive::new(Cursor::new(raw))?;
        let count = zip.len();
        if count as u64 > limits.max_entries {
            return Err(Error::limit("entry count", limits.max_entries, count as u64));
        }

        // Declared sizes first: cheap, and stops honest-but-huge archives
        // before any inflation.
        let mut declared_total: u64 = 0;
        for i in 0..count {
            let file = zip.by_index_raw(i)?;
            declared_total = declared_total.saturating_add(file.size());
            if declared_total > limits.max_total_uncompressed {
                return Err(Error::limit(
                    "declared uncompressed size",
                    limits.max_total_uncompressed,
                    declared_total,
                ));
            }
        }

        let mut entries = Vec::with_capacity(count);
        let mut by_name = HashMap::with_capacity(count);
        let mut inflated: u64 = 0;
        for i in 0..count {
            let mut file = zip.by_index(i)?;
            let name = file.name().to_string();
            let is_dir = file.is_dir();
            let compression = file.compression();
            let last_modified = file.last_modified();

            let remaining = limits.max_total_uncompressed - inflated;
            let mut data = Vec::with_capacity(file.size().min(remaining) as usize);
            (&mut file).take(remaining + 1).read_to_end(&mut data)?;
            inflated += data.len() as u64;
            if inflated > limits.max_total_uncompressed {
                return Err(Error::limit(
                    "uncompressed size",
                    limits.max_total_uncompressed,
                    inflated,
                ));
            }

            by_name.entry(name.clone()).or_insert(entries.len());
            entries.push(Entry {
                name,
                data,
                compression,
                is_dir,
                last_modified,
                index: i,
            });
        }

        log::debug!(
            "opened package: {} entries, {} bytes uncompressed",
            entries.len(),
            inflated
        );

        Ok(Self {
            raw,
            entries,
            by_name,
            max_part_bytes: limits.max_part_bytes,
        })
    }

    /// The original archive bytes.
    #[inline]
    pub fn raw(&self) -> &'data [u8] {
        self.raw
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in original archive order.
    #[inline]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Names of all file entries, in archive order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| !e.is_dir)
            .map(|e| e.name.as_str())
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Uncompressed bytes of a part.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.by_name
            .get(name)
            .map(|&i| self.entries[i].data.as_slice())
    }

    /// Bytes of an XML part that is about to be parsed, checked against the
    /// per-part ceiling.
    pub fn xml_part(&self, name: &str) -> Result<Option<&[u8]>> {
        match self.part(name) {
            Some(data) if data.len() as u64 > self.max_part_bytes => Err(Error::limit(
                "XML part size",
                self.max_part_bytes,
                data.len() as u64,
            )),
            other => Ok(other),
        }
    }

    /// Write a new archive in which the named parts are replaced.
    ///
    /// Entry order is preserved. Untouched entries are raw-copied from the
    /// original archive; replaced ones are compressed with their original
    /// method (deflate for anything other than stored). With no
    /// replacements the original bytes are returned unchanged.
    pub fn repack(&self, replacements: &HashMap<String, Vec<u8>>) -> Result<Vec<u8>> {
        if replacements.is_empty() {
            return Ok(self.raw.to_vec());
        }

        let mut source = ZipArchive::new(Cursor::new(self.raw))?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(self.raw.len())));

        for (i, entry) in self.entries.iter().enumerate() {
            // Only the first of duplicated names is addressable.
            let replacement = match self.by_name.get(&entry.name) {
                Some(&first) if first == i => replacements.get(&entry.name),
                _ => None,
            };

            match replacement {
                Some(data) => {
                    let method = match entry.compression {
                        CompressionMethod::Stored => CompressionMethod::Stored,
                        _ => CompressionMethod::Deflated,
                    };
                    let mut options = SimpleFileOptions::default().compression_method(method);
                    if let Some(modified) = entry.last_modified {
                        options = options.last_modified_time(modified);
                    }
                    writer.start_file(entry.name.as_str(), options)?;
                    writer.write_all(data)?;
                },
                None => {
                    let file = source.by_index_raw(entry.index)?;
                    writer.raw_copy_file(file)?;
                },
            }
        }

        let cursor = writer.finish()?;
        Ok(cursor.into_inner())
    }
}

/// Read the declared entry count from the End Of Central Directory record.
///
/// Scans backwards over the last `22 + 65535` bytes for a signature whose
/// comment length fits the remaining data. Returns the larger of the
/// per-disk and total counts.
fn declared_entry_count(data: &[u8]) -> Option<u16> {
    let window_start = data.len().saturating_sub(EOCD_LEN + MAX_COMMENT_LEN);
    let window = &data[window_start..];

    let mut end = window.len();
    while let Some(pos) = memmem::rfind(&window[..end], EOCD_SIGNATURE) {
        if pos + EOCD_LEN <= window.len() {
            let record = &window[pos..pos + EOCD_LEN];
            let comment_len = u16::from_le_bytes([record[20], record[21]]) as usize;
            if pos + EOCD_LEN + comment_len <= window.len() {
                let on_disk = u16::from_le_bytes([record[8], record[9]]);
                let total = u16::from_le_bytes([record[10], record[11]]);
                return Some(on_disk.max(total));
            }
        }
        end = pos;
    }
    None
}
