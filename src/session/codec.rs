//! Encoding of session records: JSON, optionally gzip-compressed.

use crate::common::{Error, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[inline]
pub fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&GZIP_MAGIC)
}

pub fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 4), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

pub fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 4);
    GzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| Error::Storage(format!("corrupt gzip session record: {e}")))?;
    Ok(out)
}

/// Serialize to JSON, gzip-compressed when `compress` is set.
pub fn encode<T: Serialize + ?Sized>(value: &T, compress: bool) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(value)?;
    if compress { gzip(&json) } else { Ok(json) }
}

/// Deserialize a record written by [`encode`], detecting compression.
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    if is_gzip(data) {
        Ok(serde_json::from_slice(&gunzip(data)?)?)
    } else {
        Ok(serde_json::from_slice(data)?)
    }
}
