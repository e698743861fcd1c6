//! Zip bundle handle: in-memory archive with eager entry indexing.
//!
//! A bundle is opened once from a fetched byte buffer. The central
//! directory is parsed up front into a filename -> entry map so per-asset
//! lookups never scan the archive. The handle is immutable after
//! construction and shared between all assets drawn from the same bundle.

use std::io::Read;

use flate2::read::DeflateDecoder;
use rustc_hash::FxHashMap;
use thiserror::Error;

const EOCD_SIG: u32 = 0x0605_4b50;
const CENTRAL_SIG: u32 = 0x0201_4b50;
const LOCAL_SIG: u32 = 0x0403_4b50;

/// End-of-central-directory record size, without the trailing comment.
const EOCD_LEN: usize = 22;
/// Fixed part of a central directory header.
const CENTRAL_LEN: usize = 46;
/// Fixed part of a local file header.
const LOCAL_LEN: usize = 30;

/// Compression methods we can extract.
const METHOD_STORED: u16 = 0;
const METHOD_DEFLATED: u16 = 8;

// ============================================================================
// Errors
// ============================================================================

/// Failures while opening a bundle or extracting one of its entries.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("archive is truncated")]
    Truncated,

    #[error("end of central directory record not found")]
    MissingEndRecord,

    #[error("bad record signature at offset {0}")]
    BadSignature(usize),

    #[error("entry name is not valid UTF-8")]
    InvalidEntryName,

    #[error("entry `{0}` not found in archive")]
    EntryNotFound(String),

    #[error("unsupported compression method {0}")]
    UnsupportedMethod(u16),

    #[error("failed to inflate entry `{0}`")]
    Inflate(String, #[source] std::io::Error),
}

// ============================================================================
// ZipHandle
// ============================================================================

/// Location of one archive entry, recorded from the central directory.
#[derive(Debug, Clone, Copy)]
struct EntryRecord {
    method: u16,
    compressed_size: usize,
    header_offset: usize,
}

/// An opened zip bundle.
///
/// Reads are safe from any thread; the handle holds the raw archive bytes
/// and decompresses entries on demand. Dropping the last `Arc<ZipHandle>`
/// releases the buffer.
pub struct ZipHandle {
    data: Vec<u8>,
    entries: FxHashMap<String, EntryRecord>,
}

impl ZipHandle {
    /// Open an archive from a contiguous byte buffer.
    ///
    /// The filename index is built eagerly; entry names are stored with any
    /// leading `/` stripped so rooted and bare in-bundle paths address the
    /// same entry.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, BundleError> {
        let eocd = find_end_record(&data)?;
        let entry_count = read_u16(&data, eocd + 10)? as usize;
        let mut pos = read_u32(&data, eocd + 16)? as usize;

        let mut entries =
            FxHashMap::with_capacity_and_hasher(entry_count, Default::default());

        for _ in 0..entry_count {
            if read_u32(&data, pos)? != CENTRAL_SIG {
                return Err(BundleError::BadSignature(pos));
            }

            let method = read_u16(&data, pos + 10)?;
            let compressed_size = read_u32(&data, pos + 20)? as usize;
            let name_len = read_u16(&data, pos + 28)? as usize;
            let extra_len = read_u16(&data, pos + 30)? as usize;
            let comment_len = read_u16(&data, pos + 32)? as usize;
            let header_offset = read_u32(&data, pos + 42)? as usize;

            let name_bytes = data
                .get(pos + CENTRAL_LEN..pos + CENTRAL_LEN + name_len)
                .ok_or(BundleError::Truncated)?;
            let name = std::str::from_utf8(name_bytes)
                .map_err(|_| BundleError::InvalidEntryName)?;

            entries.insert(
                normalize_entry_name(name).to_string(),
                EntryRecord {
                    method,
                    compressed_size,
                    header_offset,
                },
            );

            pos += CENTRAL_LEN + name_len + extra_len + comment_len;
        }

        Ok(Self { data, entries })
    }

    /// Extract a single entry by its in-bundle path.
    pub fn read(&self, path: &str) -> Result<Vec<u8>, BundleError> {
        let name = normalize_entry_name(path);
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| BundleError::EntryNotFound(name.to_string()))?;

        // Sizes come from the central directory; the local header is only
        // consulted for the position of the entry data.
        let hd = entry.header_offset;
        if read_u32(&self.data, hd)? != LOCAL_SIG {
            return Err(BundleError::BadSignature(hd));
        }
        let name_len = read_u16(&self.data, hd + 26)? as usize;
        let extra_len = read_u16(&self.data, hd + 28)? as usize;

        let start = hd + LOCAL_LEN + name_len + extra_len;
        let raw = self
            .data
            .get(start..start + entry.compressed_size)
            .ok_or(BundleError::Truncated)?;

        match entry.method {
            METHOD_STORED => Ok(raw.to_vec()),
            METHOD_DEFLATED => {
                let mut out = Vec::new();
                DeflateDecoder::new(raw)
                    .read_to_end(&mut out)
                    .map_err(|e| BundleError::Inflate(name.to_string(), e))?;
                Ok(out)
            }
            other => Err(BundleError::UnsupportedMethod(other)),
        }
    }

    /// Check whether the archive contains an entry.
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(normalize_entry_name(path))
    }

    /// Number of entries in the archive.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

impl std::fmt::Debug for ZipHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipHandle")
            .field("bytes", &self.data.len())
            .field("entries", &self.entries.len())
            .finish()
    }
}

// ============================================================================
// Record parsing
// ============================================================================

fn normalize_entry_name(name: &str) -> &str {
    name.trim_start_matches('/')
}

/// Locate the end-of-central-directory record by scanning backwards over
/// the trailing comment region.
fn find_end_record(data: &[u8]) -> Result<usize, BundleError> {
    if data.len() < EOCD_LEN {
        return Err(BundleError::Truncated);
    }
    let floor = data.len().saturating_sub(EOCD_LEN + u16::MAX as usize);
    let mut pos = data.len() - EOCD_LEN;
    loop {
        if read_u32(data, pos)? == EOCD_SIG {
            return Ok(pos);
        }
        if pos == floor {
            return Err(BundleError::MissingEndRecord);
        }
        pos -= 1;
    }
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16, BundleError> {
    let bytes = data
        .get(offset..offset + 2)
        .ok_or(BundleError::Truncated)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32, BundleError> {
    let bytes = data
        .get(offset..offset + 4)
        .ok_or(BundleError::Truncated)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

// ============================================================================
// Test archive builder
// ============================================================================


// ============================================================================
// Tests
// ============================================================================
