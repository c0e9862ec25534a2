use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, Result};
use crate::core::types::{DOCUMENT_ID_FIELD_NAME, IndexDocument};
use crate::storage::directory::Directory;

/// One document as the index sees it: stored fields plus the indexed terms per field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentDoc {
    pub stored: IndexDocument,
    pub terms: BTreeMap<String, Vec<String>>,
    pub numerics: BTreeMap<String, Vec<f64>>,
}

impl SegmentDoc {
    pub fn key(&self) -> Option<&str> {
        self.stored.key().or_else(|| {
            self.terms
                .get(DOCUMENT_ID_FIELD_NAME)
                .and_then(|terms| terms.first())
                .map(String::as_str)
        })
    }

    pub fn terms(&self, field: &str) -> &[String] {
        self.terms.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn numerics(&self, field: &str) -> &[f64] {
        self.numerics.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_term(&self, field: &str, term: &str) -> bool {
        self.terms(field).iter().any(|t| t == term)
    }
}

/// Immutable document payload of one `_<n>.seg` file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentData {
    pub docs: Vec<SegmentDoc>,
}

/// Segment file header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentHeader {
    pub version: u32,     // Format version
    pub doc_count: u32,   // Number of documents
    pub checksum: u32,    // CRC32 of the compressed body
}

impl SegmentHeader {
    pub const VERSION: u32 = 1;
    pub const SIZE: usize = 12;
}

pub fn segment_file_name(number: u64) -> String {
    format!("_{}.seg", number)
}

pub fn is_segment_file(name: &str) -> bool {
    name.starts_with('_') && name.ends_with(".seg")
}

/// Encodes and writes the segment, returning the file size.
pub fn write_segment(dir: &dyn Directory, name: &str, data: &SegmentData) -> Result<u64> {
    let payload = bincode::serialize(data)?;
    let body = lz4_flex::compress_prepend_size(&payload);

    let header = SegmentHeader {
        version: SegmentHeader::VERSION,
        doc_count: data.docs.len() as u32,
        checksum: crc32fast::hash(&body),
    };

    let mut bytes = bincode::serialize(&header)?;
    bytes.extend_from_slice(&body);
    dir.write_file(name, &bytes)?;
    Ok(bytes.len() as u64)
}

pub fn read_segment(dir: &dyn Directory, name: &str) -> Result<SegmentData> {
    let bytes = dir.read_file(name)?;
    if bytes.len() < SegmentHeader::SIZE {
        return Err(Error::corrupt(format!("Segment '{}' is truncated", name)));
    }

    let header: SegmentHeader = bincode::deserialize(&bytes[..SegmentHeader::SIZE])
        .map_err(|e| Error::corrupt(format!("Segment '{}' has an unreadable header: {}", name, e)))?;
    if header.version != SegmentHeader::VERSION {
        return Err(Error::corrupt(format!("Segment '{}' has unknown format version {}", name, header.version)));
    }

    let body = &bytes[SegmentHeader::SIZE..];
    if crc32fast::hash(body) != header.checksum {
        return Err(Error::corrupt(format!("Checksum mismatch in segment '{}'", name)));
    }

    let payload = lz4_flex::decompress_size_prepended(body)
        .map_err(|e| Error::corrupt(format!("Segment '{}' could not be decompressed: {}", name, e)))?;
    let data: SegmentData = bincode::deserialize(&payload)
        .map_err(|e| Error::corrupt(format!("Segment '{}' could not be decoded: {}", name, e)))?;

    if data.docs.len() != header.doc_count as usize {
        return Err(Error::corrupt(format!(
            "Segment '{}' declares {} documents but holds {}",
            name, header.doc_count, data.docs.len()
        )));
    }
    Ok(data)
}
