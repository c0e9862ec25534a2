use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::directory::Directory;

/// Floating pointer to the newest commit generation.
pub const SEGMENTS_GEN: &str = "segments.gen";
const SEGMENTS_PREFIX: &str = "segments_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub name: String,
    pub doc_count: u32,
    /// Local ids of deleted documents.
    pub deleted: Vec<u32>,
}

/// A durable, named checkpoint of the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitPoint {
    pub generation: u64,
    pub segments: Vec<SegmentInfo>,
    pub next_segment: u64,
    pub timestamp: DateTime<Utc>,
}

impl CommitPoint {
    pub fn empty() -> Self {
        CommitPoint {
            generation: 0,
            segments: Vec::new(),
            next_segment: 1,
            timestamp: Utc::now(),
        }
    }

    pub fn file_name(&self) -> String {
        commit_file_name(self.generation)
    }

    /// Every file this commit needs, the commit file included.
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.segments.iter().map(|s| s.name.clone()).collect();
        names.push(self.file_name());
        names
    }

    pub fn live_docs(&self) -> u64 {
        self.segments
            .iter()
            .map(|s| (s.doc_count as u64).saturating_sub(s.deleted.len() as u64))
            .sum()
    }

    pub fn write(&self, dir: &dyn Directory) -> Result<()> {
        let payload = bincode::serialize(self)?;
        let mut bytes = crc32fast::hash(&payload).to_le_bytes().to_vec();
        bytes.extend_from_slice(&payload);
        dir.write_file(&self.file_name(), &bytes)?;
        dir.write_file(SEGMENTS_GEN, &bincode::serialize(&self.generation)?)?;
        Ok(())
    }

    pub fn read(dir: &dyn Directory, generation: u64) -> Result<CommitPoint> {
        let name = commit_file_name(generation);
        let bytes = dir.read_file(&name)?;
        if bytes.len() < 4 {
            return Err(Error::corrupt(format!("Commit file '{}' is truncated", name)));
        }
        let (crc, payload) = bytes.split_at(4);
        let expected = u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]);
        if crc32fast::hash(payload) != expected {
            return Err(Error::corrupt(format!("Checksum mismatch in commit file '{}'", name)));
        }
        bincode::deserialize(payload)
            .map_err(|e| Error::corrupt(format!("Commit file '{}' could not be decoded: {}", name, e)))
    }

    /// Newest commit of `dir`, or `None` for a directory that was never committed to.
    pub fn load_latest(dir: &dyn Directory) -> Result<Option<CommitPoint>> {
        let files = dir.list_files()?;
        let newest_listed = files.iter().filter_map(|f| parse_generation(f)).max();

        let pointed = if dir.file_exists(SEGMENTS_GEN) {
            match bincode::deserialize::<u64>(&dir.read_file(SEGMENTS_GEN)?) {
                Ok(generation) => Some(generation),
                Err(e) => {
                    warn!(target: "docdex::indexing", "ignoring unreadable {}: {}", SEGMENTS_GEN, e);
                    None
                }
            }
        } else {
            None
        };

        let generation = match (pointed, newest_listed) {
            (Some(p), Some(l)) => p.max(l),
            (Some(p), None) => p,
            (None, Some(l)) => l,
            (None, None) => return Ok(None),
        };

        match CommitPoint::read(dir, generation) {
            Ok(commit) => Ok(Some(commit)),
            Err(e) if e.kind == ErrorKind::NotFound => Err(Error::wrap(
                ErrorKind::CorruptIndex,
                format!("{} points to a missing commit", SEGMENTS_GEN),
                e,
            )),
            Err(e) => Err(e),
        }
    }
}

pub fn commit_file_name(generation: u64) -> String {
    format!("{}{}", SEGMENTS_PREFIX, generation)
}

pub fn parse_generation(file_name: &str) -> Option<u64> {
    file_name.strip_prefix(SEGMENTS_PREFIX)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::directory::RamDirectory;

    #[test]
    fn latest_commit_wins() {
        let dir = RamDirectory::new();
        assert!(CommitPoint::load_latest(&dir).unwrap().is_none());

        let mut commit = CommitPoint::empty();
        commit.generation = 1;
        commit.write(&dir).unwrap();

        commit.generation = 2;
        commit.segments.push(SegmentInfo { name: "_1.seg".to_string(), doc_count: 3, deleted: vec![1] });
        commit.write(&dir).unwrap();

        let latest = CommitPoint::load_latest(&dir).unwrap().unwrap();
        assert_eq!(latest.generation, 2);
        assert_eq!(latest.live_docs(), 2);
        assert_eq!(latest.file_names(), vec!["_1.seg".to_string(), "segments_2".to_string()]);
        assert_eq!(parse_generation("segments.gen"), None);
    }

    #[test]
    fn missing_commit_file_is_corruption() {
        let dir = RamDirectory::new();
        dir.write_file(SEGMENTS_GEN, &bincode::serialize(&5u64).unwrap()).unwrap();
        let err = CommitPoint::load_latest(&dir).unwrap_err();
        assert!(err.has_kind(ErrorKind::CorruptIndex));
    }
}
