use std::collections::{BTreeMap, HashSet};
use parking_lot::Mutex;
use tracing::debug;
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::commit::{CommitPoint, parse_generation};
use crate::storage::directory::Directory;
use crate::storage::segment::is_segment_file;

/// Keeps only the last commit, plus any commit pinned by a snapshot.
pub struct SnapshotDeletionPolicy {
    inner: Mutex<PolicyState>,
}

struct PolicyState {
    retained: Vec<CommitPoint>,
    pinned: BTreeMap<u64, usize>,
}

impl SnapshotDeletionPolicy {
    pub fn new() -> Self {
        SnapshotDeletionPolicy {
            inner: Mutex::new(PolicyState {
                retained: Vec::new(),
                pinned: BTreeMap::new(),
            }),
        }
    }

    /// Pins the most recent commit; its files survive until `release`.
    pub fn snapshot(&self) -> Result<CommitPoint> {
        let mut state = self.inner.lock();
        let last = state
            .retained
            .last()
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::InvalidState, "No index commit to snapshot"))?;
        *state.pinned.entry(last.generation).or_insert(0) += 1;
        Ok(last)
    }

    pub fn release(&self, generation: u64) -> Result<()> {
        let mut state = self.inner.lock();
        match state.pinned.get_mut(&generation) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                state.pinned.remove(&generation);
            }
            None => {
                return Err(Error::new(
                    ErrorKind::InvalidState,
                    format!("Snapshot of generation {} is not held", generation),
                ))
            }
        }
        Ok(())
    }

    pub fn pinned_generations(&self) -> Vec<u64> {
        self.inner.lock().pinned.keys().copied().collect()
    }

    /// Records a new commit and deletes files no retained commit references.
    pub fn on_commit(&self, dir: &dyn Directory, commit: CommitPoint) -> Result<()> {
        let mut state = self.inner.lock();
        state.retained.push(commit);

        let newest = state.retained.len() - 1;
        let pinned = state.pinned.clone();
        let mut index = 0;
        state.retained.retain(|c| {
            let keep = index == newest || pinned.contains_key(&c.generation);
            index += 1;
            keep
        });

        let referenced: HashSet<String> = state
            .retained
            .iter()
            .flat_map(|c| c.file_names())
            .collect();

        for file in dir.list_files()? {
            let managed = is_segment_file(&file) || parse_generation(&file).is_some();
            if managed && !referenced.contains(&file) {
                debug!(target: "docdex::indexing", "deleting unreferenced index file {}", file);
                dir.delete_file(&file)?;
            }
        }
        Ok(())
    }
}

impl Default for SnapshotDeletionPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::commit::SegmentInfo;
    use crate::storage::directory::RamDirectory;

    fn commit(dir: &RamDirectory, generation: u64, segments: &[&str]) -> CommitPoint {
        let mut point = CommitPoint::empty();
        point.generation = generation;
        for name in segments {
            dir.write_file(name, b"data").unwrap();
            point.segments.push(SegmentInfo { name: name.to_string(), doc_count: 1, deleted: vec![] });
        }
        point.write(dir).unwrap();
        point
    }

    #[test]
    fn snapshot_keeps_files_until_released() {
        let dir = RamDirectory::new();
        let policy = SnapshotDeletionPolicy::new();

        policy.on_commit(&dir, commit(&dir, 1, &["_1.seg"])).unwrap();
        let snap = policy.snapshot().unwrap();
        assert_eq!(snap.generation, 1);

        policy.on_commit(&dir, commit(&dir, 2, &["_2.seg"])).unwrap();
        assert!(dir.file_exists("_1.seg"));
        assert!(dir.file_exists("segments_1"));

        policy.release(snap.generation).unwrap();
        policy.on_commit(&dir, commit(&dir, 3, &["_2.seg"])).unwrap();
        assert!(!dir.file_exists("_1.seg"));
        assert!(!dir.file_exists("segments_1"));
        assert!(!dir.file_exists("segments_2"));
        assert!(dir.file_exists("_2.seg"));
        assert!(dir.file_exists("segments.gen"));
    }

    #[test]
    fn releasing_an_unknown_snapshot_fails() {
        let policy = SnapshotDeletionPolicy::new();
        assert!(policy.snapshot().is_err());
        assert!(policy.release(4).is_err());
    }
}
