use std::collections::{BTreeMap, HashMap, HashSet};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use crate::core::error::Result;
use crate::core::stats::IndexingWorkStats;
use crate::core::types::Etag;

/// Background work queued for the indexing pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Re-index documents whose referenced documents were missing when they were indexed.
    TouchMissingReferences {
        index: String,
        missing_references: BTreeMap<String, HashSet<String>>,
        added_at: DateTime<Utc>,
    },
}

/// Operations available inside one storage transaction.
pub trait StorageActions {
    fn update_indexing_stats(&mut self, index: &str, stats: &IndexingWorkStats) -> Result<()>;

    fn update_reduce_stats(&mut self, index: &str, stats: &IndexingWorkStats) -> Result<()>;

    fn update_document_references(&mut self, index: &str, key: &str, references: &HashSet<String>) -> Result<()>;

    /// Commits and restarts the transaction when it has grown too large.
    fn maybe_pulse_transaction(&mut self) -> Result<()>;

    fn add_task(&mut self, task: Task) -> Result<()>;

    fn most_recent_document_etag(&self) -> Option<Etag>;

    fn set_last_committed_etag(&mut self, index: &str, etag: Etag) -> Result<()>;
}

/// Transactional storage: `batch` runs `action` atomically.
pub trait StorageAccessor: Send + Sync {
    fn batch(&self, action: &mut dyn FnMut(&mut dyn StorageActions) -> Result<()>) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct StorageState {
    pub indexing_stats: HashMap<String, IndexingWorkStats>,
    pub reduce_stats: HashMap<String, IndexingWorkStats>,
    pub references: HashMap<String, HashMap<String, HashSet<String>>>,
    pub tasks: Vec<Task>,
    pub pulses: usize,
    pub most_recent_etag: Option<Etag>,
    pub last_committed: HashMap<String, Etag>,
}

impl StorageActions for StorageState {
    fn update_indexing_stats(&mut self, index: &str, stats: &IndexingWorkStats) -> Result<()> {
        self.indexing_stats.entry(index.to_string()).or_default().add(stats);
        Ok(())
    }

    fn update_reduce_stats(&mut self, index: &str, stats: &IndexingWorkStats) -> Result<()> {
        self.reduce_stats.entry(index.to_string()).or_default().add(stats);
        Ok(())
    }

    fn update_document_references(&mut self, index: &str, key: &str, references: &HashSet<String>) -> Result<()> {
        self.references
            .entry(index.to_string())
            .or_default()
            .insert(key.to_string(), references.clone());
        Ok(())
    }

    fn maybe_pulse_transaction(&mut self) -> Result<()> {
        self.pulses += 1;
        Ok(())
    }

    fn add_task(&mut self, task: Task) -> Result<()> {
        self.tasks.push(task);
        Ok(())
    }

    fn most_recent_document_etag(&self) -> Option<Etag> {
        self.most_recent_etag
    }

    fn set_last_committed_etag(&mut self, index: &str, etag: Etag) -> Result<()> {
        self.last_committed.insert(index.to_string(), etag);
        Ok(())
    }
}

/// Copy-on-write in-memory storage; a failed batch leaves no trace.
#[derive(Default)]
pub struct InMemoryStorage {
    state: Mutex<StorageState>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        InMemoryStorage::default()
    }

    pub fn set_most_recent_etag(&self, etag: Etag) {
        self.state.lock().most_recent_etag = Some(etag);
    }

    pub fn state(&self) -> StorageState {
        self.state.lock().clone()
    }
}

impl StorageAccessor for InMemoryStorage {
    fn batch(&self, action: &mut dyn FnMut(&mut dyn StorageActions) -> Result<()>) -> Result<()> {
        let mut state = self.state.lock();
        let mut working = state.clone();
        action(&mut working)?;
        *state = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{Error, ErrorKind};
    use crate::core::stats::WorkOperation;

    #[test]
    fn failed_batch_is_rolled_back() {
        let storage = InMemoryStorage::new();
        let mut stats = IndexingWorkStats::new(WorkOperation::Map);
        stats.attempt();

        storage.batch(&mut |actions| actions.update_indexing_stats("Users", &stats)).unwrap();
        let result = storage.batch(&mut |actions| {
            actions.update_indexing_stats("Users", &stats)?;
            Err(Error::new(ErrorKind::Internal, "disk full"))
        });

        assert!(result.is_err());
        assert_eq!(storage.state().indexing_stats["Users"].indexing_attempts, 1);
    }
}
