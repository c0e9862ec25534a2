use std::time::Duration;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use crate::core::types::Etag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkOperation {
    Map,
    Reduce,
    Ignore,
}

/// Per-batch counters persisted through the storage accessor after a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexingWorkStats {
    pub operation: WorkOperation,
    pub indexing_attempts: u64,
    pub indexing_successes: u64,
    pub indexing_errors: u64,
    pub reduce_attempts: u64,
    pub reduce_successes: u64,
    pub reduce_errors: u64,
}

impl IndexingWorkStats {
    pub fn new(operation: WorkOperation) -> Self {
        IndexingWorkStats {
            operation,
            indexing_attempts: 0,
            indexing_successes: 0,
            indexing_errors: 0,
            reduce_attempts: 0,
            reduce_successes: 0,
            reduce_errors: 0,
        }
    }

    pub fn add(&mut self, other: &IndexingWorkStats) {
        self.indexing_attempts += other.indexing_attempts;
        self.indexing_successes += other.indexing_successes;
        self.indexing_errors += other.indexing_errors;
        self.reduce_attempts += other.reduce_attempts;
        self.reduce_successes += other.reduce_successes;
        self.reduce_errors += other.reduce_errors;
    }

    pub fn attempt(&mut self) {
        match self.operation {
            WorkOperation::Map => self.indexing_attempts += 1,
            WorkOperation::Reduce => self.reduce_attempts += 1,
            WorkOperation::Ignore => {}
        }
    }

    pub fn success(&mut self) {
        match self.operation {
            WorkOperation::Map => self.indexing_successes += 1,
            WorkOperation::Reduce => self.reduce_successes += 1,
            WorkOperation::Ignore => {}
        }
    }

    pub fn error(&mut self) {
        match self.operation {
            WorkOperation::Map => self.indexing_errors += 1,
            WorkOperation::Reduce => self.reduce_errors += 1,
            WorkOperation::Ignore => {}
        }
    }
}

impl Default for IndexingWorkStats {
    fn default() -> Self {
        IndexingWorkStats::new(WorkOperation::Map)
    }
}

/// Summary returned by a write mutator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexedItemsInfo {
    pub changed_docs: usize,
    pub highest_etag: Option<Etag>,
}

impl IndexedItemsInfo {
    pub fn new(changed_docs: usize, highest_etag: Option<Etag>) -> Self {
        IndexedItemsInfo { changed_docs, highest_etag }
    }

    pub fn unchanged() -> Self {
        IndexedItemsInfo::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingPerformanceStats {
    pub operation: String,
    pub input_count: usize,
    pub output_count: usize,
    pub started: DateTime<Utc>,
    pub duration: Duration,
}

/// A live in-progress batch, reported by `Index::current_batches`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentBatch {
    pub operation: String,
    pub size: usize,
    pub started: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_follow_the_operation() {
        let mut stats = IndexingWorkStats::new(WorkOperation::Reduce);
        stats.attempt();
        stats.attempt();
        stats.success();
        stats.error();

        assert_eq!(stats.reduce_attempts, 2);
        assert_eq!(stats.reduce_successes, 1);
        assert_eq!(stats.reduce_errors, 1);
        assert_eq!(stats.indexing_attempts, 0);

        let mut ignored = IndexingWorkStats::new(WorkOperation::Ignore);
        ignored.attempt();
        assert_eq!(ignored, IndexingWorkStats::new(WorkOperation::Ignore));
    }
}
