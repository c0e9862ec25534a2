use std::path::PathBuf;
use std::time::Duration;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory; every durable index lives in its own sub-directory.
    pub storage_path: PathBuf,

    pub run_in_memory: bool,
    pub create_new_indexes_in_memory: bool,
    pub new_index_in_memory_max_bytes: u64,

    pub max_number_of_items_to_index_in_single_batch: usize,

    pub searcher_drain_timeout: Duration,
    pub dispose_lock_timeout: Duration,

    pub performance_history_size: usize,
    pub max_server_errors: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_path: PathBuf::from("./data/indexes"),

            run_in_memory: false,
            create_new_indexes_in_memory: true,
            new_index_in_memory_max_bytes: 64 * 1024 * 1024,    // 64MB before promotion

            max_number_of_items_to_index_in_single_batch: 128 * 1024,

            searcher_drain_timeout: Duration::from_secs(5),
            dispose_lock_timeout: Duration::from_millis(100),

            performance_history_size: 25,
            max_server_errors: 50,
        }
    }
}

impl Config {
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }
}
