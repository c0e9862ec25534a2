use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Serialize, Deserialize};
use serde_json::Value;
use tracing::warn;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::accessor::StorageAccessor;
use crate::storage::layout::IndexStorage;

/// One entry of the bounded indexing error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerError {
    pub index: String,
    pub document_key: Option<String>,
    pub error: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::new(ErrorKind::Cancelled, "Operation was cancelled"));
        }
        Ok(())
    }
}

/// Source documents, used by index-time code that loads other documents.
pub trait DocumentSource: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;
}

/// Shared services handed to every index of the process.
pub struct WorkContext {
    pub config: Config,
    pub storage: Arc<dyn StorageAccessor>,
    pub index_storage: Arc<IndexStorage>,
    pub documents: Option<Arc<dyn DocumentSource>>,
    pub cancellation: CancellationToken,
    errors: Mutex<VecDeque<ServerError>>,
    do_not_touch_again: Mutex<HashMap<String, HashSet<String>>>,
}

impl WorkContext {
    pub fn new(config: Config, storage: Arc<dyn StorageAccessor>, index_storage: Arc<IndexStorage>) -> Self {
        WorkContext {
            config,
            storage,
            index_storage,
            documents: None,
            cancellation: CancellationToken::new(),
            errors: Mutex::new(VecDeque::new()),
            do_not_touch_again: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_documents(mut self, documents: Arc<dyn DocumentSource>) -> Self {
        self.documents = Some(documents);
        self
    }

    pub fn add_error(&self, index: &str, document_key: Option<&str>, error: &str, action: &str) {
        warn!(
            target: "docdex::indexing",
            index, action, document_key = ?document_key,
            "indexing error: {}", error
        );

        let mut errors = self.errors.lock();
        errors.push_back(ServerError {
            index: index.to_string(),
            document_key: document_key.map(String::from),
            error: error.to_string(),
            action: action.to_string(),
            timestamp: Utc::now(),
        });
        while errors.len() > self.config.max_server_errors {
            errors.pop_front();
        }
    }

    pub fn errors(&self) -> Vec<ServerError> {
        self.errors.lock().iter().cloned().collect()
    }

    /// Consumes a do-not-touch mark; true if `key` was marked for `index`.
    pub fn take_do_not_touch_again(&self, index: &str, key: &str) -> bool {
        self.do_not_touch_again
            .lock()
            .get_mut(index)
            .is_some_and(|keys| keys.remove(&key.to_lowercase()))
    }

    pub fn mark_do_not_touch_again(&self, index: &str, key: &str) {
        self.do_not_touch_again
            .lock()
            .entry(index.to_string())
            .or_default()
            .insert(key.to_lowercase());
    }
}
