use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use crate::analysis::analyzer::{Analyzer, AnalyzerRegistry};
use crate::analysis::per_field::{AnalyzerGenerator, PerFieldAnalyzer};
use crate::core::context::WorkContext;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::{CurrentBatch, IndexingPerformanceStats};
use crate::index::searcher_holder::{IndexSearcherHolder, SearcherGuard};
use crate::index::view::IndexView;
use crate::index::writer::IndexWriter;
use crate::indexing::extension::IndexExtension;
use crate::indexing::kind::{IndexKind, MapIndexKind, MapReduceIndexKind};
use crate::indexing::view_generator::ViewGenerator;
use crate::query::parser::{QueryBuilder, SimpleQueryBuilder};
use crate::query::trigger::IndexQueryTrigger;
use crate::query::types::IndexQuery;
use crate::schema::definition::{IndexDefinition, IndexingPriority};
use crate::search::executor::{IndexEntries, IndexQueryOperation};
use crate::search::projection::FieldsToFetch;
use crate::search::results::{IndexQueryResult, QueryResults};
use crate::storage::directory::Directory;
use crate::storage::deletion_policy::SnapshotDeletionPolicy;

/// Where the index files currently live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageTier {
    Memory,
    Disk,
}

/// One named index: a writer, the published view and the bookkeeping around them.
///
/// Writes, flushes, merges and disposal are serialized by the write lock. Queries never take
/// it; they run against whatever view was last published.
pub struct Index {
    name: String,
    definition: IndexDefinition,
    kind: Box<dyn IndexKind>,
    context: Arc<WorkContext>,
    view_generator: Arc<dyn ViewGenerator>,
    registry: Arc<AnalyzerRegistry>,
    query_builder: Arc<dyn QueryBuilder>,
    analyzer_generators: Vec<Arc<dyn AnalyzerGenerator>>,
    query_triggers: Vec<Arc<dyn IndexQueryTrigger>>,

    /// Only replaced while the write lock is held.
    directory: RwLock<Arc<dyn Directory>>,
    pub(crate) write_lock: Mutex<Option<IndexWriter>>,
    searcher_holder: IndexSearcherHolder,
    wait_reason: Mutex<Option<&'static str>>,
    disposed: AtomicBool,
    force_write_to_disk: AtomicBool,

    priority: RwLock<IndexingPriority>,
    last_query_time: RwLock<Option<DateTime<Utc>>>,
    pub(crate) last_index_time: RwLock<Option<DateTime<Utc>>>,
    pub(crate) previous_index_time: RwLock<Option<DateTime<Utc>>>,

    pub(crate) extensions: RwLock<BTreeMap<String, Arc<dyn IndexExtension>>>,
    currently_indexing: Mutex<HashMap<String, CurrentBatch>>,
    performance: Mutex<VecDeque<IndexingPerformanceStats>>,
}

impl Index {
    /// Opens the index storage and publishes the first view.
    ///
    /// A corrupt index still opens: the failure goes to the error log and queries see an
    /// empty index until the next successful write.
    pub fn new(definition: IndexDefinition, view_generator: Arc<dyn ViewGenerator>, context: Arc<WorkContext>) -> Result<Self> {
        let name = definition.name.clone();
        debug!(target: "docdex::indexing", index = %name, "creating index");

        let directory = context.index_storage.open_directory(&definition)?;
        let kind: Box<dyn IndexKind> = if definition.is_map_reduce {
            Box::new(MapReduceIndexKind)
        } else {
            Box::new(MapIndexKind)
        };

        let index = Index {
            searcher_holder: IndexSearcherHolder::new(name.clone()),
            name,
            definition,
            kind,
            context,
            view_generator,
            registry: AnalyzerRegistry::global(),
            query_builder: Arc::new(SimpleQueryBuilder::new()),
            analyzer_generators: Vec::new(),
            query_triggers: Vec::new(),
            directory: RwLock::new(directory),
            write_lock: Mutex::new(None),
            wait_reason: Mutex::new(None),
            disposed: AtomicBool::new(false),
            force_write_to_disk: AtomicBool::new(false),
            priority: RwLock::new(IndexingPriority::default()),
            last_query_time: RwLock::new(None),
            last_index_time: RwLock::new(None),
            previous_index_time: RwLock::new(None),
            extensions: RwLock::new(BTreeMap::new()),
            currently_indexing: Mutex::new(HashMap::new()),
            performance: Mutex::new(VecDeque::new()),
        };
        index.open_searcher();
        Ok(index)
    }

    pub fn with_kind(mut self, kind: Box<dyn IndexKind>) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_registry(mut self, registry: Arc<AnalyzerRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_query_builder(mut self, builder: Arc<dyn QueryBuilder>) -> Self {
        self.query_builder = builder;
        self
    }

    pub fn with_analyzer_generator(mut self, generator: Arc<dyn AnalyzerGenerator>) -> Self {
        self.analyzer_generators.push(generator);
        self
    }

    /// Triggers run in the order they were added.
    pub fn with_query_trigger(mut self, trigger: Arc<dyn IndexQueryTrigger>) -> Self {
        self.query_triggers.push(trigger);
        self
    }

    fn open_searcher(&self) {
        let directory = self.directory();
        let view = match IndexView::open(directory.as_ref()) {
            Ok(view) => view,
            Err(err) => {
                warn!(target: "docdex::indexing", index = %self.name, error = %err, "could not open index, serving it as empty");
                self.context.add_error(&self.name, None, &err.to_string(), "Open");
                IndexView::empty()
            }
        };
        self.searcher_holder.set_index_searcher(Some(view), false);
    }

    /// Publishes a view of the last commit. Callers hold the write lock.
    pub(crate) fn recreate_searcher(&self, writer: &mut Option<IndexWriter>) -> Result<()> {
        let view = match writer.as_mut() {
            Some(writer) => writer.get_reader()?,
            None => IndexView::open(self.directory().as_ref())?,
        };
        self.searcher_holder.set_index_searcher(Some(view), false);
        Ok(())
    }

    pub(crate) fn create_index_writer(&self, writer: &mut Option<IndexWriter>) -> Result<()> {
        let policy = Arc::new(SnapshotDeletionPolicy::new());
        *writer = Some(IndexWriter::open(self.directory(), policy)?);
        Ok(())
    }

    pub(crate) fn replace_directory(&self, directory: Arc<dyn Directory>) {
        *self.directory.write() = directory;
    }

    pub(crate) fn kind(&self) -> &dyn IndexKind {
        self.kind.as_ref()
    }

    pub(crate) fn analyzer_generators(&self) -> &[Arc<dyn AnalyzerGenerator>] {
        &self.analyzer_generators
    }

    pub(crate) fn set_wait_reason(&self, reason: Option<&'static str>) {
        *self.wait_reason.lock() = reason;
    }

    /// What the current holder of the write lock is doing, if anything.
    pub fn wait_reason(&self) -> Option<&'static str> {
        *self.wait_reason.lock()
    }

    pub(crate) fn lock_writer(&self, reason: &'static str) -> MutexGuard<'_, Option<IndexWriter>> {
        let guard = self.write_lock.lock();
        self.set_wait_reason(Some(reason));
        guard
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &IndexDefinition {
        &self.definition
    }

    pub fn is_map_reduce(&self) -> bool {
        self.kind.is_map_reduce()
    }

    pub fn context(&self) -> &Arc<WorkContext> {
        &self.context
    }

    pub fn view_generator(&self) -> &Arc<dyn ViewGenerator> {
        &self.view_generator
    }

    pub fn query_builder(&self) -> &Arc<dyn QueryBuilder> {
        &self.query_builder
    }

    pub fn query_triggers(&self) -> &[Arc<dyn IndexQueryTrigger>] {
        &self.query_triggers
    }

    pub fn directory(&self) -> Arc<dyn Directory> {
        self.directory.read().clone()
    }

    pub fn priority(&self) -> IndexingPriority {
        *self.priority.read()
    }

    pub fn set_priority(&self, priority: IndexingPriority) {
        *self.priority.write() = priority;
    }

    pub fn last_query_time(&self) -> Option<DateTime<Utc>> {
        *self.last_query_time.read()
    }

    pub fn last_index_time(&self) -> Option<DateTime<Utc>> {
        *self.last_index_time.read()
    }

    pub fn previous_index_time(&self) -> Option<DateTime<Utc>> {
        *self.previous_index_time.read()
    }

    pub fn mark_queried(&self) {
        *self.last_query_time.write() = Some(Utc::now());
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Makes the next write with changes move a memory index to disk.
    pub fn force_write_to_disk(&self) {
        self.force_write_to_disk.store(true, Ordering::Release);
    }

    pub(crate) fn write_to_disk_forced(&self) -> bool {
        self.force_write_to_disk.load(Ordering::Acquire)
    }

    pub fn storage_tier(&self) -> StorageTier {
        if self.directory().is_in_memory() {
            StorageTier::Memory
        } else {
            StorageTier::Disk
        }
    }

    /// `"false"` on disk, `"true (<size>)"` in memory.
    pub fn is_on_ram(&self) -> String {
        let directory = self.directory();
        if !directory.is_in_memory() {
            return "false".to_string();
        }
        match directory.size_in_bytes() {
            Ok(size) => format!("true ({})", humane_size(size)),
            Err(_) => "true".to_string(),
        }
    }

    pub fn searcher(&self) -> Result<SearcherGuard> {
        self.searcher_holder.get_searcher()
    }

    pub fn searcher_and_terms_docs(&self) -> Result<(SearcherGuard, Arc<Vec<Value>>)> {
        self.searcher_holder.get_searcher_and_terms_docs()
    }

    pub(crate) fn indexing_analyzer(&self) -> Result<PerFieldAnalyzer> {
        PerFieldAnalyzer::for_definition(&self.definition, &self.registry, Arc::new(Analyzer::lowercase_keyword()), false)
    }

    /// Analyzer for parsing `query`, after the querying generators had their say.
    pub fn query_analyzer(&self, query: &str) -> Result<PerFieldAnalyzer> {
        let mut analyzer =
            PerFieldAnalyzer::for_definition(&self.definition, &self.registry, Arc::new(Analyzer::lowercase_keyword()), true)?;
        for generator in &self.analyzer_generators {
            if let Some(default) = generator.generate_for_querying(&self.name, query, &analyzer) {
                analyzer = analyzer.with_default(default);
            }
        }
        Ok(analyzer)
    }

    pub fn query(
        &self,
        options: IndexQuery,
        fields_to_fetch: FieldsToFetch,
        should_include: &dyn Fn(&IndexQueryResult) -> bool,
    ) -> Result<QueryResults> {
        IndexQueryOperation::new(self, options, fields_to_fetch, should_include).query()
    }

    pub fn intersection_query(
        &self,
        options: IndexQuery,
        fields_to_fetch: FieldsToFetch,
        should_include: &dyn Fn(&IndexQueryResult) -> bool,
    ) -> Result<QueryResults> {
        IndexQueryOperation::new(self, options, fields_to_fetch, should_include).intersection_query()
    }

    pub fn index_entries(&self, options: IndexQuery) -> Result<IndexEntries> {
        IndexQueryOperation::new(self, options, FieldsToFetch::none(), &|_| true).index_entries()
    }

    /// Commits pending writer changes, if a writer is open.
    pub fn flush(&self) -> Result<()> {
        let mut writer = self.lock_writer("Flush");
        let result = match writer.as_mut() {
            Some(writer) if !self.is_disposed() => writer.commit(),
            _ => Ok(()),
        };
        self.set_wait_reason(None);
        result
    }

    /// Merges all segments into one. A no-op before the first write.
    pub fn merge_segments(&self) -> Result<()> {
        let mut writer = self.lock_writer("Merge");
        let result = match writer.as_mut() {
            Some(writer) if !self.is_disposed() => {
                info!(target: "docdex::indexing", index = %self.name, segments = writer.segment_count(), "starting merge");
                let started = Instant::now();
                let merged = writer.optimize();
                info!(target: "docdex::indexing", index = %self.name, elapsed = ?started.elapsed(), "done merging");
                merged
            }
            _ => Ok(()),
        };
        self.set_wait_reason(None);
        result
    }

    /// Closes the index. Every step is best-effort; later steps run even when earlier ones fail.
    pub fn dispose(&self) {
        let mut writer = match self.write_lock.try_lock_for(self.context.config.dispose_lock_timeout) {
            Some(guard) => guard,
            None => {
                if let Some(reason) = self.wait_reason() {
                    warn!(
                        target: "docdex::indexing",
                        index = %self.name,
                        "waiting for {} to complete before disposing of index, that might take a while if the server is very busy",
                        reason
                    );
                }
                self.write_lock.lock()
            }
        };

        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        for (key, extension) in self.extensions.read().iter() {
            debug!(target: "docdex::indexing", index = %self.name, extension = %key, "disposing extension");
            extension.dispose();
        }

        if let Some(drained) = self.searcher_holder.set_index_searcher(None, true) {
            if !drained.wait(self.context.config.searcher_drain_timeout) {
                warn!(target: "docdex::indexing", index = %self.name, "index searcher was not released in time, disposing anyway");
            }
        }

        if let Some(open) = writer.take() {
            if let Err(err) = open.close() {
                error!(target: "docdex::indexing", index = %self.name, error = %err, "error while closing the index writer");
            }
        }

        if let Err(err) = self.directory().close() {
            error!(target: "docdex::indexing", index = %self.name, error = %err, "error while closing the directory");
        }
    }

    /// Registers `extension` under `key` unless the key is taken. Returns whether it was added.
    pub fn set_extension(&self, key: impl Into<String>, extension: Arc<dyn IndexExtension>) -> bool {
        let mut extensions = self.extensions.write();
        let key = key.into();
        if extensions.contains_key(&key) {
            return false;
        }
        extensions.insert(key, extension);
        true
    }

    pub fn get_extension(&self, key: &str) -> Option<Arc<dyn IndexExtension>> {
        self.extensions.read().get(key).cloned()
    }

    pub fn get_extension_by_prefix(&self, prefix: &str) -> Option<Arc<dyn IndexExtension>> {
        self.extensions
            .read()
            .iter()
            .find(|(key, _)| key.starts_with(prefix))
            .map(|(_, extension)| extension.clone())
    }

    pub fn record_current_batch(&self, operation: &str, size: usize) {
        self.currently_indexing.lock().insert(
            operation.to_string(),
            CurrentBatch { operation: operation.to_string(), size, started: Utc::now() },
        );
    }

    pub fn batch_completed(&self, operation: &str) {
        self.currently_indexing.lock().remove(operation);
    }

    /// Keeps the last `performance_history_size` records.
    pub fn add_indexing_performance_stat(&self, stats: IndexingPerformanceStats) {
        let mut history = self.performance.lock();
        history.push_back(stats);
        while history.len() > self.context.config.performance_history_size {
            history.pop_front();
        }
    }

    pub fn current_batches(&self) -> Vec<CurrentBatch> {
        self.currently_indexing.lock().values().cloned().collect()
    }

    /// Completed batches, oldest first, followed by the ones still running.
    pub fn indexing_performance(&self) -> Vec<IndexingPerformanceStats> {
        let now = Utc::now();
        let mut stats: Vec<_> = self.performance.lock().iter().cloned().collect();
        stats.extend(self.currently_indexing.lock().values().map(|batch| IndexingPerformanceStats {
            operation: batch.operation.clone(),
            input_count: batch.size,
            output_count: 0,
            started: batch.started,
            duration: (now - batch.started).to_std().unwrap_or_default(),
        }));
        stats
    }

    /// Loads a source document for index-time code. `Ok(None)` when it does not exist.
    pub fn load_document(&self, key: &str) -> Result<Option<Value>> {
        let source = self.context.documents.as_ref().ok_or_else(|| {
            Error::new(ErrorKind::InvalidState, format!("Index {} has no document source to load '{}' from", self.name, key))
        })?;
        source.get(key)
    }
}

fn humane_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KBytes", "MBytes", "GBytes", "TBytes"];
    if bytes < 1024 {
        return format!("{} Bytes", bytes);
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::core::config::Config;
    use crate::core::context::DocumentSource;
    use crate::core::types::IndexDocument;
    use crate::indexing::view_generator::SimpleViewGenerator;
    use crate::storage::accessor::InMemoryStorage;
    use crate::storage::layout::IndexStorage;

    fn index_with(context: WorkContext) -> Index {
        let generator = Arc::new(SimpleViewGenerator::projecting(&["Name"]));
        Index::new(IndexDefinition::new("Users"), generator, Arc::new(context)).unwrap()
    }

    fn context() -> WorkContext {
        let config = Config { run_in_memory: true, ..Config::default() };
        let index_storage = Arc::new(IndexStorage::in_memory(&config));
        WorkContext::new(config, Arc::new(InMemoryStorage::new()), index_storage)
    }

    struct Recorder;

    impl IndexExtension for Recorder {
        fn on_documents_indexed(&self, _documents: &[IndexDocument], _analyzer: &PerFieldAnalyzer) {}
    }

    #[test]
    fn humane_sizes() {
        assert_eq!(humane_size(12), "12 Bytes");
        assert_eq!(humane_size(1536), "1.50 KBytes");
        assert_eq!(humane_size(3 * 1024 * 1024), "3.00 MBytes");
    }

    #[test]
    fn new_index_serves_an_empty_view_from_memory() {
        let index = index_with(context());
        assert_eq!(index.searcher().unwrap().num_docs(), 0);
        assert_eq!(index.storage_tier(), StorageTier::Memory);
        assert!(index.is_on_ram().starts_with("true"));
        assert_eq!(index.priority(), IndexingPriority::Normal);
        assert!(index.last_query_time().is_none());

        index.set_priority(IndexingPriority::Idle);
        index.mark_queried();
        assert_eq!(index.priority(), IndexingPriority::Idle);
        assert!(index.last_query_time().is_some());
    }

    #[test]
    fn extensions_keep_the_first_registration() {
        let index = index_with(context());
        assert!(index.set_extension("Spatial/Location", Arc::new(Recorder)));
        assert!(!index.set_extension("Spatial/Location", Arc::new(Recorder)));
        assert!(index.get_extension("Spatial/Location").is_some());
        assert!(index.get_extension_by_prefix("Spatial/").is_some());
        assert!(index.get_extension_by_prefix("Suggest").is_none());
    }

    #[test]
    fn performance_history_is_bounded() {
        let mut ctx = context();
        ctx.config.performance_history_size = 2;
        let index = index_with(ctx);

        for n in 0..3 {
            index.add_indexing_performance_stat(IndexingPerformanceStats {
                operation: "Map".into(),
                input_count: n,
                output_count: n,
                started: Utc::now(),
                duration: Duration::from_millis(1),
            });
        }
        index.record_current_batch("Reduce", 7);

        let stats = index.indexing_performance();
        assert_eq!(stats.len(), 3);
        assert_eq!(stats[0].input_count, 1);
        assert_eq!(stats[2].operation, "Reduce");
        assert_eq!(stats[2].input_count, 7);

        index.batch_completed("Reduce");
        assert!(index.current_batches().is_empty());
    }

    #[test]
    fn dispose_stops_serving_and_is_idempotent() {
        let index = index_with(context());
        index.dispose();
        index.dispose();

        assert!(index.is_disposed());
        assert_eq!(index.searcher().unwrap_err().kind, ErrorKind::Disposed);
        assert!(index.flush().is_ok());
    }

    struct Docs;

    impl DocumentSource for Docs {
        fn get(&self, key: &str) -> Result<Option<Value>> {
            Ok((key == "users/1").then(|| serde_json::json!({"Name": "Oren"})))
        }
    }

    #[test]
    fn load_document_goes_through_the_document_source() {
        let index = index_with(context());
        assert_eq!(index.load_document("users/1").unwrap_err().kind, ErrorKind::InvalidState);

        let index = index_with(context().with_documents(Arc::new(Docs)));
        assert_eq!(index.load_document("users/1").unwrap().unwrap()["Name"], "Oren");
        assert!(index.load_document("users/2").unwrap().is_none());
    }
}
