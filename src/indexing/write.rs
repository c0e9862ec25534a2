use chrono::Utc;
use tracing::{debug, warn};
use crate::analysis::per_field::PerFieldAnalyzer;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::{IndexedItemsInfo, IndexingWorkStats, WorkOperation};
use crate::core::types::{DOCUMENT_ID_FIELD_NAME, Etag, IndexDocument, WRITING_TO_INDEX_LOCK};
use crate::index::writer::IndexWriter;
use crate::indexing::index::Index;
use crate::storage::directory::DirectoryLock;
use crate::storage::layout::IndexStorage;

/// Handle given to a write mutator: the open writer and the analyzer of this transaction.
pub struct WriteSession<'a> {
    index: &'a Index,
    writer: &'a mut IndexWriter,
    analyzer: &'a PerFieldAnalyzer,
    /// Copies of written entries, kept only when extensions are registered.
    indexed: Option<Vec<IndexDocument>>,
}

impl<'a> WriteSession<'a> {
    fn new(index: &'a Index, writer: &'a mut IndexWriter, analyzer: &'a PerFieldAnalyzer, track: bool) -> Self {
        WriteSession {
            index,
            writer,
            analyzer,
            indexed: track.then(Vec::new),
        }
    }

    pub fn analyzer(&self) -> &PerFieldAnalyzer {
        self.analyzer
    }

    pub fn index(&self) -> &Index {
        self.index
    }

    /// Adds one entry. Analyzer generators may swap the analyzer for this entry only.
    pub fn add_document(&mut self, document: IndexDocument) -> Result<()> {
        let mut generated: Option<PerFieldAnalyzer> = None;
        for generator in self.index.analyzer_generators() {
            let current = generated.as_ref().unwrap_or(self.analyzer);
            if let Some(next) = generator.generate_for_indexing(self.index.name(), &document, current) {
                generated = Some(next);
            }
        }

        self.writer.add_document(&document, generated.as_ref().unwrap_or(self.analyzer))?;
        if let Some(indexed) = self.indexed.as_mut() {
            indexed.push(document);
        }
        Ok(())
    }

    pub fn delete_documents(&mut self, field: &str, term: &str) -> Result<usize> {
        self.writer.delete_documents(field, term)
    }

    /// Deletes every entry produced from the source document `key`.
    pub fn delete_by_key(&mut self, key: &str) -> Result<usize> {
        self.writer.delete_documents(DOCUMENT_ID_FIELD_NAME, &key.to_lowercase())
    }

    pub fn num_docs(&self) -> usize {
        self.writer.num_docs()
    }
}

impl Index {
    /// Runs `mutator` as the single write transaction of this index.
    ///
    /// Changes are committed and a fresh view published when the mutator reports changed
    /// documents. A failure of the mutator is recorded in the error log and returned as
    /// `WriteFailed`; nothing it did is committed by this call.
    pub fn write<F>(&self, mutator: F) -> Result<IndexedItemsInfo>
    where
        F: FnOnce(&mut WriteSession<'_>, &mut IndexingWorkStats) -> Result<IndexedItemsInfo>,
    {
        if self.is_disposed() {
            return Err(Error::disposed(self.name()));
        }
        {
            let mut last = self.last_index_time.write();
            *self.previous_index_time.write() = *last;
            *last = Some(Utc::now());
        }

        let mut writer = self.lock_writer("Write");
        let outcome = if self.is_disposed() {
            Err(Error::disposed(self.name()))
        } else {
            self.write_locked(&mut writer, mutator)
        };
        self.set_wait_reason(None);
        *self.last_index_time.write() = Some(Utc::now());

        let info = outcome.map_err(|err| {
            if err.kind == ErrorKind::Disposed {
                return err;
            }
            Error::wrap(ErrorKind::WriteFailed, format!("Could not properly write to index {}", self.name()), err)
        })?;

        if let Err(err) = self.kind().handle_commit_points(self.name(), self.context(), &info) {
            warn!(target: "docdex::indexing", index = %self.name(), error = %err, "could not handle commit point properly, ignoring");
        }

        if info.changed_docs > 0 {
            self.recreate_searcher(&mut writer)?;
        }
        Ok(info)
    }

    fn write_locked<F>(&self, writer: &mut Option<IndexWriter>, mutator: F) -> Result<IndexedItemsInfo>
    where
        F: FnOnce(&mut WriteSession<'_>, &mut IndexingWorkStats) -> Result<IndexedItemsInfo>,
    {
        let analyzer = self.indexing_analyzer().inspect_err(|err| {
            self.context().add_error(self.name(), Some("Creating Analyzer"), &err.to_string(), "Analyzer");
        })?;

        if writer.is_none() {
            self.create_index_writer(writer)?;
        }

        let operation = if self.is_map_reduce() { WorkOperation::Reduce } else { WorkOperation::Map };
        let mut stats = IndexingWorkStats::new(operation);

        // held through the commit; dropped (and released) on early returns
        let directory = self.directory();
        let mut lock = directory.make_lock(WRITING_TO_INDEX_LOCK);
        let info = self
            .apply(writer, &analyzer, lock.as_mut(), &mut stats, mutator)
            .inspect_err(|err| {
                self.context().add_error(self.name(), err.document_key.as_deref(), &err.to_string(), "Write");
            })?;

        if info.changed_docs > 0 {
            self.update_indexing_stats(&stats)?;
            self.write_in_memory_index_to_disk_if_necessary(writer, info.highest_etag)?;
            if let Some(writer) = writer.as_mut() {
                writer.commit()?;
            }
        }
        lock.release();
        Ok(info)
    }

    fn apply<F>(
        &self,
        writer: &mut Option<IndexWriter>,
        analyzer: &PerFieldAnalyzer,
        lock: &mut dyn DirectoryLock,
        stats: &mut IndexingWorkStats,
        mutator: F,
    ) -> Result<IndexedItemsInfo>
    where
        F: FnOnce(&mut WriteSession<'_>, &mut IndexingWorkStats) -> Result<IndexedItemsInfo>,
    {
        if !lock.obtain()? {
            return Err(Error::new(
                ErrorKind::LockContention,
                format!("Could not obtain the 'writing-to-index' lock of '{}' index", self.name()),
            ));
        }
        let writer = writer
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::InvalidState, format!("Index {} has no open writer", self.name())))?;

        let track = !self.extensions.read().is_empty();
        let mut session = WriteSession::new(self, writer, analyzer, track);
        let info = mutator(&mut session, stats)?;

        if let Some(indexed) = session.indexed.take() {
            for extension in self.extensions.read().values() {
                extension.on_documents_indexed(&indexed, analyzer);
            }
        }
        Ok(info)
    }

    fn update_indexing_stats(&self, stats: &IndexingWorkStats) -> Result<()> {
        let name = self.name();
        match stats.operation {
            WorkOperation::Map => self.context().storage.batch(&mut |actions| actions.update_indexing_stats(name, stats)),
            WorkOperation::Reduce => self.context().storage.batch(&mut |actions| actions.update_reduce_stats(name, stats)),
            WorkOperation::Ignore => Ok(()),
        }
    }

    /// Moves a memory index to its disk directory when forced, when it grew past the
    /// configured size, or while it is still behind the newest document changes.
    fn write_in_memory_index_to_disk_if_necessary(&self, writer: &mut Option<IndexWriter>, highest: Option<Etag>) -> Result<()> {
        let config = &self.context().config;
        if config.run_in_memory {
            return Ok(());
        }
        let Some(open) = writer.as_mut() else {
            return Ok(());
        };
        let ram = open.directory().clone();
        if !ram.is_in_memory() {
            return Ok(());
        }

        let too_big = ram.size_in_bytes()? >= config.new_index_in_memory_max_bytes;
        let caught_up = self.kind().is_caught_up(self.context(), highest)?;
        if !(self.write_to_disk_forced() || too_big || !caught_up) {
            return Ok(());
        }

        debug!(target: "docdex::indexing", index = %self.name(), too_big, caught_up, "promoting in-memory index");
        open.commit()?;
        let disk = self.context().index_storage.make_ram_directory_physical(ram.as_ref(), self.name())?;
        IndexStorage::write_index_version(disk.as_ref(), self.definition())?;

        if let Some(old) = writer.take() {
            old.close()?;
        }
        self.replace_directory(disk);
        ram.close()?;
        self.create_index_writer(writer)
    }
}
