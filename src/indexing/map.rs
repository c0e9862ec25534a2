use serde_json::Value;
use crate::core::error::Result;
use crate::core::stats::{IndexedItemsInfo, WorkOperation};
use crate::core::types::Etag;
use crate::indexing::convert::entry_to_document;
use crate::indexing::index::Index;
use crate::indexing::robust::RobustEnumerator;

/// A source document handed to the index's map function.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub key: String,
    pub etag: Etag,
    pub data: Value,
}

impl SourceDocument {
    pub fn new(key: impl Into<String>, etag: Etag, data: Value) -> Self {
        SourceDocument { key: key.into(), etag, data }
    }
}

impl Index {
    /// Maps a batch of source documents and replaces their entries in the index.
    ///
    /// A document whose map function fails loses its old entries, is reported to the error
    /// log and does not stop the batch. Only the first
    /// `max_number_of_items_to_index_in_single_batch` documents are touched; the returned
    /// etag tells the caller where to resume.
    pub fn index_documents(&self, documents: &[SourceDocument]) -> Result<IndexedItemsInfo> {
        let action = if self.is_map_reduce() { "Reduce" } else { "Map" };
        let generator = self.view_generator().clone();
        let context = self.context().clone();
        let cap = context.config.max_number_of_items_to_index_in_single_batch;
        let documents = &documents[..documents.len().min(cap)];
        let highest = documents.iter().map(|doc| doc.etag).max();

        self.write(|session, stats| {
            stats.operation = if self.is_map_reduce() { WorkOperation::Reduce } else { WorkOperation::Map };
            for doc in documents {
                session.delete_by_key(&doc.key)?;
            }

            let enumerator = RobustEnumerator::new(&context.cancellation, cap);
            let entries = enumerator.enumerate(
                documents,
                stats,
                |doc| {
                    let produced = generator.map(&doc.key, &doc.data)?;
                    Ok(produced.into_iter().map(|entry| (doc.key.clone(), entry)).collect())
                },
                |doc, err| context.add_error(self.name(), Some(doc.key.as_str()), &err.to_string(), action),
            )?;

            for (key, entry) in &entries {
                session.add_document(entry_to_document(Some(key.as_str()), entry, self.definition()))?;
            }
            Ok(IndexedItemsInfo::new(documents.len(), highest))
        })
    }

    /// Deletes every entry of the given source document keys.
    pub fn remove(&self, keys: &[&str]) -> Result<IndexedItemsInfo> {
        self.write(|session, stats| {
            stats.operation = WorkOperation::Ignore;
            for key in keys {
                session.delete_by_key(key)?;
            }
            Ok(IndexedItemsInfo::new(keys.len(), None))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use serde_json::json;
    use crate::core::config::Config;
    use crate::core::context::WorkContext;
    use crate::core::error::{Error, ErrorKind};
    use crate::indexing::view_generator::SimpleViewGenerator;
    use crate::query::ast::Query;
    use crate::schema::definition::IndexDefinition;
    use crate::storage::accessor::InMemoryStorage;
    use crate::storage::layout::IndexStorage;

    fn index() -> (Index, Arc<InMemoryStorage>) {
        let config = Config { run_in_memory: true, ..Config::default() };
        let storage = Arc::new(InMemoryStorage::new());
        let context = WorkContext::new(config.clone(), storage.clone(), Arc::new(IndexStorage::in_memory(&config)));
        let generator = SimpleViewGenerator::new(&["Name"], |_key, doc: &Value| {
            match doc.get("Name") {
                Some(name) => Ok(vec![json!({"Name": name})]),
                None => Err(Error::new(ErrorKind::Internal, "document has no name")),
            }
        });
        (Index::new(IndexDefinition::new("Users"), Arc::new(generator), Arc::new(context)).unwrap(), storage)
    }

    #[test]
    fn failing_documents_are_reported_and_skipped() {
        let (index, storage) = index();
        let info = index
            .index_documents(&[
                SourceDocument::new("users/1", Etag(1), json!({"Name": "Oren"})),
                SourceDocument::new("users/2", Etag(5), json!({"Age": 3})),
            ])
            .unwrap();

        assert_eq!(info.changed_docs, 2);
        assert_eq!(info.highest_etag, Some(Etag(5)));
        assert_eq!(index.searcher().unwrap().num_docs(), 1);

        let errors = index.context().errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].action, "Map");
        assert_eq!(errors[0].document_key.as_deref(), Some("users/2"));

        let state = storage.state();
        let stats = &state.indexing_stats["Users"];
        assert_eq!(stats.indexing_attempts, 2);
        assert_eq!(stats.indexing_errors, 1);
    }

    #[test]
    fn documents_past_the_batch_cap_are_left_alone() {
        let config = Config { run_in_memory: true, max_number_of_items_to_index_in_single_batch: 2, ..Config::default() };
        let context = WorkContext::new(config.clone(), Arc::new(InMemoryStorage::new()), Arc::new(IndexStorage::in_memory(&config)));
        let index = Index::new(
            IndexDefinition::new("Users"),
            Arc::new(SimpleViewGenerator::projecting(&["Name"])),
            Arc::new(context),
        )
        .unwrap();
        index.index_documents(&[SourceDocument::new("users/3", Etag(1), json!({"Name": "Old"}))]).unwrap();

        let info = index
            .index_documents(&[
                SourceDocument::new("users/1", Etag(2), json!({"Name": "Oren"})),
                SourceDocument::new("users/2", Etag(3), json!({"Name": "Ayende"})),
                SourceDocument::new("users/3", Etag(4), json!({"Name": "New"})),
            ])
            .unwrap();

        assert_eq!(info.changed_docs, 2);
        assert_eq!(info.highest_etag, Some(Etag(3)));
        let searcher = index.searcher().unwrap();
        assert_eq!(searcher.num_docs(), 3);
        let old = searcher.search(&Query::term("Name", "old"), 10, None);
        assert_eq!(old.total_hits, 1);
    }

    #[test]
    fn reindexing_replaces_old_entries() {
        let (index, _) = index();
        index.index_documents(&[SourceDocument::new("Users/1", Etag(1), json!({"Name": "Oren"}))]).unwrap();
        index.index_documents(&[SourceDocument::new("users/1", Etag(2), json!({"Name": "Ayende"}))]).unwrap();
        assert_eq!(index.searcher().unwrap().num_docs(), 1);

        index.remove(&["USERS/1"]).unwrap();
        assert_eq!(index.searcher().unwrap().num_docs(), 0);
    }
}
