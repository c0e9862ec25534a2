use crate::core::context::WorkContext;
use crate::core::error::Result;
use crate::core::stats::IndexedItemsInfo;
use crate::core::types::Etag;

/// Behavior that differs between map indexes and map/reduce indexes.
pub trait IndexKind: Send + Sync {
    fn is_map_reduce(&self) -> bool;

    /// Whether indexing has reached the newest document change mark.
    fn is_caught_up(&self, context: &WorkContext, highest: Option<Etag>) -> Result<bool>;

    /// Bookkeeping after a committed write. Failures are logged by the caller.
    fn handle_commit_points(&self, index: &str, context: &WorkContext, info: &IndexedItemsInfo) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MapIndexKind;

impl IndexKind for MapIndexKind {
    fn is_map_reduce(&self) -> bool {
        false
    }

    fn is_caught_up(&self, context: &WorkContext, highest: Option<Etag>) -> Result<bool> {
        let mut caught_up = true;
        context.storage.batch(&mut |actions| {
            caught_up = match actions.most_recent_document_etag() {
                None => true,
                Some(most_recent) => most_recent <= highest.unwrap_or(Etag::EMPTY),
            };
            Ok(())
        })?;
        Ok(caught_up)
    }

    fn handle_commit_points(&self, index: &str, context: &WorkContext, info: &IndexedItemsInfo) -> Result<()> {
        let Some(etag) = info.highest_etag else {
            return Ok(());
        };
        if info.changed_docs == 0 {
            return Ok(());
        }
        context.storage.batch(&mut |actions| actions.set_last_committed_etag(index, etag))
    }
}

/// Reduce results are rebuilt from map results, so there is nothing to record per commit.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapReduceIndexKind;

impl IndexKind for MapReduceIndexKind {
    fn is_map_reduce(&self) -> bool {
        true
    }

    fn is_caught_up(&self, _context: &WorkContext, _highest: Option<Etag>) -> Result<bool> {
        Ok(false)
    }

    fn handle_commit_points(&self, _index: &str, _context: &WorkContext, _info: &IndexedItemsInfo) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::core::config::Config;
    use crate::storage::accessor::InMemoryStorage;
    use crate::storage::layout::IndexStorage;

    fn context(storage: Arc<InMemoryStorage>) -> WorkContext {
        let config = Config::default();
        let index_storage = Arc::new(IndexStorage::in_memory(&config));
        WorkContext::new(config, storage, index_storage)
    }

    #[test]
    fn map_index_is_caught_up_once_it_reaches_the_newest_etag() {
        let storage = Arc::new(InMemoryStorage::new());
        let ctx = context(storage.clone());
        assert!(MapIndexKind.is_caught_up(&ctx, None).unwrap());

        storage.set_most_recent_etag(Etag(10));
        assert!(!MapIndexKind.is_caught_up(&ctx, Some(Etag(9))).unwrap());
        assert!(MapIndexKind.is_caught_up(&ctx, Some(Etag(10))).unwrap());
        assert!(!MapReduceIndexKind.is_caught_up(&ctx, Some(Etag(10))).unwrap());
    }

    #[test]
    fn map_index_records_last_committed_etag() {
        let storage = Arc::new(InMemoryStorage::new());
        let ctx = context(storage.clone());

        MapIndexKind
            .handle_commit_points("Users", &ctx, &IndexedItemsInfo::new(0, Some(Etag(3))))
            .unwrap();
        assert!(storage.state().last_committed.is_empty());

        MapIndexKind
            .handle_commit_points("Users", &ctx, &IndexedItemsInfo::new(2, Some(Etag(7))))
            .unwrap();
        assert_eq!(storage.state().last_committed["Users"], Etag(7));
    }
}
