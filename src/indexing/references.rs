use std::collections::{BTreeMap, HashSet};
use chrono::Utc;
use crate::core::error::Result;
use crate::indexing::index::Index;
use crate::storage::accessor::{StorageActions, Task};

/// Referencing document key to the keys of the documents it loaded while being indexed.
pub type References = BTreeMap<String, HashSet<String>>;

impl Index {
    /// Records which documents each indexed document loaded, and queues a re-index of the
    /// ones that loaded documents that did not exist.
    ///
    /// Keys marked do-not-touch-again for this index are left out of the task, once.
    pub fn update_document_references(
        &self,
        actions: &mut dyn StorageActions,
        all_referenced: &[References],
        missing_references: &[References],
    ) -> Result<()> {
        for (key, referenced) in all_referenced.iter().flatten() {
            actions.update_document_references(self.name(), key, referenced)?;
            actions.maybe_pulse_transaction()?;
        }

        let mut missing: BTreeMap<String, HashSet<String>> = BTreeMap::new();
        for (key, referenced) in missing_references.iter().flatten() {
            if self.context().take_do_not_touch_again(self.name(), key) {
                continue;
            }
            missing.entry(key.to_lowercase()).or_default().extend(referenced.iter().cloned());
        }

        if missing.is_empty() {
            return Ok(());
        }
        actions.add_task(Task::TouchMissingReferences {
            index: self.name().to_string(),
            missing_references: missing,
            added_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::core::config::Config;
    use crate::core::context::WorkContext;
    use crate::indexing::view_generator::SimpleViewGenerator;
    use crate::schema::definition::IndexDefinition;
    use crate::storage::accessor::StorageState;
    use crate::storage::accessor::InMemoryStorage;
    use crate::storage::layout::IndexStorage;

    fn refs(pairs: &[(&str, &[&str])]) -> References {
        pairs
            .iter()
            .map(|(key, loaded)| (key.to_string(), loaded.iter().map(|k| k.to_string()).collect()))
            .collect()
    }

    #[test]
    fn references_are_stored_and_missing_ones_queued() {
        let config = Config { run_in_memory: true, ..Config::default() };
        let context = WorkContext::new(config.clone(), Arc::new(InMemoryStorage::new()), Arc::new(IndexStorage::in_memory(&config)));
        context.mark_do_not_touch_again("Orders", "orders/3");
        let index = Index::new(
            IndexDefinition::new("Orders"),
            Arc::new(SimpleViewGenerator::projecting(&["Customer"])),
            Arc::new(context),
        )
        .unwrap();

        let mut state = StorageState::default();
        index
            .update_document_references(
                &mut state,
                &[refs(&[("orders/1", &["customers/1"]), ("orders/2", &["customers/2"])])],
                &[refs(&[("Orders/1", &["customers/9"]), ("orders/3", &["customers/7"])]), refs(&[("orders/1", &["customers/8"])])],
            )
            .unwrap();

        assert_eq!(state.references["Orders"].len(), 2);
        assert_eq!(state.pulses, 2);
        assert_eq!(state.tasks.len(), 1);
        let Task::TouchMissingReferences { missing_references, .. } = &state.tasks[0];
        assert_eq!(missing_references.len(), 1);
        assert_eq!(missing_references["orders/1"].len(), 2);
    }
}
