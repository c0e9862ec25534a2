use crate::analysis::per_field::PerFieldAnalyzer;
use crate::core::types::IndexDocument;

/// Observer attached to an index, notified after each successful write.
///
/// Extensions receive copies of the written entries and must handle their own synchronization.
pub trait IndexExtension: Send + Sync {
    fn on_documents_indexed(&self, documents: &[IndexDocument], analyzer: &PerFieldAnalyzer);

    fn dispose(&self) {}
}
