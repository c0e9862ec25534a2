use std::collections::BTreeMap;
use crate::core::types::IndexDocument;
use crate::search::projection::{FieldsToFetch, Projection, create_document_from_fields};

/// One accepted hit of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexQueryResult {
    /// Source document key; absent for entries without a document id (reduce results).
    pub key: Option<String>,
    pub score: f32,
    pub projection: Option<Projection>,
    pub highlightings: BTreeMap<String, Vec<String>>,
}

impl IndexQueryResult {
    /// Projection is only materialized for projecting or fetch-all queries.
    pub fn from_document(document: &IndexDocument, fields_to_fetch: &FieldsToFetch, score: f32) -> Self {
        let projection = (fields_to_fetch.is_projection() || fields_to_fetch.fetch_all_stored())
            .then(|| create_document_from_fields(document, fields_to_fetch));
        IndexQueryResult {
            key: document.key().map(String::from),
            score,
            projection,
            highlightings: BTreeMap::new(),
        }
    }
}

/// Accepted results of one query page plus paging bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResults {
    pub results: Vec<IndexQueryResult>,
    /// Total hits reported by the index; an approximation for intersection queries.
    pub total_size: usize,
    /// Candidates dropped by duplicate, distinct or caller filtering.
    pub skipped_results: usize,
}

impl QueryResults {
    pub fn keys(&self) -> Vec<&str> {
        self.results.iter().filter_map(|r| r.key.as_deref()).collect()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Field;

    #[test]
    fn whole_document_results_carry_no_projection() {
        let doc = IndexDocument::for_key("users/1").with(Field::text("Name", "Oren"));

        let plain = IndexQueryResult::from_document(&doc, &FieldsToFetch::none(), 1.5);
        assert_eq!(plain.key.as_deref(), Some("users/1"));
        assert!(plain.projection.is_none());

        let projected = IndexQueryResult::from_document(&doc, &FieldsToFetch::new(&["Name"], false), 1.5);
        assert_eq!(projected.projection.unwrap()["Name"].as_str(), Some("Oren"));
    }
}
