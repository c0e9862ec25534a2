use std::collections::HashSet;
use crate::index::collector::TopDocs;
use crate::index::view::IndexView;
use crate::search::projection::{FieldsToFetch, distinct_key};
use crate::search::results::IndexQueryResult;

/// Keys and distinct projections yielded so far by one paged query.
#[derive(Debug, Default)]
pub struct SeenState {
    pub keys: HashSet<String>,
    pub projections: HashSet<String>,
}

/// Tracks which hits before the requested start were already returned on earlier pages.
///
/// Hits that repeat a key (or a projection, for distinct queries) shift the window: the
/// caller has to read that many more candidates to fill the page.
#[derive(Debug)]
pub struct DuplicateDocumentRecorder<'a> {
    min: Option<usize>,
    already_scanned: usize,
    already_scanned_for_distinct: usize,
    skipped: usize,
    is_projection_or_map_reduce: bool,
    fields_to_fetch: &'a FieldsToFetch,
}

impl<'a> DuplicateDocumentRecorder<'a> {
    pub fn new(fields_to_fetch: &'a FieldsToFetch, is_projection_or_map_reduce: bool) -> Self {
        DuplicateDocumentRecorder {
            min: None,
            already_scanned: 0,
            already_scanned_for_distinct: 0,
            skipped: 0,
            is_projection_or_map_reduce,
            fields_to_fetch,
        }
    }

    /// Records hits ahead of `start` and returns how many more candidates the search must fetch.
    ///
    /// A non-zero return means the window was too small (or duplicates were found); the caller
    /// grows its page size and searches again. With `adjust_start`, `start` moves past skipped hits.
    pub fn record(
        &mut self,
        view: &IndexView,
        search: &TopDocs,
        adjust_start: bool,
        start: &mut usize,
        seen: &mut SeenState,
    ) -> usize {
        let total = search.total_hits;
        let mut min = self.min.unwrap_or(*start).min(total);

        if !self.is_projection_or_map_reduce {
            let mut i = self.already_scanned;
            while i < min {
                if i >= search.score_docs.len() {
                    self.already_scanned = i;
                    self.min = Some(min);
                    return min - search.score_docs.len();
                }
                let key = view.doc(search.score_docs[i].doc).and_then(|d| d.key());
                if let Some(key) = key {
                    if !seen.keys.insert(key.to_string()) {
                        min = (min + 1).min(total);
                        self.skipped += 1;
                    }
                }
                i += 1;
            }
            self.already_scanned = min;
        }

        if self.fields_to_fetch.is_distinct_query() {
            let mut i = self.already_scanned_for_distinct;
            while i < min {
                if i >= search.score_docs.len() {
                    self.already_scanned_for_distinct = i;
                    self.min = Some(min);
                    return min - search.score_docs.len();
                }
                let hit = search.score_docs[i];
                if let Some(document) = view.doc(hit.doc) {
                    let result = IndexQueryResult::from_document(document, self.fields_to_fetch, hit.score);
                    let projection = result.projection.unwrap_or_default();
                    // empty projections never count as duplicates
                    if !projection.is_empty() && !seen.projections.insert(distinct_key(&projection)) {
                        min = (min + 1).min(total);
                        self.skipped += 1;
                    }
                }
                i += 1;
            }
            self.already_scanned_for_distinct = min;
        }

        self.min = Some(min);
        let skipped = std::mem::take(&mut self.skipped);
        if adjust_start {
            *start += skipped;
        }
        skipped
    }
}
