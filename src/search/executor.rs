use serde_json::Value;
use tracing::debug;
use crate::core::context::CancellationToken;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{INTERSECT_SEPARATOR, RANGE_SUFFIX};
use crate::index::collector::{GatherAllCollector, IntersectionCollector, Sort, TopDocs};
use crate::index::view::IndexView;
use crate::indexing::index::Index;
use crate::query::ast::{BoolQuery, Query};
use crate::query::highlight::{Highlighter, SimpleHighlighter};
use crate::query::trigger::apply_triggers;
use crate::query::types::IndexQuery;
use crate::query::validator::assert_query_does_not_contain_fields_that_are_not_indexed;
use crate::search::duplicates::{DuplicateDocumentRecorder, SeenState};
use crate::search::projection::{FieldsToFetch, ProjectedValue, Projection, distinct_key};
use crate::search::results::{IndexQueryResult, QueryResults};

/// Raw index entries of a query page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexEntries {
    pub entries: Vec<Value>,
    pub total_results: usize,
}

/// One query against one index.
pub struct IndexQueryOperation<'a> {
    index: &'a Index,
    options: IndexQuery,
    should_include: &'a dyn Fn(&IndexQueryResult) -> bool,
    fields_to_fetch: FieldsToFetch,
    cancellation: CancellationToken,
    seen: SeenState,
}

impl<'a> IndexQueryOperation<'a> {
    pub fn new(
        index: &'a Index,
        options: IndexQuery,
        fields_to_fetch: FieldsToFetch,
        should_include: &'a dyn Fn(&IndexQueryResult) -> bool,
    ) -> Self {
        IndexQueryOperation {
            index,
            options,
            should_include,
            fields_to_fetch,
            cancellation: index.context().cancellation.clone(),
            seen: SeenState::default(),
        }
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    fn is_projection_or_map_reduce(&self) -> bool {
        self.index.is_map_reduce() || self.fields_to_fetch.is_projection()
    }

    fn assert_fields_indexed(&self) -> Result<()> {
        assert_query_does_not_contain_fields_that_are_not_indexed(
            &self.options,
            self.index.query_builder().as_ref(),
            self.index.view_generator().as_ref(),
        )
    }

    /// Runs an ordinary paged query.
    pub fn query(&mut self) -> Result<QueryResults> {
        self.index.mark_queried();
        self.assert_fields_indexed()?;
        let searcher = self.index.searcher()?;
        let query = self.structured_query()?;
        let sort = self.options.get_sort(self.index.definition());
        let highlighter = (!self.options.highlighted_fields.is_empty()).then(|| {
            SimpleHighlighter::new(&self.options.highlighter_pre_tags, &self.options.highlighter_post_tags)
        });

        let requested = self.options.page_size;
        let mut start = self.options.start;
        let mut page_size = requested;
        let mut returned = 0usize;
        let mut skipped_in_loop = 0usize;
        let mut adjust_start = true;
        let mut results = QueryResults::default();

        let fields_to_fetch = self.fields_to_fetch.clone();
        let mut recorder = DuplicateDocumentRecorder::new(&fields_to_fetch, self.is_projection_or_map_reduce());

        loop {
            if skipped_in_loop > 0 {
                // undo the start adjustment, then guess how many more hits fill the page
                start = self.options.start.saturating_add(page_size);
                page_size = skipped_in_loop.max(2).saturating_mul(page_size);
                skipped_in_loop = 0;
            }

            let search = loop {
                self.cancellation.check()?;
                let search = execute_query(&searcher, &query, start, page_size, sort.as_ref());
                let more = recorder.record(&searcher, &search, adjust_start, &mut start, &mut self.seen);
                page_size = page_size.saturating_add(more.saturating_mul(2));
                if more == 0 {
                    break search;
                }
            };
            results.total_size = search.total_hits;
            adjust_start = false;

            let mut i = start;
            while i < search.score_docs.len() && i - start < page_size {
                let hit = search.score_docs[i];
                i += 1;
                let Some(document) = searcher.doc(hit.doc) else {
                    skipped_in_loop += 1;
                    continue;
                };
                let mut result = IndexQueryResult::from_document(document, &fields_to_fetch, hit.score);
                if !self.should_include_in_results(&result) {
                    results.skipped_results += 1;
                    skipped_in_loop += 1;
                    continue;
                }

                if let Some(highlighter) = &highlighter {
                    self.add_highlights(highlighter, &query, &searcher, hit.doc, &mut result);
                }
                results.results.push(result);
                returned += 1;
                if returned == requested {
                    return Ok(results);
                }
            }

            let read_all = search.total_hits == search.score_docs.len();
            if returned >= requested || read_all {
                break;
            }
        }
        Ok(results)
    }

    /// Runs `clause INTERSECT clause [INTERSECT clause...]`.
    ///
    /// The reported total is the first clause's hit count, not the size of the intersection.
    pub fn intersection_query(&mut self) -> Result<QueryResults> {
        self.assert_fields_indexed()?;
        let searcher = self.index.searcher()?;

        let clauses: Vec<String> = self
            .options
            .query
            .split(INTERSECT_SEPARATOR)
            .filter(|c| !c.is_empty())
            .map(String::from)
            .collect();
        if clauses.len() <= 1 {
            return Err(Error::new(
                ErrorKind::InvalidQuery,
                "Invalid INTERSECT query, must have multiple intersect clauses.",
            ));
        }

        let sort = self.options.get_sort(self.index.definition());
        let mut page_size_guess = self.options.start.saturating_add(self.options.page_size).saturating_mul(2);
        let mut intersect_matches;
        let mut skipped_in_loop = 0usize;
        let mut previous_base_matches = 0usize;

        let base = self.clause_query(&clauses[0])?;
        let mut search = execute_query(&searcher, &base, 0, page_size_guess, sort.as_ref());
        let mut current_base_matches = search.score_docs.len();
        let mut collector = IntersectionCollector::new(&search.score_docs);

        let others = clauses[1..]
            .iter()
            .map(|clause| self.clause_query(clause))
            .collect::<Result<Vec<_>>>()?;

        loop {
            self.cancellation.check()?;
            if skipped_in_loop > 0 {
                page_size_guess = page_size_guess.saturating_mul(2);
                search = execute_query(&searcher, &base, 0, page_size_guess, sort.as_ref());
                previous_base_matches = current_base_matches;
                current_base_matches = search.score_docs.len();
                collector = IntersectionCollector::new(&search.score_docs);
            }

            for clause in &others {
                searcher.search_with(clause, &mut collector);
            }

            intersect_matches = collector.documents_for_count(clauses.len()).len();
            skipped_in_loop = page_size_guess.saturating_sub(intersect_matches);

            let keep_going = intersect_matches < self.options.page_size
                && current_base_matches < search.total_hits
                && previous_base_matches < current_base_matches;
            if !keep_going {
                break;
            }
        }

        let matches = collector.documents_for_count(clauses.len());
        let mut results = QueryResults {
            results: Vec::new(),
            total_size: search.total_hits,
            skipped_results: skipped_in_loop,
        };

        let fields_to_fetch = self.fields_to_fetch.clone();
        let start = self.options.start;
        let mut i = start;
        while i < matches.len() && i - start < page_size_guess {
            let hit = matches[i];
            i += 1;
            let Some(document) = searcher.doc(hit.doc) else {
                continue;
            };
            let result = IndexQueryResult::from_document(document, &fields_to_fetch, hit.score);
            if !self.should_include_in_results(&result) {
                results.skipped_results += 1;
                continue;
            }
            results.results.push(result);
            if results.results.len() == self.options.page_size {
                break;
            }
        }
        Ok(results)
    }

    /// Indexed terms per hit instead of stored documents; numeric range companions are dropped.
    pub fn index_entries(&mut self) -> Result<IndexEntries> {
        self.index.mark_queried();
        self.assert_fields_indexed()?;
        let (searcher, terms_docs) = self.index.searcher_and_terms_docs()?;
        let query = self.structured_query()?;
        let sort = self.options.get_sort(self.index.definition());

        let search = execute_query(&searcher, &query, self.options.start, self.options.page_size, sort.as_ref());
        let entries = search
            .score_docs
            .iter()
            .skip(self.options.start)
            .map(|hit| {
                let mut entry = terms_docs.get(hit.doc as usize).cloned().unwrap_or(Value::Null);
                if let Value::Object(fields) = &mut entry {
                    fields.retain(|name, _| !name.ends_with(RANGE_SUFFIX));
                }
                entry
            })
            .collect();

        Ok(IndexEntries {
            entries,
            total_results: search.total_hits,
        })
    }

    fn should_include_in_results(&mut self, result: &IndexQueryResult) -> bool {
        if !(self.should_include)(result) {
            return false;
        }
        if let Some(key) = &result.key {
            if self.seen.keys.contains(key) {
                return false;
            }
        }
        if self.fields_to_fetch.is_distinct_query() {
            let projection = result.projection.as_ref().map(distinct_key).unwrap_or_default();
            if !self.seen.projections.insert(projection) {
                return false;
            }
        }
        // one source document may produce several entries
        if !self.is_projection_or_map_reduce() {
            if let Some(key) = &result.key {
                self.seen.keys.insert(key.clone());
            }
        }
        true
    }

    fn add_highlights(
        &self,
        highlighter: &SimpleHighlighter,
        query: &Query,
        view: &IndexView,
        doc: u32,
        result: &mut IndexQueryResult,
    ) {
        let highlightings: Vec<_> = self
            .options
            .highlighted_fields
            .iter()
            .filter_map(|field| {
                highlighter
                    .fragments(query, view, doc, &field.field, field.fragment_length, field.fragment_count)
                    .filter(|fragments| !fragments.is_empty())
                    .map(|fragments| (field, fragments))
            })
            .collect();

        if self.is_projection_or_map_reduce() {
            for (field, fragments) in highlightings {
                let Some(target) = field.fragments_field.as_deref().filter(|f| !f.is_empty()) else {
                    continue;
                };
                let fragments = ProjectedValue::Array(fragments.into_iter().map(ProjectedValue::String).collect());
                result
                    .projection
                    .get_or_insert_with(Projection::new)
                    .insert(target.to_string(), fragments);
            }
        } else {
            result.highlightings = highlightings
                .into_iter()
                .map(|(field, fragments)| (field.field.clone(), fragments))
                .collect();
        }
    }

    /// The main clause, AND-ed with the spatial clause when one is requested.
    fn structured_query(&self) -> Result<Query> {
        let query = self.clause_query(&self.options.query)?;
        let Some(spatial) = &self.options.spatial else {
            return Ok(query);
        };

        let field = self
            .index
            .view_generator()
            .spatial_field(&spatial.spatial_field_name)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidArgument,
                    format!(
                        "Could not find spatial field '{}' on index {}",
                        spatial.spatial_field_name,
                        self.index.name()
                    ),
                )
            })?;
        let spatial_query = field.make_query(spatial)?;
        if query.is_match_all() {
            return Ok(spatial_query);
        }
        Ok(Query::Bool(BoolQuery::new().with_must(query).with_must(spatial_query)))
    }

    fn clause_query(&self, text: &str) -> Result<Query> {
        let index = self.index.name();
        let query = if text.trim().is_empty() {
            debug!(target: "docdex::querying", index, "issuing query for all documents");
            Query::MatchAll
        } else {
            debug!(target: "docdex::querying", index, "issuing query for: {}", text);
            let analyzer = self.index.query_analyzer(&self.options.query)?;
            self.index.query_builder().build(text, &self.options, &analyzer)?
        };
        Ok(apply_triggers(self.index.query_triggers(), index, query, &self.options))
    }
}

/// Top `start + page_size` hits; every hit, unsorted, when all are requested without a sort.
fn execute_query(view: &IndexView, query: &Query, start: usize, page_size: usize, sort: Option<&Sort>) -> TopDocs {
    if page_size == usize::MAX && sort.is_none() {
        let mut collector = GatherAllCollector::new();
        view.search_with(query, &mut collector);
        return collector.into_top_docs();
    }
    let min_page_size = start.saturating_add(page_size).max(1);
    view.search(query, min_page_size, sort)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use roaring::RoaringBitmap;
    use crate::core::types::{Field, IndexDocument};
    use crate::storage::segment::{SegmentData, SegmentDoc};

    fn view(n: usize) -> IndexView {
        let docs = (0..n)
            .map(|i| {
                let mut doc = SegmentDoc::default();
                doc.stored = IndexDocument::for_key(format!("docs/{}", i)).with(Field::keyword("N", i.to_string()));
                doc.terms.insert("N".into(), vec![i.to_string()]);
                doc
            })
            .collect();
        IndexView::from_segments(vec![(Arc::new(SegmentData { docs }), RoaringBitmap::new())], 1)
    }

    #[test]
    fn window_covers_start_plus_page_size() {
        let view = view(10);
        let hits = execute_query(&view, &Query::MatchAll, 3, 4, None);
        assert_eq!(hits.total_hits, 10);
        assert_eq!(hits.score_docs.len(), 7);

        let empty_page = execute_query(&view, &Query::MatchAll, 0, 0, None);
        assert_eq!(empty_page.score_docs.len(), 1);
    }

    #[test]
    fn unbounded_unsorted_query_gathers_everything() {
        let view = view(10);
        let hits = execute_query(&view, &Query::MatchAll, 5, usize::MAX, None);
        assert_eq!(hits.total_hits, 10);
        assert_eq!(hits.score_docs.len(), 10);

        let saturated = execute_query(&view, &Query::MatchAll, usize::MAX, 5, None);
        assert_eq!(saturated.score_docs.len(), 10);
    }
}
