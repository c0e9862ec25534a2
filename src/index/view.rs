use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use roaring::RoaringBitmap;
use serde_json::{Map, Value};
use crate::core::error::Result;
use crate::core::types::IndexDocument;
use crate::index::collector::{Collector, ScoreDoc, Sort, SortField, SortKind, TopDocs};
use crate::query::ast::Query;
use crate::query::matcher;
use crate::storage::commit::CommitPoint;
use crate::storage::directory::Directory;
use crate::storage::segment::{SegmentData, SegmentDoc, read_segment};

#[derive(Debug, Clone)]
pub(crate) struct ViewSegment {
    pub data: Arc<SegmentData>,
    pub deleted: RoaringBitmap,
    pub base: u32,
}

/// Immutable point-in-time searcher over a set of segments.
///
/// Document ids are global: a segment's local ids are offset by the doc count of the
/// segments before it.
#[derive(Debug, Clone)]
pub struct IndexView {
    segments: Vec<ViewSegment>,
    max_doc: u32,
    generation: u64,
}

impl IndexView {
    pub fn empty() -> Self {
        IndexView {
            segments: Vec::new(),
            max_doc: 0,
            generation: 0,
        }
    }

    pub(crate) fn from_segments(parts: Vec<(Arc<SegmentData>, RoaringBitmap)>, generation: u64) -> Self {
        let mut base = 0u32;
        let mut segments = Vec::with_capacity(parts.len());
        for (data, deleted) in parts {
            let count = data.docs.len() as u32;
            segments.push(ViewSegment { data, deleted, base });
            base += count;
        }
        IndexView {
            segments,
            max_doc: base,
            generation,
        }
    }

    /// Opens the last commit of `dir`; an uncommitted directory yields an empty view.
    pub fn open(dir: &dyn Directory) -> Result<Self> {
        let Some(commit) = CommitPoint::load_latest(dir)? else {
            return Ok(IndexView::empty());
        };

        let mut parts = Vec::with_capacity(commit.segments.len());
        for info in &commit.segments {
            let data = read_segment(dir, &info.name)?;
            let deleted: RoaringBitmap = info.deleted.iter().copied().collect();
            parts.push((Arc::new(data), deleted));
        }
        Ok(IndexView::from_segments(parts, commit.generation))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn max_doc(&self) -> u32 {
        self.max_doc
    }

    pub fn num_docs(&self) -> u32 {
        self.segments
            .iter()
            .map(|s| s.data.docs.len() as u32 - s.deleted.len() as u32)
            .sum()
    }

    fn locate(&self, doc: u32) -> Option<(&ViewSegment, u32)> {
        let idx = self.segments.partition_point(|s| s.base <= doc);
        let segment = self.segments.get(idx.checked_sub(1)?)?;
        let local = doc - segment.base;
        if (local as usize) < segment.data.docs.len() {
            Some((segment, local))
        } else {
            None
        }
    }

    pub fn is_deleted(&self, doc: u32) -> bool {
        match self.locate(doc) {
            Some((segment, local)) => segment.deleted.contains(local),
            None => true,
        }
    }

    /// Raw entry of a live document.
    pub fn entry(&self, doc: u32) -> Option<&SegmentDoc> {
        let (segment, local) = self.locate(doc)?;
        if segment.deleted.contains(local) {
            return None;
        }
        segment.data.docs.get(local as usize)
    }

    /// Stored fields of a live document.
    pub fn doc(&self, doc: u32) -> Option<&IndexDocument> {
        self.entry(doc).map(|e| &e.stored)
    }

    fn live_docs(&self) -> impl Iterator<Item = (u32, &SegmentDoc)> {
        self.segments.iter().flat_map(|segment| {
            segment
                .data
                .docs
                .iter()
                .enumerate()
                .filter(move |(local, _)| !segment.deleted.contains(*local as u32))
                .map(move |(local, doc)| (segment.base + local as u32, doc))
        })
    }

    /// Feeds every live match to `collector`, in document order. Scans all live documents.
    pub fn search_with(&self, query: &Query, collector: &mut dyn Collector) {
        for (id, doc) in self.live_docs() {
            if let Some(score) = matcher::score(query, doc) {
                collector.collect(id, score);
            }
        }
    }

    /// Top `n` matches by `sort`, or by descending score when `sort` is `None`.
    ///
    /// There are no posting lists: every live document is matched and the full hit list is
    /// sorted, so the cost grows with the index size rather than with `n`.
    pub fn search(&self, query: &Query, n: usize, sort: Option<&Sort>) -> TopDocs {
        let mut hits: Vec<ScoreDoc> = self
            .live_docs()
            .filter_map(|(id, doc)| matcher::score(query, doc).map(|score| ScoreDoc { doc: id, score }))
            .collect();
        let total_hits = hits.len();

        match sort {
            Some(sort) if !sort.fields.is_empty() => {
                hits.sort_by(|a, b| self.compare(sort, a, b));
            }
            _ => hits.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(Ordering::Equal)
                    .then(a.doc.cmp(&b.doc))
            }),
        }
        hits.truncate(n);

        TopDocs {
            total_hits,
            score_docs: hits,
        }
    }

    fn compare(&self, sort: &Sort, a: &ScoreDoc, b: &ScoreDoc) -> Ordering {
        for field in &sort.fields {
            let ord = self.compare_field(field, a, b);
            let ord = if field.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.doc.cmp(&b.doc)
    }

    fn compare_field(&self, field: &SortField, a: &ScoreDoc, b: &ScoreDoc) -> Ordering {
        match &field.kind {
            // higher scores first in ascending order, matching relevance ordering
            SortKind::Score => b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal),
            SortKind::String => {
                let key = |doc: u32| self.entry(doc).and_then(|e| e.terms(&field.field).first().cloned());
                // documents without a value sort first
                key(a.doc).cmp(&key(b.doc))
            }
            SortKind::Numeric => {
                let key = |doc: u32| self.entry(doc).and_then(|e| e.numerics(&field.field).first().copied());
                match (key(a.doc), key(b.doc)) {
                    (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
            }
            SortKind::Random(seed) => {
                let key = |doc: u32| {
                    let mut hasher = DefaultHasher::new();
                    (seed, doc).hash(&mut hasher);
                    hasher.finish()
                };
                key(a.doc).cmp(&key(b.doc))
            }
        }
    }

    /// Per-document map of field to indexed term(s); one term is a string, several an array.
    pub fn terms_docs(&self) -> Vec<Value> {
        let mut docs = vec![Value::Object(Map::new()); self.max_doc as usize];
        for (id, doc) in self.live_docs() {
            let mut obj = Map::new();
            for (field, terms) in &doc.terms {
                let value = match terms.as_slice() {
                    [single] => Value::String(single.clone()),
                    many => Value::Array(many.iter().cloned().map(Value::String).collect()),
                };
                obj.insert(field.clone(), value);
            }
            docs[id as usize] = Value::Object(obj);
        }
        docs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Field;

    fn entry(key: &str, name: &str, age: f64) -> SegmentDoc {
        let mut doc = SegmentDoc::default();
        doc.stored = IndexDocument::for_key(key).with(Field::text("Name", name));
        doc.terms.insert("__document_id".to_string(), vec![key.to_string()]);
        doc.terms.insert("Name".to_string(), vec![name.to_lowercase()]);
        doc.numerics.insert("Age_Range".to_string(), vec![age]);
        doc
    }

    fn view() -> IndexView {
        let first = SegmentData { docs: vec![entry("users/1", "Oren", 35.0), entry("users/2", "Ayende", 20.0)] };
        let second = SegmentData { docs: vec![entry("users/3", "Arava", 5.0)] };
        let mut deleted = RoaringBitmap::new();
        deleted.insert(1);
        IndexView::from_segments(vec![(Arc::new(first), deleted), (Arc::new(second), RoaringBitmap::new())], 1)
    }

    #[test]
    fn global_ids_span_segments_and_skip_deletes() {
        let view = view();
        assert_eq!(view.max_doc(), 3);
        assert_eq!(view.num_docs(), 2);
        assert!(view.is_deleted(1));
        assert!(view.doc(1).is_none());
        assert_eq!(view.doc(2).and_then(|d| d.key()), Some("users/3"));

        let all = view.search(&Query::MatchAll, 10, None);
        assert_eq!(all.total_hits, 2);
        assert_eq!(all.score_docs.iter().map(|s| s.doc).collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn sorts_by_numeric_and_string_fields() {
        let view = view();
        let by_age = Sort { fields: vec![SortField { field: "Age_Range".into(), kind: SortKind::Numeric, descending: false }] };
        let hits = view.search(&Query::MatchAll, 10, Some(&by_age));
        assert_eq!(hits.score_docs.iter().map(|s| s.doc).collect::<Vec<_>>(), vec![2, 0]);

        let by_name_desc = Sort { fields: vec![SortField { field: "Name".into(), kind: SortKind::String, descending: true }] };
        let hits = view.search(&Query::MatchAll, 1, Some(&by_name_desc));
        assert_eq!(hits.total_hits, 2);
        assert_eq!(hits.score_docs[0].doc, 0);
    }

    #[test]
    fn terms_docs_has_one_slot_per_doc_id() {
        let docs = view().terms_docs();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0]["Name"], Value::String("oren".into()));
        assert!(docs[1].as_object().unwrap().is_empty());
    }
}
