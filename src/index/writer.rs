use std::mem;
use std::sync::Arc;
use chrono::Utc;
use roaring::RoaringBitmap;
use tracing::debug;
use crate::analysis::per_field::PerFieldAnalyzer;
use crate::core::error::Result;
use crate::core::types::{FieldIndex, FieldValue, IndexDocument};
use crate::index::view::IndexView;
use crate::storage::commit::{CommitPoint, SegmentInfo};
use crate::storage::deletion_policy::SnapshotDeletionPolicy;
use crate::storage::directory::Directory;
use crate::storage::segment::{SegmentData, SegmentDoc, read_segment, segment_file_name, write_segment};

/// Buffered documents are written out as a segment once this many are pending.
pub const MAX_BUFFERED_DOCS: usize = 10_000;

struct LiveSegment {
    name: String,
    data: Arc<SegmentData>,
    deleted: RoaringBitmap,
}

impl LiveSegment {
    fn live_count(&self) -> usize {
        self.data.docs.len() - self.deleted.len() as usize
    }
}

/// The single mutable writer of an index directory.
///
/// Changes become durable on `commit`; `get_reader` sees uncommitted changes as well.
pub struct IndexWriter {
    directory: Arc<dyn Directory>,
    policy: Arc<SnapshotDeletionPolicy>,
    segments: Vec<LiveSegment>,
    pending: Vec<SegmentDoc>,
    generation: u64,
    next_segment: u64,
    dirty: bool,
}

impl IndexWriter {
    /// Opens the last commit of `directory`, writing an initial empty commit if there is none.
    pub fn open(directory: Arc<dyn Directory>, policy: Arc<SnapshotDeletionPolicy>) -> Result<Self> {
        let commit = match CommitPoint::load_latest(directory.as_ref())? {
            Some(commit) => commit,
            None => {
                let mut initial = CommitPoint::empty();
                initial.generation = 1;
                initial.write(directory.as_ref())?;
                initial
            }
        };

        let mut segments = Vec::with_capacity(commit.segments.len());
        for info in &commit.segments {
            let data = read_segment(directory.as_ref(), &info.name)?;
            segments.push(LiveSegment {
                name: info.name.clone(),
                data: Arc::new(data),
                deleted: info.deleted.iter().copied().collect(),
            });
        }

        let generation = commit.generation;
        let next_segment = commit.next_segment;
        policy.on_commit(directory.as_ref(), commit)?;

        Ok(IndexWriter {
            directory,
            policy,
            segments,
            pending: Vec::new(),
            generation,
            next_segment,
            dirty: false,
        })
    }

    pub fn directory(&self) -> &Arc<dyn Directory> {
        &self.directory
    }

    pub fn deletion_policy(&self) -> &Arc<SnapshotDeletionPolicy> {
        &self.policy
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn add_document(&mut self, doc: &IndexDocument, analyzer: &PerFieldAnalyzer) -> Result<()> {
        self.pending.push(Self::invert(doc, analyzer));
        self.dirty = true;
        if self.pending.len() >= MAX_BUFFERED_DOCS {
            self.flush()?;
        }
        Ok(())
    }

    fn invert(doc: &IndexDocument, analyzer: &PerFieldAnalyzer) -> SegmentDoc {
        let mut entry = SegmentDoc::default();
        for field in &doc.fields {
            if field.stored {
                entry.stored.add(field.clone());
            }
            match (&field.value, field.index) {
                (_, FieldIndex::No) | (FieldValue::Binary(_), _) => {}
                (FieldValue::Number(n), _) => {
                    entry.numerics.entry(field.name.clone()).or_default().push(*n);
                }
                (FieldValue::Text(text), FieldIndex::NotAnalyzed) => {
                    entry.terms.entry(field.name.clone()).or_default().push(text.clone());
                }
                (FieldValue::Text(text), FieldIndex::Analyzed) => {
                    let terms = analyzer.terms(&field.name, text);
                    entry.terms.entry(field.name.clone()).or_default().extend(terms);
                }
            }
        }
        entry
    }

    /// Deletes every document, committed or buffered, indexed with `field:term`.
    pub fn delete_documents(&mut self, field: &str, term: &str) -> Result<usize> {
        let mut deleted = 0;
        for segment in &mut self.segments {
            for (local, doc) in segment.data.docs.iter().enumerate() {
                let local = local as u32;
                if !segment.deleted.contains(local) && doc.has_term(field, term) {
                    segment.deleted.insert(local);
                    deleted += 1;
                }
            }
        }

        let before = self.pending.len();
        self.pending.retain(|doc| !doc.has_term(field, term));
        deleted += before - self.pending.len();

        if deleted > 0 {
            self.dirty = true;
        }
        Ok(deleted)
    }

    /// Writes buffered documents out as a new segment file.
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let name = segment_file_name(self.next_segment);
        self.next_segment += 1;

        let data = SegmentData {
            docs: mem::take(&mut self.pending),
        };
        let size = write_segment(self.directory.as_ref(), &name, &data)?;
        debug!(target: "docdex::indexing", segment = %name, docs = data.docs.len(), size, "flushed segment");

        self.segments.push(LiveSegment {
            name,
            data: Arc::new(data),
            deleted: RoaringBitmap::new(),
        });
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        self.flush()?;
        if !self.dirty {
            return Ok(());
        }

        self.segments.retain(|s| s.live_count() > 0);
        self.generation += 1;
        let commit = CommitPoint {
            generation: self.generation,
            segments: self
                .segments
                .iter()
                .map(|s| SegmentInfo {
                    name: s.name.clone(),
                    doc_count: s.data.docs.len() as u32,
                    deleted: s.deleted.iter().collect(),
                })
                .collect(),
            next_segment: self.next_segment,
            timestamp: Utc::now(),
        };
        commit.write(self.directory.as_ref())?;
        self.policy.on_commit(self.directory.as_ref(), commit)?;
        self.dirty = false;
        Ok(())
    }

    /// Merges every live document into a single segment and commits.
    pub fn optimize(&mut self) -> Result<()> {
        self.flush()?;
        let has_deletes = self.segments.iter().any(|s| !s.deleted.is_empty());
        if self.segments.len() > 1 || has_deletes {
            let mut docs = Vec::new();
            for segment in &self.segments {
                for (local, doc) in segment.data.docs.iter().enumerate() {
                    if !segment.deleted.contains(local as u32) {
                        docs.push(doc.clone());
                    }
                }
            }
            self.segments.clear();
            self.pending = docs;
            self.dirty = true;
        }
        self.commit()
    }

    /// View over the writer's current state, including uncommitted changes.
    pub fn get_reader(&mut self) -> Result<IndexView> {
        self.flush()?;
        let parts = self
            .segments
            .iter()
            .map(|s| (s.data.clone(), s.deleted.clone()))
            .collect();
        Ok(IndexView::from_segments(parts, self.generation))
    }

    pub fn num_docs(&self) -> usize {
        self.segments.iter().map(LiveSegment::live_count).sum::<usize>() + self.pending.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Commits outstanding changes and releases the writer.
    pub fn close(mut self) -> Result<()> {
        self.commit()
    }
}
