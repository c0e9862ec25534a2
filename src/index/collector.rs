use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreDoc {
    pub doc: u32,
    pub score: f32,
}

/// Ranked window of a search plus the total number of matches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopDocs {
    pub total_hits: usize,
    pub score_docs: Vec<ScoreDoc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortKind {
    Score,
    String,
    Numeric,
    /// Stable pseudo-random order derived from the seed.
    Random(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortField {
    pub field: String,
    pub kind: SortKind,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sort {
    pub fields: Vec<SortField>,
}

/// Receives every matching document of a search, in document order.
pub trait Collector {
    fn collect(&mut self, doc: u32, score: f32);
}

/// Keeps every hit, unsorted.
#[derive(Debug, Default)]
pub struct GatherAllCollector {
    hits: Vec<ScoreDoc>,
}

impl GatherAllCollector {
    pub fn new() -> Self {
        GatherAllCollector::default()
    }

    pub fn into_top_docs(self) -> TopDocs {
        TopDocs {
            total_hits: self.hits.len(),
            score_docs: self.hits,
        }
    }
}

impl Collector for GatherAllCollector {
    fn collect(&mut self, doc: u32, score: f32) {
        self.hits.push(ScoreDoc { doc, score });
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubQueryResult {
    pub doc: u32,
    pub score: f32,
    pub count: usize,
    rank: usize,
}

/// Counts, per candidate of a base result set, how many clauses matched it.
///
/// Candidates start at a count of one (the base clause). Hits outside the base set are ignored.
#[derive(Debug)]
pub struct IntersectionCollector {
    documents: HashMap<u32, SubQueryResult>,
}

impl IntersectionCollector {
    pub fn new(base: &[ScoreDoc]) -> Self {
        let documents = base
            .iter()
            .enumerate()
            .map(|(rank, sd)| (sd.doc, SubQueryResult { doc: sd.doc, score: sd.score, count: 1, rank }))
            .collect();
        IntersectionCollector { documents }
    }

    /// Candidates matched by exactly `count` clauses, best score first; base rank breaks ties.
    pub fn documents_for_count(&self, count: usize) -> Vec<SubQueryResult> {
        let mut matches: Vec<SubQueryResult> = self
            .documents
            .values()
            .filter(|r| r.count == count)
            .copied()
            .collect();
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.rank.cmp(&b.rank))
        });
        matches
    }
}

impl Collector for IntersectionCollector {
    fn collect(&mut self, doc: u32, score: f32) {
        if let Some(result) = self.documents.get_mut(&doc) {
            result.count += 1;
            result.score += score;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_counts_clause_matches() {
        let base = vec![
            ScoreDoc { doc: 4, score: 1.0 },
            ScoreDoc { doc: 1, score: 1.0 },
            ScoreDoc { doc: 9, score: 1.0 },
        ];
        let mut collector = IntersectionCollector::new(&base);
        for doc in [1, 4, 7] {
            collector.collect(doc, 1.0);
        }
        collector.collect(4, 1.0);
        collector.collect(1, 1.0);

        let both: Vec<u32> = collector.documents_for_count(3).iter().map(|r| r.doc).collect();
        assert_eq!(both, vec![4, 1]);
        assert!(collector.documents_for_count(2).is_empty());
        assert_eq!(collector.documents_for_count(1)[0].doc, 9);
    }
}
