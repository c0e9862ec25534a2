use unicode_segmentation::UnicodeSegmentation;
use crate::index::view::IndexView;
use crate::query::ast::Query;

pub const DEFAULT_PRE_TAGS: [&str; 3] = [
    "<b style=\"background:yellow\">",
    "<b style=\"background:lawngreen\">",
    "<b style=\"background:aquamarine\">",
];
pub const DEFAULT_POST_TAGS: [&str; 1] = ["</b>"];

/// Produces highlighted fragments of one stored field of one hit.
pub trait Highlighter: Send + Sync {
    fn fragments(
        &self,
        query: &Query,
        view: &IndexView,
        doc: u32,
        field: &str,
        fragment_length: usize,
        fragment_count: usize,
    ) -> Option<Vec<String>>;
}

/// Marks words of the stored text that match the query's terms on that field.
#[derive(Debug, Clone)]
pub struct SimpleHighlighter {
    pre_tags: Vec<String>,
    post_tags: Vec<String>,
}

impl SimpleHighlighter {
    /// Empty tag lists fall back to the colored defaults.
    pub fn new(pre_tags: &[String], post_tags: &[String]) -> Self {
        let or_default = |tags: &[String], defaults: &[&str]| {
            if tags.is_empty() {
                defaults.iter().map(|t| t.to_string()).collect()
            } else {
                tags.to_vec()
            }
        };
        SimpleHighlighter {
            pre_tags: or_default(pre_tags, &DEFAULT_PRE_TAGS),
            post_tags: or_default(post_tags, &DEFAULT_POST_TAGS),
        }
    }
}

impl Default for SimpleHighlighter {
    fn default() -> Self {
        SimpleHighlighter::new(&[], &[])
    }
}

struct Hit {
    start: usize,
    end: usize,
    term: usize,
}

fn term_matches(term: &str, word: &str) -> bool {
    match term.strip_suffix('*') {
        Some(prefix) => word.starts_with(prefix),
        None => term == word,
    }
}

fn floor_boundary(text: &str, mut i: usize) -> usize {
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_boundary(text: &str, mut i: usize) -> usize {
    while i < text.len() && !text.is_char_boundary(i) {
        i += 1;
    }
    i.min(text.len())
}

impl Highlighter for SimpleHighlighter {
    fn fragments(
        &self,
        query: &Query,
        view: &IndexView,
        doc: u32,
        field: &str,
        fragment_length: usize,
        fragment_count: usize,
    ) -> Option<Vec<String>> {
        let terms: Vec<String> = query
            .positive_terms()
            .into_iter()
            .filter(|(f, _)| f == field)
            .map(|(_, t)| t.to_lowercase())
            .collect();
        if terms.is_empty() || fragment_count == 0 {
            return None;
        }

        let stored = view.doc(doc)?;
        let text = stored
            .get_fields(field)
            .filter_map(|f| f.value.as_text())
            .collect::<Vec<_>>()
            .join(" ");

        let hits: Vec<Hit> = text
            .unicode_word_indices()
            .filter_map(|(start, word)| {
                let lower = word.to_lowercase();
                terms
                    .iter()
                    .position(|t| term_matches(t, &lower))
                    .map(|term| Hit { start, end: start + word.len(), term })
            })
            .collect();
        if hits.is_empty() {
            return None;
        }

        let mut fragments = Vec::new();
        let mut i = 0;
        while i < hits.len() && fragments.len() < fragment_count {
            let first = &hits[i];
            let start = floor_boundary(&text, first.start.saturating_sub(fragment_length / 4));
            let end = ceil_boundary(&text, (start + fragment_length).max(first.end));

            let mut fragment = String::new();
            let mut cursor = start;
            while i < hits.len() && hits[i].end <= end {
                let hit = &hits[i];
                fragment.push_str(&text[cursor..hit.start]);
                fragment.push_str(&self.pre_tags[hit.term % self.pre_tags.len()]);
                fragment.push_str(&text[hit.start..hit.end]);
                fragment.push_str(&self.post_tags[hit.term % self.post_tags.len()]);
                cursor = hit.end;
                i += 1;
            }
            fragment.push_str(&text[cursor..end]);
            fragments.push(fragment.trim().to_string());
        }
        Some(fragments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use roaring::RoaringBitmap;
    use crate::core::types::{Field, IndexDocument};
    use crate::storage::segment::{SegmentData, SegmentDoc};

    fn view(body: &str) -> IndexView {
        let mut doc = SegmentDoc::default();
        doc.stored = IndexDocument::for_key("posts/1").with(Field::text("Body", body));
        IndexView::from_segments(vec![(Arc::new(SegmentData { docs: vec![doc] }), RoaringBitmap::new())], 1)
    }

    #[test]
    fn wraps_matching_words_in_tags() {
        let highlighter = SimpleHighlighter::new(&["[".to_string()], &["]".to_string()]);
        let fragments = highlighter
            .fragments(&Query::term("Body", "fox"), &view("The quick brown Fox jumps"), 0, "Body", 100, 1)
            .unwrap();
        assert_eq!(fragments, vec!["The quick brown [Fox] jumps".to_string()]);
    }

    #[test]
    fn splits_distant_hits_into_fragments() {
        let body = format!("rust {} rust", "filler ".repeat(20));
        let fragments = SimpleHighlighter::new(&["<".into()], &[">".into()])
            .fragments(&Query::term("Body", "rust"), &view(&body), 0, "Body", 20, 5)
            .unwrap();
        assert_eq!(fragments.len(), 2);
        assert!(fragments.iter().all(|f| f.contains("<rust>")));
    }

    #[test]
    fn no_fragments_without_matches() {
        let highlighter = SimpleHighlighter::default();
        assert!(highlighter.fragments(&Query::term("Body", "cat"), &view("dog"), 0, "Body", 50, 1).is_none());
        assert!(highlighter.fragments(&Query::term("Title", "dog"), &view("dog"), 0, "Body", 50, 1).is_none());
    }
}
