use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};
use serde::{Deserialize, Serialize};
use crate::core::types::{DISTANCE_FIELD_NAME, RANDOM_FIELD_NAME, RANGE_SUFFIX, TEMPORARY_SCORE_VALUE};
use crate::index::collector::{Sort, SortField, SortKind};
use crate::schema::definition::{IndexDefinition, SortOptions};

/// Sort request on one field; a leading `-` in the name means descending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortedField {
    pub field: String,
    pub descending: bool,
}

impl SortedField {
    pub fn new(field: &str) -> Self {
        match field.strip_prefix('-') {
            Some(name) => SortedField { field: name.to_string(), descending: true },
            None => SortedField { field: field.strip_prefix('+').unwrap_or(field).to_string(), descending: false },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightedField {
    pub field: String,
    pub fragment_length: usize,
    pub fragment_count: usize,
    /// Projection field receiving the fragments for projection and map/reduce queries.
    pub fragments_field: Option<String>,
}

impl HighlightedField {
    pub fn new(field: impl Into<String>, fragment_length: usize, fragment_count: usize) -> Self {
        HighlightedField {
            field: field.into(),
            fragment_length,
            fragment_count,
            fragments_field: None,
        }
    }
}

/// Spatial restriction resolved through the view generator's spatial field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialIndexQuery {
    pub spatial_field_name: String,
    pub query_shape: String,
}

/// Query request against one index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexQuery {
    pub query: String,
    pub start: usize,
    /// `usize::MAX` asks for every result.
    pub page_size: usize,
    pub sorted_fields: Vec<SortedField>,
    pub highlighted_fields: Vec<HighlightedField>,
    pub highlighter_pre_tags: Vec<String>,
    pub highlighter_post_tags: Vec<String>,
    /// Field used for terms without an explicit `field:` prefix.
    pub default_field: Option<String>,
    pub spatial: Option<SpatialIndexQuery>,
}

impl Default for IndexQuery {
    fn default() -> Self {
        IndexQuery {
            query: String::new(),
            start: 0,
            page_size: 128,
            sorted_fields: Vec::new(),
            highlighted_fields: Vec::new(),
            highlighter_pre_tags: Vec::new(),
            highlighter_post_tags: Vec::new(),
            default_field: None,
            spatial: None,
        }
    }
}

impl IndexQuery {
    pub fn new(query: impl Into<String>) -> Self {
        IndexQuery {
            query: query.into(),
            ..IndexQuery::default()
        }
    }

    pub fn with_paging(mut self, start: usize, page_size: usize) -> Self {
        self.start = start;
        self.page_size = page_size;
        self
    }

    pub fn sort_by(mut self, field: &str) -> Self {
        self.sorted_fields.push(SortedField::new(field));
        self
    }

    pub fn highlight(mut self, field: HighlightedField) -> Self {
        self.highlighted_fields.push(field);
        self
    }

    pub fn with_default_field(mut self, field: impl Into<String>) -> Self {
        self.default_field = Some(field.into());
        self
    }

    pub fn with_spatial(mut self, spatial: SpatialIndexQuery) -> Self {
        self.spatial = Some(spatial);
        self
    }

    /// Sort for the requested fields, `None` for relevance order.
    pub fn get_sort(&self, definition: &IndexDefinition) -> Option<Sort> {
        let fields: Vec<SortField> = self
            .sorted_fields
            .iter()
            .filter_map(|sorted| sort_field(sorted, definition))
            .collect();
        if fields.is_empty() {
            None
        } else {
            Some(Sort { fields })
        }
    }
}

fn sort_field(sorted: &SortedField, definition: &IndexDefinition) -> Option<SortField> {
    let field = sorted.field.as_str();
    let descending = sorted.descending;

    if field == TEMPORARY_SCORE_VALUE {
        return Some(SortField { field: field.to_string(), kind: SortKind::Score, descending });
    }
    if field.starts_with(RANDOM_FIELD_NAME) {
        let seed = match field.split_once(';') {
            Some((_, seed)) if !seed.is_empty() => hash_seed(seed),
            _ => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or_default(),
        };
        return Some(SortField { field: RANDOM_FIELD_NAME.to_string(), kind: SortKind::Random(seed), descending });
    }
    if field == DISTANCE_FIELD_NAME {
        return None;
    }
    if field.ends_with(RANGE_SUFFIX) {
        return Some(SortField { field: field.to_string(), kind: SortKind::Numeric, descending });
    }
    match definition.sort_options.get(field) {
        Some(SortOptions::Numeric) => Some(SortField {
            field: format!("{}{}", field, RANGE_SUFFIX),
            kind: SortKind::Numeric,
            descending,
        }),
        _ => Some(SortField { field: field.to_string(), kind: SortKind::String, descending }),
    }
}

fn hash_seed(seed: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_dash_means_descending() {
        assert_eq!(SortedField::new("-Age"), SortedField { field: "Age".into(), descending: true });
        assert_eq!(SortedField::new("Name"), SortedField { field: "Name".into(), descending: false });
    }

    #[test]
    fn sort_kinds_follow_definition() {
        let def = IndexDefinition::new("Users").sort("Age", SortOptions::Numeric);
        let query = IndexQuery::new("")
            .sort_by("-Age")
            .sort_by("Name")
            .sort_by("Price_Range")
            .sort_by(DISTANCE_FIELD_NAME)
            .sort_by(TEMPORARY_SCORE_VALUE);

        let sort = query.get_sort(&def).unwrap();
        let kinds: Vec<(&str, &SortKind, bool)> = sort.fields.iter().map(|f| (f.field.as_str(), &f.kind, f.descending)).collect();
        assert_eq!(
            kinds,
            vec![
                ("Age_Range", &SortKind::Numeric, true),
                ("Name", &SortKind::String, false),
                ("Price_Range", &SortKind::Numeric, false),
                ("__score", &SortKind::Score, false),
            ]
        );
    }

    #[test]
    fn random_sort_with_seed_is_stable() {
        let def = IndexDefinition::new("Users");
        let a = IndexQuery::new("").sort_by("__random;abc").get_sort(&def).unwrap();
        let b = IndexQuery::new("").sort_by("__random;abc").get_sort(&def).unwrap();
        assert_eq!(a, b);
        assert!(IndexQuery::new("").get_sort(&def).is_none());
    }
}
