use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use crate::core::types::{ALL_FIELDS, FieldIndex};

/// How a field's text reaches the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldIndexing {
    No,
    Analyzed,
    NotAnalyzed,
    Default,
}

impl FieldIndexing {
    pub fn to_field_index(self) -> FieldIndex {
        match self {
            FieldIndexing::No => FieldIndex::No,
            FieldIndexing::NotAnalyzed => FieldIndex::NotAnalyzed,
            FieldIndexing::Analyzed | FieldIndexing::Default => FieldIndex::Analyzed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldStorage {
    Yes,
    No,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOptions {
    String,
    Numeric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexingPriority {
    Normal,
    Idle,
    Disabled,
    Abandoned,
    Error,
    Forced,
}

impl Default for IndexingPriority {
    fn default() -> Self {
        IndexingPriority::Normal
    }
}

/// Field-level rules of one named index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub is_map_reduce: bool,
    /// Field name (or `__all_fields`) to analyzer name.
    pub analyzers: BTreeMap<String, String>,
    pub indexes: BTreeMap<String, FieldIndexing>,
    pub stores: BTreeMap<String, FieldStorage>,
    pub sort_options: BTreeMap<String, SortOptions>,
}

impl IndexDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        IndexDefinition {
            name: name.into(),
            is_map_reduce: false,
            analyzers: BTreeMap::new(),
            indexes: BTreeMap::new(),
            stores: BTreeMap::new(),
            sort_options: BTreeMap::new(),
        }
    }

    pub fn map_reduce(mut self) -> Self {
        self.is_map_reduce = true;
        self
    }

    pub fn analyzer(mut self, field: &str, analyzer: &str) -> Self {
        self.analyzers.insert(field.to_string(), analyzer.to_string());
        self
    }

    pub fn indexing(mut self, field: &str, indexing: FieldIndexing) -> Self {
        self.indexes.insert(field.to_string(), indexing);
        self
    }

    pub fn store(mut self, field: &str, storage: FieldStorage) -> Self {
        self.stores.insert(field.to_string(), storage);
        self
    }

    pub fn sort(mut self, field: &str, options: SortOptions) -> Self {
        self.sort_options.insert(field.to_string(), options);
        self
    }

    pub fn field_indexing(&self, field: &str) -> FieldIndexing {
        self.indexes
            .get(field)
            .or_else(|| self.indexes.get(ALL_FIELDS))
            .copied()
            .unwrap_or(FieldIndexing::Default)
    }

    /// Fields are not stored unless the definition says so, directly or via `__all_fields`.
    pub fn is_stored(&self, field: &str) -> bool {
        let storage = self.stores
            .get(field)
            .or_else(|| self.stores.get(ALL_FIELDS))
            .copied()
            .unwrap_or(FieldStorage::No);
        storage == FieldStorage::Yes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_fields_entries_apply_as_fallback() {
        let def = IndexDefinition::new("Users")
            .store(ALL_FIELDS, FieldStorage::Yes)
            .store("Password", FieldStorage::No)
            .indexing("Email", FieldIndexing::NotAnalyzed);

        assert!(def.is_stored("Name"));
        assert!(!def.is_stored("Password"));
        assert_eq!(def.field_indexing("Email"), FieldIndexing::NotAnalyzed);
        assert_eq!(def.field_indexing("Name"), FieldIndexing::Default);
    }
}
