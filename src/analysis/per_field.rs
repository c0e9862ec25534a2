use std::collections::HashMap;
use std::sync::Arc;
use crate::analysis::analyzer::{Analyzer, AnalyzerRegistry};
use crate::core::error::Result;
use crate::core::types::{ALL_FIELDS, IndexDocument};
use crate::schema::definition::{FieldIndexing, IndexDefinition};

/// Default analyzer plus an override table keyed by field name.
#[derive(Debug, Clone)]
pub struct PerFieldAnalyzer {
    default: Arc<Analyzer>,
    fields: HashMap<String, Arc<Analyzer>>,
}

impl PerFieldAnalyzer {
    pub fn new(default: Arc<Analyzer>) -> Self {
        PerFieldAnalyzer {
            default,
            fields: HashMap::new(),
        }
    }

    pub fn add_analyzer(&mut self, field: &str, analyzer: Arc<Analyzer>) {
        self.fields.insert(field.to_string(), analyzer);
    }

    /// Same overrides, different fallback.
    pub fn with_default(mut self, default: Arc<Analyzer>) -> Self {
        self.default = default;
        self
    }

    pub fn default_analyzer(&self) -> &Arc<Analyzer> {
        &self.default
    }

    pub fn analyzer_for(&self, field: &str) -> &Arc<Analyzer> {
        self.fields.get(field).unwrap_or(&self.default)
    }

    pub fn terms(&self, field: &str, text: &str) -> Vec<String> {
        self.analyzer_for(field).terms(text)
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Builds the override table for `definition`.
    ///
    /// `__all_fields` replaces `default`. Named per-field analyzers come next (skipping ones
    /// not usable for querying when `for_querying`). Indexing directives come last:
    /// `NotAnalyzed` always maps to the keyword analyzer, `Analyzed` maps to the standard
    /// analyzer unless the field already has a named analyzer.
    pub fn for_definition(
        definition: &IndexDefinition,
        registry: &AnalyzerRegistry,
        default: Arc<Analyzer>,
        for_querying: bool,
    ) -> Result<PerFieldAnalyzer> {
        let default = match definition.analyzers.get(ALL_FIELDS) {
            Some(name) => registry.create(ALL_FIELDS, name)?,
            None => default,
        };

        let mut wrapper = PerFieldAnalyzer::new(default);
        for (field, name) in &definition.analyzers {
            if field == ALL_FIELDS {
                continue;
            }
            let analyzer = registry.create(field, name)?;
            if for_querying && !analyzer.usable_for_querying {
                continue;
            }
            wrapper.add_analyzer(field, analyzer);
        }

        let mut keyword: Option<Arc<Analyzer>> = None;
        let mut standard: Option<Arc<Analyzer>> = None;
        for (field, indexing) in &definition.indexes {
            match indexing {
                FieldIndexing::NotAnalyzed => {
                    let analyzer = keyword.get_or_insert_with(|| Arc::new(Analyzer::keyword()));
                    wrapper.add_analyzer(field, analyzer.clone());
                }
                FieldIndexing::Analyzed => {
                    if definition.analyzers.contains_key(field) {
                        continue;
                    }
                    let analyzer = standard.get_or_insert_with(|| Arc::new(Analyzer::standard()));
                    wrapper.add_analyzer(field, analyzer.clone());
                }
                FieldIndexing::No | FieldIndexing::Default => {}
            }
        }

        Ok(wrapper)
    }
}

/// Plugin that may swap the analyzer used for one document or one query.
pub trait AnalyzerGenerator: Send + Sync {
    /// `None` keeps `current`.
    fn generate_for_indexing(
        &self,
        _index: &str,
        _document: &IndexDocument,
        _current: &PerFieldAnalyzer,
    ) -> Option<PerFieldAnalyzer> {
        None
    }

    /// Replacement default analyzer for the query; `None` keeps `current`.
    fn generate_for_querying(
        &self,
        _index: &str,
        _query: &str,
        _current: &PerFieldAnalyzer,
    ) -> Option<Arc<Analyzer>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_analyzers_win_over_analyzed_directive() {
        let def = IndexDefinition::new("Posts")
            .analyzer("Title", "SimpleAnalyzer")
            .indexing("Title", FieldIndexing::Analyzed)
            .indexing("Body", FieldIndexing::Analyzed)
            .indexing("Tag", FieldIndexing::NotAnalyzed);
        let registry = AnalyzerRegistry::new();

        let wrapper = PerFieldAnalyzer::for_definition(&def, &registry, Arc::new(Analyzer::lowercase_keyword()), false).unwrap();

        assert_eq!(wrapper.analyzer_for("Title").name, "SimpleAnalyzer");
        assert_eq!(wrapper.analyzer_for("Body").name, "StandardAnalyzer");
        assert_eq!(wrapper.analyzer_for("Tag").name, "KeywordAnalyzer");
        assert_eq!(wrapper.analyzer_for("Other").name, "LowerCaseKeywordAnalyzer");
    }

    #[test]
    fn not_analyzed_directive_overrides_named_analyzer() {
        let def = IndexDefinition::new("Posts")
            .analyzer("Tag", "StandardAnalyzer")
            .indexing("Tag", FieldIndexing::NotAnalyzed);
        let wrapper = PerFieldAnalyzer::for_definition(&def, &AnalyzerRegistry::new(), Arc::new(Analyzer::lowercase_keyword()), false).unwrap();

        assert_eq!(wrapper.analyzer_for("Tag").name, "KeywordAnalyzer");
    }

    #[test]
    fn query_mode_skips_indexing_only_analyzers() {
        let registry = AnalyzerRegistry::new();
        registry.register("IndexOnly", || Analyzer::whitespace().not_for_querying());
        let def = IndexDefinition::new("Posts")
            .analyzer(ALL_FIELDS, "SimpleAnalyzer")
            .analyzer("Body", "IndexOnly");

        let indexing = PerFieldAnalyzer::for_definition(&def, &registry, Arc::new(Analyzer::keyword()), false).unwrap();
        let querying = PerFieldAnalyzer::for_definition(&def, &registry, Arc::new(Analyzer::keyword()), true).unwrap();

        assert_eq!(indexing.analyzer_for("Body").name, "WhitespaceAnalyzer");
        assert_eq!(querying.analyzer_for("Body").name, "SimpleAnalyzer");
        assert_eq!(querying.default_analyzer().name, "SimpleAnalyzer");
    }
}
