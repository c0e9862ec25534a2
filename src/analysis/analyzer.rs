use std::collections::HashMap;
use std::sync::Arc;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rust_stemmers::Algorithm;
use crate::analysis::filter::TokenFilter;
use crate::analysis::filters::lowercase::LowercaseFilter;
use crate::analysis::filters::stemmer::StemmerFilter;
use crate::analysis::filters::stopword::StopWordFilter;
use crate::analysis::token::Token;
use crate::analysis::tokenizer::{KeywordTokenizer, LetterTokenizer, StandardTokenizer, Tokenizer, WhitespaceTokenizer};
use crate::core::error::{Error, ErrorKind, Result};

/// Text analysis pipeline
pub struct Analyzer {
    pub name: String,
    pub tokenizer: Box<dyn Tokenizer>,
    pub filters: Vec<Box<dyn TokenFilter>>,
    /// Cleared for analyzers that only make sense at indexing time.
    pub usable_for_querying: bool,
}

impl Analyzer {
    pub fn new(name: impl Into<String>, tokenizer: Box<dyn Tokenizer>) -> Self {
        Analyzer {
            name: name.into(),
            tokenizer,
            filters: Vec::new(),
            usable_for_querying: true,
        }
    }

    pub fn add_filter(mut self, filter: Box<dyn TokenFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn not_for_querying(mut self) -> Self {
        self.usable_for_querying = false;
        self
    }

    pub fn analyze(&self, text: &str) -> Vec<Token> {
        let mut tokens = self.tokenizer.tokenize(text);

        for filter in &self.filters {
            tokens = filter.filter(tokens);
        }

        tokens
    }

    pub fn terms(&self, text: &str) -> Vec<String> {
        self.analyze(text).into_iter().map(|t| t.text).collect()
    }

    /// Whether terms come out lowercased; query builders fold unanalyzed patterns to match.
    pub fn lowercases(&self) -> bool {
        self.filters.iter().any(|f| f.name() == "lowercase")
    }

    pub fn standard() -> Self {
        Analyzer::new("StandardAnalyzer", Box::new(StandardTokenizer::default()))
            .add_filter(Box::new(LowercaseFilter))
            .add_filter(Box::new(StopWordFilter::english()))
    }

    pub fn keyword() -> Self {
        Analyzer::new("KeywordAnalyzer", Box::new(KeywordTokenizer))
    }

    /// Whole value as one lowercased term; the default for fields without directives.
    pub fn lowercase_keyword() -> Self {
        Analyzer::new("LowerCaseKeywordAnalyzer", Box::new(KeywordTokenizer))
            .add_filter(Box::new(LowercaseFilter))
    }

    pub fn simple() -> Self {
        Analyzer::new("SimpleAnalyzer", Box::new(LetterTokenizer))
            .add_filter(Box::new(LowercaseFilter))
    }

    pub fn whitespace() -> Self {
        Analyzer::new("WhitespaceAnalyzer", Box::new(WhitespaceTokenizer))
    }

    pub fn stop() -> Self {
        Analyzer::new("StopAnalyzer", Box::new(LetterTokenizer))
            .add_filter(Box::new(LowercaseFilter))
            .add_filter(Box::new(StopWordFilter::english()))
    }

    pub fn english() -> Self {
        Analyzer::new("EnglishAnalyzer", Box::new(StandardTokenizer::default()))
            .add_filter(Box::new(LowercaseFilter))
            .add_filter(Box::new(StopWordFilter::english()))
            .add_filter(Box::new(StemmerFilter::new(Algorithm::English)))
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("name", &self.name)
            .field("usable_for_querying", &self.usable_for_querying)
            .finish()
    }
}

type AnalyzerFactory = Arc<dyn Fn() -> Analyzer + Send + Sync>;

static GLOBAL_REGISTRY: Lazy<Arc<AnalyzerRegistry>> = Lazy::new(|| Arc::new(AnalyzerRegistry::new()));

/// Resolves analyzer names from index definitions to fresh analyzer instances.
pub struct AnalyzerRegistry {
    factories: RwLock<HashMap<String, AnalyzerFactory>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        let registry = AnalyzerRegistry {
            factories: RwLock::new(HashMap::new()),
        };

        registry.register("StandardAnalyzer", Analyzer::standard);
        registry.register("KeywordAnalyzer", Analyzer::keyword);
        registry.register("LowerCaseKeywordAnalyzer", Analyzer::lowercase_keyword);
        registry.register("SimpleAnalyzer", Analyzer::simple);
        registry.register("WhitespaceAnalyzer", Analyzer::whitespace);
        registry.register("StopAnalyzer", Analyzer::stop);
        registry.register("EnglishAnalyzer", Analyzer::english);
        registry
    }

    /// Process-wide registry shared by indexes that were not given their own.
    pub fn global() -> Arc<AnalyzerRegistry> {
        GLOBAL_REGISTRY.clone()
    }

    pub fn register<F>(&self, name: &str, factory: F)
    where
        F: Fn() -> Analyzer + Send + Sync + 'static,
    {
        self.factories.write().insert(name.to_string(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }

    pub fn create(&self, field: &str, name: &str) -> Result<Arc<Analyzer>> {
        let factory = self.factories.read().get(name).cloned();
        match factory {
            Some(factory) => Ok(Arc::new(factory())),
            None => Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("Cannot find analyzer type '{}' for field: {}", name, field),
            )),
        }
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
