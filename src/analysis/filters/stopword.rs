use std::collections::HashSet;
use once_cell::sync::Lazy;
use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

static ENGLISH_STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in",
        "into", "is", "it", "no", "not", "of", "on", "or", "such", "that", "the",
        "their", "then", "there", "these", "they", "this", "to", "was", "will", "with",
    ]
    .into_iter()
    .collect()
});

/// Drops stop words; positions of the remaining tokens are kept.
pub enum StopWordFilter {
    English,
    Custom(HashSet<String>),
}

impl StopWordFilter {
    pub fn new(stop_words: Vec<String>) -> Self {
        StopWordFilter::Custom(stop_words.into_iter().collect())
    }

    pub fn english() -> Self {
        StopWordFilter::English
    }

    fn is_stop_word(&self, word: &str) -> bool {
        match self {
            StopWordFilter::English => ENGLISH_STOP_WORDS.contains(word),
            StopWordFilter::Custom(words) => words.contains(word),
        }
    }
}

impl TokenFilter for StopWordFilter {
    fn filter(&self, tokens: Vec<Token>) -> Vec<Token> {
        tokens.into_iter()
            .filter(|token| !self.is_stop_word(&token.text))
            .collect()
    }

    fn name(&self) -> &str {
        "stop_words"
    }
}
