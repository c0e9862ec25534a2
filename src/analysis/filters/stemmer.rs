use rust_stemmers::{Algorithm, Stemmer};
use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

pub struct StemmerFilter {
    stemmer: Stemmer,
}

impl StemmerFilter {
    pub fn new(algorithm: Algorithm) -> Self {
        StemmerFilter {
            stemmer: Stemmer::create(algorithm),
        }
    }
}

impl TokenFilter for StemmerFilter {
    fn filter(&self, mut tokens: Vec<Token>) -> Vec<Token> {
        for token in tokens.iter_mut() {
            let stemmed = self.stemmer.stem(&token.text).into_owned();
            token.text = stemmed;
        }
        tokens
    }

    fn name(&self) -> &str {
        "stemmer"
    }
}
