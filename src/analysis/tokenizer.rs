use crate::analysis::token::Token;
use unicode_segmentation::UnicodeSegmentation;

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<Token>;

    fn name(&self) -> &str;
}

/// Unicode word boundaries (UAX #29).
#[derive(Clone)]
pub struct StandardTokenizer {
    pub max_token_length: usize,
}

impl Default for StandardTokenizer {
    fn default() -> Self {
        StandardTokenizer {
            max_token_length: 255,
        }
    }
}

impl Tokenizer for StandardTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut position = 0u32;

        for (offset, word) in text.unicode_word_indices() {
            if word.len() > self.max_token_length {
                continue;
            }
            tokens.push(Token::new(word, position, offset, offset + word.len()));
            position += 1;
        }

        tokens
    }

    fn name(&self) -> &str {
        "standard"
    }
}

/// Emits the whole value as a single token.
#[derive(Clone, Default)]
pub struct KeywordTokenizer;

impl Tokenizer for KeywordTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        vec![Token::new(text, 0, 0, text.len())]
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

#[derive(Clone, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        split_runs(text, |c| !c.is_whitespace())
    }

    fn name(&self) -> &str {
        "whitespace"
    }
}

/// Maximal runs of letters; everything else separates.
#[derive(Clone, Default)]
pub struct LetterTokenizer;

impl Tokenizer for LetterTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        split_runs(text, char::is_alphabetic)
    }

    fn name(&self) -> &str {
        "letter"
    }
}

fn split_runs(text: &str, keep: impl Fn(char) -> bool) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (i, c) in text.char_indices() {
        match (keep(c), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                tokens.push(Token::new(&text[s..i], tokens.len() as u32, s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        tokens.push(Token::new(&text[s..], tokens.len() as u32, s, text.len()));
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: Vec<Token>) -> Vec<String> {
        tokens.into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn standard_splits_on_word_boundaries() {
        let tokens = StandardTokenizer::default().tokenize("Hello, wide world!");
        assert_eq!(tokens[2].start, 12);
        assert_eq!(texts(tokens), vec!["Hello", "wide", "world"]);
    }

    #[test]
    fn letter_and_whitespace_runs() {
        assert_eq!(texts(LetterTokenizer.tokenize("ab1cd e")), vec!["ab", "cd", "e"]);
        assert_eq!(texts(WhitespaceTokenizer.tokenize("  a-b  c ")), vec!["a-b", "c"]);
        assert_eq!(texts(KeywordTokenizer.tokenize("Whole Value")), vec!["Whole Value"]);
    }
}
