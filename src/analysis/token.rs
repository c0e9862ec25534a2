use serde::{Serialize, Deserialize};

/// One term produced by an analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub position: u32,     // Ordinal within the field value
    pub start: usize,      // Byte offsets into the original value
    pub end: usize,
}

impl Token {
    pub fn new(text: impl Into<String>, position: u32, start: usize, end: usize) -> Self {
        Token {
            text: text.into(),
            position,
            start,
            end,
        }
    }
}
