use std::collections::HashSet;
use std::iter::Peekable;
use std::str::Chars;
use crate::analysis::per_field::PerFieldAnalyzer;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{EMPTY_STRING, NULL_VALUE, RANGE_SUFFIX};
use crate::query::ast::{BoolQuery, PrefixQuery, Query, RangeBound, RangeQuery, WildcardQuery};
use crate::query::types::IndexQuery;

/// Turns a query string into a structured query.
pub trait QueryBuilder: Send + Sync {
    fn build(&self, query: &str, options: &IndexQuery, analyzer: &PerFieldAnalyzer) -> Result<Query>;

    /// Every field the query string references.
    fn fields(&self, query: &str) -> Result<HashSet<String>>;
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    LParen,
    RParen,
    Plus,
    Minus,
    And,
    Or,
    Not,
    Field(String),
    Word { text: String, wildcard: bool },
    Quoted(String),
    Range { lower: Option<String>, upper: Option<String>, include_lower: bool, include_upper: bool },
}

fn parse_error(msg: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidQuery, msg)
}

fn is_special(c: char) -> bool {
    matches!(c, '(' | ')' | '"' | ':' | '[' | '{')
}

/// Splits a query string into tokens. `\` escapes the next character.
pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' | '!' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '"' => {
                chars.next();
                tokens.push(Token::Quoted(read_quoted(&mut chars)?));
            }
            '[' | '{' => {
                chars.next();
                tokens.push(read_range(&mut chars, c == '[')?);
            }
            _ => {
                let (text, wildcard) = read_word(&mut chars)?;
                if chars.peek() == Some(&':') {
                    chars.next();
                    tokens.push(Token::Field(text));
                    continue;
                }
                tokens.push(match text.as_str() {
                    "AND" | "&&" if !wildcard => Token::And,
                    "OR" | "||" if !wildcard => Token::Or,
                    "NOT" if !wildcard => Token::Not,
                    _ => Token::Word { text, wildcard },
                });
            }
        }
    }
    Ok(tokens)
}

fn read_escaped(chars: &mut Peekable<Chars>) -> Result<char> {
    chars.next().ok_or_else(|| parse_error("Query ends with a dangling escape character"))
}

fn read_word(chars: &mut Peekable<Chars>) -> Result<(String, bool)> {
    let mut text = String::new();
    let mut wildcard = false;
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() || is_special(c) {
            break;
        }
        chars.next();
        match c {
            '\\' => text.push(read_escaped(chars)?),
            '*' | '?' => {
                wildcard = true;
                text.push(c);
            }
            _ => text.push(c),
        }
    }
    if text.is_empty() {
        return Err(parse_error("Expected a term"));
    }
    Ok((text, wildcard))
}

fn read_quoted(chars: &mut Peekable<Chars>) -> Result<String> {
    let mut text = String::new();
    loop {
        match chars.next() {
            Some('"') => return Ok(text),
            Some('\\') => text.push(read_escaped(chars)?),
            Some(c) => text.push(c),
            None => return Err(parse_error("Unterminated quoted term")),
        }
    }
}

fn read_range(chars: &mut Peekable<Chars>, include_lower: bool) -> Result<Token> {
    let mut body = String::new();
    let include_upper = loop {
        match chars.next() {
            Some(']') => break true,
            Some('}') => break false,
            Some('\\') => body.push(read_escaped(chars)?),
            Some(c) => body.push(c),
            None => return Err(parse_error("Unterminated range")),
        }
    };

    let parts: Vec<&str> = body.split_whitespace().collect();
    let [lower, "TO", upper] = parts.as_slice() else {
        return Err(parse_error(format!("Invalid range '{}', expected 'lower TO upper'", body.trim())));
    };
    let bound = |raw: &str| {
        let raw = raw.trim_matches('"');
        if raw == "*" || raw == "NULL" || raw == "null" {
            None
        } else {
            Some(raw.to_string())
        }
    };
    Ok(Token::Range {
        lower: bound(*lower),
        upper: bound(*upper),
        include_lower,
        include_upper,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Occur {
    Must,
    Should,
    MustNot,
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    options: &'a IndexQuery,
    analyzer: &'a PerFieldAnalyzer,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse_query(&mut self, field: Option<&str>) -> Result<Query> {
        let mut clauses: Vec<(Occur, Query)> = Vec::new();
        let mut conjunction_and = false;

        loop {
            match self.peek() {
                None | Some(Token::RParen) => break,
                Some(Token::And) => {
                    self.pos += 1;
                    conjunction_and = true;
                    if let Some(last) = clauses.last_mut() {
                        if last.0 == Occur::Should {
                            last.0 = Occur::Must;
                        }
                    }
                    continue;
                }
                Some(Token::Or) => {
                    self.pos += 1;
                    conjunction_and = false;
                    continue;
                }
                _ => {}
            }

            let occur = match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    Occur::Must
                }
                Some(Token::Minus) | Some(Token::Not) => {
                    self.pos += 1;
                    Occur::MustNot
                }
                _ if conjunction_and => Occur::Must,
                _ => Occur::Should,
            };
            conjunction_and = false;

            let query = self.parse_primary(field)?;
            clauses.push((occur, query));
        }

        Ok(combine(clauses))
    }

    fn parse_primary(&mut self, field: Option<&str>) -> Result<Query> {
        match self.next() {
            Some(Token::LParen) => self.parse_group(field),
            Some(Token::Field(name)) => match self.next() {
                Some(Token::LParen) => self.parse_group(Some(&name)),
                Some(Token::Word { text, .. }) if name == "*" && text == "*" => Ok(Query::MatchAll),
                Some(token) => self.value_query(&name, token),
                None => Err(parse_error(format!("Missing value for field '{}'", name))),
            },
            Some(token @ (Token::Word { .. } | Token::Quoted(_) | Token::Range { .. })) => {
                let name = match field.or(self.options.default_field.as_deref()) {
                    Some(name) => name.to_string(),
                    None => return Err(parse_error("Query has a term without a field and no default field was set")),
                };
                self.value_query(&name, token)
            }
            Some(other) => Err(parse_error(format!("Unexpected token {:?}", other))),
            None => Err(parse_error("Unexpected end of query")),
        }
    }

    fn parse_group(&mut self, field: Option<&str>) -> Result<Query> {
        let query = self.parse_query(field)?;
        match self.next() {
            Some(Token::RParen) => Ok(query),
            _ => Err(parse_error("Missing closing parenthesis")),
        }
    }

    fn value_query(&self, field: &str, token: Token) -> Result<Query> {
        let analyzer = self.analyzer.analyzer_for(field);
        let fold = |text: &str| {
            if analyzer.lowercases() {
                text.to_lowercase()
            } else {
                text.to_string()
            }
        };

        match token {
            Token::Word { text, wildcard: true } => {
                let pattern = fold(&text);
                let prefix = pattern.strip_suffix('*').filter(|p| !p.contains(['*', '?']));
                match prefix {
                    Some(prefix) => Ok(Query::Prefix(PrefixQuery {
                        field: field.to_string(),
                        prefix: prefix.to_string(),
                    })),
                    None => Ok(Query::Wildcard(WildcardQuery::new(field, pattern)?)),
                }
            }
            Token::Word { text, wildcard: false } | Token::Quoted(text) => {
                if text == NULL_VALUE || text == EMPTY_STRING {
                    return Ok(Query::term(field, text));
                }
                let terms = analyzer.terms(&text);
                Ok(match terms.len() {
                    1 => Query::term(field, terms[0].clone()),
                    _ => Query::Bool(terms.into_iter().fold(BoolQuery::new(), |b, t| b.with_must(Query::term(field, t)))),
                })
            }
            Token::Range { lower, upper, include_lower, include_upper } => {
                let numeric = field.ends_with(RANGE_SUFFIX);
                let bound = |raw: Option<String>| -> Result<Option<RangeBound>> {
                    match raw {
                        None => Ok(None),
                        Some(raw) if numeric => parse_number(&raw).map(|n| Some(RangeBound::Number(n))),
                        Some(raw) => Ok(Some(RangeBound::Text(fold(&raw)))),
                    }
                };
                Ok(Query::Range(RangeQuery {
                    field: field.to_string(),
                    lower: bound(lower)?,
                    upper: bound(upper)?,
                    include_lower,
                    include_upper,
                }))
            }
            other => Err(parse_error(format!("Unexpected token {:?}", other))),
        }
    }
}

/// Numeric range bounds may carry a type prefix: `Ix`, `Lx`, `Fx` or `Dx`.
fn parse_number(raw: &str) -> Result<f64> {
    let digits = match raw.get(..2) {
        Some("Ix" | "Lx" | "Fx" | "Dx") => &raw[2..],
        _ => raw,
    };
    digits
        .parse::<f64>()
        .map_err(|_| parse_error(format!("Could not parse numeric range bound '{}'", raw)))
}

fn combine(mut clauses: Vec<(Occur, Query)>) -> Query {
    if clauses.is_empty() {
        return Query::MatchAll;
    }
    if clauses.len() == 1 && clauses[0].0 != Occur::MustNot {
        if let Some((_, query)) = clauses.pop() {
            return query;
        }
    }
    let mut bool_query = BoolQuery::new();
    for (occur, query) in clauses {
        match occur {
            Occur::Must => bool_query.must.push(query),
            Occur::Should => bool_query.should.push(query),
            Occur::MustNot => bool_query.must_not.push(query),
        }
    }
    Query::Bool(bool_query)
}

/// Lucene-style query syntax: `field:value`, quoted values, `pre*`, wildcards,
/// `[a TO b]`/`{a TO b}` ranges, `*:*`, `+`/`-`/`NOT`/`AND`/`OR` and parentheses.
#[derive(Debug, Clone, Default)]
pub struct SimpleQueryBuilder;

impl SimpleQueryBuilder {
    pub fn new() -> Self {
        SimpleQueryBuilder
    }
}

impl QueryBuilder for SimpleQueryBuilder {
    fn build(&self, query: &str, options: &IndexQuery, analyzer: &PerFieldAnalyzer) -> Result<Query> {
        let mut parser = Parser {
            tokens: tokenize(query)?,
            pos: 0,
            options,
            analyzer,
        };
        let parsed = parser.parse_query(None)?;
        if parser.pos < parser.tokens.len() {
            return Err(parse_error(format!("Unbalanced parenthesis in query '{}'", query)));
        }
        Ok(parsed)
    }

    fn fields(&self, query: &str) -> Result<HashSet<String>> {
        Ok(tokenize(query)?
            .into_iter()
            .filter_map(|t| match t {
                Token::Field(name) if name != "*" => Some(name),
                _ => None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use proptest::prelude::*;
    use crate::analysis::analyzer::Analyzer;
    use crate::query::matcher;
    use crate::storage::segment::SegmentDoc;

    fn build(query: &str) -> Result<Query> {
        let mut analyzer = PerFieldAnalyzer::new(Arc::new(Analyzer::lowercase_keyword()));
        analyzer.add_analyzer("Body", Arc::new(Analyzer::standard()));
        SimpleQueryBuilder::new().build(query, &IndexQuery::new(query), &analyzer)
    }

    fn doc() -> SegmentDoc {
        let mut doc = SegmentDoc::default();
        doc.terms.insert("Name".into(), vec!["ayende".into()]);
        doc.terms.insert("Body".into(), vec!["quick".into(), "brown".into(), "fox".into()]);
        doc.numerics.insert("Age_Range".into(), vec![30.0]);
        doc
    }

    fn matches(query: &str) -> bool {
        matcher::score(&build(query).unwrap(), &doc()).is_some()
    }

    #[test]
    fn field_terms_are_analyzed_per_field() {
        assert!(matches("Name:Ayende"));
        assert!(matches("Body:\"Quick Fox\""));
        assert!(!matches("Body:\"quick cat\""));
    }

    #[test]
    fn boolean_operators() {
        assert!(matches("Name:ayende AND Body:fox"));
        assert!(!matches("Name:ayende AND Body:cat"));
        assert!(matches("Name:oren OR Body:fox"));
        assert!(!matches("Name:ayende -Body:fox"));
        assert!(!matches("Name:ayende AND NOT Body:fox"));
        assert!(matches("+Name:ayende +(Body:cat Body:brown)"));
        assert!(matches("Body:(cat fox)"));
    }

    #[test]
    fn prefix_wildcard_and_ranges() {
        assert!(matches("Name:AYE*"));
        assert!(matches("Name:a?e*e"));
        assert!(matches("Age_Range:[Ix18 TO Ix30]"));
        assert!(!matches("Age_Range:{Ix18 TO Ix30}"));
        assert!(matches("Age_Range:[Dx29.5 TO NULL]"));
        assert!(matches("Name:[a TO b]"));
        assert!(matches("*:*"));
    }

    #[test]
    fn malformed_queries_are_rejected() {
        for bad in ["Name:(ayende", "Name:\"open", "Age_Range:[1 2]", "ayende", "Name:"] {
            let err = build(bad).unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidQuery, "{}", bad);
        }
    }

    #[test]
    fn default_field_applies_to_bare_terms() {
        let analyzer = PerFieldAnalyzer::new(Arc::new(Analyzer::lowercase_keyword()));
        let options = IndexQuery::new("Ayende").with_default_field("Name");
        let query = SimpleQueryBuilder::new().build("Ayende", &options, &analyzer).unwrap();
        assert!(matcher::score(&query, &doc()).is_some());
    }

    #[test]
    fn fields_lists_referenced_fields() {
        let fields = SimpleQueryBuilder::new().fields("Name:a AND (Age_Range:[1 TO 2] OR *:*) Tag\\:x").unwrap();
        let mut fields: Vec<_> = fields.into_iter().collect();
        fields.sort();
        assert_eq!(fields, vec!["Age_Range".to_string(), "Name".to_string()]);
    }

    proptest! {
        #[test]
        fn escaped_words_round_trip(word in "[a-z:()\\[\\]\"]{1,12}") {
            let escaped: String = word.chars().flat_map(|c| ['\\', c]).collect();
            let tokens = tokenize(&escaped).unwrap();
            prop_assert_eq!(tokens, vec![Token::Word { text: word, wildcard: false }]);
        }

        #[test]
        fn tokenizer_never_panics(input in ".{0,40}") {
            let _ = tokenize(&input);
        }
    }
}
