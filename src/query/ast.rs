use std::fmt;
use std::sync::Arc;
use regex::Regex;
use crate::core::error::Result;
use crate::storage::segment::SegmentDoc;

/// Structured query evaluated against one index view.
#[derive(Debug, Clone)]
pub enum Query {
    MatchAll,
    Term(TermQuery),
    Prefix(PrefixQuery),
    Wildcard(WildcardQuery),
    Range(RangeQuery),
    Bool(BoolQuery),
    Custom(Arc<dyn CustomQuery>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermQuery {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrefixQuery {
    pub field: String,
    pub prefix: String,
}

#[derive(Debug, Clone)]
pub struct WildcardQuery {
    pub field: String,
    pub pattern: String,
    regex: Regex,
}

impl WildcardQuery {
    /// `*` matches any run of characters, `?` exactly one.
    pub fn new(field: impl Into<String>, pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        let mut expr = String::from("^");
        for c in pattern.chars() {
            match c {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(&other.to_string())),
            }
        }
        expr.push('$');

        Ok(WildcardQuery {
            field: field.into(),
            regex: Regex::new(&expr)?,
            pattern,
        })
    }

    pub fn is_match(&self, term: &str) -> bool {
        self.regex.is_match(term)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RangeBound {
    Text(String),
    Number(f64),
}

/// Open ends are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    pub field: String,
    pub lower: Option<RangeBound>,
    pub upper: Option<RangeBound>,
    pub include_lower: bool,
    pub include_upper: bool,
}

impl RangeQuery {
    pub fn is_numeric(&self) -> bool {
        matches!(self.lower, Some(RangeBound::Number(_))) || matches!(self.upper, Some(RangeBound::Number(_)))
    }
}

/// Boolean query with must/should/must_not clauses
#[derive(Debug, Clone, Default)]
pub struct BoolQuery {
    pub must: Vec<Query>,      // All must match (AND)
    pub should: Vec<Query>,    // At least one must match (OR) when there is no `must`
    pub must_not: Vec<Query>,  // None must match (NOT)
}

impl BoolQuery {
    pub fn new() -> Self {
        BoolQuery::default()
    }

    pub fn with_must(mut self, query: Query) -> Self {
        self.must.push(query);
        self
    }

    pub fn with_should(mut self, query: Query) -> Self {
        self.should.push(query);
        self
    }

    pub fn with_must_not(mut self, query: Query) -> Self {
        self.must_not.push(query);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.should.is_empty() && self.must_not.is_empty()
    }
}

/// Externally supplied predicate, e.g. a spatial shape filter.
pub trait CustomQuery: Send + Sync + fmt::Debug {
    /// Score for a matching document, `None` when it does not match.
    fn score(&self, doc: &SegmentDoc) -> Option<f32>;

    /// Fields and terms this clause matches on, for highlighting.
    fn terms(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

impl Query {
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Query {
        Query::Term(TermQuery {
            field: field.into(),
            value: value.into(),
        })
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self, Query::MatchAll)
    }

    /// Every (field, term) pair of the positive clauses, used by highlighters.
    pub fn positive_terms(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        self.collect_terms(&mut out);
        out
    }

    fn collect_terms(&self, out: &mut Vec<(String, String)>) {
        match self {
            Query::Term(t) => out.push((t.field.clone(), t.value.clone())),
            Query::Prefix(p) => out.push((p.field.clone(), format!("{}*", p.prefix))),
            Query::Wildcard(w) => out.push((w.field.clone(), w.pattern.clone())),
            Query::Bool(b) => {
                for q in b.must.iter().chain(b.should.iter()) {
                    q.collect_terms(out);
                }
            }
            Query::Custom(c) => out.extend(c.terms()),
            Query::MatchAll | Query::Range(_) => {}
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::MatchAll => write!(f, "*:*"),
            Query::Term(t) => write!(f, "{}:{}", t.field, t.value),
            Query::Prefix(p) => write!(f, "{}:{}*", p.field, p.prefix),
            Query::Wildcard(w) => write!(f, "{}:{}", w.field, w.pattern),
            Query::Range(r) => {
                let bound = |b: &Option<RangeBound>| match b {
                    None => "*".to_string(),
                    Some(RangeBound::Text(s)) => s.clone(),
                    Some(RangeBound::Number(n)) => n.to_string(),
                };
                write!(
                    f,
                    "{}:{}{} TO {}{}",
                    r.field,
                    if r.include_lower { '[' } else { '{' },
                    bound(&r.lower),
                    bound(&r.upper),
                    if r.include_upper { ']' } else { '}' }
                )
            }
            Query::Bool(b) => {
                let mut parts = Vec::new();
                parts.extend(b.must.iter().map(|q| format!("+{}", q)));
                parts.extend(b.should.iter().map(|q| q.to_string()));
                parts.extend(b.must_not.iter().map(|q| format!("-{}", q)));
                write!(f, "({})", parts.join(" "))
            }
            Query::Custom(c) => write!(f, "{:?}", c),
        }
    }
}
