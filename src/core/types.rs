use std::fmt;
use serde::{Serialize, Deserialize};

/// Reserved field holding the key of the source document an entry was produced from.
pub const DOCUMENT_ID_FIELD_NAME: &str = "__document_id";
/// Analyzer key that replaces the default analyzer for every field.
pub const ALL_FIELDS: &str = "__all_fields";
/// Field name that marks an index with dynamic field names.
pub const CATCH_ALL_FIELD: &str = "_";
pub const NULL_VALUE: &str = "NULL_VALUE";
pub const EMPTY_STRING: &str = "EMPTY_STRING";
pub const INTERSECT_SEPARATOR: &str = " INTERSECT ";
pub const TEMPORARY_SCORE_VALUE: &str = "__score";
pub const RANDOM_FIELD_NAME: &str = "__random";
pub const DISTANCE_FIELD_NAME: &str = "__distance";
/// Directory lock held for the duration of one write transaction.
pub const WRITING_TO_INDEX_LOCK: &str = "writing-to-index.lock";

pub const RANGE_SUFFIX: &str = "_Range";
pub const IS_ARRAY_SUFFIX: &str = "_IsArray";
pub const CONVERT_TO_JSON_SUFFIX: &str = "_ConvertToJson";

/// Monotonic change mark of the document store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Etag(pub u64);

impl Etag {
    pub const EMPTY: Etag = Etag(0);

    pub fn new(value: u64) -> Self {
        Etag(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Etag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:020}", self.0)
    }
}

impl From<u64> for Etag {
    fn from(value: u64) -> Self {
        Etag(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Binary(Vec<u8>),
    Number(f64),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// String form used for indexing and for stored-value projection.
    pub fn to_indexable_string(&self) -> Option<String> {
        match self {
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Number(n) => Some(n.to_string()),
            FieldValue::Binary(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldIndex {
    No,
    Analyzed,
    NotAnalyzed,
}

/// One (name, value, flags) entry of an index document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
    pub stored: bool,
    pub index: FieldIndex,
}

impl Field {
    pub fn new(name: impl Into<String>, value: FieldValue, stored: bool, index: FieldIndex) -> Self {
        Field {
            name: name.into(),
            value,
            stored,
            index,
        }
    }

    /// Stored, analyzed text.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Field::new(name, FieldValue::Text(value.into()), true, FieldIndex::Analyzed)
    }

    /// Stored text indexed as a single term.
    pub fn keyword(name: impl Into<String>, value: impl Into<String>) -> Self {
        Field::new(name, FieldValue::Text(value.into()), true, FieldIndex::NotAnalyzed)
    }

    /// Indexed numeric value, not stored. Used for `_Range` companions.
    pub fn number(name: impl Into<String>, value: f64) -> Self {
        Field::new(name, FieldValue::Number(value), false, FieldIndex::NotAnalyzed)
    }

    pub fn binary(name: impl Into<String>, value: Vec<u8>) -> Self {
        Field::new(name, FieldValue::Binary(value), true, FieldIndex::No)
    }

    pub fn stored(mut self, stored: bool) -> Self {
        self.stored = stored;
        self
    }

    pub fn indexed(mut self, index: FieldIndex) -> Self {
        self.index = index;
        self
    }

    pub fn is_binary(&self) -> bool {
        matches!(self.value, FieldValue::Binary(_))
    }

    pub fn is_indexed(&self) -> bool {
        self.index != FieldIndex::No
    }
}

/// The field set of one index entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub fields: Vec<Field>,
}

impl IndexDocument {
    pub fn new() -> Self {
        IndexDocument { fields: Vec::new() }
    }

    /// Entry whose document-id field is `key`.
    pub fn for_key(key: impl Into<String>) -> Self {
        IndexDocument::new().with(Field::keyword(DOCUMENT_ID_FIELD_NAME, key))
    }

    pub fn add(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn with(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn get_fields<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Field> + 'a {
        self.fields.iter().filter(move |f| f.name == name)
    }

    pub fn key(&self) -> Option<&str> {
        self.get(DOCUMENT_ID_FIELD_NAME).and_then(|f| f.value.as_text())
    }

    /// Only the stored fields, in their original order.
    pub fn stored_fields(&self) -> IndexDocument {
        IndexDocument {
            fields: self.fields.iter().filter(|f| f.stored).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
