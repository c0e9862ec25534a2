use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::core::types::{
    ALL_FIELDS, CONVERT_TO_JSON_SUFFIX, DOCUMENT_ID_FIELD_NAME, EMPTY_STRING, FieldValue, IS_ARRAY_SUFFIX, IndexDocument,
    NULL_VALUE, RANGE_SUFFIX,
};

/// Stored fields a query asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldsToFetch {
    fields: Vec<String>,
    is_distinct: bool,
    fetch_all_stored: bool,
}

impl FieldsToFetch {
    /// `__all_fields` in `fields` asks for every stored field.
    pub fn new<S: AsRef<str>>(fields: &[S], is_distinct: bool) -> Self {
        let mut fetch_all_stored = false;
        let mut names = Vec::with_capacity(fields.len());
        for field in fields {
            let field = field.as_ref();
            if field == ALL_FIELDS {
                fetch_all_stored = true;
            } else if !names.iter().any(|n: &String| n == field) {
                names.push(field.to_string());
            }
        }
        FieldsToFetch {
            fields: names,
            is_distinct,
            fetch_all_stored,
        }
    }

    /// Whole documents, no projection.
    pub fn none() -> Self {
        FieldsToFetch::default()
    }

    pub fn is_projection(&self) -> bool {
        !self.fields.is_empty()
    }

    pub fn is_distinct_query(&self) -> bool {
        self.is_distinct && self.is_projection()
    }

    pub fn fetch_all_stored(&self) -> bool {
        self.fetch_all_stored
    }

    /// Requested names; non-distinct projections also carry the document key.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        let key = (self.is_projection() && !self.is_distinct).then_some(DOCUMENT_ID_FIELD_NAME);
        self.fields.iter().map(String::as_str).chain(key)
    }
}

/// One projected value, decoded from stored index fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProjectedValue {
    Null,
    String(String),
    Binary(Vec<u8>),
    Json(Value),
    Array(Vec<ProjectedValue>),
}

impl ProjectedValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ProjectedValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ProjectedValue::Null => Value::Null,
            ProjectedValue::String(s) => Value::String(s.clone()),
            ProjectedValue::Binary(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
            ProjectedValue::Json(value) => value.clone(),
            ProjectedValue::Array(items) => Value::Array(items.iter().map(ProjectedValue::to_json).collect()),
        }
    }
}

pub type Projection = BTreeMap<String, ProjectedValue>;

fn is_helper_field(name: &str) -> bool {
    name.ends_with(IS_ARRAY_SUFFIX) || name.ends_with(RANGE_SUFFIX) || name.ends_with(CONVERT_TO_JSON_SUFFIX)
}

fn has_marker(document: &IndexDocument, name: &str, suffix: &str) -> bool {
    document.get(&format!("{}{}", name, suffix)).is_some()
}

fn decode(document: &IndexDocument, name: &str, value: &FieldValue) -> ProjectedValue {
    let text = match value {
        FieldValue::Binary(bytes) => return ProjectedValue::Binary(bytes.clone()),
        FieldValue::Text(text) => text.clone(),
        FieldValue::Number(n) => n.to_string(),
    };
    if has_marker(document, name, CONVERT_TO_JSON_SUFFIX) {
        if let Ok(json) = serde_json::from_str::<Value>(&text) {
            return ProjectedValue::Json(json);
        }
    }
    match text.as_str() {
        NULL_VALUE => ProjectedValue::Null,
        EMPTY_STRING => ProjectedValue::String(String::new()),
        _ => ProjectedValue::String(text),
    }
}

/// Rebuilds a result object from the stored fields of one index entry.
pub fn create_document_from_fields(document: &IndexDocument, fields_to_fetch: &FieldsToFetch) -> Projection {
    let mut names: Vec<&str> = fields_to_fetch.fields().collect();
    if fields_to_fetch.fetch_all_stored() {
        names.extend(document.fields.iter().filter(|f| f.stored).map(|f| f.name.as_str()));
    }

    let mut projection = Projection::new();
    let mut seen: Vec<&str> = Vec::with_capacity(names.len());
    for name in names {
        if seen.contains(&name) || is_helper_field(name) {
            continue;
        }
        seen.push(name);

        let mut values: Vec<ProjectedValue> = document
            .get_fields(name)
            .filter(|f| f.stored)
            .map(|f| decode(document, name, &f.value))
            .collect();
        let value = match values.len() {
            0 => continue,
            1 if !has_marker(document, name, IS_ARRAY_SUFFIX) => values.remove(0),
            _ => ProjectedValue::Array(values),
        };
        projection.insert(name.to_string(), value);
    }
    projection
}

/// Canonical key of a projection, equal for structurally equal projections.
pub fn distinct_key(projection: &Projection) -> String {
    serde_json::to_string(projection).unwrap_or_default()
}
