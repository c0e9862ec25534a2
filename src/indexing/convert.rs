use serde_json::Value;
use crate::core::types::{
    CONVERT_TO_JSON_SUFFIX, DOCUMENT_ID_FIELD_NAME, EMPTY_STRING, Field, FieldIndex, FieldValue, IS_ARRAY_SUFFIX,
    IndexDocument, NULL_VALUE, RANGE_SUFFIX,
};
use crate::schema::definition::IndexDefinition;

/// Turns one map output object into an index entry.
///
/// The document id comes from the entry's `__document_id` property, falling back to `key`.
/// Nested arrays are flattened into repeated fields with an `_IsArray` marker; objects are
/// stored as JSON text with a `_ConvertToJson` marker; numbers get a `_Range` companion.
pub fn entry_to_document(key: Option<&str>, entry: &Value, definition: &IndexDefinition) -> IndexDocument {
    let mut document = IndexDocument::new();

    let id = entry
        .get(DOCUMENT_ID_FIELD_NAME)
        .and_then(Value::as_str)
        .or(key);
    if let Some(id) = id {
        document.add(Field::keyword(DOCUMENT_ID_FIELD_NAME, id.to_lowercase()));
    }

    if let Value::Object(properties) = entry {
        for (name, value) in properties {
            if name == DOCUMENT_ID_FIELD_NAME {
                continue;
            }
            add_value(&mut document, name, value, definition, false);
        }
    }
    document
}

fn marker(name: &str, suffix: &str) -> Field {
    Field::new(format!("{}{}", name, suffix), FieldValue::Text("true".into()), true, FieldIndex::NotAnalyzed)
}

fn add_value(document: &mut IndexDocument, name: &str, value: &Value, definition: &IndexDefinition, nested: bool) {
    let stored = definition.is_stored(name);
    let index = definition.field_indexing(name).to_field_index();
    let not_analyzed = |text: String| Field::new(name, FieldValue::Text(text), stored, FieldIndex::NotAnalyzed);

    match value {
        Value::Null => document.add(not_analyzed(NULL_VALUE.to_string())),
        Value::String(text) if text.is_empty() => document.add(not_analyzed(EMPTY_STRING.to_string())),
        Value::String(text) => document.add(Field::new(name, FieldValue::Text(text.clone()), stored, index)),
        Value::Bool(flag) => document.add(not_analyzed(flag.to_string())),
        Value::Number(number) => {
            document.add(not_analyzed(number.to_string()));
            if let Some(n) = number.as_f64() {
                document.add(Field::number(format!("{}{}", name, RANGE_SUFFIX), n));
            }
        }
        Value::Array(items) => {
            if !nested && document.get(&format!("{}{}", name, IS_ARRAY_SUFFIX)).is_none() {
                document.add(marker(name, IS_ARRAY_SUFFIX));
            }
            for item in items {
                add_value(document, name, item, definition, true);
            }
        }
        Value::Object(_) => {
            document.add(Field::new(name, FieldValue::Text(value.to_string()), stored, FieldIndex::NotAnalyzed));
            if document.get(&format!("{}{}", name, CONVERT_TO_JSON_SUFFIX)).is_none() {
                document.add(marker(name, CONVERT_TO_JSON_SUFFIX));
            }
        }
    }
}
