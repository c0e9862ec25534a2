use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use serde_json::{Map, Value};
use crate::core::error::Result;
use crate::core::types::{CATCH_ALL_FIELD, DOCUMENT_ID_FIELD_NAME};
use crate::query::ast::Query;
use crate::query::types::SpatialIndexQuery;

/// Builds the spatial clause of a query for one spatial field.
pub trait SpatialField: Send + Sync {
    fn make_query(&self, spatial: &SpatialIndexQuery) -> Result<Query>;
}

/// The compiled map function of an index.
pub trait ViewGenerator: Send + Sync {
    /// Whether the map function emits `field`; `_` marks dynamic field names.
    fn contains_field(&self, field: &str) -> bool;

    fn spatial_field(&self, _name: &str) -> Option<Arc<dyn SpatialField>> {
        None
    }

    /// Index entries for one source document.
    fn map(&self, key: &str, document: &Value) -> Result<Vec<Value>>;
}

type MapFn = dyn Fn(&str, &Value) -> Result<Vec<Value>> + Send + Sync;

/// View generator over a closure.
pub struct SimpleViewGenerator {
    fields: HashSet<String>,
    map: Arc<MapFn>,
    spatial: HashMap<String, Arc<dyn SpatialField>>,
}

impl SimpleViewGenerator {
    pub fn new<F>(fields: &[&str], map: F) -> Self
    where
        F: Fn(&str, &Value) -> Result<Vec<Value>> + Send + Sync + 'static,
    {
        let mut fields: HashSet<String> = fields.iter().map(|f| f.to_string()).collect();
        fields.insert(DOCUMENT_ID_FIELD_NAME.to_string());
        SimpleViewGenerator {
            fields,
            map: Arc::new(map),
            spatial: HashMap::new(),
        }
    }

    /// Emits one entry per document holding the listed properties; missing ones are null.
    pub fn projecting(fields: &[&str]) -> Self {
        let names: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        SimpleViewGenerator::new(fields, move |_, doc| {
            let mut entry = Map::new();
            for name in &names {
                entry.insert(name.clone(), doc.get(name).cloned().unwrap_or(Value::Null));
            }
            Ok(vec![Value::Object(entry)])
        })
    }

    /// Accepts any field name.
    pub fn dynamic(mut self) -> Self {
        self.fields.insert(CATCH_ALL_FIELD.to_string());
        self
    }

    pub fn with_spatial_field(mut self, name: &str, field: Arc<dyn SpatialField>) -> Self {
        self.spatial.insert(name.to_string(), field);
        self
    }
}

impl fmt::Debug for SimpleViewGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleViewGenerator").field("fields", &self.fields).finish()
    }
}

impl ViewGenerator for SimpleViewGenerator {
    fn contains_field(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    fn spatial_field(&self, name: &str) -> Option<Arc<dyn SpatialField>> {
        self.spatial.get(name).cloned()
    }

    fn map(&self, key: &str, document: &Value) -> Result<Vec<Value>> {
        (self.map)(key, document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn projecting_generator_fills_missing_fields_with_null() {
        let generator = SimpleViewGenerator::projecting(&["Name", "Age"]);
        let entries = generator.map("users/1", &json!({"Name": "Oren", "City": "Hadera"})).unwrap();
        assert_eq!(entries, vec![json!({"Name": "Oren", "Age": null})]);

        assert!(generator.contains_field("Name"));
        assert!(generator.contains_field(DOCUMENT_ID_FIELD_NAME));
        assert!(!generator.contains_field("City"));
        assert!(generator.dynamic().contains_field(CATCH_ALL_FIELD));
    }
}
