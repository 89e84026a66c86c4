// 🔎 Datastore Query - filters + free text for CKAN datastore_search
// Built by the engine, sent by the upstream client.

use serde_json::{Map, Value};

/// One `datastore_search` query; blank criteria are never sent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatastoreQuery {
    pub filters: Map<String, Value>,
    pub text: Option<String>,
}

impl DatastoreQuery {
    pub fn new() -> Self {
        DatastoreQuery::default()
    }

    /// `{"mispar_rechev": plate}`
    pub fn by_plate(plate: &str) -> Self {
        DatastoreQuery::new().with_filter("mispar_rechev", plate)
    }

    /// Add an exact-match filter; null and blank values are dropped
    pub fn with_filter(mut self, field: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        let blank = match &value {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        };
        if !blank {
            self.filters.insert(field.to_string(), value);
        }
        self
    }

    /// Add a full-text `q` term; blank text is dropped
    pub fn with_text(mut self, text: &str) -> Self {
        let text = text.trim();
        if !text.is_empty() {
            self.text = Some(text.to_string());
        }
        self
    }

    /// No filters and no text: would match the whole dataset
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.text.is_none()
    }

    /// Query-string pairs for a request against `resource_id`
    pub fn params(&self, resource_id: &str, limit: u32) -> Vec<(String, String)> {
        let mut params = vec![
            ("resource_id".to_string(), resource_id.to_string()),
            ("limit".to_string(), limit.to_string()),
        ];
        if !self.filters.is_empty() {
            params.push(("filters".to_string(), Value::Object(self.filters.clone()).to_string()));
        }
        if let Some(text) = &self.text {
            params.push(("q".to_string(), text.clone()));
        }
        params
    }
}
