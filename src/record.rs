// 📦 Raw Records - untyped rows as the open-data datastore returns them
// Field names drift between dataset revisions, so nothing here assumes a schema.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// SCALAR VIEW
// ============================================================================

/// Borrowed view of a field value that the normalizers understand.
///
/// Upstream rows only ever carry strings, numbers or null. Anything else
/// (arrays, objects, booleans) is treated the same as a missing field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar<'a> {
    Text(&'a str),
    Number(f64),
}

impl<'a> Scalar<'a> {
    /// Build a scalar view from a JSON value, `None` for null/non-scalars
    pub fn from_value(value: &'a Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Scalar::Text(s.as_str())),
            Value::Number(n) => n.as_f64().map(Scalar::Number),
            _ => None,
        }
    }

    /// True when the value carries nothing usable (blank text)
    pub fn is_blank(&self) -> bool {
        match self {
            Scalar::Text(s) => s.trim().is_empty(),
            Scalar::Number(n) => !n.is_finite(),
        }
    }

    pub fn as_text(&self) -> Option<&'a str> {
        match self {
            Scalar::Text(s) => Some(s),
            Scalar::Number(_) => None,
        }
    }

    /// Render the scalar the way it would read in a CSV export
    pub fn to_display(&self) -> String {
        match self {
            Scalar::Text(s) => s.trim().to_string(),
            Scalar::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Scalar::Number(n) => n.to_string(),
        }
    }
}

// ============================================================================
// RAW RECORD
// ============================================================================

/// RawRecord - one upstream row, field name → scalar
///
/// Insertion order is preserved (serde_json `preserve_order`), because field
/// lookups resolve to the *first* matching field in upstream order.
/// Records are never mutated after construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: Map<String, Value>,
}

impl RawRecord {
    pub fn new() -> Self {
        RawRecord { fields: Map::new() }
    }

    /// Builder: append a field (used by loaders and tests)
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Wrap an already-decoded JSON object
    pub fn from_map(fields: Map<String, Value>) -> Self {
        RawRecord { fields }
    }

    /// Accepts only JSON objects; everything else is not a record
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(RawRecord { fields }),
            _ => None,
        }
    }

    /// Raw JSON value of a field, by exact name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Scalar view of a field, by exact name
    pub fn scalar(&self, name: &str) -> Option<Scalar<'_>> {
        self.fields.get(name).and_then(Scalar::from_value)
    }

    /// Iterate `(field name, scalar)` pairs in upstream order, skipping non-scalars
    pub fn scalars(&self) -> impl Iterator<Item = (&str, Scalar<'_>)> {
        self.fields
            .iter()
            .filter_map(|(k, v)| Scalar::from_value(v).map(|s| (k.as_str(), s)))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(fields: Map<String, Value>) -> Self {
        RawRecord::from_map(fields)
    }
}

// ============================================================================
// TESTS
// ============================================================================
