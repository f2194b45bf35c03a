use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Returned for an output field that has no entry in the mapping table.
pub const UNMAPPED_SENTINEL: &str = "not mapped yet";

/// Returned for a mapped field whose value is missing or empty upstream.
pub const MISSING_SENTINEL: &str = "NaN";

/// Where a mapped output field lives in the lookup document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSource {
    /// Category name, e.g. "Preassembly general"
    pub category: String,
    /// Parameter name within the category, e.g. "Wafer diameter"
    pub parameter: String,
}

impl FieldSource {
    pub fn new(category: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            parameter: parameter.into(),
        }
    }
}

/// The resolved value of one output field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// No mapping rule exists for the field.
    Unmapped,
    /// The field is mapped but the document has no usable value.
    Missing,
    Found(Value),
}

impl FieldValue {
    /// Collapse a lookup result into a field value; `null` and `""` count as missing.
    pub fn from_lookup(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => FieldValue::Missing,
            Some(Value::String(s)) if s.is_empty() => FieldValue::Missing,
            Some(v) => FieldValue::Found(v.clone()),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Unmapped => serializer.serialize_str(UNMAPPED_SENTINEL),
            FieldValue::Missing => serializer.serialize_str(MISSING_SENTINEL),
            FieldValue::Found(value) => value.serialize(serializer),
        }
    }
}

/// Flat output keyed by output field name, in output field order.
pub type ResultDocument = IndexMap<String, FieldValue>;
