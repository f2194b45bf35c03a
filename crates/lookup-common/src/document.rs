/// The nested category/parameter structure returned by the lookup API.
///
/// Decoding is a two-stage contract:
/// 1. decode the response body as a literal;
/// 2. if that yields a bare string, the payload was double-encoded, so decode
///    the string once more.
///
/// The final value must be an object; a missing `mainCategories` key degrades
/// to an empty document rather than failing.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::literal::{decode_literal, LiteralError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupDocument {
    #[serde(rename = "mainCategories", default)]
    pub main_categories: Vec<Category>,
}

/// A named group of parameters, e.g. "Product" or "Front Side Stack".
/// Names are not unique within a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub values: Vec<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("body is not a valid literal: {0}")]
    Outer(#[source] LiteralError),

    #[error("double-encoded body holds an invalid literal: {0}")]
    Inner(#[source] LiteralError),

    #[error("decoded body is {0}, expected an object")]
    NotAnObject(&'static str),

    #[error("decoded body does not match the lookup document shape: {0}")]
    Shape(#[from] serde_json::Error),
}

impl LookupDocument {
    /// All categories with the given name, in document order.
    pub fn categories_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Category> + 'a {
        self.main_categories.iter().filter(move |c| c.name == name)
    }

    /// Every `(category, parameter)` pair in document order.
    pub fn parameters(&self) -> impl Iterator<Item = (&Category, &Parameter)> {
        self.main_categories
            .iter()
            .flat_map(|c| c.parameters.iter().map(move |p| (c, p)))
    }
}

impl Parameter {
    /// First value, or `None` when the parameter carries no values.
    pub fn first_value(&self) -> Option<&Value> {
        self.values.first()
    }
}

/// Stage 1: decode the raw body text.
pub fn decode_outer(body: &str) -> Result<Value, DecodeError> {
    decode_literal(body).map_err(DecodeError::Outer)
}

/// Stage 2: unwrap a double-encoded payload. Non-string values pass through.
pub fn decode_inner(value: Value) -> Result<Value, DecodeError> {
    match value {
        Value::String(inner) => decode_literal(&inner).map_err(DecodeError::Inner),
        other => Ok(other),
    }
}

/// Run both decoding stages and convert the result into a `LookupDocument`.
pub fn decode_lookup_body(body: &str) -> Result<LookupDocument, DecodeError> {
    let value = decode_inner(decode_outer(body)?)?;
    match value {
        Value::Object(_) => Ok(serde_json::from_value(value)?),
        other => Err(DecodeError::NotAnObject(kind_name(&other))),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "None",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SINGLE: &str = r#"{'mainCategories': [{'name': 'Product', 'parameters': [{'name': 'Basic Type', 'values': ['P5151E']}, {'name': 'Division', 'values': []}]}]}"#;

    #[test]
    fn test_decode_single_encoded_body() {
        let doc = decode_lookup_body(SINGLE).unwrap();
        assert_eq!(doc.main_categories.len(), 1);
        let product = &doc.main_categories[0];
        assert_eq!(product.name, "Product");
        assert_eq!(product.parameters[0].first_value(), Some(&json!("P5151E")));
        assert_eq!(product.parameters[1].first_value(), None);
    }

    #[test]
    fn test_double_encoded_body_matches_single() {
        // The upstream sometimes wraps the repr in another string literal.
        let double = format!("\"{SINGLE}\"");
        assert_eq!(
            decode_lookup_body(&double).unwrap(),
            decode_lookup_body(SINGLE).unwrap()
        );
    }

    #[test]
    fn test_double_encoded_with_escaped_quotes() {
        let double = r#"'{\'mainCategories\': [{\'name\': \'Other\', \'parameters\': []}]}'"#;
        let doc = decode_lookup_body(double).unwrap();
        assert_eq!(doc.main_categories[0].name, "Other");
        assert!(doc.main_categories[0].parameters.is_empty());
    }

    #[test]
    fn test_stages_are_separately_callable() {
        let outer = decode_outer("'[1, 2]'").unwrap();
        assert_eq!(outer, json!("[1, 2]"));
        assert_eq!(decode_inner(outer).unwrap(), json!([1, 2]));
        assert_eq!(decode_inner(json!({"a": 1})).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_missing_top_level_key_is_empty() {
        let doc = decode_lookup_body("{'somethingElse': 1}").unwrap();
        assert!(doc.main_categories.is_empty());
    }

    #[test]
    fn test_non_object_is_rejected() {
        let err = decode_lookup_body("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, DecodeError::NotAnObject("a list")));

        // Triple encoding is not unwrapped.
        let err = decode_lookup_body(r#"'"{}"'"#).unwrap_err();
        assert!(matches!(err, DecodeError::NotAnObject("a string")));
    }

    #[test]
    fn test_invalid_inner_literal_is_reported() {
        let err = decode_lookup_body("'{not valid'").unwrap_err();
        assert!(matches!(err, DecodeError::Inner(_)));
    }

    #[test]
    fn test_invalid_outer_literal_is_reported() {
        let err = decode_lookup_body("<html>Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, DecodeError::Outer(_)));
    }

    #[test]
    fn test_category_without_name_is_a_shape_error() {
        let err = decode_lookup_body("{'mainCategories': [{'parameters': []}]}").unwrap_err();
        assert!(matches!(err, DecodeError::Shape(_)));
    }

    #[test]
    fn test_categories_named_keeps_document_order() {
        let doc = decode_lookup_body(
            "{'mainCategories': [{'name': 'A', 'parameters': [{'name': 'x', 'values': [1]}]}, \
             {'name': 'B'}, {'name': 'A', 'parameters': [{'name': 'y', 'values': [2]}]}]}",
        )
        .unwrap();
        let names: Vec<&str> = doc
            .categories_named("A")
            .flat_map(|c| c.parameters.iter().map(|p| p.name.as_str()))
            .collect();
        assert_eq!(names, ["x", "y"]);
        assert_eq!(doc.parameters().count(), 2);
    }
}
