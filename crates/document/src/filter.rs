//! Containment filters.
//!
//! A filter is itself a [`Document`]; a record matches when its body
//! contains the filter. Objects contain each key of the filter, arrays
//! contain every filter element somewhere among their elements, and scalars
//! compare by equality. This is the semantics of the Postgres `@>` operator,
//! which lets the same filter run against every backend.

use serde_json::Value;

use crate::Document;

/// Returns whether `haystack` contains `needle`.
#[must_use]
pub fn contains(haystack: &Value, needle: &Value) -> bool {
  match (haystack, needle) {
    (Value::Object(haystack), Value::Object(needle)) => {
      document_contains(haystack, needle)
    }
    (Value::Array(haystack), Value::Array(needle)) => needle
      .iter()
      .all(|wanted| haystack.iter().any(|item| contains(item, wanted))),
    (haystack, needle) => haystack == needle,
  }
}

/// Returns whether a document body matches a filter.
#[must_use]
pub fn document_contains(body: &Document, filter: &Document) -> bool {
  filter.iter().all(|(key, wanted)| {
    body.get(key).is_some_and(|value| contains(value, wanted))
  })
}

/// Builds a filter matching documents whose `field` equals `value`.
#[must_use]
pub fn field_equals(field: &str, value: impl Into<Value>) -> Document {
  let mut filter = Document::new();
  filter.insert(field.to_owned(), value.into());
  filter
}

/// Builds a filter matching documents whose array `field` holds at least one
/// element containing every entry of `element`.
#[must_use]
pub fn any_element(field: &str, element: Document) -> Document {
  field_equals(field, Value::Array(vec![Value::Object(element)]))
}
