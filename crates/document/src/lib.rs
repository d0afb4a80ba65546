//! Provides the document model shared by every storage backend.
//!
//! A stored [`Record`] is an [`ObjectId`] plus a JSON [`Document`] body.
//! Backends only need to understand the operations defined here:
//! containment filters ([`filter`]), atomic single-document
//! [`Mutation`]s, and [`IndexSpec`] declarations.

pub mod filter;
mod index;
mod matching;
mod mutation;
#[cfg(test)]
mod tests;

pub use object_id::{HEX_LEN as ID_HEX_LEN, ObjectId, ObjectIdError};
pub use serde_json::{Value, json};

pub use self::{
  index::IndexSpec,
  matching::{ArrayMatch, MatchCondition},
  mutation::{Applied, Mutation, MutationError},
};

/// A JSON object used as the body of a stored record.
pub type Document = serde_json::Map<String, Value>;

/// A stored document together with its identifier.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
  /// The record identifier.
  pub id:   ObjectId,
  /// The record body. Never contains the identifier itself.
  pub body: Document,
}

impl Record {
  /// Creates a new [`Record`].
  #[must_use]
  pub const fn new(id: ObjectId, body: Document) -> Self { Self { id, body } }
}

/// Resolves a dotted path against a document.
///
/// Arrays met along the way are traversed element-wise, so `auths.type`
/// yields the `type` of every element of `auths`.
#[must_use]
pub fn resolve_path<'a>(document: &'a Document, path: &str) -> Vec<&'a Value> {
  let mut segments = path.split('.');
  let mut current: Vec<&Value> = segments
    .next()
    .and_then(|first| document.get(first))
    .into_iter()
    .collect();

  for segment in segments {
    current = current
      .into_iter()
      .flat_map(|value| descend(value, segment))
      .collect();
  }

  current
}

fn descend<'a>(value: &'a Value, segment: &str) -> Vec<&'a Value> {
  match value {
    Value::Object(map) => map.get(segment).into_iter().collect(),
    Value::Array(items) => items
      .iter()
      .filter_map(|item| item.as_object()?.get(segment))
      .collect(),
    _ => Vec::new(),
  }
}
