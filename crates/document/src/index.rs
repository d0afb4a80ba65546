use serde_json::Value;

use crate::{Document, resolve_path};

/// Declaration of an index over one or more document paths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexSpec {
  /// The index name, unique per collection.
  pub name:         String,
  /// Dotted key paths covered by the index.
  pub keys:         Vec<String>,
  /// Whether two documents may not share a key.
  pub unique:       bool,
  /// Whether documents lacking every key are left out of the index.
  pub sparse:       bool,
  /// Seconds after the timestamp stored at the first key when a document
  /// expires.
  pub expire_after: Option<u64>,
}

impl IndexSpec {
  /// Creates a plain, non-unique index.
  pub fn new<I, S>(name: &str, keys: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      name:         name.to_owned(),
      keys:         keys.into_iter().map(Into::into).collect(),
      unique:       false,
      sparse:       false,
      expire_after: None,
    }
  }

  /// Marks the index unique.
  #[must_use]
  pub fn unique(mut self) -> Self {
    self.unique = true;
    self
  }

  /// Marks the index sparse.
  #[must_use]
  pub fn sparse(mut self) -> Self {
    self.sparse = true;
    self
  }

  /// Makes documents expire `seconds` after the timestamp at the first key.
  #[must_use]
  pub fn expire_after(mut self, seconds: u64) -> Self {
    self.expire_after = Some(seconds);
    self
  }

  /// Extracts the key of `body` under this index.
  ///
  /// Returns `None` when the index is sparse and the body holds none of the
  /// keys. Missing keys of an indexed document count as null.
  #[must_use]
  pub fn key_for(&self, body: &Document) -> Option<Vec<Value>> {
    let resolved: Vec<Option<&Value>> = self
      .keys
      .iter()
      .map(|path| resolve_path(body, path).into_iter().next())
      .collect();

    if self.sparse && resolved.iter().all(Option::is_none) {
      return None;
    }

    Some(
      resolved
        .into_iter()
        .map(|value| value.cloned().unwrap_or(Value::Null))
        .collect(),
    )
  }

  /// Extracts the key compared by a unique constraint.
  ///
  /// Components compare by their text form: strings by content, anything
  /// else by its JSON text, so `"1"` and `1` collide. A key with a null or
  /// missing component collides with nothing and yields `None`.
  #[must_use]
  pub fn unique_key_for(&self, body: &Document) -> Option<Vec<String>> {
    self
      .key_for(body)?
      .into_iter()
      .map(|value| match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
      })
      .collect()
  }
}
