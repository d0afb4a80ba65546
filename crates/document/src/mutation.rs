use miette::Diagnostic;
use serde_json::Value;

use crate::{ArrayMatch, Document};

/// Errors raised while applying a [`Mutation`] to a document body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Diagnostic)]
pub enum MutationError {
  /// The target field exists but does not hold an array.
  #[error("Field `{0}` is not an array")]
  NotAnArray(String),

  /// The field name is empty, dotted, or operator-like.
  #[error("Invalid field name: {0:?}")]
  InvalidField(String),
}

/// An atomic modification of a single document.
///
/// Backends evaluate and apply a mutation against one document without any
/// other writer interleaving, so the decision a mutation makes (replace or
/// append, which elements to pull) always reflects the state it modifies.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
  /// Sets and removes top-level fields.
  Update {
    /// Fields to overwrite or add.
    set:   Document,
    /// Fields to remove.
    unset: Vec<String>,
  },
  /// Replaces the first element of `field` matching `element`, or appends
  /// `element` when none matches. A missing field becomes a new array.
  UpsertArrayItem {
    /// The array field.
    field:   String,
    /// The element to store.
    element: Value,
    /// How existing elements are matched.
    matcher: ArrayMatch,
  },
  /// Removes every element of `field` matching `identifier`.
  PullArrayItems {
    /// The array field.
    field:      String,
    /// The element, or key value, to remove.
    identifier: Value,
    /// How existing elements are matched.
    matcher:    ArrayMatch,
  },
}

/// What a [`Mutation`] did to the document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
  /// Top-level fields were set or removed.
  Updated,
  /// An existing array element was overwritten in place.
  Replaced {
    /// Position of the replaced element.
    index: usize,
  },
  /// A new element was appended.
  Appended,
  /// Matching elements were removed.
  Pulled {
    /// How many elements were removed.
    removed: usize,
  },
}

impl Mutation {
  /// Applies the mutation to `body`.
  ///
  /// On error `body` may have been partially touched (an empty array field
  /// created, say); callers apply to a working copy and discard it.
  pub fn apply(&self, body: &mut Document) -> Result<Applied, MutationError> {
    match self {
      Self::Update { set, unset } => {
        for field in set.keys().chain(unset) {
          validate_field(field)?;
        }
        for (field, value) in set {
          body.insert(field.clone(), value.clone());
        }
        for field in unset {
          body.remove(field);
        }
        Ok(Applied::Updated)
      }
      Self::UpsertArrayItem {
        field,
        element,
        matcher,
      } => {
        validate_field(field)?;
        let condition = matcher.condition(element);
        let items = match body
          .entry(field.clone())
          .or_insert_with(|| Value::Array(Vec::new()))
        {
          Value::Array(items) => items,
          _ => return Err(MutationError::NotAnArray(field.clone())),
        };

        match condition.position(items) {
          Some(index) => {
            items[index] = element.clone();
            Ok(Applied::Replaced { index })
          }
          None => {
            items.push(element.clone());
            Ok(Applied::Appended)
          }
        }
      }
      Self::PullArrayItems {
        field,
        identifier,
        matcher,
      } => {
        validate_field(field)?;
        let condition = matcher.condition(identifier);
        let items = match body.get_mut(field) {
          None => return Ok(Applied::Pulled { removed: 0 }),
          Some(Value::Array(items)) => items,
          Some(_) => return Err(MutationError::NotAnArray(field.clone())),
        };

        let before = items.len();
        items.retain(|item| !condition.matches(item));
        Ok(Applied::Pulled {
          removed: before - items.len(),
        })
      }
    }
  }
}

fn validate_field(field: &str) -> Result<(), MutationError> {
  if field.is_empty() || field.contains('.') || field.starts_with('$') {
    return Err(MutationError::InvalidField(field.to_owned()));
  }
  Ok(())
}
