use serde::{Deserialize, Serialize};
use serde_json::Value;

static NULL: Value = Value::Null;

/// How elements of an array field are matched against a candidate element.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArrayMatch {
  /// Elements match when they are equal to the whole candidate.
  WholeValue,
  /// Elements match when the named attribute equals the candidate's.
  SubField(String),
}

impl ArrayMatch {
  /// Shorthand for [`ArrayMatch::SubField`].
  #[must_use]
  pub fn sub_field(name: impl Into<String>) -> Self {
    Self::SubField(name.into())
  }

  /// Builds the match condition for `element`.
  ///
  /// With [`ArrayMatch::SubField`], the identifier is `element[key]` when
  /// `element` is an object and `element` itself otherwise, so arrays of
  /// objects can be addressed by a bare key value.
  #[must_use]
  pub fn condition<'a>(&'a self, element: &'a Value) -> MatchCondition<'a> {
    match self {
      Self::WholeValue => MatchCondition::Equals(element),
      Self::SubField(key) => {
        let identifier = match element {
          Value::Object(map) => map.get(key).unwrap_or(&NULL),
          other => other,
        };
        MatchCondition::FieldEquals { key, identifier }
      }
    }
  }
}

/// A predicate over the elements of an array field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MatchCondition<'a> {
  /// The element equals this value.
  Equals(&'a Value),
  /// The element is an object whose `key` attribute equals `identifier`.
  ///
  /// A null identifier also matches objects lacking `key`.
  FieldEquals {
    /// The attribute compared.
    key:        &'a str,
    /// The value it must hold.
    identifier: &'a Value,
  },
}

impl MatchCondition<'_> {
  /// Returns whether `candidate` satisfies the condition.
  #[must_use]
  pub fn matches(&self, candidate: &Value) -> bool {
    match self {
      Self::Equals(value) => candidate == *value,
      Self::FieldEquals { key, identifier } => {
        candidate.as_object().is_some_and(|map| match map.get(*key) {
          Some(value) => value == *identifier,
          None => identifier.is_null(),
        })
      }
    }
  }

  /// Returns the position of the first matching element.
  #[must_use]
  pub fn position(&self, items: &[Value]) -> Option<usize> {
    items.iter().position(|item| self.matches(item))
  }
}
