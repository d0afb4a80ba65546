use chrono::{DateTime, Utc};
use document::{Document, ID_HEX_LEN as ID_LEN, ObjectId};
use rand::RngCore;

use crate::{IdentityError, IdentityResult, Token, token::TOKEN_FIELDS};

/// Default length of generated tokens, in characters.
pub const TOKEN_SIZE: usize = 512;

/// Who a token is issued to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TokenOwner {
  /// Nobody in particular.
  #[default]
  Nobody,
  /// A single user, by ID.
  User(String),
  /// A set of groups.
  Groups(Vec<String>),
}

/// Optional settings for a new token.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TokenOptions {
  /// Use this token value instead of generating one. It must start with
  /// its 24 character lowercase hexadecimal ID.
  pub token:     Option<String>,
  /// When the token expires.
  pub expire_at: Option<DateTime<Utc>>,
  /// Extra attributes stored with the token.
  pub extra:     Document,
}

/// Mints [`Token`]s.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenFactory {
  length: usize,
}

impl Default for TokenFactory {
  fn default() -> Self { Self::new(TOKEN_SIZE) }
}

impl TokenFactory {
  /// Create a factory generating tokens of `length` characters.
  #[must_use]
  pub const fn new(length: usize) -> Self { Self { length } }

  /// Length of generated tokens.
  #[must_use]
  pub const fn length(&self) -> usize { self.length }

  /// Create a token of the given kind.
  ///
  /// A generated token is a fresh ID followed by hexadecimal random bytes.
  /// Lengths shorter than the ID yield the bare ID.
  pub fn create(
    &self,
    kind: &str,
    owner: TokenOwner,
    options: TokenOptions,
  ) -> IdentityResult<Token> {
    let TokenOptions {
      token,
      expire_at,
      mut extra,
    } = options;

    let (id, token) = match token {
      Some(token) => (Self::id_prefix(&token)?, token),
      None => self.generate(),
    };

    let (user_id, groups) = match owner {
      TokenOwner::Nobody => (None, None),
      TokenOwner::User(user_id) => (Some(user_id), None),
      TokenOwner::Groups(groups) => (None, Some(groups)),
    };

    extra.retain(|field, _| !TOKEN_FIELDS.contains(&field.as_str()));

    Ok(Token {
      id,
      user_id,
      token,
      kind: kind.to_owned(),
      groups,
      expire_at,
      extra,
    })
  }

  fn generate(&self) -> (String, String) {
    let id = ObjectId::new().to_hex();

    let mut tail = vec![0u8; self.length.saturating_sub(ID_LEN) / 2];
    rand::thread_rng().fill_bytes(&mut tail);

    let token = format!("{id}{}", hex::encode(tail));
    (id, token)
  }

  fn id_prefix(token: &str) -> IdentityResult<String> {
    token
      .get(..ID_LEN)
      .filter(|prefix| {
        prefix
          .chars()
          .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
      })
      .map(str::to_owned)
      .ok_or(IdentityError::MalformedToken)
  }
}
