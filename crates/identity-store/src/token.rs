use std::time::Duration;

use chrono::{DateTime, Utc};
use db::Collection;
use document::{Document, IndexSpec, ObjectId, Record, Value};
use miette::IntoDiagnostic;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::{IdentityError, IdentityResult};

pub(crate) const EXPIRE_AT_FIELD: &str = "expireAt";

/// Fields of [`Token`] that extra attributes may not shadow.
pub(crate) const TOKEN_FIELDS: [&str; 6] =
  ["id", "userId", "token", "type", "groups", EXPIRE_AT_FIELD];

/// An opaque authentication token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
  /// The token ID; the first 24 characters of generated tokens.
  pub id:        String,
  /// The user the token belongs to.
  #[serde(default)]
  pub user_id:   Option<String>,
  /// The token value presented by clients.
  pub token:     String,
  /// What the token is for.
  #[serde(rename = "type")]
  pub kind:      String,
  /// Groups the token grants, for tokens not bound to a user.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub groups:    Option<Vec<String>>,
  /// When the store may delete the token.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub expire_at: Option<DateTime<Utc>>,
  /// Any further caller-supplied attributes.
  #[serde(flatten)]
  pub extra:     Document,
}

impl Token {
  /// Returns whether the token has expired at `now`.
  #[must_use]
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.expire_at.is_some_and(|expire_at| expire_at <= now)
  }

  fn from_record(record: Record) -> IdentityResult<Self> {
    let mut body = record.body;
    body.insert("id".to_owned(), Value::String(record.id.to_hex()));

    serde_json::from_value(Value::Object(body))
      .into_diagnostic()
      .map_err(IdentityError::Serialization)
  }

  fn to_body(&self, user_id: Option<ObjectId>) -> IdentityResult<Document> {
    let mut token = self.clone();
    token
      .extra
      .retain(|field, _| !TOKEN_FIELDS.contains(&field.as_str()));

    let value = serde_json::to_value(&token)
      .into_diagnostic()
      .map_err(IdentityError::Serialization)?;

    let Value::Object(mut body) = value else {
      return Err(IdentityError::Serialization(miette::miette!(
        "token did not serialize to an object"
      )));
    };

    body.remove("id");
    body.insert(
      "userId".to_owned(),
      user_id.map_or(Value::Null, |id| Value::String(id.to_hex())),
    );
    Ok(body)
  }
}

/// Storage of authentication tokens.
#[derive(Clone, Debug)]
pub struct TokenStorage {
  collection: Collection,
}

impl TokenStorage {
  /// Create a new [`TokenStorage`] over the given collection.
  #[must_use]
  pub const fn new(collection: Collection) -> Self { Self { collection } }

  /// Declare the expiry index.
  #[instrument(skip(self), fields(collection = self.collection.name()))]
  pub async fn init(&self) -> IdentityResult<()> {
    self
      .collection
      .ensure_indexes(&[IndexSpec::new("expire_at", [EXPIRE_AT_FIELD])
        .sparse()
        .expire_after(0)])
      .await?;
    Ok(())
  }

  /// Store `token` under `id`.
  ///
  /// The ID, and the owning user ID when present, must be 24 character
  /// hexadecimal strings. Returns the token as stored.
  #[instrument(skip(self, token))]
  pub async fn save_token(
    &self,
    id: &str,
    token: &Token,
  ) -> IdentityResult<Token> {
    let id = parse_token_id(id)?;
    let user_id = match token.user_id.as_deref() {
      Some(user_id) if !user_id.is_empty() => Some(
        ObjectId::parse_str(user_id)
          .map_err(|_| IdentityError::MalformedId(user_id.to_owned()))?,
      ),
      _ => None,
    };

    let record = Record::new(id, token.to_body(user_id)?);
    self.collection.insert(&record).await?;

    debug!(%id, "Token saved");
    Token::from_record(record)
  }

  /// Get a token by ID. Expired tokens are not returned even before the
  /// sweeper deletes them.
  #[instrument(skip(self))]
  pub async fn get_token_by_id(
    &self,
    id: &str,
  ) -> IdentityResult<Option<Token>> {
    let id = parse_token_id(id)?;

    let Some(record) = self.collection.find_by_id(id).await? else {
      return Ok(None);
    };

    let token = Token::from_record(record)?;
    if token.is_expired(Utc::now()) {
      debug!("Token expired");
      return Ok(None);
    }
    Ok(Some(token))
  }

  /// Delete a token by ID. Returns whether a token was deleted.
  #[instrument(skip(self))]
  pub async fn drop_token_by_id(&self, id: &str) -> IdentityResult<bool> {
    let id = parse_token_id(id)?;
    Ok(self.collection.delete(id).await?)
  }

  /// Delete every expired token. Returns how many were deleted.
  #[instrument(skip(self))]
  pub async fn purge_expired(&self) -> IdentityResult<u64> {
    Ok(
      self
        .collection
        .delete_expired(EXPIRE_AT_FIELD, Utc::now())
        .await?,
    )
  }

  /// Purge expired tokens every `period` on the current tokio runtime.
  ///
  /// The sweeper runs until the returned handle is aborted.
  #[must_use]
  pub fn spawn_expiry_sweeper(&self, period: Duration) -> JoinHandle<()> {
    let storage = self.clone();
    tokio::spawn(async move {
      let mut interval = tokio::time::interval(period);
      loop {
        interval.tick().await;
        match storage.purge_expired().await {
          Ok(0) => {}
          Ok(purged) => debug!(purged, "Expired tokens purged"),
          Err(error) => warn!(%error, "Expired token sweep failed"),
        }
      }
    })
  }
}

fn parse_token_id(id: &str) -> IdentityResult<ObjectId> {
  ObjectId::parse_str(id).map_err(|_| IdentityError::MalformedId(id.to_owned()))
}
