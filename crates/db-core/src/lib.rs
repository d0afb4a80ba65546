//! Traits for a document-database-like interface.
//!
//! A [`DatabaseLike`] hands out [`CollectionLike`] handles by name; every
//! backend (Postgres, in-memory, etc.) implements both so callers can stay
//! generic over where their documents live.

mod error;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use document::{Applied, Document, IndexSpec, Mutation, ObjectId, Record};

pub use self::error::DatabaseError;

/// A type alias for [`Result`] with [`DatabaseError`].
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// The outcome of an atomic [`Mutation`] on an existing record.
#[derive(Clone, Debug, PartialEq)]
pub struct Modified {
  /// The record as it stands after the mutation.
  pub record:  Record,
  /// What the mutation did.
  pub applied: Applied,
}

/// A connection to a document database.
pub trait DatabaseLike: Send + Sync {
  /// Returns a handle to the named collection.
  ///
  /// Handles to the same name share the same underlying documents.
  fn collection(&self, name: &str) -> DatabaseResult<Arc<dyn CollectionLike>>;
}

/// A named collection of [`Record`]s.
#[async_trait::async_trait]
pub trait CollectionLike: Send + Sync {
  /// The collection name.
  fn name(&self) -> &str;

  /// Declare indexes on the collection. Declaring an existing index again
  /// is a no-op.
  async fn ensure_indexes(&self, indexes: &[IndexSpec]) -> DatabaseResult<()>;

  /// Insert a new record.
  async fn insert(&self, record: &Record) -> DatabaseResult<()>;

  /// Retrieve a record by its ID.
  async fn find_by_id(&self, id: ObjectId) -> DatabaseResult<Option<Record>>;

  /// Retrieve a record by its ID, returning an error if not found.
  async fn find_by_id_or_error(&self, id: ObjectId) -> DatabaseResult<Record> {
    self
      .find_by_id(id)
      .await?
      .ok_or_else(|| DatabaseError::NotFound(id.to_string()))
  }

  /// Find the first record whose body contains `filter`.
  ///
  /// See [`document::filter`] for the containment semantics.
  async fn find_one(&self, filter: &Document) -> DatabaseResult<Option<Record>>;

  /// Atomically apply `mutation` to the record with the given ID.
  ///
  /// The mutation is evaluated and written without any other writer
  /// interleaving on the same record. Returns `None` when no such record
  /// exists. When the mutation fails nothing is written.
  async fn modify(
    &self,
    id: ObjectId,
    mutation: &Mutation,
  ) -> DatabaseResult<Option<Modified>>;

  /// Delete a record by ID. Returns whether a record was deleted.
  async fn delete(&self, id: ObjectId) -> DatabaseResult<bool>;

  /// Delete every record whose `field` holds an RFC 3339 timestamp at or
  /// before `cutoff`. Returns the number of deleted records.
  async fn delete_expired(
    &self,
    field: &str,
    cutoff: DateTime<Utc>,
  ) -> DatabaseResult<u64>;

  /// Count the total number of records in the collection.
  async fn count(&self) -> DatabaseResult<u64>;
}
