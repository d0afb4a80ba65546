//! Provides a document database interface and implementers.

#[cfg(test)]
mod tests;

use core::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
pub use db_core::{
  CollectionLike, DatabaseError, DatabaseLike, DatabaseResult, Modified,
};
use db_impl_mock::MockDatabase;
use db_impl_postgres::PostgresDatabase;
use document::{Document, IndexSpec, Mutation, ObjectId, Record};

/// A document database.
#[derive(Clone)]
pub struct Database {
  inner: Arc<dyn DatabaseLike>,
}

impl fmt::Debug for Database {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Database")
      .field("inner", &format_args!("_"))
      .finish()
  }
}

impl Database {
  /// Create a new database backed by a mock store.
  #[must_use]
  pub fn new_mock() -> Self {
    Self {
      inner: Arc::new(MockDatabase::new()),
    }
  }

  /// Create a new database over any [`DatabaseLike`] backend.
  #[must_use]
  pub fn from_backend(inner: Arc<dyn DatabaseLike>) -> Self { Self { inner } }

  /// Create a new database backed by a `PostgreSQL` store.
  pub async fn new_postgres(url: &str) -> miette::Result<Self> {
    Ok(Self {
      inner: Arc::new(PostgresDatabase::new(url).await?),
    })
  }

  /// Get a handle to the named collection.
  pub fn collection(&self, name: &str) -> DatabaseResult<Collection> {
    Ok(Collection {
      inner: self.inner.collection(name)?,
    })
  }
}

/// A handle to a named collection of documents.
#[derive(Clone)]
pub struct Collection {
  inner: Arc<dyn CollectionLike>,
}

impl fmt::Debug for Collection {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Collection")
      .field("name", &self.inner.name())
      .finish()
  }
}

impl Collection {
  /// The collection name.
  #[must_use]
  pub fn name(&self) -> &str { self.inner.name() }
  /// Declare indexes on the collection.
  pub async fn ensure_indexes(
    &self,
    indexes: &[IndexSpec],
  ) -> DatabaseResult<()> {
    self.inner.ensure_indexes(indexes).await
  }
  /// Insert a new record.
  pub async fn insert(&self, record: &Record) -> DatabaseResult<()> {
    self.inner.insert(record).await
  }
  /// Retrieve a record by its ID.
  pub async fn find_by_id(
    &self,
    id: ObjectId,
  ) -> DatabaseResult<Option<Record>> {
    self.inner.find_by_id(id).await
  }
  /// Retrieve a record by its ID, returning an error if not found.
  pub async fn find_by_id_or_error(
    &self,
    id: ObjectId,
  ) -> DatabaseResult<Record> {
    self.inner.find_by_id_or_error(id).await
  }
  /// Find the first record whose body contains `filter`.
  pub async fn find_one(
    &self,
    filter: &Document,
  ) -> DatabaseResult<Option<Record>> {
    self.inner.find_one(filter).await
  }
  /// Atomically apply a mutation to one record.
  pub async fn modify(
    &self,
    id: ObjectId,
    mutation: &Mutation,
  ) -> DatabaseResult<Option<Modified>> {
    self.inner.modify(id, mutation).await
  }
  /// Delete a record by ID. Returns whether a record was deleted.
  pub async fn delete(&self, id: ObjectId) -> DatabaseResult<bool> {
    self.inner.delete(id).await
  }
  /// Delete records whose `field` timestamp is at or before `cutoff`.
  pub async fn delete_expired(
    &self,
    field: &str,
    cutoff: DateTime<Utc>,
  ) -> DatabaseResult<u64> {
    self.inner.delete_expired(field, cutoff).await
  }
  /// Count the total number of records in the collection.
  pub async fn count(&self) -> DatabaseResult<u64> { self.inner.count().await }
}
