//! Mock storage implementation for testing.


use std::{
  collections::{BTreeMap, HashMap},
  sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use db_core::{
  CollectionLike, DatabaseError, DatabaseLike, DatabaseResult, Modified,
};
use document::{
  Document, IndexSpec, Mutation, ObjectId, Record, Value,
  filter::document_contains,
};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// In-memory mock database for testing.
///
/// Collections are created on first access and live as long as the
/// database or any handle to them.
#[derive(Clone, Default)]
pub struct MockDatabase {
  collections: Arc<Mutex<HashMap<String, MockCollection>>>,
}

impl MockDatabase {
  /// Create a new, empty [`MockDatabase`].
  #[must_use]
  pub fn new() -> Self { Self::default() }

  /// Get or create the named collection.
  #[must_use]
  pub fn mock_collection(&self, name: &str) -> MockCollection {
    let mut collections = self
      .collections
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    collections
      .entry(name.to_owned())
      .or_insert_with(|| MockCollection::new(name))
      .clone()
  }
}

impl DatabaseLike for MockDatabase {
  fn collection(&self, name: &str) -> DatabaseResult<Arc<dyn CollectionLike>> {
    if name.is_empty() {
      return Err(DatabaseError::InvalidCollectionName(name.to_owned()));
    }
    Ok(Arc::new(self.mock_collection(name)))
  }
}

/// In-memory collection of records.
#[derive(Clone)]
pub struct MockCollection {
  name:  String,
  inner: Arc<RwLock<MockCollectionInner>>,
}

#[derive(Default)]
struct MockCollectionInner {
  /// Main data storage: id -> body
  records: BTreeMap<ObjectId, Document>,
  /// Declared indexes, in declaration order
  indexes: Vec<IndexSpec>,
}

impl MockCollection {
  /// Create a new, empty collection.
  #[must_use]
  pub fn new(name: &str) -> Self {
    Self {
      name:  name.to_owned(),
      inner: Arc::new(RwLock::new(MockCollectionInner::default())),
    }
  }

  /// Get the number of records.
  pub async fn len(&self) -> usize { self.inner.read().await.records.len() }

  /// Check if the collection is empty.
  pub async fn is_empty(&self) -> bool { self.len().await == 0 }

  fn check_unique_violations(
    inner: &MockCollectionInner,
    body: &Document,
    exclude_id: Option<ObjectId>,
  ) -> DatabaseResult<()> {
    for index in inner.indexes.iter().filter(|index| index.unique) {
      let Some(key) = index.unique_key_for(body) else {
        continue;
      };

      let clash = inner
        .records
        .iter()
        .filter(|(id, _)| Some(**id) != exclude_id)
        .any(|(_, other)| {
          index.unique_key_for(other).as_ref() == Some(&key)
        });

      if clash {
        return Err(DatabaseError::UniqueViolation {
          index: index.name.clone(),
          value: key.join(", "),
        });
      }
    }

    Ok(())
  }

  fn is_expired(body: &Document, field: &str, cutoff: DateTime<Utc>) -> bool {
    body
      .get(field)
      .and_then(Value::as_str)
      .and_then(|stamp| DateTime::parse_from_rfc3339(stamp).ok())
      .is_some_and(|stamp| stamp <= cutoff)
  }
}

#[async_trait::async_trait]
impl CollectionLike for MockCollection {
  fn name(&self) -> &str { &self.name }

  #[instrument(skip(self, indexes), fields(collection = %self.name))]
  async fn ensure_indexes(&self, indexes: &[IndexSpec]) -> DatabaseResult<()> {
    let mut inner = self.inner.write().await;

    for index in indexes {
      if inner.indexes.iter().any(|existing| existing.name == index.name) {
        continue;
      }

      if index.unique {
        let mut seen = Vec::new();
        for body in inner.records.values() {
          let Some(key) = index.unique_key_for(body) else {
            continue;
          };
          if seen.contains(&key) {
            return Err(DatabaseError::UniqueViolation {
              index: index.name.clone(),
              value: key.join(", "),
            });
          }
          seen.push(key);
        }
      }

      debug!(index = %index.name, "Index declared");
      inner.indexes.push(index.clone());
    }

    Ok(())
  }

  #[instrument(
    skip(self, record),
    fields(collection = %self.name, id = %record.id)
  )]
  async fn insert(&self, record: &Record) -> DatabaseResult<()> {
    let mut inner = self.inner.write().await;

    if inner.records.contains_key(&record.id) {
      return Err(DatabaseError::AlreadyExists(record.id.to_string()));
    }

    Self::check_unique_violations(&inner, &record.body, None)?;

    inner.records.insert(record.id, record.body.clone());
    Ok(())
  }

  async fn find_by_id(&self, id: ObjectId) -> DatabaseResult<Option<Record>> {
    let inner = self.inner.read().await;
    Ok(
      inner
        .records
        .get(&id)
        .map(|body| Record::new(id, body.clone())),
    )
  }

  async fn find_one(
    &self,
    filter: &Document,
  ) -> DatabaseResult<Option<Record>> {
    let inner = self.inner.read().await;
    Ok(
      inner
        .records
        .iter()
        .find(|(_, body)| document_contains(body, filter))
        .map(|(id, body)| Record::new(*id, body.clone())),
    )
  }

  #[instrument(skip(self, mutation), fields(collection = %self.name, id = %id))]
  async fn modify(
    &self,
    id: ObjectId,
    mutation: &Mutation,
  ) -> DatabaseResult<Option<Modified>> {
    // the write guard is held from evaluation to write-back
    let mut inner = self.inner.write().await;

    let Some(current) = inner.records.get(&id) else {
      debug!("Record not found");
      return Ok(None);
    };

    let mut body = current.clone();
    let applied = mutation.apply(&mut body)?;

    Self::check_unique_violations(&inner, &body, Some(id))?;

    inner.records.insert(id, body.clone());
    debug!(?applied, "Record modified");

    Ok(Some(Modified {
      record: Record::new(id, body),
      applied,
    }))
  }

  async fn delete(&self, id: ObjectId) -> DatabaseResult<bool> {
    let mut inner = self.inner.write().await;
    Ok(inner.records.remove(&id).is_some())
  }

  #[instrument(skip(self), fields(collection = %self.name))]
  async fn delete_expired(
    &self,
    field: &str,
    cutoff: DateTime<Utc>,
  ) -> DatabaseResult<u64> {
    let mut inner = self.inner.write().await;

    let before = inner.records.len();
    inner
      .records
      .retain(|_, body| !Self::is_expired(body, field, cutoff));
    let removed = before - inner.records.len();

    debug!(removed, "Expired records deleted");
    Ok(removed as u64)
  }

  async fn count(&self) -> DatabaseResult<u64> {
    Ok(self.inner.read().await.records.len() as u64)
  }
}
