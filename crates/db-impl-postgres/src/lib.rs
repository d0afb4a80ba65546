//! Postgres storage implementation for document collections.
//!
//! Every collection is a table of `(id, data JSONB)` rows. Containment
//! filters map onto `@>`, and mutations run inside a transaction holding
//! the row lock so that no other writer interleaves.

mod indices;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use db_core::{
  CollectionLike, DatabaseError, DatabaseLike, DatabaseResult, Modified,
};
use document::{Document, IndexSpec, Mutation, ObjectId, Record, Value};
use miette::{Context, IntoDiagnostic, Report};
use sqlx::{PgPool, Row, postgres::PgRow};
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};

/// Longest collection name accepted, leaving room for index suffixes within
/// the 63 byte Postgres identifier limit.
const MAX_COLLECTION_NAME: usize = 40;

const RFC3339_PATTERN: &str =
  r"^\d{4}-\d{2}-\d{2}[Tt ]\d{2}:\d{2}:\d{2}(\.\d+)?([Zz]|[+-]\d{2}:\d{2})$";

/// Postgres-backed document database.
#[derive(Clone)]
pub struct PostgresDatabase {
  pool: PgPool,
}

impl PostgresDatabase {
  /// Create a new [`PostgresDatabase`] connected to the given URL.
  #[instrument(skip(url))]
  pub async fn new(url: &str) -> miette::Result<Self> {
    debug!("Creating PostgresDatabase");
    Ok(Self {
      pool: PgPool::connect(url)
        .await
        .into_diagnostic()
        .context("failed to connect to database")?,
    })
  }

  /// Get a handle to the named collection.
  pub fn postgres_collection(
    &self,
    name: &str,
  ) -> DatabaseResult<PostgresCollection> {
    let valid = !name.is_empty()
      && name.len() <= MAX_COLLECTION_NAME
      && name.starts_with(|c: char| c.is_ascii_lowercase() || c == '_')
      && name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if !valid {
      return Err(DatabaseError::InvalidCollectionName(name.to_owned()));
    }

    Ok(PostgresCollection {
      pool:        self.pool.clone(),
      table:       name.to_owned(),
      table_ready: Arc::new(OnceCell::new()),
    })
  }
}

impl DatabaseLike for PostgresDatabase {
  fn collection(&self, name: &str) -> DatabaseResult<Arc<dyn CollectionLike>> {
    Ok(Arc::new(self.postgres_collection(name)?))
  }
}

/// A collection stored in a Postgres table.
#[derive(Clone)]
pub struct PostgresCollection {
  pool:        PgPool,
  table:       String,
  table_ready: Arc<OnceCell<()>>,
}

impl PostgresCollection {
  /// Create the backing table on first use.
  async fn ensure_table(&self) -> DatabaseResult<()> {
    self
      .table_ready
      .get_or_try_init(|| self.create_main_table())
      .await
      .map(|_| ())
  }

  /// Create the main data table.
  #[instrument(skip(self), fields(collection = %self.table))]
  async fn create_main_table(&self) -> DatabaseResult<()> {
    debug!("Creating main table");

    let query = format!(
      "CREATE TABLE IF NOT EXISTS {table_name} (
          id TEXT PRIMARY KEY,
          data JSONB NOT NULL,
          created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
          updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
      )",
      table_name = self.table
    );

    sqlx::query(&query)
      .execute(&self.pool)
      .await
      .into_diagnostic()
      .context("failed to create main table")
      .map_err(DatabaseError::Other)?;

    debug!("Main table created successfully");
    Ok(())
  }

  fn decode_body(row: &PgRow) -> DatabaseResult<Document> {
    let data: Value = row
      .try_get("data")
      .into_diagnostic()
      .map_err(DatabaseError::Serialization)?;

    match data {
      Value::Object(body) => Ok(body),
      other => Err(DatabaseError::Serialization(miette::miette!(
        "stored document is not an object: {other}"
      ))),
    }
  }

  fn decode_record(row: &PgRow) -> DatabaseResult<Record> {
    let id: String = row
      .try_get("id")
      .into_diagnostic()
      .map_err(DatabaseError::Serialization)?;
    let id = ObjectId::parse_str(&id)
      .into_diagnostic()
      .map_err(DatabaseError::Serialization)?;

    Ok(Record::new(id, Self::decode_body(row)?))
  }

  /// Statement deleting rows whose `$1` field holds a timestamp at or before
  /// `$2`. The cast only runs on strings shaped like RFC 3339, so malformed
  /// values are skipped instead of failing the sweep.
  fn expired_statement(&self) -> String {
    format!(
      "DELETE FROM {} WHERE (CASE WHEN jsonb_typeof(data -> $1) = 'string' \
       AND data ->> $1 ~ '{RFC3339_PATTERN}' THEN (data ->> \
       $1)::timestamptz END) <= $2",
      self.table
    )
  }

  /// Translate a write error, recognising unique constraint violations.
  fn write_error(&self, error: sqlx::Error, id: ObjectId) -> DatabaseError {
    if let sqlx::Error::Database(db_err) = &error
      // Postgres unique violation error code is 23505
      && db_err.code().is_some_and(|code| code.as_ref() == "23505")
    {
      let constraint = db_err.constraint().unwrap_or_default().to_owned();
      if constraint == format!("{}_pkey", self.table) {
        return DatabaseError::AlreadyExists(id.to_string());
      }
      return DatabaseError::UniqueViolation {
        index: constraint,
        value: db_err.message().to_owned(),
      };
    }
    DatabaseError::Database(Report::from_err(error))
  }
}

#[async_trait::async_trait]
impl CollectionLike for PostgresCollection {
  fn name(&self) -> &str { &self.table }

  #[instrument(skip(self, indexes), fields(collection = %self.table))]
  async fn ensure_indexes(&self, indexes: &[IndexSpec]) -> DatabaseResult<()> {
    self.ensure_table().await?;
    self.create_indexes(indexes).await
  }

  #[instrument(
    skip(self, record),
    fields(collection = %self.table, id = %record.id)
  )]
  async fn insert(&self, record: &Record) -> DatabaseResult<()> {
    self.ensure_table().await?;
    debug!("Inserting record");

    let query =
      format!("INSERT INTO {} (id, data) VALUES ($1, $2)", self.table);

    sqlx::query(&query)
      .bind(record.id.to_hex())
      .bind(Value::Object(record.body.clone()))
      .execute(&self.pool)
      .await
      .map_err(|e| self.write_error(e, record.id))?;

    debug!("Record inserted successfully");
    Ok(())
  }

  #[instrument(skip(self), fields(collection = %self.table, id = %id))]
  async fn find_by_id(&self, id: ObjectId) -> DatabaseResult<Option<Record>> {
    self.ensure_table().await?;

    let query = format!("SELECT data FROM {} WHERE id = $1", self.table);

    let row: Option<PgRow> = sqlx::query(&query)
      .bind(id.to_hex())
      .fetch_optional(&self.pool)
      .await
      .into_diagnostic()
      .map_err(DatabaseError::Database)?;

    match row {
      Some(row) => {
        debug!("Record found");
        Ok(Some(Record::new(id, Self::decode_body(&row)?)))
      }
      None => {
        debug!("Record not found");
        Ok(None)
      }
    }
  }

  #[instrument(skip(self, filter), fields(collection = %self.table))]
  async fn find_one(
    &self,
    filter: &Document,
  ) -> DatabaseResult<Option<Record>> {
    self.ensure_table().await?;

    let query = format!(
      "SELECT id, data FROM {} WHERE data @> $1 ORDER BY id LIMIT 1",
      self.table
    );

    let row: Option<PgRow> = sqlx::query(&query)
      .bind(Value::Object(filter.clone()))
      .fetch_optional(&self.pool)
      .await
      .into_diagnostic()
      .map_err(DatabaseError::Database)?;

    row.as_ref().map(Self::decode_record).transpose()
  }

  #[instrument(
    skip(self, mutation),
    fields(collection = %self.table, id = %id)
  )]
  async fn modify(
    &self,
    id: ObjectId,
    mutation: &Mutation,
  ) -> DatabaseResult<Option<Modified>> {
    self.ensure_table().await?;

    let mut tx = self
      .pool
      .begin()
      .await
      .into_diagnostic()
      .map_err(DatabaseError::Database)?;

    // the row lock is held until commit
    let select =
      format!("SELECT data FROM {} WHERE id = $1 FOR UPDATE", self.table);
    let row: Option<PgRow> = sqlx::query(&select)
      .bind(id.to_hex())
      .fetch_optional(&mut *tx)
      .await
      .into_diagnostic()
      .map_err(DatabaseError::Database)?;

    let Some(row) = row else {
      debug!("Record not found");
      return Ok(None);
    };

    let mut body = Self::decode_body(&row)?;
    let applied = mutation.apply(&mut body)?;

    let update = format!(
      "UPDATE {} SET data = $1, updated_at = NOW() WHERE id = $2",
      self.table
    );
    let result = sqlx::query(&update)
      .bind(Value::Object(body.clone()))
      .bind(id.to_hex())
      .execute(&mut *tx)
      .await
      .map_err(|e| self.write_error(e, id))?;

    if result.rows_affected() == 0 {
      warn!("Modify failed: record vanished under lock");
      return Ok(None);
    }

    tx.commit()
      .await
      .into_diagnostic()
      .map_err(DatabaseError::Database)?;
    debug!(?applied, "Record modified successfully");

    Ok(Some(Modified {
      record: Record::new(id, body),
      applied,
    }))
  }

  #[instrument(skip(self), fields(collection = %self.table, id = %id))]
  async fn delete(&self, id: ObjectId) -> DatabaseResult<bool> {
    self.ensure_table().await?;

    let query = format!("DELETE FROM {} WHERE id = $1", self.table);

    let result = sqlx::query(&query)
      .bind(id.to_hex())
      .execute(&self.pool)
      .await
      .into_diagnostic()
      .map_err(DatabaseError::Database)?;

    debug!(rows_affected = result.rows_affected(), "Delete finished");
    Ok(result.rows_affected() > 0)
  }

  #[instrument(skip(self), fields(collection = %self.table))]
  async fn delete_expired(
    &self,
    field: &str,
    cutoff: DateTime<Utc>,
  ) -> DatabaseResult<u64> {
    self.ensure_table().await?;

    let query = self.expired_statement();

    let result = sqlx::query(&query)
      .bind(field)
      .bind(cutoff)
      .execute(&self.pool)
      .await
      .into_diagnostic()
      .map_err(DatabaseError::Database)?;

    debug!(rows_affected = result.rows_affected(), "Expired records deleted");
    Ok(result.rows_affected())
  }

  #[instrument(skip(self), fields(collection = %self.table))]
  async fn count(&self) -> DatabaseResult<u64> {
    self.ensure_table().await?;

    let query = format!("SELECT COUNT(*) as count FROM {}", self.table);

    let row: PgRow = sqlx::query(&query)
      .fetch_one(&self.pool)
      .await
      .into_diagnostic()
      .map_err(DatabaseError::Database)?;

    let count: i64 = row
      .try_get("count")
      .into_diagnostic()
      .map_err(DatabaseError::Serialization)?;

    Ok(count.unsigned_abs())
  }
}
