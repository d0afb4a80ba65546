use db_core::{DatabaseError, DatabaseResult};
use document::IndexSpec;
use miette::{Context, IntoDiagnostic};
use tracing::{debug, instrument};

use crate::PostgresCollection;

impl PostgresCollection {
  /// Create Postgres indexes for the declared index specs.
  ///
  /// Unique indexes become expression indexes over the key paths, partial
  /// when sparse. Expiring indexes get a btree over the timestamp text so
  /// sweeps stay cheap. Plain indexes share one GIN index over the whole
  /// document, which serves every containment query.
  #[instrument(skip(self, indexes), fields(collection = %self.table))]
  pub(crate) async fn create_indexes(
    &self,
    indexes: &[IndexSpec],
  ) -> DatabaseResult<()> {
    debug!("Creating {} indexes", indexes.len());

    for spec in indexes {
      let query = self.index_statement(spec)?;

      sqlx::query(&query)
        .execute(&self.pool)
        .await
        .into_diagnostic()
        .with_context(|| format!("Failed to create index: {}", spec.name))
        .map_err(DatabaseError::Other)?;

      debug!(index_name = %spec.name, "Index created");
    }

    debug!("All indexes created successfully");
    Ok(())
  }

  fn index_statement(&self, spec: &IndexSpec) -> DatabaseResult<String> {
    let table = &self.table;

    if let Some(path) = spec.keys.iter().find(|path| !Self::is_safe_path(path))
    {
      return Err(DatabaseError::Other(miette::miette!(
        "index {} has an unsupported key path: {path:?}",
        spec.name
      )));
    }

    if spec.unique {
      let index_name = self.calculate_index_name(spec);
      let columns = spec
        .keys
        .iter()
        .map(|path| format!("(data #>> '{}')", Self::path_literal(path)))
        .collect::<Vec<_>>()
        .join(", ");
      let predicate = if spec.sparse {
        let present = spec
          .keys
          .iter()
          .map(|path| {
            format!("data #> '{}' IS NOT NULL", Self::path_literal(path))
          })
          .collect::<Vec<_>>()
          .join(" OR ");
        format!(" WHERE {present}")
      } else {
        String::new()
      };

      return Ok(format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {index_name} ON {table} \
         ({columns}){predicate}"
      ));
    }

    if spec.expire_after.is_some()
      && let Some(path) = spec.keys.first()
    {
      let index_name = self.calculate_index_name(spec);
      return Ok(format!(
        "CREATE INDEX IF NOT EXISTS {index_name} ON {table} ((data #>> '{}'))",
        Self::path_literal(path)
      ));
    }

    Ok(format!(
      "CREATE INDEX IF NOT EXISTS {table}__gin ON {table} USING GIN (data \
       jsonb_path_ops)"
    ))
  }

  /// Calculate the Postgres index name for a given spec.
  fn calculate_index_name(&self, spec: &IndexSpec) -> String {
    let suffix: String = spec
      .name
      .chars()
      .map(|c| {
        if c.is_ascii_alphanumeric() {
          c.to_ascii_lowercase()
        } else {
          '_'
        }
      })
      .collect();
    format!("{}__idx_{}", self.table, suffix)
  }

  /// Render a dotted path as a Postgres text array literal body.
  fn path_literal(path: &str) -> String {
    format!("{{{}}}", path.replace('.', ","))
  }

  fn is_safe_path(path: &str) -> bool {
    !path.is_empty()
      && path
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use sqlx::postgres::PgPoolOptions;
  use tokio::sync::OnceCell;

  use super::*;

  fn collection(name: &str) -> PostgresCollection {
    PostgresCollection {
      pool:        PgPoolOptions::new()
        .connect_lazy("postgres://localhost/unused")
        .unwrap(),
      table:       name.to_owned(),
      table_ready: Arc::new(OnceCell::new()),
    }
  }

  #[tokio::test]
  async fn test_sparse_unique_statement() {
    let users = collection("users");
    let spec = IndexSpec::new("uq_email", ["_uqEmail"]).unique().sparse();

    assert_eq!(
      users.index_statement(&spec).unwrap(),
      "CREATE UNIQUE INDEX IF NOT EXISTS users__idx_uq_email ON users \
       ((data #>> '{_uqEmail}')) WHERE data #> '{_uqEmail}' IS NOT NULL"
    );
  }

  #[tokio::test]
  async fn test_plain_index_uses_gin() {
    let users = collection("users");
    let spec = IndexSpec::new("auths", ["auths.type", "auths.id"]).sparse();

    assert_eq!(
      users.index_statement(&spec).unwrap(),
      "CREATE INDEX IF NOT EXISTS users__gin ON users USING GIN (data \
       jsonb_path_ops)"
    );
  }

  #[tokio::test]
  async fn test_expiry_index_statement() {
    let tokens = collection("tokens");
    let spec =
      IndexSpec::new("expire_at", ["expireAt"]).sparse().expire_after(0);

    assert_eq!(
      tokens.index_statement(&spec).unwrap(),
      "CREATE INDEX IF NOT EXISTS tokens__idx_expire_at ON tokens ((data #>> \
       '{expireAt}'))"
    );
  }

  #[tokio::test]
  async fn test_rejects_unsafe_paths() {
    let users = collection("users");
    let spec = IndexSpec::new("bad", ["x'); DROP TABLE users; --"]).unique();

    assert!(users.index_statement(&spec).is_err());
  }

  #[tokio::test]
  async fn test_expiry_cast_is_guarded() {
    let tokens = collection("tokens");
    let statement = tokens.expired_statement();

    let guard = statement
      .find("CASE WHEN jsonb_typeof(data -> $1) = 'string'")
      .unwrap();
    let cast = statement.find("::timestamptz").unwrap();
    assert!(guard < cast);
    assert!(statement.contains(crate::RFC3339_PATTERN));
    assert!(statement.ends_with("END) <= $2"));
  }
}
