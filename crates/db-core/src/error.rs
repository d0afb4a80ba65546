use document::MutationError;
use miette::Diagnostic;
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error, Diagnostic)]
pub enum DatabaseError {
  /// Record not found
  #[error("Record not found: {0}")]
  NotFound(String),

  /// A record with the same identifier already exists
  #[error("Record already exists: {0}")]
  AlreadyExists(String),

  /// Uniqueness violation
  #[error("Unique constraint violation on index {index}: {value}")]
  UniqueViolation {
    /// The index whose uniqueness constraint was violated
    index: String,
    /// The duplicate value
    value: String,
  },

  /// Collection name not usable as a storage identifier
  #[error("Invalid collection name: {0:?}")]
  InvalidCollectionName(String),

  /// The mutation could not be applied to the stored document
  #[error("Invalid mutation: {0}")]
  InvalidMutation(#[from] MutationError),

  /// Serialization error
  #[error("Serialization error: {0}")]
  Serialization(#[diagnostic_source] miette::Report),

  /// Database error
  #[error("Database error: {0}")]
  Database(#[diagnostic_source] miette::Report),

  /// Other error
  #[error("{0}")]
  Other(#[diagnostic_source] miette::Report),
}
