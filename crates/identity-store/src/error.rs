use db::DatabaseError;
use miette::Diagnostic;
use thiserror::Error;

/// Errors raised by the identity storages.
#[derive(Debug, Error, Diagnostic)]
pub enum IdentityError {
  /// An identifier is not a 24 character hexadecimal string
  #[error("ID should be a 24 character hexadecimal string, got {0:?}")]
  MalformedId(String),

  /// A supplied token does not start with its record ID
  #[error("Token should start with a 24 character hexadecimal ID")]
  MalformedToken,

  /// The targeted user does not exist
  #[error("User not found: {0}")]
  UserNotFound(String),

  /// A field name is reserved for internal use
  #[error("Field {0:?} is reserved")]
  ReservedField(String),

  /// A stored document could not be converted
  #[error("Serialization error: {0}")]
  Serialization(#[diagnostic_source] miette::Report),

  /// Configuration could not be read
  #[error("Invalid configuration: {0}")]
  InvalidConfig(#[diagnostic_source] miette::Report),

  /// The backing store failed
  #[error(transparent)]
  #[diagnostic(transparent)]
  Store(#[from] DatabaseError),
}

/// A type alias for [`Result`] with [`IdentityError`].
pub type IdentityResult<T> = Result<T, IdentityError>;
