//! Persistence layer for an identity system.
//!
//! [`UserStorage`] keeps user records with case-insensitively unique user
//! names and emails plus named array fields (external auths, roles, ...),
//! [`TokenStorage`] keeps opaque authentication tokens with optional expiry,
//! and [`TokenFactory`] mints new tokens whose first 24 characters are their
//! record ID.

mod config;
mod error;
mod factory;
mod token;
mod user;


use db::Database;
pub use document::{ArrayMatch, Document, ObjectId, Value};

pub use self::{
  config::StorageConfig,
  error::{IdentityError, IdentityResult},
  factory::{TOKEN_SIZE, TokenFactory, TokenOptions, TokenOwner},
  token::{Token, TokenStorage},
  user::{EMAIL_FIELD, LoginIdentifier, USERNAME_FIELD, User, UserStorage},
};

/// User and token storage opened over one [`Database`].
#[derive(Clone, Debug)]
pub struct IdentityStore {
  /// User records.
  pub users:   UserStorage,
  /// Authentication tokens.
  pub tokens:  TokenStorage,
  /// Token factory configured with the token length.
  pub factory: TokenFactory,
}

impl IdentityStore {
  /// Open the collections named in `config`.
  pub fn open(db: &Database, config: &StorageConfig) -> IdentityResult<Self> {
    Ok(Self {
      users:   UserStorage::new(db.collection(&config.users_collection)?),
      tokens:  TokenStorage::new(db.collection(&config.tokens_collection)?),
      factory: TokenFactory::new(config.token_length),
    })
  }

  /// Declare the indexes of both collections.
  pub async fn init(&self) -> IdentityResult<()> {
    self.users.init().await?;
    self.tokens.init().await
  }
}
