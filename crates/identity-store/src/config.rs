use std::env;

use miette::{Context, IntoDiagnostic};
use serde::{Deserialize, Serialize};

use crate::{IdentityError, IdentityResult, TOKEN_SIZE};

/// Settings for opening an [`IdentityStore`](crate::IdentityStore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
  /// Collection holding user records.
  pub users_collection:  String,
  /// Collection holding tokens.
  pub tokens_collection: String,
  /// Length of generated tokens, in characters.
  pub token_length:      usize,
  /// Seconds between expired-token sweeps.
  pub expiry_sweep_secs: u64,
}

impl Default for StorageConfig {
  fn default() -> Self {
    Self {
      users_collection:  "users".to_owned(),
      tokens_collection: "tokens".to_owned(),
      token_length:      TOKEN_SIZE,
      expiry_sweep_secs: 60,
    }
  }
}

impl StorageConfig {
  /// Read the config from `IDENTITY_*` environment variables, falling back
  /// to the defaults for unset ones.
  pub fn from_env() -> IdentityResult<Self> {
    let mut config = Self::default();

    if let Ok(name) = env::var("IDENTITY_USERS_COLLECTION") {
      config.users_collection = name;
    }
    if let Ok(name) = env::var("IDENTITY_TOKENS_COLLECTION") {
      config.tokens_collection = name;
    }
    if let Ok(length) = env::var("IDENTITY_TOKEN_LENGTH") {
      config.token_length = length
        .parse()
        .into_diagnostic()
        .context("could not parse `IDENTITY_TOKEN_LENGTH`")
        .map_err(IdentityError::InvalidConfig)?;
    }
    if let Ok(secs) = env::var("IDENTITY_EXPIRY_SWEEP_SECS") {
      config.expiry_sweep_secs = secs
        .parse()
        .into_diagnostic()
        .context("could not parse `IDENTITY_EXPIRY_SWEEP_SECS`")
        .map_err(IdentityError::InvalidConfig)?;
    }

    Ok(config)
  }
}
