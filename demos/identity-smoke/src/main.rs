//! Exercises the identity storages against a live `PostgreSQL` database.

use std::time::Duration;

use db::Database;
use identity_store::{
  ArrayMatch, IdentityStore, ObjectId, StorageConfig, TokenOptions,
  TokenOwner,
};
use miette::{Context, IntoDiagnostic, Result, miette};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let db = Database::new_postgres(
    &std::env::var("POSTGRES_URL")
      .into_diagnostic()
      .context("could not read `POSTGRES_URL` var")?,
  )
  .await
  .context("failed to connect to database")?;

  let config = StorageConfig::from_env()?;
  let store = IdentityStore::open(&db, &config)?;
  store.init().await.context("failed to declare indexes")?;

  // unique per run so repeated runs don't trip the unique indexes
  let suffix = ObjectId::new().to_hex();
  let user_name = format!("Picard-{suffix}");
  let email = format!("JPicard-{suffix}@Federation.gov");

  let mut fields = serde_json::Map::new();
  fields.insert("userName".to_owned(), json!(user_name));
  fields.insert("email".to_owned(), json!(email));
  fields.insert("rank".to_owned(), json!("captain"));
  let user = store.users.create_user(fields).await?;
  info!(id = %user.id, "created user");

  let by_name = store.users.get_user(&user_name.to_uppercase()).await?;
  assert_eq!(by_name.as_ref(), Some(&user));
  let by_email = store.users.get_user(&email.to_lowercase()).await?;
  assert_eq!(by_email.as_ref(), Some(&user));

  // the same auth twice must leave a single entry
  for auth_secret in ["first", "second"] {
    store
      .users
      .upsert_user_array_item(
        &user.id,
        "auths",
        json!({ "type": "google", "id": suffix, "secret": auth_secret }),
        ArrayMatch::sub_field("id"),
      )
      .await?;
  }
  let user = store
    .users
    .get_user_by_auth("google", &suffix)
    .await?
    .ok_or_else(|| miette!("user not found by auth"))?;
  assert_eq!(user.array("auths").len(), 1);
  assert_eq!(user.array("auths")[0]["secret"], json!("second"));

  let user = store
    .users
    .drop_user_array_item(
      &user.id,
      "auths",
      json!(suffix),
      ArrayMatch::sub_field("id"),
    )
    .await?;
  assert!(user.array("auths").is_empty());

  let token = store.factory.create(
    "login",
    TokenOwner::User(user.id.clone()),
    TokenOptions {
      expire_at: Some(chrono::Utc::now() + chrono::Duration::hours(1)),
      ..TokenOptions::default()
    },
  )?;
  let saved = store.tokens.save_token(&token.id, &token).await?;
  let retrieved = store.tokens.get_token_by_id(&token.id).await?;
  assert_eq!(retrieved, Some(saved));
  info!(id = %token.id, "saved token");

  let sweeper = store
    .tokens
    .spawn_expiry_sweeper(Duration::from_secs(config.expiry_sweep_secs));
  assert!(store.tokens.drop_token_by_id(&token.id).await?);
  sweeper.abort();

  info!("identity storages behave");
  Ok(())
}
