use db::Collection;
use document::{
  ArrayMatch, Document, IndexSpec, Mutation, ObjectId, Record, Value, filter,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::{IdentityError, IdentityResult};

/// Field holding the display user name.
pub const USERNAME_FIELD: &str = "userName";
/// Field holding the display email.
pub const EMAIL_FIELD: &str = "email";

const UNIQUE_USERNAME_FIELD: &str = "_uqUserName";
const UNIQUE_EMAIL_FIELD: &str = "_uqEmail";
const AUTHS_FIELD: &str = "auths";

/// Display fields and the normalized copies kept for unique lookups.
const NORMALIZED_FIELDS: [(&str, &str); 2] = [
  (USERNAME_FIELD, UNIQUE_USERNAME_FIELD),
  (EMAIL_FIELD, UNIQUE_EMAIL_FIELD),
];

const RESERVED_FIELDS: [&str; 4] =
  ["id", "_id", UNIQUE_USERNAME_FIELD, UNIQUE_EMAIL_FIELD];

/// A user record as handed to callers.
///
/// Internal normalization fields are never included.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
  /// The user ID in its 24 character hexadecimal form.
  pub id:     String,
  /// Every other field of the record.
  #[serde(flatten)]
  pub fields: Document,
}

impl User {
  fn from_record(record: Record) -> Self {
    let mut fields = record.body;
    fields.remove(UNIQUE_USERNAME_FIELD);
    fields.remove(UNIQUE_EMAIL_FIELD);

    Self {
      id: record.id.to_hex(),
      fields,
    }
  }

  /// Returns a field value.
  #[must_use]
  pub fn get(&self, field: &str) -> Option<&Value> { self.fields.get(field) }

  /// Returns the elements of an array field, or nothing when the field is
  /// missing or not an array.
  #[must_use]
  pub fn array(&self, field: &str) -> &[Value] {
    self
      .fields
      .get(field)
      .and_then(Value::as_array)
      .map(Vec::as_slice)
      .unwrap_or_default()
  }

  /// Returns the display user name.
  #[must_use]
  pub fn user_name(&self) -> Option<&str> {
    self.get(USERNAME_FIELD).and_then(Value::as_str)
  }

  /// Returns the display email.
  #[must_use]
  pub fn email(&self) -> Option<&str> {
    self.get(EMAIL_FIELD).and_then(Value::as_str)
  }
}

/// How a login identifier is looked up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginIdentifier<'a> {
  /// Looked up against the normalized user name.
  UserName(&'a str),
  /// Looked up against the normalized email.
  Email(&'a str),
}

impl<'a> LoginIdentifier<'a> {
  /// A non-empty identifier without `@` is a user name, anything else an
  /// email.
  #[must_use]
  pub fn classify(input: &'a str) -> Self {
    if !input.is_empty() && !input.contains('@') {
      Self::UserName(input)
    } else {
      Self::Email(input)
    }
  }

  fn filter(self) -> Document {
    match self {
      Self::UserName(name) => {
        filter::field_equals(UNIQUE_USERNAME_FIELD, normalize(name))
      }
      Self::Email(email) => {
        filter::field_equals(UNIQUE_EMAIL_FIELD, normalize(email))
      }
    }
  }
}

fn normalize(value: &str) -> String { value.to_lowercase() }

/// Storage of user records.
#[derive(Clone, Debug)]
pub struct UserStorage {
  collection: Collection,
}

impl UserStorage {
  /// Create a new [`UserStorage`] over the given collection.
  #[must_use]
  pub const fn new(collection: Collection) -> Self { Self { collection } }

  /// Declare the user indexes.
  #[instrument(skip(self), fields(collection = self.collection.name()))]
  pub async fn init(&self) -> IdentityResult<()> {
    self
      .collection
      .ensure_indexes(&[
        IndexSpec::new("uq_user_name", [UNIQUE_USERNAME_FIELD])
          .unique()
          .sparse(),
        IndexSpec::new("uq_email", [UNIQUE_EMAIL_FIELD])
          .unique()
          .sparse(),
        IndexSpec::new("auths", ["auths.type", "auths.id"]).sparse(),
      ])
      .await?;
    Ok(())
  }

  /// Find a user by ID. Malformed IDs find nothing.
  #[instrument(skip(self))]
  pub async fn find_by_id(
    &self,
    user_id: &str,
  ) -> IdentityResult<Option<User>> {
    let Ok(id) = ObjectId::parse_str(user_id) else {
      debug!("Malformed user ID");
      return Ok(None);
    };

    let record = self.collection.find_by_id(id).await?;
    Ok(record.map(User::from_record))
  }

  /// Find the user holding an external auth of the given type and ID.
  #[instrument(skip(self))]
  pub async fn get_user_by_auth(
    &self,
    auth_type: &str,
    auth_id: &str,
  ) -> IdentityResult<Option<User>> {
    let mut wanted = Document::new();
    wanted.insert("type".to_owned(), Value::from(auth_type));
    wanted.insert("id".to_owned(), Value::from(auth_id));

    let record = self
      .collection
      .find_one(&filter::any_element(AUTHS_FIELD, wanted))
      .await?;
    Ok(record.map(User::from_record))
  }

  /// Find a user by user name or email, case-insensitively.
  #[instrument(skip(self))]
  pub async fn get_user(
    &self,
    user_name_or_email: &str,
  ) -> IdentityResult<Option<User>> {
    let identifier = LoginIdentifier::classify(user_name_or_email);
    debug!(?identifier, "Looking up user");

    let record = self.collection.find_one(&identifier.filter()).await?;
    Ok(record.map(User::from_record))
  }

  /// Create a user from its fields. The store assigns the ID.
  #[instrument(skip(self, fields))]
  pub async fn create_user(&self, fields: Document) -> IdentityResult<User> {
    check_reserved(fields.keys())?;

    let (normalized, _) = normalized_fields(&fields);
    let mut body = fields;
    body.extend(normalized);

    let record = Record::new(ObjectId::new(), body);
    self.collection.insert(&record).await?;

    debug!(id = %record.id, "User created");
    Ok(User::from_record(record))
  }

  /// Set top-level fields of a user.
  ///
  /// Changing the user name or email keeps their normalized copies in step.
  #[instrument(skip(self, fields))]
  pub async fn update_user(
    &self,
    user_id: &str,
    fields: Document,
  ) -> IdentityResult<User> {
    let id = parse_user_id(user_id)?;
    check_reserved(fields.keys())?;

    let (normalized, unset) = normalized_fields(&fields);
    let mut set = fields;
    set.extend(normalized);

    self.modify(user_id, id, &Mutation::Update { set, unset }).await
  }

  /// Replace the element of the array `field` matching `element`, or append
  /// `element` when none matches.
  ///
  /// Both the decision and the write happen in one atomic step on the user
  /// record, so repeating the call never duplicates an element.
  #[instrument(skip(self, element))]
  pub async fn upsert_user_array_item(
    &self,
    user_id: &str,
    field: &str,
    element: Value,
    matcher: ArrayMatch,
  ) -> IdentityResult<User> {
    let id = parse_user_id(user_id)?;
    check_reserved([field])?;

    let mutation = Mutation::UpsertArrayItem {
      field: field.to_owned(),
      element,
      matcher,
    };
    self.modify(user_id, id, &mutation).await
  }

  /// Remove every element of the array `field` matching `identifier`.
  #[instrument(skip(self, identifier))]
  pub async fn drop_user_array_item(
    &self,
    user_id: &str,
    field: &str,
    identifier: Value,
    matcher: ArrayMatch,
  ) -> IdentityResult<User> {
    let id = parse_user_id(user_id)?;
    check_reserved([field])?;

    let mutation = Mutation::PullArrayItems {
      field: field.to_owned(),
      identifier,
      matcher,
    };
    self.modify(user_id, id, &mutation).await
  }

  async fn modify(
    &self,
    user_id: &str,
    id: ObjectId,
    mutation: &Mutation,
  ) -> IdentityResult<User> {
    match self.collection.modify(id, mutation).await? {
      Some(modified) => {
        debug!(applied = ?modified.applied, "User modified");
        Ok(User::from_record(modified.record))
      }
      None => {
        warn!("User not found");
        Err(IdentityError::UserNotFound(user_id.to_owned()))
      }
    }
  }
}

fn parse_user_id(user_id: &str) -> IdentityResult<ObjectId> {
  ObjectId::parse_str(user_id)
    .map_err(|_| IdentityError::MalformedId(user_id.to_owned()))
}

fn check_reserved<I, S>(fields: I) -> IdentityResult<()>
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  for field in fields {
    let field = field.as_ref();
    if RESERVED_FIELDS.contains(&field) {
      return Err(IdentityError::ReservedField(field.to_owned()));
    }
  }
  Ok(())
}

/// Compute normalized copies for the display fields present in `fields`.
///
/// Returns the copies to set and the copies to remove because their display
/// field was cleared.
fn normalized_fields(fields: &Document) -> (Document, Vec<String>) {
  let mut set = Document::new();
  let mut unset = Vec::new();

  for (display, unique) in NORMALIZED_FIELDS {
    match fields.get(display) {
      None => {}
      Some(Value::String(value)) if !value.is_empty() => {
        set.insert(unique.to_owned(), Value::String(normalize(value)));
      }
      Some(_) => unset.push(unique.to_owned()),
    }
  }

  (set, unset)
}
