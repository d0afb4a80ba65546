use document::{Applied, ArrayMatch, Value, json};

use super::*;

fn body(value: Value) -> Document {
  match value {
    Value::Object(map) => map,
    _ => panic!("expected an object"),
  }
}

#[tokio::test]
async fn test_collection_round_trip() {
  let db = Database::new_mock();
  let users = db.collection("users").unwrap();
  let record = Record::new(ObjectId::new(), body(json!({ "name": "Alice" })));

  users.insert(&record).await.unwrap();

  assert_eq!(users.find_by_id(record.id).await.unwrap(), Some(record.clone()));
  assert_eq!(users.count().await.unwrap(), 1);
  assert!(users.delete(record.id).await.unwrap());
  assert!(matches!(
    users.find_by_id_or_error(record.id).await,
    Err(DatabaseError::NotFound(_))
  ));
}

#[tokio::test]
async fn test_collections_are_isolated() {
  let db = Database::new_mock();
  let users = db.collection("users").unwrap();
  let tokens = db.collection("tokens").unwrap();
  let record = Record::new(ObjectId::new(), Document::new());

  users.insert(&record).await.unwrap();

  assert_eq!(tokens.count().await.unwrap(), 0);
  assert_eq!(db.collection("users").unwrap().count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_modify_through_frontend() {
  let db = Database::new_mock();
  let users = db.collection("users").unwrap();
  let record = Record::new(ObjectId::new(), Document::new());
  users.insert(&record).await.unwrap();

  let mutation = Mutation::UpsertArrayItem {
    field:   "tags".to_owned(),
    element: json!("admin"),
    matcher: ArrayMatch::WholeValue,
  };
  let modified = users.modify(record.id, &mutation).await.unwrap().unwrap();

  assert_eq!(modified.applied, Applied::Appended);
  assert_eq!(modified.record.body["tags"], json!(["admin"]));
}

#[tokio::test]
async fn test_debug_shows_collection_name() {
  let db = Database::new_mock();
  let users = db.collection("users").unwrap();

  assert_eq!(format!("{users:?}"), "Collection { name: \"users\" }");
}
