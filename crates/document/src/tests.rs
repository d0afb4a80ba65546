use serde_json::json;

use super::*;

fn body(value: Value) -> Document {
  match value {
    Value::Object(map) => map,
    _ => panic!("expected an object"),
  }
}

fn upsert(field: &str, element: Value, matcher: ArrayMatch) -> Mutation {
  Mutation::UpsertArrayItem {
    field: field.to_owned(),
    element,
    matcher,
  }
}

// --- Match conditions ---

#[test]
fn test_whole_value_condition_is_equality() {
  let element = json!({ "key": 1, "payload": 1 });
  let condition = ArrayMatch::WholeValue.condition(&element);

  assert_eq!(condition, MatchCondition::Equals(&element));
  assert!(condition.matches(&json!({ "key": 1, "payload": 1 })));
  assert!(!condition.matches(&json!({ "key": 1, "payload": 2 })));
}

#[test]
fn test_sub_field_condition_uses_element_key() {
  let element = json!({ "key": 1, "payload": 3 });
  let matcher = ArrayMatch::sub_field("key");
  let condition = matcher.condition(&element);

  assert_eq!(condition, MatchCondition::FieldEquals {
    key:        "key",
    identifier: &json!(1),
  });
  assert!(condition.matches(&json!({ "key": 1, "payload": 1 })));
  assert!(!condition.matches(&json!({ "key": 2, "payload": 3 })));
  assert!(!condition.matches(&json!(1)));
}

#[test]
fn test_sub_field_condition_with_bare_identifier() {
  let identifier = json!("abc");
  let matcher = ArrayMatch::sub_field("id");
  let condition = matcher.condition(&identifier);

  assert!(condition.matches(&json!({ "id": "abc", "type": "x" })));
  assert!(!condition.matches(&json!("abc")));
}

#[test]
fn test_null_key_value_is_data_not_mode() {
  let element = json!({ "key": null, "payload": 1 });
  let matcher = ArrayMatch::sub_field("key");
  let condition = matcher.condition(&element);

  assert!(condition.matches(&json!({ "key": null, "payload": 9 })));
  assert!(condition.matches(&json!({ "payload": 9 })));
  assert!(!condition.matches(&json!({ "key": 0 })));
}

// --- Upsert ---

#[test]
fn test_upsert_appends_when_absent() {
  let mut doc = body(json!({
    "items": [{ "key": 1, "payload": 1 }, { "key": 2, "payload": 2 }]
  }));

  let applied = upsert(
    "items",
    json!({ "key": 3, "payload": 3 }),
    ArrayMatch::sub_field("key"),
  )
  .apply(&mut doc)
  .unwrap();

  assert_eq!(applied, Applied::Appended);
  assert_eq!(
    doc["items"],
    json!([
      { "key": 1, "payload": 1 },
      { "key": 2, "payload": 2 },
      { "key": 3, "payload": 3 }
    ])
  );
}

#[test]
fn test_upsert_replaces_when_present() {
  let mut doc = body(json!({ "items": [{ "key": 1, "payload": 1 }] }));

  let applied = upsert(
    "items",
    json!({ "key": 1, "payload": 3 }),
    ArrayMatch::sub_field("key"),
  )
  .apply(&mut doc)
  .unwrap();

  assert_eq!(applied, Applied::Replaced { index: 0 });
  assert_eq!(doc["items"], json!([{ "key": 1, "payload": 3 }]));
}

#[test]
fn test_upsert_replace_keeps_position() {
  let mut doc = body(json!({
    "items": [{ "key": 1 }, { "key": 2, "old": true }, { "key": 3 }]
  }));

  let applied = upsert(
    "items",
    json!({ "key": 2, "new": true }),
    ArrayMatch::sub_field("key"),
  )
  .apply(&mut doc)
  .unwrap();

  assert_eq!(applied, Applied::Replaced { index: 1 });
  assert_eq!(
    doc["items"],
    json!([{ "key": 1 }, { "key": 2, "new": true }, { "key": 3 }])
  );
}

#[test]
fn test_upsert_repeated_never_duplicates() {
  let mut doc = Document::new();
  let matcher = ArrayMatch::sub_field("key");

  for payload in 0..3 {
    upsert("items", json!({ "key": 1, "payload": payload }), matcher.clone())
      .apply(&mut doc)
      .unwrap();
  }

  assert_eq!(doc["items"], json!([{ "key": 1, "payload": 2 }]));
}

#[test]
fn test_upsert_creates_missing_field() {
  let mut doc = body(json!({ "name": "x" }));

  let applied = upsert("tags", json!("a"), ArrayMatch::WholeValue)
    .apply(&mut doc)
    .unwrap();

  assert_eq!(applied, Applied::Appended);
  assert_eq!(doc["tags"], json!(["a"]));
}

#[test]
fn test_upsert_whole_value_on_scalars() {
  let mut doc = body(json!({ "tags": ["a", "b"] }));

  let applied = upsert("tags", json!("b"), ArrayMatch::WholeValue)
    .apply(&mut doc)
    .unwrap();
  assert_eq!(applied, Applied::Replaced { index: 1 });

  let applied = upsert("tags", json!("c"), ArrayMatch::WholeValue)
    .apply(&mut doc)
    .unwrap();
  assert_eq!(applied, Applied::Appended);
  assert_eq!(doc["tags"], json!(["a", "b", "c"]));
}

#[test]
fn test_upsert_whole_value_object_is_not_keyed() {
  let mut doc = body(json!({ "items": [{ "key": 1, "payload": 1 }] }));

  let applied = upsert(
    "items",
    json!({ "key": 1, "payload": 2 }),
    ArrayMatch::WholeValue,
  )
  .apply(&mut doc)
  .unwrap();

  assert_eq!(applied, Applied::Appended);
  assert_eq!(doc["items"].as_array().unwrap().len(), 2);
}

#[test]
fn test_upsert_replaces_only_first_duplicate() {
  let mut doc = body(json!({
    "items": [{ "key": 1, "n": 1 }, { "key": 1, "n": 2 }]
  }));

  upsert("items", json!({ "key": 1, "n": 3 }), ArrayMatch::sub_field("key"))
    .apply(&mut doc)
    .unwrap();

  assert_eq!(doc["items"], json!([{ "key": 1, "n": 3 }, { "key": 1, "n": 2 }]));
}

#[test]
fn test_upsert_rejects_non_array_field() {
  let mut doc = body(json!({ "items": "nope" }));

  let result =
    upsert("items", json!(1), ArrayMatch::WholeValue).apply(&mut doc);

  assert_eq!(result, Err(MutationError::NotAnArray("items".to_owned())));
}

// --- Pull & update ---

#[test]
fn test_pull_removes_all_matches() {
  let mut doc = body(json!({
    "auths": [
      { "type": "a", "id": 1 },
      { "type": "b", "id": 2 },
      { "type": "c", "id": 1 }
    ]
  }));

  let applied = Mutation::PullArrayItems {
    field:      "auths".to_owned(),
    identifier: json!(1),
    matcher:    ArrayMatch::sub_field("id"),
  }
  .apply(&mut doc)
  .unwrap();

  assert_eq!(applied, Applied::Pulled { removed: 2 });
  assert_eq!(doc["auths"], json!([{ "type": "b", "id": 2 }]));
}

#[test]
fn test_pull_missing_field_is_noop() {
  let mut doc = Document::new();

  let applied = Mutation::PullArrayItems {
    field:      "tags".to_owned(),
    identifier: json!("a"),
    matcher:    ArrayMatch::WholeValue,
  }
  .apply(&mut doc)
  .unwrap();

  assert_eq!(applied, Applied::Pulled { removed: 0 });
  assert!(!doc.contains_key("tags"));
}

#[test]
fn test_update_sets_and_unsets() {
  let mut doc = body(json!({ "a": 1, "b": 2 }));

  let applied = Mutation::Update {
    set:   body(json!({ "a": 10, "c": 3 })),
    unset: vec!["b".to_owned()],
  }
  .apply(&mut doc)
  .unwrap();

  assert_eq!(applied, Applied::Updated);
  assert_eq!(Value::Object(doc), json!({ "a": 10, "c": 3 }));
}

#[test]
fn test_invalid_field_names_rejected() {
  for field in ["", "a.b", "$push"] {
    let mut doc = Document::new();
    let result =
      upsert(field, json!(1), ArrayMatch::WholeValue).apply(&mut doc);
    assert_eq!(result, Err(MutationError::InvalidField(field.to_owned())));
  }
}

// --- Filters & paths ---

#[test]
fn test_contains_any_element() {
  let doc = body(json!({
    "auths": [{ "type": "fb", "id": "1" }, { "type": "google", "id": "2" }]
  }));

  let mut wanted = Document::new();
  wanted.insert("type".to_owned(), json!("google"));
  wanted.insert("id".to_owned(), json!("2"));
  let query = filter::any_element("auths", wanted);
  assert!(filter::document_contains(&doc, &query));

  let mut crossed = Document::new();
  crossed.insert("type".to_owned(), json!("google"));
  crossed.insert("id".to_owned(), json!("1"));
  let query = filter::any_element("auths", crossed);
  assert!(!filter::document_contains(&doc, &query));
}

#[test]
fn test_contains_field_equals() {
  let doc = body(json!({ "_uqEmail": "a@b.c", "n": 1 }));

  let matches = |query: Document| filter::document_contains(&doc, &query);

  assert!(matches(filter::field_equals("_uqEmail", "a@b.c")));
  assert!(!matches(filter::field_equals("_uqEmail", "x@b.c")));
  assert!(!matches(filter::field_equals("missing", 1)));
}

#[test]
fn test_resolve_path_through_arrays() {
  let doc = body(json!({
    "auths": [{ "type": "a" }, { "id": 1 }, { "type": "b" }]
  }));

  assert_eq!(resolve_path(&doc, "auths.type"), vec![&json!("a"), &json!("b")]);
  assert!(resolve_path(&doc, "nothing.here").is_empty());
}

#[test]
fn test_sparse_index_key() {
  let index = IndexSpec::new("email", ["_uqEmail"]).unique().sparse();

  assert_eq!(index.key_for(&Document::new()), None);
  assert_eq!(
    index.key_for(&body(json!({ "_uqEmail": "a@b.c" }))),
    Some(vec![json!("a@b.c")])
  );

  let dense = IndexSpec::new("email", ["_uqEmail"]).unique();
  assert_eq!(dense.key_for(&Document::new()), Some(vec![Value::Null]));
}

#[test]
fn test_unique_key_text_form() {
  let index = IndexSpec::new("code", ["code", "kind"]).unique();

  assert_eq!(
    index.unique_key_for(&body(json!({ "code": 1, "kind": "a" }))),
    Some(vec!["1".to_owned(), "a".to_owned()])
  );
  assert_eq!(
    index.unique_key_for(&body(json!({ "code": "1", "kind": "a" }))),
    Some(vec!["1".to_owned(), "a".to_owned()])
  );
  assert_eq!(index.unique_key_for(&body(json!({ "code": 1 }))), None);
}
