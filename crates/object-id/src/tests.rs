use chrono::Utc;

use super::*;

#[test]
fn test_hex_form_is_24_lowercase_chars() {
  let id = ObjectId::new();
  let hex = id.to_hex();

  assert_eq!(hex.len(), HEX_LEN);
  assert!(hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
}

#[test]
fn test_parse_accepts_mixed_case() {
  let id = ObjectId::parse_str("5A1b2C3d4E5f60718293A4b5").unwrap();
  assert_eq!(id.to_hex(), "5a1b2c3d4e5f60718293a4b5");
}

#[test]
fn test_parse_rejects_wrong_length() {
  assert_eq!(
    ObjectId::parse_str("abc"),
    Err(ObjectIdError::InvalidLength(3))
  );
  assert_eq!(
    ObjectId::parse_str("5a1b2c3d4e5f60718293a4b5ff"),
    Err(ObjectIdError::InvalidLength(26))
  );
}

#[test]
fn test_parse_rejects_non_hex() {
  assert_eq!(
    ObjectId::parse_str("5a1b2c3d4e5f60718293a4bz"),
    Err(ObjectIdError::InvalidCharacter)
  );
  assert!(!ObjectId::is_valid("zzzzzzzzzzzzzzzzzzzzzzzz"));
}

#[test]
fn test_generated_ids_are_distinct() {
  let a = ObjectId::new();
  let b = ObjectId::new();
  assert_ne!(a, b);
  // same process prefix
  assert_eq!(a.bytes()[4..9], b.bytes()[4..9]);
}

#[test]
fn test_timestamp_is_creation_time() {
  let before = Utc::now().timestamp();
  let id = ObjectId::new();
  let after = Utc::now().timestamp();

  let stamp = id.timestamp().timestamp();
  assert!(stamp >= before && stamp <= after);
}

#[test]
fn test_display_and_from_str_agree() {
  let id = ObjectId::new();
  let parsed: ObjectId = id.to_string().parse().unwrap();
  assert_eq!(id, parsed);
}

#[test]
fn test_serde_uses_hex_string() {
  let id = ObjectId::from_bytes([0xab; 12]);
  let json = serde_json::to_value(id).unwrap();
  assert_eq!(json, serde_json::json!("abababababababababababab"));

  let bad: Result<ObjectId, _> =
    serde_json::from_value(serde_json::json!("nope"));
  assert!(bad.is_err());
}
