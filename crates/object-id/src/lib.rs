//! Provides [`ObjectId`], the identifier assigned to every stored document.
//!
//! An [`ObjectId`] is twelve bytes: a four byte big-endian creation time in
//! seconds, five bytes unique to the running process, and a three byte
//! counter. Its external form is a 24 character hexadecimal string.

#[cfg(test)]
mod tests;

use std::{
  fmt,
  str::FromStr,
  sync::{
    OnceLock,
    atomic::{AtomicU32, Ordering},
  },
};

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Length of the hexadecimal form of an [`ObjectId`].
pub const HEX_LEN: usize = 24;

const COUNTER_MASK: u32 = 0x00FF_FFFF;

/// Errors produced when parsing an [`ObjectId`] from its hexadecimal form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Diagnostic)]
pub enum ObjectIdError {
  /// The input was not exactly [`HEX_LEN`] bytes long.
  #[error("Object ID must be {HEX_LEN} characters long, got {0}")]
  InvalidLength(usize),

  /// The input contained something other than hexadecimal digits.
  #[error("Object ID must only contain hexadecimal digits")]
  InvalidCharacter,
}

/// A 12-byte document identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
  /// Generates a new [`ObjectId`] stamped with the current time.
  #[must_use]
  pub fn new() -> Self {
    let seconds = u32::try_from(Utc::now().timestamp()).unwrap_or_default();
    let counter = next_counter();

    let mut bytes = [0u8; 12];
    bytes[..4].copy_from_slice(&seconds.to_be_bytes());
    bytes[4..9].copy_from_slice(process_unique());
    bytes[9..].copy_from_slice(&counter.to_be_bytes()[1..]);

    Self(bytes)
  }

  /// Creates an [`ObjectId`] from raw bytes.
  #[must_use]
  pub const fn from_bytes(bytes: [u8; 12]) -> Self { Self(bytes) }

  /// Returns the raw bytes.
  #[must_use]
  pub const fn bytes(&self) -> [u8; 12] { self.0 }

  /// Parses the hexadecimal form. Upper and lower case digits are accepted.
  pub fn parse_str(input: &str) -> Result<Self, ObjectIdError> {
    if input.len() != HEX_LEN {
      return Err(ObjectIdError::InvalidLength(input.len()));
    }

    let mut bytes = [0u8; 12];
    hex::decode_to_slice(input, &mut bytes)
      .map_err(|_| ObjectIdError::InvalidCharacter)?;

    Ok(Self(bytes))
  }

  /// Returns whether `input` is a well-formed hexadecimal [`ObjectId`].
  #[must_use]
  pub fn is_valid(input: &str) -> bool { Self::parse_str(input).is_ok() }

  /// Returns the lowercase hexadecimal form.
  #[must_use]
  pub fn to_hex(&self) -> String { hex::encode(self.0) }

  /// Returns the creation time encoded in the identifier.
  #[must_use]
  pub fn timestamp(&self) -> DateTime<Utc> {
    let seconds =
      u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]]);
    DateTime::from_timestamp(i64::from(seconds), 0).unwrap_or_default()
  }
}

impl Default for ObjectId {
  fn default() -> Self { Self::new() }
}

fn process_unique() -> &'static [u8; 5] {
  static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();
  PROCESS_UNIQUE.get_or_init(|| {
    let mut bytes = [0u8; 5];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
  })
}

fn next_counter() -> u32 {
  static COUNTER: OnceLock<AtomicU32> = OnceLock::new();
  let counter = COUNTER.get_or_init(|| {
    AtomicU32::new(rand::thread_rng().next_u32() & COUNTER_MASK)
  });
  counter.fetch_add(1, Ordering::Relaxed) & COUNTER_MASK
}

impl fmt::Display for ObjectId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_hex())
  }
}

impl fmt::Debug for ObjectId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ObjectId({})", self.to_hex())
  }
}

impl FromStr for ObjectId {
  type Err = ObjectIdError;

  fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse_str(s) }
}

impl Serialize for ObjectId {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.to_hex())
  }
}

impl<'de> Deserialize<'de> for ObjectId {
  fn deserialize<D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Self, D::Error> {
    let input = String::deserialize(deserializer)?;
    Self::parse_str(&input).map_err(de::Error::custom)
  }
}
