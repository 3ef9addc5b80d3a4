// Order keys position events inside a stream.
//
// Purpose
// - Give every event a globally unique identifier that sorts by creation time.
//
// Responsibilities
// - Wrap a UUIDv7: 48 bits of unix milliseconds followed by random bits.
// - Render it in the lowercase hyphenated form, which sorts lexicographically in generation order.
//
// Boundaries
// - No persisted state. Generation is a pure function of the wall clock plus randomness.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::{Uuid, Version};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderKeyError {
    #[error("invalid order key {0:?}: not a uuid")]
    Invalid(String),

    #[error("invalid order key {0:?}: not a time ordered (v7) uuid")]
    NotTimeOrdered(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderKey(Uuid);

impl OrderKey {
    /// Keys generated by one process are ordered by creation, even within a millisecond.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creation time embedded in the key, at millisecond resolution.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.0.get_timestamp().and_then(|timestamp| {
            let (seconds, nanos) = timestamp.to_unix();
            DateTime::from_timestamp(seconds as i64, nanos)
        })
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for OrderKey {
    type Err = OrderKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::parse_str(s).map_err(|_| OrderKeyError::Invalid(s.to_string()))?;
        match uuid.get_version() {
            Some(Version::SortRand) => Ok(Self(uuid)),
            _ => Err(OrderKeyError::NotTimeOrdered(s.to_string())),
        }
    }
}
