// Public types of the stream store: events, version expectations, snapshots, errors.
//
// Purpose
// - Give callers a typed surface over streams whose records live in a key-value backend.
//
// Responsibilities
// - Describe the concurrency precondition a writer asserts (ExpectedVersion).
// - Expose a read as a point in time snapshot whose events decode lazily, one element at a time.
//
// Boundaries
// - The write and read protocol lives in stream_store.rs, the record layout in records.rs.

use crate::shared::core::primitives::OrderKey;
use crate::shared::infrastructure::key_value::BackendError;
use records::EventRecord;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;

pub mod records;
pub mod stream_store;

/// A typed event: a free-form discriminator plus a payload only the caller interprets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event<P> {
    pub event_type: String,
    pub payload: P,
}

impl<P> Event<P> {
    pub fn new(event_type: impl Into<String>, payload: P) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }
}

/// An event as read back from a stream, with the order key it was stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent<P> {
    pub order_key: OrderKey,
    pub event_type: String,
    pub payload: P,
}

impl<P> RecordedEvent<P> {
    pub fn into_event(self) -> Event<P> {
        Event {
            event_type: self.event_type,
            payload: self.payload,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpectedVersion {
    /// Append whatever the stream's current state is.
    #[default]
    Any,
    /// The stream must not exist yet. Same as `Exact(0)`.
    NoStream,
    /// The stream's current version must be exactly this.
    Exact(u64),
}

impl fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedVersion::Any => write!(f, "any"),
            ExpectedVersion::NoStream => write!(f, "no stream"),
            ExpectedVersion::Exact(version) => write!(f, "{version}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("version mismatch on stream {stream}: expected {expected}, actual {actual}")]
    VersionMismatch {
        stream: String,
        expected: ExpectedVersion,
        actual: u64,
    },

    /// The write may or may not have committed. Re-read the stream to find out.
    #[error("outcome of write to stream {stream} is unknown: {reason}")]
    IndeterminateOutcome { stream: String, reason: String },

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("failed to encode {event_type} payload: {source}")]
    Encode {
        event_type: String,
        source: serde_json::Error,
    },

    #[error("failed to decode event {order_key} on stream {stream}: {source}")]
    Decode {
        stream: String,
        order_key: OrderKey,
        source: serde_json::Error,
    },

    #[error("malformed record {sort} on stream {stream}: {reason}")]
    MalformedRecord {
        stream: String,
        sort: String,
        reason: String,
    },
}

impl EventStoreError {
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, EventStoreError::VersionMismatch { .. })
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, EventStoreError::IndeterminateOutcome { .. })
    }
}

/// Forward only events of one fetch, in insertion order.
/// Each payload is decoded when its element is produced.
#[derive(Debug)]
pub struct EventStream<P> {
    stream: String,
    records: std::vec::IntoIter<EventRecord>,
    payload: PhantomData<fn() -> P>,
}

impl<P> EventStream<P> {
    pub(crate) fn new(stream: impl Into<String>, records: Vec<EventRecord>) -> Self {
        Self {
            stream: stream.into(),
            records: records.into_iter(),
            payload: PhantomData,
        }
    }
}

impl<P: DeserializeOwned> Iterator for EventStream<P> {
    type Item = Result<RecordedEvent<P>, EventStoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(record.decode(&self.stream))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}

impl<P: DeserializeOwned> ExactSizeIterator for EventStream<P> {}

#[derive(Debug)]
pub struct StreamSnapshot<P> {
    pub name: String,
    pub version: u64,
    pub events: EventStream<P>,
}
