// Stream store over a transactional key-value backend.
//
// Purpose
// - Append events to named streams and read them back in insertion order.
//
// Responsibilities
// - Submit the version step and the insert step of a write as one atomic transaction.
// - Turn a failed version condition into a version mismatch, and a lost response into an
//   indeterminate outcome.
// - Split the records of one range query into the version and the ordered events.
//
// Boundaries
// - Owns nothing but the injected backend handle and the table name. No retries, no locks.

use crate::shared::core::primitives::OrderKey;
use crate::shared::infrastructure::event_store::records::{
    self, EventRecord, INSERT_STEP, StoredRecord, VERSION_STEP,
};
use crate::shared::infrastructure::event_store::{
    Event, EventStoreError, EventStream, ExpectedVersion, StreamSnapshot,
};
use crate::shared::infrastructure::key_value::{BackendError, KeyValueBackend};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStoreConfig {
    pub table_name: String,
    /// Upper bound on a single write. Elapsing makes the outcome indeterminate.
    pub write_timeout_ms: Option<u64>,
}

impl Default for StreamStoreConfig {
    fn default() -> Self {
        Self {
            table_name: "events".to_string(),
            write_timeout_ms: None,
        }
    }
}

pub struct StreamStore<TBackend>
where
    TBackend: KeyValueBackend + 'static,
{
    backend: Arc<TBackend>,
    table: String,
    write_timeout: Option<Duration>,
}

impl<TBackend> StreamStore<TBackend>
where
    TBackend: KeyValueBackend + 'static,
{
    pub fn new(backend: Arc<TBackend>, table: impl Into<String>) -> Self {
        Self {
            backend,
            table: table.into(),
            write_timeout: None,
        }
    }

    pub fn with_config(backend: Arc<TBackend>, config: &StreamStoreConfig) -> Self {
        Self {
            backend,
            table: config.table_name.clone(),
            write_timeout: config.write_timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the backing table. A table that already exists counts as provisioned.
    pub async fn provision(&self) -> Result<(), EventStoreError> {
        match self.backend.create_keyspace(&records::keyspace(&self.table)).await {
            Ok(()) => {
                tracing::info!(table = %self.table, "provisioned event table");
                Ok(())
            }
            Err(BackendError::KeyspaceExists(_)) => {
                tracing::info!(table = %self.table, "event table already provisioned");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn append<P: Serialize>(
        &self,
        stream: &str,
        event: &Event<P>,
    ) -> Result<(), EventStoreError> {
        self.write(stream, event, ExpectedVersion::Any).await
    }

    pub async fn write<P: Serialize>(
        &self,
        stream: &str,
        event: &Event<P>,
        expected: ExpectedVersion,
    ) -> Result<(), EventStoreError> {
        let data =
            serde_json::to_string(&event.payload).map_err(|source| EventStoreError::Encode {
                event_type: event.event_type.clone(),
                source,
            })?;
        let record = EventRecord {
            order_key: OrderKey::generate(),
            event_type: event.event_type.clone(),
            data,
        };
        let ops = vec![
            records::version_step(stream, expected)?,
            records::insert_step(stream, &record),
        ];

        let submitted = self.backend.transact_write(&self.table, ops);
        let outcome = match self.write_timeout {
            Some(limit) => match tokio::time::timeout(limit, submitted).await {
                Ok(outcome) => outcome,
                Err(_) => Err(BackendError::Timeout(format!(
                    "no response within {}ms",
                    limit.as_millis()
                ))),
            },
            None => submitted.await,
        };

        match outcome {
            Ok(()) => {
                tracing::debug!(
                    stream,
                    %expected,
                    order_key = %record.order_key,
                    event_type = %record.event_type,
                    "appended event"
                );
                Ok(())
            }
            Err(BackendError::ConditionFailed {
                index: VERSION_STEP,
                current,
            }) => {
                let actual = records::current_version(current.as_ref());
                tracing::warn!(stream, %expected, actual, "version mismatch");
                Err(EventStoreError::VersionMismatch {
                    stream: stream.to_string(),
                    expected,
                    actual,
                })
            }
            Err(BackendError::ConditionFailed {
                index: INSERT_STEP, ..
            }) => {
                tracing::warn!(stream, order_key = %record.order_key, "order key collision");
                Err(EventStoreError::Backend(BackendError::Malformed(format!(
                    "order key {} already exists on stream {stream}",
                    record.order_key
                ))))
            }
            Err(BackendError::Timeout(reason)) => {
                tracing::warn!(stream, %reason, "write outcome unknown");
                Err(EventStoreError::IndeterminateOutcome {
                    stream: stream.to_string(),
                    reason,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn read<P: DeserializeOwned>(
        &self,
        stream: &str,
    ) -> Result<StreamSnapshot<P>, EventStoreError> {
        let fetched = self.backend.query(&self.table, stream).await?;

        let mut version = 0;
        let mut events = Vec::with_capacity(fetched.len());
        for record in fetched {
            match StoredRecord::decode(stream, record)? {
                StoredRecord::Version(record) => version = record.version,
                StoredRecord::Event(record) => events.push(record),
            }
        }
        tracing::debug!(stream, version, events = events.len(), "read stream");

        Ok(StreamSnapshot {
            name: stream.to_string(),
            version,
            events: EventStream::new(stream, events),
        })
    }
}
