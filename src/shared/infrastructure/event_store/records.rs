// Record layout of a stream inside the key-value backend.
//
// Layout
// - Partition key STREAM: the stream name.
// - Sort key SORT: `$VERSION` for the single version record, `EVENT-<order key>` for each event.
// - Version record: numeric VERSION.
// - Event record: string TYPE and string DATA (the JSON encoded payload).
//
// Decoding
// - Raw records are classified by their sort key marker into exactly one StoredRecord variant.

use crate::shared::core::primitives::OrderKey;
use crate::shared::infrastructure::event_store::{EventStoreError, ExpectedVersion, RecordedEvent};
use crate::shared::infrastructure::key_value::{
    AttributeValue, Attributes, BackendError, Condition, Key, KeyspaceDefinition, Record, WriteOp,
};
use serde::de::DeserializeOwned;

pub const PARTITION_KEY: &str = "STREAM";
pub const SORT_KEY: &str = "SORT";
pub const VERSION_MARKER: &str = "$VERSION";
pub const EVENT_PREFIX: &str = "EVENT-";

pub const VERSION: &str = "VERSION";
pub const TYPE: &str = "TYPE";
pub const DATA: &str = "DATA";

/// Position of each step inside the write transaction.
pub const VERSION_STEP: usize = 0;
pub const INSERT_STEP: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub order_key: OrderKey,
    pub event_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredRecord {
    Version(VersionRecord),
    Event(EventRecord),
}

pub fn keyspace(table: &str) -> KeyspaceDefinition {
    KeyspaceDefinition {
        table: table.to_string(),
        partition_key: PARTITION_KEY.to_string(),
        sort_key: SORT_KEY.to_string(),
    }
}

pub fn version_key(stream: &str) -> Key {
    Key::new(stream, VERSION_MARKER)
}

pub fn event_key(stream: &str, order_key: &OrderKey) -> Key {
    Key::new(stream, format!("{EVENT_PREFIX}{order_key}"))
}

/// Bump the version by one, guarded by the writer's expectation.
pub fn version_step(stream: &str, expected: ExpectedVersion) -> Result<WriteOp, BackendError> {
    let condition = match expected {
        ExpectedVersion::Any => None,
        ExpectedVersion::NoStream | ExpectedVersion::Exact(0) => Some(Condition::NotExists),
        ExpectedVersion::Exact(version) => {
            let value = i64::try_from(version).map_err(|_| {
                BackendError::Malformed(format!("expected version {version} is out of range"))
            })?;
            Some(Condition::NumberEquals {
                attribute: VERSION.to_string(),
                value,
            })
        }
    };
    Ok(WriteOp::Increment {
        key: version_key(stream),
        attribute: VERSION.to_string(),
        by: 1,
        condition,
    })
}

/// Put the event under a fresh key. The guard only trips if two keys ever collide.
pub fn insert_step(stream: &str, event: &EventRecord) -> WriteOp {
    WriteOp::Insert {
        key: event_key(stream, &event.order_key),
        attributes: Attributes::from([
            (TYPE.to_string(), AttributeValue::S(event.event_type.clone())),
            (DATA.to_string(), AttributeValue::S(event.data.clone())),
        ]),
        condition: Some(Condition::NotExists),
    }
}

/// Version carried by a version record returned alongside a failed condition. Absent means 0.
pub fn current_version(record: Option<&Record>) -> u64 {
    record
        .and_then(|record| record.attributes.get(VERSION))
        .and_then(AttributeValue::as_n)
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(0)
}

impl StoredRecord {
    pub fn decode(stream: &str, record: Record) -> Result<Self, EventStoreError> {
        let malformed = |reason: String| EventStoreError::MalformedRecord {
            stream: stream.to_string(),
            sort: record.key.sort.clone(),
            reason,
        };

        if record.key.sort == VERSION_MARKER {
            let version = record
                .attributes
                .get(VERSION)
                .and_then(AttributeValue::as_n)
                .ok_or_else(|| malformed(format!("missing numeric {VERSION}")))?;
            let version = u64::try_from(version)
                .map_err(|_| malformed(format!("negative {VERSION} {version}")))?;
            return Ok(StoredRecord::Version(VersionRecord { version }));
        }

        let Some(order_key) = record.key.sort.strip_prefix(EVENT_PREFIX) else {
            return Err(malformed("unknown sort key marker".to_string()));
        };
        let order_key = order_key
            .parse::<OrderKey>()
            .map_err(|e| malformed(e.to_string()))?;
        let text = |name: &str| {
            record
                .attributes
                .get(name)
                .and_then(AttributeValue::as_s)
                .map(str::to_string)
                .ok_or_else(|| malformed(format!("missing string {name}")))
        };
        Ok(StoredRecord::Event(EventRecord {
            order_key,
            event_type: text(TYPE)?,
            data: text(DATA)?,
        }))
    }
}

impl EventRecord {
    pub fn decode<P: DeserializeOwned>(
        self,
        stream: &str,
    ) -> Result<RecordedEvent<P>, EventStoreError> {
        let payload = serde_json::from_str(&self.data).map_err(|source| EventStoreError::Decode {
            stream: stream.to_string(),
            order_key: self.order_key,
            source,
        })?;
        Ok(RecordedEvent {
            order_key: self.order_key,
            event_type: self.event_type,
            payload,
        })
    }
}

#[cfg(test)]
mod stream_record_tests {
    use super::*;
    use rstest::{fixture, rstest};

    const STREAM: &str = "ponies";

    #[fixture]
    fn event_record() -> EventRecord {
        EventRecord {
            order_key: OrderKey::generate(),
            event_type: "PonyJumped".to_string(),
            data: r#"{"pony":"SparkleHooves","height":5}"#.to_string(),
        }
    }

    fn raw(sort: &str, attributes: Attributes) -> Record {
        Record {
            key: Key::new(STREAM, sort),
            attributes,
        }
    }

    #[rstest]
    #[case(ExpectedVersion::Any, None)]
    #[case(ExpectedVersion::NoStream, Some(Condition::NotExists))]
    #[case(ExpectedVersion::Exact(0), Some(Condition::NotExists))]
    #[case(
        ExpectedVersion::Exact(3),
        Some(Condition::NumberEquals { attribute: VERSION.to_string(), value: 3 })
    )]
    fn it_should_encode_the_expectation_as_a_condition(
        #[case] expected: ExpectedVersion,
        #[case] condition: Option<Condition>,
    ) {
        let op = version_step(STREAM, expected).unwrap();
        assert_eq!(
            op,
            WriteOp::Increment {
                key: Key::new(STREAM, VERSION_MARKER),
                attribute: VERSION.to_string(),
                by: 1,
                condition,
            }
        );
    }

    #[rstest]
    fn it_should_reject_expectations_beyond_the_counter_range() {
        let result = version_step(STREAM, ExpectedVersion::Exact(u64::MAX));
        assert!(matches!(result, Err(BackendError::Malformed(_))));
    }

    #[rstest]
    fn it_should_key_events_by_prefixed_order_key(event_record: EventRecord) {
        let op = insert_step(STREAM, &event_record);
        assert_eq!(op.key().sort, format!("EVENT-{}", event_record.order_key));
        assert_eq!(op.condition(), Some(&Condition::NotExists));
    }

    #[rstest]
    fn it_should_decode_an_inserted_event_back(event_record: EventRecord) {
        let WriteOp::Insert { key, attributes, .. } = insert_step(STREAM, &event_record) else {
            panic!("expected an insert");
        };
        let decoded = StoredRecord::decode(STREAM, Record { key, attributes }).unwrap();
        assert_eq!(decoded, StoredRecord::Event(event_record));
    }

    #[rstest]
    fn it_should_decode_the_version_record() {
        let record = raw(
            VERSION_MARKER,
            Attributes::from([(VERSION.to_string(), AttributeValue::N(4))]),
        );
        assert_eq!(
            StoredRecord::decode(STREAM, record).unwrap(),
            StoredRecord::Version(VersionRecord { version: 4 })
        );
    }

    #[rstest]
    #[case::unknown_marker(raw("SNAPSHOT-1", Attributes::new()))]
    #[case::bad_order_key(raw("EVENT-nope", Attributes::new()))]
    #[case::missing_version(raw(VERSION_MARKER, Attributes::new()))]
    #[case::negative_version(raw(
        VERSION_MARKER,
        Attributes::from([(VERSION.to_string(), AttributeValue::N(-1))])
    ))]
    fn it_should_reject_malformed_records(#[case] record: Record) {
        assert!(matches!(
            StoredRecord::decode(STREAM, record),
            Err(EventStoreError::MalformedRecord { .. })
        ));
    }

    #[rstest]
    fn it_should_reject_events_without_a_type() {
        let sort = format!("EVENT-{}", OrderKey::generate());
        let record = raw(
            &sort,
            Attributes::from([(DATA.to_string(), AttributeValue::S("{}".to_string()))]),
        );
        match StoredRecord::decode(STREAM, record) {
            Err(EventStoreError::MalformedRecord { reason, .. }) => {
                assert_eq!(reason, "missing string TYPE")
            }
            other => panic!("expected MalformedRecord, got {other:?}"),
        }
    }

    #[rstest]
    fn it_should_read_the_current_version_of_a_conflicting_record() {
        let record = raw(
            VERSION_MARKER,
            Attributes::from([(VERSION.to_string(), AttributeValue::N(2))]),
        );
        assert_eq!(current_version(Some(&record)), 2);
        assert_eq!(current_version(None), 0);
    }
}
