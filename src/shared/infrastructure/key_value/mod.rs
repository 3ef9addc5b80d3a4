// Port for the transactional key-value backend the stream store runs on.
//
// Purpose
// - Describe the three capabilities the store needs: atomic conditional writes,
//   range queries by partition key, and keyspace creation.
//
// Responsibilities
// - Model keys, attribute values, conditions, and write operations as plain data.
// - Define the condition semantics every backend must honour.
//
// Boundaries
// - No concrete input or output here. Adapters implement `KeyValueBackend`.
//
// Testing guidance
// - Use the in memory backend for store tests and local development.

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

pub mod in_memory;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    S(String),
    N(i64),
}

impl AttributeValue {
    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            AttributeValue::N(_) => None,
        }
    }

    pub fn as_n(&self) -> Option<i64> {
        match self {
            AttributeValue::N(n) => Some(*n),
            AttributeValue::S(_) => None,
        }
    }
}

pub type Attributes = BTreeMap<String, AttributeValue>;

/// Two part key. Records sharing a partition are returned together, ordered by `sort`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    pub partition: String,
    pub sort: String,
}

impl Key {
    pub fn new(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: sort.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Key,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// No record exists at the operation's key.
    NotExists,
    /// A record exists and its numeric `attribute` equals `value`.
    NumberEquals { attribute: String, value: i64 },
}

impl Condition {
    pub fn holds(&self, current: Option<&Attributes>) -> bool {
        match self {
            Condition::NotExists => current.is_none(),
            Condition::NumberEquals { attribute, value } => current
                .and_then(|attributes| attributes.get(attribute))
                .and_then(AttributeValue::as_n)
                .is_some_and(|n| n == *value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Add `by` to a numeric attribute. An absent record or attribute starts at 0.
    Increment {
        key: Key,
        attribute: String,
        by: i64,
        condition: Option<Condition>,
    },
    /// Put a whole record at `key`.
    Insert {
        key: Key,
        attributes: Attributes,
        condition: Option<Condition>,
    },
}

impl WriteOp {
    pub fn key(&self) -> &Key {
        match self {
            WriteOp::Increment { key, .. } | WriteOp::Insert { key, .. } => key,
        }
    }

    pub fn condition(&self) -> Option<&Condition> {
        match self {
            WriteOp::Increment { condition, .. } | WriteOp::Insert { condition, .. } => {
                condition.as_ref()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyspaceDefinition {
    pub table: String,
    pub partition_key: String,
    pub sort_key: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The operation at `index` failed its condition. `current` is the record as it stood, if any.
    #[error("transaction cancelled: condition failed on operation {index}")]
    ConditionFailed {
        index: usize,
        current: Option<Record>,
    },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("throughput exceeded: {0}")]
    Throttled(String),

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("keyspace {0} does not exist")]
    NoSuchKeyspace(String),

    #[error("keyspace {0} already exists")]
    KeyspaceExists(String),
}

#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    /// Apply every operation or none of them.
    async fn transact_write(&self, table: &str, ops: Vec<WriteOp>) -> Result<(), BackendError>;

    /// All records under `partition`, sorted by sort key ascending.
    async fn query(&self, table: &str, partition: &str) -> Result<Vec<Record>, BackendError>;

    async fn create_keyspace(&self, definition: &KeyspaceDefinition) -> Result<(), BackendError>;
}

#[cfg(test)]
mod key_value_condition_tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn version_two() -> Attributes {
        Attributes::from([("VERSION".to_string(), AttributeValue::N(2))])
    }

    #[rstest]
    fn it_should_hold_not_exists_only_for_missing_records(version_two: Attributes) {
        assert!(Condition::NotExists.holds(None));
        assert!(!Condition::NotExists.holds(Some(&version_two)));
    }

    #[rstest]
    #[case(2, true)]
    #[case(1, false)]
    #[case(3, false)]
    fn it_should_compare_the_numeric_attribute(
        version_two: Attributes,
        #[case] value: i64,
        #[case] holds: bool,
    ) {
        let condition = Condition::NumberEquals {
            attribute: "VERSION".to_string(),
            value,
        };
        assert_eq!(condition.holds(Some(&version_two)), holds);
    }

    #[rstest]
    fn it_should_not_hold_number_equals_for_missing_records_or_attributes() {
        let condition = Condition::NumberEquals {
            attribute: "VERSION".to_string(),
            value: 0,
        };
        assert!(!condition.holds(None));
        let text = Attributes::from([("VERSION".to_string(), AttributeValue::S("0".to_string()))]);
        assert!(!condition.holds(Some(&text)));
    }
}
