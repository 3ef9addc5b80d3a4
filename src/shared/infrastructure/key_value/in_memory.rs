// In memory implementation of the KeyValueBackend port.
//
// Purpose
// - Support stream store tests and local development without a database.
//
// Responsibilities
// - Keep one ordered map of records per table.
// - Check every condition and then apply every operation under a single write lock.
// - Offer failure hooks (offline, delay, injected failures) so callers can exercise error paths.

use crate::shared::infrastructure::key_value::{
    AttributeValue, Attributes, BackendError, Key, KeyValueBackend, KeyspaceDefinition, Record,
    WriteOp,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

type Table = BTreeMap<Key, Attributes>;

/// Failure returned by the next `transact_write` call.
#[derive(Debug, Clone)]
pub enum InjectedFailure {
    /// Reject the write without applying it.
    Reject(BackendError),
    /// Apply the write, then report a timeout as if the response had been lost.
    CommitThenTimeout,
}

#[derive(Default)]
pub struct InMemoryKeyValueBackend {
    tables: RwLock<HashMap<String, Table>>,
    offline: bool,
    write_delay_ms: AtomicU64,
    next_write_failure: Mutex<Option<InjectedFailure>>,
}

impl InMemoryKeyValueBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle_offline(&mut self) {
        self.offline = !self.offline;
    }

    /// Delay before the write lock is taken, so concurrent writers interleave.
    pub fn set_write_delay_ms(&self, ms: u64) {
        self.write_delay_ms.store(ms, Ordering::SeqCst);
    }

    pub async fn fail_next_write(&self, failure: InjectedFailure) {
        *self.next_write_failure.lock().await = Some(failure);
    }

    fn ensure_online(&self) -> Result<(), BackendError> {
        if self.offline {
            return Err(BackendError::Unavailable("Key value backend offline".into()));
        }
        Ok(())
    }
}

fn check(table: &Table, ops: &[WriteOp]) -> Result<(), BackendError> {
    let mut seen = HashSet::new();
    for (index, op) in ops.iter().enumerate() {
        let key = op.key();
        if !seen.insert(key) {
            return Err(BackendError::Malformed(format!(
                "multiple operations target {}/{}",
                key.partition, key.sort
            )));
        }
        let current = table.get(key);
        if let WriteOp::Increment { attribute, .. } = op {
            let numeric = current
                .and_then(|attributes| attributes.get(attribute))
                .is_none_or(|value| value.as_n().is_some());
            if !numeric {
                return Err(BackendError::Malformed(format!(
                    "attribute {attribute} is not a number"
                )));
            }
        }
        if let Some(condition) = op.condition() {
            if !condition.holds(current) {
                return Err(BackendError::ConditionFailed {
                    index,
                    current: current.map(|attributes| Record {
                        key: key.clone(),
                        attributes: attributes.clone(),
                    }),
                });
            }
        }
    }
    Ok(())
}

fn apply(table: &mut Table, ops: Vec<WriteOp>) {
    for op in ops {
        match op {
            WriteOp::Increment {
                key, attribute, by, ..
            } => {
                let record = table.entry(key).or_default();
                let current = record
                    .get(&attribute)
                    .and_then(AttributeValue::as_n)
                    .unwrap_or(0);
                record.insert(attribute, AttributeValue::N(current + by));
            }
            WriteOp::Insert {
                key, attributes, ..
            } => {
                table.insert(key, attributes);
            }
        }
    }
}

#[async_trait::async_trait]
impl KeyValueBackend for InMemoryKeyValueBackend {
    async fn transact_write(&self, table: &str, ops: Vec<WriteOp>) -> Result<(), BackendError> {
        self.ensure_online()?;
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let commit_then_timeout = match self.next_write_failure.lock().await.take() {
            Some(InjectedFailure::Reject(error)) => return Err(error),
            Some(InjectedFailure::CommitThenTimeout) => true,
            None => false,
        };

        let mut tables = self.tables.write().await;
        let records = tables
            .get_mut(table)
            .ok_or_else(|| BackendError::NoSuchKeyspace(table.to_string()))?;
        check(records, &ops)?;
        tracing::trace!(table, ops = ops.len(), "applying transaction");
        apply(records, ops);

        if commit_then_timeout {
            return Err(BackendError::Timeout("response lost after commit".into()));
        }
        Ok(())
    }

    async fn query(&self, table: &str, partition: &str) -> Result<Vec<Record>, BackendError> {
        self.ensure_online()?;
        let tables = self.tables.read().await;
        let records = tables
            .get(table)
            .ok_or_else(|| BackendError::NoSuchKeyspace(table.to_string()))?;
        Ok(records
            .range(Key::new(partition, "")..)
            .take_while(|(key, _)| key.partition == partition)
            .map(|(key, attributes)| Record {
                key: key.clone(),
                attributes: attributes.clone(),
            })
            .collect())
    }

    async fn create_keyspace(&self, definition: &KeyspaceDefinition) -> Result<(), BackendError> {
        self.ensure_online()?;
        let mut tables = self.tables.write().await;
        if tables.contains_key(&definition.table) {
            return Err(BackendError::KeyspaceExists(definition.table.clone()));
        }
        tracing::debug!(
            table = %definition.table,
            partition_key = %definition.partition_key,
            sort_key = %definition.sort_key,
            "created keyspace"
        );
        tables.insert(definition.table.clone(), Table::new());
        Ok(())
    }
}
