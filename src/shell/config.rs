use crate::shared::infrastructure::event_store::stream_store::StreamStoreConfig;
use thiserror::Error;

pub const TABLE_VAR: &str = "EVENT_STORE_TABLE";
pub const WRITE_TIMEOUT_VAR: &str = "EVENT_STORE_WRITE_TIMEOUT_MS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a number of milliseconds, got {value:?}")]
    InvalidTimeout { name: &'static str, value: String },
}

pub fn from_env() -> Result<StreamStoreConfig, ConfigError> {
    from_lookup(|name| std::env::var(name).ok())
}

/// Unset variables keep their defaults.
pub fn from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<StreamStoreConfig, ConfigError> {
    let mut config = StreamStoreConfig::default();
    if let Some(table_name) = lookup(TABLE_VAR).filter(|v| !v.trim().is_empty()) {
        config.table_name = table_name;
    }
    if let Some(value) = lookup(WRITE_TIMEOUT_VAR) {
        let ms = value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidTimeout {
            name: WRITE_TIMEOUT_VAR,
            value: value.clone(),
        })?;
        config.write_timeout_ms = Some(ms);
    }
    Ok(config)
}
