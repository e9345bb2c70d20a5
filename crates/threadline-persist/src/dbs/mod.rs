pub mod sqlite;

#[cfg(feature = "mongodb")]
pub mod mongo;

use chrono::{DateTime, Utc};

use crate::error::{PersistError, Result};

// Both backends store timestamps as UTC microseconds

pub(crate) fn to_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

pub(crate) fn from_micros(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| PersistError::InvalidRecord(format!("timestamp out of range: {}", micros)))
}
