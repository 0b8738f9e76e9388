//! `SQLite` persistence for the provenance ledger.
//!
//! Rows store ids as text and timestamps as RFC 3339; the helpers here turn
//! them back into domain values and report malformed rows as
//! [`StorageError::Serialization`].

mod pool;
pub mod provenance_store;

pub use pool::{create_migrated_test_pool, initialize_database, DatabaseError};
pub use provenance_store::SqliteProvenanceStore;

use chrono::{DateTime, Utc};
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::errors::{StorageError, StorageResult};

fn corrupt(column: &str, detail: impl std::fmt::Display) -> StorageError {
    StorageError::Serialization(format!("bad {column} column: {detail}"))
}

pub(crate) fn parse_uuid(s: &str) -> StorageResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| corrupt("id", e))
}

pub(crate) fn parse_optional_uuid(s: Option<String>) -> StorageResult<Option<Uuid>> {
    s.as_deref().map(parse_uuid).transpose()
}

pub(crate) fn parse_datetime(s: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt("timestamp", e))
}

/// Stage, verdict and criterion columns go through the type's `FromStr`.
pub(crate) fn parse_enum<T: FromStr<Err = String>>(s: &str) -> StorageResult<T> {
    T::from_str(s).map_err(StorageError::Serialization)
}

pub(crate) fn parse_u32(value: i64, column: &str) -> StorageResult<u32> {
    u32::try_from(value).map_err(|_| corrupt(column, format!("{value} out of range")))
}
