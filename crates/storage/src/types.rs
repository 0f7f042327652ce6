//! Common types used across storage operations.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Key-value pair returned from range scans.
///
/// The key is the full composite ledger key, separators included.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use iot_ledger_storage::KeyValue;
///
/// let kv = KeyValue::new("\u{0}IotGps\u{0}", Bytes::from(r#"{"valid":1}"#));
/// assert_eq!(kv.value.as_ref(), br#"{"valid":1}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    /// The composite key identifying this entry.
    pub key: String,

    /// The value stored at this key.
    pub value: Bytes,
}

impl KeyValue {
    /// Creates a new key-value pair.
    pub fn new(key: impl Into<String>, value: Bytes) -> Self {
        Self { key: key.into(), value }
    }
}

/// Logical timestamp of the executing transaction.
///
/// Supplied by the replicated execution context and identical on every
/// replica executing the same transaction, which makes it the only clock
/// the chaincode may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxTimestamp {
    /// Whole seconds since the Unix epoch.
    pub seconds: i64,
    /// Sub-second nanoseconds, `0..1_000_000_000`.
    pub nanos: i32,
}

impl TxTimestamp {
    /// Creates a timestamp from seconds and nanoseconds.
    #[must_use]
    pub const fn new(seconds: i64, nanos: i32) -> Self {
        Self { seconds, nanos }
    }

    /// Normalizes the timestamp to a UTC instant.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Context`] if the nanoseconds are negative or
    /// the instant is outside the representable range.
    pub fn to_utc(self) -> StorageResult<DateTime<Utc>> {
        let nanos = u32::try_from(self.nanos).map_err(|_| {
            StorageError::context(format!("negative transaction timestamp nanos: {}", self.nanos))
        })?;
        DateTime::from_timestamp(self.seconds, nanos).ok_or_else(|| {
            StorageError::context(format!(
                "transaction timestamp out of range: {}s {}ns",
                self.seconds, self.nanos
            ))
        })
    }
}

/// Where an entity's value lives on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageLocation {
    /// The world state visible to every channel member.
    Shared,
    /// A private data collection visible only to its member organizations.
    Private(String),
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => f.write_str("shared"),
            Self::Private(name) => write!(f, "private:{name}"),
        }
    }
}
