//! Shared test utilities for ledger-backed tests.
//!
//! This module provides helpers for building transaction contexts, seeding
//! a [`MemoryLedger`] and asserting on [`StorageResult`] values. It is
//! feature-gated behind `testutil` to prevent leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! iot-ledger-storage = { path = "../storage", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use iot_ledger_storage::testutil::{seed, test_context};
//! ```

use bytes::Bytes;

use crate::{
    entity::Entity,
    error::{StorageError, StorageResult},
    memory::{MemoryLedger, TxContext},
    types::TxTimestamp,
};

/// Logical timestamp used by [`test_context`]: 2023-11-14T22:13:20Z.
pub const TEST_TIMESTAMP: TxTimestamp = TxTimestamp::new(1_700_000_000, 0);

/// Builds a transaction context with a fixed timestamp.
#[must_use]
pub fn test_context(tx_id: &str, creator: impl Into<Bytes>) -> TxContext {
    TxContext::builder().tx_id(tx_id).timestamp(TEST_TIMESTAMP).creator(creator).build()
}

/// Writes an entity straight into committed world state.
///
/// # Panics
///
/// Panics if the entity cannot be encoded.
pub fn seed(ledger: &MemoryLedger, entity: &dyn Entity) {
    let key = entity.composite_key().expect("seed: entity key must encode");
    let value = entity.to_ledger_value().expect("seed: entity value must encode");
    ledger.insert_raw(key, value);
}

/// Assert that a [`StorageResult`] is a [`StorageError::NotFound`].
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use iot_ledger_storage::assert_not_found;
/// use iot_ledger_storage::error::{StorageError, StorageResult};
///
/// let result: StorageResult<()> = Err(StorageError::not_found("missing"));
/// assert_not_found!(result);
/// ```
#[macro_export]
macro_rules! assert_not_found {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::NotFound { .. })),
            "expected StorageError::NotFound, got: {:?}",
            $result,
        );
    };
    ($result:expr, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::NotFound { .. })),
            "{}: expected StorageError::NotFound, got: {:?}",
            $msg,
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is a [`StorageError::Corrupt`].
#[macro_export]
macro_rules! assert_corrupt {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::Corrupt { .. })),
            "expected StorageError::Corrupt, got: {:?}",
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is `Ok`.
///
/// Returns the inner value on success, panics with a descriptive message
/// on failure.
#[macro_export]
macro_rules! assert_storage_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got StorageError: {e:?}"),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("{}: expected Ok, got StorageError: {e:?}", $msg),
        }
    };
}

/// Helper to verify that a result is a `NotFound` error.
pub fn is_not_found<T>(result: &StorageResult<T>) -> bool {
    matches!(result, Err(StorageError::NotFound { .. }))
}

/// Helper to verify that a result is a `Corrupt` error.
pub fn is_corrupt<T>(result: &StorageResult<T>) -> bool {
    matches!(result, Err(StorageError::Corrupt { .. }))
}
