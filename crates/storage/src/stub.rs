//! Ledger runtime interface.
//!
//! This module defines [`ChaincodeStub`], the narrow view of the ledger
//! runtime that the entity framework is written against. The runtime (or
//! [`MemoryStub`](crate::MemoryStub) in tests) supplies:
//!
//! - **World state**: get, put and ordered range scans over composite keys
//! - **Private collections**: get, put and ordered range scans within a named collection
//! - **Validation parameters**: per-key endorsement policies
//! - **Transaction context**: transaction id, logical timestamp, creator certificate
//! - **Notifications**: one named event per transaction
//!
//! # Execution Model
//!
//! Each request runs synchronously to completion inside one transaction.
//! The trait has no async methods and no retry hooks: an error from any
//! method is propagated to the caller immediately, and the runtime discards
//! the transaction's write set.

use bytes::Bytes;

use crate::{
    error::StorageResult,
    keys::partial_key_range,
    types::{KeyValue, TxTimestamp},
};

/// Cursor over the results of a range scan.
///
/// Cursors hold runtime-side resources and must be closed before the
/// request returns. Callers that stop iterating early must still call
/// [`close`](Self::close); implementations should also release the cursor
/// when dropped.
pub trait StateQueryIterator: Iterator<Item = StorageResult<KeyValue>> {
    /// Releases the cursor. Calling `close` more than once is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime fails to release the cursor.
    fn close(&mut self) -> StorageResult<()>;
}

/// The ledger runtime as seen by a single executing transaction.
///
/// Methods take `&self`; implementations buffer writes internally so that
/// a failed transaction leaves no trace.
pub trait ChaincodeStub {
    /// Returns the transaction id every replica agrees on.
    fn tx_id(&self) -> &str;

    /// Returns the transaction's logical timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Context`](crate::StorageError::Context) if the
    /// runtime cannot supply it.
    fn tx_timestamp(&self) -> StorageResult<TxTimestamp>;

    /// Returns the raw certificate of the identity that submitted the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Context`](crate::StorageError::Context) if the
    /// creator identity is unavailable.
    fn creator(&self) -> StorageResult<Bytes>;

    /// Reads a key from the world state.
    ///
    /// Returns `Ok(None)` when the key holds no value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Persist`](crate::StorageError::Persist) on runtime failures.
    fn get_state(&self, key: &str) -> StorageResult<Option<Bytes>>;

    /// Writes a key to the world state, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Persist`](crate::StorageError::Persist) on runtime failures.
    fn put_state(&self, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Reads a key from a private data collection.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Persist`](crate::StorageError::Persist) on runtime failures.
    fn get_private_data(&self, collection: &str, key: &str) -> StorageResult<Option<Bytes>>;

    /// Writes a key to a private data collection.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Persist`](crate::StorageError::Persist) on runtime failures.
    fn put_private_data(&self, collection: &str, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Attaches an endorsement policy to a world-state key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Persist`](crate::StorageError::Persist) on runtime failures.
    fn set_state_validation_parameter(&self, key: &str, policy: Vec<u8>) -> StorageResult<()>;

    /// Attaches an endorsement policy to a key in a private data collection.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Persist`](crate::StorageError::Persist) on runtime failures.
    fn set_private_data_validation_parameter(
        &self,
        collection: &str,
        key: &str,
        policy: Vec<u8>,
    ) -> StorageResult<()>;

    /// Scans world-state keys in `[start_key, end_key)` in ascending order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Persist`](crate::StorageError::Persist) if the
    /// scan cannot be opened.
    fn get_state_by_range(
        &self,
        start_key: &str,
        end_key: &str,
    ) -> StorageResult<Box<dyn StateQueryIterator + '_>>;

    /// Scans every world-state key in `namespace` whose leading fragments
    /// equal `fragments`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`](crate::StorageError::InvalidKey)
    /// for an invalid prefix, or any error from
    /// [`get_state_by_range`](Self::get_state_by_range).
    fn get_state_by_partial_composite_key(
        &self,
        namespace: &str,
        fragments: &[String],
    ) -> StorageResult<Box<dyn StateQueryIterator + '_>> {
        let (start, end) = partial_key_range(namespace, fragments)?;
        self.get_state_by_range(&start, &end)
    }

    /// Scans keys in `[start_key, end_key)` of a private data collection in
    /// ascending order. An unknown collection yields no entries.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Persist`](crate::StorageError::Persist) if the
    /// scan cannot be opened.
    fn get_private_data_by_range(
        &self,
        collection: &str,
        start_key: &str,
        end_key: &str,
    ) -> StorageResult<Box<dyn StateQueryIterator + '_>>;

    /// Scans every key of `collection` in `namespace` whose leading
    /// fragments equal `fragments`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`](crate::StorageError::InvalidKey)
    /// for an invalid prefix, or any error from
    /// [`get_private_data_by_range`](Self::get_private_data_by_range).
    fn get_private_data_by_partial_composite_key(
        &self,
        collection: &str,
        namespace: &str,
        fragments: &[String],
    ) -> StorageResult<Box<dyn StateQueryIterator + '_>> {
        let (start, end) = partial_key_range(namespace, fragments)?;
        self.get_private_data_by_range(collection, &start, &end)
    }

    /// Sets the transaction's notification, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Persist`](crate::StorageError::Persist) on runtime failures.
    fn set_event(&self, name: &str, payload: Option<Vec<u8>>) -> StorageResult<()>;
}
