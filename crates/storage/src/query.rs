//! Partial-key range queries.
//!
//! [`query`] scans a namespace at one storage location (optionally narrowed
//! by leading key fragments), hydrates one entity per stored record and keeps those
//! accepted by a predicate. Results are collected eagerly in scan order.
//!
//! A record that fails to decode fails the whole query; partial results are
//! never returned. The scan cursor is released on every exit path.

use crate::{
    entity::Entity,
    error::{StorageError, StorageResult},
    keys::decode_composite_key,
    stub::{ChaincodeStub, StateQueryIterator},
    types::StorageLocation,
};

/// Predicate that keeps every entity.
#[must_use]
pub fn accept_all<E>(_entity: &E) -> bool {
    true
}

/// Closes the wrapped cursor when dropped unless it was closed explicitly.
struct ScanCursor<'a> {
    inner: Box<dyn StateQueryIterator + 'a>,
    closed: bool,
}

impl<'a> ScanCursor<'a> {
    fn new(inner: Box<dyn StateQueryIterator + 'a>) -> Self {
        Self { inner, closed: false }
    }

    fn close(mut self) -> StorageResult<()> {
        self.closed = true;
        self.inner.close()
    }
}

impl Drop for ScanCursor<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.inner.close() {
            tracing::warn!(error = %e, "failed to close scan cursor");
        }
    }
}

/// Scans `namespace` at `location` for keys starting with `partial_key`
/// and returns the entities accepted by `predicate`, in scan order.
///
/// `factory` produces a blank entity for every scanned record.
///
/// # Errors
///
/// - Errors opening or advancing the cursor are returned unchanged.
/// - [`StorageError::Corrupt`] if a stored value or its key fails to decode.
#[tracing::instrument(
    skip(stub, location, factory, predicate),
    fields(%location, count = tracing::field::Empty)
)]
pub fn query<E, F, P>(
    stub: &dyn ChaincodeStub,
    location: &StorageLocation,
    namespace: &str,
    partial_key: &[String],
    factory: F,
    predicate: P,
) -> StorageResult<Vec<E>>
where
    E: Entity,
    F: Fn() -> E,
    P: Fn(&E) -> bool,
{
    let cursor = match location {
        StorageLocation::Shared => stub.get_state_by_partial_composite_key(namespace, partial_key)?,
        StorageLocation::Private(collection) => {
            stub.get_private_data_by_partial_composite_key(collection, namespace, partial_key)?
        },
    };
    let mut cursor = ScanCursor::new(cursor);

    let mut entries = Vec::new();
    for response in cursor.inner.by_ref() {
        let response = response?;
        tracing::trace!(key = ?response.key, "scanned record");

        let mut entry = factory();
        entry.fill_from_ledger_value(&response.value).map_err(|e| {
            StorageError::corrupt_with_source("cannot fill entry value from response value", e)
        })?;

        let (_, fragments) = decode_composite_key(&response.key).map_err(|e| {
            StorageError::corrupt_with_source(
                "cannot split response key into composite key fragments",
                e,
            )
        })?;
        entry.fill_from_key_fragments(&fragments).map_err(|e| {
            StorageError::corrupt_with_source(
                "cannot fill entry key from composite key fragments",
                e,
            )
        })?;

        if predicate(&entry) {
            entries.push(entry);
        }
    }

    cursor.close()?;
    tracing::Span::current().record("count", entries.len());
    Ok(entries)
}
