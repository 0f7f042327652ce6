//! In-memory ledger simulator.
//!
//! This module provides [`MemoryLedger`], an in-memory stand-in for the
//! replicated ledger, and [`MemoryStub`], a transaction simulator over it
//! that implements [`ChaincodeStub`].
//!
//! # Features
//!
//! - **Ordered storage**: World state lives in a [`BTreeMap`] so range scans
//!   return keys in ascending order
//! - **Private collections**: Each collection is its own ordered map
//! - **Buffered writes**: A stub reads committed state only; its writes,
//!   validation parameters and notification are applied by
//!   [`MemoryStub::commit`] or discarded when the stub is dropped
//! - **Cursor accounting**: [`MemoryLedger::open_cursors`] reports scan
//!   cursors that have not been released
//!
//! # Example
//!
//! ```
//! use iot_ledger_storage::{ChaincodeStub, MemoryLedger, TxContext, TxTimestamp};
//!
//! let ledger = MemoryLedger::new();
//! let stub = ledger.stub(
//!     TxContext::builder()
//!         .tx_id("tx-1")
//!         .timestamp(TxTimestamp::new(1_700_000_000, 0))
//!         .creator("creator")
//!         .build(),
//! );
//!
//! stub.put_state("greeting", b"hello".to_vec()).unwrap();
//! assert!(stub.get_state("greeting").unwrap().is_none());
//!
//! stub.commit().unwrap();
//! assert_eq!(ledger.get("greeting").unwrap().as_ref(), b"hello");
//! ```

use std::{
    collections::BTreeMap,
    ops::Bound,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use crate::{
    error::{StorageError, StorageResult},
    stub::{ChaincodeStub, StateQueryIterator},
    types::{KeyValue, StorageLocation, TxTimestamp},
};

/// Transaction context handed to a [`MemoryStub`].
#[derive(Debug, Clone, bon::Builder)]
pub struct TxContext {
    /// Transaction id.
    #[builder(into)]
    pub tx_id: String,

    /// Logical transaction timestamp.
    pub timestamp: TxTimestamp,

    /// Raw creator certificate. Empty means "no creator available".
    #[builder(into)]
    pub creator: Bytes,
}

/// A notification committed by a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChaincodeEvent {
    /// Id of the transaction that set the notification.
    pub tx_id: String,
    /// Notification name.
    pub name: String,
    /// Optional binary payload.
    pub payload: Option<Bytes>,
}

type ValidationKey = (StorageLocation, String);

#[derive(Default)]
struct LedgerState {
    world: BTreeMap<String, Bytes>,
    private: BTreeMap<String, BTreeMap<String, Bytes>>,
    validation: BTreeMap<ValidationKey, Bytes>,
    events: Vec<ChaincodeEvent>,
}

/// Committed ledger state shared by every transaction simulator.
///
/// # Cloning
///
/// `MemoryLedger` is cheaply cloneable via [`Arc`]. All clones share the
/// same underlying state.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    state: Arc<RwLock<LedgerState>>,
    open_cursors: Arc<AtomicUsize>,
}

impl std::fmt::Debug for MemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("MemoryLedger")
            .field("keys", &state.world.len())
            .field("collections", &state.private.len())
            .field("events", &state.events.len())
            .field("open_cursors", &self.open_cursors.load(Ordering::SeqCst))
            .finish()
    }
}

impl MemoryLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a transaction simulator over this ledger.
    #[must_use]
    pub fn stub(&self, context: TxContext) -> MemoryStub {
        MemoryStub { ledger: self.clone(), context, writes: Mutex::new(WriteSet::default()) }
    }

    /// Returns the committed world-state value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.state.read().world.get(key).cloned()
    }

    /// Returns the committed value for `key` in a private collection.
    #[must_use]
    pub fn get_private(&self, collection: &str, key: &str) -> Option<Bytes> {
        self.state.read().private.get(collection).and_then(|c| c.get(key)).cloned()
    }

    /// Writes a world-state value directly, bypassing any transaction.
    ///
    /// Intended for seeding fixtures, including deliberately corrupt records.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.state.write().world.insert(key.into(), value.into());
    }

    /// Returns the committed validation parameter for a key.
    #[must_use]
    pub fn validation_parameter(&self, location: &StorageLocation, key: &str) -> Option<Bytes> {
        self.state.read().validation.get(&(location.clone(), key.to_owned())).cloned()
    }

    /// Returns every committed notification in commit order.
    #[must_use]
    pub fn events(&self) -> Vec<ChaincodeEvent> {
        self.state.read().events.clone()
    }

    /// Returns the number of committed world-state keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().world.len()
    }

    /// Returns `true` if the world state holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().world.is_empty()
    }

    /// Returns the number of range-scan cursors opened and not yet released.
    #[must_use]
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct WriteSet {
    world: BTreeMap<String, Bytes>,
    private: BTreeMap<(String, String), Bytes>,
    validation: BTreeMap<ValidationKey, Bytes>,
    event: Option<ChaincodeEvent>,
}

impl WriteSet {
    fn len(&self) -> usize {
        self.world.len() + self.private.len()
    }
}

/// Transaction simulator over a [`MemoryLedger`].
///
/// Reads observe committed state only, as on the real runtime: a value put
/// earlier in the same transaction is not visible to a later get.
pub struct MemoryStub {
    ledger: MemoryLedger,
    context: TxContext,
    writes: Mutex<WriteSet>,
}

impl std::fmt::Debug for MemoryStub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStub")
            .field("tx_id", &self.context.tx_id)
            .field("timestamp", &self.context.timestamp)
            .field("pending_writes", &self.pending_writes())
            .finish_non_exhaustive()
    }
}

impl MemoryStub {
    /// Returns the ledger this stub writes to.
    #[must_use]
    pub fn ledger(&self) -> &MemoryLedger {
        &self.ledger
    }

    /// Returns the transaction context.
    #[must_use]
    pub fn context(&self) -> &TxContext {
        &self.context
    }

    /// Returns the number of buffered world-state and private writes.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.writes.lock().len()
    }

    /// Returns the buffered world-state value for `key`, if any.
    #[must_use]
    pub fn pending_state(&self, key: &str) -> Option<Bytes> {
        self.writes.lock().world.get(key).cloned()
    }

    /// Returns the buffered validation parameter for a key, if any.
    #[must_use]
    pub fn pending_validation_parameter(
        &self,
        location: &StorageLocation,
        key: &str,
    ) -> Option<Bytes> {
        self.writes.lock().validation.get(&(location.clone(), key.to_owned())).cloned()
    }

    /// Returns the buffered notification, if any.
    #[must_use]
    pub fn pending_event(&self) -> Option<ChaincodeEvent> {
        self.writes.lock().event.clone()
    }

    /// Applies the buffered write set to the ledger in one step.
    ///
    /// # Errors
    ///
    /// Never fails for the in-memory ledger; the signature matches runtimes
    /// that can reject a commit.
    pub fn commit(self) -> StorageResult<()> {
        let writes = self.writes.into_inner();
        let mut state = self.ledger.state.write();

        tracing::debug!(
            tx_id = %self.context.tx_id,
            writes = writes.len(),
            event = writes.event.is_some(),
            "committing transaction"
        );

        state.world.extend(writes.world);
        for ((collection, key), value) in writes.private {
            state.private.entry(collection).or_default().insert(key, value);
        }
        state.validation.extend(writes.validation);
        if let Some(event) = writes.event {
            state.events.push(event);
        }
        Ok(())
    }
}

impl ChaincodeStub for MemoryStub {
    fn tx_id(&self) -> &str {
        &self.context.tx_id
    }

    fn tx_timestamp(&self) -> StorageResult<TxTimestamp> {
        Ok(self.context.timestamp)
    }

    fn creator(&self) -> StorageResult<Bytes> {
        if self.context.creator.is_empty() {
            return Err(StorageError::context("creator certificate is not available"));
        }
        Ok(self.context.creator.clone())
    }

    fn get_state(&self, key: &str) -> StorageResult<Option<Bytes>> {
        Ok(self.ledger.get(key))
    }

    fn put_state(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        if key.is_empty() {
            return Err(StorageError::persist("key must not be empty"));
        }
        self.writes.lock().world.insert(key.to_owned(), Bytes::from(value));
        Ok(())
    }

    fn get_private_data(&self, collection: &str, key: &str) -> StorageResult<Option<Bytes>> {
        Ok(self.ledger.get_private(collection, key))
    }

    fn put_private_data(&self, collection: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        if collection.is_empty() {
            return Err(StorageError::persist("collection name must not be empty"));
        }
        if key.is_empty() {
            return Err(StorageError::persist("key must not be empty"));
        }
        self.writes
            .lock()
            .private
            .insert((collection.to_owned(), key.to_owned()), Bytes::from(value));
        Ok(())
    }

    fn set_state_validation_parameter(&self, key: &str, policy: Vec<u8>) -> StorageResult<()> {
        self.writes
            .lock()
            .validation
            .insert((StorageLocation::Shared, key.to_owned()), Bytes::from(policy));
        Ok(())
    }

    fn set_private_data_validation_parameter(
        &self,
        collection: &str,
        key: &str,
        policy: Vec<u8>,
    ) -> StorageResult<()> {
        self.writes.lock().validation.insert(
            (StorageLocation::Private(collection.to_owned()), key.to_owned()),
            Bytes::from(policy),
        );
        Ok(())
    }

    fn get_state_by_range(
        &self,
        start_key: &str,
        end_key: &str,
    ) -> StorageResult<Box<dyn StateQueryIterator + '_>> {
        let end = range_end(start_key, end_key)?;
        let entries = scan(&self.ledger.state.read().world, start_key, end);
        Ok(Box::new(MemoryStateIterator::open(entries, Arc::clone(&self.ledger.open_cursors))))
    }

    fn get_private_data_by_range(
        &self,
        collection: &str,
        start_key: &str,
        end_key: &str,
    ) -> StorageResult<Box<dyn StateQueryIterator + '_>> {
        if collection.is_empty() {
            return Err(StorageError::persist("collection name must not be empty"));
        }
        let end = range_end(start_key, end_key)?;
        let entries = self
            .ledger
            .state
            .read()
            .private
            .get(collection)
            .map(|data| scan(data, start_key, end))
            .unwrap_or_default();
        Ok(Box::new(MemoryStateIterator::open(entries, Arc::clone(&self.ledger.open_cursors))))
    }

    fn set_event(&self, name: &str, payload: Option<Vec<u8>>) -> StorageResult<()> {
        if name.is_empty() {
            return Err(StorageError::persist("event name must not be empty"));
        }
        self.writes.lock().event = Some(ChaincodeEvent {
            tx_id: self.context.tx_id.clone(),
            name: name.to_owned(),
            payload: payload.map(Bytes::from),
        });
        Ok(())
    }
}

/// Checks a `[start, end)` range; an empty end key leaves the range open.
fn range_end<'k>(start_key: &str, end_key: &'k str) -> StorageResult<Bound<&'k str>> {
    if end_key.is_empty() {
        return Ok(Bound::Unbounded);
    }
    if start_key > end_key {
        return Err(StorageError::persist(format!(
            "invalid range: start {start_key:?} is after end {end_key:?}"
        )));
    }
    Ok(Bound::Excluded(end_key))
}

fn scan(data: &BTreeMap<String, Bytes>, start_key: &str, end: Bound<&str>) -> Vec<KeyValue> {
    data.range::<str, _>((Bound::Included(start_key), end))
        .map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
        .collect()
}

/// Range-scan cursor over a snapshot of committed state.
struct MemoryStateIterator {
    entries: std::vec::IntoIter<KeyValue>,
    open_cursors: Arc<AtomicUsize>,
    closed: bool,
}

impl MemoryStateIterator {
    fn open(entries: Vec<KeyValue>, open_cursors: Arc<AtomicUsize>) -> Self {
        open_cursors.fetch_add(1, Ordering::SeqCst);
        Self { entries: entries.into_iter(), open_cursors, closed: false }
    }
}

impl Iterator for MemoryStateIterator {
    type Item = StorageResult<KeyValue>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        self.entries.next().map(Ok)
    }
}

impl StateQueryIterator for MemoryStateIterator {
    fn close(&mut self) -> StorageResult<()> {
        if !self.closed {
            self.closed = true;
            self.open_cursors.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for MemoryStateIterator {
    fn drop(&mut self) {
        // Closing the in-memory cursor cannot fail.
        let _ = self.close();
    }
}
