//! Query engine behavior against the in-memory ledger: scan order,
//! predicate filtering, corrupt records, cursor failures and cursor release.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use bytes::Bytes;
use iot_ledger_storage::{
    ChaincodeStub, Entity, EntityStore, KeyValue, MemoryLedger, MemoryStub, Record, RecordValue,
    StateQueryIterator, StorageError, StorageResult, TxContext, TxTimestamp, accept_all,
    encode_composite_key,
};
use rstest::rstest;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Gps {
    longitude: f64,
    latitude: f64,
}

impl RecordValue for Gps {
    const NAMESPACE: &'static str = "IotGps";
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Light {
    light: u32,
}

impl RecordValue for Light {
    const NAMESPACE: &'static str = "IotLight";
}

fn test_context(tx_id: &str) -> TxContext {
    TxContext::builder()
        .tx_id(tx_id)
        .timestamp(TxTimestamp::new(1_700_000_000, 0))
        .creator("creator")
        .build()
}

fn seed(ledger: &MemoryLedger, entity: &dyn Entity) {
    ledger.insert_raw(entity.composite_key().unwrap(), entity.to_ledger_value().unwrap());
}

const IDS: [&str; 3] = [
    "0a9c1f0e-0000-4000-8000-000000000001",
    "5b2d3c4e-0000-4000-8000-000000000002",
    "c7e8f901-0000-4000-8000-000000000003",
];

fn seeded_ledger() -> MemoryLedger {
    let ledger = MemoryLedger::new();
    // Inserted out of order; scans must still come back sorted by key.
    for (i, id) in IDS.iter().enumerate().rev() {
        let record = Record::new(*id, Gps { longitude: i as f64, latitude: -(i as f64) }).unwrap();
        seed(&ledger, &record);
    }
    seed(&ledger, &Record::new(IDS[0], Light { light: 1 }).unwrap());
    ledger
}

#[test]
fn always_true_returns_every_record_in_scan_order() {
    let ledger = seeded_ledger();
    let stub = ledger.stub(test_context("tx-1"));

    let all = EntityStore::shared(&stub)
        .query("IotGps", &[], Record::<Gps>::blank, accept_all)
        .unwrap();

    let ids: Vec<&str> = all.iter().map(Record::id).collect();
    assert_eq!(ids, IDS);
    assert_eq!(all[2].value, Gps { longitude: 2.0, latitude: -2.0 });
    assert_eq!(ledger.open_cursors(), 0);
}

#[test]
fn always_false_returns_empty_list() {
    let ledger = seeded_ledger();
    let stub = ledger.stub(test_context("tx-1"));

    let none = EntityStore::shared(&stub)
        .query("IotGps", &[], Record::<Gps>::blank, |_: &Record<Gps>| false)
        .unwrap();

    assert!(none.is_empty());
    assert_eq!(serde_json::to_string(&none).unwrap(), "[]");
    assert_eq!(ledger.open_cursors(), 0);
}

#[test]
fn scan_stays_inside_namespace() {
    let ledger = seeded_ledger();
    let stub = ledger.stub(test_context("tx-1"));

    let lights = EntityStore::shared(&stub)
        .query("IotLight", &[], Record::<Light>::blank, accept_all)
        .unwrap();
    assert_eq!(lights.len(), 1);
    assert_eq!(lights[0].id(), IDS[0]);
}

#[test]
fn partial_key_narrows_scan() {
    let ledger = seeded_ledger();
    let stub = ledger.stub(test_context("tx-1"));

    let one = EntityStore::shared(&stub)
        .query("IotGps", &[IDS[1].to_owned()], Record::<Gps>::blank, accept_all)
        .unwrap();
    assert_eq!(one.len(), 1);
    assert_eq!(one[0].id(), IDS[1]);
}

#[test]
fn corrupt_value_fails_whole_query_and_releases_cursor() {
    let ledger = seeded_ledger();
    let bad = encode_composite_key("IotGps", &["f0000000-0000-4000-8000-000000000000"]).unwrap();
    ledger.insert_raw(bad, b"{\"longitude\":".to_vec());
    let stub = ledger.stub(test_context("tx-1"));

    let result = EntityStore::shared(&stub).query("IotGps", &[], Record::<Gps>::blank, accept_all);

    let err = result.unwrap_err();
    assert!(matches!(err, StorageError::Corrupt { .. }), "{err:?}");
    let message = err.to_string();
    assert!(message.contains("cannot fill entry value from response value"), "{message}");
    assert_eq!(ledger.open_cursors(), 0);
}

#[test]
fn non_v4_key_fragment_is_corrupt() {
    let ledger = MemoryLedger::new();
    let v1 = encode_composite_key("IotLight", &["6ba7b810-9dad-11d1-80b4-00c04fd430c8"]).unwrap();
    ledger.insert_raw(v1, br#"{"light":0}"#.to_vec());
    let stub = ledger.stub(test_context("tx-1"));

    let err = EntityStore::shared(&stub)
        .query("IotLight", &[], Record::<Light>::blank, accept_all)
        .unwrap_err();
    match err {
        StorageError::Corrupt { source: Some(source), .. } => {
            assert!(source.to_string().contains("Wrong ID format"), "{source}");
        },
        other => panic!("expected Corrupt with source, got {other:?}"),
    }
    assert_eq!(ledger.open_cursors(), 0);
}

#[test]
fn early_close_by_caller_is_idempotent() {
    let ledger = seeded_ledger();
    let stub = ledger.stub(test_context("tx-1"));

    let mut cursor = stub.get_state_by_partial_composite_key("IotGps", &[]).unwrap();
    assert!(cursor.next().is_some());
    cursor.close().unwrap();
    cursor.close().unwrap();
    assert_eq!(ledger.open_cursors(), 0);
}

/// Cursor that yields `fail_after` entries of the wrapped scan, then an error.
struct FailingCursor<'a> {
    inner: Box<dyn StateQueryIterator + 'a>,
    fail_after: usize,
    yielded: usize,
    closes: Arc<AtomicUsize>,
}

impl Iterator for FailingCursor<'_> {
    type Item = StorageResult<KeyValue>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.yielded == self.fail_after {
            return Some(Err(StorageError::persist("scan aborted by peer")));
        }
        self.yielded += 1;
        self.inner.next()
    }
}

impl StateQueryIterator for FailingCursor<'_> {
    fn close(&mut self) -> StorageResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close()
    }
}

/// Wraps a [`MemoryStub`] so every range scan fails after `fail_after` entries.
struct FailingScanStub {
    inner: MemoryStub,
    fail_after: usize,
    closes: Arc<AtomicUsize>,
}

impl FailingScanStub {
    fn wrap<'a>(
        &self,
        inner: Box<dyn StateQueryIterator + 'a>,
    ) -> Box<dyn StateQueryIterator + 'a> {
        Box::new(FailingCursor {
            inner,
            fail_after: self.fail_after,
            yielded: 0,
            closes: Arc::clone(&self.closes),
        })
    }
}

impl ChaincodeStub for FailingScanStub {
    fn tx_id(&self) -> &str {
        self.inner.tx_id()
    }

    fn tx_timestamp(&self) -> StorageResult<TxTimestamp> {
        self.inner.tx_timestamp()
    }

    fn creator(&self) -> StorageResult<Bytes> {
        self.inner.creator()
    }

    fn get_state(&self, key: &str) -> StorageResult<Option<Bytes>> {
        self.inner.get_state(key)
    }

    fn put_state(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.inner.put_state(key, value)
    }

    fn get_private_data(&self, collection: &str, key: &str) -> StorageResult<Option<Bytes>> {
        self.inner.get_private_data(collection, key)
    }

    fn put_private_data(&self, collection: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.inner.put_private_data(collection, key, value)
    }

    fn set_state_validation_parameter(&self, key: &str, policy: Vec<u8>) -> StorageResult<()> {
        self.inner.set_state_validation_parameter(key, policy)
    }

    fn set_private_data_validation_parameter(
        &self,
        collection: &str,
        key: &str,
        policy: Vec<u8>,
    ) -> StorageResult<()> {
        self.inner.set_private_data_validation_parameter(collection, key, policy)
    }

    fn get_state_by_range(
        &self,
        start_key: &str,
        end_key: &str,
    ) -> StorageResult<Box<dyn StateQueryIterator + '_>> {
        Ok(self.wrap(self.inner.get_state_by_range(start_key, end_key)?))
    }

    fn get_private_data_by_range(
        &self,
        collection: &str,
        start_key: &str,
        end_key: &str,
    ) -> StorageResult<Box<dyn StateQueryIterator + '_>> {
        Ok(self.wrap(self.inner.get_private_data_by_range(collection, start_key, end_key)?))
    }

    fn set_event(&self, name: &str, payload: Option<Vec<u8>>) -> StorageResult<()> {
        self.inner.set_event(name, payload)
    }
}

#[rstest]
#[case::first_entry(0)]
#[case::mid_scan(1)]
#[case::last_entry(2)]
fn cursor_error_fails_query_and_closes_cursor(#[case] fail_after: usize) {
    let ledger = seeded_ledger();
    let stub = FailingScanStub {
        inner: ledger.stub(test_context("tx-1")),
        fail_after,
        closes: Arc::new(AtomicUsize::new(0)),
    };

    let err = EntityStore::shared(&stub)
        .query("IotGps", &[], Record::<Gps>::blank, accept_all)
        .unwrap_err();

    match err {
        StorageError::Persist { message, .. } => assert_eq!(message, "scan aborted by peer"),
        other => panic!("expected the cursor error unchanged, got {other:?}"),
    }
    assert_eq!(stub.closes.load(Ordering::SeqCst), 1);
    assert_eq!(ledger.open_cursors(), 0);
}
