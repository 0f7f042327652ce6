//! Event batches are all-or-nothing: every event is stored before the
//! notification is set, and a failed write leaves no notification behind.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{
    collections::HashSet,
    sync::atomic::{AtomicUsize, Ordering},
};

use bytes::Bytes;
use iot_ledger_chaincode::{
    ChaincodeError, EVENT_NAMESPACE, EventBatch, EventValue, IotChaincode, emit_events,
};
use iot_ledger_storage::{
    ChaincodeStub, EntityStore, MemoryLedger, MemoryStub, StateQueryIterator, StorageError,
    StorageResult, TxTimestamp, testutil::test_context,
};
use serde_json::json;

const DEVICE01: &str = include_str!("fixtures/device01.pem");

/// Wraps a [`MemoryStub`] and fails the N-th world-state write to the
/// event namespace.
struct FailingStub {
    inner: MemoryStub,
    fail_on: usize,
    event_writes: AtomicUsize,
}

impl FailingStub {
    fn new(inner: MemoryStub, fail_on: usize) -> Self {
        Self { inner, fail_on, event_writes: AtomicUsize::new(0) }
    }
}

impl ChaincodeStub for FailingStub {
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
        if key.starts_with(&format!("\u{0}{EVENT_NAMESPACE}\u{0}")) {
            let n = self.event_writes.fetch_add(1, Ordering::SeqCst) + 1;
            if n == self.fail_on {
                return Err(StorageError::persist(format!("injected failure on event write {n}")));
            }
        }
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
        self.inner.get_state_by_range(start_key, end_key)
    }

    fn get_private_data_by_range(
        &self,
        collection: &str,
        start_key: &str,
        end_key: &str,
    ) -> StorageResult<Box<dyn StateQueryIterator + '_>> {
        self.inner.get_private_data_by_range(collection, start_key, end_key)
    }

    fn set_event(&self, name: &str, payload: Option<Vec<u8>>) -> StorageResult<()> {
        self.inner.set_event(name, payload)
    }
}

fn three_events() -> EventBatch {
    ["addIotGps", "addIotLight", "addIotHumidity"]
        .into_iter()
        .enumerate()
        .map(|(i, action)| {
            EventValue::new(action, "IotTest", format!("entity-{i}"), json!({ "n": i }))
        })
        .collect()
}

#[test]
fn three_event_batch_yields_three_ids_records_and_one_notification() {
    let ledger = MemoryLedger::new();
    let stub = ledger.stub(test_context("tx-0001", DEVICE01));

    let labels = emit_events(EntityStore::shared(&stub), &three_events()).unwrap();

    assert_eq!(
        labels,
        [
            "Event.addIotGps.f12e8000-6568-403c-8001-a82f091113c7",
            "Event.addIotLight.f12e8000-6568-403c-8002-a82f091113c7",
            "Event.addIotHumidity.f12e8000-6568-403c-8003-a82f091113c7",
        ]
    );
    let ids: HashSet<&str> = labels.iter().map(|l| l.rsplit('.').next().unwrap()).collect();
    assert_eq!(ids.len(), 3);
    assert_eq!(stub.pending_writes(), 3);

    stub.commit().unwrap();

    let events = ledger.events();
    assert_eq!(events.len(), 1);
    let names: Vec<String> = serde_json::from_str(&events[0].name).unwrap();
    assert_eq!(names, labels);
    assert!(events[0].payload.is_none());
    assert_eq!(events[0].tx_id, "tx-0001");
}

#[test]
fn failure_on_second_event_write_emits_no_notification() {
    let ledger = MemoryLedger::new();
    let stub = FailingStub::new(ledger.stub(test_context("tx-0001", DEVICE01)), 2);

    let err = emit_events(EntityStore::shared(&stub), &three_events()).unwrap_err();

    assert!(matches!(err, ChaincodeError::Storage(StorageError::Persist { .. })));
    assert!(stub.inner.pending_event().is_none());
    assert_eq!(stub.event_writes.load(Ordering::SeqCst), 2);
    // the first event is buffered but the runtime drops the whole write set
    assert_eq!(stub.inner.pending_writes(), 1);

    drop(stub);
    assert!(ledger.is_empty());
    assert!(ledger.events().is_empty());
}

#[test]
fn replicas_derive_identical_ids() {
    let replica_a = MemoryLedger::new();
    let replica_b = MemoryLedger::new();

    let stub_a = replica_a.stub(test_context("tx-0042", DEVICE01));
    let stub_b = replica_b.stub(test_context("tx-0042", DEVICE01));

    let labels_a = emit_events(EntityStore::shared(&stub_a), &three_events()).unwrap();
    let labels_b = emit_events(EntityStore::shared(&stub_b), &three_events()).unwrap();
    assert_eq!(labels_a, labels_b);

    let other_tx = replica_a.stub(test_context("tx-0043", DEVICE01));
    let labels_c = emit_events(EntityStore::shared(&other_tx), &three_events()).unwrap();
    assert_ne!(labels_a, labels_c);
}

#[test]
fn failed_request_reports_persist_status() {
    let ledger = MemoryLedger::new();
    let stub = FailingStub::new(ledger.stub(test_context("tx-0001", DEVICE01)), 1);

    let args = ["120".to_owned(), "1700000000".to_owned()];
    let response = IotChaincode::default().invoke(&stub, "addIotLight", &args);

    assert_eq!(response.status, 500);
    assert!(response.message.contains("injected failure on event write 1"));
    assert!(stub.inner.pending_event().is_none());
}
