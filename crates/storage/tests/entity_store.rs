//! Entity store behavior: policy attachment, collection routing, lenient
//! existence checks, key validation on write, routed queries and
//! transaction visibility.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use iot_ledger_storage::{
    ChaincodeStub, EndorsementPolicy, Entity, EntityStore, MemoryLedger, MemoryStub, Record,
    RecordValue, RoleType, StaticRouter, StorageError, StorageLocation, TxContext, TxTimestamp,
    accept_all,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Humidity {
    humidity: f32,
    temperature: f32,
}

impl RecordValue for Humidity {
    const NAMESPACE: &'static str = "IotHumidity";
}

const ID: &str = "9b1deb4d-3b7d-4bad-9bdd-2b0d7b3dcb6d";

fn stub(ledger: &MemoryLedger, tx_id: &str) -> MemoryStub {
    ledger.stub(
        TxContext::builder()
            .tx_id(tx_id)
            .timestamp(TxTimestamp::new(1_700_000_000, 0))
            .creator("creator")
            .build(),
    )
}

fn reading() -> Record<Humidity> {
    Record::new(ID, Humidity { humidity: 41.5, temperature: 21.0 }).unwrap()
}

#[test]
fn upsert_without_participants_sets_no_policy() {
    let ledger = MemoryLedger::new();
    let tx = stub(&ledger, "tx-1");
    let record = reading();

    EntityStore::shared(&tx).upsert(&record, &[], RoleType::Member).unwrap();
    tx.commit().unwrap();

    let key = record.composite_key().unwrap();
    assert!(ledger.get(&key).is_some());
    assert!(ledger.validation_parameter(&StorageLocation::Shared, &key).is_none());
}

#[test]
fn upsert_with_participants_sets_policy_for_exactly_those_orgs() {
    let ledger = MemoryLedger::new();
    let tx = stub(&ledger, "tx-1");
    let record = reading();
    let participants = vec!["Org2MSP".to_owned(), "Org1MSP".to_owned()];

    EntityStore::shared(&tx).upsert(&record, &participants, RoleType::Peer).unwrap();
    tx.commit().unwrap();

    let key = record.composite_key().unwrap();
    assert!(ledger.get(&key).is_some());
    let bytes = ledger.validation_parameter(&StorageLocation::Shared, &key).unwrap();
    let policy = EndorsementPolicy::from_bytes(&bytes).unwrap();
    assert_eq!(policy.role(), RoleType::Peer);
    assert_eq!(policy.organizations().collect::<Vec<_>>(), ["Org1MSP", "Org2MSP"]);
}

#[test]
fn upsert_replaces_whole_value() {
    let ledger = MemoryLedger::new();
    let tx = stub(&ledger, "tx-1");
    EntityStore::shared(&tx).upsert(&reading(), &[], RoleType::Member).unwrap();
    tx.commit().unwrap();

    let tx = stub(&ledger, "tx-2");
    let mut updated = reading();
    updated.value = Humidity { humidity: 50.0, ..Humidity::default() };
    EntityStore::shared(&tx).upsert(&updated, &[], RoleType::Member).unwrap();
    tx.commit().unwrap();

    let tx = stub(&ledger, "tx-3");
    let mut loaded = Record::<Humidity>::blank();
    loaded.key.id = ID.to_owned();
    EntityStore::shared(&tx).load(&mut loaded).unwrap();
    assert_eq!(loaded.value, Humidity { humidity: 50.0, temperature: 0.0 });
}

#[test]
fn exists_and_load_see_committed_state_only() {
    let ledger = MemoryLedger::new();
    let tx = stub(&ledger, "tx-1");
    let store = EntityStore::shared(&tx);
    let record = reading();

    store.upsert(&record, &[], RoleType::Member).unwrap();
    assert!(!store.exists(&record));
    tx.commit().unwrap();

    let tx = stub(&ledger, "tx-2");
    let store = EntityStore::shared(&tx);
    assert!(store.exists(&record));

    let mut loaded = record.clone();
    loaded.value = Humidity::default();
    store.load(&mut loaded).unwrap();
    assert_eq!(loaded, record);
}

#[test]
fn aborted_transaction_leaves_no_trace() {
    let ledger = MemoryLedger::new();
    {
        let tx = stub(&ledger, "tx-1");
        EntityStore::shared(&tx)
            .upsert(&reading(), &["Org1MSP".to_owned()], RoleType::Member)
            .unwrap();
    }
    assert!(ledger.is_empty());

    let tx = stub(&ledger, "tx-2");
    let mut loaded = reading();
    let err = EntityStore::shared(&tx).load(&mut loaded).unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[test]
fn private_routing_writes_and_probes_collections_in_order() {
    let ledger = MemoryLedger::new();
    let router = StaticRouter::new().route("IotHumidity", ["buyers", "sellers"]);
    let record = reading();
    let key = record.composite_key().unwrap();

    let tx = stub(&ledger, "tx-1");
    EntityStore::new(&tx, &router)
        .upsert(&record, &["Org1MSP".to_owned()], RoleType::Member)
        .unwrap();
    tx.commit().unwrap();

    assert!(ledger.get(&key).is_none());
    assert!(ledger.get_private("buyers", &key).is_some());
    assert!(ledger.get_private("sellers", &key).is_none());
    let buyers = StorageLocation::Private("buyers".to_owned());
    assert!(ledger.validation_parameter(&buyers, &key).is_some());
    assert!(ledger.validation_parameter(&StorageLocation::Shared, &key).is_none());

    // A router listing the collection second still finds the record.
    let reversed = StaticRouter::new().route("IotHumidity", ["sellers", "buyers"]);
    let tx = stub(&ledger, "tx-2");
    let store = EntityStore::new(&tx, &reversed);
    assert!(store.exists(&record));
    let mut loaded = Record::<Humidity>::blank();
    loaded.key.id = ID.to_owned();
    store.load(&mut loaded).unwrap();
    assert_eq!(loaded.value, record.value);

    // The shared-state store does not see private data.
    assert!(!EntityStore::shared(&tx).exists(&record));
}

#[test]
fn upsert_rejects_ids_that_cannot_be_read_back() {
    let ledger = MemoryLedger::new();
    let tx = stub(&ledger, "tx-1");
    let store = EntityStore::shared(&tx);

    let mut malformed = Record::<Humidity>::blank();
    malformed.key.id = "not-a-uuid".to_owned();
    let err = store.upsert(&malformed, &[], RoleType::Member).unwrap_err();
    assert!(matches!(err, StorageError::InvalidKey { .. }));

    let mut wrong_version = reading();
    wrong_version.key.id = "6ba7b810-9dad-11d1-80b4-00c04fd430c8".to_owned();
    let err = store.upsert(&wrong_version, &[], RoleType::Member).unwrap_err();
    assert!(matches!(err, StorageError::WrongVersion { .. }));
    assert_eq!(tx.pending_writes(), 0);

    store.upsert(&reading(), &[], RoleType::Member).unwrap();
    tx.commit().unwrap();

    // The namespace stays queryable.
    let tx = stub(&ledger, "tx-2");
    let all = EntityStore::shared(&tx)
        .query("IotHumidity", &[], Record::<Humidity>::blank, accept_all)
        .unwrap();
    assert_eq!(all, [reading()]);
}

#[test]
fn query_scans_every_routed_collection() {
    let ledger = MemoryLedger::new();
    let buyers = StaticRouter::new().route("IotHumidity", ["buyers"]);
    let sellers = StaticRouter::new().route("IotHumidity", ["sellers"]);
    let second = Record::new(
        "1c6b1f4e-0000-4000-8000-000000000002",
        Humidity { humidity: 1.0, temperature: 2.0 },
    )
    .unwrap();

    let tx = stub(&ledger, "tx-1");
    EntityStore::new(&tx, &buyers).upsert(&reading(), &[], RoleType::Member).unwrap();
    EntityStore::new(&tx, &sellers).upsert(&second, &[], RoleType::Member).unwrap();
    tx.commit().unwrap();

    let both = StaticRouter::new().route("IotHumidity", ["buyers", "sellers"]);
    let tx = stub(&ledger, "tx-2");
    let found = EntityStore::new(&tx, &both)
        .query("IotHumidity", &[], Record::<Humidity>::blank, accept_all)
        .unwrap();
    assert_eq!(found, [reading(), second]);

    let shared = EntityStore::shared(&tx)
        .query("IotHumidity", &[], Record::<Humidity>::blank, accept_all)
        .unwrap();
    assert!(shared.is_empty());
    assert_eq!(ledger.open_cursors(), 0);
}

#[test]
fn exists_is_false_when_lookup_fails() {
    struct BrokenStub(MemoryStub);

    impl ChaincodeStub for BrokenStub {
        fn tx_id(&self) -> &str {
            self.0.tx_id()
        }
        fn tx_timestamp(&self) -> iot_ledger_storage::StorageResult<TxTimestamp> {
            self.0.tx_timestamp()
        }
        fn creator(&self) -> iot_ledger_storage::StorageResult<bytes::Bytes> {
            self.0.creator()
        }
        fn get_state(&self, _key: &str) -> iot_ledger_storage::StorageResult<Option<bytes::Bytes>> {
            Err(StorageError::persist("peer unavailable"))
        }
        fn put_state(&self, key: &str, value: Vec<u8>) -> iot_ledger_storage::StorageResult<()> {
            self.0.put_state(key, value)
        }
        fn get_private_data(
            &self,
            collection: &str,
            key: &str,
        ) -> iot_ledger_storage::StorageResult<Option<bytes::Bytes>> {
            self.0.get_private_data(collection, key)
        }
        fn put_private_data(
            &self,
            collection: &str,
            key: &str,
            value: Vec<u8>,
        ) -> iot_ledger_storage::StorageResult<()> {
            self.0.put_private_data(collection, key, value)
        }
        fn set_state_validation_parameter(
            &self,
            key: &str,
            policy: Vec<u8>,
        ) -> iot_ledger_storage::StorageResult<()> {
            self.0.set_state_validation_parameter(key, policy)
        }
        fn set_private_data_validation_parameter(
            &self,
            collection: &str,
            key: &str,
            policy: Vec<u8>,
        ) -> iot_ledger_storage::StorageResult<()> {
            self.0.set_private_data_validation_parameter(collection, key, policy)
        }
        fn get_state_by_range(
            &self,
            start_key: &str,
            end_key: &str,
        ) -> iot_ledger_storage::StorageResult<Box<dyn iot_ledger_storage::StateQueryIterator + '_>>
        {
            self.0.get_state_by_range(start_key, end_key)
        }
        fn get_private_data_by_range(
            &self,
            collection: &str,
            start_key: &str,
            end_key: &str,
        ) -> iot_ledger_storage::StorageResult<Box<dyn iot_ledger_storage::StateQueryIterator + '_>>
        {
            self.0.get_private_data_by_range(collection, start_key, end_key)
        }
        fn set_event(
            &self,
            name: &str,
            payload: Option<Vec<u8>>,
        ) -> iot_ledger_storage::StorageResult<()> {
            self.0.set_event(name, payload)
        }
    }

    let ledger = MemoryLedger::new();
    let record = reading();
    ledger.insert_raw(record.composite_key().unwrap(), record.to_ledger_value().unwrap());
    let broken = BrokenStub(stub(&ledger, "tx-1"));

    let store = EntityStore::shared(&broken);
    assert!(!store.exists(&record));

    let mut loaded = reading();
    let err = store.load(&mut loaded).unwrap_err();
    assert!(matches!(err, StorageError::Persist { .. }));
}
