//! Entity persistence and query framework for IoT ledger chaincode.
//!
//! This crate provides the storage layer every record kind rides on: the
//! [`ChaincodeStub`] view of the ledger runtime, composite key encoding,
//! collection routing, the [`EntityStore`], partial-key queries and
//! replica-safe identifier derivation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Chaincode Layer                        │
//! │   (request dispatch, certificates, events, sensor records)  │
//! ├─────────────────────────────────────────────────────────────┤
//! │        EntityStore            │          query()            │
//! │   (exists, load, upsert)      │  (range scan + predicate)   │
//! ├───────────────────────────────┴─────────────────────────────┤
//! │   CollectionRouter │ composite keys │ EndorsementPolicy     │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    ChaincodeStub trait                      │
//! ├──────────────┬──────────────────────────────────────────────┤
//! │  MemoryStub  │           ledger runtime adapter             │
//! │  (testing)   │               (production)                   │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use iot_ledger_storage::{
//!     EntityStore, MemoryLedger, Record, RecordValue, RoleType, TxContext, TxTimestamp,
//!     accept_all,
//! };
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Default, Serialize, Deserialize)]
//! struct Light {
//!     light: u32,
//! }
//!
//! impl RecordValue for Light {
//!     const NAMESPACE: &'static str = "IotLight";
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ledger = MemoryLedger::new();
//!     let context = |tx_id: &str| {
//!         TxContext::builder()
//!             .tx_id(tx_id)
//!             .timestamp(TxTimestamp::new(1_700_000_000, 0))
//!             .creator("creator")
//!             .build()
//!     };
//!
//!     // Write in one transaction
//!     let stub = ledger.stub(context("tx-1"));
//!     let record = Record::with_random_id(Light { light: 1 });
//!     EntityStore::shared(&stub).upsert(&record, &[], RoleType::Member)?;
//!     stub.commit()?;
//!
//!     // Read it back in the next
//!     let stub = ledger.stub(context("tx-2"));
//!     let all = EntityStore::shared(&stub).query("IotLight", &[], Record::<Light>::blank, accept_all)?;
//!     assert_eq!(all.len(), 1);
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`StorageResult<T>`]. Nothing is retried: the
//! enclosing transaction is expected to abort on any error.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with transaction context builders, fixture
//!   seeding and assertion macros. Enable this in `[dev-dependencies]` for integration tests.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod entity;
pub mod error;
pub mod ids;
pub mod keys;
pub mod memory;
pub mod policy;
pub mod query;
pub mod router;
pub mod store;
pub mod stub;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod types;

// Re-export primary types at crate root for convenience
pub use entity::{Entity, Record, RecordKey, RecordValue};
pub use error::{BoxError, StorageError, StorageResult};
pub use ids::{derive_id, increment_id, parse_v4};
pub use keys::{decode_composite_key, encode_composite_key, partial_key_range};
pub use memory::{ChaincodeEvent, MemoryLedger, MemoryStub, TxContext};
pub use policy::{EndorsementPolicy, RoleType};
pub use query::accept_all;
pub use router::{CollectionRouter, SharedStateRouter, StaticRouter};
pub use store::EntityStore;
pub use stub::{ChaincodeStub, StateQueryIterator};
pub use types::{KeyValue, StorageLocation, TxTimestamp};
