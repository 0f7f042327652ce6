//! IoT telemetry chaincode.
//!
//! Field devices append sensor readings to a permissioned ledger; member
//! organizations list and audit them. This crate holds the request surface
//! and the domain records built on [`iot_ledger_storage`]:
//!
//! - **Sensor readings**: six record kinds (GPS, barometer, gyroscope,
//!   humidity, vibration, light), each stamped at ingestion with the
//!   submitting certificate's custom field and registration status
//! - **Certificate registry**: enrolled device certificates and the
//!   authorization check against them
//! - **Events**: one persisted [`Event`] per side effect, keyed by a
//!   replica-safe derived id, plus one runtime notification per request
//! - **Config**: the ledger-resident routing singleton and the
//!   [`ConfigRouter`] that reads it
//!
//! # Request Flow
//!
//! ```text
//! invoke(function, args)
//!   │
//!   ├── addIot*  ── decode args ── CertificateRegistry ── EntityStore::upsert ── emit_events
//!   ├── listIot* ── EntityStore::query
//!   ├── addIotCertificate / checkIotCertificate ── CertificateRegistry
//!   └── setConfig / getConfig ── Config singleton
//! ```
//!
//! # Example
//!
//! ```
//! use iot_ledger_chaincode::IotChaincode;
//! use iot_ledger_storage::{MemoryLedger, TxContext, TxTimestamp};
//!
//! let ledger = MemoryLedger::new();
//! let chaincode = IotChaincode::default();
//! let context = |tx_id: &str| {
//!     TxContext::builder()
//!         .tx_id(tx_id)
//!         .timestamp(TxTimestamp::new(1_700_000_000, 0))
//!         .creator("admin")
//!         .build()
//! };
//!
//! let stub = ledger.stub(context("tx-1"));
//! let collections = r#"[{"name":"buyers","policy":"","entityTypes":["IotGps"]}]"#;
//! let response = chaincode.invoke(
//!     &stub,
//!     "setConfig",
//!     &[collections.to_owned(), "SupplyChainChaincode".to_owned()],
//! );
//! assert!(response.is_ok());
//! stub.commit().unwrap();
//!
//! let stub = ledger.stub(context("tx-2"));
//! let response = chaincode.invoke(&stub, "getConfig", &[]);
//! assert_eq!(response.status, 200);
//! ```
//!
//! # Error Handling
//!
//! Handlers return [`ChaincodeResult<T>`]; [`IotChaincode::invoke`] turns
//! an error into a [`Response`] carrying [`ChaincodeError::status`] and the
//! error message.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod certificate;
pub mod chaincode;
pub mod config;
pub mod error;
pub mod event;
pub mod routing;
pub mod sensors;
pub mod settings;
pub mod telemetry;

pub use certificate::{
    CERTIFICATE_NAMESPACE, Certificate, CertificateRegistry, CertificateValue,
    certificate_from_arguments, extract_custom_field, extract_organization,
    extract_organizational_unit, extract_pem_block,
};
pub use chaincode::{FUNCTIONS, IotChaincode, Response};
pub use config::{CONFIG_NAMESPACE, Collection, Config, ConfigValue};
pub use error::{
    ChaincodeError, ChaincodeResult, STATUS_BAD_REQUEST, STATUS_INTERNAL, STATUS_NOT_FOUND,
    STATUS_OK,
};
pub use event::{EVENT_NAMESPACE, Event, EventBatch, EventValue, emit_events};
pub use routing::ConfigRouter;
pub use sensors::{
    Arguments, Barometer, BarometerValue, Gps, GpsValue, Gyroscope, GyroscopeValue, Humidity,
    HumidityValue, Light, LightValue, ReadingMeta, SensorValue, Vibration, VibrationValue,
    reading_from_arguments,
};
pub use settings::{ChaincodeSettings, DEFAULT_CHAINCODE_NAME, LogFormat, LoggingConfig};
pub use telemetry::init_tracing;
