//! Request dispatch.
//!
//! [`IotChaincode`] is the request surface: a function name, positional
//! string arguments and the transaction context in, a [`Response`] out.
//! Every handler runs to completion inside the caller's transaction; any
//! error is reported with the status from [`ChaincodeError::status`] and
//! the runtime discards the write set.

use bytes::Bytes;
use iot_ledger_storage::{ChaincodeStub, EntityStore, Record, RoleType, StorageError, accept_all};
use serde::Serialize;

use crate::{
    certificate::{
        CERTIFICATE_NAMESPACE, CertificateRegistry, certificate_from_arguments, extract_pem_block,
    },
    config::{CONFIG_NAMESPACE, Config},
    error::{ChaincodeError, ChaincodeResult, STATUS_BAD_REQUEST, STATUS_OK},
    event::{EventBatch, EventValue, emit_events},
    routing::ConfigRouter,
    sensors::{
        BarometerValue, GpsValue, GyroscopeValue, HumidityValue, LightValue, SensorValue,
        VibrationValue, reading_from_arguments,
    },
    settings::ChaincodeSettings,
};

const ADD_IOT_GPS: &str = GpsValue::ADD_FUNCTION;
const LIST_IOT_GPS: &str = GpsValue::LIST_FUNCTION;
const ADD_IOT_BAROMETER: &str = BarometerValue::ADD_FUNCTION;
const LIST_IOT_BAROMETER: &str = BarometerValue::LIST_FUNCTION;
const ADD_IOT_GYROSCOPE: &str = GyroscopeValue::ADD_FUNCTION;
const LIST_IOT_GYROSCOPE: &str = GyroscopeValue::LIST_FUNCTION;
const ADD_IOT_HUMIDITY: &str = HumidityValue::ADD_FUNCTION;
const LIST_IOT_HUMIDITY: &str = HumidityValue::LIST_FUNCTION;
const ADD_IOT_VIBRATION: &str = VibrationValue::ADD_FUNCTION;
const LIST_IOT_VIBRATION: &str = VibrationValue::LIST_FUNCTION;
const ADD_IOT_LIGHT: &str = LightValue::ADD_FUNCTION;
const LIST_IOT_LIGHT: &str = LightValue::LIST_FUNCTION;
const ADD_IOT_CERTIFICATE: &str = "addIotCertificate";
const CHECK_IOT_CERTIFICATE: &str = "checkIotCertificate";
const SET_CONFIG: &str = "setConfig";
const GET_CONFIG: &str = "getConfig";

/// Every function [`IotChaincode::invoke`] accepts.
pub const FUNCTIONS: [&str; 16] = [
    ADD_IOT_GPS,
    LIST_IOT_GPS,
    ADD_IOT_BAROMETER,
    LIST_IOT_BAROMETER,
    ADD_IOT_GYROSCOPE,
    LIST_IOT_GYROSCOPE,
    ADD_IOT_HUMIDITY,
    LIST_IOT_HUMIDITY,
    ADD_IOT_VIBRATION,
    LIST_IOT_VIBRATION,
    ADD_IOT_LIGHT,
    LIST_IOT_LIGHT,
    ADD_IOT_CERTIFICATE,
    CHECK_IOT_CERTIFICATE,
    SET_CONFIG,
    GET_CONFIG,
];

/// Outcome of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Numeric status, `200` on success.
    pub status: i32,
    /// Failure description, empty on success.
    pub message: String,
    /// Optional JSON payload.
    pub payload: Option<Bytes>,
}

impl Response {
    /// A successful response.
    #[must_use]
    pub fn success(payload: Option<Bytes>) -> Self {
        Self { status: STATUS_OK, message: String::new(), payload }
    }

    /// A failed response.
    #[must_use]
    pub fn error(status: i32, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), payload: None }
    }

    /// Returns `true` for a successful response.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// The IoT telemetry chaincode.
#[derive(Debug, Clone, Default)]
pub struct IotChaincode {
    settings: ChaincodeSettings,
}

impl IotChaincode {
    /// Creates a chaincode with the given settings.
    #[must_use]
    pub fn new(settings: ChaincodeSettings) -> Self {
        Self { settings }
    }

    /// Returns the settings.
    #[must_use]
    pub fn settings(&self) -> &ChaincodeSettings {
        &self.settings
    }

    /// Handles chaincode instantiation. Nothing is written.
    pub fn init(&self, stub: &dyn ChaincodeStub) -> Response {
        tracing::debug!(tx_id = stub.tx_id(), chaincode = self.settings.chaincode_name(), "init");
        Response::success(None)
    }

    /// Handles one request.
    #[tracing::instrument(
        skip(self, stub, args),
        fields(tx_id = stub.tx_id(), arg_count = args.len())
    )]
    pub fn invoke(&self, stub: &dyn ChaincodeStub, function: &str, args: &[String]) -> Response {
        let name = self.settings.chaincode_name();

        if !FUNCTIONS.contains(&function) {
            let message = format!(
                "invalid invoke function name: expected one of {{{}}}, got {function}",
                FUNCTIONS.join(", ")
            );
            tracing::debug!("{message}");
            return Response::error(STATUS_BAD_REQUEST, message);
        }

        tracing::info!("{name}.{function} is running");
        match self.dispatch(stub, function, args) {
            Ok(payload) => {
                tracing::info!("{name}.{function} exited without errors");
                Response::success(payload)
            },
            Err(e) => {
                let status = e.status();
                tracing::error!(status, error = %e, "{name}.{function} failed");
                Response::error(status, e.to_string())
            },
        }
    }

    fn dispatch(
        &self,
        stub: &dyn ChaincodeStub,
        function: &str,
        args: &[String],
    ) -> ChaincodeResult<Option<Bytes>> {
        match function {
            ADD_IOT_GPS => self.add_reading::<GpsValue>(stub, args),
            LIST_IOT_GPS => list_readings::<GpsValue>(stub),
            ADD_IOT_BAROMETER => self.add_reading::<BarometerValue>(stub, args),
            LIST_IOT_BAROMETER => list_readings::<BarometerValue>(stub),
            ADD_IOT_GYROSCOPE => self.add_reading::<GyroscopeValue>(stub, args),
            LIST_IOT_GYROSCOPE => list_readings::<GyroscopeValue>(stub),
            ADD_IOT_HUMIDITY => self.add_reading::<HumidityValue>(stub, args),
            LIST_IOT_HUMIDITY => list_readings::<HumidityValue>(stub),
            ADD_IOT_VIBRATION => self.add_reading::<VibrationValue>(stub, args),
            LIST_IOT_VIBRATION => list_readings::<VibrationValue>(stub),
            ADD_IOT_LIGHT => self.add_reading::<LightValue>(stub, args),
            LIST_IOT_LIGHT => list_readings::<LightValue>(stub),
            ADD_IOT_CERTIFICATE => add_certificate(stub, args),
            CHECK_IOT_CERTIFICATE => check_certificate(stub, args),
            SET_CONFIG => set_config(stub, args),
            GET_CONFIG => get_config(stub),
            other => Err(ChaincodeError::invalid_argument(format!("unknown function {other}"))),
        }
    }

    fn add_reading<V: SensorValue>(
        &self,
        stub: &dyn ChaincodeStub,
        args: &[String],
    ) -> ChaincodeResult<Option<Bytes>> {
        let store = EntityStore::new(stub, &ConfigRouter);
        let registry = CertificateRegistry::new(EntityStore::shared(stub));

        let reading = reading_from_arguments::<V>(&registry, args)?;
        tracing::debug!(
            namespace = V::NAMESPACE,
            id = reading.id(),
            valid = reading.value.meta().valid,
            "built reading"
        );

        store.upsert(&reading, self.settings.endorsers(), self.settings.endorser_role())?;

        let mut batch = EventBatch::new();
        batch.push(EventValue::new(
            V::ADD_FUNCTION,
            V::NAMESPACE,
            reading.id(),
            to_json(&reading.value)?,
        ));
        emit_events(store, &batch)?;
        Ok(None)
    }
}

fn list_readings<V: SensorValue>(stub: &dyn ChaincodeStub) -> ChaincodeResult<Option<Bytes>> {
    let readings = EntityStore::new(stub, &ConfigRouter).query(
        V::NAMESPACE,
        &[],
        Record::<V>::blank,
        accept_all,
    )?;
    tracing::debug!(namespace = V::NAMESPACE, count = readings.len(), "listed readings");
    to_payload(&readings)
}

fn add_certificate(stub: &dyn ChaincodeStub, args: &[String]) -> ChaincodeResult<Option<Bytes>> {
    let certificate = certificate_from_arguments(args)?;
    CertificateRegistry::new(EntityStore::shared(stub)).register(&certificate)?;

    let mut batch = EventBatch::new();
    batch.push(EventValue::new(
        ADD_IOT_CERTIFICATE,
        CERTIFICATE_NAMESPACE,
        certificate.id(),
        to_json(&certificate.value)?,
    ));
    emit_events(EntityStore::new(stub, &ConfigRouter), &batch)?;
    Ok(None)
}

fn check_certificate(stub: &dyn ChaincodeStub, args: &[String]) -> ChaincodeResult<Option<Bytes>> {
    let candidate = match args.first() {
        Some(text) if !text.is_empty() => extract_pem_block(text.as_bytes())?,
        _ => "",
    };
    let registered = CertificateRegistry::new(EntityStore::shared(stub)).is_registered(candidate)?;
    to_payload(&registered)
}

fn set_config(stub: &dyn ChaincodeStub, args: &[String]) -> ChaincodeResult<Option<Bytes>> {
    let config = Config::from_arguments(args)?;
    EntityStore::shared(stub).upsert(&config, &[], RoleType::default())?;
    tracing::debug!(collections = config.value.collections.len(), "stored config");
    Ok(None)
}

fn get_config(stub: &dyn ChaincodeStub) -> ChaincodeResult<Option<Bytes>> {
    match Config::load(stub)? {
        Some(config) => to_payload(&config.value),
        None => Err(StorageError::not_found(CONFIG_NAMESPACE).into()),
    }
}

fn to_json<T: Serialize>(value: &T) -> ChaincodeResult<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| StorageError::persist_with_source("cannot encode event payload", e).into())
}

fn to_payload<T: Serialize>(value: &T) -> ChaincodeResult<Option<Bytes>> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| StorageError::persist_with_source("cannot encode response payload", e))?;
    Ok(Some(Bytes::from(bytes)))
}
