//! Sensor reading records.
//!
//! Six reading kinds share one shape: measurement fields followed by a
//! [`ReadingMeta`] block (custom field, validity flag, device timestamp).
//! Each kind implements [`SensorValue`], which names its request functions
//! and decodes its positional arguments; [`reading_from_arguments`] does the
//! rest for every kind alike.
//!
//! Argument order for every kind is the measurement fields in declaration
//! order, then the Unix timestamp:
//!
//! | Kind | Arguments |
//! |------|-----------|
//! | GPS | longitude, latitude, altitude, timestamp |
//! | Barometer | pressure, altitude, temperature, timestamp |
//! | Gyroscope | 6 rotation values, 6 acceleration values, timestamp |
//! | Humidity | humidity, temperature, timestamp |
//! | Vibration | vibration, timestamp |
//! | Light | light, timestamp |

use iot_ledger_storage::{Record, RecordValue};
use serde::{Deserialize, Serialize};

use crate::{
    certificate::CertificateRegistry,
    error::{ChaincodeError, ChaincodeResult},
};

/// Namespace of GPS readings.
pub const GPS_NAMESPACE: &str = "IotGps";
/// Namespace of barometer readings.
pub const BAROMETER_NAMESPACE: &str = "IotBarometer";
/// Namespace of gyroscope readings.
pub const GYROSCOPE_NAMESPACE: &str = "IotGyroscope";
/// Namespace of humidity readings.
pub const HUMIDITY_NAMESPACE: &str = "IotHumidity";
/// Namespace of vibration readings.
pub const VIBRATION_NAMESPACE: &str = "IotVibration";
/// Namespace of light readings.
pub const LIGHT_NAMESPACE: &str = "IotLight";

/// Fields stamped on every reading at ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingMeta {
    /// Email addresses of the submitting device's certificate.
    pub customfield: String,
    /// `1` if the submitting certificate was registered at ingestion, else `0`.
    pub valid: u8,
    /// Device-supplied Unix timestamp.
    pub timestamp: i64,
}

/// Positional request arguments with field-aware parsing.
#[derive(Debug, Clone, Copy)]
pub struct Arguments<'a> {
    args: &'a [String],
}

impl<'a> Arguments<'a> {
    /// Wraps `args` after checking that at least `required` are present.
    ///
    /// # Errors
    ///
    /// Returns [`ChaincodeError::InvalidArgument`] if fewer are supplied.
    pub fn new(args: &'a [String], required: usize) -> ChaincodeResult<Self> {
        if args.len() < required {
            return Err(ChaincodeError::invalid_argument(format!(
                "arguments array must contain at least {required} items"
            )));
        }
        Ok(Self { args })
    }

    fn field(&self, index: usize, name: &str) -> ChaincodeResult<&'a str> {
        match self.args.get(index).map(String::as_str) {
            Some(raw) if !raw.is_empty() => Ok(raw),
            _ => Err(ChaincodeError::invalid_argument(format!("{name} must be not empty"))),
        }
    }

    /// Parses argument `index` as a finite `f32`.
    ///
    /// # Errors
    ///
    /// Returns [`ChaincodeError::InvalidArgument`] naming `name`.
    pub fn f32(&self, index: usize, name: &str) -> ChaincodeResult<f32> {
        let raw = self.field(index, name)?;
        let value: f32 = raw.parse().map_err(|e| {
            ChaincodeError::invalid_argument(format!("unable to parse the {name}: {e}"))
        })?;
        if !value.is_finite() {
            return Err(ChaincodeError::invalid_argument(format!(
                "unable to parse the {name}: {raw:?} is not a finite number"
            )));
        }
        Ok(value)
    }

    /// Parses argument `index` as a `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`ChaincodeError::InvalidArgument`] naming `name`.
    pub fn u32(&self, index: usize, name: &str) -> ChaincodeResult<u32> {
        self.field(index, name)?.parse().map_err(|e| {
            ChaincodeError::invalid_argument(format!("unable to parse the {name}: {e}"))
        })
    }

    /// Parses argument `index` as a non-negative Unix timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`ChaincodeError::InvalidArgument`] if the argument is empty,
    /// not an integer, or negative.
    pub fn timestamp(&self, index: usize) -> ChaincodeResult<i64> {
        match self.args.get(index) {
            Some(raw) => parse_timestamp(raw),
            None => Err(ChaincodeError::invalid_argument("timestamp must be not empty")),
        }
    }
}

/// Parses a caller-supplied Unix timestamp, rejecting negative values.
pub(crate) fn parse_timestamp(raw: &str) -> ChaincodeResult<i64> {
    if raw.is_empty() {
        return Err(ChaincodeError::invalid_argument("timestamp must be not empty"));
    }
    let timestamp: i64 = raw.parse().map_err(|e| {
        ChaincodeError::invalid_argument(format!("unable to parse the timestamp: {e}"))
    })?;
    if timestamp < 0 {
        return Err(ChaincodeError::invalid_argument("timestamp must be larger than zero"));
    }
    Ok(timestamp)
}

/// A sensor reading kind.
pub trait SensorValue: RecordValue + Clone {
    /// Request function that ingests a reading, e.g. `addIotGps`.
    const ADD_FUNCTION: &'static str;
    /// Request function that lists readings, e.g. `listIotGps`.
    const LIST_FUNCTION: &'static str;
    /// Number of positional arguments, timestamp included.
    const ARGUMENTS: usize;

    /// Decodes the measurement fields; the meta block is left default.
    ///
    /// # Errors
    ///
    /// Returns [`ChaincodeError::InvalidArgument`] on malformed input.
    fn parse_measurements(args: &Arguments<'_>) -> ChaincodeResult<Self>;

    /// The meta block.
    fn meta(&self) -> &ReadingMeta;

    /// Mutable access to the meta block.
    fn meta_mut(&mut self) -> &mut ReadingMeta;
}

/// Builds a reading from request arguments.
///
/// The measurements and timestamp are decoded first; then the caller's
/// custom field is read from its certificate and its registration status is
/// stamped as the `valid` flag. The record gets a random version 4 id.
///
/// # Errors
///
/// - [`ChaincodeError::InvalidArgument`] on malformed arguments.
/// - [`ChaincodeError::Unparseable`] if the creator certificate cannot be read.
/// - Any storage error from the registry scan.
pub fn reading_from_arguments<V: SensorValue>(
    registry: &CertificateRegistry<'_>,
    args: &[String],
) -> ChaincodeResult<Record<V>> {
    let args = Arguments::new(args, V::ARGUMENTS)?;
    let mut value = V::parse_measurements(&args)?;
    let timestamp = args.timestamp(V::ARGUMENTS - 1)?;

    let customfield = registry.creator_custom_field()?;
    let valid = registry.is_registered("")?;
    *value.meta_mut() = ReadingMeta { customfield, valid, timestamp };

    Ok(Record::with_random_id(value))
}

/// Position fix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpsValue {
    /// Degrees east.
    pub longitude: f32,
    /// Degrees north.
    pub latitude: f32,
    /// Meters above sea level.
    pub altitude: f32,
    /// Ingestion fields.
    #[serde(flatten)]
    pub meta: ReadingMeta,
}

impl RecordValue for GpsValue {
    const NAMESPACE: &'static str = GPS_NAMESPACE;
}

impl SensorValue for GpsValue {
    const ADD_FUNCTION: &'static str = "addIotGps";
    const LIST_FUNCTION: &'static str = "listIotGps";
    const ARGUMENTS: usize = 4;

    fn parse_measurements(args: &Arguments<'_>) -> ChaincodeResult<Self> {
        Ok(Self {
            longitude: args.f32(0, "longitude")?,
            latitude: args.f32(1, "latitude")?,
            altitude: args.f32(2, "altitude")?,
            meta: ReadingMeta::default(),
        })
    }

    fn meta(&self) -> &ReadingMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ReadingMeta {
        &mut self.meta
    }
}

/// Pressure, altitude and temperature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BarometerValue {
    /// Pressure in hPa.
    pub pressure: f32,
    /// Derived altitude in meters.
    pub altitude: f32,
    /// Degrees Celsius.
    pub temperature: f32,
    /// Ingestion fields.
    #[serde(flatten)]
    pub meta: ReadingMeta,
}

impl RecordValue for BarometerValue {
    const NAMESPACE: &'static str = BAROMETER_NAMESPACE;
}

impl SensorValue for BarometerValue {
    const ADD_FUNCTION: &'static str = "addIotBarometer";
    const LIST_FUNCTION: &'static str = "listIotBarometer";
    const ARGUMENTS: usize = 4;

    fn parse_measurements(args: &Arguments<'_>) -> ChaincodeResult<Self> {
        Ok(Self {
            pressure: args.f32(0, "pressure")?,
            altitude: args.f32(1, "altitude")?,
            temperature: args.f32(2, "temperature")?,
            meta: ReadingMeta::default(),
        })
    }

    fn meta(&self) -> &ReadingMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ReadingMeta {
        &mut self.meta
    }
}

/// Angular rate and acceleration, raw and scaled, per axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GyroscopeValue {
    /// Angular rate around X, raw.
    #[serde(rename = "xout")]
    pub x_out: f32,
    /// Angular rate around X, scaled.
    #[serde(rename = "xoutscaled")]
    pub x_out_scaled: f32,
    /// Angular rate around Y, raw.
    #[serde(rename = "yout")]
    pub y_out: f32,
    /// Angular rate around Y, scaled.
    #[serde(rename = "youtscaled")]
    pub y_out_scaled: f32,
    /// Angular rate around Z, raw.
    #[serde(rename = "zout")]
    pub z_out: f32,
    /// Angular rate around Z, scaled.
    #[serde(rename = "zoutscaled")]
    pub z_out_scaled: f32,
    /// Acceleration along X, raw.
    #[serde(rename = "accelerationxout")]
    pub acceleration_x_out: f32,
    /// Acceleration along X, scaled.
    #[serde(rename = "accelerationxoutscaled")]
    pub acceleration_x_out_scaled: f32,
    /// Acceleration along Y, raw.
    #[serde(rename = "accelerationyout")]
    pub acceleration_y_out: f32,
    /// Acceleration along Y, scaled.
    #[serde(rename = "accelerationyoutscaled")]
    pub acceleration_y_out_scaled: f32,
    /// Acceleration along Z, raw.
    #[serde(rename = "accelerationZout")]
    pub acceleration_z_out: f32,
    /// Acceleration along Z, scaled.
    #[serde(rename = "accelerationZoutscaled")]
    pub acceleration_z_out_scaled: f32,
    /// Ingestion fields.
    #[serde(flatten)]
    pub meta: ReadingMeta,
}

impl RecordValue for GyroscopeValue {
    const NAMESPACE: &'static str = GYROSCOPE_NAMESPACE;
}

impl SensorValue for GyroscopeValue {
    const ADD_FUNCTION: &'static str = "addIotGyroscope";
    const LIST_FUNCTION: &'static str = "listIotGyroscope";
    const ARGUMENTS: usize = 13;

    fn parse_measurements(args: &Arguments<'_>) -> ChaincodeResult<Self> {
        Ok(Self {
            x_out: args.f32(0, "xOut")?,
            x_out_scaled: args.f32(1, "xOutScaled")?,
            y_out: args.f32(2, "yOut")?,
            y_out_scaled: args.f32(3, "yOutScaled")?,
            z_out: args.f32(4, "zOut")?,
            z_out_scaled: args.f32(5, "zOutScaled")?,
            acceleration_x_out: args.f32(6, "accelerationXout")?,
            acceleration_x_out_scaled: args.f32(7, "accelerationXoutScaled")?,
            acceleration_y_out: args.f32(8, "accelerationYout")?,
            acceleration_y_out_scaled: args.f32(9, "accelerationYoutScaled")?,
            acceleration_z_out: args.f32(10, "accelerationZout")?,
            acceleration_z_out_scaled: args.f32(11, "accelerationZoutScaled")?,
            meta: ReadingMeta::default(),
        })
    }

    fn meta(&self) -> &ReadingMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ReadingMeta {
        &mut self.meta
    }
}

/// Relative humidity and temperature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HumidityValue {
    /// Relative humidity in percent.
    pub humidity: f32,
    /// Degrees Celsius.
    pub temperature: f32,
    /// Ingestion fields.
    #[serde(flatten)]
    pub meta: ReadingMeta,
}

impl RecordValue for HumidityValue {
    const NAMESPACE: &'static str = HUMIDITY_NAMESPACE;
}

impl SensorValue for HumidityValue {
    const ADD_FUNCTION: &'static str = "addIotHumidity";
    const LIST_FUNCTION: &'static str = "listIotHumidity";
    const ARGUMENTS: usize = 3;

    fn parse_measurements(args: &Arguments<'_>) -> ChaincodeResult<Self> {
        Ok(Self {
            humidity: args.f32(0, "humidity")?,
            temperature: args.f32(1, "temperature")?,
            meta: ReadingMeta::default(),
        })
    }

    fn meta(&self) -> &ReadingMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ReadingMeta {
        &mut self.meta
    }
}

/// Vibration level reported by a switch sensor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VibrationValue {
    /// Vibration level.
    pub vibration: u32,
    /// Ingestion fields.
    #[serde(flatten)]
    pub meta: ReadingMeta,
}

impl RecordValue for VibrationValue {
    const NAMESPACE: &'static str = VIBRATION_NAMESPACE;
}

impl SensorValue for VibrationValue {
    const ADD_FUNCTION: &'static str = "addIotVibration";
    const LIST_FUNCTION: &'static str = "listIotVibration";
    const ARGUMENTS: usize = 2;

    fn parse_measurements(args: &Arguments<'_>) -> ChaincodeResult<Self> {
        Ok(Self { vibration: args.u32(0, "vibration")?, meta: ReadingMeta::default() })
    }

    fn meta(&self) -> &ReadingMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ReadingMeta {
        &mut self.meta
    }
}

/// Light level reported by a photo sensor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightValue {
    /// Light level.
    pub light: u32,
    /// Ingestion fields.
    #[serde(flatten)]
    pub meta: ReadingMeta,
}

impl RecordValue for LightValue {
    const NAMESPACE: &'static str = LIGHT_NAMESPACE;
}

impl SensorValue for LightValue {
    const ADD_FUNCTION: &'static str = "addIotLight";
    const LIST_FUNCTION: &'static str = "listIotLight";
    const ARGUMENTS: usize = 2;

    fn parse_measurements(args: &Arguments<'_>) -> ChaincodeResult<Self> {
        Ok(Self { light: args.u32(0, "light")?, meta: ReadingMeta::default() })
    }

    fn meta(&self) -> &ReadingMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ReadingMeta {
        &mut self.meta
    }
}

/// A GPS reading record.
pub type Gps = Record<GpsValue>;
/// A barometer reading record.
pub type Barometer = Record<BarometerValue>;
/// A gyroscope reading record.
pub type Gyroscope = Record<GyroscopeValue>;
/// A humidity reading record.
pub type Humidity = Record<HumidityValue>;
/// A vibration reading record.
pub type Vibration = Record<VibrationValue>;
/// A light reading record.
pub type Light = Record<LightValue>;
