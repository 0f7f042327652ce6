//! Process-side settings for the chaincode.
//!
//! [`ChaincodeSettings`] covers what the deploying operator chooses when the
//! chaincode process starts: the name used in log lines, the endorsement
//! policy attached to ingested records, and logging. Routing data lives on
//! the ledger instead (see [`Config`](crate::Config)).

use iot_ledger_storage::RoleType;
use serde::{Deserialize, Serialize};

use crate::error::{ChaincodeError, ChaincodeResult};

/// Default logical chaincode name.
pub const DEFAULT_CHAINCODE_NAME: &str = "SupplyChainChaincode";

/// Default tracing filter directive.
const DEFAULT_FILTER: &str = "info";

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG` when set.
    #[serde(default = "default_filter")]
    #[builder(default = default_filter(), into)]
    pub filter: String,

    /// Output format.
    #[serde(default)]
    #[builder(default)]
    pub format: LogFormat,
}

fn default_filter() -> String {
    DEFAULT_FILTER.to_owned()
}

fn default_chaincode_name() -> String {
    DEFAULT_CHAINCODE_NAME.to_owned()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: default_filter(), format: LogFormat::default() }
    }
}

/// Settings for [`IotChaincode`](crate::IotChaincode).
///
/// # Example
///
/// ```
/// use iot_ledger_chaincode::{ChaincodeSettings, LogFormat, LoggingConfig};
/// use iot_ledger_storage::RoleType;
///
/// let settings = ChaincodeSettings::builder()
///     .chaincode_name("TelemetryChaincode")
///     .endorsers(vec!["Org1MSP".to_owned(), "Org2MSP".to_owned()])
///     .endorser_role(RoleType::Peer)
///     .logging(LoggingConfig::builder().format(LogFormat::Json).build())
///     .build()?;
///
/// assert_eq!(settings.chaincode_name(), "TelemetryChaincode");
/// assert_eq!(settings.endorsers(), ["Org1MSP", "Org2MSP"]);
/// # Ok::<(), iot_ledger_chaincode::ChaincodeError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChaincodeSettings {
    /// Name used as the prefix of request log lines.
    #[serde(default = "default_chaincode_name")]
    pub(crate) chaincode_name: String,

    /// Organizations whose endorsement is required for ingested records.
    /// Empty means no key-level policy is attached.
    #[serde(default)]
    pub(crate) endorsers: Vec<String>,

    /// Role the endorsing identities must hold.
    #[serde(default)]
    pub(crate) endorser_role: RoleType,

    /// Logging settings.
    #[serde(default)]
    pub(crate) logging: LoggingConfig,
}

impl Default for ChaincodeSettings {
    fn default() -> Self {
        Self {
            chaincode_name: default_chaincode_name(),
            endorsers: Vec::new(),
            endorser_role: RoleType::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[bon::bon]
impl ChaincodeSettings {
    /// Creates validated settings.
    ///
    /// # Optional Fields
    ///
    /// * `chaincode_name` - Log prefix (default: `SupplyChainChaincode`).
    /// * `endorsers` - Organizations endorsing ingested records (default: none).
    /// * `endorser_role` - Role of the endorsers (default: member).
    /// * `logging` - Logging settings (default: `info`, text).
    ///
    /// # Errors
    ///
    /// Returns [`ChaincodeError::Config`] if a field fails [`validate`](Self::validate).
    #[builder]
    pub fn new(
        #[builder(default = default_chaincode_name(), into)] chaincode_name: String,
        #[builder(default)] endorsers: Vec<String>,
        #[builder(default)] endorser_role: RoleType,
        #[builder(default)] logging: LoggingConfig,
    ) -> ChaincodeResult<Self> {
        let settings = Self { chaincode_name, endorsers, endorser_role, logging };
        settings.validate()?;
        Ok(settings)
    }

    /// Parses and validates settings from JSON. Missing fields take their
    /// defaults; unknown fields are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ChaincodeError::Config`] if the JSON is malformed or invalid.
    pub fn from_json(json: &str) -> ChaincodeResult<Self> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| ChaincodeError::config(format!("cannot parse settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks the settings for values the chaincode cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ChaincodeError::Config`] if the chaincode name or the log
    /// filter is empty, or an endorser name is empty.
    pub fn validate(&self) -> ChaincodeResult<()> {
        if self.chaincode_name.is_empty() {
            return Err(ChaincodeError::config("chaincode_name cannot be empty"));
        }
        if self.logging.filter.trim().is_empty() {
            return Err(ChaincodeError::config("logging.filter cannot be empty"));
        }
        if self.endorsers.iter().any(String::is_empty) {
            return Err(ChaincodeError::config("endorsers cannot contain empty names"));
        }
        Ok(())
    }

    /// Returns the chaincode name.
    #[must_use]
    pub fn chaincode_name(&self) -> &str {
        &self.chaincode_name
    }

    /// Returns the endorsing organizations.
    #[must_use]
    pub fn endorsers(&self) -> &[String] {
        &self.endorsers
    }

    /// Returns the endorser role.
    #[must_use]
    pub fn endorser_role(&self) -> RoleType {
        self.endorser_role
    }

    /// Returns the logging settings.
    #[must_use]
    pub fn logging(&self) -> &LoggingConfig {
        &self.logging
    }
}
