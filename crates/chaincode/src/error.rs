//! Chaincode error types.
//!
//! [`ChaincodeError`] adds the request-level failures (bad arguments,
//! unreadable certificates, invalid settings) to the storage layer's
//! [`StorageError`]. [`ChaincodeError::status`] maps every variant onto the
//! numeric status reported at the request boundary.

use iot_ledger_storage::StorageError;
use thiserror::Error;

/// Result type alias for chaincode operations.
pub type ChaincodeResult<T> = Result<T, ChaincodeError>;

/// Status of a successful response.
pub const STATUS_OK: i32 = 200;
/// Status for malformed input of any kind.
pub const STATUS_BAD_REQUEST: i32 = 400;
/// Status for a read of an absent record.
pub const STATUS_NOT_FOUND: i32 = 404;
/// Status for ledger, context and configuration failures.
pub const STATUS_INTERNAL: i32 = 500;

/// Errors that can occur while handling a chaincode request.
///
/// # Non-exhaustive
///
/// New variants may be added without a semver-breaking change. Downstream
/// match expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChaincodeError {
    /// Caller input is missing or malformed.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// A certificate (or the PEM block around it) could not be decoded.
    #[error("Unparseable certificate: {message}")]
    Unparseable {
        /// Description of the decoding failure.
        message: String,
    },

    /// Process-side settings are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the invalid setting.
        message: String,
    },

    /// Failure from the storage layer.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ChaincodeError {
    /// Creates a new `InvalidArgument` error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument { message: message.into() }
    }

    /// Creates a new `Unparseable` error.
    #[must_use]
    pub fn unparseable(message: impl Into<String>) -> Self {
        Self::Unparseable { message: message.into() }
    }

    /// Creates a new `Config` error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Returns the response status for this error.
    #[must_use]
    pub fn status(&self) -> i32 {
        match self {
            Self::InvalidArgument { .. } | Self::Unparseable { .. } => STATUS_BAD_REQUEST,
            Self::Config { .. } => STATUS_INTERNAL,
            Self::Storage(e) => match e {
                StorageError::InvalidKey { .. } | StorageError::WrongVersion { .. } => {
                    STATUS_BAD_REQUEST
                },
                StorageError::NotFound { .. } => STATUS_NOT_FOUND,
                _ => STATUS_INTERNAL,
            },
        }
    }
}
