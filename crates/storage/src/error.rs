//! Storage error types and result alias.
//!
//! Every failure the entity framework can produce is mapped onto
//! [`StorageError`]. Nothing here is retried internally; the enclosing
//! ledger transaction is expected to abort and the runtime decides whether
//! to resubmit it.
//!
//! # Error Types
//!
//! - [`StorageError::InvalidKey`] - Composite key or ID fragment is malformed
//! - [`StorageError::WrongVersion`] - ID parses as a UUID but is not version 4
//! - [`StorageError::NotFound`] - No storage location holds the requested key
//! - [`StorageError::Corrupt`] - Stored bytes or keys fail to decode
//! - [`StorageError::Persist`] - The ledger rejected a read or write
//! - [`StorageError::Context`] - Transaction context is missing or unusable
//!
//! # Example
//!
//! ```
//! use iot_ledger_storage::{StorageError, StorageResult};
//!
//! fn lookup(key: &str) -> StorageResult<Vec<u8>> {
//!     Err(StorageError::not_found(key))
//! }
//!
//! assert!(matches!(lookup("IotGps"), Err(StorageError::NotFound { .. })));
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A shared error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while encoding, persisting or querying entities.
///
/// Errors preserve their source chain via the `#[source]` attribute.
///
/// # Non-exhaustive
///
/// New variants may be added without a semver-breaking change. Downstream
/// match expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// A namespace, key fragment or composite key is malformed.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of what is wrong with the key.
        message: String,
    },

    /// An identifier parsed as a UUID but is not a version 4 UUID.
    #[error("Wrong ID format: expected UUID version 4, got \"{id}\"")]
    WrongVersion {
        /// The offending identifier.
        id: String,
    },

    /// No storage location holds a value for the key.
    #[error("Key not found: {key}")]
    NotFound {
        /// The key that was not found.
        key: String,
    },

    /// Stored bytes, or the key they were stored under, failed to decode.
    ///
    /// Fatal for the request; partial results are never returned.
    #[error("Corrupt record: {message}")]
    Corrupt {
        /// Description of the decoding failure.
        message: String,
        /// The underlying decoding error.
        #[source]
        source: Option<BoxError>,
    },

    /// The ledger rejected a read or write, or a value could not be encoded.
    #[error("Persistence error: {message}")]
    Persist {
        /// Description of the persistence failure.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<BoxError>,
    },

    /// The transaction context (timestamp, id, creator) is unavailable or unusable.
    #[error("Transaction context error: {message}")]
    Context {
        /// Description of the context failure.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey { message: message.into() }
    }

    /// Creates a new `WrongVersion` error for the given identifier.
    #[must_use]
    pub fn wrong_version(id: impl Into<String>) -> Self {
        Self::WrongVersion { id: id.into() }
    }

    /// Creates a new `NotFound` error for the given key.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates a new `Corrupt` error with the given message.
    #[must_use]
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt { message: message.into(), source: None }
    }

    /// Creates a new `Corrupt` error with a message and source error.
    #[must_use]
    pub fn corrupt_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Corrupt { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Persist` error with the given message.
    #[must_use]
    pub fn persist(message: impl Into<String>) -> Self {
        Self::Persist { message: message.into(), source: None }
    }

    /// Creates a new `Persist` error with a message and source error.
    #[must_use]
    pub fn persist_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Persist { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Context` error.
    #[must_use]
    pub fn context(message: impl Into<String>) -> Self {
        Self::Context { message: message.into() }
    }

    /// Returns `true` for key and identifier decoding failures.
    #[must_use]
    pub fn is_key_error(&self) -> bool {
        matches!(self, Self::InvalidKey { .. } | Self::WrongVersion { .. })
    }
}
