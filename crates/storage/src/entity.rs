//! Entity abstraction.
//!
//! An [`Entity`] is anything the [`EntityStore`](crate::EntityStore) can
//! persist: it knows its namespace and key fragments, and how to encode and
//! decode its value. Only the value is stored; the key is rebuilt from the
//! composite key the record is addressed by.
//!
//! Most record kinds are a v4 id plus a JSON value. Those are modeled as
//! [`Record<V>`] over a [`RecordValue`], so a new kind is a plain data struct
//! with a namespace constant.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{
    error::{StorageError, StorageResult},
    ids::parse_v4,
    keys::encode_composite_key,
};

/// A value that can be stored on the ledger under a composite key.
pub trait Entity {
    /// Namespace (type tag) of the composite key.
    fn namespace(&self) -> &str;

    /// Ordered key fragments following the namespace.
    fn key_fragments(&self) -> Vec<String>;

    /// Rebuilds the key from fragments split out of a composite key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] or [`StorageError::WrongVersion`]
    /// if the fragments do not form a valid key for this entity.
    fn fill_from_key_fragments(&mut self, fragments: &[String]) -> StorageResult<()>;

    /// Replaces the value with one decoded from stored bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupt`] if the bytes do not decode.
    fn fill_from_ledger_value(&mut self, value: &[u8]) -> StorageResult<()>;

    /// Encodes the value for storage.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Persist`] if the value cannot be encoded.
    fn to_ledger_value(&self) -> StorageResult<Vec<u8>>;

    /// Checks the in-memory key before it is encoded for a read or write.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] or [`StorageError::WrongVersion`]
    /// if the key could not be read back by
    /// [`fill_from_key_fragments`](Self::fill_from_key_fragments).
    fn validate_key(&self) -> StorageResult<()> {
        Ok(())
    }

    /// Returns the composite key this entity is stored under.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if the namespace or a fragment is
    /// invalid, or any error from [`validate_key`](Self::validate_key).
    fn composite_key(&self) -> StorageResult<String> {
        self.validate_key()?;
        encode_composite_key(self.namespace(), &self.key_fragments())
    }
}

/// JSON payload of a [`Record`].
pub trait RecordValue: Serialize + DeserializeOwned + Default {
    /// Namespace every record of this kind is stored under.
    const NAMESPACE: &'static str;
}

/// Key of a [`Record`]: a single version 4 UUID fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    /// Canonical UUID string.
    pub id: String,
}

/// A record addressed by a version 4 UUID.
///
/// Serializes as `{"key": {"id": ...}, "value": {...}}`, the shape returned
/// by list queries.
///
/// # Example
///
/// ```
/// use iot_ledger_storage::{Entity, Record, RecordValue};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Default, Serialize, Deserialize)]
/// struct Note {
///     text: String,
/// }
///
/// impl RecordValue for Note {
///     const NAMESPACE: &'static str = "Note";
/// }
///
/// let note = Record::new(
///     "f47ac10b-58cc-4372-a567-0e02b2c3d479",
///     Note { text: "hi".into() },
/// )
/// .unwrap();
/// assert_eq!(note.namespace(), "Note");
/// assert_eq!(note.to_ledger_value().unwrap(), br#"{"text":"hi"}"#);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record<V> {
    /// Record key.
    pub key: RecordKey,
    /// Record payload.
    pub value: V,
}

impl<V: RecordValue> Record<V> {
    /// Creates a record after checking that `id` is a version 4 UUID.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] or [`StorageError::WrongVersion`].
    pub fn new(id: impl Into<String>, value: V) -> StorageResult<Self> {
        let id = id.into();
        parse_v4(&id)?;
        Ok(Self { key: RecordKey { id }, value })
    }

    /// Creates a record keyed by a freshly generated random UUID.
    #[must_use]
    pub fn with_random_id(value: V) -> Self {
        Self::with_uuid(Uuid::new_v4(), value)
    }

    /// Creates a record keyed by an already validated UUID.
    #[must_use]
    pub fn with_uuid(id: Uuid, value: V) -> Self {
        Self { key: RecordKey { id: id.to_string() }, value }
    }

    /// Returns a blank record, ready to be hydrated by a query.
    #[must_use]
    pub fn blank() -> Self {
        Self { key: RecordKey::default(), value: V::default() }
    }

    /// Returns the record id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.key.id
    }
}

impl<V: RecordValue> Entity for Record<V> {
    fn namespace(&self) -> &str {
        V::NAMESPACE
    }

    fn key_fragments(&self) -> Vec<String> {
        vec![self.key.id.clone()]
    }

    fn validate_key(&self) -> StorageResult<()> {
        parse_v4(&self.key.id).map(|_| ())
    }

    fn fill_from_key_fragments(&mut self, fragments: &[String]) -> StorageResult<()> {
        let [id] = fragments else {
            return Err(StorageError::invalid_key(format!(
                "{} key expects exactly one fragment, got {}",
                V::NAMESPACE,
                fragments.len()
            )));
        };
        parse_v4(id)?;
        self.key.id.clone_from(id);
        Ok(())
    }

    fn fill_from_ledger_value(&mut self, value: &[u8]) -> StorageResult<()> {
        self.value = serde_json::from_slice(value).map_err(|e| {
            StorageError::corrupt_with_source(format!("cannot decode {} value", V::NAMESPACE), e)
        })?;
        Ok(())
    }

    fn to_ledger_value(&self) -> StorageResult<Vec<u8>> {
        serde_json::to_vec(&self.value).map_err(|e| {
            StorageError::persist_with_source(format!("cannot encode {} value", V::NAMESPACE), e)
        })
    }
}
