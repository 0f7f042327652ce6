//! Ledger-resident configuration singleton.
//!
//! [`Config`] lists the private data collections of the network and the
//! logical chaincode name. It lives under the `ConfigSC` namespace with no
//! key fragments, so there is exactly one per ledger. It is written by the
//! `setConfig` request and read fresh by [`ConfigRouter`](crate::ConfigRouter)
//! on every routed operation.

use iot_ledger_storage::{
    ChaincodeStub, Entity, EntityStore, StaticRouter, StorageError, StorageResult,
};
use serde::{Deserialize, Serialize};

use crate::error::{ChaincodeError, ChaincodeResult};

/// Namespace of the configuration singleton.
pub const CONFIG_NAMESPACE: &str = "ConfigSC";

/// A private data collection known to the chaincode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Collection name as defined in the network's collection config.
    pub name: String,

    /// Free-form membership policy, kept for operators.
    #[serde(default)]
    pub policy: String,

    /// Namespaces whose records are stored in this collection.
    #[serde(rename = "entityTypes", default, skip_serializing_if = "Vec::is_empty")]
    pub entity_types: Vec<String>,
}

/// Stored value of the configuration singleton.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigValue {
    /// Known private data collections.
    pub collections: Vec<Collection>,
    /// Logical chaincode name.
    pub chaincode_name: String,
}

/// The configuration singleton.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Stored value.
    pub value: ConfigValue,
}

const CONFIG_ARGUMENTS: usize = 2;

impl Config {
    /// Builds the configuration from `[collectionsJSON, chaincodeName]`.
    ///
    /// # Errors
    ///
    /// Returns [`ChaincodeError::InvalidArgument`] if an argument is missing,
    /// empty, or the collections are not a JSON array of collections.
    pub fn from_arguments(args: &[String]) -> ChaincodeResult<Self> {
        let [collections, chaincode_name, ..] = args else {
            return Err(ChaincodeError::invalid_argument(format!(
                "arguments array must contain at least {CONFIG_ARGUMENTS} items"
            )));
        };

        if collections.is_empty() {
            return Err(ChaincodeError::invalid_argument("collections must be not empty"));
        }
        let collections: Vec<Collection> = serde_json::from_str(collections).map_err(|e| {
            ChaincodeError::invalid_argument(format!("cannot unmarshal collections: {e}"))
        })?;

        if chaincode_name.is_empty() {
            return Err(ChaincodeError::invalid_argument("chaincode name must be not empty"));
        }

        Ok(Self {
            value: ConfigValue { collections, chaincode_name: chaincode_name.clone() },
        })
    }

    /// Reads the singleton from shared state, or `None` if it was never set.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupt`] if the stored value does not decode,
    /// or any ledger error.
    pub fn load(stub: &dyn ChaincodeStub) -> StorageResult<Option<Self>> {
        let mut config = Self::default();
        match EntityStore::shared(stub).load(&mut config) {
            Ok(()) => Ok(Some(config)),
            Err(StorageError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Builds a routing table from the configured collections.
    #[must_use]
    pub fn router(&self) -> StaticRouter {
        self.value.collections.iter().fold(StaticRouter::new(), |router, collection| {
            collection.entity_types.iter().fold(router, |router, namespace| {
                router.route(namespace.clone(), [collection.name.clone()])
            })
        })
    }
}

impl Entity for Config {
    fn namespace(&self) -> &str {
        CONFIG_NAMESPACE
    }

    fn key_fragments(&self) -> Vec<String> {
        Vec::new()
    }

    fn fill_from_key_fragments(&mut self, fragments: &[String]) -> StorageResult<()> {
        if !fragments.is_empty() {
            return Err(StorageError::invalid_key(format!(
                "{CONFIG_NAMESPACE} key has no fragments, got {}",
                fragments.len()
            )));
        }
        Ok(())
    }

    fn fill_from_ledger_value(&mut self, value: &[u8]) -> StorageResult<()> {
        self.value = serde_json::from_slice(value)
            .map_err(|e| StorageError::corrupt_with_source("cannot decode config value", e))?;
        Ok(())
    }

    fn to_ledger_value(&self) -> StorageResult<Vec<u8>> {
        serde_json::to_vec(&self.value)
            .map_err(|e| StorageError::persist_with_source("cannot encode config value", e))
    }
}
