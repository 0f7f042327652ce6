//! Routing driven by the ledger-resident [`Config`].

use iot_ledger_storage::{ChaincodeStub, CollectionRouter, StorageLocation, StorageResult};

use crate::config::{CONFIG_NAMESPACE, Config};

/// Router that reads the [`Config`] singleton on every call.
///
/// A namespace listed under no collection, a ledger without a config, and
/// the config namespace itself all resolve to shared state. Nothing is
/// cached: the config can change between transactions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigRouter;

impl CollectionRouter for ConfigRouter {
    fn resolve(
        &self,
        stub: &dyn ChaincodeStub,
        namespace: &str,
        participants: &[String],
    ) -> StorageResult<Vec<StorageLocation>> {
        if namespace == CONFIG_NAMESPACE {
            return Ok(Vec::new());
        }
        match Config::load(stub)? {
            Some(config) => config.router().resolve(stub, namespace, participants),
            None => Ok(Vec::new()),
        }
    }
}
