//! Collection routing.
//!
//! A [`CollectionRouter`] decides where an entity type lives: the shared
//! world state or one or more private data collections, in the order the
//! [`EntityStore`](crate::EntityStore) should probe them.
//!
//! An empty resolution means "use shared state". It never means "use no
//! storage at all".

use std::collections::BTreeMap;

use crate::{error::StorageResult, stub::ChaincodeStub, types::StorageLocation};

/// Resolves storage locations for a namespace.
///
/// Routers are consulted on every store operation and must not cache
/// anything across transactions; routing data can change between them.
pub trait CollectionRouter {
    /// Returns the storage locations for `namespace`, in priority order.
    ///
    /// `participants` are the organizations involved in the write, for
    /// routers that pick collections by membership.
    ///
    /// # Errors
    ///
    /// Returns an error if routing data cannot be read or decoded.
    fn resolve(
        &self,
        stub: &dyn ChaincodeStub,
        namespace: &str,
        participants: &[String],
    ) -> StorageResult<Vec<StorageLocation>>;
}

/// Router that sends everything to the shared world state.
#[derive(Debug, Clone, Copy, Default)]
pub struct SharedStateRouter;

impl CollectionRouter for SharedStateRouter {
    fn resolve(
        &self,
        _stub: &dyn ChaincodeStub,
        _namespace: &str,
        _participants: &[String],
    ) -> StorageResult<Vec<StorageLocation>> {
        Ok(Vec::new())
    }
}

/// Router with a fixed namespace-to-collections table.
///
/// Namespaces without an entry resolve to shared state.
///
/// # Example
///
/// ```
/// use iot_ledger_storage::StaticRouter;
///
/// let router = StaticRouter::new().route("IotGps", ["buyers", "sellers"]);
/// assert_eq!(router.collections_for("IotGps"), ["buyers", "sellers"]);
/// assert!(router.collections_for("IotLight").is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticRouter {
    routes: BTreeMap<String, Vec<String>>,
}

impl StaticRouter {
    /// Creates a router with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends collections for `namespace`, keeping insertion order and
    /// skipping duplicates.
    #[must_use]
    pub fn route<I, S>(mut self, namespace: impl Into<String>, collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.routes.entry(namespace.into()).or_default();
        for collection in collections {
            let collection = collection.into();
            if !entry.contains(&collection) {
                entry.push(collection);
            }
        }
        self
    }

    /// Returns the collections routed for `namespace`.
    #[must_use]
    pub fn collections_for(&self, namespace: &str) -> &[String] {
        self.routes.get(namespace).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns `true` if no namespace has a route.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.values().all(Vec::is_empty)
    }
}

impl CollectionRouter for StaticRouter {
    fn resolve(
        &self,
        _stub: &dyn ChaincodeStub,
        namespace: &str,
        _participants: &[String],
    ) -> StorageResult<Vec<StorageLocation>> {
        Ok(self
            .collections_for(namespace)
            .iter()
            .map(|name| StorageLocation::Private(name.clone()))
            .collect())
    }
}
