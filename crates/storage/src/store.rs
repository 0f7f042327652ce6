//! Entity persistence.
//!
//! [`EntityStore`] owns the mapping between an [`Entity`] and its ledger
//! key. It consults a [`CollectionRouter`] on every call, reads from the
//! first location holding a value and attaches key-level endorsement
//! policies on write.
//!
//! Nothing here retries. Any ledger error is returned immediately and the
//! runtime discards the transaction's write set.

use bytes::Bytes;

use crate::{
    entity::Entity,
    error::{StorageError, StorageResult},
    policy::{EndorsementPolicy, RoleType},
    query,
    router::{CollectionRouter, SharedStateRouter},
    stub::ChaincodeStub,
    types::StorageLocation,
};

static SHARED_STATE: SharedStateRouter = SharedStateRouter;

/// Entity store bound to one transaction.
///
/// Cheap to copy; it only borrows the stub and router.
#[derive(Clone, Copy)]
pub struct EntityStore<'a> {
    stub: &'a dyn ChaincodeStub,
    router: &'a dyn CollectionRouter,
}

impl std::fmt::Debug for EntityStore<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore").field("tx_id", &self.stub.tx_id()).finish_non_exhaustive()
    }
}

impl<'a> EntityStore<'a> {
    /// Creates a store that routes through `router`.
    #[must_use]
    pub fn new(stub: &'a dyn ChaincodeStub, router: &'a dyn CollectionRouter) -> Self {
        Self { stub, router }
    }

    /// Creates a store that keeps everything in shared state.
    #[must_use]
    pub fn shared(stub: &'a dyn ChaincodeStub) -> Self {
        Self::new(stub, &SHARED_STATE)
    }

    /// Returns the underlying stub.
    #[must_use]
    pub fn stub(&self) -> &'a dyn ChaincodeStub {
        self.stub
    }

    fn locations(
        &self,
        namespace: &str,
        participants: &[String],
    ) -> StorageResult<Vec<StorageLocation>> {
        let mut locations = self.router.resolve(self.stub, namespace, participants)?;
        if locations.is_empty() {
            locations.push(StorageLocation::Shared);
        }
        Ok(locations)
    }

    fn read(&self, location: &StorageLocation, key: &str) -> StorageResult<Option<Bytes>> {
        match location {
            StorageLocation::Shared => self.stub.get_state(key),
            StorageLocation::Private(collection) => self.stub.get_private_data(collection, key),
        }
    }

    /// Returns `true` if any resolved location holds a value for the entity.
    ///
    /// Lookup failures are treated as absence and never surface as errors.
    #[tracing::instrument(skip_all, fields(namespace = entity.namespace()))]
    pub fn exists(&self, entity: &dyn Entity) -> bool {
        let probe = || -> StorageResult<bool> {
            let key = entity.composite_key()?;
            for location in self.locations(entity.namespace(), &[])? {
                if self.read(&location, &key)?.is_some() {
                    return Ok(true);
                }
            }
            Ok(false)
        };

        probe().unwrap_or_else(|e| {
            tracing::debug!(error = %e, "existence check failed, treating as absent");
            false
        })
    }

    /// Fills the entity's value from the first location that holds one.
    ///
    /// # Errors
    ///
    /// - [`StorageError::NotFound`] if no location holds a value.
    /// - [`StorageError::Corrupt`] if the stored bytes fail to decode.
    /// - Any error from key encoding, routing or the ledger.
    #[tracing::instrument(skip_all, fields(namespace = entity.namespace()))]
    pub fn load(&self, entity: &mut dyn Entity) -> StorageResult<()> {
        let key = entity.composite_key()?;
        for location in self.locations(entity.namespace(), &[])? {
            if let Some(bytes) = self.read(&location, &key)? {
                tracing::debug!(%location, "loaded entity");
                return entity.fill_from_ledger_value(&bytes).map_err(|e| match e {
                    StorageError::Corrupt { .. } => e,
                    other => StorageError::corrupt_with_source("cannot decode stored value", other),
                });
            }
        }
        Err(StorageError::not_found(key.replace('\u{0}', "\\0")))
    }

    /// Writes the entity's whole value.
    ///
    /// The value goes to the first resolved location. When `participants`
    /// is non-empty, a policy requiring endorsement by exactly those
    /// organizations (holding `role`) is attached to the key at the same
    /// location; otherwise the key's policy is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Persist`] if encoding or a ledger write fails,
    /// or any error from key encoding and routing.
    #[tracing::instrument(
        skip_all,
        fields(namespace = entity.namespace(), participants = participants.len())
    )]
    pub fn upsert(
        &self,
        entity: &dyn Entity,
        participants: &[String],
        role: RoleType,
    ) -> StorageResult<()> {
        let key = entity.composite_key()?;
        let value = entity.to_ledger_value()?;
        let location = self
            .locations(entity.namespace(), participants)?
            .into_iter()
            .next()
            .unwrap_or(StorageLocation::Shared);

        match &location {
            StorageLocation::Shared => self.stub.put_state(&key, value)?,
            StorageLocation::Private(collection) => {
                self.stub.put_private_data(collection, &key, value)?;
            },
        }

        if !participants.is_empty() {
            let mut policy = EndorsementPolicy::new(role);
            policy.add_orgs(participants.iter().cloned())?;
            let policy = policy.to_bytes()?;
            match &location {
                StorageLocation::Shared => self.stub.set_state_validation_parameter(&key, policy)?,
                StorageLocation::Private(collection) => {
                    self.stub.set_private_data_validation_parameter(collection, &key, policy)?;
                },
            }
        }

        tracing::debug!(%location, "upserted entity");
        Ok(())
    }

    /// Runs [`query`](query::query) at every location the router resolves
    /// for `namespace`, concatenating the results in location order.
    ///
    /// # Errors
    ///
    /// Any routing error, or the first error from [`query::query`].
    pub fn query<E, F, P>(
        &self,
        namespace: &str,
        partial_key: &[String],
        factory: F,
        predicate: P,
    ) -> StorageResult<Vec<E>>
    where
        E: Entity,
        F: Fn() -> E,
        P: Fn(&E) -> bool,
    {
        let mut entries = Vec::new();
        for location in self.locations(namespace, &[])? {
            entries.extend(query::query(
                self.stub,
                &location,
                namespace,
                partial_key,
                &factory,
                &predicate,
            )?);
        }
        Ok(entries)
    }
}
