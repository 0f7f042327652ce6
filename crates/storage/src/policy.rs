//! Key-level endorsement policies.
//!
//! A policy names the organizations whose members (or peers) must endorse
//! any later write to a key. The serialized bytes are handed to the ledger
//! runtime as the key's validation parameter; enforcing them is the
//! runtime's job.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Role an endorsing identity must hold within its organization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleType {
    /// Any member identity of the organization.
    #[default]
    Member,
    /// A peer identity of the organization.
    Peer,
}

/// Endorsement policy attached to a single key.
///
/// Organizations are kept sorted and deduplicated so that the serialized
/// bytes are identical on every replica.
///
/// # Example
///
/// ```
/// use iot_ledger_storage::{EndorsementPolicy, RoleType};
///
/// let mut policy = EndorsementPolicy::new(RoleType::Peer);
/// policy.add_orgs(["Org2MSP", "Org1MSP"]).unwrap();
///
/// let orgs: Vec<&str> = policy.organizations().collect();
/// assert_eq!(orgs, ["Org1MSP", "Org2MSP"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndorsementPolicy {
    role: RoleType,
    organizations: BTreeSet<String>,
}

impl EndorsementPolicy {
    /// Creates a policy with no organizations.
    #[must_use]
    pub fn new(role: RoleType) -> Self {
        Self { role, organizations: BTreeSet::new() }
    }

    /// Adds organizations that must endorse writes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Persist`] if an organization name is empty.
    pub fn add_orgs<I, S>(&mut self, orgs: I) -> StorageResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for org in orgs {
            let org = org.into();
            if org.is_empty() {
                return Err(StorageError::persist("endorsement policy organization is empty"));
            }
            self.organizations.insert(org);
        }
        Ok(())
    }

    /// Returns the role endorsers must hold.
    #[must_use]
    pub fn role(&self) -> RoleType {
        self.role
    }

    /// Iterates over the organizations in sorted order.
    pub fn organizations(&self) -> impl Iterator<Item = &str> {
        self.organizations.iter().map(String::as_str)
    }

    /// Serializes the policy into validation-parameter bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Persist`] if serialization fails.
    pub fn to_bytes(&self) -> StorageResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| StorageError::persist_with_source("cannot encode endorsement policy", e))
    }

    /// Parses validation-parameter bytes produced by [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupt`] if the bytes are not a policy.
    pub fn from_bytes(bytes: &[u8]) -> StorageResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| StorageError::corrupt_with_source("cannot decode endorsement policy", e))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_are_order_independent() {
        let mut a = EndorsementPolicy::new(RoleType::Member);
        a.add_orgs(["Org2MSP", "Org1MSP", "Org2MSP"]).unwrap();
        let mut b = EndorsementPolicy::new(RoleType::Member);
        b.add_orgs(["Org1MSP", "Org2MSP"]).unwrap();

        assert_eq!(a.to_bytes().unwrap(), b.to_bytes().unwrap());
    }

    #[test]
    fn test_from_bytes_restores_policy() {
        let mut policy = EndorsementPolicy::new(RoleType::Peer);
        policy.add_orgs(["Org1MSP"]).unwrap();

        let restored = EndorsementPolicy::from_bytes(&policy.to_bytes().unwrap()).unwrap();
        assert_eq!(restored.role(), RoleType::Peer);
        assert_eq!(restored.organizations().collect::<Vec<_>>(), ["Org1MSP"]);
    }

    #[test]
    fn test_empty_org_rejected() {
        let mut policy = EndorsementPolicy::new(RoleType::Member);
        let err = policy.add_orgs(["Org1MSP", ""]).unwrap_err();
        assert!(matches!(err, StorageError::Persist { .. }));
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        let err = EndorsementPolicy::from_bytes(b"not a policy").unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }
}
