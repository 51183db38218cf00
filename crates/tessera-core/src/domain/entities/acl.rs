//! Access control lists.

use crate::{AccessType, AclId, Etag, PrincipalId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Permissions held by one principal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceAccess {
    pub principal_id: PrincipalId,
    pub access_types: BTreeSet<AccessType>,
}

/// The ACL of one owner object (a node, a team, an evaluation).
///
/// The owner type is passed separately to the DAO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlList {
    pub id: Option<AclId>,
    pub owner_id: i64,
    pub etag: Option<Etag>,
    pub creation_date: Option<DateTime<Utc>>,
    /// Kept sorted by principal.
    pub resource_access: Vec<ResourceAccess>,
}

impl AccessControlList {
    #[must_use]
    pub fn new(owner_id: impl Into<i64>) -> Self {
        Self {
            id: None,
            owner_id: owner_id.into(),
            etag: None,
            creation_date: None,
            resource_access: Vec::new(),
        }
    }

    /// Grants `access_types` to `principal_id`, merging with existing grants.
    #[must_use]
    pub fn grant(
        mut self,
        principal_id: PrincipalId,
        access_types: impl IntoIterator<Item = AccessType>,
    ) -> Self {
        match self
            .resource_access
            .binary_search_by_key(&principal_id, |ra| ra.principal_id)
        {
            Ok(index) => self.resource_access[index].access_types.extend(access_types),
            Err(index) => self.resource_access.insert(
                index,
                ResourceAccess {
                    principal_id,
                    access_types: access_types.into_iter().collect(),
                },
            ),
        }
        self
    }

    /// Permissions of one principal, if any.
    #[must_use]
    pub fn access_for(&self, principal_id: PrincipalId) -> Option<&BTreeSet<AccessType>> {
        self.resource_access
            .iter()
            .find(|ra| ra.principal_id == principal_id)
            .map(|ra| &ra.access_types)
    }
}
