//! Principals: individual users and groups, and the aliases bound to them.

use crate::{AliasId, AliasType, Etag, PrincipalId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A principal row. Individuals are users; everything else is a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroup {
    /// Assigned by the database when absent on create.
    pub id: Option<PrincipalId>,
    pub is_individual: bool,
    /// Defaults to the time of insertion.
    pub creation_date: Option<DateTime<Utc>>,
    pub etag: Option<Etag>,
}

impl UserGroup {
    /// A new individual (user) principal.
    #[must_use]
    pub const fn individual() -> Self {
        Self {
            id: None,
            is_individual: true,
            creation_date: None,
            etag: None,
        }
    }

    /// A new group principal.
    #[must_use]
    pub const fn group() -> Self {
        Self {
            id: None,
            is_individual: false,
            creation_date: None,
            etag: None,
        }
    }

    /// Requests a specific id.
    #[must_use]
    pub const fn with_id(mut self, id: PrincipalId) -> Self {
        self.id = Some(id);
        self
    }
}

/// A unique name (user name, email, team name) bound to a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalAlias {
    pub id: Option<AliasId>,
    pub principal_id: PrincipalId,
    /// Display form; uniqueness ignores case.
    pub alias: String,
    pub alias_type: AliasType,
    pub etag: Option<Etag>,
}

impl PrincipalAlias {
    #[must_use]
    pub fn new(principal_id: PrincipalId, alias: impl Into<String>, alias_type: AliasType) -> Self {
        Self {
            id: None,
            principal_id,
            alias: alias.into(),
            alias_type,
            etag: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert!(UserGroup::individual().is_individual);
        assert!(!UserGroup::group().is_individual);
        let group = UserGroup::group().with_id(PrincipalId::new(9));
        assert_eq!(group.id, Some(PrincipalId::new(9)));
    }
}
