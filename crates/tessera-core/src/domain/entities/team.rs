//! Team entity.

use crate::validation::rules;
use crate::{Etag, PrincipalId, TeamId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A team: a group principal with descriptive properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Team {
    /// Id of the backing group principal.
    pub id: TeamId,

    /// Display name.
    #[validate(
        custom(function = "rules::not_blank"),
        length(max = 256)
    )]
    pub name: String,

    #[validate(length(max = 4000))]
    pub description: Option<String>,

    /// File handle id of the team icon.
    pub icon: Option<String>,

    /// Whether users may join without an invitation.
    pub can_public_join: bool,

    pub etag: Option<Etag>,

    pub created_by: PrincipalId,
    pub created_on: Option<DateTime<Utc>>,
    pub modified_by: PrincipalId,
    pub modified_on: Option<DateTime<Utc>>,
}

impl Team {
    /// A new team backed by the group `id`.
    #[must_use]
    pub fn new(id: TeamId, name: impl Into<String>, created_by: PrincipalId) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            icon: None,
            can_public_join: false,
            etag: None,
            created_by,
            created_on: None,
            modified_by: created_by,
            modified_on: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A member of a team, with admin status derived from the team ACL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub team_id: TeamId,
    pub member_id: PrincipalId,
    pub is_individual: bool,
    pub is_admin: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValidateExt;

    #[test]
    fn test_team_requires_name() {
        let team = Team::new(TeamId::new(1), "   ", PrincipalId::new(2));
        assert!(team.validate_model().is_err());

        let team = Team::new(TeamId::new(1), "Curators", PrincipalId::new(2));
        assert!(team.validate_model().is_ok());
    }
}
