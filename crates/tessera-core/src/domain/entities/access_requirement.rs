//! Access requirements and approvals.

use crate::{
    AccessApprovalId, AccessRequirementId, AccessType, ApprovalState, Etag, NodeId, PrincipalId,
    RestrictableObjectType, TeamId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use validator::Validate;

/// An object restricted by an access requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RestrictableObjectDescriptor {
    pub id: i64,
    pub object_type: RestrictableObjectType,
}

impl RestrictableObjectDescriptor {
    #[must_use]
    pub const fn entity(id: NodeId) -> Self {
        Self {
            id: id.0,
            object_type: RestrictableObjectType::Entity,
        }
    }

    #[must_use]
    pub const fn team(id: TeamId) -> Self {
        Self {
            id: id.0,
            object_type: RestrictableObjectType::Team,
        }
    }
}

/// Type-specific payload of a requirement, persisted as a serialized blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "concreteType")]
pub enum AccessRequirementDetails {
    /// Click-through terms the accessor must accept.
    #[serde(rename = "TermsOfUseAccessRequirement")]
    TermsOfUse {
        terms_of_use: Option<String>,
        file_handle_id: Option<String>,
    },
    /// Reviewed by the access and compliance team through submissions.
    #[serde(rename = "ManagedACTAccessRequirement")]
    Managed {
        is_certified_user_required: bool,
        is_validated_profile_required: bool,
        expiration_period_days: Option<i64>,
    },
    /// Approved out of band by the access and compliance team.
    #[serde(rename = "ACTAccessRequirement")]
    Act {
        act_contact_info: Option<String>,
        open_jira_issue: bool,
    },
    /// Placed on a subject while an issue is investigated.
    #[serde(rename = "LockAccessRequirement")]
    Lock { jira_key: String },
}

impl AccessRequirementDetails {
    pub const TERMS_OF_USE: &'static str = "TermsOfUseAccessRequirement";
    pub const MANAGED_ACT: &'static str = "ManagedACTAccessRequirement";
    pub const ACT: &'static str = "ACTAccessRequirement";
    pub const LOCK: &'static str = "LockAccessRequirement";

    /// Name stored in the `concrete_type` column.
    #[must_use]
    pub const fn concrete_type(&self) -> &'static str {
        match self {
            Self::TermsOfUse { .. } => Self::TERMS_OF_USE,
            Self::Managed { .. } => Self::MANAGED_ACT,
            Self::Act { .. } => Self::ACT,
            Self::Lock { .. } => Self::LOCK,
        }
    }
}

/// A condition an accessor must satisfy before accessing its subjects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AccessRequirement {
    pub id: Option<AccessRequirementId>,
    pub etag: Option<Etag>,
    pub created_by: PrincipalId,
    pub created_on: Option<DateTime<Utc>>,
    pub modified_by: PrincipalId,
    pub modified_on: Option<DateTime<Utc>>,
    /// Access the requirement guards, usually `DOWNLOAD` or `PARTICIPATE`.
    pub access_type: AccessType,
    #[validate(length(max = 50))]
    pub description: Option<String>,
    pub subjects: Vec<RestrictableObjectDescriptor>,
    pub details: AccessRequirementDetails,
}

impl AccessRequirement {
    #[must_use]
    pub const fn new(
        created_by: PrincipalId,
        access_type: AccessType,
        details: AccessRequirementDetails,
    ) -> Self {
        Self {
            id: None,
            etag: None,
            created_by,
            created_on: None,
            modified_by: created_by,
            modified_on: None,
            access_type,
            description: None,
            subjects: Vec::new(),
            details,
        }
    }

    #[must_use]
    pub fn with_subject(mut self, subject: RestrictableObjectDescriptor) -> Self {
        self.subjects.push(subject);
        self
    }

    #[must_use]
    pub fn concrete_type(&self) -> &'static str {
        self.details.concrete_type()
    }
}

/// Summary of the requirements placed on a set of subjects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequirementStats {
    pub requirement_ids: BTreeSet<AccessRequirementId>,
    pub has_terms_of_use: bool,
    pub has_act: bool,
    pub has_lock: bool,
}

/// Record that an accessor satisfied a requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessApproval {
    pub id: Option<AccessApprovalId>,
    pub etag: Option<Etag>,
    pub requirement_id: AccessRequirementId,
    pub accessor_id: PrincipalId,
    pub created_by: PrincipalId,
    pub created_on: Option<DateTime<Utc>>,
    pub modified_by: PrincipalId,
    pub modified_on: Option<DateTime<Utc>>,
    pub expired_on: Option<DateTime<Utc>>,
    pub state: ApprovalState,
}

impl AccessApproval {
    #[must_use]
    pub const fn new(
        requirement_id: AccessRequirementId,
        accessor_id: PrincipalId,
        created_by: PrincipalId,
    ) -> Self {
        Self {
            id: None,
            etag: None,
            requirement_id,
            accessor_id,
            created_by,
            created_on: None,
            modified_by: created_by,
            modified_on: None,
            expired_on: None,
            state: ApprovalState::Approved,
        }
    }

    /// Approved and not expired at `now`.
    #[must_use]
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.state == ApprovalState::Approved && self.expired_on.map_or(true, |at| at > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_details_blob_carries_concrete_type() {
        let details = AccessRequirementDetails::Lock {
            jira_key: "PLFM-1".to_string(),
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["concreteType"], "LockAccessRequirement");
        assert_eq!(json["concreteType"], details.concrete_type());

        let back: AccessRequirementDetails = serde_json::from_value(json).unwrap();
        assert_eq!(back, details);
    }

    #[test]
    fn test_approval_is_current() {
        let now = Utc::now();
        let mut approval = AccessApproval::new(
            AccessRequirementId::new(1),
            PrincipalId::new(2),
            PrincipalId::new(3),
        );
        assert!(approval.is_current(now));

        approval.expired_on = Some(now - Duration::days(1));
        assert!(!approval.is_current(now));

        approval.expired_on = None;
        approval.state = ApprovalState::Revoked;
        assert!(!approval.is_current(now));
    }
}
