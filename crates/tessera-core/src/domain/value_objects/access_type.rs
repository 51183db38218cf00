//! Permission and approval kinds.

text_enum!(
    /// Permission granted by a resource access entry of an ACL.
    AccessType {
        Create => "CREATE",
        Read => "READ",
        Update => "UPDATE",
        Delete => "DELETE",
        ChangePermissions => "CHANGE_PERMISSIONS",
        ChangeSettings => "CHANGE_SETTINGS",
        Download => "DOWNLOAD",
        Upload => "UPLOAD",
        Participate => "PARTICIPATE",
        Submit => "SUBMIT",
        ReadPrivateSubmission => "READ_PRIVATE_SUBMISSION",
        /// Team administrators hold this on the team's ACL.
        TeamMembershipUpdate => "TEAM_MEMBERSHIP_UPDATE",
        SendMessage => "SEND_MESSAGE",
        Moderate => "MODERATE",
    }
);

text_enum!(
    /// Lifecycle of an access approval.
    ApprovalState {
        Approved => "APPROVED",
        Revoked => "REVOKED",
    }
);

impl Default for ApprovalState {
    fn default() -> Self {
        Self::Approved
    }
}
