//! GroupMembersDao trait: group membership.

use async_trait::async_trait;
use tessera_core::{Interface, PrincipalId, TesseraResult, UserGroup};

/// Membership of principals in groups.
///
/// Every membership change locks the group and gives it a new etag.
#[async_trait]
pub trait GroupMembersDao: Interface + Send + Sync {
    async fn get_members(&self, group_id: PrincipalId) -> TesseraResult<Vec<UserGroup>>;

    async fn get_member_count(&self, group_id: PrincipalId) -> TesseraResult<u64>;

    /// Groups the principal belongs to directly.
    async fn get_users_groups(&self, principal_id: PrincipalId) -> TesseraResult<Vec<UserGroup>>;

    /// Adds members; existing memberships are left as they are.
    async fn add_members(
        &self,
        group_id: PrincipalId,
        member_ids: &[PrincipalId],
    ) -> TesseraResult<()>;

    async fn remove_members(
        &self,
        group_id: PrincipalId,
        member_ids: &[PrincipalId],
    ) -> TesseraResult<()>;

    async fn is_member(
        &self,
        group_id: PrincipalId,
        principal_id: PrincipalId,
    ) -> TesseraResult<bool>;
}
