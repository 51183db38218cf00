//! TeamDao trait: teams and their members.

use async_trait::async_trait;
use tessera_core::{
    Interface, Page, PageRequest, PrincipalId, Team, TeamId, TeamMember, TesseraResult,
};

/// Access to teams.
///
/// A team's descriptive fields are stored as one serialized blob next to
/// its id and etag.
#[async_trait]
pub trait TeamDao: Interface + Send + Sync {
    /// Inserts a team for an existing group principal.
    async fn create(&self, team: &Team) -> TesseraResult<Team>;

    async fn get(&self, id: TeamId) -> TesseraResult<Team>;

    async fn get_in_range(&self, page: PageRequest) -> TesseraResult<Page<Team>>;

    /// Teams the principal is a direct member of.
    async fn get_for_member_in_range(
        &self,
        principal_id: PrincipalId,
        page: PageRequest,
    ) -> TesseraResult<Page<Team>>;

    async fn get_count(&self) -> TesseraResult<u64>;

    async fn get_count_for_member(&self, principal_id: PrincipalId) -> TesseraResult<u64>;

    /// Members with their admin flag, ordered by member id.
    async fn get_members_in_range(
        &self,
        team_id: TeamId,
        page: PageRequest,
    ) -> TesseraResult<Page<TeamMember>>;

    /// Members holding `TEAM_MEMBERSHIP_UPDATE` on the team's ACL.
    async fn get_admin_member_ids(&self, team_id: TeamId) -> TesseraResult<Vec<PrincipalId>>;

    /// Updates the team if its etag matches.
    async fn update(&self, team: &Team) -> TesseraResult<Team>;

    async fn delete(&self, id: TeamId) -> TesseraResult<()>;
}
