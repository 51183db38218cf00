//! AccessApprovalDao trait.

use async_trait::async_trait;
use tessera_core::{
    AccessApproval, AccessApprovalId, AccessRequirementId, Interface, Page, PageRequest,
    PrincipalId, TesseraResult,
};

/// Access to approvals of access requirements.
#[async_trait]
pub trait AccessApprovalDao: Interface + Send + Sync {
    /// Inserts an approval. One approval per requirement and accessor.
    async fn create(&self, approval: &AccessApproval) -> TesseraResult<AccessApproval>;

    async fn get(&self, id: AccessApprovalId) -> TesseraResult<AccessApproval>;

    /// Updates state, expiry and modifier if the etag matches.
    async fn update(&self, approval: &AccessApproval) -> TesseraResult<AccessApproval>;

    async fn delete(&self, id: AccessApprovalId) -> TesseraResult<bool>;

    async fn get_for_requirements_and_principals(
        &self,
        requirement_ids: &[AccessRequirementId],
        principal_ids: &[PrincipalId],
    ) -> TesseraResult<Vec<AccessApproval>>;

    async fn get_for_accessor(
        &self,
        accessor_id: PrincipalId,
        page: PageRequest,
    ) -> TesseraResult<Page<AccessApproval>>;

    /// Approved and not expired.
    async fn has_approval(
        &self,
        requirement_id: AccessRequirementId,
        accessor_id: PrincipalId,
    ) -> TesseraResult<bool>;

    /// Marks an approved approval revoked. Returns false when there is none to revoke.
    async fn revoke(
        &self,
        requirement_id: AccessRequirementId,
        accessor_id: PrincipalId,
        revoked_by: PrincipalId,
    ) -> TesseraResult<bool>;

    async fn get_count(&self) -> TesseraResult<u64>;
}
