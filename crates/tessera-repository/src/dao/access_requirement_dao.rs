//! AccessRequirementDao trait.

use async_trait::async_trait;
use tessera_core::{
    AccessRequirement, AccessRequirementId, AccessRequirementStats, AccessType, Interface, Page,
    PageRequest, PrincipalId, RestrictableObjectDescriptor, RestrictableObjectType, TesseraResult,
};

/// Access to access requirements and the subjects they restrict.
///
/// The type-specific part of a requirement is stored as a serialized blob;
/// its concrete type is kept in its own column.
#[async_trait]
pub trait AccessRequirementDao: Interface + Send + Sync {
    /// Inserts a requirement with its subjects, duplicates removed.
    async fn create(&self, requirement: &AccessRequirement) -> TesseraResult<AccessRequirement>;

    async fn get(&self, id: AccessRequirementId) -> TesseraResult<AccessRequirement>;

    async fn get_subjects(
        &self,
        id: AccessRequirementId,
    ) -> TesseraResult<Vec<RestrictableObjectDescriptor>>;

    async fn get_count(&self) -> TesseraResult<u64>;

    async fn get_concrete_type(&self, id: AccessRequirementId) -> TesseraResult<String>;

    /// Requirements restricting any of the subjects, ordered by id.
    async fn get_all_for_subject(
        &self,
        subject_ids: &[i64],
        subject_type: RestrictableObjectType,
    ) -> TesseraResult<Vec<AccessRequirement>>;

    async fn get_for_subject(
        &self,
        subject_id: i64,
        subject_type: RestrictableObjectType,
        page: PageRequest,
    ) -> TesseraResult<Page<AccessRequirement>>;

    /// Updates the requirement and replaces its subjects if the etag matches.
    async fn update(&self, requirement: &AccessRequirement) -> TesseraResult<AccessRequirement>;

    /// Fails with an integrity violation while approvals reference it.
    async fn delete(&self, id: AccessRequirementId) -> TesseraResult<()>;

    /// Requirements on the subjects guarding one of `access_types` that none
    /// of `principal_ids` holds a current approval for.
    async fn get_all_unmet(
        &self,
        subject_ids: &[i64],
        subject_type: RestrictableObjectType,
        principal_ids: &[PrincipalId],
        access_types: &[AccessType],
    ) -> TesseraResult<Vec<AccessRequirementId>>;

    async fn get_stats(
        &self,
        subject_ids: &[i64],
        subject_type: RestrictableObjectType,
    ) -> TesseraResult<AccessRequirementStats>;
}
