//! AccessControlListDao trait.

use async_trait::async_trait;
use std::collections::BTreeSet;
use tessera_core::{
    AccessControlList, AccessType, AclId, Interface, ObjectType, PrincipalId, TesseraResult,
};

/// Access to the ACLs of nodes, teams and other owner objects.
#[async_trait]
pub trait AccessControlListDao: Interface + Send + Sync {
    /// Inserts the ACL of one owner. An owner has at most one ACL.
    async fn create(&self, acl: &AccessControlList, owner_type: ObjectType) -> TesseraResult<AclId>;

    async fn get(&self, owner_id: i64, owner_type: ObjectType) -> TesseraResult<AccessControlList>;

    async fn get_by_id(&self, id: AclId) -> TesseraResult<AccessControlList>;

    async fn get_acl_id(&self, owner_id: i64, owner_type: ObjectType) -> TesseraResult<AclId>;

    /// Replaces the resource access of the ACL if the etag matches.
    async fn update(
        &self,
        acl: &AccessControlList,
        owner_type: ObjectType,
    ) -> TesseraResult<AccessControlList>;

    async fn delete(&self, owner_id: i64, owner_type: ObjectType) -> TesseraResult<bool>;

    /// Whether any of `groups` holds `access_type` on the owner.
    async fn can_access(
        &self,
        groups: &BTreeSet<PrincipalId>,
        owner_id: i64,
        owner_type: ObjectType,
        access_type: AccessType,
    ) -> TesseraResult<bool>;

    /// Owners of `owner_type` on which any of `groups` holds `access_type`.
    async fn get_accessible_owner_ids(
        &self,
        groups: &BTreeSet<PrincipalId>,
        owner_type: ObjectType,
        access_type: AccessType,
    ) -> TesseraResult<BTreeSet<i64>>;

    /// Principals holding `access_type` on the owner.
    async fn get_principal_ids(
        &self,
        owner_id: i64,
        owner_type: ObjectType,
        access_type: AccessType,
    ) -> TesseraResult<BTreeSet<PrincipalId>>;
}
