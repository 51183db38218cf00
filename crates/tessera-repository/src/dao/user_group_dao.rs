//! UserGroupDao trait: principals.

use async_trait::async_trait;
use tessera_core::{Etag, Interface, Page, PageRequest, PrincipalId, TesseraResult, UserGroup};

/// Access to individual and group principals.
#[async_trait]
pub trait UserGroupDao: Interface + Send + Sync {
    /// Inserts a principal. The id is assigned by the database unless supplied.
    async fn create(&self, group: &UserGroup) -> TesseraResult<PrincipalId>;

    async fn get(&self, id: PrincipalId) -> TesseraResult<UserGroup>;

    /// Principals of one kind, ordered by id.
    async fn get_all(
        &self,
        is_individual: bool,
        page: PageRequest,
    ) -> TesseraResult<Page<UserGroup>>;

    async fn get_all_principals(&self) -> TesseraResult<Vec<UserGroup>>;

    async fn does_principal_exist(&self, id: PrincipalId) -> TesseraResult<bool>;

    /// Locks the principal in its own transaction and returns its etag.
    async fn get_etag_for_update(&self, id: PrincipalId) -> TesseraResult<Etag>;

    /// Assigns a new etag.
    async fn touch(&self, id: PrincipalId) -> TesseraResult<Etag>;

    /// Deletes the principal with its memberships, aliases and team row.
    async fn delete(&self, id: PrincipalId) -> TesseraResult<bool>;

    async fn count(&self) -> TesseraResult<u64>;
}
