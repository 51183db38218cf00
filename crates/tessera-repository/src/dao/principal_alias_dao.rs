//! PrincipalAliasDao trait: unique names bound to principals.

use async_trait::async_trait;
use tessera_core::{AliasId, AliasType, Interface, PrincipalAlias, PrincipalId, TesseraResult};

/// Binding of user names, emails and team names to principals.
///
/// Aliases are unique regardless of case.
#[async_trait]
pub trait PrincipalAliasDao: Interface + Send + Sync {
    /// Binds an alias. Binding the same alias to the same principal again
    /// returns the existing binding; an alias held by another principal is a
    /// name conflict.
    async fn bind_alias(&self, alias: &PrincipalAlias) -> TesseraResult<PrincipalAlias>;

    async fn get_principal_alias(&self, alias_id: AliasId) -> TesseraResult<PrincipalAlias>;

    async fn find_principal_with_alias(&self, alias: &str) -> TesseraResult<Option<PrincipalAlias>>;

    async fn list_principal_aliases(
        &self,
        principal_id: PrincipalId,
        alias_type: Option<AliasType>,
    ) -> TesseraResult<Vec<PrincipalAlias>>;

    async fn is_alias_available(&self, alias: &str) -> TesseraResult<bool>;

    async fn remove_alias_from_principal(
        &self,
        principal_id: PrincipalId,
        alias_id: AliasId,
    ) -> TesseraResult<bool>;

    async fn remove_all_aliases_from_principal(
        &self,
        principal_id: PrincipalId,
    ) -> TesseraResult<u64>;
}
