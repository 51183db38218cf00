//! SQLite implementation of PrincipalAliasDao.

use super::record_change;
use crate::dao::PrincipalAliasDao;
use crate::DatabasePoolInterface;
use async_trait::async_trait;
use shaku::Component;
use sqlx::FromRow;
use std::sync::Arc;
use tessera_core::{
    AliasId, AliasType, ChangeType, Etag, ObjectType, PrincipalAlias, PrincipalId, TesseraError,
    TesseraResult,
};
use tracing::debug;

/// SQLite-backed principal aliases.
#[derive(Component, Clone)]
#[shaku(interface = PrincipalAliasDao)]
pub struct SqlitePrincipalAliasDaoImpl {
    #[shaku(inject)]
    pool: Arc<dyn DatabasePoolInterface>,
}

impl SqlitePrincipalAliasDaoImpl {
    #[must_use]
    pub fn new(pool: Arc<dyn DatabasePoolInterface>) -> Self {
        Self { pool }
    }
}

impl std::fmt::Debug for SqlitePrincipalAliasDaoImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlitePrincipalAliasDaoImpl").finish()
    }
}

#[derive(Debug, FromRow)]
struct AliasRow {
    id: AliasId,
    principal_id: PrincipalId,
    alias_display: String,
    alias_type: String,
    etag: Etag,
}

impl TryFrom<AliasRow> for PrincipalAlias {
    type Error = TesseraError;

    fn try_from(row: AliasRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Some(row.id),
            principal_id: row.principal_id,
            alias: row.alias_display,
            alias_type: row.alias_type.parse()?,
            etag: Some(row.etag),
        })
    }
}

const SELECT_ALIAS: &str =
    "SELECT id, principal_id, alias_display, alias_type, etag FROM principal_aliases";

#[async_trait]
impl PrincipalAliasDao for SqlitePrincipalAliasDaoImpl {
    async fn bind_alias(&self, alias: &PrincipalAlias) -> TesseraResult<PrincipalAlias> {
        debug!(
            "Binding {} '{}' to principal {}",
            alias.alias_type, alias.alias, alias.principal_id
        );

        alias.alias_type.validate_alias(&alias.alias)?;
        let unique = AliasType::normalize(&alias.alias);
        let display = alias.alias.trim();

        let mut tx = self.pool.begin_write().await?;

        let existing =
            sqlx::query_as::<_, AliasRow>(&format!("{SELECT_ALIAS} WHERE alias_unique = ?"))
                .bind(&unique)
                .fetch_optional(&mut *tx)
                .await?;
        if let Some(row) = existing {
            let bound = PrincipalAlias::try_from(row)?;
            if bound.principal_id == alias.principal_id && bound.alias_type == alias.alias_type {
                return Ok(bound);
            }
            return Err(TesseraError::name_conflict(format!(
                "The alias '{display}' is already in use"
            )));
        }

        let etag = Etag::generate();
        let replaced = if alias.alias_type.one_per_principal() {
            sqlx::query(
                r#"
                UPDATE principal_aliases
                SET alias_unique = ?, alias_display = ?, etag = ?
                WHERE principal_id = ? AND alias_type = ?
                "#,
            )
            .bind(&unique)
            .bind(display)
            .bind(&etag)
            .bind(alias.principal_id)
            .bind(alias.alias_type.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected()
                > 0
        } else {
            false
        };

        if !replaced {
            sqlx::query(
                r#"
                INSERT INTO principal_aliases (principal_id, alias_unique, alias_display, alias_type, etag)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(alias.principal_id)
            .bind(&unique)
            .bind(display)
            .bind(alias.alias_type.as_str())
            .bind(&etag)
            .execute(&mut *tx)
            .await?;
        }

        let row = sqlx::query_as::<_, AliasRow>(&format!("{SELECT_ALIAS} WHERE alias_unique = ?"))
            .bind(&unique)
            .fetch_one(&mut *tx)
            .await?;

        record_change(
            &mut *tx,
            alias.principal_id.into_inner(),
            ObjectType::Principal,
            ChangeType::Update,
            None,
        )
        .await?;
        tx.commit().await?;

        PrincipalAlias::try_from(row)
    }

    async fn get_principal_alias(&self, alias_id: AliasId) -> TesseraResult<PrincipalAlias> {
        debug!("Finding alias by id: {}", alias_id);

        let row = sqlx::query_as::<_, AliasRow>(&format!("{SELECT_ALIAS} WHERE id = ?"))
            .bind(alias_id)
            .fetch_optional(self.pool.inner())
            .await?;

        row.map(PrincipalAlias::try_from)
            .transpose()?
            .ok_or_else(|| TesseraError::not_found("PrincipalAlias", alias_id))
    }

    async fn find_principal_with_alias(
        &self,
        alias: &str,
    ) -> TesseraResult<Option<PrincipalAlias>> {
        debug!("Finding principal by alias: {}", alias);

        let row = sqlx::query_as::<_, AliasRow>(&format!("{SELECT_ALIAS} WHERE alias_unique = ?"))
            .bind(AliasType::normalize(alias))
            .fetch_optional(self.pool.inner())
            .await?;

        row.map(PrincipalAlias::try_from).transpose()
    }

    async fn list_principal_aliases(
        &self,
        principal_id: PrincipalId,
        alias_type: Option<AliasType>,
    ) -> TesseraResult<Vec<PrincipalAlias>> {
        let type_filter = alias_type.map(|t| t.as_str());
        let rows = sqlx::query_as::<_, AliasRow>(&format!(
            "{SELECT_ALIAS} WHERE principal_id = ? AND (? IS NULL OR alias_type = ?) ORDER BY id"
        ))
        .bind(principal_id)
        .bind(type_filter)
        .bind(type_filter)
        .fetch_all(self.pool.inner())
        .await?;

        rows.into_iter().map(PrincipalAlias::try_from).collect()
    }

    async fn is_alias_available(&self, alias: &str) -> TesseraResult<bool> {
        let result: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM principal_aliases WHERE alias_unique = ?")
                .bind(AliasType::normalize(alias))
                .fetch_optional(self.pool.inner())
                .await?;

        Ok(result.is_none())
    }

    async fn remove_alias_from_principal(
        &self,
        principal_id: PrincipalId,
        alias_id: AliasId,
    ) -> TesseraResult<bool> {
        debug!("Removing alias {} from principal {}", alias_id, principal_id);

        let mut tx = self.pool.begin_write().await?;
        let result = sqlx::query("DELETE FROM principal_aliases WHERE principal_id = ? AND id = ?")
            .bind(principal_id)
            .bind(alias_id)
            .execute(&mut *tx)
            .await?;
        let removed = result.rows_affected() > 0;
        if removed {
            record_change(
                &mut *tx,
                principal_id.into_inner(),
                ObjectType::Principal,
                ChangeType::Update,
                None,
            )
            .await?;
        }
        tx.commit().await?;
        Ok(removed)
    }

    async fn remove_all_aliases_from_principal(
        &self,
        principal_id: PrincipalId,
    ) -> TesseraResult<u64> {
        debug!("Removing all aliases from principal {}", principal_id);

        let mut tx = self.pool.begin_write().await?;
        let removed = sqlx::query("DELETE FROM principal_aliases WHERE principal_id = ?")
            .bind(principal_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if removed > 0 {
            record_change(
                &mut *tx,
                principal_id.into_inner(),
                ObjectType::Principal,
                ChangeType::Update,
                None,
            )
            .await?;
        }
        tx.commit().await?;
        Ok(removed)
    }
}
