//! SQLite implementation of UserGroupDao.

use super::record_change;
use super::support::to_count;
use crate::dao::UserGroupDao;
use crate::locking::{lock_and_increment_etag, lock_for_update, LockTarget};
use crate::DatabasePoolInterface;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shaku::Component;
use sqlx::FromRow;
use std::sync::Arc;
use tessera_core::{
    ChangeType, Etag, ObjectType, Page, PageRequest, PrincipalId, TesseraError, TesseraResult,
    UserGroup,
};
use tracing::debug;

/// SQLite-backed principals.
#[derive(Component, Clone)]
#[shaku(interface = UserGroupDao)]
pub struct SqliteUserGroupDaoImpl {
    #[shaku(inject)]
    pool: Arc<dyn DatabasePoolInterface>,
}

impl SqliteUserGroupDaoImpl {
    #[must_use]
    pub fn new(pool: Arc<dyn DatabasePoolInterface>) -> Self {
        Self { pool }
    }
}

impl std::fmt::Debug for SqliteUserGroupDaoImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteUserGroupDaoImpl").finish()
    }
}

/// Database row representation of a principal.
#[derive(Debug, FromRow)]
pub(crate) struct UserGroupRow {
    id: PrincipalId,
    is_individual: bool,
    creation_date: DateTime<Utc>,
    etag: Etag,
}

impl From<UserGroupRow> for UserGroup {
    fn from(row: UserGroupRow) -> Self {
        Self {
            id: Some(row.id),
            is_individual: row.is_individual,
            creation_date: Some(row.creation_date),
            etag: Some(row.etag),
        }
    }
}

#[async_trait]
impl UserGroupDao for SqliteUserGroupDaoImpl {
    async fn create(&self, group: &UserGroup) -> TesseraResult<PrincipalId> {
        debug!("Creating principal, individual: {}", group.is_individual);

        let mut tx = self.pool.begin_write().await?;

        if let Some(id) = group.id {
            let existing: Option<i64> = sqlx::query_scalar("SELECT 1 FROM user_groups WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
            if existing.is_some() {
                return Err(TesseraError::invalid_argument(format!(
                    "Principal {id} already exists"
                )));
            }
        }

        let etag = Etag::generate();
        let id = sqlx::query(
            "INSERT INTO user_groups (id, is_individual, creation_date, etag) VALUES (?, ?, ?, ?)",
        )
        .bind(group.id)
        .bind(group.is_individual)
        .bind(group.creation_date.unwrap_or_else(Utc::now))
        .bind(&etag)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        record_change(&mut *tx, id, ObjectType::Principal, ChangeType::Create, Some(&etag)).await?;
        tx.commit().await?;

        debug!("Created principal {}", id);
        Ok(PrincipalId::new(id))
    }

    async fn get(&self, id: PrincipalId) -> TesseraResult<UserGroup> {
        debug!("Finding principal by id: {}", id);

        let row = sqlx::query_as::<_, UserGroupRow>(
            "SELECT id, is_individual, creation_date, etag FROM user_groups WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool.inner())
        .await?;

        row.map(UserGroup::from)
            .ok_or_else(|| TesseraError::not_found("UserGroup", id))
    }

    async fn get_all(
        &self,
        is_individual: bool,
        page: PageRequest,
    ) -> TesseraResult<Page<UserGroup>> {
        debug!(
            "Finding principals, individual: {}, page: {}, size: {}",
            is_individual, page.page, page.size
        );

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user_groups WHERE is_individual = ?")
                .bind(is_individual)
                .fetch_one(self.pool.inner())
                .await?;

        let rows = sqlx::query_as::<_, UserGroupRow>(
            r#"
            SELECT id, is_individual, creation_date, etag
            FROM user_groups
            WHERE is_individual = ?
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(is_individual)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool.inner())
        .await?;

        let groups = rows.into_iter().map(UserGroup::from).collect();
        Ok(Page::new(groups, page, to_count(total)))
    }

    async fn get_all_principals(&self) -> TesseraResult<Vec<UserGroup>> {
        let rows = sqlx::query_as::<_, UserGroupRow>(
            "SELECT id, is_individual, creation_date, etag FROM user_groups ORDER BY id",
        )
        .fetch_all(self.pool.inner())
        .await?;

        Ok(rows.into_iter().map(UserGroup::from).collect())
    }

    async fn does_principal_exist(&self, id: PrincipalId) -> TesseraResult<bool> {
        let result: Option<i64> = sqlx::query_scalar("SELECT 1 FROM user_groups WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool.inner())
            .await?;

        Ok(result.is_some())
    }

    async fn get_etag_for_update(&self, id: PrincipalId) -> TesseraResult<Etag> {
        let mut tx = self.pool.begin_write().await?;
        let etag = lock_for_update(&mut *tx, LockTarget::UserGroup, id.into_inner()).await?;
        tx.commit().await?;
        Ok(etag)
    }

    async fn touch(&self, id: PrincipalId) -> TesseraResult<Etag> {
        debug!("Touching principal {}", id);

        let mut tx = self.pool.begin_write().await?;
        let etag =
            lock_and_increment_etag(&mut *tx, LockTarget::UserGroup, id.into_inner(), None).await?;
        record_change(
            &mut *tx,
            id.into_inner(),
            ObjectType::Principal,
            ChangeType::Update,
            Some(&etag),
        )
        .await?;
        tx.commit().await?;
        Ok(etag)
    }

    async fn delete(&self, id: PrincipalId) -> TesseraResult<bool> {
        debug!("Deleting principal {}", id);

        let mut tx = self.pool.begin_write().await?;
        let result = sqlx::query("DELETE FROM user_groups WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = result.rows_affected() > 0;
        if deleted {
            record_change(
                &mut *tx,
                id.into_inner(),
                ObjectType::Principal,
                ChangeType::Delete,
                None,
            )
            .await?;
        }
        tx.commit().await?;
        Ok(deleted)
    }

    async fn count(&self) -> TesseraResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_groups")
            .fetch_one(self.pool.inner())
            .await?;
        Ok(to_count(total))
    }
}
