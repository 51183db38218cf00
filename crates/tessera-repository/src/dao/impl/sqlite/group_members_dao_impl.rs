//! SQLite implementation of GroupMembersDao.

use super::record_change;
use super::support::to_count;
use super::user_group_dao_impl::UserGroupRow;
use crate::dao::GroupMembersDao;
use crate::locking::{lock_and_increment_etag, LockTarget};
use crate::DatabasePoolInterface;
use async_trait::async_trait;
use shaku::Component;
use std::sync::Arc;
use tessera_core::{ChangeType, ObjectType, PrincipalId, TesseraError, TesseraResult, UserGroup};
use tracing::debug;

/// SQLite-backed group membership.
#[derive(Component, Clone)]
#[shaku(interface = GroupMembersDao)]
pub struct SqliteGroupMembersDaoImpl {
    #[shaku(inject)]
    pool: Arc<dyn DatabasePoolInterface>,
}

impl SqliteGroupMembersDaoImpl {
    #[must_use]
    pub fn new(pool: Arc<dyn DatabasePoolInterface>) -> Self {
        Self { pool }
    }
}

impl std::fmt::Debug for SqliteGroupMembersDaoImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteGroupMembersDaoImpl").finish()
    }
}

#[async_trait]
impl GroupMembersDao for SqliteGroupMembersDaoImpl {
    async fn get_members(&self, group_id: PrincipalId) -> TesseraResult<Vec<UserGroup>> {
        debug!("Finding members of group {}", group_id);

        let rows = sqlx::query_as::<_, UserGroupRow>(
            r#"
            SELECT ug.id, ug.is_individual, ug.creation_date, ug.etag
            FROM user_groups ug
            JOIN group_members gm ON gm.member_id = ug.id
            WHERE gm.group_id = ?
            ORDER BY ug.id
            "#,
        )
        .bind(group_id)
        .fetch_all(self.pool.inner())
        .await?;

        Ok(rows.into_iter().map(UserGroup::from).collect())
    }

    async fn get_member_count(&self, group_id: PrincipalId) -> TesseraResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM group_members WHERE group_id = ?")
            .bind(group_id)
            .fetch_one(self.pool.inner())
            .await?;
        Ok(to_count(total))
    }

    async fn get_users_groups(&self, principal_id: PrincipalId) -> TesseraResult<Vec<UserGroup>> {
        debug!("Finding groups of principal {}", principal_id);

        let rows = sqlx::query_as::<_, UserGroupRow>(
            r#"
            SELECT ug.id, ug.is_individual, ug.creation_date, ug.etag
            FROM user_groups ug
            JOIN group_members gm ON gm.group_id = ug.id
            WHERE gm.member_id = ?
            ORDER BY ug.id
            "#,
        )
        .bind(principal_id)
        .fetch_all(self.pool.inner())
        .await?;

        Ok(rows.into_iter().map(UserGroup::from).collect())
    }

    async fn add_members(
        &self,
        group_id: PrincipalId,
        member_ids: &[PrincipalId],
    ) -> TesseraResult<()> {
        debug!("Adding {} members to group {}", member_ids.len(), group_id);

        if member_ids.contains(&group_id) {
            return Err(TesseraError::invalid_argument(format!(
                "Group {group_id} cannot be a member of itself"
            )));
        }
        if member_ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin_write().await?;
        let etag = lock_and_increment_etag(
            &mut *tx,
            LockTarget::UserGroup,
            group_id.into_inner(),
            None,
        )
        .await?;

        for member_id in member_ids {
            sqlx::query("INSERT OR IGNORE INTO group_members (group_id, member_id) VALUES (?, ?)")
                .bind(group_id)
                .bind(member_id)
                .execute(&mut *tx)
                .await?;
        }

        record_change(
            &mut *tx,
            group_id.into_inner(),
            ObjectType::Principal,
            ChangeType::Update,
            Some(&etag),
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn remove_members(
        &self,
        group_id: PrincipalId,
        member_ids: &[PrincipalId],
    ) -> TesseraResult<()> {
        debug!("Removing {} members from group {}", member_ids.len(), group_id);

        if member_ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin_write().await?;
        let etag = lock_and_increment_etag(
            &mut *tx,
            LockTarget::UserGroup,
            group_id.into_inner(),
            None,
        )
        .await?;

        for member_id in member_ids {
            sqlx::query("DELETE FROM group_members WHERE group_id = ? AND member_id = ?")
                .bind(group_id)
                .bind(member_id)
                .execute(&mut *tx)
                .await?;
        }

        record_change(
            &mut *tx,
            group_id.into_inner(),
            ObjectType::Principal,
            ChangeType::Update,
            Some(&etag),
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn is_member(
        &self,
        group_id: PrincipalId,
        principal_id: PrincipalId,
    ) -> TesseraResult<bool> {
        let result: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM group_members WHERE group_id = ? AND member_id = ?")
                .bind(group_id)
                .bind(principal_id)
                .fetch_optional(self.pool.inner())
                .await?;

        Ok(result.is_some())
    }
}
