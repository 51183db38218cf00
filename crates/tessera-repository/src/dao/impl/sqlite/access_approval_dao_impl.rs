//! SQLite implementation of AccessApprovalDao.

use super::record_change;
use super::support::{push_in_list, to_count};
use crate::dao::AccessApprovalDao;
use crate::locking::{check_etag, lock_for_update, required_etag, write_new_etag, LockTarget};
use crate::DatabasePoolInterface;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shaku::Component;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::sync::Arc;
use tessera_core::{
    AccessApproval, AccessApprovalId, AccessRequirementId, ApprovalState, ChangeType, Etag,
    ObjectType, Page, PageRequest, PrincipalId, TesseraError, TesseraResult,
};
use tracing::debug;

/// SQLite-backed access approvals.
#[derive(Component, Clone)]
#[shaku(interface = AccessApprovalDao)]
pub struct SqliteAccessApprovalDaoImpl {
    #[shaku(inject)]
    pool: Arc<dyn DatabasePoolInterface>,
}

impl SqliteAccessApprovalDaoImpl {
    #[must_use]
    pub fn new(pool: Arc<dyn DatabasePoolInterface>) -> Self {
        Self { pool }
    }
}

impl std::fmt::Debug for SqliteAccessApprovalDaoImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteAccessApprovalDaoImpl").finish()
    }
}

const APPROVAL_COLUMNS: &str = r#"
    id, etag, requirement_id, accessor_id, created_by, created_on, modified_by, modified_on,
    expired_on, state
"#;

#[derive(Debug, FromRow)]
struct ApprovalRow {
    id: AccessApprovalId,
    etag: Etag,
    requirement_id: AccessRequirementId,
    accessor_id: PrincipalId,
    created_by: PrincipalId,
    created_on: DateTime<Utc>,
    modified_by: PrincipalId,
    modified_on: DateTime<Utc>,
    expired_on: Option<DateTime<Utc>>,
    state: String,
}

impl TryFrom<ApprovalRow> for AccessApproval {
    type Error = TesseraError;

    fn try_from(row: ApprovalRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Some(row.id),
            etag: Some(row.etag),
            requirement_id: row.requirement_id,
            accessor_id: row.accessor_id,
            created_by: row.created_by,
            created_on: Some(row.created_on),
            modified_by: row.modified_by,
            modified_on: Some(row.modified_on),
            expired_on: row.expired_on,
            state: row.state.parse()?,
        })
    }
}

async fn fetch_approval(
    conn: &mut SqliteConnection,
    id: AccessApprovalId,
) -> TesseraResult<AccessApproval> {
    let row = sqlx::query_as::<_, ApprovalRow>(&format!(
        "SELECT {APPROVAL_COLUMNS} FROM access_approvals WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(AccessApproval::try_from)
        .transpose()?
        .ok_or_else(|| TesseraError::not_found("AccessApproval", id))
}

#[async_trait]
impl AccessApprovalDao for SqliteAccessApprovalDaoImpl {
    async fn create(&self, approval: &AccessApproval) -> TesseraResult<AccessApproval> {
        debug!(
            "Creating approval of requirement {} for {}",
            approval.requirement_id, approval.accessor_id
        );

        let mut tx = self.pool.begin_write().await?;
        let now = Utc::now();
        let etag = Etag::generate();
        let id = sqlx::query(
            r#"
            INSERT INTO access_approvals (etag, requirement_id, accessor_id, created_by, created_on,
                                          modified_by, modified_on, expired_on, state)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&etag)
        .bind(approval.requirement_id)
        .bind(approval.accessor_id)
        .bind(approval.created_by)
        .bind(approval.created_on.unwrap_or(now))
        .bind(approval.modified_by)
        .bind(approval.modified_on.unwrap_or(now))
        .bind(approval.expired_on)
        .bind(approval.state.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| match TesseraError::from(e) {
            TesseraError::NameConflict(_) => TesseraError::name_conflict(format!(
                "Principal {} already has an approval for requirement {}",
                approval.accessor_id, approval.requirement_id
            )),
            other => other,
        })?
        .last_insert_rowid();
        let id = AccessApprovalId::new(id);

        record_change(
            &mut *tx,
            id.into_inner(),
            ObjectType::AccessApproval,
            ChangeType::Create,
            Some(&etag),
        )
        .await?;
        let created = fetch_approval(&mut *tx, id).await?;
        tx.commit().await?;

        debug!("Created approval {}", id);
        Ok(created)
    }

    async fn get(&self, id: AccessApprovalId) -> TesseraResult<AccessApproval> {
        debug!("Finding approval by id: {}", id);

        let mut conn = self.pool.inner().acquire().await?;
        fetch_approval(&mut *conn, id).await
    }

    async fn update(&self, approval: &AccessApproval) -> TesseraResult<AccessApproval> {
        let id = approval
            .id
            .ok_or_else(|| TesseraError::invalid_model("Access approval id is required"))?;
        debug!("Updating approval {}", id);
        let supplied = required_etag(approval.etag.as_ref(), LockTarget::AccessApproval)?;

        let mut tx = self.pool.begin_write().await?;
        let current = lock_for_update(&mut *tx, LockTarget::AccessApproval, id.into_inner()).await?;
        check_etag(LockTarget::AccessApproval, id, &current, supplied)?;

        sqlx::query(
            r#"
            UPDATE access_approvals
            SET modified_by = ?, modified_on = ?, expired_on = ?, state = ?
            WHERE id = ?
            "#,
        )
        .bind(approval.modified_by)
        .bind(Utc::now())
        .bind(approval.expired_on)
        .bind(approval.state.as_str())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let etag = write_new_etag(&mut *tx, LockTarget::AccessApproval, id.into_inner()).await?;
        record_change(
            &mut *tx,
            id.into_inner(),
            ObjectType::AccessApproval,
            ChangeType::Update,
            Some(&etag),
        )
        .await?;
        let updated = fetch_approval(&mut *tx, id).await?;
        tx.commit().await?;

        Ok(updated)
    }

    async fn delete(&self, id: AccessApprovalId) -> TesseraResult<bool> {
        debug!("Deleting approval {}", id);

        let mut tx = self.pool.begin_write().await?;
        let result = sqlx::query("DELETE FROM access_approvals WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = result.rows_affected() > 0;
        if deleted {
            record_change(
                &mut *tx,
                id.into_inner(),
                ObjectType::AccessApproval,
                ChangeType::Delete,
                None,
            )
            .await?;
        }
        tx.commit().await?;
        Ok(deleted)
    }

    async fn get_for_requirements_and_principals(
        &self,
        requirement_ids: &[AccessRequirementId],
        principal_ids: &[PrincipalId],
    ) -> TesseraResult<Vec<AccessApproval>> {
        if requirement_ids.is_empty() || principal_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {APPROVAL_COLUMNS} FROM access_approvals WHERE requirement_id IN "
        ));
        push_in_list(&mut builder, requirement_ids.iter().copied());
        builder.push(" AND accessor_id IN ");
        push_in_list(&mut builder, principal_ids.iter().copied());
        builder.push(" ORDER BY id");

        let rows = builder
            .build_query_as::<ApprovalRow>()
            .fetch_all(self.pool.inner())
            .await?;
        rows.into_iter().map(AccessApproval::try_from).collect()
    }

    async fn get_for_accessor(
        &self,
        accessor_id: PrincipalId,
        page: PageRequest,
    ) -> TesseraResult<Page<AccessApproval>> {
        debug!(
            "Finding approvals of {}, page: {}, size: {}",
            accessor_id, page.page, page.size
        );

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM access_approvals WHERE accessor_id = ?")
                .bind(accessor_id)
                .fetch_one(self.pool.inner())
                .await?;

        let rows = sqlx::query_as::<_, ApprovalRow>(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM access_approvals WHERE accessor_id = ? ORDER BY id LIMIT ? OFFSET ?"
        ))
        .bind(accessor_id)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool.inner())
        .await?;

        let approvals = rows
            .into_iter()
            .map(AccessApproval::try_from)
            .collect::<TesseraResult<Vec<_>>>()?;
        Ok(Page::new(approvals, page, to_count(total)))
    }

    async fn has_approval(
        &self,
        requirement_id: AccessRequirementId,
        accessor_id: PrincipalId,
    ) -> TesseraResult<bool> {
        let row = sqlx::query_as::<_, ApprovalRow>(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM access_approvals WHERE requirement_id = ? AND accessor_id = ?"
        ))
        .bind(requirement_id)
        .bind(accessor_id)
        .fetch_optional(self.pool.inner())
        .await?;

        match row {
            Some(row) => Ok(AccessApproval::try_from(row)?.is_current(Utc::now())),
            None => Ok(false),
        }
    }

    async fn revoke(
        &self,
        requirement_id: AccessRequirementId,
        accessor_id: PrincipalId,
        revoked_by: PrincipalId,
    ) -> TesseraResult<bool> {
        debug!(
            "Revoking approval of requirement {} for {}",
            requirement_id, accessor_id
        );

        let mut tx = self.pool.begin_write().await?;
        let found: Option<(AccessApprovalId, String)> = sqlx::query_as(
            "SELECT id, state FROM access_approvals WHERE requirement_id = ? AND accessor_id = ?",
        )
        .bind(requirement_id)
        .bind(accessor_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((id, state)) = found else {
            return Ok(false);
        };
        if state.parse::<ApprovalState>()? != ApprovalState::Approved {
            return Ok(false);
        }

        lock_for_update(&mut *tx, LockTarget::AccessApproval, id.into_inner()).await?;
        sqlx::query("UPDATE access_approvals SET state = ?, modified_by = ?, modified_on = ? WHERE id = ?")
            .bind(ApprovalState::Revoked.as_str())
            .bind(revoked_by)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let etag = write_new_etag(&mut *tx, LockTarget::AccessApproval, id.into_inner()).await?;
        record_change(
            &mut *tx,
            id.into_inner(),
            ObjectType::AccessApproval,
            ChangeType::Update,
            Some(&etag),
        )
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn get_count(&self) -> TesseraResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM access_approvals")
            .fetch_one(self.pool.inner())
            .await?;
        Ok(to_count(total))
    }
}
