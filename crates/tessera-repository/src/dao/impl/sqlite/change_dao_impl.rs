//! SQLite implementation of ChangeDao.

use super::support::to_count;
use crate::dao::ChangeDao;
use crate::DatabasePoolInterface;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shaku::Component;
use sqlx::{FromRow, SqliteConnection};
use std::sync::Arc;
use tessera_core::{ChangeMessage, ChangeType, Etag, ObjectType, TesseraError, TesseraResult};
use tracing::debug;

/// SQLite-backed change log.
#[derive(Component, Clone)]
#[shaku(interface = ChangeDao)]
pub struct SqliteChangeDaoImpl {
    #[shaku(inject)]
    pool: Arc<dyn DatabasePoolInterface>,
}

impl SqliteChangeDaoImpl {
    #[must_use]
    pub fn new(pool: Arc<dyn DatabasePoolInterface>) -> Self {
        Self { pool }
    }
}

impl std::fmt::Debug for SqliteChangeDaoImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteChangeDaoImpl").finish()
    }
}

#[derive(Debug, FromRow)]
struct ChangeRow {
    change_num: i64,
    object_id: i64,
    object_type: String,
    object_etag: Option<Etag>,
    change_type: String,
    time_stamp: DateTime<Utc>,
}

impl TryFrom<ChangeRow> for ChangeMessage {
    type Error = TesseraError;

    fn try_from(row: ChangeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            change_number: Some(row.change_num),
            object_id: row.object_id,
            object_type: row.object_type.parse()?,
            object_etag: row.object_etag,
            change_type: row.change_type.parse()?,
            timestamp: Some(row.time_stamp),
        })
    }
}

/// Replaces the change row of one object inside the caller's transaction.
///
/// The old row is deleted first so the object moves to the end of the log.
pub(crate) async fn record_change(
    conn: &mut SqliteConnection,
    object_id: i64,
    object_type: ObjectType,
    change_type: ChangeType,
    etag: Option<&Etag>,
) -> TesseraResult<ChangeMessage> {
    sqlx::query("DELETE FROM changes WHERE object_id = ? AND object_type = ?")
        .bind(object_id)
        .bind(object_type.as_str())
        .execute(&mut *conn)
        .await?;

    let now = Utc::now();
    let change_number = sqlx::query(
        r#"
        INSERT INTO changes (object_id, object_type, object_etag, change_type, time_stamp)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(object_id)
    .bind(object_type.as_str())
    .bind(etag)
    .bind(change_type.as_str())
    .bind(now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    debug!(
        "Recorded {} change {} for {} {}",
        change_type, change_number, object_type, object_id
    );

    Ok(ChangeMessage {
        change_number: Some(change_number),
        object_id,
        object_type,
        object_etag: etag.cloned(),
        change_type,
        timestamp: Some(now),
    })
}

#[async_trait]
impl ChangeDao for SqliteChangeDaoImpl {
    async fn replace_change(&self, change: ChangeMessage) -> TesseraResult<ChangeMessage> {
        let mut tx = self.pool.begin_write().await?;
        let recorded = record_change(
            &mut *tx,
            change.object_id,
            change.object_type,
            change.change_type,
            change.object_etag.as_ref(),
        )
        .await?;
        tx.commit().await?;
        Ok(recorded)
    }

    async fn replace_changes(
        &self,
        mut changes: Vec<ChangeMessage>,
    ) -> TesseraResult<Vec<ChangeMessage>> {
        debug!("Replacing {} changes", changes.len());
        changes.sort_by_key(|change| change.object_id);

        let mut tx = self.pool.begin_write().await?;
        let mut recorded = Vec::with_capacity(changes.len());
        for change in changes {
            recorded.push(
                record_change(
                    &mut *tx,
                    change.object_id,
                    change.object_type,
                    change.change_type,
                    change.object_etag.as_ref(),
                )
                .await?,
            );
        }
        tx.commit().await?;
        Ok(recorded)
    }

    async fn delete_change(&self, object_id: i64, object_type: ObjectType) -> TesseraResult<bool> {
        debug!("Deleting change for {} {}", object_type, object_id);

        let result = sqlx::query("DELETE FROM changes WHERE object_id = ? AND object_type = ?")
            .bind(object_id)
            .bind(object_type.as_str())
            .execute(self.pool.inner())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_current_change_number(&self) -> TesseraResult<i64> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(change_num) FROM changes")
            .fetch_one(self.pool.inner())
            .await?;
        Ok(max.unwrap_or(0))
    }

    async fn get_minimum_change_number(&self) -> TesseraResult<i64> {
        let min: Option<i64> = sqlx::query_scalar("SELECT MIN(change_num) FROM changes")
            .fetch_one(self.pool.inner())
            .await?;
        Ok(min.unwrap_or(0))
    }

    async fn get_count(&self) -> TesseraResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM changes")
            .fetch_one(self.pool.inner())
            .await?;
        Ok(to_count(total))
    }

    async fn list_changes(
        &self,
        greater_or_equal: i64,
        object_type: Option<ObjectType>,
        limit: i64,
    ) -> TesseraResult<Vec<ChangeMessage>> {
        debug!(
            "Listing changes from {}, type: {:?}, limit: {}",
            greater_or_equal, object_type, limit
        );
        if limit < 1 {
            return Err(TesseraError::invalid_argument("Limit must be at least 1"));
        }

        let type_filter = object_type.map(|t| t.as_str());
        let rows = sqlx::query_as::<_, ChangeRow>(
            r#"
            SELECT change_num, object_id, object_type, object_etag, change_type, time_stamp
            FROM changes
            WHERE change_num >= ? AND (? IS NULL OR object_type = ?)
            ORDER BY change_num
            LIMIT ?
            "#,
        )
        .bind(greater_or_equal)
        .bind(type_filter)
        .bind(type_filter)
        .bind(limit)
        .fetch_all(self.pool.inner())
        .await?;

        rows.into_iter().map(ChangeMessage::try_from).collect()
    }

    async fn delete_all_changes(&self) -> TesseraResult<u64> {
        let result = sqlx::query("DELETE FROM changes")
            .execute(self.pool.inner())
            .await?;
        Ok(result.rows_affected())
    }
}
