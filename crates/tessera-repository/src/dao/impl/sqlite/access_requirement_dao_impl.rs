//! SQLite implementation of AccessRequirementDao.

use super::record_change;
use super::support::{push_in_list, to_count};
use crate::dao::AccessRequirementDao;
use crate::locking::{check_etag, lock_for_update, required_etag, write_new_etag, LockTarget};
use crate::DatabasePoolInterface;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shaku::Component;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::BTreeSet;
use std::sync::Arc;
use tessera_core::{
    AccessRequirement, AccessRequirementDetails, AccessRequirementId, AccessRequirementStats,
    AccessType, ApprovalState, ChangeType, Etag, ObjectType, Page, PageRequest, PrincipalId,
    RestrictableObjectDescriptor, RestrictableObjectType, TesseraError, TesseraResult, ValidateExt,
};
use tracing::debug;

/// SQLite-backed access requirements.
#[derive(Component, Clone)]
#[shaku(interface = AccessRequirementDao)]
pub struct SqliteAccessRequirementDaoImpl {
    #[shaku(inject)]
    pool: Arc<dyn DatabasePoolInterface>,
}

impl SqliteAccessRequirementDaoImpl {
    #[must_use]
    pub fn new(pool: Arc<dyn DatabasePoolInterface>) -> Self {
        Self { pool }
    }
}

impl std::fmt::Debug for SqliteAccessRequirementDaoImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteAccessRequirementDaoImpl").finish()
    }
}

const REQUIREMENT_COLUMNS: &str = r#"
    ar.id, ar.etag, ar.created_by, ar.created_on, ar.modified_by, ar.modified_on,
    ar.access_type, ar.serialized
"#;

/// Serialized form of the fields without a column of their own.
#[derive(Debug, Serialize, Deserialize)]
struct RequirementBlob {
    description: Option<String>,
    details: AccessRequirementDetails,
}

#[derive(Debug, FromRow)]
struct RequirementRow {
    id: AccessRequirementId,
    etag: Etag,
    created_by: PrincipalId,
    created_on: DateTime<Utc>,
    modified_by: PrincipalId,
    modified_on: DateTime<Utc>,
    access_type: String,
    serialized: Vec<u8>,
}

impl RequirementRow {
    fn into_requirement(
        self,
        subjects: Vec<RestrictableObjectDescriptor>,
    ) -> TesseraResult<AccessRequirement> {
        let blob: RequirementBlob = serde_json::from_slice(&self.serialized)?;
        Ok(AccessRequirement {
            id: Some(self.id),
            etag: Some(self.etag),
            created_by: self.created_by,
            created_on: Some(self.created_on),
            modified_by: self.modified_by,
            modified_on: Some(self.modified_on),
            access_type: self.access_type.parse()?,
            description: blob.description,
            subjects,
            details: blob.details,
        })
    }
}

fn requirement_not_found(id: AccessRequirementId) -> TesseraError {
    TesseraError::not_found("AccessRequirement", id)
}

fn serialize(requirement: &AccessRequirement) -> TesseraResult<Vec<u8>> {
    Ok(serde_json::to_vec(&RequirementBlob {
        description: requirement.description.clone(),
        details: requirement.details.clone(),
    })?)
}

async fn load_subjects(
    conn: &mut SqliteConnection,
    id: AccessRequirementId,
) -> TesseraResult<Vec<RestrictableObjectDescriptor>> {
    let rows: Vec<(i64, String)> = sqlx::query_as(
        r#"
        SELECT subject_id, subject_type
        FROM subject_access_requirements
        WHERE requirement_id = ?
        ORDER BY subject_type, subject_id
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|(subject_id, subject_type)| {
            Ok(RestrictableObjectDescriptor {
                id: subject_id,
                object_type: subject_type.parse()?,
            })
        })
        .collect()
}

async fn replace_subjects(
    conn: &mut SqliteConnection,
    id: AccessRequirementId,
    subjects: &[RestrictableObjectDescriptor],
) -> TesseraResult<()> {
    sqlx::query("DELETE FROM subject_access_requirements WHERE requirement_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    let unique: BTreeSet<&RestrictableObjectDescriptor> = subjects.iter().collect();
    for subject in unique {
        sqlx::query(
            "INSERT INTO subject_access_requirements (requirement_id, subject_id, subject_type) VALUES (?, ?, ?)",
        )
        .bind(id)
        .bind(subject.id)
        .bind(subject.object_type.as_str())
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn fetch_requirement(
    conn: &mut SqliteConnection,
    id: AccessRequirementId,
) -> TesseraResult<AccessRequirement> {
    let row = sqlx::query_as::<_, RequirementRow>(&format!(
        "SELECT {REQUIREMENT_COLUMNS} FROM access_requirements ar WHERE ar.id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| requirement_not_found(id))?;

    let subjects = load_subjects(conn, id).await?;
    row.into_requirement(subjects)
}

async fn with_subjects(
    conn: &mut SqliteConnection,
    rows: Vec<RequirementRow>,
) -> TesseraResult<Vec<AccessRequirement>> {
    let mut requirements = Vec::with_capacity(rows.len());
    for row in rows {
        let subjects = load_subjects(&mut *conn, row.id).await?;
        requirements.push(row.into_requirement(subjects)?);
    }
    Ok(requirements)
}

/// `SELECT DISTINCT <columns> ... WHERE` restricted to the given subjects.
fn subject_query<'args>(
    columns: &str,
    subject_ids: &'args [i64],
    subject_type: RestrictableObjectType,
) -> QueryBuilder<'args, Sqlite> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!(
        r#"
        SELECT DISTINCT {columns}
        FROM access_requirements ar
        JOIN subject_access_requirements s ON s.requirement_id = ar.id
        WHERE s.subject_type = "#
    ));
    builder.push_bind(subject_type.as_str()).push(" AND s.subject_id IN ");
    push_in_list(&mut builder, subject_ids.iter().copied());
    builder
}

#[async_trait]
impl AccessRequirementDao for SqliteAccessRequirementDaoImpl {
    async fn create(&self, requirement: &AccessRequirement) -> TesseraResult<AccessRequirement> {
        debug!(
            "Creating {} access requirement with {} subjects",
            requirement.concrete_type(),
            requirement.subjects.len()
        );
        requirement.validate_model()?;

        let mut tx = self.pool.begin_write().await?;
        let now = Utc::now();
        let etag = Etag::generate();
        let id = sqlx::query(
            r#"
            INSERT INTO access_requirements (etag, created_by, created_on, modified_by, modified_on,
                                             access_type, concrete_type, serialized)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&etag)
        .bind(requirement.created_by)
        .bind(requirement.created_on.unwrap_or(now))
        .bind(requirement.modified_by)
        .bind(requirement.modified_on.unwrap_or(now))
        .bind(requirement.access_type.as_str())
        .bind(requirement.concrete_type())
        .bind(serialize(requirement)?)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
        let id = AccessRequirementId::new(id);

        replace_subjects(&mut *tx, id, &requirement.subjects).await?;
        record_change(
            &mut *tx,
            id.into_inner(),
            ObjectType::AccessRequirement,
            ChangeType::Create,
            Some(&etag),
        )
        .await?;
        let created = fetch_requirement(&mut *tx, id).await?;
        tx.commit().await?;

        debug!("Created access requirement {}", id);
        Ok(created)
    }

    async fn get(&self, id: AccessRequirementId) -> TesseraResult<AccessRequirement> {
        debug!("Finding access requirement by id: {}", id);

        let mut conn = self.pool.inner().acquire().await?;
        fetch_requirement(&mut *conn, id).await
    }

    async fn get_subjects(
        &self,
        id: AccessRequirementId,
    ) -> TesseraResult<Vec<RestrictableObjectDescriptor>> {
        let mut conn = self.pool.inner().acquire().await?;
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM access_requirements WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
        if exists.is_none() {
            return Err(requirement_not_found(id));
        }
        load_subjects(&mut *conn, id).await
    }

    async fn get_count(&self) -> TesseraResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM access_requirements")
            .fetch_one(self.pool.inner())
            .await?;
        Ok(to_count(total))
    }

    async fn get_concrete_type(&self, id: AccessRequirementId) -> TesseraResult<String> {
        let concrete_type: Option<String> =
            sqlx::query_scalar("SELECT concrete_type FROM access_requirements WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool.inner())
                .await?;
        concrete_type.ok_or_else(|| requirement_not_found(id))
    }

    async fn get_all_for_subject(
        &self,
        subject_ids: &[i64],
        subject_type: RestrictableObjectType,
    ) -> TesseraResult<Vec<AccessRequirement>> {
        debug!(
            "Finding access requirements of {} {} subjects",
            subject_ids.len(),
            subject_type
        );
        if subject_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.pool.inner().acquire().await?;
        let mut builder = subject_query(REQUIREMENT_COLUMNS, subject_ids, subject_type);
        builder.push(" ORDER BY ar.id");
        let rows = builder
            .build_query_as::<RequirementRow>()
            .fetch_all(&mut *conn)
            .await?;

        with_subjects(&mut *conn, rows).await
    }

    async fn get_for_subject(
        &self,
        subject_id: i64,
        subject_type: RestrictableObjectType,
        page: PageRequest,
    ) -> TesseraResult<Page<AccessRequirement>> {
        debug!(
            "Finding access requirements of {} {}, page: {}, size: {}",
            subject_type, subject_id, page.page, page.size
        );

        let mut conn = self.pool.inner().acquire().await?;
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM subject_access_requirements WHERE subject_id = ? AND subject_type = ?",
        )
        .bind(subject_id)
        .bind(subject_type.as_str())
        .fetch_one(&mut *conn)
        .await?;

        let rows = sqlx::query_as::<_, RequirementRow>(&format!(
            r#"
            SELECT {REQUIREMENT_COLUMNS}
            FROM access_requirements ar
            JOIN subject_access_requirements s ON s.requirement_id = ar.id
            WHERE s.subject_id = ? AND s.subject_type = ?
            ORDER BY ar.id
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(subject_id)
        .bind(subject_type.as_str())
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(&mut *conn)
        .await?;

        let requirements = with_subjects(&mut *conn, rows).await?;
        Ok(Page::new(requirements, page, to_count(total)))
    }

    async fn update(&self, requirement: &AccessRequirement) -> TesseraResult<AccessRequirement> {
        let id = requirement
            .id
            .ok_or_else(|| TesseraError::invalid_model("Access requirement id is required"))?;
        debug!("Updating access requirement {}", id);
        requirement.validate_model()?;
        let supplied = required_etag(requirement.etag.as_ref(), LockTarget::AccessRequirement)?;

        let mut tx = self.pool.begin_write().await?;
        let current =
            lock_for_update(&mut *tx, LockTarget::AccessRequirement, id.into_inner()).await?;
        check_etag(LockTarget::AccessRequirement, id, &current, supplied)?;

        sqlx::query(
            r#"
            UPDATE access_requirements
            SET modified_by = ?, modified_on = ?, access_type = ?, concrete_type = ?, serialized = ?
            WHERE id = ?
            "#,
        )
        .bind(requirement.modified_by)
        .bind(Utc::now())
        .bind(requirement.access_type.as_str())
        .bind(requirement.concrete_type())
        .bind(serialize(requirement)?)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        replace_subjects(&mut *tx, id, &requirement.subjects).await?;

        let etag = write_new_etag(&mut *tx, LockTarget::AccessRequirement, id.into_inner()).await?;
        record_change(
            &mut *tx,
            id.into_inner(),
            ObjectType::AccessRequirement,
            ChangeType::Update,
            Some(&etag),
        )
        .await?;
        let updated = fetch_requirement(&mut *tx, id).await?;
        tx.commit().await?;

        Ok(updated)
    }

    async fn delete(&self, id: AccessRequirementId) -> TesseraResult<()> {
        debug!("Deleting access requirement {}", id);

        let mut tx = self.pool.begin_write().await?;
        let result = sqlx::query("DELETE FROM access_requirements WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| match TesseraError::from(e) {
                TesseraError::IntegrityViolation(_) => TesseraError::IntegrityViolation(format!(
                    "Access requirement {id} is referenced by access approvals"
                )),
                other => other,
            })?;
        if result.rows_affected() == 0 {
            return Err(requirement_not_found(id));
        }

        record_change(
            &mut *tx,
            id.into_inner(),
            ObjectType::AccessRequirement,
            ChangeType::Delete,
            None,
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_all_unmet(
        &self,
        subject_ids: &[i64],
        subject_type: RestrictableObjectType,
        principal_ids: &[PrincipalId],
        access_types: &[AccessType],
    ) -> TesseraResult<Vec<AccessRequirementId>> {
        debug!(
            "Finding unmet access requirements of {} {} subjects for {} principals",
            subject_ids.len(),
            subject_type,
            principal_ids.len()
        );
        if subject_ids.is_empty() || access_types.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.pool.inner().acquire().await?;
        let mut builder = subject_query("ar.id", subject_ids, subject_type);
        builder.push(" AND ar.access_type IN ");
        push_in_list(&mut builder, access_types.iter().map(ToString::to_string));
        builder.push(" ORDER BY ar.id");
        let candidates: Vec<AccessRequirementId> = builder
            .build_query_scalar()
            .fetch_all(&mut *conn)
            .await?;

        if candidates.is_empty() || principal_ids.is_empty() {
            return Ok(candidates);
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT requirement_id, state, expired_on FROM access_approvals WHERE requirement_id IN ",
        );
        push_in_list(&mut builder, candidates.iter().copied());
        builder.push(" AND accessor_id IN ");
        push_in_list(&mut builder, principal_ids.iter().copied());
        let approvals: Vec<(AccessRequirementId, String, Option<DateTime<Utc>>)> = builder
            .build_query_as()
            .fetch_all(&mut *conn)
            .await?;

        let now = Utc::now();
        let mut met = BTreeSet::new();
        for (requirement_id, state, expired_on) in approvals {
            let state: ApprovalState = state.parse()?;
            if state == ApprovalState::Approved && expired_on.map_or(true, |at| at > now) {
                met.insert(requirement_id);
            }
        }

        Ok(candidates.into_iter().filter(|id| !met.contains(id)).collect())
    }

    async fn get_stats(
        &self,
        subject_ids: &[i64],
        subject_type: RestrictableObjectType,
    ) -> TesseraResult<AccessRequirementStats> {
        let mut stats = AccessRequirementStats::default();
        if subject_ids.is_empty() {
            return Ok(stats);
        }

        let mut builder = subject_query("ar.id, ar.concrete_type", subject_ids, subject_type);
        let rows: Vec<(AccessRequirementId, String)> = builder
            .build_query_as()
            .fetch_all(self.pool.inner())
            .await?;

        for (id, concrete_type) in rows {
            stats.requirement_ids.insert(id);
            match concrete_type.as_str() {
                AccessRequirementDetails::TERMS_OF_USE => stats.has_terms_of_use = true,
                AccessRequirementDetails::MANAGED_ACT | AccessRequirementDetails::ACT => {
                    stats.has_act = true
                }
                AccessRequirementDetails::LOCK => stats.has_lock = true,
                other => {
                    return Err(TesseraError::Datastore(format!(
                        "Unknown access requirement type: {other}"
                    )))
                }
            }
        }
        Ok(stats)
    }
}
