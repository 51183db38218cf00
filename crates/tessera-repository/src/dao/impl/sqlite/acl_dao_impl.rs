//! SQLite implementation of AccessControlListDao.

use super::record_change;
use super::support::push_in_list;
use crate::dao::AccessControlListDao;
use crate::locking::{check_etag, lock_for_update, required_etag, write_new_etag, LockTarget};
use crate::DatabasePoolInterface;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shaku::Component;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::BTreeSet;
use std::sync::Arc;
use tessera_core::{
    AccessControlList, AccessType, AclId, ChangeType, Etag, ObjectType, PrincipalId, TesseraError,
    TesseraResult,
};
use tracing::debug;

/// SQLite-backed access control lists.
#[derive(Component, Clone)]
#[shaku(interface = AccessControlListDao)]
pub struct SqliteAccessControlListDaoImpl {
    #[shaku(inject)]
    pool: Arc<dyn DatabasePoolInterface>,
}

impl SqliteAccessControlListDaoImpl {
    #[must_use]
    pub fn new(pool: Arc<dyn DatabasePoolInterface>) -> Self {
        Self { pool }
    }
}

impl std::fmt::Debug for SqliteAccessControlListDaoImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteAccessControlListDaoImpl").finish()
    }
}

#[derive(Debug, FromRow)]
struct AclRow {
    id: AclId,
    owner_id: i64,
    etag: Etag,
    created_on: DateTime<Utc>,
}

async fn find_acl_id(
    conn: &mut SqliteConnection,
    owner_id: i64,
    owner_type: ObjectType,
) -> TesseraResult<AclId> {
    let id: Option<AclId> =
        sqlx::query_scalar("SELECT id FROM acls WHERE owner_id = ? AND owner_type = ?")
            .bind(owner_id)
            .bind(owner_type.as_str())
            .fetch_optional(&mut *conn)
            .await?;
    id.ok_or_else(|| {
        TesseraError::not_found("AccessControlList", format!("{owner_type}/{owner_id}"))
    })
}

async fn fetch_acl(conn: &mut SqliteConnection, id: AclId) -> TesseraResult<AccessControlList> {
    let row =
        sqlx::query_as::<_, AclRow>("SELECT id, owner_id, etag, created_on FROM acls WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| TesseraError::not_found("AccessControlList", id))?;

    let entries: Vec<(PrincipalId, String)> = sqlx::query_as(
        "SELECT principal_id, access_type FROM resource_access WHERE acl_id = ? ORDER BY principal_id, access_type",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let mut acl = AccessControlList {
        id: Some(row.id),
        owner_id: row.owner_id,
        etag: Some(row.etag),
        creation_date: Some(row.created_on),
        resource_access: Vec::new(),
    };
    for (principal_id, access_type) in entries {
        acl = acl.grant(principal_id, [access_type.parse::<AccessType>()?]);
    }
    Ok(acl)
}

async fn insert_resource_access(
    conn: &mut SqliteConnection,
    id: AclId,
    acl: &AccessControlList,
) -> TesseraResult<()> {
    for entry in &acl.resource_access {
        for access_type in &entry.access_types {
            sqlx::query("INSERT INTO resource_access (acl_id, principal_id, access_type) VALUES (?, ?, ?)")
                .bind(id)
                .bind(entry.principal_id)
                .bind(access_type.as_str())
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

#[async_trait]
impl AccessControlListDao for SqliteAccessControlListDaoImpl {
    async fn create(
        &self,
        acl: &AccessControlList,
        owner_type: ObjectType,
    ) -> TesseraResult<AclId> {
        debug!("Creating ACL for {} {}", owner_type, acl.owner_id);

        let mut tx = self.pool.begin_write().await?;
        let etag = Etag::generate();
        let id = sqlx::query(
            "INSERT INTO acls (owner_id, owner_type, etag, created_on) VALUES (?, ?, ?, ?)",
        )
        .bind(acl.owner_id)
        .bind(owner_type.as_str())
        .bind(&etag)
        .bind(acl.creation_date.unwrap_or_else(Utc::now))
        .execute(&mut *tx)
        .await
        .map_err(|e| match TesseraError::from(e) {
            TesseraError::NameConflict(_) => TesseraError::name_conflict(format!(
                "An ACL already exists for {owner_type} {}",
                acl.owner_id
            )),
            other => other,
        })?
        .last_insert_rowid();
        let id = AclId::new(id);

        insert_resource_access(&mut *tx, id, acl).await?;
        record_change(
            &mut *tx,
            id.into_inner(),
            ObjectType::AccessControlList,
            ChangeType::Create,
            Some(&etag),
        )
        .await?;
        tx.commit().await?;

        debug!("Created ACL {}", id);
        Ok(id)
    }

    async fn get(&self, owner_id: i64, owner_type: ObjectType) -> TesseraResult<AccessControlList> {
        debug!("Finding ACL of {} {}", owner_type, owner_id);

        let mut conn = self.pool.inner().acquire().await?;
        let id = find_acl_id(&mut *conn, owner_id, owner_type).await?;
        fetch_acl(&mut *conn, id).await
    }

    async fn get_by_id(&self, id: AclId) -> TesseraResult<AccessControlList> {
        debug!("Finding ACL by id: {}", id);

        let mut conn = self.pool.inner().acquire().await?;
        fetch_acl(&mut *conn, id).await
    }

    async fn get_acl_id(&self, owner_id: i64, owner_type: ObjectType) -> TesseraResult<AclId> {
        let mut conn = self.pool.inner().acquire().await?;
        find_acl_id(&mut *conn, owner_id, owner_type).await
    }

    async fn update(
        &self,
        acl: &AccessControlList,
        owner_type: ObjectType,
    ) -> TesseraResult<AccessControlList> {
        debug!("Updating ACL of {} {}", owner_type, acl.owner_id);
        let supplied = required_etag(acl.etag.as_ref(), LockTarget::Acl)?;

        let mut tx = self.pool.begin_write().await?;
        let id = find_acl_id(&mut *tx, acl.owner_id, owner_type).await?;
        let current = lock_for_update(&mut *tx, LockTarget::Acl, id.into_inner()).await?;
        check_etag(LockTarget::Acl, id, &current, supplied)?;

        sqlx::query("DELETE FROM resource_access WHERE acl_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_resource_access(&mut *tx, id, acl).await?;

        let etag = write_new_etag(&mut *tx, LockTarget::Acl, id.into_inner()).await?;
        record_change(
            &mut *tx,
            id.into_inner(),
            ObjectType::AccessControlList,
            ChangeType::Update,
            Some(&etag),
        )
        .await?;
        let updated = fetch_acl(&mut *tx, id).await?;
        tx.commit().await?;

        Ok(updated)
    }

    async fn delete(&self, owner_id: i64, owner_type: ObjectType) -> TesseraResult<bool> {
        debug!("Deleting ACL of {} {}", owner_type, owner_id);

        let mut tx = self.pool.begin_write().await?;
        let id: Option<AclId> =
            sqlx::query_scalar("SELECT id FROM acls WHERE owner_id = ? AND owner_type = ?")
                .bind(owner_id)
                .bind(owner_type.as_str())
                .fetch_optional(&mut *tx)
                .await?;
        let Some(id) = id else {
            return Ok(false);
        };

        sqlx::query("DELETE FROM acls WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        record_change(
            &mut *tx,
            id.into_inner(),
            ObjectType::AccessControlList,
            ChangeType::Delete,
            None,
        )
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn can_access(
        &self,
        groups: &BTreeSet<PrincipalId>,
        owner_id: i64,
        owner_type: ObjectType,
        access_type: AccessType,
    ) -> TesseraResult<bool> {
        debug!(
            "Checking {} on {} {} for {} principals",
            access_type,
            owner_type,
            owner_id,
            groups.len()
        );
        if groups.is_empty() {
            return Ok(false);
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT 1 FROM acls a JOIN resource_access ra ON ra.acl_id = a.id WHERE a.owner_id = ",
        );
        builder
            .push_bind(owner_id)
            .push(" AND a.owner_type = ")
            .push_bind(owner_type.as_str())
            .push(" AND ra.access_type = ")
            .push_bind(access_type.as_str())
            .push(" AND ra.principal_id IN ");
        push_in_list(&mut builder, groups.iter().copied());
        builder.push(" LIMIT 1");

        let result: Option<i64> = builder
            .build_query_scalar()
            .fetch_optional(self.pool.inner())
            .await?;
        Ok(result.is_some())
    }

    async fn get_accessible_owner_ids(
        &self,
        groups: &BTreeSet<PrincipalId>,
        owner_type: ObjectType,
        access_type: AccessType,
    ) -> TesseraResult<BTreeSet<i64>> {
        if groups.is_empty() {
            return Ok(BTreeSet::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT DISTINCT a.owner_id FROM acls a JOIN resource_access ra ON ra.acl_id = a.id WHERE a.owner_type = ",
        );
        builder
            .push_bind(owner_type.as_str())
            .push(" AND ra.access_type = ")
            .push_bind(access_type.as_str())
            .push(" AND ra.principal_id IN ");
        push_in_list(&mut builder, groups.iter().copied());

        let ids: Vec<i64> = builder
            .build_query_scalar()
            .fetch_all(self.pool.inner())
            .await?;
        Ok(ids.into_iter().collect())
    }

    async fn get_principal_ids(
        &self,
        owner_id: i64,
        owner_type: ObjectType,
        access_type: AccessType,
    ) -> TesseraResult<BTreeSet<PrincipalId>> {
        let ids: Vec<PrincipalId> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT ra.principal_id
            FROM acls a
            JOIN resource_access ra ON ra.acl_id = a.id
            WHERE a.owner_id = ? AND a.owner_type = ? AND ra.access_type = ?
            "#,
        )
        .bind(owner_id)
        .bind(owner_type.as_str())
        .bind(access_type.as_str())
        .fetch_all(self.pool.inner())
        .await?;
        Ok(ids.into_iter().collect())
    }
}
