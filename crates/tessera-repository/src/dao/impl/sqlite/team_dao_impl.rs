//! SQLite implementation of TeamDao.

use super::record_change;
use super::support::to_count;
use crate::dao::TeamDao;
use crate::locking::{check_etag, lock_for_update, required_etag, write_new_etag, LockTarget};
use crate::DatabasePoolInterface;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shaku::Component;
use sqlx::{FromRow, SqliteConnection};
use std::sync::Arc;
use tessera_core::{
    AccessType, ChangeType, Etag, ObjectType, Page, PageRequest, PrincipalId, Team, TeamId,
    TeamMember, TesseraError, TesseraResult, ValidateExt,
};
use tracing::debug;

/// SQLite-backed teams.
#[derive(Component, Clone)]
#[shaku(interface = TeamDao)]
pub struct SqliteTeamDaoImpl {
    #[shaku(inject)]
    pool: Arc<dyn DatabasePoolInterface>,
}

impl SqliteTeamDaoImpl {
    #[must_use]
    pub fn new(pool: Arc<dyn DatabasePoolInterface>) -> Self {
        Self { pool }
    }
}

impl std::fmt::Debug for SqliteTeamDaoImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTeamDaoImpl").finish()
    }
}

/// Serialized form of the non-key team fields.
#[derive(Debug, Serialize, Deserialize)]
struct TeamProperties {
    name: String,
    description: Option<String>,
    icon: Option<String>,
    can_public_join: bool,
    created_by: PrincipalId,
    created_on: DateTime<Utc>,
    modified_by: PrincipalId,
    modified_on: DateTime<Utc>,
}

impl TeamProperties {
    fn from_team(team: &Team, created_by: PrincipalId, created_on: DateTime<Utc>) -> Self {
        Self {
            name: team.name.clone(),
            description: team.description.clone(),
            icon: team.icon.clone(),
            can_public_join: team.can_public_join,
            created_by,
            created_on,
            modified_by: team.modified_by,
            modified_on: Utc::now(),
        }
    }
}

#[derive(Debug, FromRow)]
struct TeamRow {
    id: TeamId,
    etag: Etag,
    properties: Vec<u8>,
}

impl TryFrom<TeamRow> for Team {
    type Error = TesseraError;

    fn try_from(row: TeamRow) -> Result<Self, Self::Error> {
        let properties: TeamProperties = serde_json::from_slice(&row.properties)?;
        Ok(Self {
            id: row.id,
            name: properties.name,
            description: properties.description,
            icon: properties.icon,
            can_public_join: properties.can_public_join,
            etag: Some(row.etag),
            created_by: properties.created_by,
            created_on: Some(properties.created_on),
            modified_by: properties.modified_by,
            modified_on: Some(properties.modified_on),
        })
    }
}

#[derive(Debug, FromRow)]
struct TeamMemberRow {
    member_id: PrincipalId,
    is_individual: bool,
    is_admin: bool,
}

async fn fetch_team(conn: &mut SqliteConnection, id: TeamId) -> TesseraResult<Team> {
    let row = sqlx::query_as::<_, TeamRow>("SELECT id, etag, properties FROM teams WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(Team::try_from)
        .transpose()?
        .ok_or_else(|| TesseraError::not_found("Team", id))
}

#[async_trait]
impl TeamDao for SqliteTeamDaoImpl {
    async fn create(&self, team: &Team) -> TesseraResult<Team> {
        debug!("Creating team {} '{}'", team.id, team.name);
        team.validate_model()?;

        let mut tx = self.pool.begin_write().await?;

        let is_individual: Option<bool> =
            sqlx::query_scalar("SELECT is_individual FROM user_groups WHERE id = ?")
                .bind(team.id)
                .fetch_optional(&mut *tx)
                .await?;
        match is_individual {
            None => return Err(TesseraError::not_found("UserGroup", team.id)),
            Some(true) => {
                return Err(TesseraError::invalid_argument(format!(
                    "Principal {} is an individual and cannot back a team",
                    team.id
                )))
            }
            Some(false) => {}
        }

        let properties = TeamProperties::from_team(
            team,
            team.created_by,
            team.created_on.unwrap_or_else(Utc::now),
        );
        let etag = Etag::generate();
        sqlx::query("INSERT INTO teams (id, etag, properties) VALUES (?, ?, ?)")
            .bind(team.id)
            .bind(&etag)
            .bind(serde_json::to_vec(&properties)?)
            .execute(&mut *tx)
            .await?;

        record_change(
            &mut *tx,
            team.id.into_inner(),
            ObjectType::Team,
            ChangeType::Create,
            Some(&etag),
        )
        .await?;
        let created = fetch_team(&mut *tx, team.id).await?;
        tx.commit().await?;

        debug!("Created team {}", created.id);
        Ok(created)
    }

    async fn get(&self, id: TeamId) -> TesseraResult<Team> {
        debug!("Finding team by id: {}", id);

        let mut conn = self.pool.inner().acquire().await?;
        fetch_team(&mut *conn, id).await
    }

    async fn get_in_range(&self, page: PageRequest) -> TesseraResult<Page<Team>> {
        debug!("Finding teams, page: {}, size: {}", page.page, page.size);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM teams")
            .fetch_one(self.pool.inner())
            .await?;

        let rows = sqlx::query_as::<_, TeamRow>(
            "SELECT id, etag, properties FROM teams ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool.inner())
        .await?;

        let teams = rows.into_iter().map(Team::try_from).collect::<TesseraResult<Vec<_>>>()?;
        Ok(Page::new(teams, page, to_count(total)))
    }

    async fn get_for_member_in_range(
        &self,
        principal_id: PrincipalId,
        page: PageRequest,
    ) -> TesseraResult<Page<Team>> {
        debug!(
            "Finding teams of member {}, page: {}, size: {}",
            principal_id, page.page, page.size
        );

        let total = self.get_count_for_member(principal_id).await?;

        let rows = sqlx::query_as::<_, TeamRow>(
            r#"
            SELECT t.id, t.etag, t.properties
            FROM teams t
            JOIN group_members gm ON gm.group_id = t.id
            WHERE gm.member_id = ?
            ORDER BY t.id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(principal_id)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool.inner())
        .await?;

        let teams = rows.into_iter().map(Team::try_from).collect::<TesseraResult<Vec<_>>>()?;
        Ok(Page::new(teams, page, total))
    }

    async fn get_count(&self) -> TesseraResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM teams")
            .fetch_one(self.pool.inner())
            .await?;
        Ok(to_count(total))
    }

    async fn get_count_for_member(&self, principal_id: PrincipalId) -> TesseraResult<u64> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM teams t
            JOIN group_members gm ON gm.group_id = t.id
            WHERE gm.member_id = ?
            "#,
        )
        .bind(principal_id)
        .fetch_one(self.pool.inner())
        .await?;
        Ok(to_count(total))
    }

    async fn get_members_in_range(
        &self,
        team_id: TeamId,
        page: PageRequest,
    ) -> TesseraResult<Page<TeamMember>> {
        debug!(
            "Finding members of team {}, page: {}, size: {}",
            team_id, page.page, page.size
        );

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM teams WHERE id = ?")
            .bind(team_id)
            .fetch_optional(self.pool.inner())
            .await?;
        if exists.is_none() {
            return Err(TesseraError::not_found("Team", team_id));
        }

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM group_members WHERE group_id = ?")
            .bind(team_id)
            .fetch_one(self.pool.inner())
            .await?;

        let rows = sqlx::query_as::<_, TeamMemberRow>(
            r#"
            SELECT gm.member_id, ug.is_individual,
                   EXISTS (
                       SELECT 1
                       FROM acls a
                       JOIN resource_access ra ON ra.acl_id = a.id
                       WHERE a.owner_id = gm.group_id
                         AND a.owner_type = ?
                         AND ra.principal_id = gm.member_id
                         AND ra.access_type = ?
                   ) AS is_admin
            FROM group_members gm
            JOIN user_groups ug ON ug.id = gm.member_id
            WHERE gm.group_id = ?
            ORDER BY gm.member_id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(ObjectType::Team.as_str())
        .bind(AccessType::TeamMembershipUpdate.as_str())
        .bind(team_id)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool.inner())
        .await?;

        let members = rows
            .into_iter()
            .map(|row| TeamMember {
                team_id,
                member_id: row.member_id,
                is_individual: row.is_individual,
                is_admin: row.is_admin,
            })
            .collect();
        Ok(Page::new(members, page, to_count(total)))
    }

    async fn get_admin_member_ids(&self, team_id: TeamId) -> TesseraResult<Vec<PrincipalId>> {
        let ids: Vec<PrincipalId> = sqlx::query_scalar(
            r#"
            SELECT gm.member_id
            FROM group_members gm
            JOIN acls a ON a.owner_id = gm.group_id AND a.owner_type = ?
            JOIN resource_access ra ON ra.acl_id = a.id AND ra.principal_id = gm.member_id
            WHERE gm.group_id = ? AND ra.access_type = ?
            ORDER BY gm.member_id
            "#,
        )
        .bind(ObjectType::Team.as_str())
        .bind(team_id)
        .bind(AccessType::TeamMembershipUpdate.as_str())
        .fetch_all(self.pool.inner())
        .await?;

        Ok(ids)
    }

    async fn update(&self, team: &Team) -> TesseraResult<Team> {
        debug!("Updating team {}", team.id);
        team.validate_model()?;
        let supplied = required_etag(team.etag.as_ref(), LockTarget::Team)?;

        let mut tx = self.pool.begin_write().await?;
        let current = lock_for_update(&mut *tx, LockTarget::Team, team.id.into_inner()).await?;
        check_etag(LockTarget::Team, team.id, &current, supplied)?;

        let stored = fetch_team(&mut *tx, team.id).await?;
        let properties = TeamProperties::from_team(
            team,
            stored.created_by,
            stored.created_on.unwrap_or_else(Utc::now),
        );
        sqlx::query("UPDATE teams SET properties = ? WHERE id = ?")
            .bind(serde_json::to_vec(&properties)?)
            .bind(team.id)
            .execute(&mut *tx)
            .await?;

        let etag = write_new_etag(&mut *tx, LockTarget::Team, team.id.into_inner()).await?;
        record_change(
            &mut *tx,
            team.id.into_inner(),
            ObjectType::Team,
            ChangeType::Update,
            Some(&etag),
        )
        .await?;
        let updated = fetch_team(&mut *tx, team.id).await?;
        tx.commit().await?;

        Ok(updated)
    }

    async fn delete(&self, id: TeamId) -> TesseraResult<()> {
        debug!("Deleting team {}", id);

        let mut tx = self.pool.begin_write().await?;
        let result = sqlx::query("DELETE FROM teams WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(TesseraError::not_found("Team", id));
        }

        record_change(&mut *tx, id.into_inner(), ObjectType::Team, ChangeType::Delete, None).await?;
        tx.commit().await?;
        Ok(())
    }
}
