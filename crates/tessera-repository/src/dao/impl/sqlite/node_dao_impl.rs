//! SQLite implementation of NodeDao.
//!
//! A node row holds the fields shared by all revisions; `current_rev_num`
//! selects the revision joined in by default. Hierarchy walks use recursive
//! CTEs over `parent_id`.

use super::record_change;
use super::support::{push_in_list, to_count};
use crate::dao::NodeDao;
use crate::locking::{
    check_etag, lock_and_increment_etag, lock_for_update, required_etag, write_new_etag, LockTarget,
};
use crate::DatabasePoolInterface;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shaku::Component;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tessera_core::{
    AnnotationValue, Annotations, ChangeType, EntityHeader, Etag, Node, NodeId, NodeType,
    ObjectType, Page, PageRequest, PrincipalId, TesseraError, TesseraResult, ValidateExt,
    VersionInfo, DEFAULT_VERSION_NUMBER,
};
use tracing::debug;

/// SQLite-backed entity hierarchy.
#[derive(Component, Clone)]
#[shaku(interface = NodeDao)]
pub struct SqliteNodeDaoImpl {
    #[shaku(inject)]
    pool: Arc<dyn DatabasePoolInterface>,
}

impl SqliteNodeDaoImpl {
    #[must_use]
    pub fn new(pool: Arc<dyn DatabasePoolInterface>) -> Self {
        Self { pool }
    }
}

impl std::fmt::Debug for SqliteNodeDaoImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteNodeDaoImpl").finish()
    }
}

const NODE_COLUMNS: &str = r#"
    n.id, n.name, n.node_type, n.parent_id, n.project_id, n.alias, n.etag, n.description,
    n.created_by, n.created_on, r.number AS version_number, r.label AS version_label,
    r.comment AS version_comment, r.activity_id, r.file_handle_id, r.modified_by, r.modified_on
"#;

const HEADER_COLUMNS: &str = r#"
    n.id, n.name, n.node_type, n.parent_id, r.number AS version_number,
    r.label AS version_label, r.modified_by, r.modified_on
"#;

/// Ancestors-or-self of the bound node, `depth` 0 being the node itself.
const PATH_CTE: &str = r#"
    WITH RECURSIVE path(id, depth) AS (
        SELECT id, 0 FROM nodes WHERE id = ?
        UNION ALL
        SELECT n.parent_id, p.depth + 1
        FROM nodes n
        JOIN path p ON n.id = p.id
        WHERE n.parent_id IS NOT NULL
    )
"#;

/// The bound node and all of its descendants.
const SUBTREE_CTE: &str = r#"
    WITH RECURSIVE subtree(id) AS (
        SELECT id FROM nodes WHERE id = ?
        UNION ALL
        SELECT n.id FROM nodes n JOIN subtree s ON n.parent_id = s.id
    )
"#;

#[derive(Debug, FromRow)]
struct NodeRow {
    id: NodeId,
    name: String,
    node_type: String,
    parent_id: Option<NodeId>,
    project_id: Option<NodeId>,
    alias: Option<String>,
    etag: Etag,
    description: Option<String>,
    created_by: PrincipalId,
    created_on: DateTime<Utc>,
    version_number: i64,
    version_label: String,
    version_comment: Option<String>,
    activity_id: Option<String>,
    file_handle_id: Option<String>,
    modified_by: PrincipalId,
    modified_on: DateTime<Utc>,
}

impl TryFrom<NodeRow> for Node {
    type Error = TesseraError;

    fn try_from(row: NodeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Some(row.id),
            name: row.name,
            node_type: row.node_type.parse()?,
            parent_id: row.parent_id,
            project_id: row.project_id,
            alias: row.alias,
            etag: Some(row.etag),
            description: row.description,
            created_by: row.created_by,
            created_on: Some(row.created_on),
            modified_by: row.modified_by,
            modified_on: Some(row.modified_on),
            version_number: Some(row.version_number),
            version_label: Some(row.version_label),
            version_comment: row.version_comment,
            activity_id: row.activity_id,
            file_handle_id: row.file_handle_id,
        })
    }
}

#[derive(Debug, FromRow)]
struct HeaderRow {
    id: NodeId,
    name: String,
    node_type: String,
    parent_id: Option<NodeId>,
    version_number: i64,
    version_label: String,
    modified_by: PrincipalId,
    modified_on: DateTime<Utc>,
}

impl TryFrom<HeaderRow> for EntityHeader {
    type Error = TesseraError;

    fn try_from(row: HeaderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            node_type: row.node_type.parse()?,
            parent_id: row.parent_id,
            version_number: row.version_number,
            version_label: row.version_label,
            modified_by: row.modified_by,
            modified_on: row.modified_on,
        })
    }
}

#[derive(Debug, FromRow)]
struct VersionRow {
    owner_node_id: NodeId,
    number: i64,
    label: String,
    comment: Option<String>,
    file_handle_id: Option<String>,
    modified_by: PrincipalId,
    modified_on: DateTime<Utc>,
}

impl From<VersionRow> for VersionInfo {
    fn from(row: VersionRow) -> Self {
        Self {
            id: row.owner_node_id,
            version_number: row.number,
            version_label: row.label,
            version_comment: row.comment,
            file_handle_id: row.file_handle_id,
            modified_by: row.modified_by,
            modified_on: row.modified_on,
        }
    }
}

#[derive(Debug, FromRow)]
struct AnnotationsRow {
    etag: Etag,
    number: i64,
    annotations: Option<Vec<u8>>,
}

impl AnnotationsRow {
    fn into_annotations(self, id: NodeId) -> TesseraResult<Annotations> {
        let values: BTreeMap<String, AnnotationValue> = match self.annotations {
            Some(blob) => serde_json::from_slice(&blob)?,
            None => BTreeMap::new(),
        };
        Ok(Annotations {
            id: Some(id),
            etag: Some(self.etag),
            version_number: Some(self.number),
            values,
        })
    }
}

fn node_not_found(id: NodeId) -> TesseraError {
    TesseraError::not_found("Node", id)
}

fn revision_not_found(id: NodeId, version: i64) -> TesseraError {
    TesseraError::not_found("NodeRevision", format!("{id}.{version}"))
}

fn required_id(node: &Node) -> TesseraResult<NodeId> {
    node.id
        .ok_or_else(|| TesseraError::invalid_model("Node id is required"))
}

async fn fetch_node(
    conn: &mut SqliteConnection,
    id: NodeId,
    version: Option<i64>,
) -> TesseraResult<Node> {
    let row = sqlx::query_as::<_, NodeRow>(&format!(
        r#"
        SELECT {NODE_COLUMNS}
        FROM nodes n
        JOIN revisions r ON r.owner_node_id = n.id AND r.number = COALESCE(?, n.current_rev_num)
        WHERE n.id = ?
        "#
    ))
    .bind(version)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        if let Some(version) = version {
            if node_exists(conn, id).await? {
                return Err(revision_not_found(id, version));
            }
        }
        return Err(node_not_found(id));
    };
    Node::try_from(row)
}

async fn node_exists(conn: &mut SqliteConnection, id: NodeId) -> TesseraResult<bool> {
    let result: Option<i64> = sqlx::query_scalar("SELECT 1 FROM nodes WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(result.is_some())
}

async fn current_revision(conn: &mut SqliteConnection, id: NodeId) -> TesseraResult<i64> {
    let number: Option<i64> = sqlx::query_scalar("SELECT current_rev_num FROM nodes WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    number.ok_or_else(|| node_not_found(id))
}

async fn subtree_ids(conn: &mut SqliteConnection, id: NodeId) -> TesseraResult<Vec<NodeId>> {
    let ids = sqlx::query_scalar(&format!("{SUBTREE_CTE} SELECT id FROM subtree"))
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(ids)
}

#[async_trait]
impl NodeDao for SqliteNodeDaoImpl {
    async fn create_new_node(&self, node: &Node) -> TesseraResult<Node> {
        debug!("Creating node '{}' of type {}", node.name, node.node_type);
        node.validate_model()?;

        let mut tx = self.pool.begin_write().await?;

        if let Some(id) = node.id {
            if node_exists(&mut *tx, id).await? {
                return Err(TesseraError::invalid_argument(format!("Node {id} already exists")));
            }
        }

        let project_id = match node.parent_id {
            Some(parent_id) => {
                let parent: Option<(String, Option<NodeId>)> =
                    sqlx::query_as("SELECT node_type, project_id FROM nodes WHERE id = ?")
                        .bind(parent_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                let (parent_type, parent_project) =
                    parent.ok_or_else(|| node_not_found(parent_id))?;
                let parent_type: NodeType = parent_type.parse()?;
                if !parent_type.is_container() {
                    return Err(TesseraError::invalid_argument(format!(
                        "Node {parent_id} is a {parent_type} and cannot have children"
                    )));
                }
                parent_project
            }
            None => None,
        };

        let version_number = node.version_number.unwrap_or(DEFAULT_VERSION_NUMBER);
        let version_label = node
            .version_label
            .clone()
            .unwrap_or_else(|| version_number.to_string());
        let now = Utc::now();
        let etag = Etag::generate();

        let id = sqlx::query(
            r#"
            INSERT INTO nodes (id, name, node_type, parent_id, project_id, alias, etag,
                               current_rev_num, description, created_by, created_on)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(node.id)
        .bind(&node.name)
        .bind(node.node_type.as_str())
        .bind(node.parent_id)
        .bind(project_id)
        .bind(&node.alias)
        .bind(&etag)
        .bind(version_number)
        .bind(&node.description)
        .bind(node.created_by)
        .bind(node.created_on.unwrap_or(now))
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
        let id = NodeId::new(id);

        if node.node_type.is_project() {
            sqlx::query("UPDATE nodes SET project_id = id WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO revisions (owner_node_id, number, label, comment, activity_id,
                                   file_handle_id, modified_by, modified_on)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(version_number)
        .bind(&version_label)
        .bind(&node.version_comment)
        .bind(&node.activity_id)
        .bind(&node.file_handle_id)
        .bind(node.modified_by)
        .bind(node.modified_on.unwrap_or(now))
        .execute(&mut *tx)
        .await?;

        record_change(
            &mut *tx,
            id.into_inner(),
            ObjectType::Entity,
            ChangeType::Create,
            Some(&etag),
        )
        .await?;
        let created = fetch_node(&mut *tx, id, None).await?;
        tx.commit().await?;

        debug!("Created node {}", id);
        Ok(created)
    }

    async fn create_new_version(&self, node: &Node) -> TesseraResult<i64> {
        let id = required_id(node)?;
        debug!("Creating new version of node {}", id);
        node.validate_model()?;

        let mut tx = self.pool.begin_write().await?;
        lock_for_update(&mut *tx, LockTarget::Node, id.into_inner()).await?;

        let (current, max): (i64, i64) = sqlx::query_as(
            r#"
            SELECT n.current_rev_num, MAX(r.number)
            FROM nodes n
            JOIN revisions r ON r.owner_node_id = n.id
            WHERE n.id = ?
            GROUP BY n.id
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let number = max + 1;
        let label = node.version_label.clone().unwrap_or_else(|| number.to_string());

        sqlx::query(
            r#"
            INSERT INTO revisions (owner_node_id, number, label, comment, activity_id,
                                   file_handle_id, modified_by, modified_on, annotations)
            SELECT owner_node_id, ?, ?, ?, COALESCE(?, activity_id), COALESCE(?, file_handle_id),
                   ?, ?, annotations
            FROM revisions
            WHERE owner_node_id = ? AND number = ?
            "#,
        )
        .bind(number)
        .bind(&label)
        .bind(&node.version_comment)
        .bind(&node.activity_id)
        .bind(&node.file_handle_id)
        .bind(node.modified_by)
        .bind(Utc::now())
        .bind(id)
        .bind(current)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE nodes SET current_rev_num = ? WHERE id = ?")
            .bind(number)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let etag = write_new_etag(&mut *tx, LockTarget::Node, id.into_inner()).await?;
        record_change(
            &mut *tx,
            id.into_inner(),
            ObjectType::Entity,
            ChangeType::Update,
            Some(&etag),
        )
        .await?;
        tx.commit().await?;

        debug!("Node {} is now at version {}", id, number);
        Ok(number)
    }

    async fn get_node(&self, id: NodeId) -> TesseraResult<Node> {
        debug!("Finding node by id: {}", id);

        let mut conn = self.pool.inner().acquire().await?;
        fetch_node(&mut *conn, id, None).await
    }

    async fn get_node_for_version(&self, id: NodeId, version: i64) -> TesseraResult<Node> {
        debug!("Finding node {} at version {}", id, version);

        let mut conn = self.pool.inner().acquire().await?;
        fetch_node(&mut *conn, id, Some(version)).await
    }

    async fn update_node(&self, node: &Node) -> TesseraResult<Node> {
        let id = required_id(node)?;
        debug!("Updating node {}", id);
        node.validate_model()?;
        let supplied = required_etag(node.etag.as_ref(), LockTarget::Node)?;

        let mut tx = self.pool.begin_write().await?;
        let current = lock_for_update(&mut *tx, LockTarget::Node, id.into_inner()).await?;
        check_etag(LockTarget::Node, id, &current, supplied)?;

        sqlx::query("UPDATE nodes SET name = ?, alias = ?, description = ? WHERE id = ?")
            .bind(&node.name)
            .bind(&node.alias)
            .bind(&node.description)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let number = current_revision(&mut *tx, id).await?;
        sqlx::query(
            r#"
            UPDATE revisions
            SET label = COALESCE(?, label), comment = ?, activity_id = ?, file_handle_id = ?,
                modified_by = ?, modified_on = ?
            WHERE owner_node_id = ? AND number = ?
            "#,
        )
        .bind(&node.version_label)
        .bind(&node.version_comment)
        .bind(&node.activity_id)
        .bind(&node.file_handle_id)
        .bind(node.modified_by)
        .bind(Utc::now())
        .bind(id)
        .bind(number)
        .execute(&mut *tx)
        .await?;

        let etag = write_new_etag(&mut *tx, LockTarget::Node, id.into_inner()).await?;
        record_change(
            &mut *tx,
            id.into_inner(),
            ObjectType::Entity,
            ChangeType::Update,
            Some(&etag),
        )
        .await?;
        let updated = fetch_node(&mut *tx, id, None).await?;
        tx.commit().await?;

        Ok(updated)
    }

    async fn lock_node_and_increment_etag(&self, id: NodeId, etag: &Etag) -> TesseraResult<Etag> {
        debug!("Locking node {} at etag {}", id, etag);

        let mut tx = self.pool.begin_write().await?;
        let new_etag =
            lock_and_increment_etag(&mut *tx, LockTarget::Node, id.into_inner(), Some(etag)).await?;
        record_change(
            &mut *tx,
            id.into_inner(),
            ObjectType::Entity,
            ChangeType::Update,
            Some(&new_etag),
        )
        .await?;
        tx.commit().await?;
        Ok(new_etag)
    }

    async fn lock_nodes(&self, ids: &[NodeId]) -> TesseraResult<Vec<Etag>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut sorted = ids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        debug!("Locking {} nodes", sorted.len());

        let mut tx = self.pool.begin_write().await?;
        let mut etags = Vec::with_capacity(sorted.len());
        for id in sorted {
            etags.push(lock_for_update(&mut *tx, LockTarget::Node, id.into_inner()).await?);
        }
        tx.commit().await?;
        Ok(etags)
    }

    async fn peek_current_etag(&self, id: NodeId) -> TesseraResult<Etag> {
        let etag: Option<Etag> = sqlx::query_scalar("SELECT etag FROM nodes WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool.inner())
            .await?;
        etag.ok_or_else(|| node_not_found(id))
    }

    async fn update_annotations(
        &self,
        id: NodeId,
        annotations: &Annotations,
    ) -> TesseraResult<Annotations> {
        debug!("Updating annotations of node {}", id);

        let mut tx = self.pool.begin_write().await?;
        let current = lock_for_update(&mut *tx, LockTarget::Node, id.into_inner()).await?;
        if let Some(supplied) = annotations.etag.as_ref() {
            check_etag(LockTarget::Node, id, &current, supplied)?;
        }

        let number = current_revision(&mut *tx, id).await?;
        let blob = if annotations.is_empty() {
            None
        } else {
            Some(serde_json::to_vec(&annotations.values)?)
        };
        sqlx::query("UPDATE revisions SET annotations = ? WHERE owner_node_id = ? AND number = ?")
            .bind(blob)
            .bind(id)
            .bind(number)
            .execute(&mut *tx)
            .await?;

        let etag = write_new_etag(&mut *tx, LockTarget::Node, id.into_inner()).await?;
        record_change(
            &mut *tx,
            id.into_inner(),
            ObjectType::Entity,
            ChangeType::Update,
            Some(&etag),
        )
        .await?;
        tx.commit().await?;

        Ok(Annotations {
            id: Some(id),
            etag: Some(etag),
            version_number: Some(number),
            values: annotations.values.clone(),
        })
    }

    async fn get_annotations(&self, id: NodeId) -> TesseraResult<Annotations> {
        let row = sqlx::query_as::<_, AnnotationsRow>(
            r#"
            SELECT n.etag, r.number, r.annotations
            FROM nodes n
            JOIN revisions r ON r.owner_node_id = n.id AND r.number = n.current_rev_num
            WHERE n.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.inner())
        .await?;

        row.ok_or_else(|| node_not_found(id))?.into_annotations(id)
    }

    async fn get_annotations_for_version(
        &self,
        id: NodeId,
        version: i64,
    ) -> TesseraResult<Annotations> {
        let row = sqlx::query_as::<_, AnnotationsRow>(
            r#"
            SELECT n.etag, r.number, r.annotations
            FROM nodes n
            JOIN revisions r ON r.owner_node_id = n.id
            WHERE n.id = ? AND r.number = ?
            "#,
        )
        .bind(id)
        .bind(version)
        .fetch_optional(self.pool.inner())
        .await?;

        row.ok_or_else(|| revision_not_found(id, version))?
            .into_annotations(id)
    }

    async fn delete(&self, id: NodeId) -> TesseraResult<bool> {
        debug!("Deleting node {}", id);

        let mut tx = self.pool.begin_write().await?;
        let removed = subtree_ids(&mut *tx, id).await?;
        if removed.is_empty() {
            return Ok(false);
        }

        sqlx::query("DELETE FROM nodes WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for node_id in &removed {
            record_change(
                &mut *tx,
                node_id.into_inner(),
                ObjectType::Entity,
                ChangeType::Delete,
                None,
            )
            .await?;
        }
        tx.commit().await?;

        debug!("Deleted {} nodes under {}", removed.len(), id);
        Ok(true)
    }

    async fn delete_version(&self, id: NodeId, version: i64) -> TesseraResult<()> {
        debug!("Deleting version {} of node {}", version, id);

        let mut tx = self.pool.begin_write().await?;
        lock_for_update(&mut *tx, LockTarget::Node, id.into_inner()).await?;

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM revisions WHERE owner_node_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        let result = sqlx::query("DELETE FROM revisions WHERE owner_node_id = ? AND number = ?")
            .bind(id)
            .bind(version)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(revision_not_found(id, version));
        }
        if count <= 1 {
            return Err(TesseraError::invalid_argument(format!(
                "Cannot delete the only version of node {id}"
            )));
        }

        sqlx::query(
            r#"
            UPDATE nodes
            SET current_rev_num = (SELECT MAX(number) FROM revisions WHERE owner_node_id = nodes.id)
            WHERE id = ?
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let etag = write_new_etag(&mut *tx, LockTarget::Node, id.into_inner()).await?;
        record_change(
            &mut *tx,
            id.into_inner(),
            ObjectType::Entity,
            ChangeType::Update,
            Some(&etag),
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_version_numbers(&self, id: NodeId) -> TesseraResult<Vec<i64>> {
        let numbers: Vec<i64> = sqlx::query_scalar(
            "SELECT number FROM revisions WHERE owner_node_id = ? ORDER BY number DESC",
        )
        .bind(id)
        .fetch_all(self.pool.inner())
        .await?;

        if numbers.is_empty() {
            return Err(node_not_found(id));
        }
        Ok(numbers)
    }

    async fn get_version_count(&self, id: NodeId) -> TesseraResult<u64> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM revisions WHERE owner_node_id = ?")
                .bind(id)
                .fetch_one(self.pool.inner())
                .await?;

        if total == 0 {
            return Err(node_not_found(id));
        }
        Ok(to_count(total))
    }

    async fn get_versions_of_entity(
        &self,
        id: NodeId,
        page: PageRequest,
    ) -> TesseraResult<Page<VersionInfo>> {
        debug!(
            "Finding versions of node {}, page: {}, size: {}",
            id, page.page, page.size
        );

        let total = self.get_version_count(id).await?;
        let rows = sqlx::query_as::<_, VersionRow>(
            r#"
            SELECT owner_node_id, number, label, comment, file_handle_id, modified_by, modified_on
            FROM revisions
            WHERE owner_node_id = ?
            ORDER BY number DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(id)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool.inner())
        .await?;

        let versions = rows.into_iter().map(VersionInfo::from).collect();
        Ok(Page::new(versions, page, total))
    }

    async fn get_children_ids(&self, id: NodeId) -> TesseraResult<Vec<NodeId>> {
        let ids = sqlx::query_scalar("SELECT id FROM nodes WHERE parent_id = ? ORDER BY id")
            .bind(id)
            .fetch_all(self.pool.inner())
            .await?;
        Ok(ids)
    }

    async fn get_children(
        &self,
        id: NodeId,
        page: PageRequest,
    ) -> TesseraResult<Page<EntityHeader>> {
        debug!(
            "Finding children of node {}, page: {}, size: {}",
            id, page.page, page.size
        );

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nodes WHERE parent_id = ?")
            .bind(id)
            .fetch_one(self.pool.inner())
            .await?;

        let rows = sqlx::query_as::<_, HeaderRow>(&format!(
            r#"
            SELECT {HEADER_COLUMNS}
            FROM nodes n
            JOIN revisions r ON r.owner_node_id = n.id AND r.number = n.current_rev_num
            WHERE n.parent_id = ?
            ORDER BY n.name, n.id
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(id)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool.inner())
        .await?;

        let headers = rows
            .into_iter()
            .map(EntityHeader::try_from)
            .collect::<TesseraResult<Vec<_>>>()?;
        Ok(Page::new(headers, page, to_count(total)))
    }

    async fn does_node_have_children(&self, id: NodeId) -> TesseraResult<bool> {
        let result: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM nodes WHERE parent_id = ? LIMIT 1")
                .bind(id)
                .fetch_optional(self.pool.inner())
                .await?;
        Ok(result.is_some())
    }

    async fn get_entity_header_by_child_name(
        &self,
        parent_id: NodeId,
        name: &str,
    ) -> TesseraResult<EntityHeader> {
        debug!("Finding child '{}' of node {}", name, parent_id);

        let row = sqlx::query_as::<_, HeaderRow>(&format!(
            r#"
            SELECT {HEADER_COLUMNS}
            FROM nodes n
            JOIN revisions r ON r.owner_node_id = n.id AND r.number = n.current_rev_num
            WHERE n.parent_id = ? AND n.name = ?
            "#
        ))
        .bind(parent_id)
        .bind(name)
        .fetch_optional(self.pool.inner())
        .await?;

        row.map(EntityHeader::try_from)
            .transpose()?
            .ok_or_else(|| TesseraError::not_found("Node", format!("{parent_id}/{name}")))
    }

    async fn get_parent_id(&self, id: NodeId) -> TesseraResult<Option<NodeId>> {
        let parent: Option<Option<NodeId>> =
            sqlx::query_scalar("SELECT parent_id FROM nodes WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool.inner())
                .await?;
        parent.ok_or_else(|| node_not_found(id))
    }

    async fn change_node_parent(&self, id: NodeId, new_parent_id: NodeId) -> TesseraResult<bool> {
        debug!("Moving node {} under {}", id, new_parent_id);

        let mut tx = self.pool.begin_write().await?;
        lock_for_update(&mut *tx, LockTarget::Node, id.into_inner()).await?;

        let (parent_id, node_type, project_id): (Option<NodeId>, String, Option<NodeId>) =
            sqlx::query_as("SELECT parent_id, node_type, project_id FROM nodes WHERE id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        let Some(parent_id) = parent_id else {
            return Err(TesseraError::invalid_argument(format!("Root node {id} cannot be moved")));
        };
        if parent_id == new_parent_id {
            return Ok(false);
        }

        let target: Option<(String, Option<NodeId>)> =
            sqlx::query_as("SELECT node_type, project_id FROM nodes WHERE id = ?")
                .bind(new_parent_id)
                .fetch_optional(&mut *tx)
                .await?;
        let (target_type, target_project) = target.ok_or_else(|| node_not_found(new_parent_id))?;
        let target_type: NodeType = target_type.parse()?;
        if !target_type.is_container() {
            return Err(TesseraError::invalid_argument(format!(
                "Node {new_parent_id} is a {target_type} and cannot have children"
            )));
        }

        let ancestors: Vec<NodeId> = sqlx::query_scalar(&format!("{PATH_CTE} SELECT id FROM path"))
            .bind(new_parent_id)
            .fetch_all(&mut *tx)
            .await?;
        if ancestors.contains(&id) {
            return Err(TesseraError::invalid_argument(format!(
                "Cannot move node {id} into its own subtree"
            )));
        }

        sqlx::query("UPDATE nodes SET parent_id = ? WHERE id = ?")
            .bind(new_parent_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        // A project outside any project becomes its own project.
        let node_type: NodeType = node_type.parse()?;
        let desired_project = match target_project {
            None if node_type.is_project() => Some(id),
            project => project,
        };
        if desired_project != project_id {
            let rewritten = sqlx::query(&format!(
                r#"
                {SUBTREE_CTE}
                UPDATE nodes
                SET project_id = ?, etag = lower(hex(randomblob(16)))
                WHERE id IN (SELECT id FROM subtree)
                "#
            ))
            .bind(id)
            .bind(desired_project)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            debug!("Moved {} nodes under {} to project {:?}", rewritten, id, desired_project);
        }

        let etag = write_new_etag(&mut *tx, LockTarget::Node, id.into_inner()).await?;
        record_change(
            &mut *tx,
            id.into_inner(),
            ObjectType::Entity,
            ChangeType::Update,
            Some(&etag),
        )
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn get_entity_path(&self, id: NodeId) -> TesseraResult<Vec<EntityHeader>> {
        debug!("Finding path of node {}", id);

        let rows = sqlx::query_as::<_, HeaderRow>(&format!(
            r#"
            {PATH_CTE}
            SELECT {HEADER_COLUMNS}
            FROM path p
            JOIN nodes n ON n.id = p.id
            JOIN revisions r ON r.owner_node_id = n.id AND r.number = n.current_rev_num
            ORDER BY p.depth DESC
            "#
        ))
        .bind(id)
        .fetch_all(self.pool.inner())
        .await?;

        if rows.is_empty() {
            return Err(node_not_found(id));
        }
        rows.into_iter().map(EntityHeader::try_from).collect()
    }

    async fn get_node_id_for_path(&self, path: &str) -> TesseraResult<Option<NodeId>> {
        debug!("Resolving path: {}", path);

        let names: Vec<&str> = path
            .split('/')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();
        if names.is_empty() {
            return Ok(None);
        }

        let mut conn = self.pool.inner().acquire().await?;
        let mut current: Option<NodeId> = None;
        for name in names {
            let ids: Vec<NodeId> =
                sqlx::query_scalar("SELECT id FROM nodes WHERE parent_id IS ? AND name = ?")
                    .bind(current)
                    .bind(name)
                    .fetch_all(&mut *conn)
                    .await?;
            match ids.as_slice() {
                [] => return Ok(None),
                [id] => current = Some(*id),
                _ => {
                    return Err(TesseraError::internal(format!(
                        "Found more than one node with path {path}"
                    )))
                }
            }
        }
        Ok(current)
    }

    async fn get_all_container_ids(&self, id: NodeId) -> TesseraResult<Vec<NodeId>> {
        let ids: Vec<NodeId> = sqlx::query_scalar(
            r#"
            WITH RECURSIVE containers(id, depth) AS (
                SELECT id, 0 FROM nodes WHERE id = ?
                UNION ALL
                SELECT n.id, c.depth + 1
                FROM nodes n
                JOIN containers c ON n.parent_id = c.id
                WHERE n.node_type IN (?, ?)
            )
            SELECT id FROM containers ORDER BY depth, id
            "#,
        )
        .bind(id)
        .bind(NodeType::Project.as_str())
        .bind(NodeType::Folder.as_str())
        .fetch_all(self.pool.inner())
        .await?;

        if ids.is_empty() {
            return Err(node_not_found(id));
        }
        Ok(ids)
    }

    async fn get_benefactor(&self, id: NodeId) -> TesseraResult<NodeId> {
        let path: Vec<(NodeId, bool)> = sqlx::query_as(&format!(
            r#"
            {PATH_CTE}
            SELECT p.id,
                   EXISTS (SELECT 1 FROM acls a WHERE a.owner_id = p.id AND a.owner_type = ?) AS has_acl
            FROM path p
            ORDER BY p.depth
            "#
        ))
        .bind(id)
        .bind(ObjectType::Entity.as_str())
        .fetch_all(self.pool.inner())
        .await?;

        let benefactor = path
            .iter()
            .find(|(_, has_acl)| *has_acl)
            .or_else(|| path.last())
            .map(|(node_id, _)| *node_id);
        benefactor.ok_or_else(|| node_not_found(id))
    }

    async fn get_project_id(&self, id: NodeId) -> TesseraResult<Option<NodeId>> {
        let project: Option<Option<NodeId>> =
            sqlx::query_scalar("SELECT project_id FROM nodes WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool.inner())
                .await?;
        project.ok_or_else(|| node_not_found(id))
    }

    async fn get_node_type(&self, id: NodeId) -> TesseraResult<NodeType> {
        let node_type: Option<String> =
            sqlx::query_scalar("SELECT node_type FROM nodes WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool.inner())
                .await?;
        node_type.ok_or_else(|| node_not_found(id))?.parse()
    }

    async fn get_created_by(&self, id: NodeId) -> TesseraResult<PrincipalId> {
        let created_by: Option<PrincipalId> =
            sqlx::query_scalar("SELECT created_by FROM nodes WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool.inner())
                .await?;
        created_by.ok_or_else(|| node_not_found(id))
    }

    async fn get_current_revision_number(&self, id: NodeId) -> TesseraResult<i64> {
        let mut conn = self.pool.inner().acquire().await?;
        current_revision(&mut *conn, id).await
    }

    async fn get_activity_id(
        &self,
        id: NodeId,
        version: Option<i64>,
    ) -> TesseraResult<Option<String>> {
        let mut conn = self.pool.inner().acquire().await?;
        let version = match version {
            Some(version) => version,
            None => current_revision(&mut *conn, id).await?,
        };

        let activity: Option<Option<String>> =
            sqlx::query_scalar("SELECT activity_id FROM revisions WHERE owner_node_id = ? AND number = ?")
                .bind(id)
                .bind(version)
                .fetch_optional(&mut *conn)
                .await?;
        activity.ok_or_else(|| revision_not_found(id, version))
    }

    async fn get_file_handle_id_for_version(
        &self,
        id: NodeId,
        version: Option<i64>,
    ) -> TesseraResult<Option<String>> {
        let mut conn = self.pool.inner().acquire().await?;
        let version = match version {
            Some(version) => version,
            None => current_revision(&mut *conn, id).await?,
        };

        let handle: Option<Option<String>> =
            sqlx::query_scalar("SELECT file_handle_id FROM revisions WHERE owner_node_id = ? AND number = ?")
                .bind(id)
                .bind(version)
                .fetch_optional(&mut *conn)
                .await?;
        Ok(handle.flatten())
    }

    async fn is_node_root(&self, id: NodeId) -> TesseraResult<bool> {
        Ok(self.get_parent_id(id).await?.is_none())
    }

    async fn is_nodes_parent_root(&self, id: NodeId) -> TesseraResult<bool> {
        let result: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT n.parent_id IS NOT NULL AND p.parent_id IS NULL
            FROM nodes n
            LEFT JOIN nodes p ON p.id = n.parent_id
            WHERE n.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.inner())
        .await?;
        result.ok_or_else(|| node_not_found(id))
    }

    async fn does_node_exist(&self, id: NodeId) -> TesseraResult<bool> {
        let mut conn = self.pool.inner().acquire().await?;
        node_exists(&mut *conn, id).await
    }

    async fn does_node_revision_exist(&self, id: NodeId, version: i64) -> TesseraResult<bool> {
        let result: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM revisions WHERE owner_node_id = ? AND number = ?")
                .bind(id)
                .bind(version)
                .fetch_optional(self.pool.inner())
                .await?;
        Ok(result.is_some())
    }

    async fn get_count(&self) -> TesseraResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nodes")
            .fetch_one(self.pool.inner())
            .await?;
        Ok(to_count(total))
    }

    async fn get_node_id_by_alias(&self, alias: &str) -> TesseraResult<NodeId> {
        debug!("Finding node by alias: {}", alias);

        let id: Option<NodeId> = sqlx::query_scalar("SELECT id FROM nodes WHERE alias = ?")
            .bind(alias)
            .fetch_optional(self.pool.inner())
            .await?;
        id.ok_or_else(|| TesseraError::not_found("Node", alias))
    }

    async fn get_entity_header(
        &self,
        id: NodeId,
        version: Option<i64>,
    ) -> TesseraResult<EntityHeader> {
        let row = sqlx::query_as::<_, HeaderRow>(&format!(
            r#"
            SELECT {HEADER_COLUMNS}
            FROM nodes n
            JOIN revisions r ON r.owner_node_id = n.id AND r.number = COALESCE(?, n.current_rev_num)
            WHERE n.id = ?
            "#
        ))
        .bind(version)
        .bind(id)
        .fetch_optional(self.pool.inner())
        .await?;

        match (row, version) {
            (Some(row), _) => EntityHeader::try_from(row),
            (None, Some(version)) => Err(revision_not_found(id, version)),
            (None, None) => Err(node_not_found(id)),
        }
    }

    async fn get_entity_headers(&self, ids: &[NodeId]) -> TesseraResult<Vec<EntityHeader>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            r#"
            SELECT {HEADER_COLUMNS}
            FROM nodes n
            JOIN revisions r ON r.owner_node_id = n.id AND r.number = n.current_rev_num
            WHERE n.id IN "#
        ));
        push_in_list(&mut builder, ids.iter().copied());
        let rows = builder
            .build_query_as::<HeaderRow>()
            .fetch_all(self.pool.inner())
            .await?;

        let mut by_id: HashMap<NodeId, EntityHeader> = rows
            .into_iter()
            .map(|row| EntityHeader::try_from(row).map(|header| (header.id, header)))
            .collect::<TesseraResult<_>>()?;
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }
}
