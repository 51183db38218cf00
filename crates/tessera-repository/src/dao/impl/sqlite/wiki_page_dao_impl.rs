//! SQLite implementation of WikiPageDao.
//!
//! `wiki_pages` holds the current shape of the tree, `wiki_markdown` one row
//! per markdown version and `wiki_owners` the root page of each owner object.
//! Every page stores the id of its tree's root so ownership checks need no
//! recursion.

use super::record_change;
use super::support::to_count;
use crate::dao::WikiPageDao;
use crate::locking::{
    check_etag, check_resource_etag, lock_for_update, required_etag, write_new_etag, LockTarget,
};
use crate::DatabasePoolInterface;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shaku::Component;
use sqlx::{FromRow, SqliteConnection};
use std::sync::Arc;
use tessera_core::{
    ChangeType, Etag, ObjectType, Page, PageRequest, PrincipalId, TesseraError, TesseraResult,
    ValidateExt, WikiHeader, WikiHistorySnapshot, WikiId, WikiOrderHint, WikiPage, WikiPageKey,
};
use tracing::debug;

/// SQLite-backed wiki pages.
#[derive(Component, Clone)]
#[shaku(interface = WikiPageDao)]
pub struct SqliteWikiPageDaoImpl {
    #[shaku(inject)]
    pool: Arc<dyn DatabasePoolInterface>,
}

impl SqliteWikiPageDaoImpl {
    #[must_use]
    pub fn new(pool: Arc<dyn DatabasePoolInterface>) -> Self {
        Self { pool }
    }
}

impl std::fmt::Debug for SqliteWikiPageDaoImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteWikiPageDaoImpl").finish()
    }
}

const OWNER_RESOURCE: &str = "WikiOwner";

#[derive(Debug, FromRow)]
struct WikiPageRow {
    id: WikiId,
    etag: Etag,
    created_by: PrincipalId,
    created_on: DateTime<Utc>,
    parent_id: Option<WikiId>,
    markdown_version: i64,
    title: String,
    markdown: String,
    attachments: Vec<u8>,
    modified_by: PrincipalId,
    modified_on: DateTime<Utc>,
}

impl TryFrom<WikiPageRow> for WikiPage {
    type Error = TesseraError;

    fn try_from(row: WikiPageRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Some(row.id),
            etag: Some(row.etag),
            title: row.title,
            created_by: row.created_by,
            created_on: Some(row.created_on),
            modified_by: row.modified_by,
            modified_on: Some(row.modified_on),
            parent_wiki_id: row.parent_id,
            markdown: row.markdown,
            attachment_file_handle_ids: serde_json::from_slice(&row.attachments)?,
            markdown_version: row.markdown_version,
        })
    }
}

#[derive(Debug, FromRow)]
struct HeaderRow {
    id: WikiId,
    title: String,
    parent_id: Option<WikiId>,
}

#[derive(Debug, FromRow)]
struct SnapshotRow {
    version: i64,
    title: String,
    modified_by: PrincipalId,
    modified_on: DateTime<Utc>,
}

fn page_not_found(key: &WikiPageKey) -> TesseraError {
    TesseraError::not_found("WikiPage", key)
}

fn owner_not_found(owner_id: i64, owner_type: ObjectType) -> TesseraError {
    TesseraError::not_found(OWNER_RESOURCE, format!("{owner_type}/{owner_id}"))
}

/// Fails with `NotFound` unless the page exists in the key owner's tree.
async fn check_key(conn: &mut SqliteConnection, key: &WikiPageKey) -> TesseraResult<()> {
    let found: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT 1
        FROM wiki_pages p
        JOIN wiki_owners o ON o.root_wiki_id = p.root_id
        WHERE p.id = ? AND o.owner_id = ? AND o.owner_type = ?
        "#,
    )
    .bind(key.wiki_id)
    .bind(key.owner_id)
    .bind(key.owner_type.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    found.map(|_| ()).ok_or_else(|| page_not_found(key))
}

async fn fetch_page(
    conn: &mut SqliteConnection,
    key: &WikiPageKey,
    version: Option<i64>,
) -> TesseraResult<WikiPage> {
    let row = sqlx::query_as::<_, WikiPageRow>(
        r#"
        SELECT p.id, p.etag, p.created_by, p.created_on, p.parent_id, m.version AS markdown_version,
               m.title, m.markdown, m.attachments, m.modified_by, m.modified_on
        FROM wiki_pages p
        JOIN wiki_owners o ON o.root_wiki_id = p.root_id
        JOIN wiki_markdown m ON m.wiki_id = p.id AND m.version = COALESCE(?, p.markdown_version)
        WHERE p.id = ? AND o.owner_id = ? AND o.owner_type = ?
        "#,
    )
    .bind(version)
    .bind(key.wiki_id)
    .bind(key.owner_id)
    .bind(key.owner_type.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    match (row, version) {
        (Some(row), _) => WikiPage::try_from(row),
        (None, Some(version)) => {
            Err(TesseraError::not_found("WikiPage", format!("{key}@{version}")))
        }
        (None, None) => Err(page_not_found(key)),
    }
}

async fn insert_markdown(
    conn: &mut SqliteConnection,
    wiki_id: WikiId,
    version: i64,
    page: &WikiPage,
    modified_on: DateTime<Utc>,
) -> TesseraResult<()> {
    sqlx::query(
        r#"
        INSERT INTO wiki_markdown (wiki_id, version, title, markdown, attachments, modified_by, modified_on)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(wiki_id)
    .bind(version)
    .bind(&page.title)
    .bind(&page.markdown)
    .bind(serde_json::to_vec(&page.attachment_file_handle_ids)?)
    .bind(page.modified_by)
    .bind(modified_on)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Ancestors-or-self of a page, nearest first.
async fn ancestors(conn: &mut SqliteConnection, wiki_id: WikiId) -> TesseraResult<Vec<WikiId>> {
    let ids = sqlx::query_scalar(
        r#"
        WITH RECURSIVE path(id, depth) AS (
            SELECT id, 0 FROM wiki_pages WHERE id = ?
            UNION ALL
            SELECT p.parent_id, path.depth + 1
            FROM wiki_pages p
            JOIN path ON p.id = path.id
            WHERE p.parent_id IS NOT NULL
        )
        SELECT id FROM path ORDER BY depth
        "#,
    )
    .bind(wiki_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids)
}

#[async_trait]
impl WikiPageDao for SqliteWikiPageDaoImpl {
    async fn create(
        &self,
        page: &WikiPage,
        owner_id: i64,
        owner_type: ObjectType,
    ) -> TesseraResult<WikiPage> {
        debug!("Creating wiki page '{}' for {} {}", page.title, owner_type, owner_id);
        page.validate_model()?;

        let mut tx = self.pool.begin_write().await?;
        let root: Option<WikiId> =
            sqlx::query_scalar("SELECT root_wiki_id FROM wiki_owners WHERE owner_id = ? AND owner_type = ?")
                .bind(owner_id)
                .bind(owner_type.as_str())
                .fetch_optional(&mut *tx)
                .await?;

        let root_id = match (page.parent_wiki_id, root) {
            (None, Some(_)) => {
                return Err(TesseraError::name_conflict(format!(
                    "{owner_type} {owner_id} already has a root wiki page"
                )))
            }
            (Some(_), None) => return Err(owner_not_found(owner_id, owner_type)),
            (Some(parent_id), Some(root)) => {
                let parent_root: Option<WikiId> =
                    sqlx::query_scalar("SELECT root_id FROM wiki_pages WHERE id = ?")
                        .bind(parent_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                match parent_root {
                    None => return Err(TesseraError::not_found("WikiPage", parent_id)),
                    Some(parent_root) if parent_root != root => {
                        return Err(TesseraError::invalid_argument(format!(
                            "Parent wiki page {parent_id} belongs to another owner"
                        )))
                    }
                    Some(parent_root) => Some(parent_root),
                }
            }
            (None, None) => None,
        };

        let now = Utc::now();
        let etag = Etag::generate();
        let id = sqlx::query(
            r#"
            INSERT INTO wiki_pages (etag, title, created_by, created_on, modified_by, modified_on,
                                    parent_id, root_id, markdown_version)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(&etag)
        .bind(&page.title)
        .bind(page.created_by)
        .bind(page.created_on.unwrap_or(now))
        .bind(page.modified_by)
        .bind(now)
        .bind(page.parent_wiki_id)
        .bind(root_id.unwrap_or(WikiId::new(0)))
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();
        let id = WikiId::new(id);

        if root_id.is_none() {
            sqlx::query("UPDATE wiki_pages SET root_id = id WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO wiki_owners (owner_id, owner_type, root_wiki_id, etag) VALUES (?, ?, ?, ?)",
            )
            .bind(owner_id)
            .bind(owner_type.as_str())
            .bind(id)
            .bind(Etag::generate())
            .execute(&mut *tx)
            .await?;
        }

        insert_markdown(&mut *tx, id, 0, page, now).await?;
        record_change(
            &mut *tx,
            id.into_inner(),
            ObjectType::Wiki,
            ChangeType::Create,
            Some(&etag),
        )
        .await?;
        let created =
            fetch_page(&mut *tx, &WikiPageKey::new(owner_id, owner_type, id), None).await?;
        tx.commit().await?;

        debug!("Created wiki page {}", id);
        Ok(created)
    }

    async fn update_wiki_page(
        &self,
        key: &WikiPageKey,
        page: &WikiPage,
    ) -> TesseraResult<WikiPage> {
        debug!("Updating wiki page {}", key);
        page.validate_model()?;
        let supplied = required_etag(page.etag.as_ref(), LockTarget::WikiPage)?;

        let mut tx = self.pool.begin_write().await?;
        check_key(&mut *tx, key).await?;
        let current =
            lock_for_update(&mut *tx, LockTarget::WikiPage, key.wiki_id.into_inner()).await?;
        check_etag(LockTarget::WikiPage, key, &current, supplied)?;

        let (parent_id, root_id, version): (Option<WikiId>, WikiId, i64) =
            sqlx::query_as("SELECT parent_id, root_id, markdown_version FROM wiki_pages WHERE id = ?")
                .bind(key.wiki_id)
                .fetch_one(&mut *tx)
                .await?;

        if page.parent_wiki_id != parent_id {
            let Some(new_parent) = page.parent_wiki_id else {
                return Err(TesseraError::invalid_argument(format!(
                    "Wiki page {key} cannot become a root page"
                )));
            };
            if parent_id.is_none() {
                return Err(TesseraError::invalid_argument(format!(
                    "Root wiki page {key} cannot have a parent"
                )));
            }
            let parent_root: Option<WikiId> =
                sqlx::query_scalar("SELECT root_id FROM wiki_pages WHERE id = ?")
                    .bind(new_parent)
                    .fetch_optional(&mut *tx)
                    .await?;
            if parent_root != Some(root_id) {
                return Err(TesseraError::invalid_argument(format!(
                    "Parent wiki page {new_parent} is not in the same wiki tree"
                )));
            }
            if ancestors(&mut *tx, new_parent).await?.contains(&key.wiki_id) {
                return Err(TesseraError::invalid_argument(format!(
                    "Moving wiki page {key} under {new_parent} would create a cycle"
                )));
            }
        }

        let now = Utc::now();
        let next_version = version + 1;
        sqlx::query(
            r#"
            UPDATE wiki_pages
            SET title = ?, modified_by = ?, modified_on = ?, parent_id = ?, markdown_version = ?
            WHERE id = ?
            "#,
        )
        .bind(&page.title)
        .bind(page.modified_by)
        .bind(now)
        .bind(page.parent_wiki_id)
        .bind(next_version)
        .bind(key.wiki_id)
        .execute(&mut *tx)
        .await?;
        insert_markdown(&mut *tx, key.wiki_id, next_version, page, now).await?;

        let etag = write_new_etag(&mut *tx, LockTarget::WikiPage, key.wiki_id.into_inner()).await?;
        record_change(
            &mut *tx,
            key.wiki_id.into_inner(),
            ObjectType::Wiki,
            ChangeType::Update,
            Some(&etag),
        )
        .await?;
        let updated = fetch_page(&mut *tx, key, None).await?;
        tx.commit().await?;

        Ok(updated)
    }

    async fn get(&self, key: &WikiPageKey, version: Option<i64>) -> TesseraResult<WikiPage> {
        debug!("Finding wiki page {} at version {:?}", key, version);

        let mut conn = self.pool.inner().acquire().await?;
        fetch_page(&mut *conn, key, version).await
    }

    async fn get_root_wiki(&self, owner_id: i64, owner_type: ObjectType) -> TesseraResult<WikiId> {
        let root: Option<WikiId> =
            sqlx::query_scalar("SELECT root_wiki_id FROM wiki_owners WHERE owner_id = ? AND owner_type = ?")
                .bind(owner_id)
                .bind(owner_type.as_str())
                .fetch_optional(self.pool.inner())
                .await?;
        root.ok_or_else(|| owner_not_found(owner_id, owner_type))
    }

    async fn lookup_wiki_key(&self, wiki_id: WikiId) -> TesseraResult<WikiPageKey> {
        let owner: Option<(i64, String)> = sqlx::query_as(
            r#"
            SELECT o.owner_id, o.owner_type
            FROM wiki_pages p
            JOIN wiki_owners o ON o.root_wiki_id = p.root_id
            WHERE p.id = ?
            "#,
        )
        .bind(wiki_id)
        .fetch_optional(self.pool.inner())
        .await?;

        let (owner_id, owner_type) =
            owner.ok_or_else(|| TesseraError::not_found("WikiPage", wiki_id))?;
        Ok(WikiPageKey::new(owner_id, owner_type.parse()?, wiki_id))
    }

    async fn get_count(&self) -> TesseraResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wiki_pages")
            .fetch_one(self.pool.inner())
            .await?;
        Ok(to_count(total))
    }

    async fn get_header_tree(
        &self,
        owner_id: i64,
        owner_type: ObjectType,
        page: PageRequest,
    ) -> TesseraResult<Page<WikiHeader>> {
        debug!(
            "Finding wiki headers of {} {}, page: {}, size: {}",
            owner_type, owner_id, page.page, page.size
        );

        let root = self.get_root_wiki(owner_id, owner_type).await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wiki_pages WHERE root_id = ?")
            .bind(root)
            .fetch_one(self.pool.inner())
            .await?;

        let rows = sqlx::query_as::<_, HeaderRow>(
            r#"
            SELECT id, title, parent_id
            FROM wiki_pages
            WHERE root_id = ?
            ORDER BY parent_id, title, id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(root)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(self.pool.inner())
        .await?;

        let headers = rows
            .into_iter()
            .map(|row| WikiHeader {
                id: row.id,
                title: row.title,
                parent_id: row.parent_id,
            })
            .collect();
        Ok(Page::new(headers, page, to_count(total)))
    }

    async fn get_wiki_history(
        &self,
        key: &WikiPageKey,
        page: PageRequest,
    ) -> TesseraResult<Page<WikiHistorySnapshot>> {
        debug!(
            "Finding history of wiki page {}, page: {}, size: {}",
            key, page.page, page.size
        );

        let mut conn = self.pool.inner().acquire().await?;
        check_key(&mut *conn, key).await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wiki_markdown WHERE wiki_id = ?")
            .bind(key.wiki_id)
            .fetch_one(&mut *conn)
            .await?;

        let rows = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT version, title, modified_by, modified_on
            FROM wiki_markdown
            WHERE wiki_id = ?
            ORDER BY version DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(key.wiki_id)
        .bind(page.sql_limit())
        .bind(page.sql_offset())
        .fetch_all(&mut *conn)
        .await?;

        let snapshots = rows
            .into_iter()
            .map(|row| WikiHistorySnapshot {
                version: row.version,
                title: row.title,
                modified_by: row.modified_by,
                modified_on: row.modified_on,
            })
            .collect();
        Ok(Page::new(snapshots, page, to_count(total)))
    }

    async fn get_number_of_versions(&self, key: &WikiPageKey) -> TesseraResult<u64> {
        let mut conn = self.pool.inner().acquire().await?;
        check_key(&mut *conn, key).await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wiki_markdown WHERE wiki_id = ?")
            .bind(key.wiki_id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(to_count(total))
    }

    async fn delete_wiki_versions(
        &self,
        key: &WikiPageKey,
        min_version_to_keep: i64,
    ) -> TesseraResult<u64> {
        debug!(
            "Deleting versions of wiki page {} below {}",
            key, min_version_to_keep
        );

        let mut tx = self.pool.begin_write().await?;
        check_key(&mut *tx, key).await?;

        let removed = sqlx::query(
            r#"
            DELETE FROM wiki_markdown
            WHERE wiki_id = ?
              AND version < ?
              AND version < (SELECT markdown_version FROM wiki_pages WHERE id = ?)
            "#,
        )
        .bind(key.wiki_id)
        .bind(min_version_to_keep)
        .bind(key.wiki_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if removed > 0 {
            record_change(
                &mut *tx,
                key.wiki_id.into_inner(),
                ObjectType::Wiki,
                ChangeType::Update,
                None,
            )
            .await?;
        }
        tx.commit().await?;
        Ok(removed)
    }

    async fn get_order_hint(
        &self,
        owner_id: i64,
        owner_type: ObjectType,
    ) -> TesseraResult<WikiOrderHint> {
        let row: Option<(Option<Vec<u8>>, Etag)> =
            sqlx::query_as("SELECT order_hint, etag FROM wiki_owners WHERE owner_id = ? AND owner_type = ?")
                .bind(owner_id)
                .bind(owner_type.as_str())
                .fetch_optional(self.pool.inner())
                .await?;

        let (blob, etag) = row.ok_or_else(|| owner_not_found(owner_id, owner_type))?;
        let id_list = match blob {
            Some(blob) => serde_json::from_slice(&blob)?,
            None => Vec::new(),
        };
        Ok(WikiOrderHint {
            owner_id,
            owner_type,
            id_list,
            etag: Some(etag),
        })
    }

    async fn update_order_hint(&self, hint: &WikiOrderHint) -> TesseraResult<WikiOrderHint> {
        debug!("Updating wiki order hint of {} {}", hint.owner_type, hint.owner_id);
        let supplied = hint
            .etag
            .as_ref()
            .ok_or_else(|| {
                TesseraError::invalid_model(format!("{OWNER_RESOURCE} etag is required for an update"))
            })?;
        let owner = format!("{}/{}", hint.owner_type, hint.owner_id);

        let mut tx = self.pool.begin_write().await?;
        let touched =
            sqlx::query("UPDATE wiki_owners SET etag = etag WHERE owner_id = ? AND owner_type = ?")
                .bind(hint.owner_id)
                .bind(hint.owner_type.as_str())
                .execute(&mut *tx)
                .await?
                .rows_affected();
        if touched == 0 {
            return Err(owner_not_found(hint.owner_id, hint.owner_type));
        }

        let (current, root): (Etag, WikiId) =
            sqlx::query_as("SELECT etag, root_wiki_id FROM wiki_owners WHERE owner_id = ? AND owner_type = ?")
                .bind(hint.owner_id)
                .bind(hint.owner_type.as_str())
                .fetch_one(&mut *tx)
                .await?;
        check_resource_etag(OWNER_RESOURCE, &owner, &current, supplied)?;

        let etag = Etag::generate();
        sqlx::query("UPDATE wiki_owners SET order_hint = ?, etag = ? WHERE owner_id = ? AND owner_type = ?")
            .bind(serde_json::to_vec(&hint.id_list)?)
            .bind(&etag)
            .bind(hint.owner_id)
            .bind(hint.owner_type.as_str())
            .execute(&mut *tx)
            .await?;

        record_change(
            &mut *tx,
            root.into_inner(),
            ObjectType::Wiki,
            ChangeType::Update,
            None,
        )
        .await?;
        tx.commit().await?;

        Ok(WikiOrderHint {
            owner_id: hint.owner_id,
            owner_type: hint.owner_type,
            id_list: hint.id_list.clone(),
            etag: Some(etag),
        })
    }

    async fn delete(&self, key: &WikiPageKey) -> TesseraResult<()> {
        debug!("Deleting wiki page {}", key);

        let mut tx = self.pool.begin_write().await?;
        check_key(&mut *tx, key).await?;

        let removed: Vec<WikiId> = sqlx::query_scalar(
            r#"
            WITH RECURSIVE subtree(id) AS (
                SELECT id FROM wiki_pages WHERE id = ?
                UNION ALL
                SELECT p.id FROM wiki_pages p JOIN subtree s ON p.parent_id = s.id
            )
            SELECT id FROM subtree
            "#,
        )
        .bind(key.wiki_id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM wiki_pages WHERE id = ?")
            .bind(key.wiki_id)
            .execute(&mut *tx)
            .await?;

        for wiki_id in &removed {
            record_change(
                &mut *tx,
                wiki_id.into_inner(),
                ObjectType::Wiki,
                ChangeType::Delete,
                None,
            )
            .await?;
        }
        tx.commit().await?;

        debug!("Deleted {} wiki pages under {}", removed.len(), key);
        Ok(())
    }
}
