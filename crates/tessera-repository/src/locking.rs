//! Etag-based optimistic locking.
//!
//! Every updater runs the same protocol inside one transaction:
//!
//! 1. lock the row by primary key ([`lock_for_update`]),
//! 2. compare the stored etag with the caller's ([`check_etag`]),
//! 3. apply the caller's changes,
//! 4. store a freshly generated etag,
//! 5. return the updated entity.
//!
//! SQLite has no `SELECT ... FOR UPDATE`. Locking performs a no-op
//! self-assignment `UPDATE` on the row instead, which takes the database
//! write lock for the rest of the transaction and reports whether the row
//! exists. Concurrent writers wait for the busy timeout.

use sqlx::SqliteConnection;
use tessera_core::{Etag, TesseraError, TesseraResult};
use tracing::{debug, warn};

/// Tables whose rows carry an etag and a single-column integer key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTarget {
    Node,
    UserGroup,
    Team,
    Acl,
    AccessRequirement,
    AccessApproval,
    WikiPage,
}

impl LockTarget {
    /// Resource name used in not-found errors.
    #[must_use]
    pub const fn resource(self) -> &'static str {
        match self {
            Self::Node => "Node",
            Self::UserGroup => "UserGroup",
            Self::Team => "Team",
            Self::Acl => "AccessControlList",
            Self::AccessRequirement => "AccessRequirement",
            Self::AccessApproval => "AccessApproval",
            Self::WikiPage => "WikiPage",
        }
    }

    const fn touch_sql(self) -> &'static str {
        match self {
            Self::Node => "UPDATE nodes SET etag = etag WHERE id = ?",
            Self::UserGroup => "UPDATE user_groups SET etag = etag WHERE id = ?",
            Self::Team => "UPDATE teams SET etag = etag WHERE id = ?",
            Self::Acl => "UPDATE acls SET etag = etag WHERE id = ?",
            Self::AccessRequirement => "UPDATE access_requirements SET etag = etag WHERE id = ?",
            Self::AccessApproval => "UPDATE access_approvals SET etag = etag WHERE id = ?",
            Self::WikiPage => "UPDATE wiki_pages SET etag = etag WHERE id = ?",
        }
    }

    const fn select_sql(self) -> &'static str {
        match self {
            Self::Node => "SELECT etag FROM nodes WHERE id = ?",
            Self::UserGroup => "SELECT etag FROM user_groups WHERE id = ?",
            Self::Team => "SELECT etag FROM teams WHERE id = ?",
            Self::Acl => "SELECT etag FROM acls WHERE id = ?",
            Self::AccessRequirement => "SELECT etag FROM access_requirements WHERE id = ?",
            Self::AccessApproval => "SELECT etag FROM access_approvals WHERE id = ?",
            Self::WikiPage => "SELECT etag FROM wiki_pages WHERE id = ?",
        }
    }

    const fn write_sql(self) -> &'static str {
        match self {
            Self::Node => "UPDATE nodes SET etag = ? WHERE id = ?",
            Self::UserGroup => "UPDATE user_groups SET etag = ? WHERE id = ?",
            Self::Team => "UPDATE teams SET etag = ? WHERE id = ?",
            Self::Acl => "UPDATE acls SET etag = ? WHERE id = ?",
            Self::AccessRequirement => "UPDATE access_requirements SET etag = ? WHERE id = ?",
            Self::AccessApproval => "UPDATE access_approvals SET etag = ? WHERE id = ?",
            Self::WikiPage => "UPDATE wiki_pages SET etag = ? WHERE id = ?",
        }
    }
}

/// Locks the row and returns its current etag.
///
/// Fails with `NotFound` when the row does not exist.
pub async fn lock_for_update(
    conn: &mut SqliteConnection,
    target: LockTarget,
    id: i64,
) -> TesseraResult<Etag> {
    let touched = sqlx::query(target.touch_sql())
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if touched == 0 {
        return Err(TesseraError::not_found(target.resource(), id));
    }

    let etag: Etag = sqlx::query_scalar(target.select_sql())
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    debug!("Locked {} {} at etag {}", target.resource(), id, etag);
    Ok(etag)
}

/// Fails with `ConflictingUpdate` unless `supplied` equals `current`.
pub fn check_etag(
    target: LockTarget,
    id: impl std::fmt::Display,
    current: &Etag,
    supplied: &Etag,
) -> TesseraResult<()> {
    check_resource_etag(target.resource(), id, current, supplied)
}

/// [`check_etag`] for rows that are not keyed by a single id.
pub fn check_resource_etag(
    resource: &str,
    id: impl std::fmt::Display,
    current: &Etag,
    supplied: &Etag,
) -> TesseraResult<()> {
    if current == supplied {
        return Ok(());
    }
    warn!(
        "Etag mismatch on {} {}: stored {}, supplied {}",
        resource, id, current, supplied
    );
    Err(TesseraError::conflicting_update(format!(
        "{resource} {id} was updated since you last fetched it, retrieve it again and reapply the update"
    )))
}

/// Stores a fresh etag on an already locked row and returns it.
pub async fn write_new_etag(
    conn: &mut SqliteConnection,
    target: LockTarget,
    id: i64,
) -> TesseraResult<Etag> {
    let etag = Etag::generate();
    sqlx::query(target.write_sql())
        .bind(&etag)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(etag)
}

/// Locks the row, checks `supplied` when given, and stores a fresh etag.
pub async fn lock_and_increment_etag(
    conn: &mut SqliteConnection,
    target: LockTarget,
    id: i64,
    supplied: Option<&Etag>,
) -> TesseraResult<Etag> {
    let current = lock_for_update(conn, target, id).await?;
    if let Some(supplied) = supplied {
        check_etag(target, id, &current, supplied)?;
    }
    write_new_etag(conn, target, id).await
}

/// Unwraps the etag a caller must supply for an update.
pub fn required_etag(etag: Option<&Etag>, target: LockTarget) -> TesseraResult<&Etag> {
    etag.ok_or_else(|| {
        TesseraError::invalid_model(format!("{} etag is required for an update", target.resource()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_etag_matches() {
        let etag = Etag::from("a");
        assert!(check_etag(LockTarget::Node, 1, &etag, &Etag::from("a")).is_ok());
    }

    #[test]
    fn test_check_etag_mismatch_is_conflict() {
        let err = check_etag(LockTarget::Team, 7, &Etag::from("a"), &Etag::from("b")).unwrap_err();
        assert!(err.is_conflicting_update());
        assert!(err.to_string().contains("Team 7"));
    }

    #[test]
    fn test_required_etag() {
        let etag = Etag::from("x");
        assert_eq!(required_etag(Some(&etag), LockTarget::Node).unwrap(), &etag);
        let err = required_etag(None, LockTarget::WikiPage).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_MODEL");
    }

    #[test]
    fn test_sql_targets_same_table() {
        for target in [
            LockTarget::Node,
            LockTarget::UserGroup,
            LockTarget::Team,
            LockTarget::Acl,
            LockTarget::AccessRequirement,
            LockTarget::AccessApproval,
            LockTarget::WikiPage,
        ] {
            let table = target.touch_sql().split_whitespace().nth(1).unwrap();
            assert!(target.select_sql().contains(&format!("FROM {table} ")));
            assert!(target.write_sql().starts_with(&format!("UPDATE {table} ")));
        }
    }
}
