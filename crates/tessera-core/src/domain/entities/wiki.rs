//! Wiki pages.

use crate::{Etag, ObjectType, PrincipalId, WikiId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// Fully qualified address of a wiki page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WikiPageKey {
    pub owner_id: i64,
    pub owner_type: ObjectType,
    pub wiki_id: WikiId,
}

impl WikiPageKey {
    #[must_use]
    pub fn new(owner_id: impl Into<i64>, owner_type: ObjectType, wiki_id: WikiId) -> Self {
        Self {
            owner_id: owner_id.into(),
            owner_type,
            wiki_id,
        }
    }
}

impl fmt::Display for WikiPageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner_type, self.owner_id, self.wiki_id)
    }
}

/// A wiki page at one markdown version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct WikiPage {
    pub id: Option<WikiId>,
    pub etag: Option<Etag>,
    #[validate(length(max = 256))]
    pub title: String,
    pub created_by: PrincipalId,
    pub created_on: Option<DateTime<Utc>>,
    pub modified_by: PrincipalId,
    pub modified_on: Option<DateTime<Utc>>,
    /// `None` for the owner's root page.
    pub parent_wiki_id: Option<WikiId>,
    pub markdown: String,
    pub attachment_file_handle_ids: Vec<String>,
    /// Starts at 0 and increases by one on every update.
    pub markdown_version: i64,
}

impl WikiPage {
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        markdown: impl Into<String>,
        created_by: PrincipalId,
    ) -> Self {
        Self {
            id: None,
            etag: None,
            title: title.into(),
            created_by,
            created_on: None,
            modified_by: created_by,
            modified_on: None,
            parent_wiki_id: None,
            markdown: markdown.into(),
            attachment_file_handle_ids: Vec::new(),
            markdown_version: 0,
        }
    }

    #[must_use]
    pub const fn with_parent(mut self, parent: WikiId) -> Self {
        self.parent_wiki_id = Some(parent);
        self
    }
}

/// Entry of an owner's page tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiHeader {
    pub id: WikiId,
    pub title: String,
    pub parent_id: Option<WikiId>,
}

/// One entry of a page's markdown history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiHistorySnapshot {
    pub version: i64,
    pub title: String,
    pub modified_by: PrincipalId,
    pub modified_on: DateTime<Utc>,
}

/// Caller-defined display order of an owner's pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiOrderHint {
    pub owner_id: i64,
    pub owner_type: ObjectType,
    pub id_list: Vec<WikiId>,
    pub etag: Option<Etag>,
}
