//! WikiPageDao trait: versioned wiki trees.

use async_trait::async_trait;
use tessera_core::{
    Interface, ObjectType, Page, PageRequest, TesseraResult, WikiHeader, WikiHistorySnapshot,
    WikiId, WikiOrderHint, WikiPage, WikiPageKey,
};

/// Access to wiki pages.
///
/// Each owner object has at most one tree of pages. Every update keeps the
/// previous markdown as a numbered snapshot.
#[async_trait]
pub trait WikiPageDao: Interface + Send + Sync {
    /// Inserts a page. Without a parent the page becomes the owner's root.
    async fn create(
        &self,
        page: &WikiPage,
        owner_id: i64,
        owner_type: ObjectType,
    ) -> TesseraResult<WikiPage>;

    /// Updates the page if the etag matches and stores a new markdown version.
    async fn update_wiki_page(&self, key: &WikiPageKey, page: &WikiPage) -> TesseraResult<WikiPage>;

    /// The page at `version`, or its latest version when `None`.
    async fn get(&self, key: &WikiPageKey, version: Option<i64>) -> TesseraResult<WikiPage>;

    async fn get_root_wiki(&self, owner_id: i64, owner_type: ObjectType) -> TesseraResult<WikiId>;

    async fn lookup_wiki_key(&self, wiki_id: WikiId) -> TesseraResult<WikiPageKey>;

    async fn get_count(&self) -> TesseraResult<u64>;

    /// Pages of the owner's tree ordered by parent then title.
    async fn get_header_tree(
        &self,
        owner_id: i64,
        owner_type: ObjectType,
        page: PageRequest,
    ) -> TesseraResult<Page<WikiHeader>>;

    /// Markdown versions, newest first.
    async fn get_wiki_history(
        &self,
        key: &WikiPageKey,
        page: PageRequest,
    ) -> TesseraResult<Page<WikiHistorySnapshot>>;

    async fn get_number_of_versions(&self, key: &WikiPageKey) -> TesseraResult<u64>;

    /// Deletes markdown versions below `min_version_to_keep`, never the latest one.
    async fn delete_wiki_versions(
        &self,
        key: &WikiPageKey,
        min_version_to_keep: i64,
    ) -> TesseraResult<u64>;

    async fn get_order_hint(
        &self,
        owner_id: i64,
        owner_type: ObjectType,
    ) -> TesseraResult<WikiOrderHint>;

    /// Replaces the order hint if the etag matches.
    async fn update_order_hint(&self, hint: &WikiOrderHint) -> TesseraResult<WikiOrderHint>;

    /// Deletes the page and its subtree.
    async fn delete(&self, key: &WikiPageKey) -> TesseraResult<()>;
}
