//! NodeDao trait: the entity hierarchy.
//!
//! A node is a named position in a tree (project, folder, file, ...) and
//! owns one or more immutable revisions. Node-level fields are shared by all
//! revisions; the current revision number points at the revision returned
//! by [`NodeDao::get_node`].

use async_trait::async_trait;
use tessera_core::{
    Annotations, EntityHeader, Etag, Interface, Node, NodeId, NodeType, Page, PageRequest,
    PrincipalId, TesseraResult, VersionInfo,
};

/// Access to nodes and their revisions.
#[async_trait]
pub trait NodeDao: Interface + Send + Sync {
    /// Inserts a node with its first revision.
    ///
    /// Version number defaults to 1 and its label to the number. The parent
    /// must exist. Projects are their own project; other nodes inherit the
    /// parent's project.
    async fn create_new_node(&self, node: &Node) -> TesseraResult<Node>;

    /// Adds a revision copied from the current one with the caller's revision
    /// fields applied, makes it current, and returns its number.
    async fn create_new_version(&self, node: &Node) -> TesseraResult<i64>;

    /// The node at its current revision.
    async fn get_node(&self, id: NodeId) -> TesseraResult<Node>;

    async fn get_node_for_version(&self, id: NodeId, version: i64) -> TesseraResult<Node>;

    /// Updates node and current revision fields if the supplied etag matches.
    async fn update_node(&self, node: &Node) -> TesseraResult<Node>;

    /// Locks the node, checks `etag` and stores a new one.
    async fn lock_node_and_increment_etag(&self, id: NodeId, etag: &Etag) -> TesseraResult<Etag>;

    /// Locks the nodes in ascending id order and returns their etags in that order.
    ///
    /// Duplicate ids are locked once. Fails with `NotFound` if any node is missing.
    async fn lock_nodes(&self, ids: &[NodeId]) -> TesseraResult<Vec<Etag>>;

    /// Current etag without locking.
    async fn peek_current_etag(&self, id: NodeId) -> TesseraResult<Etag>;

    /// Replaces the annotations of the current revision.
    async fn update_annotations(
        &self,
        id: NodeId,
        annotations: &Annotations,
    ) -> TesseraResult<Annotations>;

    async fn get_annotations(&self, id: NodeId) -> TesseraResult<Annotations>;

    async fn get_annotations_for_version(
        &self,
        id: NodeId,
        version: i64,
    ) -> TesseraResult<Annotations>;

    /// Deletes the node, its revisions and its whole subtree.
    async fn delete(&self, id: NodeId) -> TesseraResult<bool>;

    /// Deletes one revision. The last revision cannot be deleted.
    async fn delete_version(&self, id: NodeId, version: i64) -> TesseraResult<()>;

    /// Revision numbers, newest first.
    async fn get_version_numbers(&self, id: NodeId) -> TesseraResult<Vec<i64>>;

    async fn get_version_count(&self, id: NodeId) -> TesseraResult<u64>;

    async fn get_versions_of_entity(
        &self,
        id: NodeId,
        page: PageRequest,
    ) -> TesseraResult<Page<VersionInfo>>;

    async fn get_children_ids(&self, id: NodeId) -> TesseraResult<Vec<NodeId>>;

    /// Children ordered by name.
    async fn get_children(
        &self,
        id: NodeId,
        page: PageRequest,
    ) -> TesseraResult<Page<EntityHeader>>;

    async fn does_node_have_children(&self, id: NodeId) -> TesseraResult<bool>;

    async fn get_entity_header_by_child_name(
        &self,
        parent_id: NodeId,
        name: &str,
    ) -> TesseraResult<EntityHeader>;

    async fn get_parent_id(&self, id: NodeId) -> TesseraResult<Option<NodeId>>;

    /// Moves the node under a new parent. Returns false when the parent is unchanged.
    async fn change_node_parent(&self, id: NodeId, new_parent_id: NodeId) -> TesseraResult<bool>;

    /// Headers from the root down to the node itself.
    async fn get_entity_path(&self, id: NodeId) -> TesseraResult<Vec<EntityHeader>>;

    /// Resolves a `/`-separated name path starting at a root, e.g. `/root/project/data`.
    ///
    /// Returns `None` when no node sits at the path.
    async fn get_node_id_for_path(&self, path: &str) -> TesseraResult<Option<NodeId>>;

    /// The node and every folder or project below it that is reachable
    /// through containers only, parents before children.
    async fn get_all_container_ids(&self, id: NodeId) -> TesseraResult<Vec<NodeId>>;

    /// Nearest ancestor-or-self owning an entity ACL, else the root.
    async fn get_benefactor(&self, id: NodeId) -> TesseraResult<NodeId>;

    async fn get_project_id(&self, id: NodeId) -> TesseraResult<Option<NodeId>>;

    async fn get_node_type(&self, id: NodeId) -> TesseraResult<NodeType>;

    async fn get_created_by(&self, id: NodeId) -> TesseraResult<PrincipalId>;

    async fn get_current_revision_number(&self, id: NodeId) -> TesseraResult<i64>;

    /// Activity of the revision at `version`, or of the current revision when `None`.
    async fn get_activity_id(
        &self,
        id: NodeId,
        version: Option<i64>,
    ) -> TesseraResult<Option<String>>;

    /// File handle of the revision at `version`, or of the current revision
    /// when `None`. A missing revision has no file handle.
    async fn get_file_handle_id_for_version(
        &self,
        id: NodeId,
        version: Option<i64>,
    ) -> TesseraResult<Option<String>>;

    async fn is_node_root(&self, id: NodeId) -> TesseraResult<bool>;

    /// Whether the node's parent is a root. False for roots themselves.
    async fn is_nodes_parent_root(&self, id: NodeId) -> TesseraResult<bool>;

    async fn does_node_exist(&self, id: NodeId) -> TesseraResult<bool>;

    async fn does_node_revision_exist(&self, id: NodeId, version: i64) -> TesseraResult<bool>;

    async fn get_count(&self) -> TesseraResult<u64>;

    async fn get_node_id_by_alias(&self, alias: &str) -> TesseraResult<NodeId>;

    /// Header at `version`, or at the current revision when `None`.
    async fn get_entity_header(
        &self,
        id: NodeId,
        version: Option<i64>,
    ) -> TesseraResult<EntityHeader>;

    /// Current headers of the nodes that exist, in the order requested.
    async fn get_entity_headers(&self, ids: &[NodeId]) -> TesseraResult<Vec<EntityHeader>>;
}
