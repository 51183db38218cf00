//! Nodes of the entity hierarchy and their immutable revisions.

use crate::validation::rules;
use crate::{Etag, NodeId, NodeType, PrincipalId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// Version number given to the first revision of a node.
pub const DEFAULT_VERSION_NUMBER: i64 = 1;

/// A node joined with one of its revisions.
///
/// Node-level fields (name, parent, alias) are shared by every revision;
/// the `version_*` fields, `file_handle_id` and `activity_id` belong to the
/// revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Node {
    /// Assigned by the database when absent on create.
    pub id: Option<NodeId>,

    #[validate(custom(function = "rules::valid_entity_name"))]
    pub name: String,

    pub node_type: NodeType,

    /// `None` only for root nodes.
    pub parent_id: Option<NodeId>,

    /// Derived on create and on move; ignored on input.
    pub project_id: Option<NodeId>,

    /// Globally unique alternate key.
    #[validate(length(min = 1, max = 256))]
    pub alias: Option<String>,

    pub etag: Option<Etag>,

    #[validate(length(max = 1000))]
    pub description: Option<String>,

    pub created_by: PrincipalId,
    pub created_on: Option<DateTime<Utc>>,
    pub modified_by: PrincipalId,
    pub modified_on: Option<DateTime<Utc>>,

    pub version_number: Option<i64>,
    #[validate(length(min = 1, max = 256))]
    pub version_label: Option<String>,
    pub version_comment: Option<String>,
    pub activity_id: Option<String>,
    pub file_handle_id: Option<String>,
}

impl Node {
    #[must_use]
    pub fn new(name: impl Into<String>, node_type: NodeType, created_by: PrincipalId) -> Self {
        Self {
            id: None,
            name: name.into(),
            node_type,
            parent_id: None,
            project_id: None,
            alias: None,
            etag: None,
            description: None,
            created_by,
            created_on: None,
            modified_by: created_by,
            modified_on: None,
            version_number: None,
            version_label: None,
            version_comment: None,
            activity_id: None,
            file_handle_id: None,
        }
    }

    #[must_use]
    pub const fn with_parent(mut self, parent_id: NodeId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn with_file_handle(mut self, file_handle_id: impl Into<String>) -> Self {
        self.file_handle_id = Some(file_handle_id.into());
        self
    }

    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Lightweight view of a node used in paths and child listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityHeader {
    pub id: NodeId,
    pub name: String,
    pub node_type: NodeType,
    pub parent_id: Option<NodeId>,
    pub version_number: i64,
    pub version_label: String,
    pub modified_by: PrincipalId,
    pub modified_on: DateTime<Utc>,
}

/// One revision in a node's version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub id: NodeId,
    pub version_number: i64,
    pub version_label: String,
    pub version_comment: Option<String>,
    pub file_handle_id: Option<String>,
    pub modified_by: PrincipalId,
    pub modified_on: DateTime<Utc>,
}

/// Typed annotation values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnnotationValue {
    String(Vec<String>),
    Long(Vec<i64>),
    Double(Vec<f64>),
    Timestamp(Vec<DateTime<Utc>>),
}

/// Key/value annotations attached to one revision of a node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Annotations {
    pub id: Option<NodeId>,
    /// Etag of the owning node when read.
    pub etag: Option<Etag>,
    pub version_number: Option<i64>,
    pub values: BTreeMap<String, AnnotationValue>,
}

impl Annotations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entry.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: AnnotationValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValidateExt;

    #[test]
    fn test_node_validation() {
        let node = Node::new("analysis", NodeType::Folder, PrincipalId::new(1));
        assert!(node.validate_model().is_ok());

        let node = Node::new("", NodeType::Folder, PrincipalId::new(1));
        assert_eq!(node.validate_model().unwrap_err().error_code(), "INVALID_MODEL");

        let node = Node::new("a/b", NodeType::File, PrincipalId::new(1));
        assert!(node.validate_model().is_err());
    }

    #[test]
    fn test_annotation_blob_shape() {
        let annotations = Annotations::new()
            .with("species", AnnotationValue::String(vec!["mouse".to_string()]))
            .with("samples", AnnotationValue::Long(vec![3, 4]));
        let json = serde_json::to_value(&annotations.values).unwrap();
        assert_eq!(json["samples"]["type"], "LONG");
        assert_eq!(json["species"]["value"][0], "mouse");
    }
}
