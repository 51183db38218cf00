//! Node type value object.

text_enum!(
    /// Kind of node in the entity hierarchy.
    NodeType {
        Project => "project",
        Folder => "folder",
        File => "file",
        Table => "table",
        Link => "link",
        EntityView => "entityview",
    }
);

impl NodeType {
    /// Projects own their subtree's project id.
    #[must_use]
    pub const fn is_project(&self) -> bool {
        matches!(self, Self::Project)
    }

    /// Whether the type may hold children.
    #[must_use]
    pub const fn is_container(&self) -> bool {
        matches!(self, Self::Project | Self::Folder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_type_text() {
        assert_eq!(NodeType::EntityView.as_str(), "entityview");
        assert_eq!("folder".parse::<NodeType>().unwrap(), NodeType::Folder);
        assert!("Folder".parse::<NodeType>().is_err());
    }

    #[test]
    fn test_containers() {
        assert!(NodeType::Project.is_container());
        assert!(NodeType::Folder.is_container());
        assert!(!NodeType::File.is_container());
        assert!(NodeType::Project.is_project());
    }
}
