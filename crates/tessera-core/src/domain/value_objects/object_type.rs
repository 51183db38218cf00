//! Object and change kinds.

text_enum!(
    /// Kind of object referenced by ACLs, wiki owners and change messages.
    ObjectType {
        Entity => "ENTITY",
        Principal => "PRINCIPAL",
        Team => "TEAM",
        Evaluation => "EVALUATION",
        AccessRequirement => "ACCESS_REQUIREMENT",
        AccessApproval => "ACCESS_APPROVAL",
        AccessControlList => "ACCESS_CONTROL_LIST",
        Wiki => "WIKI",
    }
);

text_enum!(
    /// What happened to an object.
    ChangeType {
        Create => "CREATE",
        Update => "UPDATE",
        Delete => "DELETE",
    }
);

text_enum!(
    /// Kinds of object an access requirement can restrict.
    RestrictableObjectType {
        Entity => "ENTITY",
        Team => "TEAM",
        Evaluation => "EVALUATION",
    }
);

impl From<RestrictableObjectType> for ObjectType {
    fn from(value: RestrictableObjectType) -> Self {
        match value {
            RestrictableObjectType::Entity => Self::Entity,
            RestrictableObjectType::Team => Self::Team,
            RestrictableObjectType::Evaluation => Self::Evaluation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_roundtrip() {
        for object_type in ObjectType::ALL {
            assert_eq!(object_type.as_str().parse::<ObjectType>().unwrap(), *object_type);
        }
        assert_eq!("DELETE".parse::<ChangeType>().unwrap(), ChangeType::Delete);
    }

    #[test]
    fn test_unknown_text_is_datastore_error() {
        let err = "FOLDER".parse::<ObjectType>().unwrap_err();
        assert_eq!(err.error_code(), "DATASTORE_ERROR");
        assert!(err.to_string().contains("ObjectType"));
    }

    #[test]
    fn test_serde_uses_text_form() {
        let json = serde_json::to_string(&ObjectType::AccessRequirement).unwrap();
        assert_eq!(json, "\"ACCESS_REQUIREMENT\"");
    }

    #[test]
    fn test_restrictable_maps_to_object_type() {
        assert_eq!(ObjectType::from(RestrictableObjectType::Team), ObjectType::Team);
    }
}
