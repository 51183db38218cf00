//! Typed ID wrappers for domain entities.
//!
//! Every table in the schema keys its rows with a 64-bit integer. The
//! wrappers keep a principal id from being passed where a wiki id is
//! expected.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::num::ParseIntError;
use std::str::FromStr;

macro_rules! long_id {
    ($(#[$meta:meta])* $name:ident) => {
        long_id!($(#[$meta])* $name, prefix = "");
    };
    ($(#[$meta:meta])* $name:ident, prefix = $prefix:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(transparent))]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Rendered before the number by `Display`.
            pub const PREFIX: &'static str = $prefix;

            /// Wraps a raw id.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw id.
            #[must_use]
            pub const fn into_inner(self) -> i64 {
                self.0
            }

            /// Parses the number with or without the prefix, in any case.
            pub fn parse(s: &str) -> Result<Self, ParseIntError> {
                let trimmed = s.trim();
                let digits = match trimmed.get(..Self::PREFIX.len()) {
                    Some(prefix) if prefix.eq_ignore_ascii_case(Self::PREFIX) => {
                        &trimmed[Self::PREFIX.len()..]
                    }
                    _ => trimmed,
                };
                Ok(Self(digits.parse()?))
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", Self::PREFIX, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

long_id!(
    /// Id of a principal: an individual user or a group. Teams share their group's id.
    PrincipalId
);

long_id!(
    /// Id of a principal alias binding.
    AliasId
);

long_id!(
    /// Id of an access control list.
    AclId
);

long_id!(
    /// Id of an access requirement.
    AccessRequirementId
);

long_id!(
    /// Id of an access approval.
    AccessApprovalId
);

long_id!(
    /// Id of a wiki page.
    WikiId
);

/// Teams are group principals and reuse the group's id.
pub type TeamId = PrincipalId;

/// Prefix used when rendering node ids.
pub const NODE_ID_PREFIX: &str = "syn";

long_id!(
    /// Id of a node in the entity hierarchy.
    ///
    /// Rendered as `syn<number>`. Parsing accepts the prefix in any case, or a bare number.
    NodeId,
    prefix = NODE_ID_PREFIX
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId::new(123).to_string(), "syn123");
    }

    #[test]
    fn test_node_id_parsing() {
        assert_eq!(NodeId::parse("syn123").unwrap(), NodeId::new(123));
        assert_eq!(NodeId::parse("SYN45").unwrap(), NodeId::new(45));
        assert_eq!(NodeId::parse(" 77 ").unwrap(), NodeId::new(77));
        assert_eq!("syn9".parse::<NodeId>().unwrap(), NodeId::new(9));
    }

    #[test]
    fn test_node_id_parsing_rejects_garbage() {
        assert!(NodeId::parse("syn").is_err());
        assert!(NodeId::parse("synabc").is_err());
        assert!(NodeId::parse("").is_err());
    }

    #[test]
    fn test_long_id_roundtrip() {
        let id: PrincipalId = "42".parse().unwrap();
        assert_eq!(id, PrincipalId::new(42));
        assert_eq!(i64::from(id), 42);
        assert_eq!(id.to_string(), "42");
        assert!("syn42".parse::<PrincipalId>().is_err());
        assert_eq!(NodeId::PREFIX, NODE_ID_PREFIX);
    }

    #[test]
    fn test_ids_serialize_as_numbers() {
        let json = serde_json::to_string(&NodeId::new(5)).unwrap();
        assert_eq!(json, "5");
        let wiki: WikiId = serde_json::from_str("11").unwrap();
        assert_eq!(wiki, WikiId::new(11));
    }
}
