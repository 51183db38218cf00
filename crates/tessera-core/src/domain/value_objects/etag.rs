//! Etag value object.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque version token used for optimistic-concurrency checks.
///
/// Every successful write stores a freshly generated etag; an update is only
/// applied when the caller presents the etag it last read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(transparent))]
#[serde(transparent)]
pub struct Etag(String);

impl Etag {
    /// Generates a new random etag.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an etag read from storage or supplied by a caller.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Default for Etag {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for Etag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Etag {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Etag {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_etags_differ() {
        assert_ne!(Etag::generate(), Etag::generate());
    }

    #[test]
    fn test_generated_etag_is_uuid() {
        let etag = Etag::generate();
        assert!(Uuid::parse_str(etag.as_str()).is_ok());
    }

    #[test]
    fn test_etag_equality_is_textual() {
        assert_eq!(Etag::from("abc"), Etag::new("abc".to_string()));
        assert_ne!(Etag::from("abc"), Etag::from("ABC"));
    }
}
