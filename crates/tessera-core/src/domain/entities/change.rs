//! Change log entries.

use crate::{ChangeType, Etag, ObjectType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The latest change of one object.
///
/// Only one message is kept per `(object_id, object_type)`; recording a new
/// change replaces the old one and assigns a higher change number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeMessage {
    /// Assigned when the change is recorded.
    pub change_number: Option<i64>,
    pub object_id: i64,
    pub object_type: ObjectType,
    pub object_etag: Option<Etag>,
    pub change_type: ChangeType,
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChangeMessage {
    #[must_use]
    pub fn new(
        object_id: impl Into<i64>,
        object_type: ObjectType,
        change_type: ChangeType,
    ) -> Self {
        Self {
            change_number: None,
            object_id: object_id.into(),
            object_type,
            object_etag: None,
            change_type,
            timestamp: None,
        }
    }

    #[must_use]
    pub fn with_etag(mut self, etag: Etag) -> Self {
        self.object_etag = Some(etag);
        self
    }
}
