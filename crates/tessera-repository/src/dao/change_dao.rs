//! ChangeDao trait: the per-object change log.

use async_trait::async_trait;
use tessera_core::{ChangeMessage, Interface, ObjectType, TesseraResult};

/// Access to the change log.
///
/// DAO writes record their own changes inside their transactions; this
/// interface lists them and lets callers record changes directly.
#[async_trait]
pub trait ChangeDao: Interface + Send + Sync {
    /// Replaces the change of one object and returns it with its new number.
    async fn replace_change(&self, change: ChangeMessage) -> TesseraResult<ChangeMessage>;

    /// Replaces a batch of changes in one transaction, ordered by object id.
    async fn replace_changes(
        &self,
        changes: Vec<ChangeMessage>,
    ) -> TesseraResult<Vec<ChangeMessage>>;

    /// Removes the change of one object.
    async fn delete_change(&self, object_id: i64, object_type: ObjectType) -> TesseraResult<bool>;

    /// Highest change number, or 0 when the log is empty.
    async fn get_current_change_number(&self) -> TesseraResult<i64>;

    /// Lowest change number, or 0 when the log is empty.
    async fn get_minimum_change_number(&self) -> TesseraResult<i64>;

    async fn get_count(&self) -> TesseraResult<u64>;

    /// Changes numbered at or above `greater_or_equal`, ascending.
    async fn list_changes(
        &self,
        greater_or_equal: i64,
        object_type: Option<ObjectType>,
        limit: i64,
    ) -> TesseraResult<Vec<ChangeMessage>>;

    async fn delete_all_changes(&self) -> TesseraResult<u64>;
}
