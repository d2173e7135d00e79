use async_trait::async_trait;

use crate::db::models::ConnectionRecord;
use crate::error::StoreError;

/// Durable connection storage.
///
/// Implementations must make `insert_if_absent` and `delete` atomic per
/// `connection_id`; operations on different ids must not serialize on a
/// shared lock.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Conditional put. Returns `false` without writing if the id already exists.
    async fn insert_if_absent(&self, record: &ConnectionRecord) -> Result<bool, StoreError>;

    /// Conditional delete. Returns whether a record was removed; an absent id is not an error.
    async fn delete(&self, connection_id: &str) -> Result<bool, StoreError>;

    /// All records on `channel`, oldest first.
    async fn find_by_channel(&self, channel: &str) -> Result<Vec<ConnectionRecord>, StoreError>;

    async fn get(&self, connection_id: &str) -> Result<Option<ConnectionRecord>, StoreError>;

    async fn close(&self) {}
}
