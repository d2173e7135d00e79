//! Connection registry.
//!
//! All mutation goes through the store's conditional writes, so two calls
//! on the same connection id are serialized by the store and calls on
//! different ids never wait on each other.

pub mod handlers;

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::db::{ConnectionId, ConnectionRecord, ConnectionStore};
use crate::error::AppError;

pub struct ConnectionRegistry {
    store: Arc<dyn ConnectionStore>,
}

impl ConnectionRegistry {
    pub fn new(store: Arc<dyn ConnectionStore>) -> Self {
        Self { store }
    }

    /// Fails with `DuplicateConnection` if `connection_id` already has a live
    /// record. Existing records are never overwritten.
    pub async fn register(
        &self,
        connection_id: &str,
        channel: &str,
    ) -> Result<ConnectionRecord, AppError> {
        if connection_id.is_empty() {
            return Err(AppError::ValidationError("connection id must not be empty".into()));
        }
        if channel.is_empty() {
            return Err(AppError::ValidationError("channel must not be empty".into()));
        }

        let record = ConnectionRecord::new(connection_id, channel);
        if !self.store.insert_if_absent(&record).await? {
            error!("Connection {} is already registered", connection_id);
            return Err(AppError::DuplicateConnection(connection_id.to_string()));
        }

        info!("Registered connection {} on channel {}", connection_id, channel);
        Ok(record)
    }

    /// Idempotent. Returns whether a record was actually removed.
    pub async fn unregister(&self, connection_id: &str) -> Result<bool, AppError> {
        let removed = self.store.delete(connection_id).await?;
        if removed {
            info!("Unregistered connection {}", connection_id);
        } else {
            debug!("Connection {} was not registered", connection_id);
        }
        Ok(removed)
    }

    /// Snapshot of the channel at call time. Entries may go stale before use.
    pub async fn list_by_channel(&self, channel: &str) -> Result<Vec<ConnectionId>, AppError> {
        let records = self.store.find_by_channel(channel).await?;
        Ok(records.into_iter().map(|r| r.connection_id).collect())
    }

    pub async fn lookup(&self, connection_id: &str) -> Result<Option<ConnectionRecord>, AppError> {
        Ok(self.store.get(connection_id).await?)
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}
