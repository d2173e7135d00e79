use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Opaque id assigned by the transport at connect time.
pub type ConnectionId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ConnectionRecord {
    pub connection_id: ConnectionId,
    pub channel: String,
    pub connected_at: DateTime<Utc>,
}

impl ConnectionRecord {
    pub fn new(connection_id: impl Into<ConnectionId>, channel: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            channel: channel.into(),
            connected_at: Utc::now(),
        }
    }
}

/// Snapshot order for a channel listing: oldest first, id as tie-break.
pub(crate) fn sort_snapshot(records: &mut [ConnectionRecord]) {
    records.sort_by(|a, b| {
        a.connected_at
            .cmp(&b.connected_at)
            .then_with(|| a.connection_id.cmp(&b.connection_id))
    });
}
