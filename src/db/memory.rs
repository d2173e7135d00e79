use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::db::models::{sort_snapshot, ConnectionId, ConnectionRecord};
use crate::db::store::ConnectionStore;
use crate::error::StoreError;

/// Process-local store. Sharded, so writes to different ids don't contend.
#[derive(Debug, Default)]
pub struct MemoryConnectionStore {
    records: DashMap<ConnectionId, ConnectionRecord>,
}

impl MemoryConnectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ConnectionStore for MemoryConnectionStore {
    async fn insert_if_absent(&self, record: &ConnectionRecord) -> Result<bool, StoreError> {
        match self.records.entry(record.connection_id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(true)
            }
        }
    }

    async fn delete(&self, connection_id: &str) -> Result<bool, StoreError> {
        Ok(self.records.remove(connection_id).is_some())
    }

    async fn find_by_channel(&self, channel: &str) -> Result<Vec<ConnectionRecord>, StoreError> {
        let mut records: Vec<ConnectionRecord> = self
            .records
            .iter()
            .filter(|entry| entry.value().channel == channel)
            .map(|entry| entry.value().clone())
            .collect();
        sort_snapshot(&mut records);
        Ok(records)
    }

    async fn get(&self, connection_id: &str) -> Result<Option<ConnectionRecord>, StoreError> {
        Ok(self.records.get(connection_id).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_conditional_put() {
        let store = MemoryConnectionStore::new();
        let record = ConnectionRecord::new("c1", "general");

        assert!(store.insert_if_absent(&record).await.unwrap());
        assert!(!store.insert_if_absent(&ConnectionRecord::new("c1", "other")).await.unwrap());

        // The first write is kept.
        let stored = store.get("c1").await.unwrap().unwrap();
        assert_eq!(stored.channel, "general");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_conditional_delete() {
        let store = MemoryConnectionStore::new();
        store.insert_if_absent(&ConnectionRecord::new("c1", "general")).await.unwrap();

        assert!(store.delete("c1").await.unwrap());
        assert!(!store.delete("c1").await.unwrap());
        assert!(!store.delete("never-seen").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_find_by_channel_ordering() {
        let store = MemoryConnectionStore::new();
        let now = Utc::now();

        let mut late = ConnectionRecord::new("a-late", "general");
        late.connected_at = now;
        let mut early = ConnectionRecord::new("z-early", "general");
        early.connected_at = now - Duration::seconds(5);
        let elsewhere = ConnectionRecord::new("b", "random");

        for record in [&late, &early, &elsewhere] {
            store.insert_if_absent(record).await.unwrap();
        }

        let ids: Vec<_> = store
            .find_by_channel("general")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.connection_id)
            .collect();
        assert_eq!(ids, vec!["z-early".to_string(), "a-late".to_string()]);
        assert!(store.find_by_channel("empty").await.unwrap().is_empty());
    }
}
