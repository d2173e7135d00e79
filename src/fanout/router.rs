use std::collections::HashSet;
use std::sync::Arc;

use crate::db::ConnectionId;
use crate::error::AppError;
use crate::registry::ConnectionRegistry;

/// Maps a channel to the connections a broadcast should reach.
#[derive(Clone)]
pub struct ChannelRouter {
    registry: Arc<ConnectionRegistry>,
}

impl ChannelRouter {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub async fn resolve(&self, channel: &str) -> Result<Vec<ConnectionId>, AppError> {
        let mut targets = self.registry.list_by_channel(channel).await?;
        // Listing is keyed on the primary id, but a set is what callers get.
        let mut seen = HashSet::with_capacity(targets.len());
        targets.retain(|id| seen.insert(id.clone()));
        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryConnectionStore;

    #[tokio::test]
    async fn test_resolve_scopes_to_channel() {
        let registry = Arc::new(ConnectionRegistry::new(Arc::new(MemoryConnectionStore::new())));
        registry.register("c1", "general").await.unwrap();
        registry.register("c2", "general").await.unwrap();
        registry.register("c3", "random").await.unwrap();

        let router = ChannelRouter::new(registry.clone());
        let mut general = router.resolve("general").await.unwrap();
        general.sort();
        assert_eq!(general, vec!["c1".to_string(), "c2".to_string()]);
        assert_eq!(router.resolve("random").await.unwrap(), vec!["c3".to_string()]);
        assert!(router.resolve("nobody").await.unwrap().is_empty());
    }
}
