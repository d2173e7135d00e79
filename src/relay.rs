//! Ingress entry points.
//!
//! Whatever terminates client sockets calls these three on connect,
//! disconnect and inbound message. Store failures are returned so the
//! caller can fail the request instead of silently losing state.

use std::sync::Arc;
use tracing::{error, info};

use crate::db::ConnectionRecord;
use crate::error::AppError;
use crate::fanout::{BroadcastSummary, Broadcaster, Message};
use crate::registry::ConnectionRegistry;

pub struct RelayService {
    registry: Arc<ConnectionRegistry>,
    broadcaster: Broadcaster,
    default_channel: String,
}

impl RelayService {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        broadcaster: Broadcaster,
        default_channel: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            default_channel: default_channel.into(),
        }
    }

    pub async fn on_connect(
        &self,
        connection_id: &str,
        channel: Option<&str>,
    ) -> Result<ConnectionRecord, AppError> {
        let channel = channel
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(self.default_channel.as_str());

        self.registry.register(connection_id, channel).await.map_err(|e| {
            error!("Connect for {} failed: {}", connection_id, e);
            e
        })
    }

    pub async fn on_disconnect(&self, connection_id: &str) -> Result<(), AppError> {
        self.registry.unregister(connection_id).await.map_err(|e| {
            error!("Disconnect for {} failed: {}", connection_id, e);
            e
        })?;
        Ok(())
    }

    /// Broadcasts `payload` to the sender's channel. The sender only sees an
    /// error if the registry could not be read; undelivered recipients are
    /// in the summary.
    pub async fn on_message(
        &self,
        connection_id: &str,
        payload: impl Into<Arc<[u8]>>,
    ) -> Result<BroadcastSummary, AppError> {
        let sender = self
            .registry
            .lookup(connection_id)
            .await?
            .ok_or_else(|| AppError::UnknownConnection(connection_id.to_string()))?;

        let message = Message::new(sender.channel, connection_id, payload);
        info!(
            "Message from {} on {} ({} bytes)",
            connection_id,
            message.channel,
            message.payload.len()
        );
        self.broadcaster.broadcast(&message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryConnectionStore;
    use crate::fanout::BroadcastConfig;
    use crate::transport::MockTransport;

    fn relay(transport: MockTransport) -> (RelayService, Arc<ConnectionRegistry>) {
        let registry = Arc::new(ConnectionRegistry::new(Arc::new(MemoryConnectionStore::new())));
        let broadcaster = Broadcaster::new(registry.clone(), Arc::new(transport), BroadcastConfig::default());
        (RelayService::new(registry.clone(), broadcaster, "general"), registry)
    }

    #[tokio::test]
    async fn test_connect_uses_default_channel() {
        let (relay, registry) = relay(MockTransport::new());

        let record = relay.on_connect("c1", None).await.unwrap();
        assert_eq!(record.channel, "general");
        let record = relay.on_connect("c2", Some("  ")).await.unwrap();
        assert_eq!(record.channel, "general");
        let record = relay.on_connect("c3", Some("random")).await.unwrap();
        assert_eq!(record.channel, "random");

        assert_eq!(registry.list_by_channel("general").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_disconnect_of_unknown_connection_is_ok() {
        let (relay, _) = relay(MockTransport::new());
        relay.on_connect("c1", None).await.unwrap();

        relay.on_disconnect("c1").await.unwrap();
        relay.on_disconnect("c1").await.unwrap();
        relay.on_disconnect("evicted-earlier").await.unwrap();
    }

    #[tokio::test]
    async fn test_message_routes_to_sender_channel() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(1).returning(|id, payload| {
            assert_eq!(id, "c2");
            assert_eq!(payload, b"hello");
            Ok(())
        });
        let (relay, _) = relay(transport);
        relay.on_connect("c1", Some("room")).await.unwrap();
        relay.on_connect("c2", Some("room")).await.unwrap();
        relay.on_connect("c3", Some("other")).await.unwrap();

        let summary = relay.on_message("c1", b"hello".to_vec()).await.unwrap();
        assert_eq!(summary.delivered, 1);
    }

    #[tokio::test]
    async fn test_message_from_unregistered_connection() {
        let mut transport = MockTransport::new();
        transport.expect_send().never();
        let (relay, _) = relay(transport);

        let err = relay.on_message("ghost", b"boo".to_vec()).await.unwrap_err();
        assert!(matches!(err, AppError::UnknownConnection(id) if id == "ghost"));
    }
}
