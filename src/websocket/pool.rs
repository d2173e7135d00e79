use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

use crate::db::ConnectionId;
use crate::transport::{Transport, TransportError};

/// Outbound queues of the sockets this process holds, keyed by connection id.
#[derive(Debug, Default)]
pub struct SessionPool {
    connections: Arc<RwLock<HashMap<ConnectionId, mpsc::Sender<Message>>>>,
}

impl SessionPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, id: ConnectionId, sender: mpsc::Sender<Message>) {
        info!("Added connection {} to pool", id);
        self.connections.write().await.insert(id, sender);
    }

    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.connections.write().await.remove(id).is_some();
        if removed {
            info!("Removed connection {} from pool", id);
        }
        removed
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

/// UTF-8 payloads go out as text frames, anything else as binary.
pub(crate) fn frame_for(payload: &[u8]) -> Message {
    match std::str::from_utf8(payload) {
        Ok(text) => Message::Text(text.to_owned()),
        Err(_) => Message::Binary(payload.to_vec()),
    }
}

/// Any id this pool does not hold is reported as gone, and the broadcaster
/// evicts it. The pool must therefore be the only holder of sockets for the
/// store it evicts from; two processes sharing one store would delete each
/// other's live connections.
#[async_trait]
impl Transport for SessionPool {
    async fn send(&self, connection_id: &str, payload: &[u8]) -> Result<(), TransportError> {
        // Clone the sender out so the map lock is not held while waiting on a full queue.
        let sender = self.connections.read().await.get(connection_id).cloned();
        let Some(sender) = sender else {
            debug!("Connection {} is not held by this process", connection_id);
            return Err(TransportError::RecipientGone);
        };

        sender
            .send(frame_for(payload))
            .await
            .map_err(|_| TransportError::RecipientGone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_session_pool() {
        let pool = SessionPool::new();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);

        pool.add("c1".to_string(), tx1).await;
        pool.add("c2".to_string(), tx2).await;
        assert_eq!(pool.connection_count().await, 2);

        pool.send("c1", b"text message").await.unwrap();
        match rx1.try_recv() {
            Ok(Message::Text(msg)) => assert_eq!(msg, "text message"),
            other => panic!("Expected text frame on connection 1, got {:?}", other),
        }

        pool.send("c2", &[0xff, 0x00]).await.unwrap();
        match rx2.try_recv() {
            Ok(Message::Binary(bytes)) => assert_eq!(bytes, vec![0xff, 0x00]),
            other => panic!("Expected binary frame on connection 2, got {:?}", other),
        }

        assert!(pool.remove("c1").await);
        assert!(!pool.remove("c1").await);
        assert_eq!(pool.connection_count().await, 1);
        assert!(pool.send("c2", b"still here").await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_connection_is_gone() {
        let pool = SessionPool::new();
        assert_eq!(pool.send("nobody", b"hi").await, Err(TransportError::RecipientGone));
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_gone() {
        let pool = SessionPool::new();
        let (tx, rx) = mpsc::channel(4);
        pool.add("c1".to_string(), tx).await;
        drop(rx);

        assert_eq!(pool.send("c1", b"hi").await, Err(TransportError::RecipientGone));
    }
}
