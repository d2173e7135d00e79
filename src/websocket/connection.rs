use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::db::ConnectionId;
use crate::error::{AppError, WebSocketError};
use crate::relay::RelayService;
use crate::websocket::protocol::{ClientMessage, ServerMessage};

/// One client socket's inbound side.
pub struct Session {
    id: ConnectionId,
    relay: Arc<RelayService>,
    tx: mpsc::Sender<Message>,
    last_heartbeat: Arc<RwLock<Instant>>,
}

impl Session {
    pub fn new(id: ConnectionId, relay: Arc<RelayService>, tx: mpsc::Sender<Message>) -> Self {
        Self {
            id,
            relay,
            tx,
            last_heartbeat: Arc::new(RwLock::new(Instant::now())),
        }
    }

    pub async fn handle_message(&mut self, msg: Message) -> Result<(), AppError> {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::SendMessage { data }) => {
                    self.relay_payload(data.into_bytes()).await?;
                }
                Ok(ClientMessage::Ping) => {
                    self.send_message(ServerMessage::Pong).await?;
                }
                Err(e) => {
                    warn!("Malformed frame on connection {}: {}", self.id, e);
                    self.send_error(&WebSocketError::InvalidFormat(e.to_string()).to_string())
                        .await?;
                }
            },
            Message::Binary(bytes) => {
                self.relay_payload(bytes).await?;
            }
            Message::Close(_) => {
                info!("Client initiated close for connection {}", self.id);
                return Err(WebSocketError::Closed.into());
            }
            Message::Ping(data) => {
                self.send_frame(Message::Pong(data)).await?;
            }
            Message::Pong(_) => {
                *self.last_heartbeat.write().await = Instant::now();
            }
            Message::Frame(_) => {
                debug!("Ignoring raw frame on connection {}", self.id);
            }
        }
        Ok(())
    }

    /// Ingress failures go back to this client as an error frame; they do
    /// not end the session.
    async fn relay_payload(&self, payload: Vec<u8>) -> Result<(), AppError> {
        if let Err(e) = self.relay.on_message(&self.id, payload).await {
            error!("Message from {} was not relayed: {}", self.id, e);
            self.send_error(&e.to_string()).await?;
        }
        Ok(())
    }

    async fn send_message(&self, msg: ServerMessage) -> Result<(), AppError> {
        let text = serde_json::to_string(&msg)
            .map_err(|e| AppError::InternalError(format!("Failed to serialize message: {}", e)))?;
        self.send_frame(Message::Text(text)).await
    }

    async fn send_error(&self, message: &str) -> Result<(), AppError> {
        self.send_message(ServerMessage::Error {
            message: message.to_string(),
        })
        .await
    }

    async fn send_frame(&self, frame: Message) -> Result<(), AppError> {
        self.tx
            .send(frame)
            .await
            .map_err(|e| WebSocketError::SendError(e.to_string()).into())
    }

    /// Pings the client every `interval`; closes the socket once no pong has
    /// arrived for `timeout`.
    pub fn start_heartbeat(&self, interval: Duration, timeout: Duration) -> JoinHandle<()> {
        let last_heartbeat = self.last_heartbeat.clone();
        let tx = self.tx.clone();
        let id = self.id.clone();

        tokio::spawn(async move {
            loop {
                sleep(interval).await;

                let elapsed = Instant::now().duration_since(*last_heartbeat.read().await);
                if elapsed > timeout {
                    warn!("Heartbeat timeout for connection {}", id);
                    let _ = tx.send(Message::Close(None)).await;
                    break;
                }

                if let Err(e) = tx.send(Message::Ping(Vec::new())).await {
                    debug!("Stopping heartbeat for connection {}: {}", id, e);
                    break;
                }
            }
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}
