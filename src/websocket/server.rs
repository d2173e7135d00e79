use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::relay::RelayService;
use crate::websocket::connection::Session;
use crate::websocket::pool::SessionPool;
use crate::websocket::protocol::ServerMessage;

#[derive(Debug, Clone)]
pub struct WebSocketSettings {
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
    /// Frames queued per connection before senders have to wait.
    pub outbound_buffer: usize,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(40),
            outbound_buffer: 32,
        }
    }
}

pub struct WebSocketServer {
    pool: Arc<SessionPool>,
    relay: Arc<RelayService>,
    settings: WebSocketSettings,
}

/// Reads the `channel` query parameter off the handshake URI.
pub(crate) fn channel_from_query(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == "channel")
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl WebSocketServer {
    pub fn new(pool: Arc<SessionPool>, relay: Arc<RelayService>, settings: WebSocketSettings) -> Self {
        Self { pool, relay, settings }
    }

    pub async fn run(self: Arc<Self>, listener: TcpListener) {
        match listener.local_addr() {
            Ok(addr) => info!("WebSocket server listening on ws://{}", addr),
            Err(e) => warn!("WebSocket server listening on unknown address: {}", e),
        }

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let server = self.clone();
                    tokio::spawn(async move {
                        server.handle_connection(stream, addr).await;
                    });
                }
                Err(e) => {
                    error!("Failed to accept WebSocket connection: {}", e);
                }
            }
        }
    }

    pub async fn handle_connection(self: Arc<Self>, raw_stream: TcpStream, addr: SocketAddr) {
        info!("New WebSocket connection from: {}", addr);

        let mut channel = None;
        let ws_stream = match tokio_tungstenite::accept_hdr_async(
            raw_stream,
            |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                channel = channel_from_query(req.uri().query());
                Ok(resp)
            },
        )
        .await
        {
            Ok(ws) => ws,
            Err(e) => {
                error!("Error during WebSocket handshake with {}: {}", addr, e);
                return;
            }
        };

        let connection_id = Uuid::new_v4().to_string();
        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (tx, mut rx) = mpsc::channel(self.settings.outbound_buffer.max(1));

        // In the pool before the registry, so a registered id is always reachable.
        self.pool.add(connection_id.clone(), tx.clone()).await;

        if let Err(e) = self.relay.on_connect(&connection_id, channel.as_deref()).await {
            self.pool.remove(&connection_id).await;
            let rejection = ServerMessage::Error { message: e.to_string() };
            if let Ok(text) = serde_json::to_string(&rejection) {
                let _ = ws_sink.send(Message::Text(text)).await;
            }
            let _ = ws_sink.close().await;
            return;
        }

        let mut session = Session::new(connection_id.clone(), self.relay.clone(), tx);
        let heartbeat = session.start_heartbeat(
            self.settings.heartbeat_interval,
            self.settings.heartbeat_timeout,
        );

        let send_task = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = ws_sink.send(message).await {
                    warn!("Error sending WebSocket message: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }

            let _ = ws_sink.close().await;
        });

        let receive_task = tokio::spawn(async move {
            while let Some(message) = ws_stream.next().await {
                match message {
                    Ok(msg) => {
                        if let Err(e) = session.handle_message(msg).await {
                            info!("Ending session {}: {}", session.id(), e);
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Error receiving WebSocket message on {}: {}", session.id(), e);
                        break;
                    }
                }
            }
        });

        let send_abort = send_task.abort_handle();
        let receive_abort = receive_task.abort_handle();
        tokio::select! {
            _ = send_task => {
                info!("Send task completed for connection {}", connection_id);
            }
            _ = receive_task => {
                info!("Receive task completed for connection {}", connection_id);
            }
        }
        send_abort.abort();
        receive_abort.abort();
        heartbeat.abort();

        self.pool.remove(&connection_id).await;
        if let Err(e) = self.relay.on_disconnect(&connection_id).await {
            // The broadcaster will reclaim the record on its next failed send.
            error!("Connection {} closed but stays registered: {}", connection_id, e);
        }
        info!("Connection {} closed", connection_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_from_query() {
        assert_eq!(channel_from_query(Some("channel=random")), Some("random".to_string()));
        assert_eq!(channel_from_query(Some("a=1&channel=dev%20ops")), Some("dev ops".to_string()));
        assert_eq!(channel_from_query(Some("channel=")), None);
        assert_eq!(channel_from_query(Some("room=x")), None);
        assert_eq!(channel_from_query(None), None);
    }
}
