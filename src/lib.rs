pub mod config;
pub mod db;
pub mod error;
pub mod fanout;
pub mod registry;
pub mod relay;
pub mod transport;
pub mod websocket;

use std::sync::Arc;
use actix_web::{web, HttpResponse};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use crate::config::Settings;

pub use db::{ConnectionRecord, ConnectionStore, MemoryConnectionStore, PgConnectionStore};
pub use fanout::{BroadcastConfig, BroadcastSummary, Broadcaster, DeliveryResult, Message};
pub use registry::ConnectionRegistry;
pub use relay::RelayService;
pub use websocket::{SessionPool, WebSocketServer, WebSocketSettings};

use crate::config::StoreBackend;

/// Health check endpoint handler
/// Returns a JSON response with server status, timestamp and locally held sockets
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "local_connections": state.sessions.connection_count().await,
    }))
}

/// Application state shared across all components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub registry: Arc<ConnectionRegistry>,
    pub relay: Arc<RelayService>,
    pub sessions: Arc<SessionPool>,
    pub ws_server: Arc<WebSocketServer>,
}

impl AppState {
    pub async fn new(config: Settings) -> Result<Self> {
        let store: Arc<dyn ConnectionStore> = match config.store.backend {
            StoreBackend::Postgres => Arc::new(PgConnectionStore::connect(&config.database).await?),
            StoreBackend::Memory => Arc::new(MemoryConnectionStore::new()),
        };

        Ok(Self::with_store(config, store))
    }

    /// Wires registry, broadcaster, relay and the WebSocket front-end around `store`.
    pub fn with_store(config: Settings, store: Arc<dyn ConnectionStore>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(store));
        let sessions = Arc::new(SessionPool::new());

        let broadcaster = Broadcaster::new(
            registry.clone(),
            sessions.clone(),
            BroadcastConfig::from(&config.relay),
        );
        let relay = Arc::new(RelayService::new(
            registry.clone(),
            broadcaster,
            config.relay.default_channel.clone(),
        ));

        let ws_server = Arc::new(WebSocketServer::new(
            sessions.clone(),
            relay.clone(),
            WebSocketSettings {
                heartbeat_interval: config.server.heartbeat_interval(),
                heartbeat_timeout: config.server.heartbeat_timeout(),
                outbound_buffer: config.relay.outbound_buffer,
            },
        ));

        Self {
            config: Arc::new(config),
            registry,
            relay,
            sessions,
            ws_server,
        }
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.registry.close().await;
        Ok(())
    }
}
