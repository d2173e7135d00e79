use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use chat_relay::registry::handlers::channel_connections;
use chat_relay::{health_check, AppError, AppState, Settings};
use dotenv::dotenv;
use std::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> chat_relay::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let config = Settings::new()?;
    info!("Configuration loaded successfully ({})", config.environment);

    let state = AppState::new(config.clone()).await?;
    info!("Connection store ready ({:?} backend)", config.store.backend);

    let ws_listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.ws_port)).await?;
    let ws_server = state.ws_server.clone();
    tokio::spawn(async move {
        ws_server.run(ws_listener).await;
    });

    let listener = TcpListener::bind((config.server.host.as_str(), config.server.port))?;
    info!("HTTP API listening on http://{}:{}", config.server.host, config.server.port);

    let data = web::Data::new(state.clone());
    let cors_config = config.cors.clone();
    let server = HttpServer::new(move || {
        let cors = if cors_config.enabled {
            let cors = if cors_config.allow_any_origin {
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
            } else {
                Cors::default()
                    .allowed_origin("http://localhost:8080")
                    .allowed_origin("http://127.0.0.1:8080")
                    .allowed_methods(vec!["GET"])
            };
            cors.max_age(cors_config.max_age as usize)
        } else {
            Cors::default()
        };

        App::new()
            .wrap(cors)
            .app_data(data.clone())
            .route("/health", web::get().to(health_check))
            .route("/channels/{channel}/connections", web::get().to(channel_connections))
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run();

    let result = server.await.map_err(|e| AppError::InternalError(e.to_string()));

    if let Err(e) = state.shutdown().await {
        error!("Error during shutdown: {}", e);
    }
    result
}
