use actix_web::{web, HttpResponse};
use serde::Serialize;
use tracing::error;

use crate::db::ConnectionId;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ChannelConnections {
    pub channel: String,
    pub connections: Vec<ConnectionId>,
}

pub async fn channel_connections(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let channel = path.into_inner();
    match state.registry.list_by_channel(&channel).await {
        Ok(connections) => Ok(HttpResponse::Ok().json(ChannelConnections { channel, connections })),
        Err(e) => {
            error!("Failed to list connections for channel {}: {}", channel, e);
            Err(e)
        }
    }
}
