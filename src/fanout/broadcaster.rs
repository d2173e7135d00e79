use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::db::ConnectionId;
use crate::error::{AppError, StoreError};
use crate::fanout::message::{BroadcastSummary, DeliveryOutcome, DeliveryResult, Message};
use crate::fanout::router::ChannelRouter;
use crate::registry::ConnectionRegistry;
use crate::transport::{EvictionPolicy, Transport};

#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    pub echo_suppression: bool,
    /// Upper bound on a whole broadcast call.
    pub deadline: Duration,
    /// Sends in flight at once within one broadcast.
    pub max_in_flight: usize,
    pub eviction_policy: EvictionPolicy,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            echo_suppression: true,
            deadline: Duration::from_secs(5),
            max_in_flight: 64,
            eviction_policy: EvictionPolicy::RecipientGone,
        }
    }
}

impl From<&RelayConfig> for BroadcastConfig {
    fn from(config: &RelayConfig) -> Self {
        Self {
            echo_suppression: config.echo_suppression,
            deadline: config.broadcast_deadline(),
            max_in_flight: config.max_in_flight,
            eviction_policy: config.eviction_policy,
        }
    }
}

/// Fans a message out to a channel.
///
/// Every target is attempted independently; a failing or slow recipient
/// never fails the call or holds up its siblings past the deadline.
/// Recipients the transport reports as gone are unregistered as soon as
/// that is observed, which is the only way stale registry entries get
/// reclaimed. A concurrent `list_by_channel` may or may not see such an
/// eviction yet.
pub struct Broadcaster {
    router: ChannelRouter,
    registry: Arc<ConnectionRegistry>,
    transport: Arc<dyn Transport>,
    config: BroadcastConfig,
}

impl Broadcaster {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        transport: Arc<dyn Transport>,
        config: BroadcastConfig,
    ) -> Self {
        Self {
            router: ChannelRouter::new(registry.clone()),
            registry,
            transport,
            config,
        }
    }

    /// Resolves the channel and delivers. Only a failure to resolve targets
    /// is returned as an error; partial delivery is reported in the summary.
    /// The lookup and the deliveries share one deadline.
    pub async fn broadcast(&self, message: &Message) -> Result<BroadcastSummary, AppError> {
        let deadline = Instant::now() + self.config.deadline;

        let mut targets = timeout_at(deadline, self.router.resolve(&message.channel))
            .await
            .map_err(|_| {
                warn!("Resolving channel {} did not finish before the broadcast deadline", message.channel);
                StoreError::Unavailable(format!("timed out resolving channel {}", message.channel))
            })??;
        if self.config.echo_suppression {
            targets.retain(|id| *id != message.sender_connection_id);
        }
        Ok(self.deliver_until(message, targets, deadline).await)
    }

    pub async fn deliver(&self, message: &Message, targets: Vec<ConnectionId>) -> BroadcastSummary {
        self.deliver_until(message, targets, Instant::now() + self.config.deadline)
            .await
    }

    async fn deliver_until(
        &self,
        message: &Message,
        targets: Vec<ConnectionId>,
        deadline: Instant,
    ) -> BroadcastSummary {
        let target_count = targets.len();

        let outcomes: Vec<DeliveryOutcome> = stream::iter(targets)
            .map(|target| self.deliver_one(target, &message.payload, deadline))
            .buffer_unordered(self.config.max_in_flight.max(1))
            .collect()
            .await;
        let summary: BroadcastSummary = outcomes.into_iter().collect();

        info!(
            "Broadcast on {} from {}: {} targets, {} delivered, {} evicted, {} failed",
            message.channel,
            message.sender_connection_id,
            target_count,
            summary.delivered,
            summary.evicted,
            summary.failed
        );
        summary
    }

    async fn deliver_one(
        &self,
        connection_id: ConnectionId,
        payload: &[u8],
        deadline: Instant,
    ) -> DeliveryOutcome {
        if Instant::now() >= deadline {
            warn!("Broadcast deadline passed before sending to {}", connection_id);
            return DeliveryOutcome {
                connection_id,
                result: DeliveryResult::TransientFailure,
            };
        }

        let result = match timeout_at(deadline, self.attempt(&connection_id, payload)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Delivery to {} did not finish before the broadcast deadline", connection_id);
                DeliveryResult::TransientFailure
            }
        };

        DeliveryOutcome { connection_id, result }
    }

    async fn attempt(&self, connection_id: &str, payload: &[u8]) -> DeliveryResult {
        let err = match self.transport.send(connection_id, payload).await {
            Ok(()) => {
                debug!("Delivered to {}", connection_id);
                return DeliveryResult::Delivered;
            }
            Err(err) => err,
        };

        if !self.config.eviction_policy.should_evict(&err) {
            warn!("Transient delivery failure to {}: {}", connection_id, err);
            return DeliveryResult::TransientFailure;
        }

        match self.registry.unregister(connection_id).await {
            Ok(_) => {
                info!("Found stale connection {} ({}), evicted", connection_id, err);
                DeliveryResult::Stale
            }
            Err(e) => {
                warn!("Failed to evict stale connection {}: {}", connection_id, e);
                DeliveryResult::TransientFailure
            }
        }
    }
}
