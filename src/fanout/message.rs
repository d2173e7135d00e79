use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::db::ConnectionId;

/// One inbound chat message, alive for a single broadcast.
#[derive(Debug, Clone)]
pub struct Message {
    pub channel: String,
    pub sender_connection_id: ConnectionId,
    pub payload: Arc<[u8]>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(
        channel: impl Into<String>,
        sender_connection_id: impl Into<ConnectionId>,
        payload: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            channel: channel.into(),
            sender_connection_id: sender_connection_id.into(),
            payload: payload.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryResult {
    Delivered,
    /// Recipient was gone and has been unregistered.
    Stale,
    TransientFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryOutcome {
    pub connection_id: ConnectionId,
    pub result: DeliveryResult,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastSummary {
    pub delivered: usize,
    pub evicted: usize,
    pub failed: usize,
    pub outcomes: Vec<DeliveryOutcome>,
}

impl BroadcastSummary {
    pub fn record(&mut self, outcome: DeliveryOutcome) {
        match outcome.result {
            DeliveryResult::Delivered => self.delivered += 1,
            DeliveryResult::Stale => self.evicted += 1,
            DeliveryResult::TransientFailure => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }

    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn result_for(&self, connection_id: &str) -> Option<DeliveryResult> {
        self.outcomes
            .iter()
            .find(|o| o.connection_id == connection_id)
            .map(|o| o.result)
    }
}

impl FromIterator<DeliveryOutcome> for BroadcastSummary {
    fn from_iter<I: IntoIterator<Item = DeliveryOutcome>>(iter: I) -> Self {
        let mut summary = Self::default();
        for outcome in iter {
            summary.record(outcome);
        }
        summary
    }
}
