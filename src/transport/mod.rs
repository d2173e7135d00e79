//! Transport boundary.
//!
//! The fanout core only needs to push bytes at a connection id and learn
//! whether that connection is gone. Whatever owns the client sockets
//! implements [`Transport`]; see `websocket::SessionPool`.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peer session no longer exists.
    #[error("Recipient gone")]
    RecipientGone,

    #[error("Send failed: {0}")]
    Failed(String),
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, connection_id: &str, payload: &[u8]) -> Result<(), TransportError>;
}

/// Decides which send failures mean the registry entry is stale.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Only an explicit [`TransportError::RecipientGone`] evicts.
    #[default]
    RecipientGone,
    /// Any send failure evicts.
    AnyFailure,
}

impl EvictionPolicy {
    pub fn should_evict(&self, err: &TransportError) -> bool {
        match (self, err) {
            (_, TransportError::RecipientGone) => true,
            (EvictionPolicy::AnyFailure, TransportError::Failed(_)) => true,
            (EvictionPolicy::RecipientGone, TransportError::Failed(_)) => false,
        }
    }
}
