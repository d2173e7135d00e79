//! Fanout: resolve a channel's members and deliver one message to each.

mod broadcaster;
mod message;
mod router;

pub use broadcaster::{BroadcastConfig, Broadcaster};
pub use message::{BroadcastSummary, DeliveryOutcome, DeliveryResult, Message};
pub use router::ChannelRouter;
