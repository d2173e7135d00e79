//! Durable connection storage.
//!
//! [`ConnectionStore`] is the contract: conditional put, conditional
//! delete, query by channel. Postgres backs it in production, a sharded
//! in-memory map in tests and single-node runs.

pub mod memory;
pub mod models;
pub mod operations;
pub mod store;

pub use memory::MemoryConnectionStore;
pub use models::{ConnectionId, ConnectionRecord};
pub use operations::{DbPoolStatus, PgConnectionStore};
pub use store::ConnectionStore;
