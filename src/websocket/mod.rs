//! WebSocket front-end
//!
//! Terminates client sockets, feeds connect/disconnect/message events into
//! the relay, and implements the transport the broadcaster pushes through.

mod connection;
mod pool;
mod protocol;
mod server;

pub use connection::Session;
pub use pool::SessionPool;
pub use protocol::{ClientMessage, ServerMessage};
pub use server::{WebSocketServer, WebSocketSettings};
