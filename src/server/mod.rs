//! WebSocket chat server implementation.

mod connection;
mod registry;
mod runner;
mod signal;

pub use connection::{ConnectionState, ConnectionSupervisor};
pub use registry::ConnectionRegistry;
pub use runner::{ServerConfig, WsServer};
pub use signal::shutdown_signal;
