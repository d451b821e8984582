//! Real-time WebSocket chat server library.
//!
//! Clients open TCP connections, upgrade them to the WebSocket framed
//! protocol, join a shared room and exchange broadcast text messages. The
//! handshake and frame codec are implemented here on raw sockets; a
//! bounded worker pool with a caller-runs admission policy executes one
//! supervisor task per connection.

// layers
pub mod domain;
pub mod executor;
pub mod protocol;
pub mod server;
pub mod usecase;

// shared library
pub mod common;
