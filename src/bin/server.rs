//! Real-time WebSocket chat server with broadcast functionality.
//!
//! Accepts raw TCP connections, performs the WebSocket upgrade handshake
//! and broadcasts chat messages between all joined clients.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin server
//! cargo run --bin server -- --host 0.0.0.0 --port 3000
//! ```

use clap::Parser;
use irori::common::logger::setup_logger;
use irori::server::{ServerConfig, WsServer};

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Real-time WebSocket chat server with broadcast support", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8081")]
    port: u16,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        ..ServerConfig::default()
    };

    let server = WsServer::new(config);
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
