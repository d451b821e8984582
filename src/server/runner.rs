//! Server execution logic.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use uuid::Uuid;

use crate::common::time::{Clock, SystemClock};
use crate::domain::{ChatRoom, MessagePusher, RoomConfig};
use crate::executor::{PoolConfig, Scheduler, WorkerPool};
use crate::usecase::{JoinRoomUseCase, LeaveRoomUseCase, SendMessageUseCase};

use super::connection::ConnectionSupervisor;
use super::registry::ConnectionRegistry;
use super::signal::shutdown_signal;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port number to bind to.
    pub port: u16,
    /// Worker pool sizing.
    pub pool: PoolConfig,
    /// Room capacity and inactivity settings.
    pub room: RoomConfig,
    /// Interval between inactivity sweeps.
    pub cleanup_interval: Duration,
    /// Interval between worker pool metrics reports.
    pub metrics_interval: Duration,
    /// Grace period for worker pool shutdown.
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8081,
            pool: PoolConfig::default(),
            room: RoomConfig::default(),
            cleanup_interval: Duration::from_secs(5 * 60),
            metrics_interval: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// WebSocket chat server
///
/// Wires together the room, the connection registry, the worker pool, the
/// scheduler and the usecases, then drives the accept loop.
///
/// # Example
///
/// ```ignore
/// let server = WsServer::new(ServerConfig::default());
/// server.run().await?;
/// ```
pub struct WsServer {
    config: ServerConfig,
    room: Arc<ChatRoom>,
    registry: Arc<ConnectionRegistry>,
    pool: Arc<WorkerPool>,
    scheduler: Arc<Scheduler>,
    join_usecase: Arc<JoinRoomUseCase>,
    send_usecase: Arc<SendMessageUseCase>,
    leave_usecase: Arc<LeaveRoomUseCase>,
}

impl WsServer {
    /// Create a new server. Must be called from within a tokio runtime
    /// (the worker pool spawns its core workers immediately).
    ///
    /// Wiring order: room → registry → pool/scheduler → usecases.
    pub fn new(config: ServerConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let room = Arc::new(ChatRoom::with_config(
            Uuid::new_v4().to_string(),
            "main",
            config.room.clone(),
            Arc::clone(&clock),
        ));
        let registry = Arc::new(ConnectionRegistry::new());
        let pool = Arc::new(WorkerPool::new(config.pool.clone()));
        let scheduler = Arc::new(Scheduler::new());

        let pusher: Arc<dyn MessagePusher> = registry.clone();
        let join_usecase = Arc::new(JoinRoomUseCase::new(
            Arc::clone(&room),
            pusher.clone(),
            Arc::clone(&clock),
        ));
        let send_usecase = Arc::new(SendMessageUseCase::new(
            Arc::clone(&room),
            pusher.clone(),
            Arc::clone(&clock),
        ));
        let leave_usecase = Arc::new(LeaveRoomUseCase::new(Arc::clone(&room), pusher));

        // Periodic maintenance, isolated from the connection workload.
        {
            let room = Arc::clone(&room);
            scheduler.schedule_at_fixed_rate(
                "room-cleanup",
                config.cleanup_interval,
                config.cleanup_interval,
                move || {
                    room.sweep_inactive();
                    Ok(())
                },
            );
        }
        {
            let pool = Arc::clone(&pool);
            scheduler.schedule_at_fixed_rate(
                "pool-metrics",
                config.metrics_interval,
                config.metrics_interval,
                move || {
                    let stats = pool.stats();
                    tracing::info!(
                        pool_size = stats.pool_size,
                        active = stats.active_count,
                        completed = stats.completed_count,
                        queue = stats.queue_size,
                        queue_remaining = stats.queue_remaining_capacity,
                        "worker pool stats"
                    );
                    Ok(())
                },
            );
        }

        Self {
            config,
            room,
            registry,
            pool,
            scheduler,
            join_usecase,
            send_usecase,
            leave_usecase,
        }
    }

    /// The room this server hosts.
    pub fn room(&self) -> &Arc<ChatRoom> {
        &self.room
    }

    /// Run the WebSocket chat server until a shutdown signal arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the configured
    /// address.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!(
            "WebSocket chat server listening on {}",
            listener.local_addr()?
        );
        tracing::info!("Connect to: ws://{}/", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await
    }

    /// Accept connections until `shutdown` completes, then shut down
    /// gracefully. Split from [`WsServer::run`] so tests can bind an
    /// ephemeral port.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        tokio::pin!(shutdown);
        let mut connection_counter: u64 = 0;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown signal received");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            connection_counter += 1;
                            let connection_id = connection_counter;
                            tracing::debug!(
                                connection_id,
                                peer = %peer,
                                "connection accepted"
                            );
                            let supervisor = ConnectionSupervisor::new(
                                connection_id.to_string(),
                                Arc::clone(&self.join_usecase),
                                Arc::clone(&self.send_usecase),
                                Arc::clone(&self.leave_usecase),
                            );
                            // Under saturation the pool runs this on the
                            // caller, which throttles the accept loop.
                            if let Err(e) = self.pool.execute(supervisor.run(stream)).await {
                                tracing::warn!(error = %e, "connection dropped; pool is shutting down");
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "failed to accept connection");
                        }
                    }
                }
            }
        }

        self.registry.close_all();
        if let Err(e) = self.pool.shutdown(self.config.shutdown_grace).await {
            tracing::warn!(error = %e, "worker pool did not shut down cleanly");
        }
        self.scheduler.shutdown();
        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
