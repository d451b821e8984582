//! Connection supervision: owns the full lifecycle of one client socket.
//!
//! A supervisor performs the upgrade handshake, then drives the frame read
//! loop, dispatching application messages through the usecases. All
//! outbound traffic for the connection goes through a single writer task,
//! so writes are serialized without the broadcaster ever blocking on the
//! socket.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::domain::{ChatUser, OutboundMessage, PusherChannel};
use crate::protocol::{
    self, ClientMessage, Frame, FrameError, HandshakeOutcome, OpCode,
};
use crate::usecase::{JoinRoomUseCase, LeaveRoomUseCase, SendMessageUseCase};

/// Lifecycle states of one client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Handshaking,
    Open,
    Joined,
    Closing,
    Closed,
}

/// Supervises one accepted connection end-to-end.
pub struct ConnectionSupervisor {
    connection_id: String,
    state: ConnectionState,
    join_usecase: Arc<JoinRoomUseCase>,
    send_usecase: Arc<SendMessageUseCase>,
    leave_usecase: Arc<LeaveRoomUseCase>,
    /// The ChatUser once a join succeeded; the room and registry own the
    /// authoritative entries, this is only the id/username snapshot.
    user: Option<ChatUser>,
}

impl ConnectionSupervisor {
    pub fn new(
        connection_id: String,
        join_usecase: Arc<JoinRoomUseCase>,
        send_usecase: Arc<SendMessageUseCase>,
        leave_usecase: Arc<LeaveRoomUseCase>,
    ) -> Self {
        Self {
            connection_id,
            state: ConnectionState::Handshaking,
            join_usecase,
            send_usecase,
            leave_usecase,
            user: None,
        }
    }

    /// Current lifecycle state of the connection.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Drive the connection to completion: handshake, frame read loop,
    /// then teardown. Never propagates errors to the caller; every
    /// failure is contained to this connection.
    pub async fn run<S>(mut self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, mut write_half) = tokio::io::split(stream);
        let mut reader = BufReader::new(read_half);

        // Handshaking
        let request_lines = match read_header_lines(&mut reader).await {
            Ok(lines) => lines,
            Err(e) => {
                tracing::debug!(
                    connection_id = %self.connection_id,
                    error = %e,
                    "failed to read handshake request"
                );
                return;
            }
        };
        match protocol::inspect(&request_lines) {
            HandshakeOutcome::Rejected => {
                tracing::warn!(
                    connection_id = %self.connection_id,
                    "websocket handshake rejected"
                );
                let _ = write_half
                    .write_all(protocol::bad_request_response().as_bytes())
                    .await;
                self.state = ConnectionState::Closed;
                return;
            }
            HandshakeOutcome::Accepted { accept_key } => {
                let response = protocol::switching_protocols_response(&accept_key);
                if let Err(e) = write_half.write_all(response.as_bytes()).await {
                    tracing::debug!(
                        connection_id = %self.connection_id,
                        error = %e,
                        "failed to write handshake response"
                    );
                    self.state = ConnectionState::Closed;
                    return;
                }
            }
        }
        self.state = ConnectionState::Open;
        tracing::debug!(connection_id = %self.connection_id, "websocket handshake completed");

        // Open: all outbound traffic goes through the writer task.
        let (tx, rx) = mpsc::unbounded_channel();
        let mut writer_task = tokio::spawn(write_loop(write_half, rx, self.connection_id.clone()));
        let mut writer_alive = true;

        loop {
            tokio::select! {
                frame = protocol::read_frame(&mut reader) => {
                    match frame {
                        Ok(frame) => {
                            if !self.dispatch(frame, &tx).await {
                                break;
                            }
                        }
                        Err(FrameError::ConnectionClosed) => {
                            tracing::debug!(
                                connection_id = %self.connection_id,
                                "peer closed the connection"
                            );
                            break;
                        }
                        Err(e) => {
                            tracing::debug!(
                                connection_id = %self.connection_id,
                                error = %e,
                                "connection error; treating as disconnect"
                            );
                            break;
                        }
                    }
                }
                _ = &mut writer_task, if writer_alive => {
                    writer_alive = false;
                    tracing::debug!(
                        connection_id = %self.connection_id,
                        "writer task ended; closing connection"
                    );
                    break;
                }
            }
        }

        // Closing: leave the room exactly once, then stop the writer.
        self.state = ConnectionState::Closing;
        if let Some(user) = self.user.take() {
            self.leave_usecase.execute(&user).await;
        }
        if writer_alive {
            let _ = tx.send(OutboundMessage::Close);
            let _ = writer_task.await;
        }
        self.state = ConnectionState::Closed;
        tracing::debug!(connection_id = %self.connection_id, "connection closed");
    }

    /// Handle one decoded frame. Returns `false` when the connection
    /// should transition to Closing.
    async fn dispatch(&mut self, frame: Frame, tx: &PusherChannel) -> bool {
        match frame.opcode {
            OpCode::Text => {
                match String::from_utf8(frame.payload) {
                    Ok(payload) => self.handle_text(&payload, tx).await,
                    Err(_) => {
                        tracing::warn!(
                            connection_id = %self.connection_id,
                            "non-UTF-8 text frame ignored"
                        );
                    }
                }
                true
            }
            OpCode::Ping => tx.send(OutboundMessage::Pong(frame.payload)).is_ok(),
            OpCode::Pong => true,
            OpCode::Close => {
                tracing::debug!(connection_id = %self.connection_id, "close frame received");
                false
            }
            other => {
                tracing::warn!(
                    connection_id = %self.connection_id,
                    opcode = ?other,
                    "unsupported opcode ignored"
                );
                true
            }
        }
    }

    /// Parse and dispatch one application message. Unrecognized or
    /// malformed payloads are ignored, never fatal.
    async fn handle_text(&mut self, payload: &str, tx: &PusherChannel) {
        match ClientMessage::parse(payload) {
            Ok(ClientMessage::Join { username }) => {
                if self.user.is_some() {
                    tracing::debug!(
                        connection_id = %self.connection_id,
                        "duplicate join ignored"
                    );
                    return;
                }
                self.user = self
                    .join_usecase
                    .execute(&self.connection_id, &username, tx.clone())
                    .await;
                if self.user.is_some() {
                    self.state = ConnectionState::Joined;
                }
            }
            Ok(ClientMessage::Message { content }) => match &self.user {
                Some(user) => {
                    self.send_usecase.execute(user, &content).await;
                }
                None => {
                    tracing::debug!(
                        connection_id = %self.connection_id,
                        "chat message before join ignored"
                    );
                }
            },
            Err(e) => {
                tracing::warn!(
                    connection_id = %self.connection_id,
                    error = %e,
                    "unparseable text payload ignored"
                );
            }
        }
    }
}

/// Read the upgrade request header lines, up to the empty line.
async fn read_header_lines<R>(reader: &mut R) -> std::io::Result<Vec<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = Vec::new();
    loop {
        let mut line = String::new();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            break;
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            break;
        }
        lines.push(line.to_string());
    }
    Ok(lines)
}

/// The exclusive send path of one connection. Encoding or write failures
/// end the task; the read side observes that and treats it as disconnect.
async fn write_loop<W>(
    mut write_half: W,
    mut rx: mpsc::UnboundedReceiver<OutboundMessage>,
    connection_id: String,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let (frame, closing) = match message {
            OutboundMessage::Text(text) => (Frame::text(text), false),
            OutboundMessage::Pong(payload) => (Frame::pong(payload), false),
            OutboundMessage::Close => (Frame::close(), true),
        };
        match protocol::encode(&frame) {
            Ok(bytes) => {
                if let Err(e) = write_half.write_all(&bytes).await {
                    tracing::debug!(
                        connection_id = %connection_id,
                        error = %e,
                        "write failed; closing connection"
                    );
                    return;
                }
            }
            Err(e) => {
                // PayloadTooLarge aborts this send only; the connection stays up.
                tracing::warn!(
                    connection_id = %connection_id,
                    error = %e,
                    "dropping outbound frame"
                );
            }
        }
        if closing {
            return;
        }
    }
}
