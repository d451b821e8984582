//! Wire-level protocol engine.
//!
//! Pure encode/decode of WebSocket frames, the one-shot upgrade handshake,
//! and the application JSON schema. Nothing in this module owns a socket.

mod error;
mod frame;
mod handshake;
mod message;

pub use error::FrameError;
pub use frame::{Frame, MAX_FRAME_PAYLOAD, OpCode, encode, read_frame};
pub use handshake::{
    HandshakeOutcome, WS_MAGIC_GUID, accept_key, bad_request_response, inspect,
    switching_protocols_response,
};
pub use message::{ClientMessage, ServerMessage};
