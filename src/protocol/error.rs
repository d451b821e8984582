//! Error types for the wire-level protocol engine.

use thiserror::Error;

/// Errors produced by the frame codec.
///
/// `ConnectionClosed` is the graceful end-of-stream signal (EOF before the
/// first header byte of a frame) and is not a protocol violation.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The peer closed the stream cleanly between frames.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// The frame announced a 64-bit extended payload length, which this
    /// server does not support.
    #[error("unsupported frame size: 64-bit extended payload length")]
    UnsupportedFrameSize,

    /// An outbound payload exceeds what a 16-bit length field can carry.
    /// The send is aborted; the connection itself stays usable.
    #[error("payload too large for a single frame: {0} bytes")]
    PayloadTooLarge(usize),

    /// Transient I/O failure mid-frame; treated as a disconnect.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
