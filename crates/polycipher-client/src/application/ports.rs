//! Traits at the edge of the application layer.

use async_trait::async_trait;
use polycipher_core::protocol::messages::MAX_FRAME_PAYLOAD;
use polycipher_core::{PeerMessage, ProtocolError};
use thiserror::Error;

/// Errors raised by a [`PeerLink`].
#[derive(Debug, Error)]
pub enum LinkError {
    /// Connecting to the responder failed.
    #[error("failed to connect to {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error occurred on the established connection.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A frame header announced a payload above [`MAX_FRAME_PAYLOAD`].
    #[error("frame payload of {0} bytes exceeds the {MAX_FRAME_PAYLOAD} byte limit")]
    FrameTooLarge(usize),

    /// The responder closed the connection.
    #[error("connection closed by responder")]
    Closed,
}

/// A message-level connection to the responder.
#[async_trait]
pub trait PeerLink: Send {
    /// Sends one message.
    async fn send(&mut self, msg: &PeerMessage) -> Result<(), LinkError>;

    /// Waits for the next message.
    async fn recv(&mut self) -> Result<PeerMessage, LinkError>;
}

/// The user's terminal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Console: Send {
    /// Shows `prompt` and returns the next line of input, or `None` once input
    /// is exhausted.
    async fn prompt(&mut self, prompt: &str) -> std::io::Result<Option<String>>;

    /// Prints one line of output.
    fn show(&mut self, line: &str);
}
