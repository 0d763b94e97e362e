//! TCP link to the responder.
//!
//! [`FramedLink`] turns a byte stream into a [`PeerLink`]: outgoing messages
//! are encoded and written whole, incoming frames are read header first and
//! then exactly the announced payload.

use async_trait::async_trait;
use polycipher_core::protocol::messages::{HEADER_SIZE, MAX_FRAME_PAYLOAD};
use polycipher_core::{decode_message, encode_message, payload_length, PeerMessage};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::application::ports::{LinkError, PeerLink};

/// A [`PeerLink`] over any async byte stream.
pub struct FramedLink<S> {
    stream: S,
}

impl FramedLink<TcpStream> {
    /// Connects to the responder at `addr` (`host:port`).
    ///
    /// # Errors
    ///
    /// [`LinkError::ConnectFailed`] if the TCP connection cannot be opened.
    pub async fn connect(addr: &str) -> Result<Self, LinkError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| LinkError::ConnectFailed {
                addr: addr.to_string(),
                source,
            })?;
        // Frames are small and interactive.
        stream.set_nodelay(true)?;
        info!(%addr, "connected to responder");
        Ok(Self::new(stream))
    }
}

impl<S> FramedLink<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl<S> PeerLink for FramedLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, msg: &PeerMessage) -> Result<(), LinkError> {
        let frame = encode_message(msg)?;
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        debug!(kind = msg.name(), bytes = frame.len(), "frame sent");
        Ok(())
    }

    async fn recv(&mut self) -> Result<PeerMessage, LinkError> {
        let mut frame = vec![0u8; HEADER_SIZE];
        match self.stream.read_exact(&mut frame).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(LinkError::Closed)
            }
            Err(e) => return Err(e.into()),
        }

        let len = payload_length(&frame)?;
        if len > MAX_FRAME_PAYLOAD {
            return Err(LinkError::FrameTooLarge(len));
        }
        frame.resize(HEADER_SIZE + len, 0);
        match self.stream.read_exact(&mut frame[HEADER_SIZE..]).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(LinkError::Closed)
            }
            Err(e) => return Err(e.into()),
        }

        let (msg, _) = decode_message(&frame)?;
        debug!(kind = msg.name(), bytes = frame.len(), "frame received");
        Ok(msg)
    }
}
