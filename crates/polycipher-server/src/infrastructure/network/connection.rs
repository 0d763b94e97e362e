//! Per-connection frame I/O and message loop.
//!
//! Frames are read in two steps: the fixed 8-byte header, then exactly
//! `payload_len` more bytes.  A bad header (wrong version, absurd length)
//! leaves the stream unsynchronised, so it ends the connection.  A bad
//! payload is contained in its frame and is only skipped.

use polycipher_core::protocol::messages::{HEADER_SIZE, MAX_FRAME_PAYLOAD};
use polycipher_core::{decode_message, encode_message, payload_length, PeerMessage, ProtocolError};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::application::respond::{ConnectionStats, Disposition, RespondUseCase, ResponderSettings};

/// Errors that end a connection.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The listening socket could not be bound.
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error occurred on the established connection.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The frame header could not be trusted.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The header announced a payload larger than [`MAX_FRAME_PAYLOAD`].
    #[error("frame payload of {0} bytes exceeds the {MAX_FRAME_PAYLOAD} byte limit")]
    FrameTooLarge(usize),
}

/// Reads one complete frame (header + payload).
///
/// Returns `Ok(None)` when the peer closed the stream between frames.
///
/// # Errors
///
/// [`NetworkError::Protocol`] for a bad header, [`NetworkError::FrameTooLarge`]
/// for an oversized payload and [`NetworkError::Io`] for read failures.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, NetworkError>
where
    R: AsyncRead + Unpin,
{
    let mut frame = vec![0u8; HEADER_SIZE];
    match reader.read_exact(&mut frame).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let payload_len = payload_length(&frame)?;
    if payload_len > MAX_FRAME_PAYLOAD {
        return Err(NetworkError::FrameTooLarge(payload_len));
    }

    frame.resize(HEADER_SIZE + payload_len, 0);
    reader.read_exact(&mut frame[HEADER_SIZE..]).await?;
    Ok(Some(frame))
}

/// Encodes `msg` and writes it as one frame.
///
/// # Errors
///
/// [`NetworkError::Protocol`] if encoding fails, [`NetworkError::Io`] if the
/// write fails.
pub async fn write_message<W>(writer: &mut W, msg: &PeerMessage) -> Result<(), NetworkError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = encode_message(msg)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    debug!(msg = msg.name(), len = bytes.len(), "sent");
    Ok(())
}

/// Runs the responder for one connection until LCM, EOF or a fatal error.
///
/// Every connection gets a fresh session.  Returns the connection's counters
/// when it ends cleanly.
///
/// # Errors
///
/// Any [`NetworkError`] from the stream.  The session is cleared either way.
pub async fn serve_connection<S>(
    mut stream: S,
    settings: ResponderSettings,
) -> Result<ConnectionStats, NetworkError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut use_case = RespondUseCase::new(settings);

    let result = loop {
        let frame = match read_frame(&mut stream).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("connection closed by peer");
                break Ok(());
            }
            Err(e) => break Err(e),
        };

        let msg = match decode_message(&frame) {
            Ok((msg, _)) => msg,
            Err(e) => {
                use_case.on_malformed(e);
                continue;
            }
        };

        match use_case.on_message(msg) {
            Disposition::Reply(reply) => {
                if let Err(e) = write_message(&mut stream, &reply).await {
                    break Err(e);
                }
            }
            Disposition::Delivered(_) | Disposition::Continue => {}
            Disposition::Close => break Ok(()),
        }
    };

    use_case.on_disconnect();
    let stats = use_case.stats();
    info!(
        received = stats.received,
        rotations = stats.rotations,
        rejected = stats.rejected,
        "session ended"
    );
    result.map(|()| stats)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
