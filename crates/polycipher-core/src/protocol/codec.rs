//! Binary codec for encoding and decoding polycipher protocol messages.
//!
//! Wire format:
//! ```text
//! [version:1][msg_type:1][reserved:2][payload_len:4][payload:N]
//! ```
//! Total header size: 8 bytes. All multi-byte integers are big-endian.
//!
//! Payloads:
//! ```text
//! FCM      [p:8][seed:8][num_keys:4]
//! FCM_ACK  [q:8]
//! RM       [psn:1][len:4][ciphertext:len]
//! KUM      [seed:8]
//! LCM      (empty)
//! ```

use thiserror::Error;

use crate::domain::sequence::Psn;
use crate::protocol::messages::{
    FirstContactMessage, MessageType, PeerMessage, RegularMessage, HEADER_SIZE, MAX_KEY_TABLE_LEN,
    PROTOCOL_VERSION,
};

/// Errors that can occur during message encoding or decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The message type byte in the header is not a recognized value.
    #[error("unknown message type: 0x{0:02X}")]
    UnknownMessageType(u8),

    /// The protocol version in the header is not supported.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// The payload could not be parsed (field out of range, wrong length, etc.).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The encoded payload length field does not match the actual data available.
    #[error("payload length mismatch: header says {declared}, available is {available}")]
    PayloadLengthMismatch { declared: usize, available: usize },
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`PeerMessage`] into a byte vector including the 8-byte header.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if a field does not fit its
/// wire width (a key count or ciphertext longer than `u32::MAX`).
///
/// # Examples
///
/// ```rust
/// use polycipher_core::protocol::{decode_message, encode_message, PeerMessage};
///
/// let msg = PeerMessage::KeyUpdate { seed: 42 };
/// let bytes = encode_message(&msg).unwrap();
/// let (decoded, consumed) = decode_message(&bytes).unwrap();
/// assert_eq!(decoded, msg);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_message(msg: &PeerMessage) -> Result<Vec<u8>, ProtocolError> {
    let payload = encode_payload(msg)?;
    let payload_len = u32::try_from(payload.len())
        .map_err(|_| ProtocolError::MalformedPayload("payload exceeds u32::MAX".to_string()))?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());

    // Header: version (1) + msg_type (1) + reserved (2) + payload_len (4) = 8 bytes
    buf.push(PROTOCOL_VERSION);
    buf.push(msg.message_type() as u8);
    buf.push(0x00); // reserved
    buf.push(0x00); // reserved
    buf.extend_from_slice(&payload_len.to_be_bytes());

    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decodes one [`PeerMessage`] from the beginning of `bytes`.
///
/// Returns the decoded message and the total number of bytes consumed
/// (header + payload), so the caller can advance their read cursor.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the bytes are malformed.
pub fn decode_message(bytes: &[u8]) -> Result<(PeerMessage, usize), ProtocolError> {
    let payload_len = payload_length(bytes)?;

    let msg_type_byte = bytes[1];
    let msg_type = MessageType::try_from(msg_type_byte)
        .map_err(|_| ProtocolError::UnknownMessageType(msg_type_byte))?;

    let total_needed = HEADER_SIZE + payload_len;
    if bytes.len() < total_needed {
        return Err(ProtocolError::PayloadLengthMismatch {
            declared: payload_len,
            available: bytes.len() - HEADER_SIZE,
        });
    }

    let payload = &bytes[HEADER_SIZE..total_needed];
    let msg = decode_payload(msg_type, payload)?;
    Ok((msg, total_needed))
}

/// Validates a header and returns how many payload bytes follow it.
///
/// Stream readers call this after reading [`HEADER_SIZE`] bytes to learn how
/// much more to read before calling [`decode_message`].
///
/// # Errors
///
/// [`ProtocolError::InsufficientData`] for a short header and
/// [`ProtocolError::UnsupportedVersion`] for a foreign version byte.
pub fn payload_length(header: &[u8]) -> Result<usize, ProtocolError> {
    if header.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: header.len(),
        });
    }

    let version = header[0];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    // header[2..4] is reserved – ignored on decode
    Ok(u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize)
}

// ── Payload encoding ──────────────────────────────────────────────────────────

fn encode_payload(msg: &PeerMessage) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::new();
    match msg {
        PeerMessage::FirstContact(m) => encode_first_contact(&mut buf, m)?,
        PeerMessage::FirstContactAck { q } => buf.extend_from_slice(&q.to_be_bytes()),
        PeerMessage::Regular(m) => encode_regular(&mut buf, m)?,
        PeerMessage::KeyUpdate { seed } => buf.extend_from_slice(&seed.to_be_bytes()),
        PeerMessage::Close => {} // empty payload
    }
    Ok(buf)
}

fn encode_first_contact(buf: &mut Vec<u8>, m: &FirstContactMessage) -> Result<(), ProtocolError> {
    let num_keys = u32::try_from(m.num_keys).map_err(|_| {
        ProtocolError::MalformedPayload(format!("num_keys {} does not fit in u32", m.num_keys))
    })?;
    buf.extend_from_slice(&m.p.to_be_bytes());
    buf.extend_from_slice(&m.seed.to_be_bytes());
    buf.extend_from_slice(&num_keys.to_be_bytes());
    Ok(())
}

fn encode_regular(buf: &mut Vec<u8>, m: &RegularMessage) -> Result<(), ProtocolError> {
    let len = u32::try_from(m.ciphertext.len())
        .map_err(|_| ProtocolError::MalformedPayload("ciphertext exceeds u32::MAX".to_string()))?;
    buf.push(m.psn.value());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(&m.ciphertext);
    Ok(())
}

// ── Payload decoding ──────────────────────────────────────────────────────────

fn decode_payload(msg_type: MessageType, payload: &[u8]) -> Result<PeerMessage, ProtocolError> {
    match msg_type {
        MessageType::FirstContact => decode_first_contact(payload).map(PeerMessage::FirstContact),
        MessageType::FirstContactAck => {
            require_exact_len(payload, 8, "FirstContactAck")?;
            Ok(PeerMessage::FirstContactAck {
                q: read_u64(payload, 0)?,
            })
        }
        MessageType::Regular => decode_regular(payload).map(PeerMessage::Regular),
        MessageType::KeyUpdate => {
            require_exact_len(payload, 8, "KeyUpdate")?;
            Ok(PeerMessage::KeyUpdate {
                seed: read_u64(payload, 0)?,
            })
        }
        MessageType::Close => {
            require_exact_len(payload, 0, "Close")?;
            Ok(PeerMessage::Close)
        }
    }
}

fn decode_first_contact(p: &[u8]) -> Result<FirstContactMessage, ProtocolError> {
    // 8 (p) + 8 (seed) + 4 (num_keys) = 20
    require_exact_len(p, 20, "FirstContact")?;
    let num_keys = read_u32(p, 16)? as usize;
    if num_keys > MAX_KEY_TABLE_LEN {
        return Err(ProtocolError::MalformedPayload(format!(
            "FirstContact: num_keys {num_keys} exceeds limit {MAX_KEY_TABLE_LEN}"
        )));
    }
    Ok(FirstContactMessage {
        p: read_u64(p, 0)?,
        seed: read_u64(p, 8)?,
        num_keys,
    })
}

fn decode_regular(p: &[u8]) -> Result<RegularMessage, ProtocolError> {
    // 1 (psn) + 4 (len) + ciphertext
    require_len(p, 5, "Regular")?;
    let psn = Psn::new(p[0]).ok_or_else(|| {
        ProtocolError::MalformedPayload(format!("Regular: psn {} is not a 4-bit value", p[0]))
    })?;
    let len = read_u32(p, 1)? as usize;
    require_exact_len(p, 5 + len, "Regular.ciphertext")?;
    Ok(RegularMessage {
        ciphertext: p[5..].to_vec(),
        psn,
    })
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn require_len(buf: &[u8], needed: usize, context: &str) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(ProtocolError::MalformedPayload(format!(
            "{context}: need {needed} bytes, got {}",
            buf.len()
        )))
    } else {
        Ok(())
    }
}

/// Like [`require_len`] but also rejects trailing bytes, so a message with
/// extra fields is treated as malformed rather than silently truncated.
fn require_exact_len(buf: &[u8], expected: usize, context: &str) -> Result<(), ProtocolError> {
    if buf.len() != expected {
        Err(ProtocolError::MalformedPayload(format!(
            "{context}: expected {expected} bytes, got {}",
            buf.len()
        )))
    } else {
        Ok(())
    }
}

fn read_u64(buf: &[u8], offset: usize) -> Result<u64, ProtocolError> {
    let bytes: [u8; 8] = buf
        .get(offset..offset + 8)
        .and_then(|s| s.try_into().ok())
        .ok_or(ProtocolError::InsufficientData {
            needed: offset + 8,
            available: buf.len(),
        })?;
    Ok(u64::from_be_bytes(bytes))
}

fn read_u32(buf: &[u8], offset: usize) -> Result<u32, ProtocolError> {
    let bytes: [u8; 4] = buf
        .get(offset..offset + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or(ProtocolError::InsufficientData {
            needed: offset + 4,
            available: buf.len(),
        })?;
    Ok(u32::from_be_bytes(bytes))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
