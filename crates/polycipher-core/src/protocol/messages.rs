//! All polycipher protocol message types.
//!
//! A session uses exactly five messages: the FCM/FCM_ACK handshake, regular
//! encrypted messages (RM), key updates (KUM) and the close message (LCM).
//! Each variant carries only the fields it needs; the transport decodes the
//! tag once and hands a typed [`PeerMessage`] to the session.

use serde::{Deserialize, Serialize};

use crate::domain::sequence::Psn;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Current protocol version byte.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Total size of the common message header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Largest key table a peer may request in an FCM.
pub const MAX_KEY_TABLE_LEN: usize = 1 << 16;

/// Largest payload a reader accepts from a frame header.  Checked before the
/// payload buffer is allocated.
pub const MAX_FRAME_PAYLOAD: usize = 1 << 20;

// ── Message type codes ────────────────────────────────────────────────────────

/// Tag byte identifying each message on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    // Handshake (0x01–0x0F)
    FirstContact = 0x01,
    FirstContactAck = 0x02,
    // Data (0x10–0x1F)
    Regular = 0x10,
    // Key management (0x20–0x2F)
    KeyUpdate = 0x20,
    // Teardown (0x30–0x3F)
    Close = 0x30,
}

impl TryFrom<u8> for MessageType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x01 => Ok(MessageType::FirstContact),
            0x02 => Ok(MessageType::FirstContactAck),
            0x10 => Ok(MessageType::Regular),
            0x20 => Ok(MessageType::KeyUpdate),
            0x30 => Ok(MessageType::Close),
            _ => Err(()),
        }
    }
}

// ── Per-message payload structs ───────────────────────────────────────────────

/// FCM (0x01): initiator opens the session with its half of the parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstContactMessage {
    /// Initiator-chosen multiplier P.
    pub p: u64,
    /// Initial shared seed S.
    pub seed: u64,
    /// Number of keys both sides will generate.
    pub num_keys: usize,
}

/// RM (0x10): one encrypted text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegularMessage {
    /// One byte per plaintext character.
    pub ciphertext: Vec<u8>,
    /// Sequence number the sender used; the receiver needs it to decode.
    pub psn: Psn,
}

// ── Top-level message enum ────────────────────────────────────────────────────

/// Every message two peers can exchange, discriminated by type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerMessage {
    /// FCM: `P`, `S` and `num_keys` from the initiator.
    FirstContact(FirstContactMessage),
    /// FCM_ACK: the responder's `Q`.
    FirstContactAck { q: u64 },
    /// RM: encrypted text plus its PSN.
    Regular(RegularMessage),
    /// KUM: the new seed both sides regenerate from.
    KeyUpdate { seed: u64 },
    /// LCM: tear the session down.
    Close,
}

impl PeerMessage {
    /// Returns the [`MessageType`] discriminant for this message.
    pub fn message_type(&self) -> MessageType {
        match self {
            PeerMessage::FirstContact(_) => MessageType::FirstContact,
            PeerMessage::FirstContactAck { .. } => MessageType::FirstContactAck,
            PeerMessage::Regular(_) => MessageType::Regular,
            PeerMessage::KeyUpdate { .. } => MessageType::KeyUpdate,
            PeerMessage::Close => MessageType::Close,
        }
    }

    /// Short protocol name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            PeerMessage::FirstContact(_) => "FCM",
            PeerMessage::FirstContactAck { .. } => "FCM_ACK",
            PeerMessage::Regular(_) => "RM",
            PeerMessage::KeyUpdate { .. } => "KUM",
            PeerMessage::Close => "LCM",
        }
    }
}
