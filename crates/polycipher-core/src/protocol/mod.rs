//! Protocol module containing message types and the binary codec.

pub mod codec;
pub mod messages;

pub use codec::{decode_message, encode_message, payload_length, ProtocolError};
pub use messages::*;
