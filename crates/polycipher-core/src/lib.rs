//! # polycipher-core
//!
//! Shared library for polycipher containing the key table generator, the
//! polymorphic byte transform pipeline, the session state machine and the
//! binary wire codec.
//!
//! This crate is used by both the server (responder) and client (initiator)
//! applications.  It has zero dependencies on OS APIs or network sockets.
//!
//! # Architecture overview
//!
//! Two peers agree on three numbers during a handshake: the initiator sends
//! `P`, a seed `S` and a table size, the responder answers with `Q`.  Both
//! sides then derive the same table of 64-bit keys.  Every text message is
//! encrypted byte by byte through three reversible transforms (XOR, bit
//! rotation, additive offset) whose order and starting key are picked by a
//! 4-bit sequence number (PSN) that travels with the message.
//!
//! - **`domain`** – Pure cipher logic: key tables, PSN and schedule, and the
//!   transform pipeline.
//!
//! - **`protocol`** – How messages travel over the network.  The five message
//!   kinds are encoded into a compact binary format (8-byte header + payload)
//!   and decoded back into a typed [`PeerMessage`].
//!
//! - **`session`** – The per-connection state machine that drives the
//!   handshake, key rotation and teardown.
//!
//! ```rust
//! use polycipher_core::{decode_message, encode_message, Session, SessionEvent};
//!
//! let mut initiator = Session::initiator();
//! let mut responder = Session::responder(32452843);
//!
//! let fcm = initiator.begin_handshake(15485863, 123456789, 30).unwrap();
//! let wire = encode_message(&fcm).unwrap();
//! let (fcm, _) = decode_message(&wire).unwrap();
//! let SessionEvent::Reply(ack) = responder.handle(fcm).unwrap() else { unreachable!() };
//! initiator.handle(ack).unwrap();
//!
//! let rm = initiator.encode("hello").unwrap();
//! assert!(matches!(
//!     responder.handle(rm).unwrap(),
//!     SessionEvent::MessageDecoded { text, .. } if text == "hello"
//! ));
//! ```

pub mod domain;
pub mod protocol;
pub mod session;

// Re-export the most-used types at the crate root so callers can write
// `polycipher_core::Session` instead of `polycipher_core::session::Session`.
pub use domain::key_table::{KeyTable, ParameterSet};
pub use domain::pipeline::{decode_regular, decrypt, encode_regular, encrypt, CipherError};
pub use domain::sequence::{schedule, FunctionSequence, Psn, Transform};
pub use protocol::codec::{decode_message, encode_message, payload_length, ProtocolError};
pub use protocol::messages::PeerMessage;
pub use session::{Role, Session, SessionError, SessionEvent, SessionState, SessionStatus};
