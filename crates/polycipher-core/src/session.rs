//! Per-connection session state machine.
//!
//! A [`Session`] is owned by whichever task owns the connection.  The
//! transport decodes each frame into a [`PeerMessage`], hands it to
//! [`Session::handle`], and writes back any reply carried by the returned
//! [`SessionEvent`].  Outgoing traffic is produced by [`Session::begin_handshake`],
//! [`Session::encode`], [`Session::rotate`] and [`Session::close`].
//!
//! ```text
//! Initiator:  Uninitialized --send FCM--> AwaitingHandshake --recv FCM_ACK--> Ready
//! Responder:  Uninitialized --recv FCM--> Ready (replies FCM_ACK)
//! Ready --RM / KUM--> Ready
//! any --LCM / disconnect--> Closed
//! ```
//!
//! Every error returned here is per-message: the session is left exactly as
//! it was and the caller decides whether to keep the connection.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::key_table::{KeyTable, ParameterSet};
use crate::domain::pipeline::{decode_regular, encode_regular, CipherError};
use crate::domain::sequence::Psn;
use crate::protocol::codec::ProtocolError;
use crate::protocol::messages::{FirstContactMessage, PeerMessage, RegularMessage, MAX_KEY_TABLE_LEN};

/// Which side of the handshake this peer plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Picks P, S and the table size and sends the FCM.
    Initiator,
    /// Owns Q and answers the FCM.
    Responder,
}

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No parameters and no key table.
    Uninitialized,
    /// Initiator only: FCM sent, Q not yet known.
    AwaitingHandshake,
    /// Key table built; regular messages and rotations may flow.
    Ready,
    /// Torn down.  Nothing is processed until [`Session::reopen`].
    Closed,
}

/// Errors produced while driving a session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// A handshake message arrived out of order or for the wrong role.
    #[error("handshake error: {0}")]
    Handshake(String),

    /// A regular message or key update arrived before the key table exists.
    #[error("key table not initialised")]
    UninitializedTable,

    /// The frame could not be decoded into a message.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Encoding or decoding the message body failed.
    #[error(transparent)]
    Cipher(#[from] CipherError),

    /// The session has been closed.
    #[error("session is closed")]
    Closed,
}

impl From<ProtocolError> for SessionError {
    fn from(err: ProtocolError) -> Self {
        SessionError::MalformedMessage(err.to_string())
    }
}

/// What happened as a result of an incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The message must be answered with this reply (responder FCM → FCM_ACK).
    Reply(PeerMessage),
    /// Initiator received FCM_ACK and built its table.
    HandshakeComplete,
    /// A regular message was decrypted.
    MessageDecoded { text: String, psn: Psn },
    /// The key table was regenerated from a new seed.
    KeysRotated { seed: u64 },
    /// The peer closed the session.
    Closed,
}

/// Serialisable snapshot of a session for display and logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub role: Role,
    pub state: SessionState,
    pub params: Option<ParameterSet>,
    pub key_count: usize,
    pub last_psn: Option<Psn>,
}

/// State held by one peer for one connection.
#[derive(Debug, Clone)]
pub struct Session {
    role: Role,
    state: SessionState,
    /// Responder's own Q.  Survives close so the session can be reopened.
    local_q: Option<u64>,
    /// Initiator's FCM fields while waiting for the acknowledgement.
    pending: Option<FirstContactMessage>,
    params: Option<ParameterSet>,
    key_table: Option<KeyTable>,
    last_psn: Option<Psn>,
}

impl Session {
    /// Creates an initiator session in [`SessionState::Uninitialized`].
    pub fn initiator() -> Self {
        Self::new(Role::Initiator, None)
    }

    /// Creates a responder session that will answer an FCM with `q`.
    pub fn responder(q: u64) -> Self {
        Self::new(Role::Responder, Some(q))
    }

    fn new(role: Role, local_q: Option<u64>) -> Self {
        Self {
            role,
            state: SessionState::Uninitialized,
            local_q,
            pending: None,
            params: None,
            key_table: None,
            last_psn: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Parameters in force, once the handshake has completed.
    pub fn params(&self) -> Option<&ParameterSet> {
        self.params.as_ref()
    }

    pub fn key_table(&self) -> Option<&KeyTable> {
        self.key_table.as_ref()
    }

    /// PSN of the last message this peer sent.
    pub fn last_psn(&self) -> Option<Psn> {
        self.last_psn
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            role: self.role,
            state: self.state,
            params: self.params,
            key_count: self.key_table.as_ref().map_or(0, KeyTable::len),
            last_psn: self.last_psn,
        }
    }

    // ── Outgoing ──────────────────────────────────────────────────────────────

    /// Initiator: records `(p, seed, num_keys)` and returns the FCM to send.
    ///
    /// # Errors
    ///
    /// [`SessionError::Handshake`] when called on a responder, when the session
    /// is not `Uninitialized`, or when `num_keys` exceeds the protocol limit.
    pub fn begin_handshake(
        &mut self,
        p: u64,
        seed: u64,
        num_keys: usize,
    ) -> Result<PeerMessage, SessionError> {
        self.ensure_open()?;
        if self.role != Role::Initiator {
            return Err(SessionError::Handshake(
                "only the initiator sends FCM".to_string(),
            ));
        }
        if self.state != SessionState::Uninitialized {
            return Err(SessionError::Handshake(format!(
                "cannot send FCM in state {:?}",
                self.state
            )));
        }
        if num_keys > MAX_KEY_TABLE_LEN {
            return Err(SessionError::Handshake(format!(
                "num_keys {num_keys} exceeds limit {MAX_KEY_TABLE_LEN}"
            )));
        }

        let fcm = FirstContactMessage { p, seed, num_keys };
        self.pending = Some(fcm);
        self.transition(SessionState::AwaitingHandshake);
        Ok(PeerMessage::FirstContact(fcm))
    }

    /// Encrypts `text` into an RM, chaining its PSN from the previous send.
    ///
    /// # Errors
    ///
    /// [`SessionError::UninitializedTable`] before the handshake completes and
    /// [`SessionError::Cipher`] for text the pipeline cannot carry.
    pub fn encode(&mut self, text: &str) -> Result<PeerMessage, SessionError> {
        self.ensure_open()?;
        let table = self.key_table.as_ref().ok_or(SessionError::UninitializedTable)?;
        let (ciphertext, psn) = encode_regular(text, table, self.last_psn)?;
        debug!(psn = psn.value(), len = ciphertext.len(), "encoded regular message");
        self.last_psn = Some(psn);
        Ok(PeerMessage::Regular(RegularMessage { ciphertext, psn }))
    }

    /// Regenerates the local table from `new_seed` and returns the KUM that
    /// tells the peer to do the same.
    ///
    /// # Errors
    ///
    /// [`SessionError::UninitializedTable`] unless the session is `Ready`.
    pub fn rotate(&mut self, new_seed: u64) -> Result<PeerMessage, SessionError> {
        self.ensure_open()?;
        self.apply_seed(new_seed)?;
        Ok(PeerMessage::KeyUpdate { seed: new_seed })
    }

    /// Clears the session and returns the LCM to send.
    pub fn close(&mut self) -> PeerMessage {
        self.clear();
        PeerMessage::Close
    }

    // ── Incoming ──────────────────────────────────────────────────────────────

    /// Applies one message received from the peer.
    ///
    /// # Errors
    ///
    /// Any error leaves the session unchanged.  [`SessionError::Closed`] is
    /// returned for everything received after close.
    pub fn handle(&mut self, msg: PeerMessage) -> Result<SessionEvent, SessionError> {
        self.ensure_open()?;
        debug!(msg = msg.name(), state = ?self.state, "handling message");

        match msg {
            PeerMessage::FirstContact(fcm) => self.on_first_contact(fcm),
            PeerMessage::FirstContactAck { q } => self.on_first_contact_ack(q),
            PeerMessage::Regular(rm) => self.on_regular(rm),
            PeerMessage::KeyUpdate { seed } => {
                self.apply_seed(seed)?;
                Ok(SessionEvent::KeysRotated { seed })
            }
            PeerMessage::Close => {
                self.clear();
                Ok(SessionEvent::Closed)
            }
        }
    }

    /// The transport lost the connection.
    pub fn on_disconnect(&mut self) {
        if self.state != SessionState::Closed {
            warn!(state = ?self.state, "connection lost");
        }
        self.clear();
    }

    /// Returns a closed session to `Uninitialized`, keeping its role and, for
    /// a responder, its Q.  Has no effect on a session that is not closed.
    pub fn reopen(&mut self) {
        if self.state == SessionState::Closed {
            self.transition(SessionState::Uninitialized);
        }
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn on_first_contact(&mut self, fcm: FirstContactMessage) -> Result<SessionEvent, SessionError> {
        let q = match (self.role, self.local_q) {
            (Role::Responder, Some(q)) => q,
            _ => {
                return Err(SessionError::Handshake(
                    "initiator received FCM".to_string(),
                ))
            }
        };
        if self.state != SessionState::Uninitialized {
            return Err(SessionError::Handshake(format!(
                "FCM received in state {:?}",
                self.state
            )));
        }

        let params = ParameterSet {
            p: fcm.p,
            q,
            seed: fcm.seed,
            num_keys: fcm.num_keys,
        };
        self.install(params);
        Ok(SessionEvent::Reply(PeerMessage::FirstContactAck { q }))
    }

    fn on_first_contact_ack(&mut self, q: u64) -> Result<SessionEvent, SessionError> {
        if self.role != Role::Initiator {
            return Err(SessionError::Handshake(
                "responder received FCM_ACK".to_string(),
            ));
        }
        let fcm = match (self.state, self.pending) {
            (SessionState::AwaitingHandshake, Some(fcm)) => fcm,
            _ => {
                return Err(SessionError::Handshake(format!(
                    "FCM_ACK received in state {:?}",
                    self.state
                )))
            }
        };

        let params = ParameterSet {
            p: fcm.p,
            q,
            seed: fcm.seed,
            num_keys: fcm.num_keys,
        };
        self.pending = None;
        self.install(params);
        Ok(SessionEvent::HandshakeComplete)
    }

    fn on_regular(&mut self, rm: RegularMessage) -> Result<SessionEvent, SessionError> {
        let table = self.key_table.as_ref().ok_or(SessionError::UninitializedTable)?;
        let text = decode_regular(&rm.ciphertext, table, rm.psn)?;
        Ok(SessionEvent::MessageDecoded { text, psn: rm.psn })
    }

    fn apply_seed(&mut self, seed: u64) -> Result<(), SessionError> {
        let params = match (self.state, self.params) {
            (SessionState::Ready, Some(params)) => params.with_seed(seed),
            _ => return Err(SessionError::UninitializedTable),
        };
        self.key_table = Some(params.build_table());
        self.params = Some(params);
        debug!(seed, "key table regenerated");
        Ok(())
    }

    fn install(&mut self, params: ParameterSet) {
        self.key_table = Some(params.build_table());
        self.params = Some(params);
        self.last_psn = None;
        self.transition(SessionState::Ready);
    }

    fn clear(&mut self) {
        self.pending = None;
        self.params = None;
        self.key_table = None;
        self.last_psn = None;
        self.transition(SessionState::Closed);
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(role = ?self.role, from = ?self.state, to = ?next, "session transition");
            self.state = next;
        }
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.state == SessionState::Closed {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }
}
