//! RespondUseCase: the responder side of one connection.
//!
//! Every decoded [`PeerMessage`] goes through [`RespondUseCase::on_message`],
//! which returns a [`Disposition`] telling the network layer what to do next.
//! Per-message failures are logged and the connection carries on; only LCM
//! ends it from this side.
//!
//! ```text
//! FCM      → Reply(FCM_ACK)
//! RM       → Delivered(text)       (logged at info)
//! KUM      → Continue              (table regenerated)
//! LCM      → Close
//! FCM over max_keys → Close        (the initiator would wait for an ack forever)
//! errors   → Continue              (logged at warn, counted as rejected)
//! ```

use polycipher_core::{
    PeerMessage, ProtocolError, Psn, Session, SessionError, SessionEvent, SessionStatus,
};
use tracing::{info, warn};

/// Responder parameters shared by every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponderSettings {
    /// The responder's Q, sent back in every FCM_ACK.
    pub q: u64,
    /// Largest key table this responder agrees to build.
    pub max_keys: usize,
}

/// A regular message after decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub psn: Psn,
    pub text: String,
}

impl ReceivedMessage {
    /// Length of the text in characters (one per ciphertext byte).
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// What the connection loop should do after a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Write this message back to the peer.
    Reply(PeerMessage),
    /// A regular message was decrypted.
    Delivered(ReceivedMessage),
    /// Nothing to send; keep reading.
    Continue,
    /// The session is over (LCM, or a refused handshake); stop reading.
    Close,
}

/// Counters reported when a connection ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Regular messages decrypted.
    pub received: u64,
    /// Key updates applied.
    pub rotations: u64,
    /// Frames or messages dropped because of an error.
    pub rejected: u64,
}

/// Owns the [`Session`] for one connection.
pub struct RespondUseCase {
    session: Session,
    max_keys: usize,
    stats: ConnectionStats,
}

impl RespondUseCase {
    pub fn new(settings: ResponderSettings) -> Self {
        Self {
            session: Session::responder(settings.q),
            max_keys: settings.max_keys,
            stats: ConnectionStats::default(),
        }
    }

    /// Applies one message from the peer.
    pub fn on_message(&mut self, msg: PeerMessage) -> Disposition {
        if let PeerMessage::FirstContact(fcm) = &msg {
            if fcm.num_keys > self.max_keys {
                warn!(
                    num_keys = fcm.num_keys,
                    max_keys = self.max_keys,
                    "FCM asks for more keys than allowed; closing"
                );
                self.stats.rejected += 1;
                return Disposition::Close;
            }
        }

        let name = msg.name();
        match self.session.handle(msg) {
            Ok(event) => self.on_event(event),
            Err(e) => {
                self.reject(name, &e);
                Disposition::Continue
            }
        }
    }

    /// Records a frame that could not be decoded.
    pub fn on_malformed(&mut self, err: ProtocolError) {
        self.reject("frame", &SessionError::from(err));
    }

    /// Clears the session after the transport went away.
    pub fn on_disconnect(&mut self) {
        self.session.on_disconnect();
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn stats(&self) -> ConnectionStats {
        self.stats
    }

    fn on_event(&mut self, event: SessionEvent) -> Disposition {
        match event {
            SessionEvent::Reply(reply) => {
                if let Some(params) = self.session.params() {
                    info!(
                        p = params.p,
                        seed = params.seed,
                        num_keys = params.num_keys,
                        "key table generated from FCM"
                    );
                }
                Disposition::Reply(reply)
            }
            SessionEvent::MessageDecoded { text, psn } => {
                let received = ReceivedMessage { psn, text };
                self.stats.received += 1;
                info!(
                    psn = %received.psn,
                    text = %received.text,
                    length = received.char_count(),
                    "message received"
                );
                Disposition::Delivered(received)
            }
            SessionEvent::KeysRotated { seed } => {
                self.stats.rotations += 1;
                info!(seed, "keys updated");
                Disposition::Continue
            }
            SessionEvent::Closed => {
                info!("LCM received; releasing session");
                Disposition::Close
            }
            // Only an initiator completes a handshake.
            SessionEvent::HandshakeComplete => Disposition::Continue,
        }
    }

    fn reject(&mut self, what: &str, err: &SessionError) {
        self.stats.rejected += 1;
        warn!(msg = what, state = ?self.session.state(), "dropped: {err}");
    }
}
