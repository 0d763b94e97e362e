//! InitiatorUseCase: handshake followed by the interactive menu.
//!
//! ```text
//! handshake()   FCM(P, S, n) ──►
//!               ◄── FCM_ACK(Q)         table built
//! run_menu()    1 → RM                 encrypted with chained PSN
//!               2 → KUM(S + 1)         local table regenerated first
//!               3 → LCM                session cleared, loop ends
//!               4 → status screen
//!               5 → exit without LCM
//! ```

use std::time::Duration;

use polycipher_core::{PeerMessage, Session, SessionError};
use thiserror::Error;
use tracing::{debug, info};

use super::menu::{status_lines, MenuChoice, CONTINUE_PROMPT, MENU, MENU_PROMPT, MESSAGE_PROMPT};
use super::ports::{Console, LinkError, PeerLink};

/// Errors that end the initiator.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("console I/O error: {0}")]
    Console(#[from] std::io::Error),

    /// The responder answered the FCM with something other than FCM_ACK.
    #[error("expected FCM_ACK, got {0}")]
    UnexpectedReply(&'static str),

    /// No FCM_ACK arrived in time.
    #[error("no FCM_ACK from the responder within {0:?}")]
    HandshakeTimeout(Duration),
}

/// How long [`InitiatorUseCase::handshake`] waits for the FCM_ACK unless
/// configured otherwise.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Initiator parameters sent in the FCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitiatorSettings {
    pub p: u64,
    pub seed: u64,
    pub num_keys: usize,
}

/// How the menu loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuExit {
    /// LCM was sent.
    Closed,
    /// The user chose to exit, or input ran out.
    Quit,
}

/// Drives one initiator session over a [`PeerLink`], talking to the user
/// through a [`Console`].
pub struct InitiatorUseCase<L, C> {
    link: L,
    console: C,
    session: Session,
    settings: InitiatorSettings,
    ack_timeout: Duration,
}

impl<L: PeerLink, C: Console> InitiatorUseCase<L, C> {
    pub fn new(link: L, console: C, settings: InitiatorSettings) -> Self {
        Self {
            link,
            console,
            session: Session::initiator(),
            settings,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }

    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Handshake, then the menu until the user leaves.
    ///
    /// # Errors
    ///
    /// See [`InitiatorUseCase::handshake`] and [`InitiatorUseCase::run_menu`].
    pub async fn run(&mut self) -> Result<MenuExit, ClientError> {
        self.handshake().await?;
        self.run_menu().await
    }

    /// Sends the FCM and waits for the FCM_ACK.
    ///
    /// # Errors
    ///
    /// [`ClientError::UnexpectedReply`] if the responder answers with anything
    /// else, [`ClientError::HandshakeTimeout`] if it stays silent, and link or
    /// session errors as they occur.
    pub async fn handshake(&mut self) -> Result<(), ClientError> {
        let InitiatorSettings { p, seed, num_keys } = self.settings;
        let fcm = self.session.begin_handshake(p, seed, num_keys)?;
        self.console.show("Sending FCM...");
        self.link.send(&fcm).await?;

        let reply = tokio::time::timeout(self.ack_timeout, self.link.recv())
            .await
            .map_err(|_| ClientError::HandshakeTimeout(self.ack_timeout))??;
        let PeerMessage::FirstContactAck { q } = reply else {
            return Err(ClientError::UnexpectedReply(reply.name()));
        };
        self.session.handle(reply)?;

        info!(q, num_keys, "handshake complete");
        self.console
            .show(&format!("-- Key table generated ({num_keys} keys)"));
        self.console.show(&format!("-- Q received: {q}"));
        Ok(())
    }

    /// Shows the menu and handles choices until close, exit or end of input.
    ///
    /// # Errors
    ///
    /// Link and console failures.  Rejected input (an empty message, text the
    /// cipher cannot carry, an unknown choice) is reported to the user and the
    /// menu repeats.
    pub async fn run_menu(&mut self) -> Result<MenuExit, ClientError> {
        loop {
            self.console.show(MENU);
            let Some(line) = self.console.prompt(MENU_PROMPT).await? else {
                return Ok(MenuExit::Quit);
            };

            let choice = match line.parse::<MenuChoice>() {
                Ok(choice) => choice,
                Err(other) => {
                    debug!(input = %other, "invalid menu choice");
                    self.console.show("Invalid option. Try again.");
                    continue;
                }
            };

            match choice {
                MenuChoice::SendMessage => {
                    if !self.send_message().await? {
                        return Ok(MenuExit::Quit);
                    }
                }
                MenuChoice::RotateKeys => self.rotate_keys().await?,
                MenuChoice::Close => {
                    let lcm = self.session.close();
                    self.link.send(&lcm).await?;
                    self.console.show("Connection closed");
                    return Ok(MenuExit::Closed);
                }
                MenuChoice::Status => {
                    for line in status_lines(&self.session.status()) {
                        self.console.show(&line);
                    }
                    if self.console.prompt(CONTINUE_PROMPT).await?.is_none() {
                        return Ok(MenuExit::Quit);
                    }
                }
                MenuChoice::Exit => {
                    self.console.show("Exiting...");
                    return Ok(MenuExit::Quit);
                }
            }
        }
    }

    /// Option 1.  Returns `false` when input ran out at the message prompt.
    async fn send_message(&mut self) -> Result<bool, ClientError> {
        let Some(text) = self.console.prompt(MESSAGE_PROMPT).await? else {
            return Ok(false);
        };
        if text.is_empty() {
            self.console.show("Error: the message cannot be empty");
            return Ok(true);
        }

        let rm = match self.session.encode(&text) {
            Ok(rm) => rm,
            Err(SessionError::Cipher(e)) => {
                self.console.show(&format!("Error: {e}"));
                return Ok(true);
            }
            Err(e) => return Err(e.into()),
        };
        self.link.send(&rm).await?;

        if let Some(psn) = self.session.last_psn() {
            self.console.show(&format!("-- Message sent with PSN: {psn}"));
        }
        Ok(true)
    }

    /// Option 2: the new seed is always the current one plus one.
    async fn rotate_keys(&mut self) -> Result<(), ClientError> {
        let current = self
            .session
            .params()
            .map(|p| p.seed)
            .ok_or(SessionError::UninitializedTable)?;
        let new_seed = current.wrapping_add(1);

        let kum = self.session.rotate(new_seed)?;
        self.link.send(&kum).await?;
        self.console
            .show(&format!("-- Keys updated. New S: {new_seed}"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use polycipher_core::{Psn, SessionEvent, SessionState};

    use super::*;
    use crate::application::ports::MockConsole;

    const P: u64 = 15_485_863;
    const Q: u64 = 32_452_843;
    const S: u64 = 123_456_789;

    fn settings(num_keys: usize) -> InitiatorSettings {
        InitiatorSettings { p: P, seed: S, num_keys }
    }

    // ── Test doubles ──────────────────────────────────────────────────────────

    /// A link whose far end is a real responder session.  Everything the
    /// initiator sends is recorded and decrypted texts are collected.
    struct ResponderLink {
        responder: Session,
        replies: VecDeque<PeerMessage>,
        sent: Arc<Mutex<Vec<PeerMessage>>>,
        decoded: Arc<Mutex<Vec<String>>>,
    }

    impl ResponderLink {
        fn new() -> Self {
            Self {
                responder: Session::responder(Q),
                replies: VecDeque::new(),
                sent: Arc::new(Mutex::new(Vec::new())),
                decoded: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl PeerLink for ResponderLink {
        async fn send(&mut self, msg: &PeerMessage) -> Result<(), LinkError> {
            self.sent.lock().unwrap().push(msg.clone());
            match self.responder.handle(msg.clone()) {
                Ok(SessionEvent::Reply(reply)) => self.replies.push_back(reply),
                Ok(SessionEvent::MessageDecoded { text, .. }) => {
                    self.decoded.lock().unwrap().push(text)
                }
                _ => {}
            }
            Ok(())
        }

        async fn recv(&mut self) -> Result<PeerMessage, LinkError> {
            self.replies.pop_front().ok_or(LinkError::Closed)
        }
    }

    /// A link that answers the FCM with a fixed message.
    struct FixedReplyLink(Option<PeerMessage>);

    #[async_trait]
    impl PeerLink for FixedReplyLink {
        async fn send(&mut self, _msg: &PeerMessage) -> Result<(), LinkError> {
            Ok(())
        }

        async fn recv(&mut self) -> Result<PeerMessage, LinkError> {
            self.0.take().ok_or(LinkError::Closed)
        }
    }

    /// A link that accepts sends and never answers.
    struct SilentLink;

    #[async_trait]
    impl PeerLink for SilentLink {
        async fn send(&mut self, _msg: &PeerMessage) -> Result<(), LinkError> {
            Ok(())
        }

        async fn recv(&mut self) -> Result<PeerMessage, LinkError> {
            std::future::pending().await
        }
    }

    /// A console that answers prompts from a script and records output.
    fn scripted_console(inputs: &[&str]) -> (MockConsole, Arc<Mutex<Vec<String>>>) {
        let mut script: VecDeque<String> = inputs.iter().map(|s| s.to_string()).collect();
        let shown = Arc::new(Mutex::new(Vec::new()));
        let shown_clone = Arc::clone(&shown);

        let mut console = MockConsole::new();
        console
            .expect_prompt()
            .returning(move |_| Ok(script.pop_front()));
        console
            .expect_show()
            .returning(move |line| shown_clone.lock().unwrap().push(line.to_string()));
        (console, shown)
    }

    fn contains(shown: &Arc<Mutex<Vec<String>>>, needle: &str) -> bool {
        shown.lock().unwrap().iter().any(|l| l.contains(needle))
    }

    // ── Handshake ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_handshake_builds_table_and_reports_q() {
        // Arrange
        let (console, shown) = scripted_console(&[]);
        let mut use_case = InitiatorUseCase::new(ResponderLink::new(), console, settings(30));

        // Act
        use_case.handshake().await.unwrap();

        // Assert
        assert_eq!(use_case.session().state(), SessionState::Ready);
        assert_eq!(use_case.session().status().key_count, 30);
        assert!(contains(&shown, "Key table generated (30 keys)"));
        assert!(contains(&shown, &format!("Q received: {Q}")));
    }

    #[tokio::test]
    async fn test_handshake_rejects_unexpected_reply() {
        let (console, _) = scripted_console(&[]);
        let link = FixedReplyLink(Some(PeerMessage::Close));
        let mut use_case = InitiatorUseCase::new(link, console, settings(30));

        let result = use_case.handshake().await;

        assert!(matches!(result, Err(ClientError::UnexpectedReply("LCM"))));
        assert_eq!(use_case.session().state(), SessionState::AwaitingHandshake);
    }

    #[tokio::test]
    async fn test_handshake_times_out_when_responder_is_silent() {
        // Arrange
        let (console, _) = scripted_console(&[]);
        let wait = Duration::from_millis(50);
        let mut use_case =
            InitiatorUseCase::new(SilentLink, console, settings(30)).with_ack_timeout(wait);

        // Act
        let result = use_case.handshake().await;

        // Assert
        assert!(matches!(result, Err(ClientError::HandshakeTimeout(d)) if d == wait));
        assert_eq!(use_case.session().state(), SessionState::AwaitingHandshake);
    }

    #[tokio::test]
    async fn test_handshake_fails_when_link_closes() {
        let (console, _) = scripted_console(&[]);
        let mut use_case = InitiatorUseCase::new(FixedReplyLink(None), console, settings(30));

        let result = use_case.handshake().await;

        assert!(matches!(result, Err(ClientError::Link(LinkError::Closed))));
    }

    // ── Menu ──────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_send_rotate_send_close() {
        // Arrange
        let link = ResponderLink::new();
        let sent = Arc::clone(&link.sent);
        let decoded = Arc::clone(&link.decoded);
        let (console, shown) =
            scripted_console(&["1", "HI", "2", "1", "after rotation", "3"]);
        let mut use_case = InitiatorUseCase::new(link, console, settings(3));

        // Act
        let exit = use_case.run().await.unwrap();

        // Assert
        assert_eq!(exit, MenuExit::Closed);
        assert_eq!(*decoded.lock().unwrap(), vec!["HI".to_string(), "after rotation".to_string()]);
        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 5);
        assert_eq!(sent[2], PeerMessage::KeyUpdate { seed: S + 1 });
        assert_eq!(sent[4], PeerMessage::Close);
        assert!(contains(&shown, "Message sent with PSN: 8"));
        assert!(contains(&shown, &format!("New S: {}", S + 1)));
        assert_eq!(use_case.session().state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected_and_nothing_sent() {
        // Arrange
        let link = ResponderLink::new();
        let sent = Arc::clone(&link.sent);
        let (console, shown) = scripted_console(&["1", "", "5"]);
        let mut use_case = InitiatorUseCase::new(link, console, settings(30));

        // Act
        let exit = use_case.run().await.unwrap();

        // Assert
        assert_eq!(exit, MenuExit::Quit);
        assert!(contains(&shown, "cannot be empty"));
        assert_eq!(sent.lock().unwrap().len(), 1, "only the FCM goes out");
        assert_eq!(use_case.session().last_psn(), None);
    }

    #[tokio::test]
    async fn test_wide_characters_are_reported_and_menu_continues() {
        let link = ResponderLink::new();
        let decoded = Arc::clone(&link.decoded);
        let (console, shown) = scripted_console(&["1", "price: 5€", "1", "plain", "5"]);
        let mut use_case = InitiatorUseCase::new(link, console, settings(30));

        use_case.run().await.unwrap();

        assert!(contains(&shown, "outside the 8-bit range"));
        assert_eq!(*decoded.lock().unwrap(), vec!["plain".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_choice_repeats_menu() {
        let (console, shown) = scripted_console(&["9", "abc", "5"]);
        let mut use_case = InitiatorUseCase::new(ResponderLink::new(), console, settings(30));

        let exit = use_case.run().await.unwrap();

        assert_eq!(exit, MenuExit::Quit);
        let invalid = shown
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.contains("Invalid option"))
            .count();
        assert_eq!(invalid, 2);
    }

    #[tokio::test]
    async fn test_status_shows_parameters_and_last_psn() {
        let (console, shown) = scripted_console(&["1", "HI", "4", "", "5"]);
        let mut use_case = InitiatorUseCase::new(ResponderLink::new(), console, settings(30));

        use_case.run().await.unwrap();

        assert!(contains(&shown, &format!("P: {P}")));
        assert!(contains(&shown, &format!("Q: {Q}")));
        assert!(contains(&shown, &format!("S: {S}")));
        assert!(contains(&shown, "Keys generated: 30"));
        assert!(contains(&shown, &format!("Last PSN: {}", Psn::new(8).unwrap())));
    }

    #[tokio::test]
    async fn test_end_of_input_quits_without_lcm() {
        let link = ResponderLink::new();
        let sent = Arc::clone(&link.sent);
        let (console, _) = scripted_console(&["1", "HI"]);
        let mut use_case = InitiatorUseCase::new(link, console, settings(30));

        let exit = use_case.run().await.unwrap();

        assert_eq!(exit, MenuExit::Quit);
        assert!(!sent.lock().unwrap().contains(&PeerMessage::Close));
    }

    #[tokio::test]
    async fn test_psn_chains_across_messages() {
        // "HI" -> psn 8; "HELLO": 8 % 5 = 3 -> 'L' -> 12
        let (console, shown) = scripted_console(&["1", "HI", "1", "HELLO", "5"]);
        let mut use_case = InitiatorUseCase::new(ResponderLink::new(), console, settings(30));

        use_case.run().await.unwrap();

        assert!(contains(&shown, "Message sent with PSN: 12"));
        assert_eq!(use_case.session().last_psn(), Psn::new(12));
    }
}
