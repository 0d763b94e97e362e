//! Menu choices and the text the initiator shows.

use std::str::FromStr;

use polycipher_core::SessionStatus;

/// Banner printed before every prompt.
pub const MENU: &str = "\
==================================================
             POLYMORPHIC CIPHER
==================================================
1. Send regular message (RM)
2. Update keys (KUM)
3. Close connection (LCM)
4. Show current status
5. Exit
==================================================";

pub const MENU_PROMPT: &str = "Select an option (1-5): ";
pub const MESSAGE_PROMPT: &str = "Message to encrypt: ";
pub const CONTINUE_PROMPT: &str = "Press Enter to continue...";

/// One entry of the interactive menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    SendMessage,
    RotateKeys,
    Close,
    Status,
    Exit,
}

impl FromStr for MenuChoice {
    type Err = String;

    /// Accepts `"1"` to `"5"`, ignoring surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(MenuChoice::SendMessage),
            "2" => Ok(MenuChoice::RotateKeys),
            "3" => Ok(MenuChoice::Close),
            "4" => Ok(MenuChoice::Status),
            "5" => Ok(MenuChoice::Exit),
            other => Err(other.to_string()),
        }
    }
}

/// Renders the status screen, one line per entry.
pub fn status_lines(status: &SessionStatus) -> Vec<String> {
    let field = |v: Option<u64>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
    let params = status.params.as_ref();
    vec![
        "CURRENT STATUS:".to_string(),
        format!("   State: {:?}", status.state),
        format!("   P: {}", field(params.map(|p| p.p))),
        format!("   Q: {}", field(params.map(|p| p.q))),
        format!("   S: {}", field(params.map(|p| p.seed))),
        format!("   Keys generated: {}", status.key_count),
        format!(
            "   Last PSN: {}",
            status.last_psn.map_or_else(|| "none".to_string(), |p| p.to_string())
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use polycipher_core::{ParameterSet, Psn, Role, SessionState};

    #[test]
    fn test_parse_every_choice() {
        assert_eq!("1".parse(), Ok(MenuChoice::SendMessage));
        assert_eq!("2".parse(), Ok(MenuChoice::RotateKeys));
        assert_eq!("3".parse(), Ok(MenuChoice::Close));
        assert_eq!("4".parse(), Ok(MenuChoice::Status));
        assert_eq!("5".parse(), Ok(MenuChoice::Exit));
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(" 4 \n".parse(), Ok(MenuChoice::Status));
    }

    #[test]
    fn test_parse_rejects_anything_else() {
        assert_eq!("6".parse::<MenuChoice>(), Err("6".to_string()));
        assert!("".parse::<MenuChoice>().is_err());
        assert!("send".parse::<MenuChoice>().is_err());
    }

    #[test]
    fn test_status_lines_for_ready_session() {
        // Arrange
        let status = SessionStatus {
            role: Role::Initiator,
            state: SessionState::Ready,
            params: Some(ParameterSet { p: 3, q: 5, seed: 7, num_keys: 30 }),
            key_count: 30,
            last_psn: Psn::new(8),
        };

        // Act
        let lines = status_lines(&status);

        // Assert
        assert_eq!(lines[2], "   P: 3");
        assert_eq!(lines[3], "   Q: 5");
        assert_eq!(lines[4], "   S: 7");
        assert_eq!(lines[5], "   Keys generated: 30");
        assert_eq!(lines[6], "   Last PSN: 8");
    }

    #[test]
    fn test_status_lines_before_handshake() {
        let status = SessionStatus {
            role: Role::Initiator,
            state: SessionState::Uninitialized,
            params: None,
            key_count: 0,
            last_psn: None,
        };

        let lines = status_lines(&status);

        assert_eq!(lines[3], "   Q: -");
        assert_eq!(lines[6], "   Last PSN: none");
    }
}
