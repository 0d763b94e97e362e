//! Polymorphic sequence numbers (PSN) and the transform schedule they select.
//!
//! # What is a PSN?
//!
//! Every regular message carries a 4-bit value chosen by the sender.  The
//! receiver does not derive it; it reads it off the wire.  The PSN steers two
//! things:
//!
//! - **Which key slot each byte starts from**: byte `i` uses
//!   `table[(i + psn) mod len]`.
//! - **Which transforms run, and in what order**: [`schedule`] turns the PSN
//!   into a [`FunctionSequence`] of three [`Transform`]s.
//!
//! The sender chains PSNs: each new PSN is taken from a character of the
//! current message at a position picked by the previous PSN.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of transforms applied to every byte.
pub const SCHEDULE_LEN: usize = 3;

/// A 4-bit sequence number in `0..=15`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Psn(u8);

impl Psn {
    /// Largest valid PSN value.
    pub const MAX: u8 = 0x0F;

    /// Returns `None` if `value` does not fit in 4 bits.
    pub const fn new(value: u8) -> Option<Self> {
        if value <= Self::MAX {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Builds a PSN from the low 4 bits of a character code.
    fn from_code_point(c: char) -> Self {
        Self((u32::from(c) & 0x0F) as u8)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// Derives the PSN for an outgoing message.
    ///
    /// Without a previous PSN the first character is used.  Otherwise the
    /// character at `previous mod len` is used.  Empty messages always give 0.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use polycipher_core::Psn;
    ///
    /// assert_eq!(Psn::derive("HI", None).value(), 8); // 'H' = 0x48
    /// let next = Psn::derive("hello", Psn::new(8));    // 8 % 5 = 3 -> 'l'
    /// assert_eq!(next.value(), 0x6C & 0x0F);
    /// ```
    pub fn derive(message: &str, previous: Option<Psn>) -> Self {
        let len = message.chars().count();
        if len == 0 {
            return Self(0);
        }
        let index = previous.map_or(0, |p| usize::from(p.0) % len);
        message
            .chars()
            .nth(index)
            .map_or(Self(0), Self::from_code_point)
    }
}

impl TryFrom<u8> for Psn {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(value)
    }
}

impl From<Psn> for u8 {
    fn from(psn: Psn) -> Self {
        psn.0
    }
}

impl fmt::Display for Psn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the three reversible byte operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Transform {
    /// `d xor (k mod 256)`.
    Xor = 0,
    /// Rotate the byte left by `k mod 8`.
    Rotate = 1,
    /// `(d + k) mod 256`.
    Offset = 2,
}

/// The ordered transforms applied to each byte of one message.
pub type FunctionSequence = [Transform; SCHEDULE_LEN];

/// Derives the transform order for a PSN.
///
/// Each step takes `psn mod 3`, then swaps the two 2-bit halves of the PSN.
/// Both peers must compute this identically; it depends on nothing else.
pub fn schedule(psn: Psn) -> FunctionSequence {
    let mut sequence = [Transform::Xor; SCHEDULE_LEN];
    let mut value = psn.0;
    for slot in sequence.iter_mut() {
        *slot = match value % 3 {
            0 => Transform::Xor,
            1 => Transform::Rotate,
            _ => Transform::Offset,
        };
        value = ((value >> 2) | ((value & 0b11) << 2)) & Psn::MAX;
    }
    sequence
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_psns() -> impl Iterator<Item = Psn> {
        (0..=Psn::MAX).filter_map(Psn::new)
    }

    #[test]
    fn test_psn_new_rejects_values_above_fifteen() {
        assert!(Psn::new(15).is_some());
        assert!(Psn::new(16).is_none());
        assert_eq!(Psn::try_from(200u8), Err(200));
    }

    #[test]
    fn test_derive_without_previous_uses_first_char() {
        // 'H' = 0x48 -> 8
        assert_eq!(Psn::derive("HI", None).value(), 8);
    }

    #[test]
    fn test_derive_empty_message_is_zero() {
        assert_eq!(Psn::derive("", None).value(), 0);
        assert_eq!(Psn::derive("", Psn::new(7)).value(), 0);
    }

    #[test]
    fn test_derive_with_previous_indexes_by_previous_mod_len() {
        // previous = 8, len = 3 -> index 2 -> 'c' = 0x63 -> 3
        let psn = Psn::derive("abc", Psn::new(8));
        assert_eq!(psn.value(), 3);
    }

    #[test]
    fn test_derive_counts_characters_not_bytes() {
        // 'é' is two UTF-8 bytes but a single character.
        // previous = 1, len = 2 -> index 1 -> 'z' = 0x7A -> 10
        let psn = Psn::derive("éz", Psn::new(1));
        assert_eq!(psn.value(), 10);
    }

    #[test]
    fn test_schedule_has_three_valid_entries_for_every_psn() {
        for psn in all_psns() {
            let seq = schedule(psn);
            assert_eq!(seq.len(), SCHEDULE_LEN);
            for t in seq {
                assert!((t as u8) <= 2);
            }
        }
    }

    #[test]
    fn test_schedule_reference_values() {
        let psn = Psn::new(8).unwrap();
        assert_eq!(schedule(psn), [Transform::Offset; 3]);
        assert_eq!(schedule(Psn::new(0).unwrap()), [Transform::Xor; 3]);
        assert_eq!(schedule(Psn::new(13).unwrap()), [Transform::Rotate; 3]);
    }

    #[test]
    fn test_schedule_is_stable() {
        for psn in all_psns() {
            assert_eq!(schedule(psn), schedule(psn));
        }
    }
}
