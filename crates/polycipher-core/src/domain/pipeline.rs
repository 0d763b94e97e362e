//! The byte transform pipeline and its inverse.
//!
//! Each character of a message becomes one byte, and each byte goes through
//! the three transforms picked by [`schedule`], all keyed by the same table
//! entry.  Decoding applies the inverses in reverse order.
//!
//! Every stage is a `fn(u8, u64) -> u8`, so an intermediate value can never
//! leave the 8-bit domain.  The only place an out-of-range value can appear
//! is the input text itself, which is rejected up front.

use thiserror::Error;

use crate::domain::key_table::KeyTable;
use crate::domain::sequence::{schedule, Psn, Transform};

/// Errors raised while encoding or decoding a regular message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    /// The key table has no entries, so no key can be selected.
    #[error("key table is empty")]
    EmptyKeyTable,

    /// A character does not fit in one byte.
    #[error("character {ch:?} at position {index} is outside the 8-bit range")]
    OutOfByteRange { index: usize, ch: char },
}

impl Transform {
    /// Applies this transform to one byte.
    pub fn apply(self, data: u8, key: u64) -> u8 {
        match self {
            Transform::Xor => data ^ key_byte(key),
            Transform::Rotate => data.rotate_left(rotate_bits(key)),
            Transform::Offset => data.wrapping_add(key_byte(key)),
        }
    }

    /// Undoes [`Transform::apply`] for the same key.
    pub fn invert(self, data: u8, key: u64) -> u8 {
        match self {
            Transform::Xor => data ^ key_byte(key),
            Transform::Rotate => data.rotate_right(rotate_bits(key)),
            Transform::Offset => data.wrapping_sub(key_byte(key)),
        }
    }
}

fn key_byte(key: u64) -> u8 {
    (key & 0xFF) as u8
}

fn rotate_bits(key: u64) -> u32 {
    (key % 8) as u32
}

/// Encrypts `plaintext` with an explicit PSN.
///
/// # Errors
///
/// [`CipherError::EmptyKeyTable`] for an empty table, and
/// [`CipherError::OutOfByteRange`] for characters above U+00FF.
pub fn encrypt(plaintext: &str, table: &KeyTable, psn: Psn) -> Result<Vec<u8>, CipherError> {
    if table.is_empty() {
        return Err(CipherError::EmptyKeyTable);
    }
    let sequence = schedule(psn);
    let offset = usize::from(psn.value());

    plaintext
        .chars()
        .enumerate()
        .map(|(index, ch)| {
            let byte = u8::try_from(u32::from(ch))
                .map_err(|_| CipherError::OutOfByteRange { index, ch })?;
            let key = table.key_for(index, offset).ok_or(CipherError::EmptyKeyTable)?;
            Ok(sequence.iter().fold(byte, |d, t| t.apply(d, key)))
        })
        .collect()
}

/// Decrypts bytes produced by [`encrypt`] with the same table and PSN.
///
/// Each output byte is read as a Latin-1 code point, so the result of a
/// round trip equals the original text.
///
/// # Errors
///
/// [`CipherError::EmptyKeyTable`] for an empty table.
pub fn decrypt(ciphertext: &[u8], table: &KeyTable, psn: Psn) -> Result<String, CipherError> {
    if table.is_empty() {
        return Err(CipherError::EmptyKeyTable);
    }
    let sequence = schedule(psn);
    let offset = usize::from(psn.value());

    ciphertext
        .iter()
        .enumerate()
        .map(|(index, &byte)| {
            let key = table.key_for(index, offset).ok_or(CipherError::EmptyKeyTable)?;
            let plain = sequence.iter().rev().fold(byte, |d, t| t.invert(d, key));
            Ok(char::from(plain))
        })
        .collect()
}

/// Sender side: derives the PSN from the message and the previous PSN, then
/// encrypts.
///
/// Returns the ciphertext together with the PSN that must travel with it.
///
/// # Examples
///
/// ```rust
/// use polycipher_core::{decode_regular, encode_regular, KeyTable};
///
/// let table = KeyTable::generate(15485863, 32452843, 123456789, 3);
/// let (bytes, psn) = encode_regular("HI", &table, None).unwrap();
/// assert_eq!(psn.value(), 8);
/// assert_eq!(bytes, vec![69, 6]);
/// assert_eq!(decode_regular(&bytes, &table, psn).unwrap(), "HI");
/// ```
pub fn encode_regular(
    message: &str,
    table: &KeyTable,
    previous_psn: Option<Psn>,
) -> Result<(Vec<u8>, Psn), CipherError> {
    let psn = Psn::derive(message, previous_psn);
    let bytes = encrypt(message, table, psn)?;
    Ok((bytes, psn))
}

/// Receiver side: decrypts with the PSN carried by the message.
pub fn decode_regular(ciphertext: &[u8], table: &KeyTable, psn: Psn) -> Result<String, CipherError> {
    decrypt(ciphertext, table, psn)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_table() -> KeyTable {
        KeyTable::generate(15_485_863, 32_452_843, 123_456_789, 3)
    }

    fn psn(v: u8) -> Psn {
        Psn::new(v).unwrap()
    }

    #[test]
    fn test_each_transform_inverts_for_all_bytes_and_rotations() {
        for key in [0u64, 1, 7, 8, 0xFF, 0x1234_5678_9ABC_DEF7, u64::MAX] {
            for t in [Transform::Xor, Transform::Rotate, Transform::Offset] {
                for d in 0..=u8::MAX {
                    assert_eq!(t.invert(t.apply(d, key), key), d, "{t:?} key={key:#x} d={d}");
                }
            }
        }
    }

    #[test]
    fn test_xor_uses_only_low_key_byte() {
        assert_eq!(Transform::Xor.apply(0x0F, 0xABCD_EF00_0000_00F0), 0xFF);
    }

    #[test]
    fn test_rotate_by_key_mod_eight() {
        // 0b1000_0001 rotated left by 1 -> 0b0000_0011
        assert_eq!(Transform::Rotate.apply(0b1000_0001, 9), 0b0000_0011);
        assert_eq!(Transform::Rotate.apply(0xA5, 8), 0xA5);
    }

    #[test]
    fn test_offset_wraps_mod_256() {
        assert_eq!(Transform::Offset.apply(200, 100), 44);
        assert_eq!(Transform::Offset.invert(44, 100), 200);
    }

    #[test]
    fn test_encode_reference_vector() {
        let (bytes, p) = encode_regular("HI", &reference_table(), None).unwrap();
        assert_eq!(p.value(), 8);
        assert_eq!(bytes, vec![69, 6]);
    }

    #[test]
    fn test_encrypt_longer_reference_vector() {
        let bytes = encrypt("HELLO", &reference_table(), psn(8)).unwrap();
        assert_eq!(bytes, vec![69, 2, 73, 73, 12]);
    }

    #[test]
    fn test_round_trip_printable_ascii_for_every_psn() {
        let table = KeyTable::generate(15_485_863, 32_452_843, 123_456_789, 30);
        let message: String = (0x20u8..0x7F).map(char::from).collect();
        for v in 0..=Psn::MAX {
            let bytes = encrypt(&message, &table, psn(v)).unwrap();
            assert_eq!(decrypt(&bytes, &table, psn(v)).unwrap(), message);
        }
    }

    #[test]
    fn test_round_trip_with_single_key_table() {
        let table = KeyTable::generate(3, 5, 7, 1);
        let bytes = encrypt("same key every stage", &table, psn(5)).unwrap();
        assert_eq!(decrypt(&bytes, &table, psn(5)).unwrap(), "same key every stage");
    }

    #[test]
    fn test_round_trip_latin1_text() {
        let table = reference_table();
        let bytes = encrypt("señal ÿ", &table, psn(11)).unwrap();
        assert_eq!(bytes.len(), 7);
        assert_eq!(decrypt(&bytes, &table, psn(11)).unwrap(), "señal ÿ");
    }

    #[test]
    fn test_encrypt_rejects_multibyte_code_points() {
        let result = encrypt("ok€", &reference_table(), psn(1));
        assert_eq!(result, Err(CipherError::OutOfByteRange { index: 2, ch: '€' }));
    }

    #[test]
    fn test_empty_table_is_an_error() {
        let empty = KeyTable::generate(1, 2, 3, 0);
        assert_eq!(encrypt("x", &empty, psn(0)), Err(CipherError::EmptyKeyTable));
        assert_eq!(decrypt(&[1], &empty, psn(0)), Err(CipherError::EmptyKeyTable));
    }

    #[test]
    fn test_empty_message_encodes_to_nothing() {
        let (bytes, p) = encode_regular("", &reference_table(), None).unwrap();
        assert!(bytes.is_empty());
        assert_eq!(p.value(), 0);
    }

    #[test]
    fn test_decrypt_with_wrong_psn_does_not_recover_text() {
        let table = KeyTable::generate(15_485_863, 32_452_843, 123_456_789, 30);
        let bytes = encrypt("attack at dawn", &table, psn(4)).unwrap();
        assert_ne!(decrypt(&bytes, &table, psn(5)).unwrap(), "attack at dawn");
    }
}
