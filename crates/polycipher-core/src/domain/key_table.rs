//! Key table derivation shared by both peers.
//!
//! Both sides of a session run [`KeyTable::generate`] on the same
//! `(P, Q, S, num_keys)` and must end up with bit-identical tables.  There is
//! no check on the wire that they did; a mismatch simply produces garbage on
//! the receiving side.
//!
//! # Arithmetic width
//!
//! Every addition and multiplication wraps modulo 2^64, including the running
//! seed between iterations.  Tables produced here therefore differ from a
//! run with unbounded integers for the same inputs.

use serde::{Deserialize, Serialize};

/// The scalar inputs to key-table generation.
///
/// `p` is picked by the initiator, `q` by the responder, and `seed` (S) is the
/// only field that changes during a session, through key rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub p: u64,
    pub q: u64,
    pub seed: u64,
    pub num_keys: usize,
}

impl ParameterSet {
    /// Returns a copy of these parameters with a new seed.
    pub fn with_seed(self, seed: u64) -> Self {
        Self { seed, ..self }
    }

    /// Generates the key table for these parameters.
    pub fn build_table(&self) -> KeyTable {
        KeyTable::generate(self.p, self.q, self.seed, self.num_keys)
    }
}

/// An ordered, fixed-length sequence of 64-bit keys.
///
/// Tables are regenerated wholesale on rotation and never patched in place,
/// so the type exposes no mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyTable {
    keys: Vec<u64>,
}

impl KeyTable {
    /// Derives `num_keys` keys from `p`, `q` and the starting seed `s`.
    ///
    /// Pure and deterministic.  `num_keys == 0` yields an empty table, which
    /// is legal but cannot be used to transform messages.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use polycipher_core::KeyTable;
    ///
    /// let a = KeyTable::generate(15485863, 32452843, 123456789, 30);
    /// let b = KeyTable::generate(15485863, 32452843, 123456789, 30);
    /// assert_eq!(a, b);
    /// assert_eq!(a.len(), 30);
    /// ```
    pub fn generate(p: u64, q: u64, s: u64, num_keys: usize) -> Self {
        let mut keys = Vec::with_capacity(num_keys);
        let mut current = s;
        for _ in 0..num_keys {
            let mix = scramble(p, current);
            keys.push(scramble(mix, q));
            current = scramble(current, q);
        }
        Self { keys }
    }

    /// Number of keys in the table.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the key used for byte `index` of a message sent with `offset`
    /// (the PSN), wrapping around the table.
    ///
    /// Returns `None` only for an empty table.
    pub fn key_for(&self, index: usize, offset: usize) -> Option<u64> {
        if self.keys.is_empty() {
            return None;
        }
        let slot = (index % self.keys.len() + offset % self.keys.len()) % self.keys.len();
        Some(self.keys[slot])
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.keys
    }
}

/// `(a * b) xor (a + b)` with both operations wrapping at 64 bits.
///
/// All three generation steps share this shape; only the operands differ.
fn scramble(a: u64, b: u64) -> u64 {
    a.wrapping_mul(b) ^ a.wrapping_add(b)
}
