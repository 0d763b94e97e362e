//! Pure cipher logic with no I/O.
//!
//! - **`key_table`** – derives the shared key table from `(P, Q, S, n)`.
//! - **`sequence`** – the 4-bit PSN and the transform schedule it selects.
//! - **`pipeline`** – the three reversible byte transforms and the
//!   message-level encode/decode built on them.

pub mod key_table;
pub mod pipeline;
pub mod sequence;

pub use key_table::{KeyTable, ParameterSet};
pub use pipeline::{decode_regular, decrypt, encode_regular, encrypt, CipherError};
pub use sequence::{schedule, FunctionSequence, Psn, Transform, SCHEDULE_LEN};
