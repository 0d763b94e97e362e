//! Application layer for the initiator.
//!
//! Use cases here depend on the [`ports::PeerLink`] and [`ports::Console`]
//! traits rather than on sockets or stdin, so the whole menu flow runs
//! against in-memory doubles in tests.
//!
//! - **`ports`**    – The traits the infrastructure layer implements.
//! - **`menu`**     – Menu choices and the text shown to the user.
//! - **`initiate`** – Handshake followed by the interactive menu loop.

pub mod initiate;
pub mod menu;
pub mod ports;
