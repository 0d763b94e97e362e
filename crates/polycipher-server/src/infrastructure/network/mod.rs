//! Network infrastructure for the responder.
//!
//! - **`connection`** – Length-prefixed frame I/O and the per-connection loop
//!   that feeds decoded messages to the respond use case.  Generic over the
//!   stream type so it runs against mock I/O in tests.
//!
//! - **`listener`** – Binds the TCP port and spawns one task per accepted
//!   connection, each inside its own tracing span.

pub mod connection;
pub mod listener;

pub use connection::{read_frame, serve_connection, write_message, NetworkError};
pub use listener::{bind, run_server};
