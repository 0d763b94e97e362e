//! Infrastructure layer for the initiator.
//!
//! Adapters for the ports declared in `application::ports`:
//!
//! - **`network`** – [`network::FramedLink`], the TCP [`PeerLink`] to the responder.
//! - **`console`** – [`console::StdConsole`], the stdin/stdout [`Console`].
//! - **`storage`** – TOML config loading.
//!
//! This layer may depend on `application` and `polycipher_core`, never the
//! other way round.
//!
//! [`PeerLink`]: crate::application::ports::PeerLink
//! [`Console`]: crate::application::ports::Console

pub mod console;
pub mod network;
pub mod storage;
