//! Infrastructure layer for the responder.
//!
//! Contains OS-facing adapters: the TCP listener and per-connection framing,
//! and TOML configuration storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `polycipher_core`, but MUST NOT be imported by the `application` layer.

pub mod network;
pub mod storage;
