//! Application layer use cases for the responder.
//!
//! - **`respond`** – Drives one responder [`Session`](polycipher_core::Session)
//!   per connection: answers the handshake, logs decrypted messages, applies
//!   key updates and decides when the connection should end.  No sockets here;
//!   the network layer feeds it decoded messages.

pub mod respond;
