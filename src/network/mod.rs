//! Network Module
//!
//! Non-blocking loopback server and client connection handling.
//!
//! ## Architecture
//! - One listener, bound lazily and re-tried every tick on failure
//! - Fixed table of 10 connection slots
//! - Everything runs on the host's thread, one bounded pass per tick

mod server;
mod connection;

pub use server::{Server, MAX_CLIENTS};
pub use connection::{CloseReason, Connection};
