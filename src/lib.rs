//! # cartremote
//!
//! A remote-control server embedded in a tick-driven cartridge runtime:
//! - Line-oriented text protocol over a loopback TCP socket
//! - Non-blocking, single-threaded; driven by the host once per frame
//! - Memory peek/poke, cart load/restart/quit, Lua eval through host callbacks
//! - Lua values rendered back as Lua literals
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Host loop (calls tick())                     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 Server (10 slots)                            │
//! │        accept → read → frame lines → flush                   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   Codec     │─────────▶│ Dispatcher  │
//!   │ (tokenize)  │          │ (callbacks) │
//!   └─────────────┘          └──────┬──────┘
//!                                   │
//!                                   ▼
//!                           ┌─────────────┐
//!                           │ Serializer  │
//!                           │ (Lua value) │
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod serialize;
pub mod dispatch;
pub mod network;
pub mod fps;
pub mod timing;
pub mod discovery;
pub mod script;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{HostError, HostResult, RemoteError, Result};
pub use config::Config;
pub use dispatch::{Callbacks, Dispatcher};
pub use network::Server;
pub use script::LuaScript;
pub use protocol::PROTOCOL_VERSION;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of cartremote
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
