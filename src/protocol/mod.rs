//! Protocol Module
//!
//! Defines the line protocol spoken over the remoting socket.
//!
//! ## Request Format
//! ```text
//! <id> <command> [args...]\n        (\r\n also accepted)
//! ```
//!
//! ### Argument Literals
//! - `123`, `0x7F`        : integer
//! - `"escaped text"`     : string (`\\` and `\"` escapes)
//! - `<aa bb>`            : bytes (two hex digits per byte)
//!
//! ## Response Format
//! ```text
//! <id> OK[ <payload>]\n
//! <id> ERR "<escaped message>"\n
//! ```
//!
//! ### Payloads
//! - bare token           : `PONG`, `60`, serialized Lua literals
//! - quoted string        : `"TIC path"`
//! - bytes                : `<00 ff 10>`

mod command;
mod response;
mod codec;

pub use command::{Arg, ArgType, Invocation, MAX_ARGS, MAX_COMMAND_LEN};
pub use response::{escape_text, is_printable_or_space, Outcome, Payload, Response};
pub use codec::{parse_bytes, parse_int, parse_line, parse_quoted, LineError, Tokenizer};

/// Protocol version advertised by `hello` and the discovery record
pub const PROTOCOL_VERSION: &str = "v1";
