//! Command definitions
//!
//! Represents one parsed request line.

/// Maximum number of arguments accepted after the command name
pub const MAX_ARGS: usize = 8;

/// Maximum command name length (exclusive)
pub const MAX_COMMAND_LEN: usize = 64;

/// Argument kinds, used for arity/type checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Int,
    Str,
    Bytes,
}

/// A typed argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// Decimal or `0x` hex integer
    Int(i64),

    /// Decoded `"..."` literal
    Str(String),

    /// Decoded `<..>` literal
    Bytes(Vec<u8>),
}

impl Arg {
    /// Get the argument type
    pub fn arg_type(&self) -> ArgType {
        match self {
            Arg::Int(_) => ArgType::Int,
            Arg::Str(_) => ArgType::Str,
            Arg::Bytes(_) => ArgType::Bytes,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Arg::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Arg::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// A parsed request: `<id> <command> [args...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Correlation id echoed in the response
    pub id: i64,

    /// Lower-cased command name
    pub command: String,

    /// Up to [`MAX_ARGS`] arguments, in order
    pub args: Vec<Arg>,
}

impl Invocation {
    /// True when the argument types match `expected` exactly (arity included)
    pub fn matches(&self, expected: &[ArgType]) -> bool {
        self.args.len() == expected.len()
            && self
                .args
                .iter()
                .zip(expected)
                .all(|(arg, ty)| arg.arg_type() == *ty)
    }
}
