//! Error types for cartremote
//!
//! Provides a unified error type for server-level operations plus the
//! narrower error types that cross the protocol and host boundaries.

use thiserror::Error;

/// Result type alias using RemoteError
pub type Result<T> = std::result::Result<T, RemoteError>;

/// Unified error type for cartremote operations
#[derive(Debug, Error)]
pub enum RemoteError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("{message}")]
    Bind {
        message: String,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Discovery Errors
    // -------------------------------------------------------------------------
    #[error("Discovery error: {0}")]
    Discovery(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failure reported by a host callback.
///
/// The message is sent to the peer verbatim (after escaping), so it should
/// be short and human readable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HostError(pub String);

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<&str> for HostError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

impl From<String> for HostError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<mlua::Error> for HostError {
    /// Keeps only the Lua message, dropping any appended stack traceback
    fn from(err: mlua::Error) -> Self {
        let text = err.to_string();
        let message = text.lines().next().unwrap_or_default();
        Self(message.to_string())
    }
}

impl From<crate::serialize::SerializeError> for HostError {
    fn from(err: crate::serialize::SerializeError) -> Self {
        Self(err.to_string())
    }
}

/// Result type for host callbacks
pub type HostResult<T> = std::result::Result<T, HostError>;
