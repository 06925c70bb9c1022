//! Configuration for cartremote
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Default TCP port for the remoting listener
pub const DEFAULT_PORT: u16 = 8000;

/// Default size for every buffer/line/argument limit (1 MiB)
pub const DEFAULT_LIMIT: usize = 1024 * 1024;

/// Main configuration for a remoting server
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Loopback TCP port. `0` asks the OS for an ephemeral port.
    pub port: u16,

    // -------------------------------------------------------------------------
    // Limits
    // -------------------------------------------------------------------------
    /// Max bytes buffered per connection before a complete line arrives.
    /// A connection whose partial line reaches this size is dropped.
    pub max_input_buffer: usize,

    /// Max bytes queued per connection for sending; output past this is dropped
    pub max_output_buffer: usize,

    /// Max length of a single request line
    pub max_line_length: usize,

    /// Max decoded size of a `<..>` literal and of a `peek` request
    pub max_bytes_arg: usize,

    // -------------------------------------------------------------------------
    // Status Configuration
    // -------------------------------------------------------------------------
    /// Rolling window used for the FPS average
    pub fps_window: Duration,

    /// Banner returned by `hello` when the host installs no callback
    pub banner: Option<String>,

    // -------------------------------------------------------------------------
    // Discovery Configuration
    // -------------------------------------------------------------------------
    /// Publish a discovery record once the listener is bound
    pub discovery: bool,

    /// Directory for discovery records. `None` uses the platform default:
    ///   {local data dir}/cartremote/remoting/sessions
    pub discovery_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_input_buffer: DEFAULT_LIMIT,
            max_output_buffer: DEFAULT_LIMIT,
            max_line_length: DEFAULT_LIMIT,
            max_bytes_arg: DEFAULT_LIMIT,
            fps_window: Duration::from_millis(500),
            banner: None,
            discovery: true,
            discovery_dir: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Limits the tokenizer needs, split out so it can run without a server
    pub fn parse_limits(&self) -> ParseLimits {
        ParseLimits {
            max_line_length: self.max_line_length,
            max_bytes_arg: self.max_bytes_arg,
        }
    }
}

/// Limits applied while parsing a request line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    pub max_line_length: usize,
    pub max_bytes_arg: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_LIMIT,
            max_bytes_arg: DEFAULT_LIMIT,
        }
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the loopback port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the per-connection input buffer limit (in bytes)
    pub fn max_input_buffer(mut self, size: usize) -> Self {
        self.config.max_input_buffer = size;
        self
    }

    /// Set the per-connection output buffer limit (in bytes)
    pub fn max_output_buffer(mut self, size: usize) -> Self {
        self.config.max_output_buffer = size;
        self
    }

    /// Set the maximum request line length (in bytes)
    pub fn max_line_length(mut self, size: usize) -> Self {
        self.config.max_line_length = size;
        self
    }

    /// Set the maximum byte literal / peek size
    pub fn max_bytes_arg(mut self, size: usize) -> Self {
        self.config.max_bytes_arg = size;
        self
    }

    /// Set the FPS averaging window
    pub fn fps_window(mut self, window: Duration) -> Self {
        self.config.fps_window = window;
        self
    }

    /// Set the default `hello` banner
    pub fn banner(mut self, banner: impl Into<String>) -> Self {
        self.config.banner = Some(banner.into());
        self
    }

    /// Enable or disable discovery publishing
    pub fn discovery(mut self, enabled: bool) -> Self {
        self.config.discovery = enabled;
        self
    }

    /// Override the discovery directory
    pub fn discovery_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.discovery_dir = Some(path.into());
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
