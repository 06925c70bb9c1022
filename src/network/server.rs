//! Remoting Server
//!
//! Owns the loopback listener and a fixed table of connection slots. The
//! host drives it by calling [`Server::tick`] once per frame; nothing here
//! blocks or spawns threads.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener};

use crate::config::Config;
use crate::discovery::Discovery;
use crate::dispatch::{Callbacks, Dispatcher};
use crate::error::{RemoteError, Result};
use crate::fps::FpsTracker;
use crate::timing::FrameTimes;

use super::connection::{CloseReason, Connection};

/// Number of connection slots
pub const MAX_CLIENTS: usize = 10;

/// Tick-driven remoting server
pub struct Server {
    config: Config,

    /// Bound listener; `None` until a bind succeeds
    listener: Option<TcpListener>,
    local_addr: Option<SocketAddr>,

    slots: [Option<Connection>; MAX_CLIENTS],
    client_count: usize,
    last_client_count: usize,

    dispatcher: Dispatcher,

    // -------------------------------------------------------------------------
    // Status
    // -------------------------------------------------------------------------
    fps: FpsTracker,
    user_times: FrameTimes,
    last_error: Option<String>,
    status_dirty: bool,

    discovery: Option<Discovery>,
}

impl Server {
    /// Create a server and attempt the first bind. A bind failure is not
    /// fatal: it shows up in [`Server::last_error`] and is retried every tick.
    pub fn new(config: Config, callbacks: Callbacks) -> Result<Self> {
        if config.max_input_buffer == 0
            || config.max_output_buffer == 0
            || config.max_line_length == 0
            || config.max_bytes_arg == 0
        {
            return Err(RemoteError::Config(
                "buffer, line and argument limits must be non-zero".to_string(),
            ));
        }

        let mut dispatcher = Dispatcher::new(callbacks, config.parse_limits());
        if let Some(banner) = &config.banner {
            dispatcher = dispatcher.with_banner(banner.clone());
        }

        let mut server = Self {
            fps: FpsTracker::new(config.fps_window),
            config,
            listener: None,
            local_addr: None,
            slots: std::array::from_fn(|_| None),
            client_count: 0,
            last_client_count: 0,
            dispatcher,
            user_times: FrameTimes::default(),
            last_error: None,
            status_dirty: true,
            discovery: None,
        };

        // a failed first bind is recorded and retried by tick()
        if let Err(e) = server.initialize() {
            tracing::debug!("Initial bind failed: {}", e);
        }

        Ok(server)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Bind the non-blocking loopback listener if it is not bound yet.
    ///
    /// Idempotent. A failure is recorded as the last listen error; on
    /// success a discovery record is published (best effort).
    pub fn initialize(&mut self) -> Result<()> {
        if self.listener.is_some() {
            return Ok(());
        }

        let (listener, local_addr) = match self.bind() {
            Ok(bound) => bound,
            Err(e) => {
                let message = e.to_string();
                if self.last_error.as_deref() != Some(message.as_str()) {
                    tracing::warn!("Remoting unavailable: {}", message);
                }
                self.last_error = Some(message);
                self.status_dirty = true;
                return Err(e);
            }
        };

        if self.last_error.take().is_some() {
            tracing::info!("Remoting recovered");
        }
        tracing::info!("Remoting listening on {}", local_addr);

        self.listener = Some(listener);
        self.local_addr = Some(local_addr);
        self.status_dirty = true;

        if self.config.discovery {
            self.publish_discovery(local_addr.port());
        }

        Ok(())
    }

    fn bind(&self) -> Result<(TcpListener, SocketAddr)> {
        let addr = SocketAddrV4::new(Ipv4Addr::LOCALHOST, self.config.port);
        let listener = TcpListener::bind(addr).map_err(|e| RemoteError::Bind {
            message: format!("bind() failed on {} (port in use?)", addr),
            source: e,
        })?;
        listener.set_nonblocking(true).map_err(|e| RemoteError::Bind {
            message: "failed to set nonblocking".to_string(),
            source: e,
        })?;
        let local_addr = listener.local_addr()?;
        Ok((listener, local_addr))
    }

    /// Run one bounded round of network work: accept, read, dispatch, flush.
    pub fn tick(&mut self) {
        if self.initialize().is_err() {
            self.stop_discovery();
            return;
        }

        self.accept_pending();

        for index in 0..MAX_CLIENTS {
            self.service_slot(index);
        }

        if self.client_count != self.last_client_count {
            self.last_client_count = self.client_count;
            self.status_dirty = true;
        }
    }

    /// Disconnect every client, remove the discovery record and release the
    /// listener. Safe to call more than once.
    pub fn shutdown(&mut self) {
        for index in 0..MAX_CLIENTS {
            if self.slots[index].is_some() {
                self.disconnect(index, None);
            }
        }

        self.stop_discovery();

        if self.listener.take().is_some() {
            tracing::info!("Remoting listener closed");
            self.local_addr = None;
            self.status_dirty = true;
        }
    }

    // =========================================================================
    // Connection handling
    // =========================================================================

    fn accept_pending(&mut self) {
        let Some(listener) = self.listener.as_ref() else {
            return;
        };

        loop {
            let (stream, addr) = match listener.accept() {
                Ok(accepted) => accepted,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!("accept() failed: {}", e);
                    return;
                }
            };

            let Some(index) = self.slots.iter().position(Option::is_none) else {
                tracing::debug!("Rejecting {}: all {} slots in use", addr, MAX_CLIENTS);
                drop(stream);
                continue;
            };

            match Connection::new(stream) {
                Ok(conn) => {
                    tracing::debug!("Client {} connected in slot {}", conn.peer_addr(), index);
                    self.slots[index] = Some(conn);
                    self.client_count += 1;
                    self.status_dirty = true;
                }
                Err(e) => tracing::warn!("Failed to set up connection from {}: {}", addr, e),
            }
        }
    }

    fn service_slot(&mut self, index: usize) {
        let max_input = self.config.max_input_buffer;
        let max_output = self.config.max_output_buffer;
        let fps = self.fps.fps();

        let Some(conn) = self.slots[index].as_mut() else {
            return;
        };

        if let Err(reason) = conn.read_available(max_input) {
            self.disconnect(index, Some(reason));
            return;
        }

        while let Some(line) = conn.next_line() {
            tracing::trace!("{} <- {}", conn.peer_addr(), String::from_utf8_lossy(&line));
            if let Some(response) = self.dispatcher.handle_line(&line, fps) {
                conn.queue_response(&response, max_output);
            }
        }

        // whatever is left is a partial line; if it fills the buffer it can never complete
        if conn.input_len() >= max_input {
            self.disconnect(index, Some(CloseReason::InputOverflow));
            return;
        }

        if let Err(reason) = conn.flush() {
            self.disconnect(index, Some(reason));
        }
    }

    fn disconnect(&mut self, index: usize, reason: Option<CloseReason>) {
        let Some(conn) = self.slots[index].take() else {
            return;
        };

        match reason {
            Some(CloseReason::Socket(e)) => {
                tracing::warn!("Client {} dropped: socket error: {}", conn.peer_addr(), e)
            }
            Some(reason) => tracing::debug!("Client {} disconnected: {}", conn.peer_addr(), reason),
            None => tracing::debug!("Client {} disconnected: shutdown", conn.peer_addr()),
        }

        self.client_count = self.client_count.saturating_sub(1);
        self.status_dirty = true;
    }

    fn stop_discovery(&mut self) {
        if let Some(discovery) = self.discovery.take() {
            if let Err(e) = discovery.remove() {
                tracing::debug!("Failed to remove discovery record: {}", e);
            }
        }
    }

    fn publish_discovery(&mut self, port: u16) {
        let Some(dir) = self.config.discovery_dir.clone().or_else(Discovery::default_dir) else {
            tracing::debug!("No data directory; skipping discovery record");
            return;
        };

        match Discovery::publish(&dir, port) {
            Ok(discovery) => self.discovery = Some(discovery),
            Err(e) => tracing::debug!("Discovery record not published: {}", e),
        }
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Feed the frame-rate tracker with the host's monotonic counter
    pub fn on_frame(&mut self, counter: u64, freq: u64) {
        if self.fps.on_frame(counter, freq) {
            self.status_dirty = true;
        }
    }

    /// Current rounded FPS
    pub fn fps(&self) -> u32 {
        self.fps.fps()
    }

    /// Update the host timing breakdown shown in the status line
    pub fn set_user_times(&mut self, times: FrameTimes) {
        if self.user_times != times {
            self.user_times = times;
            self.status_dirty = true;
        }
    }

    /// One-line status for a window title
    pub fn title_info(&self) -> String {
        let listen_state = match (&self.local_addr, &self.last_error) {
            (Some(addr), _) => format!(
                "listening on 127.0.0.1:{} ({} clients)",
                addr.port(),
                self.client_count
            ),
            (None, Some(err)) => format!("remoting error: {}", err),
            (None, None) => "remoting not listening".to_string(),
        };

        let t = &self.user_times;
        format!(
            "FPS: {} | TIC {} SCN {} BDR {} TOT {} | {}",
            self.fps.fps(),
            FrameTimes::format_ms10(t.tick_ms10),
            FrameTimes::format_ms10(t.scanline_ms10),
            FrameTimes::format_ms10(t.border_ms10),
            FrameTimes::format_ms10(t.total_ms10),
            listen_state
        )
    }

    /// Return and clear the "status changed" flag
    pub fn take_status_dirty(&mut self) -> bool {
        std::mem::take(&mut self.status_dirty)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn is_listening(&self) -> bool {
        self.listener.is_some()
    }

    pub fn client_count(&self) -> usize {
        self.client_count
    }

    /// Last bind failure, cleared once the listener is healthy again
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Path of the published discovery record, if any
    pub fn discovery(&self) -> Option<&Discovery> {
        self.discovery.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.local_addr)
            .field("client_count", &self.client_count)
            .field("last_error", &self.last_error)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
