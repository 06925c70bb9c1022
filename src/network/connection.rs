//! Connection Handler
//!
//! One accepted, non-blocking client stream with its input and output
//! buffers. The connection never blocks: every method does what the socket
//! allows right now and reports back.

use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;

use bytes::{Buf, BytesMut};

use crate::error::Result;
use crate::protocol::Response;

/// Size of the stack chunk used for each `read` call
const READ_CHUNK: usize = 16 * 1024;

/// Why a connection must be closed
#[derive(Debug)]
pub enum CloseReason {
    /// Peer shut down its side
    PeerClosed,

    /// A partial line filled the whole input buffer
    InputOverflow,

    /// Socket failed with something other than would-block
    Socket(std::io::Error),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::PeerClosed => write!(f, "peer closed"),
            CloseReason::InputOverflow => write!(f, "input buffer overflow"),
            CloseReason::Socket(e) => write!(f, "socket error: {}", e),
        }
    }
}

/// A live client connection
pub struct Connection {
    stream: TcpStream,

    /// Bytes read but not yet framed into lines
    input: BytesMut,

    /// Bytes queued for send; the front is the next byte to write
    output: BytesMut,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Wrap an accepted stream, switching it to non-blocking mode
    pub fn new(stream: TcpStream) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_nonblocking(true)?;

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            input: BytesMut::new(),
            output: BytesMut::new(),
            peer_addr,
        })
    }

    /// Drain readable bytes into the input buffer, stopping once it holds
    /// `limit` bytes or the socket would block.
    pub fn read_available(&mut self, limit: usize) -> std::result::Result<(), CloseReason> {
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if self.input.len() >= limit {
                return Ok(());
            }

            let room = (limit - self.input.len()).min(READ_CHUNK);
            match self.stream.read(&mut chunk[..room]) {
                Ok(0) => return Err(CloseReason::PeerClosed),
                Ok(n) => self.input.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(CloseReason::Socket(e)),
            }
        }
    }

    /// Pop the next complete line, without its `\n` and one optional `\r`.
    ///
    /// The unconsumed partial line stays at the start of the buffer.
    pub fn next_line(&mut self) -> Option<BytesMut> {
        let pos = self.input.iter().position(|&b| b == b'\n')?;
        let mut line = self.input.split_to(pos + 1);
        line.truncate(pos);
        if line.last() == Some(&b'\r') {
            line.truncate(pos - 1);
        }
        Some(line)
    }

    /// Bytes waiting in the input buffer
    pub fn input_len(&self) -> usize {
        self.input.len()
    }

    /// Bytes waiting to be sent
    pub fn output_len(&self) -> usize {
        self.output.len()
    }

    /// Queue a response. Returns false when it was dropped because the
    /// output buffer would exceed `limit`.
    pub fn queue_response(&mut self, response: &Response, limit: usize) -> bool {
        let line = response.encode();
        self.queue(&line, limit)
    }

    /// Queue raw bytes, dropping them whole if they do not fit under `limit`
    pub fn queue(&mut self, bytes: &[u8], limit: usize) -> bool {
        if bytes.is_empty() {
            return true;
        }
        if self.output.len() + bytes.len() > limit {
            tracing::trace!(
                "Dropping {} bytes of output for {} (slow reader)",
                bytes.len(),
                self.peer_addr
            );
            return false;
        }
        self.output.extend_from_slice(bytes);
        true
    }

    /// Write as much queued output as the socket accepts
    pub fn flush(&mut self) -> std::result::Result<(), CloseReason> {
        while !self.output.is_empty() {
            match self.stream.write(&self.output) {
                Ok(0) => {
                    return Err(CloseReason::Socket(std::io::Error::new(
                        ErrorKind::WriteZero,
                        "socket accepted no bytes",
                    )))
                }
                Ok(n) => self.output.advance(n),
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(CloseReason::Socket(e)),
            }
        }

        // fully sent; release the allocation
        self.output = BytesMut::new();
        Ok(())
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("peer_addr", &self.peer_addr)
            .field("input_len", &self.input.len())
            .field("output_len", &self.output.len())
            .finish()
    }
}
