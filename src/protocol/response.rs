//! Response definitions
//!
//! Represents responses to clients and their wire encoding.

use bytes::{BufMut, BytesMut};

/// Payload carried by a successful response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Sent as-is (numbers, `PONG`, serialized literals)
    Token(String),

    /// Sent double-quoted and escaped
    Text(String),

    /// Sent as `<aa bb ..>`
    Bytes(Vec<u8>),
}

/// Outcome of a single request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ok(Option<Payload>),
    Err(String),
}

/// A response to send to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Correlation id from the request (0 when it could not be parsed)
    pub id: i64,

    pub outcome: Outcome,
}

impl Response {
    /// Create an OK response with no payload
    pub fn ok(id: i64) -> Self {
        Self {
            id,
            outcome: Outcome::Ok(None),
        }
    }

    /// Create an OK response with a bare token payload
    pub fn token(id: i64, token: impl Into<String>) -> Self {
        Self {
            id,
            outcome: Outcome::Ok(Some(Payload::Token(token.into()))),
        }
    }

    /// Create an OK response with a quoted string payload
    pub fn text(id: i64, text: impl Into<String>) -> Self {
        Self {
            id,
            outcome: Outcome::Ok(Some(Payload::Text(text.into()))),
        }
    }

    /// Create an OK response with a byte payload
    pub fn bytes(id: i64, bytes: Vec<u8>) -> Self {
        Self {
            id,
            outcome: Outcome::Ok(Some(Payload::Bytes(bytes))),
        }
    }

    /// Create an ERR response
    pub fn error(id: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            outcome: Outcome::Err(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, Outcome::Ok(_))
    }

    /// Encode into a freshly allocated line
    pub fn encode(&self) -> Vec<u8> {
        let mut out = BytesMut::with_capacity(self.encoded_len_hint());
        self.encode_into(&mut out);
        out.to_vec()
    }

    /// Append the wire form, including the trailing newline, to `out`
    pub fn encode_into(&self, out: &mut BytesMut) {
        out.put_slice(self.id.to_string().as_bytes());

        match &self.outcome {
            Outcome::Ok(None) => out.put_slice(b" OK"),
            Outcome::Ok(Some(Payload::Token(token))) => {
                if token.is_empty() {
                    out.put_slice(b" OK");
                } else {
                    out.put_slice(b" OK ");
                    put_sanitized(out, token.as_bytes());
                }
            }
            Outcome::Ok(Some(Payload::Text(text))) => {
                out.put_slice(b" OK \"");
                put_escaped(out, text.as_bytes());
                out.put_u8(b'"');
            }
            Outcome::Ok(Some(Payload::Bytes(bytes))) => {
                out.put_slice(b" OK <");
                put_hex(out, bytes);
                out.put_u8(b'>');
            }
            Outcome::Err(message) => {
                out.put_slice(b" ERR \"");
                put_escaped(out, message.as_bytes());
                out.put_u8(b'"');
            }
        }

        out.put_u8(b'\n');
    }

    fn encoded_len_hint(&self) -> usize {
        let payload = match &self.outcome {
            Outcome::Ok(None) => 0,
            Outcome::Ok(Some(Payload::Token(s))) | Outcome::Ok(Some(Payload::Text(s))) => {
                s.len() + 4
            }
            Outcome::Ok(Some(Payload::Bytes(b))) => b.len() * 3 + 4,
            Outcome::Err(m) => m.len() + 8,
        };
        24 + payload
    }
}

// =============================================================================
// Escaping
// =============================================================================

/// True for bytes that may appear unescaped inside a protocol line
pub fn is_printable_or_space(b: u8) -> bool {
    b == b'\t' || b == b' ' || (0x21..=0x7E).contains(&b)
}

/// Escape text for a quoted payload: `\` and `"` get a backslash, anything
/// outside printable ASCII (plus space and tab) becomes `?`.
pub fn escape_text(s: &str) -> String {
    let mut out = BytesMut::with_capacity(s.len());
    put_escaped(&mut out, s.as_bytes());
    // put_escaped only emits ASCII
    String::from_utf8_lossy(&out).into_owned()
}

fn put_escaped(out: &mut BytesMut, s: &[u8]) {
    for &b in s {
        match b {
            b'\\' | b'"' => {
                out.put_u8(b'\\');
                out.put_u8(b);
            }
            b if is_printable_or_space(b) => out.put_u8(b),
            _ => out.put_u8(b'?'),
        }
    }
}

fn put_sanitized(out: &mut BytesMut, s: &[u8]) {
    for &b in s {
        out.put_u8(if is_printable_or_space(b) { b } else { b'?' });
    }
}

fn put_hex(out: &mut BytesMut, bytes: &[u8]) {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    for (i, &b) in bytes.iter().enumerate() {
        if i > 0 {
            out.put_u8(b' ');
        }
        out.put_u8(DIGITS[(b >> 4) as usize]);
        out.put_u8(DIGITS[(b & 0x0f) as usize]);
    }
}
