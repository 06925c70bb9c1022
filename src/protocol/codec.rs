//! Protocol codec
//!
//! Turns one framed request line into an [`Invocation`].
//!
//! ## Line Grammar
//! ```text
//! line    := id SP command { SP arg }          (at most 8 args)
//! id      := int
//! arg     := int | string | bytes
//! int     := DIGIT+ | ("0x" | "0X") HEXDIGIT+
//! string  := '"' { printable | '\\' | '\"' } '"'
//! bytes   := '<' { HEXDIGIT HEXDIGIT | WS } '>'
//! ```
//!
//! Tokens are separated by spaces or tabs. Quoted strings and byte literals
//! may contain separators.

use thiserror::Error;

use crate::config::ParseLimits;

use super::command::{Arg, Invocation, MAX_ARGS, MAX_COMMAND_LEN};

/// A line that could not be turned into an invocation.
///
/// Carries the correlation id when it was parsed before the failure, 0 otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct LineError {
    pub id: i64,
    pub message: String,
}

impl LineError {
    fn new(id: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            message: message.into(),
        }
    }
}

// =============================================================================
// Line Parsing
// =============================================================================

/// Parse a framed line (no trailing newline).
///
/// Returns `Ok(None)` for blank lines, which get no response.
pub fn parse_line(line: &[u8], limits: &ParseLimits) -> Result<Option<Invocation>, LineError> {
    if line.len() > limits.max_line_length {
        return Err(LineError::new(0, "line too long"));
    }

    if !is_ascii_only(line) {
        return Err(LineError::new(0, "non-ascii input"));
    }

    let line = trim_whitespace(line);
    if line.is_empty() {
        return Ok(None);
    }

    let mut tokens = Tokenizer::new(line);

    let id_tok = match tokens.next_token() {
        Ok(Some(tok)) => tok,
        Ok(None) => return Err(LineError::new(0, "missing id")),
        Err(message) => return Err(LineError::new(0, message)),
    };
    let id = parse_int(id_tok).ok_or_else(|| LineError::new(0, "invalid id"))?;

    let cmd_tok = match tokens.next_token() {
        Ok(Some(tok)) => tok,
        Ok(None) | Err(_) => return Err(LineError::new(id, "missing command")),
    };
    if cmd_tok.len() >= MAX_COMMAND_LEN {
        return Err(LineError::new(id, "command too long"));
    }
    let command = String::from_utf8_lossy(cmd_tok).to_ascii_lowercase();

    let mut args = Vec::new();
    loop {
        let tok = match tokens.next_token() {
            Ok(Some(tok)) => tok,
            Ok(None) => break,
            Err(message) => return Err(LineError::new(id, message)),
        };

        if args.len() >= MAX_ARGS {
            return Err(LineError::new(id, "too many args"));
        }

        let arg = parse_arg(tok, limits).map_err(|message| LineError::new(id, message))?;
        args.push(arg);
    }

    Ok(Some(Invocation { id, command, args }))
}

fn parse_arg(tok: &[u8], limits: &ParseLimits) -> Result<Arg, &'static str> {
    match tok.first() {
        Some(b'"') => parse_quoted(tok).map(Arg::Str),
        Some(b'<') => parse_bytes(tok, limits.max_bytes_arg).map(Arg::Bytes),
        _ => parse_int(tok).map(Arg::Int).ok_or("invalid number"),
    }
}

// =============================================================================
// Tokenizer
// =============================================================================

/// Splits a trimmed line into raw tokens.
///
/// Quoted and `<..>` tokens are returned with their delimiters; decoding is
/// left to [`parse_quoted`] and [`parse_bytes`].
pub struct Tokenizer<'a> {
    rest: &'a [u8],
}

impl<'a> Tokenizer<'a> {
    pub fn new(line: &'a [u8]) -> Self {
        Self { rest: line }
    }

    pub fn next_token(&mut self) -> Result<Option<&'a [u8]>, &'static str> {
        let start = self
            .rest
            .iter()
            .position(|&b| b != b' ' && b != b'\t')
            .unwrap_or(self.rest.len());
        let s = &self.rest[start..];
        if s.is_empty() {
            self.rest = s;
            return Ok(None);
        }

        let end = match s[0] {
            b'"' => {
                let mut i = 1;
                let mut closed = None;
                while i < s.len() {
                    match s[i] {
                        b'\\' => i += 2,
                        b'"' => {
                            closed = Some(i + 1);
                            break;
                        }
                        _ => i += 1,
                    }
                }
                closed.ok_or("unterminated string")?
            }
            b'<' => match s.iter().position(|&b| b == b'>') {
                Some(i) => i + 1,
                None => return Err("unterminated binary"),
            },
            _ => s
                .iter()
                .position(|&b| b == b' ' || b == b'\t')
                .unwrap_or(s.len()),
        };

        let (tok, rest) = s.split_at(end);
        self.rest = rest;
        Ok(Some(tok))
    }
}

// =============================================================================
// Literals
// =============================================================================

/// Parse a decimal or `0x`-prefixed hexadecimal integer.
///
/// No sign is accepted; values wrap at 64 bits.
pub fn parse_int(tok: &[u8]) -> Option<i64> {
    if tok.is_empty() {
        return None;
    }

    if tok.len() >= 3 && tok[0] == b'0' && (tok[1] == b'x' || tok[1] == b'X') {
        let mut v: i64 = 0;
        for &c in &tok[2..] {
            v = (v << 4) | hex_nibble(c)? as i64;
        }
        return Some(v);
    }

    let mut v: i64 = 0;
    for &c in tok {
        if !c.is_ascii_digit() {
            return None;
        }
        v = v.wrapping_mul(10).wrapping_add((c - b'0') as i64);
    }
    Some(v)
}

/// Decode a `<..>` literal, delimiters included.
///
/// Every byte takes exactly two hex digits: `<f>` is rejected rather than
/// guessing between `0f` and `f0`.
pub fn parse_bytes(tok: &[u8], max_len: usize) -> Result<Vec<u8>, &'static str> {
    if tok.len() < 2 || tok[0] != b'<' || tok[tok.len() - 1] != b'>' {
        return Err("invalid binary literal");
    }

    let mut digits = Vec::with_capacity(tok.len() - 2);
    for &c in &tok[1..tok.len() - 1] {
        if matches!(c, b' ' | b'\t' | b'\r' | b'\n') {
            continue;
        }
        digits.push(hex_nibble(c).ok_or("binary contains non-hex")?);
    }

    if digits.len() % 2 != 0 {
        return Err("binary hex digit count must be even");
    }
    if digits.len() / 2 > max_len {
        return Err("binary too large");
    }

    Ok(digits.chunks_exact(2).map(|p| (p[0] << 4) | p[1]).collect())
}

/// Decode a `"..."` literal, delimiters included.
///
/// Only `\\` and `\"` escapes exist; raw control bytes, tab included,
/// are rejected.
pub fn parse_quoted(tok: &[u8]) -> Result<String, &'static str> {
    if tok.len() < 2 || tok[0] != b'"' || tok[tok.len() - 1] != b'"' {
        return Err("invalid string literal");
    }

    let body = &tok[1..tok.len() - 1];
    let mut out = String::with_capacity(body.len());
    let mut iter = body.iter();
    while let Some(&c) = iter.next() {
        if c == b'\\' {
            match iter.next() {
                Some(&e @ (b'\\' | b'"')) => out.push(e as char),
                Some(_) => return Err("unsupported escape"),
                None => return Err("invalid escape"),
            }
        } else if is_string_char(c) {
            out.push(c as char);
        } else {
            return Err("non-ascii char in string");
        }
    }

    Ok(out)
}

// =============================================================================
// Helpers
// =============================================================================

fn hex_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(10 + c - b'a'),
        b'A'..=b'F' => Some(10 + c - b'A'),
        _ => None,
    }
}

fn is_string_char(c: u8) -> bool {
    c == b' ' || (0x21..=0x7E).contains(&c)
}

fn is_ascii_only(s: &[u8]) -> bool {
    s.iter().all(|&c| c != 0 && c <= 0x7F)
}

fn trim_whitespace(mut s: &[u8]) -> &[u8] {
    let ws = |c: &u8| matches!(c, b' ' | b'\t' | b'\r' | b'\n');
    while let Some(c) = s.first() {
        if !ws(c) {
            break;
        }
        s = &s[1..];
    }
    while let Some(c) = s.last() {
        if !ws(c) {
            break;
        }
        s = &s[..s.len() - 1];
    }
    s
}
