//! Lua value serializer
//!
//! Renders a runtime value as a Lua literal for transport in an `OK` line:
//!
//! ```text
//! nil | true | false | 42 | 0.5 | "esc\"aped" | {1,2,3,foo="bar",["a b"]=1}
//! ```
//!
//! Tables print their array part (`1..=#t`) first, then the remaining
//! entries in traversal order. The output is always pure ASCII.

use std::collections::HashSet;
use std::ffi::c_void;

use mlua::{Table, Value};
use thiserror::Error;

/// Deepest table nesting accepted (root table is depth 0)
pub const MAX_DEPTH: usize = 32;

/// Serializer failures
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("cycle detected")]
    Cycle,

    #[error("table too deep")]
    TooDeep,

    #[error("result too large")]
    TooLarge,

    #[error("unsupported result type: {0}")]
    UnsupportedType(&'static str),

    #[error("unsupported key type: {0}")]
    UnsupportedKey(&'static str),

    #[error("{0}")]
    Lua(#[from] mlua::Error),
}

/// Serialize `value`, failing if the text would exceed `max_len` bytes.
pub fn serialize(value: &Value, max_len: usize) -> Result<String, SerializeError> {
    let mut out = Output::new(max_len);
    let mut visited = HashSet::new();
    write_value(&mut out, value, 0, &mut visited)?;
    Ok(out.buf)
}

/// Identifier rule used for bare table keys: `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(s: &[u8]) -> bool {
    match s.split_first() {
        Some((first, rest)) => {
            (first.is_ascii_alphabetic() || *first == b'_')
                && rest.iter().all(|c| c.is_ascii_alphanumeric() || *c == b'_')
        }
        None => false,
    }
}

/// Lua 5.4 reserved words
pub const RESERVED_WORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if",
    "in", "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

pub fn is_reserved_word(s: &str) -> bool {
    RESERVED_WORDS.contains(&s)
}

// =============================================================================
// Output buffer
// =============================================================================

struct Output {
    buf: String,
    max_len: usize,
}

impl Output {
    fn new(max_len: usize) -> Self {
        Self {
            buf: String::new(),
            max_len,
        }
    }

    fn push_str(&mut self, s: &str) -> Result<(), SerializeError> {
        if self.buf.len() + s.len() > self.max_len {
            return Err(SerializeError::TooLarge);
        }
        self.buf.push_str(s);
        Ok(())
    }

    fn push(&mut self, c: char) -> Result<(), SerializeError> {
        if self.buf.len() + c.len_utf8() > self.max_len {
            return Err(SerializeError::TooLarge);
        }
        self.buf.push(c);
        Ok(())
    }
}

// =============================================================================
// Values
// =============================================================================

fn write_value(
    out: &mut Output,
    value: &Value,
    depth: usize,
    visited: &mut HashSet<*const c_void>,
) -> Result<(), SerializeError> {
    match value {
        Value::Nil => out.push_str("nil"),
        Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Integer(i) => out.push_str(&i.to_string()),
        Value::Number(n) => out.push_str(&format_number(*n)),
        Value::String(s) => write_string(out, &s.as_bytes()),
        Value::Table(t) => write_table(out, t, depth, visited),
        other => Err(SerializeError::UnsupportedType(other.type_name())),
    }
}

fn write_string(out: &mut Output, s: &[u8]) -> Result<(), SerializeError> {
    out.push('"')?;
    for &c in s {
        match c {
            b'\\' => out.push_str("\\\\")?,
            b'"' => out.push_str("\\\"")?,
            b'\n' => out.push_str("\\n")?,
            b'\r' => out.push_str("\\r")?,
            b'\t' => out.push_str("\\t")?,
            0x08 => out.push_str("\\b")?,
            0x0C => out.push_str("\\f")?,
            c if c < 0x20 || c >= 0x7F => out.push_str(&format!("\\x{:02X}", c))?,
            c => out.push(c as char)?,
        }
    }
    out.push('"')
}

fn write_table(
    out: &mut Output,
    table: &Table,
    depth: usize,
    visited: &mut HashSet<*const c_void>,
) -> Result<(), SerializeError> {
    if depth > MAX_DEPTH {
        return Err(SerializeError::TooDeep);
    }
    if !visited.insert(table.to_pointer()) {
        return Err(SerializeError::Cycle);
    }

    out.push('{')?;

    let array_len = table.raw_len();
    let mut has_items = false;

    for i in 1..=array_len {
        if has_items {
            out.push(',')?;
        }
        let item: Value = table.raw_get(i)?;
        write_value(out, &item, depth + 1, visited)?;
        has_items = true;
    }

    for pair in table.pairs::<Value, Value>() {
        let (key, item) = pair?;

        if let Value::Integer(k) = key {
            if k >= 1 && (k as u64) <= array_len as u64 {
                continue;
            }
        }

        if matches!(
            key,
            Value::Table(_)
                | Value::Function(_)
                | Value::Thread(_)
                | Value::UserData(_)
                | Value::LightUserData(_)
        ) {
            return Err(SerializeError::UnsupportedKey(key.type_name()));
        }

        if has_items {
            out.push(',')?;
        }

        match &key {
            Value::String(s) if is_identifier(&s.as_bytes()) => {
                out.push_str(&String::from_utf8_lossy(&s.as_bytes()))?;
                out.push('=')?;
            }
            _ => {
                out.push('[')?;
                write_value(out, &key, depth + 1, visited)?;
                out.push_str("]=")?;
            }
        }

        write_value(out, &item, depth + 1, visited)?;
        has_items = true;
    }

    out.push('}')
}

// =============================================================================
// Numbers
// =============================================================================

/// Format a float the way Lua 5.4's `tostring` does (`%.14g`, plus `.0`
/// when the result would read back as an integer).
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return if n.is_sign_negative() { "-nan" } else { "nan" }.to_string();
    }
    if n.is_infinite() {
        return if n < 0.0 { "-inf" } else { "inf" }.to_string();
    }

    let mut s = format_g14(n);
    if s.bytes().all(|c| c == b'-' || c.is_ascii_digit()) {
        s.push_str(".0");
    }
    s
}

/// C's `%.14g` for finite values
fn format_g14(n: f64) -> String {
    const PRECISION: i32 = 14;

    if n == 0.0 {
        return if n.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // The exponent after rounding to 14 significant digits decides the style.
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, n);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m.to_string(), e.parse::<i32>().unwrap_or(0)),
        None => (sci.clone(), 0),
    };

    if exp < -4 || exp >= PRECISION {
        let mantissa = strip_fraction_zeros(&mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    } else {
        let decimals = (PRECISION - 1 - exp) as usize;
        strip_fraction_zeros(&format!("{:.*}", decimals, n))
    }
}

fn strip_fraction_zeros(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}
