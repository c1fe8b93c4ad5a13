//! Stored values, generated keys, and their textual renderings.
//!
//! Values are written to the backend in the usual key-value store wire form:
//! text as UTF-8, blobs verbatim, numbers as decimal text. Instrumented
//! arguments are rendered as a tuple literal (`('Hello',)`, `(98,)`,
//! `(b'bytes',)`) so recorded history reads the same way the call was made.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A scalar value accepted by [`crate::Cache::store`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StoredValue {
    Text(String),
    Bytes(Vec<u8>),
    Integer(i64),
    Float(f64),
}

impl StoredValue {
    /// Backend wire form of the value.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            StoredValue::Text(s) => s.as_bytes().to_vec(),
            StoredValue::Bytes(b) => b.clone(),
            StoredValue::Integer(i) => i.to_string().into_bytes(),
            StoredValue::Float(f) => float_repr(*f).into_bytes(),
        }
    }

    /// Literal rendering of the value, as it appears in recorded inputs.
    pub fn repr(&self) -> String {
        match self {
            StoredValue::Text(s) => text_repr(s),
            StoredValue::Bytes(b) => bytes_repr(b),
            StoredValue::Integer(i) => i.to_string(),
            StoredValue::Float(f) => float_repr(*f),
        }
    }

    /// Name of the scalar kind, used in log output.
    pub fn kind(&self) -> &'static str {
        match self {
            StoredValue::Text(_) => "text",
            StoredValue::Bytes(_) => "bytes",
            StoredValue::Integer(_) => "integer",
            StoredValue::Float(_) => "float",
        }
    }
}

impl From<String> for StoredValue {
    fn from(value: String) -> Self {
        StoredValue::Text(value)
    }
}

impl From<&str> for StoredValue {
    fn from(value: &str) -> Self {
        StoredValue::Text(value.to_string())
    }
}

impl From<Vec<u8>> for StoredValue {
    fn from(value: Vec<u8>) -> Self {
        StoredValue::Bytes(value)
    }
}

impl From<&[u8]> for StoredValue {
    fn from(value: &[u8]) -> Self {
        StoredValue::Bytes(value.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for StoredValue {
    fn from(value: &[u8; N]) -> Self {
        StoredValue::Bytes(value.to_vec())
    }
}

impl From<i64> for StoredValue {
    fn from(value: i64) -> Self {
        StoredValue::Integer(value)
    }
}

impl From<i32> for StoredValue {
    fn from(value: i32) -> Self {
        StoredValue::Integer(value.into())
    }
}

impl From<f64> for StoredValue {
    fn from(value: f64) -> Self {
        StoredValue::Float(value)
    }
}

/// A freshly minted storage key (random v4 UUID, hyphenated).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    /// Mint a new key. Never derived from the value being stored.
    pub fn generate() -> Self {
        Key(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.0
    }
}

/// Argument tuple of an instrumented call, receiver excluded.
pub trait CallArgs {
    /// Tuple literal of the arguments, e.g. `('Hello',)`.
    fn render_args(&self) -> String;
}

/// Result of an instrumented call, as recorded in the outputs list.
pub trait CallOutput {
    fn to_record(&self) -> Vec<u8>;
}

impl CallArgs for StoredValue {
    fn render_args(&self) -> String {
        format!("({},)", self.repr())
    }
}

impl CallArgs for () {
    fn render_args(&self) -> String {
        "()".to_string()
    }
}

impl CallOutput for Key {
    fn to_record(&self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }
}

impl CallOutput for StoredValue {
    fn to_record(&self) -> Vec<u8> {
        self.encode()
    }
}

impl CallOutput for String {
    fn to_record(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl CallOutput for i64 {
    fn to_record(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

/// Quote character for a literal: single quotes unless the content has a
/// single quote and no double quote.
fn pick_quote(has_single: bool, has_double: bool) -> char {
    if has_single && !has_double {
        '"'
    } else {
        '\''
    }
}

fn text_repr(s: &str) -> String {
    let quote = pick_quote(s.contains('\''), s.contains('"'));
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let code = c as u32;
                if code < 0x100 {
                    out.push_str(&format!("\\x{:02x}", code));
                } else {
                    out.push_str(&format!("\\u{:04x}", code));
                }
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn bytes_repr(b: &[u8]) -> String {
    let quote = pick_quote(b.contains(&b'\''), b.contains(&b'"'));
    let mut out = String::with_capacity(b.len() + 3);
    out.push('b');
    out.push(quote);
    for &byte in b {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            byte if byte as char == quote => {
                out.push('\\');
                out.push(quote);
            }
            0x20..=0x7e => out.push(byte as char),
            byte => out.push_str(&format!("\\x{:02x}", byte)),
        }
    }
    out.push(quote);
    out
}

/// Shortest round-trip decimal form; exponent written as `e+NN` / `e-NN`.
fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let debug = format!("{:?}", f);
    match debug.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => debug,
    }
}
