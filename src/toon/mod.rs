//! TOON: a compact, indentation-based rendering of JSON values.
//!
//! Tool results that are large objects or arrays are rewritten as TOON
//! before they are placed in history. The transform is lossless:
//! `decode(&encode(v)) == v` for every JSON value.
//!
//! ```text
//! order:
//!   id: 17
//!   tags[2]: new,priority
//!   lines[2]{sku,qty}:
//!     A-1,2
//!     B-7,1
//! ```

mod decode;
mod encode;

pub use decode::decode;
pub use encode::encode;

use thiserror::Error;

/// Errors raised while decoding a TOON document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToonError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: expected {expected} entries, found {found}")]
    LengthMismatch {
        line: usize,
        expected: usize,
        found: usize,
    },
}

impl ToonError {
    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }
}

/// Encode `value` if it is a structured value whose JSON text is at least
/// `min_chars` long and the TOON text is shorter than that JSON.
/// Returns `None` for primitives, small values and deeply nested shapes
/// where indentation costs more than it saves.
pub fn compact(value: &serde_json::Value, min_chars: usize) -> Option<String> {
    if !(value.is_object() || value.is_array()) {
        return None;
    }
    let json_len = serde_json::to_string(value).ok()?.len();
    if json_len < min_chars {
        return None;
    }
    let encoded = encode(value);
    if encoded.len() >= json_len {
        tracing::trace!(json_len, toon_len = encoded.len(), "toon not shorter; keeping json");
        return None;
    }
    match decode(&encoded) {
        Ok(decoded) if decoded == *value => Some(encoded),
        _ => {
            tracing::warn!("toon encoding did not round-trip; keeping json");
            None
        }
    }
}

const RESERVED: [char; 9] = [':', ',', '"', '\\', '[', ']', '{', '}', '#'];

fn is_literal_like(text: &str) -> bool {
    matches!(text, "true" | "false" | "null")
        || serde_json::from_str::<serde_json::Number>(text).is_ok()
}

fn needs_quotes(text: &str) -> bool {
    text.is_empty()
        || text.trim() != text
        || text.starts_with('-')
        || is_literal_like(text)
        || text
            .chars()
            .any(|c| RESERVED.contains(&c) || c.is_control())
}

fn is_bare_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}
