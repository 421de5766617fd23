//! percent.rs
//!
//! URI component escaping used by invite links.
//!
//! Mirrors the browser `encodeURIComponent` / `decodeURIComponent` pair so links
//! produced here open in other clients and the other way round.

use crate::error::{Result, TallyError};

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')')
}

/// Escapes every byte outside the unreserved set as `%XX`.
pub fn encode_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for &b in input.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push_str(&hex::encode_upper([b]));
        }
    }
    out
}

/// Reverses [`encode_component`]. Fails on truncated or non-hex escapes and on
/// escapes that do not form valid UTF-8.
pub fn decode_component(input: &str) -> Result<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes
                .get(i + 1..i + 3)
                .ok_or_else(|| TallyError::Parse(format!("truncated escape at offset {i}")))?;
            let decoded = hex::decode(escape)
                .map_err(|e| TallyError::Parse(format!("bad escape at offset {i}: {e}")))?;
            out.extend_from_slice(&decoded);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|e| TallyError::Parse(format!("escaped bytes are not utf-8: {e}")))
}
