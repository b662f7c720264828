// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Pure value and row encoders for both dump formats.
//!
//! * SQL mode renders values as `INSERT` tuple members: `NULL`, bare numerics,
//!   and double-quoted, backslash-escaped text.
//! * Bulk-columnar mode renders tab-separated fields: `\N` for NULL, bare
//!   numerics and temporals, and escaped text with tabs/newlines removed,
//!   truncated to [`MAX_COLUMNAR_TEXT_CHARS`] characters.

use crate::domain::entities::{Mode, SqlValue};

/// Upper bound, in characters, of a text field in bulk-columnar output.
pub const MAX_COLUMNAR_TEXT_CHARS: usize = 512;

/// Appends `raw` to `out` with MySQL string-literal escaping.
pub fn escape_bytes(raw: &[u8], out: &mut Vec<u8>) {
    for &b in raw {
        match b {
            0 => out.extend_from_slice(b"\\0"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\'' => out.extend_from_slice(b"\\'"),
            b'"' => out.extend_from_slice(b"\\\""),
            0x1a => out.extend_from_slice(b"\\Z"),
            _ => out.push(b),
        }
    }
}

/// Returns the longest prefix of `s` holding at most `max_chars` characters.
///
/// The cut always lands on a character boundary.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Encodes one value as a member of an SQL `VALUES` tuple.
pub fn encode_sql_value(value: &SqlValue, out: &mut Vec<u8>) {
    match value {
        SqlValue::Null => out.extend_from_slice(b"NULL"),
        SqlValue::Signed(s)
        | SqlValue::Unsigned(s)
        | SqlValue::Float(s)
        | SqlValue::Decimal(s) => out.extend_from_slice(s.as_bytes()),
        SqlValue::Temporal(s) => quote(s.as_bytes(), out),
        SqlValue::Bytes(b) if std::str::from_utf8(b).is_ok() => quote(b, out),
        SqlValue::Bytes(b) => hex_literal(b, out),
    }
}

/// Binary values become `X'..'` so part files stay valid UTF-8.
fn hex_literal(raw: &[u8], out: &mut Vec<u8>) {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    out.reserve(raw.len() * 2 + 3);
    out.extend_from_slice(b"X'");
    for &b in raw {
        out.push(HEX[(b >> 4) as usize]);
        out.push(HEX[(b & 0x0f) as usize]);
    }
    out.push(b'\'');
}

fn quote(raw: &[u8], out: &mut Vec<u8>) {
    out.push(b'"');
    escape_bytes(raw, out);
    out.push(b'"');
}

/// Encodes one value as a bulk-columnar field.
///
/// Text is passed through byte for byte. Only a value long enough to need
/// the character cut goes through a lossy UTF-8 view.
pub fn encode_columnar_value(value: &SqlValue, out: &mut Vec<u8>) {
    match value {
        SqlValue::Null => out.extend_from_slice(b"\\N"),
        SqlValue::Signed(s)
        | SqlValue::Unsigned(s)
        | SqlValue::Float(s)
        | SqlValue::Decimal(s)
        | SqlValue::Temporal(s) => out.extend_from_slice(s.as_bytes()),
        SqlValue::Bytes(b) => {
            let mut escaped = Vec::with_capacity(b.len() + 8);
            escape_bytes(b, &mut escaped);
            escaped.retain(|&c| c != b'\t' && c != b'\n');
            if escaped.len() <= MAX_COLUMNAR_TEXT_CHARS {
                out.extend_from_slice(&escaped);
            } else {
                let text = String::from_utf8_lossy(&escaped);
                out.extend_from_slice(truncate_chars(&text, MAX_COLUMNAR_TEXT_CHARS).as_bytes());
            }
        }
    }
}

/// Encodes a whole row for the given mode.
///
/// SQL rows become `(v1,v2,...)`; columnar rows become `v1\tv2\t...`.
pub fn encode_row(mode: Mode, values: &[SqlValue]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 8 + 2);
    match mode {
        Mode::PlainSql => {
            out.push(b'(');
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                encode_sql_value(v, &mut out);
            }
            out.push(b')');
        }
        Mode::BulkColumnar => {
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    out.push(b'\t');
                }
                encode_columnar_value(v, &mut out);
            }
        }
    }
    out
}
