//! VARCHAR and TEXT string codecs.
//!
//! TEXT is always UTF-8. VARCHAR uses the encoding the server announces in
//! the connect response and is space padded to the column width.

use std::fmt;

use tracing::warn;

use crate::protocol::constants::DEFAULT_VARCHAR_ENCODING;

/// Character encoding for VARCHAR columns, negotiated per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VarcharEncoding {
    /// 7-bit ASCII.
    #[default]
    Ascii,
    /// ISO-8859-1, one byte per char up to U+00FF.
    Latin1,
    /// UTF-8.
    Utf8,
}

impl VarcharEncoding {
    /// Resolve the label the server sends as `varcharEncoding`.
    ///
    /// Unknown labels fall back to ASCII, which every server supports.
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_ascii_lowercase().replace(['-', '_'], "");
        match normalized.as_str() {
            "ascii" | "usascii" => VarcharEncoding::Ascii,
            "latin1" | "iso88591" => VarcharEncoding::Latin1,
            "utf8" => VarcharEncoding::Utf8,
            _ => {
                warn!(label, fallback = DEFAULT_VARCHAR_ENCODING, "unknown varchar encoding");
                VarcharEncoding::Ascii
            }
        }
    }

    /// Append `s` in this encoding, failing on the first char it cannot represent.
    pub fn encode_into(&self, s: &str, out: &mut Vec<u8>) -> Result<(), String> {
        match self {
            VarcharEncoding::Utf8 => {
                out.extend_from_slice(s.as_bytes());
                Ok(())
            }
            VarcharEncoding::Ascii => encode_single_byte(s, 0x7F, "ascii", out),
            VarcharEncoding::Latin1 => encode_single_byte(s, 0xFF, "latin1", out),
        }
    }

    /// Decode bytes, dropping anything that is not valid in this encoding.
    pub fn decode_lossy(&self, bytes: &[u8]) -> String {
        match self {
            VarcharEncoding::Ascii => bytes
                .iter()
                .filter(|b| b.is_ascii())
                .map(|&b| b as char)
                .collect(),
            VarcharEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
            VarcharEncoding::Utf8 => bytes.utf8_chunks().map(|chunk| chunk.valid()).collect(),
        }
    }
}

fn encode_single_byte(s: &str, max: u32, name: &str, out: &mut Vec<u8>) -> Result<(), String> {
    for ch in s.chars() {
        let code = ch as u32;
        if code > max {
            return Err(format!("character {:?} is not representable in {}", ch, name));
        }
        out.push(code as u8);
    }
    Ok(())
}

impl fmt::Display for VarcharEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VarcharEncoding::Ascii => "ascii",
            VarcharEncoding::Latin1 => "latin1",
            VarcharEncoding::Utf8 => "utf-8",
        })
    }
}

/// Trailing NUL and space padding stripped from a VARCHAR slot.
pub fn strip_padding(slot: &[u8]) -> &[u8] {
    let end = slot
        .iter()
        .rposition(|&b| b != 0 && b != b' ')
        .map_or(0, |pos| pos + 1);
    &slot[..end]
}

/// Decode a TEXT value. Invalid UTF-8 is an error.
pub fn decode_text(bytes: &[u8]) -> Result<String, String> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| format!("invalid UTF-8 in text value: {}", e))
}
