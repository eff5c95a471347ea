//! Message trait and write helpers for SQream frame serialization.
//!
//! Every frame the client sends implements `Message`, which reports its
//! payload size up front so the frame header and payload go out in a single
//! allocation.

use crate::error::Result;
use crate::protocol::constants::*;

// ============================================================================
// Core Trait
// ============================================================================

/// A client message that can calculate its wire size and serialize to bytes.
pub trait Message {
    /// Frame kind byte (`FRAME_KIND_TEXT` or `FRAME_KIND_BINARY`).
    fn frame_kind(&self) -> u8;

    /// Payload size in bytes (excluding the frame header).
    fn wire_size(&self) -> usize;

    /// Write the payload to `buf`.
    fn write_to(&self, buf: &mut Vec<u8>) -> Result<()>;
}

/// A JSON command sent as a text frame.
///
/// The JSON is rendered once at construction so `wire_size` is exact.
#[derive(Debug, Clone)]
pub struct TextMessage {
    json: String,
}

impl TextMessage {
    /// Serialize a command.
    pub fn new<T: serde::Serialize>(command: &T) -> Result<Self> {
        Ok(Self {
            json: serde_json::to_string(command)?,
        })
    }

    /// The rendered JSON.
    pub fn as_str(&self) -> &str {
        &self.json
    }
}

impl Message for TextMessage {
    fn frame_kind(&self) -> u8 {
        FRAME_KIND_TEXT
    }

    fn wire_size(&self) -> usize {
        self.json.len()
    }

    fn write_to(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.write_bytes(self.json.as_bytes());
        Ok(())
    }
}

// ============================================================================
// Write Helpers
// ============================================================================

/// Extension trait for writing little-endian SQream data to `Vec<u8>`.
pub trait WriteExt {
    /// Write a single byte.
    fn write_u8(&mut self, val: u8);

    /// Write a little-endian i32.
    fn write_i32_le(&mut self, val: i32);

    /// Write a little-endian i64.
    fn write_i64_le(&mut self, val: i64);

    /// Write raw bytes.
    fn write_bytes(&mut self, bytes: &[u8]);

    /// Write `count` copies of `byte`.
    fn write_repeated(&mut self, byte: u8, count: usize);

    /// Overwrite four bytes at `pos` with a little-endian i32.
    fn set_i32_le(&mut self, pos: usize, val: i32);
}

impl WriteExt for Vec<u8> {
    #[inline]
    fn write_u8(&mut self, val: u8) {
        self.push(val);
    }

    #[inline]
    fn write_i32_le(&mut self, val: i32) {
        self.extend_from_slice(&val.to_le_bytes());
    }

    #[inline]
    fn write_i64_le(&mut self, val: i64) {
        self.extend_from_slice(&val.to_le_bytes());
    }

    #[inline]
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }

    #[inline]
    fn write_repeated(&mut self, byte: u8, count: usize) {
        self.resize(self.len() + count, byte);
    }

    #[inline]
    fn set_i32_le(&mut self, pos: usize, val: i32) {
        self[pos..pos + 4].copy_from_slice(&val.to_le_bytes());
    }
}

// ============================================================================
// Frame Header
// ============================================================================

/// Write the 10-byte SQream frame header.
///
/// Layout: protocol version (1 byte), frame kind (1 byte), payload length
/// (8 bytes, little-endian).
pub fn write_frame_header(buf: &mut Vec<u8>, frame_kind: u8, payload_len: usize) {
    buf.write_u8(PROTOCOL_VERSION);
    buf.write_u8(frame_kind);
    buf.write_i64_le(payload_len as i64);
}

// ============================================================================
// Tests
// ============================================================================
