//! Insert commands: the `put` announcement and its binary payload.

use serde::Serialize;

use crate::error::Result;
use crate::protocol::constants::FRAME_KIND_BINARY;
use crate::protocol::message::{Message, WriteExt};

/// Announce a flush of `put` rows. The server does not answer.
#[derive(Debug, Serialize)]
pub struct Put {
    pub put: usize,
}

/// Packed column buffers sent as one binary frame, in column order.
pub struct PutPayload<'a> {
    buffers: &'a [Vec<u8>],
}

impl<'a> PutPayload<'a> {
    /// Wrap packed columns.
    pub fn new(buffers: &'a [Vec<u8>]) -> Self {
        Self { buffers }
    }
}

impl Message for PutPayload<'_> {
    fn frame_kind(&self) -> u8 {
        FRAME_KIND_BINARY
    }

    fn wire_size(&self) -> usize {
        self.buffers.iter().map(Vec::len).sum()
    }

    fn write_to(&self, buf: &mut Vec<u8>) -> Result<()> {
        for column in self.buffers {
            buf.write_bytes(column);
        }
        Ok(())
    }
}
