//! Reusable per-column pack buffers.

/// One growable byte buffer per column, reused across flushes.
///
/// Buffers are cleared, not freed, between flushes so steady-state inserts
/// stop allocating once the largest batch has been seen.
#[derive(Debug, Default)]
pub struct BufferPool {
    buffers: Vec<Vec<u8>>,
}

impl BufferPool {
    /// Create a pool with one empty buffer per column.
    pub fn new(columns: usize) -> Self {
        Self {
            buffers: vec![Vec::new(); columns],
        }
    }

    /// Number of column buffers.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether the pool has no buffers.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Clear every buffer, keeping capacity, and hand them out for packing.
    pub fn checkout(&mut self) -> &mut [Vec<u8>] {
        for buf in &mut self.buffers {
            buf.clear();
        }
        &mut self.buffers
    }

    /// Packed buffers in column order.
    pub fn buffers(&self) -> &[Vec<u8>] {
        &self.buffers
    }

    /// Total packed bytes across columns.
    pub fn packed_len(&self) -> usize {
        self.buffers.iter().map(Vec::len).sum()
    }

    /// Bytes reserved across columns.
    pub fn capacity(&self) -> usize {
        self.buffers.iter().map(Vec::capacity).sum()
    }
}
