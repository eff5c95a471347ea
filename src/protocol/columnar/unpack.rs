//! Fetch batch decoder.
//!
//! A fetch response lists region sizes (`colSzs`); the binary frame that
//! follows holds the regions back to back. Each column owns
//! `[nulls if nullable][lengths if Text][data]`, in column order.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::protocol::buffer::ReadBuffer;
use crate::protocol::codec::VarcharEncoding;
use crate::protocol::constants::NULL_MARKER;
use crate::protocol::types::{ColumnInfo, ColumnMetadata, Row, SqreamValue};

use super::codec::ColumnCodec;

/// Raw regions of one column in one fetch batch.
#[derive(Debug, Clone)]
pub struct RawColumnBuffers {
    pub nulls: Option<Bytes>,
    pub lengths: Option<Bytes>,
    pub data: Bytes,
}

/// Split a fetch payload into per-column regions, checking every size.
pub fn split_regions(
    columns: &[ColumnMetadata],
    region_sizes: &[usize],
    raw: Bytes,
    row_count: usize,
) -> Result<Vec<RawColumnBuffers>> {
    let expected_regions: usize = columns.iter().map(ColumnMetadata::region_count).sum();
    if region_sizes.len() != expected_regions {
        return Err(Error::protocol(format!(
            "Fetch declared {} regions, statement has {}",
            region_sizes.len(),
            expected_regions
        )));
    }
    let declared: usize = region_sizes.iter().sum();
    if declared != raw.len() {
        return Err(Error::RegionSizeMismatch {
            declared,
            received: raw.len(),
        });
    }

    let mut buf = ReadBuffer::new(raw);
    let mut sizes = region_sizes.iter().copied();
    let mut next_size = || sizes.next().unwrap_or_default();
    let mut regions = Vec::with_capacity(columns.len());

    for (index, column) in columns.iter().enumerate() {
        let nulls = if column.nullable {
            let size = next_size();
            check_region(index, "null", size, row_count)?;
            Some(buf.read_bytes(size)?)
        } else {
            None
        };
        let lengths = if column.is_variable_length {
            let size = next_size();
            check_region(index, "length", size, 4 * row_count)?;
            Some(buf.read_bytes(size)?)
        } else {
            None
        };
        let size = next_size();
        if !column.is_variable_length {
            check_region(index, "data", size, column.fixed_width as usize * row_count)?;
        }
        let data = buf.read_bytes(size)?;
        regions.push(RawColumnBuffers {
            nulls,
            lengths,
            data,
        });
    }
    Ok(regions)
}

fn check_region(column: usize, kind: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(Error::protocol(format!(
            "Column {} {} region is {} bytes, expected {}",
            column, kind, actual, expected
        )));
    }
    Ok(())
}

/// Decode one column's regions into values.
///
/// Rows flagged in the null region become `Null` without their slot being
/// decoded; the slot content of a null row is not meaningful.
pub fn decode_column(
    index: usize,
    column: &ColumnMetadata,
    codec: &ColumnCodec,
    raw: &RawColumnBuffers,
    row_count: usize,
    encoding: VarcharEncoding,
) -> Result<Vec<SqreamValue>> {
    let is_null = |row: usize| {
        raw.nulls
            .as_ref()
            .and_then(|nulls| nulls.get(row))
            .is_some_and(|&marker| marker == NULL_MARKER)
    };
    let decode_slot = |row: usize, slot: &[u8]| -> Result<SqreamValue> {
        if is_null(row) {
            return Ok(SqreamValue::Null);
        }
        codec
            .decode(slot, column, encoding)
            .map_err(|message| Error::Decode {
                column: index,
                row,
                message,
            })
    };

    let mut values = Vec::with_capacity(row_count);
    match &raw.lengths {
        Some(lengths) => {
            let mut offset = 0usize;
            for (row, chunk) in lengths.chunks_exact(4).enumerate() {
                let len = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                let len = usize::try_from(len).map_err(|_| {
                    Error::protocol(format!("Column {} row {} has length {}", index, row, len))
                })?;
                let end = offset + len;
                if end > raw.data.len() {
                    return Err(Error::protocol(format!(
                        "Column {} lengths exceed its {}-byte data region",
                        index,
                        raw.data.len()
                    )));
                }
                values.push(decode_slot(row, &raw.data[offset..end])?);
                offset = end;
            }
            if offset != raw.data.len() {
                return Err(Error::protocol(format!(
                    "Column {} lengths sum to {} bytes, data region is {}",
                    index,
                    offset,
                    raw.data.len()
                )));
            }
        }
        None => {
            let width = column.fixed_width as usize;
            if width == 0 {
                return Err(Error::protocol(format!("Column {} has zero width", index)));
            }
            for (row, slot) in raw.data.chunks_exact(width).enumerate() {
                values.push(decode_slot(row, slot)?);
            }
        }
    }
    Ok(values)
}

/// Decode a fetch batch into column-major values.
///
/// Any size inconsistency fails the whole batch; nothing is partially decoded.
pub fn decode_columns(
    columns: &[ColumnMetadata],
    codecs: &[ColumnCodec],
    region_sizes: &[usize],
    raw: Bytes,
    row_count: usize,
    encoding: VarcharEncoding,
) -> Result<Vec<Vec<SqreamValue>>> {
    let regions = split_regions(columns, region_sizes, raw, row_count)?;
    columns
        .iter()
        .zip(codecs)
        .zip(&regions)
        .enumerate()
        .map(|(index, ((column, codec), raw))| {
            decode_column(index, column, codec, raw, row_count, encoding)
        })
        .collect()
}

/// Transpose column-major values into rows sharing one `ColumnInfo`.
pub fn into_rows(columns: Vec<Vec<SqreamValue>>, column_info: Arc<ColumnInfo>) -> Vec<Row> {
    let row_count = columns.first().map_or(0, Vec::len);
    let mut iters: Vec<_> = columns.into_iter().map(Vec::into_iter).collect();
    (0..row_count)
        .map(|_| {
            let values = iters.iter_mut().filter_map(Iterator::next).collect();
            Row::new(values, Arc::clone(&column_info))
        })
        .collect()
}
