//! Column buffer packer for `put`.
//!
//! Packed layout of one column for `n` rows:
//! ```text
//! [null bitmap: n bytes, nullable only]
//! [lengths: n x i32 LE, Text only]
//! [data: fixed-width slots, or concatenated UTF-8 for Text]
//! ```
//! The bitmap and length regions are reserved first and patched in place
//! while the data region is appended, so every value is visited once.

use rayon::prelude::*;
use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::codec::VarcharEncoding;
use crate::protocol::constants::{NULL_MARKER, PRESENT_MARKER};
use crate::protocol::message::WriteExt;
use crate::protocol::types::{ColumnMetadata, SqreamValue};

use super::codec::ColumnCodec;
use super::pool::BufferPool;

/// Pack one column of a batch into `out`.
///
/// `first_row` is the index of the first value within the caller's rows and
/// is only used to report errors.
pub fn pack_column<'a, I>(
    values: I,
    first_row: usize,
    column_index: usize,
    column: &ColumnMetadata,
    codec: &ColumnCodec,
    encoding: VarcharEncoding,
    out: &mut Vec<u8>,
) -> Result<()>
where
    I: ExactSizeIterator<Item = &'a SqreamValue>,
{
    let row_count = values.len();
    let fail = |row: usize, message: String| {
        Error::encoding(column_index, first_row + row, column.type_label(), message)
    };

    out.reserve(row_count * column.fixed_row_bytes());
    let nulls_at = out.len();
    if column.nullable {
        out.write_repeated(PRESENT_MARKER, row_count);
    }
    let lengths_at = out.len();
    if column.is_variable_length {
        out.write_repeated(0, 4 * row_count);
    }

    let placeholder = column.sqream_type.placeholder(column.fixed_width);
    for (row, value) in values.enumerate() {
        let data_start = out.len();
        let value = if value.is_null() {
            if !column.nullable {
                return Err(fail(row, "NULL in a non-nullable column".to_string()));
            }
            out[nulls_at + row] = NULL_MARKER;
            &placeholder
        } else {
            value
        };
        codec
            .encode(value, column, encoding, out)
            .map_err(|message| fail(row, message))?;

        if column.is_variable_length {
            let len = out.len() - data_start;
            let len = i32::try_from(len)
                .map_err(|_| fail(row, format!("value of {} bytes is too long", len)))?;
            out.set_i32_le(lengths_at + 4 * row, len);
        }
    }
    Ok(())
}

/// Check that every row has the statement's arity and every value encodes.
///
/// Runs before any `put` is sent so a failing insert leaves the table untouched.
pub fn validate_rows(
    rows: &[Vec<SqreamValue>],
    columns: &[ColumnMetadata],
    codecs: &[ColumnCodec],
    encoding: VarcharEncoding,
) -> Result<()> {
    if let Some((row, values)) = rows
        .iter()
        .enumerate()
        .find(|(_, values)| values.len() != columns.len())
    {
        return Err(Error::encoding(
            values.len().min(columns.len()),
            row,
            format!("row of {} columns", columns.len()),
            format!("row has {} values", values.len()),
        ));
    }

    columns
        .par_iter()
        .zip(codecs.par_iter())
        .enumerate()
        .try_for_each(|(index, (column, codec))| {
            let mut scratch = Vec::new();
            for (row, values) in rows.iter().enumerate() {
                let value = &values[index];
                if value.is_null() {
                    if !column.nullable {
                        return Err(Error::encoding(
                            index,
                            row,
                            column.type_label(),
                            "NULL in a non-nullable column",
                        ));
                    }
                    continue;
                }
                scratch.clear();
                codec
                    .encode(value, column, encoding, &mut scratch)
                    .map_err(|message| Error::encoding(index, row, column.type_label(), message))?;
            }
            Ok(())
        })
}

/// Pack a batch of rows into the pool, one buffer per column.
///
/// With `parallel` set, columns are packed on the rayon pool and joined
/// before returning.
pub fn pack_batch(
    rows: &[Vec<SqreamValue>],
    first_row: usize,
    columns: &[ColumnMetadata],
    codecs: &[ColumnCodec],
    encoding: VarcharEncoding,
    pool: &mut BufferPool,
    parallel: bool,
) -> Result<()> {
    let buffers = pool.checkout();
    let pack_one = |index: usize, out: &mut Vec<u8>| {
        pack_column(
            rows.iter().map(|values| &values[index]),
            first_row,
            index,
            &columns[index],
            &codecs[index],
            encoding,
            out,
        )
    };

    if parallel {
        buffers
            .par_iter_mut()
            .enumerate()
            .try_for_each(|(index, out)| pack_one(index, out))?;
    } else {
        for (index, out) in buffers.iter_mut().enumerate() {
            pack_one(index, out)?;
        }
    }

    trace!(rows = rows.len(), first_row, bytes = pool.packed_len(), "packed batch");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::SqreamType;
    use chrono::NaiveDate;

    fn pack(column: &ColumnMetadata, values: &[SqreamValue]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        pack_column(
            values.iter(),
            0,
            0,
            column,
            &ColumnCodec::for_type(column.sqream_type),
            VarcharEncoding::Ascii,
            &mut out,
        )?;
        Ok(out)
    }

    #[test]
    fn test_pack_nullable_int() {
        let column = ColumnMetadata::new("i", SqreamType::Int, true);
        let out = pack(&column, &[5i32.into(), SqreamValue::Null, (-7i32).into()]).unwrap();

        let mut expected = vec![0, 1, 0];
        expected.extend_from_slice(&5i32.to_le_bytes());
        expected.extend_from_slice(&0i32.to_le_bytes());
        expected.extend_from_slice(&(-7i32).to_le_bytes());
        assert_eq!(out, expected);
    }

    #[test]
    fn test_pack_text_lengths() {
        let column = ColumnMetadata::new("t", SqreamType::Text, true);
        let out = pack(&column, &["".into(), "hello".into(), SqreamValue::Null]).unwrap();

        assert_eq!(&out[..3], &[0, 0, 1]);
        let lengths: Vec<i32> = out[3..15]
            .chunks(4)
            .map(|c| i32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(lengths, vec![0, 5, 0]);
        assert_eq!(&out[15..], b"hello");
    }

    #[test]
    fn test_pack_varchar_null_placeholder() {
        let column = ColumnMetadata::varchar("v", 3, true);
        let out = pack(&column, &[SqreamValue::Null, "ab".into()]).unwrap();
        assert_eq!(out, b"\x01\x00   ab ");
    }

    #[test]
    fn test_pack_date_placeholder() {
        let column = ColumnMetadata::new("d", SqreamType::Date, true);
        let out = pack(&column, &[SqreamValue::Null]).unwrap();
        let day = i32::from_le_bytes(out[1..5].try_into().unwrap());
        let placeholder = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap();
        assert_eq!(day, crate::protocol::codec::encode_date(placeholder));
    }

    #[test]
    fn test_pack_errors_name_column_and_row() {
        let column = ColumnMetadata::new("t", SqreamType::TinyInt, false);
        let mut out = Vec::new();
        let err = pack_column(
            [SqreamValue::Int(1), SqreamValue::Int(300)].iter(),
            10,
            2,
            &column,
            &ColumnCodec::for_type(SqreamType::TinyInt),
            VarcharEncoding::Ascii,
            &mut out,
        )
        .unwrap_err();
        match err {
            Error::Encoding {
                column, row, declared, ..
            } => {
                assert_eq!(column, 2);
                assert_eq!(row, 11);
                assert_eq!(declared, "TINYINT");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = pack(&column, &[SqreamValue::Null]).unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }));
    }

    #[test]
    fn test_validate_rows() {
        let columns = vec![
            ColumnMetadata::new("a", SqreamType::Int, false),
            ColumnMetadata::varchar("b", 2, true),
        ];
        let codecs = ColumnCodec::for_columns(&columns);
        let ok = vec![vec![1i32.into(), "ab".into()], vec![2i32.into(), SqreamValue::Null]];
        assert!(validate_rows(&ok, &columns, &codecs, VarcharEncoding::Ascii).is_ok());

        let short = vec![vec![SqreamValue::Int(1)]];
        assert!(matches!(
            validate_rows(&short, &columns, &codecs, VarcharEncoding::Ascii),
            Err(Error::Encoding { row: 0, .. })
        ));

        let wide = vec![vec![1i32.into(), "ab".into()], vec![2i32.into(), "abc".into()]];
        assert!(matches!(
            validate_rows(&wide, &columns, &codecs, VarcharEncoding::Ascii),
            Err(Error::Encoding { column: 1, row: 1, .. })
        ));
    }

    #[test]
    fn test_pack_batch_parallel_matches_sequential() {
        let columns = vec![
            ColumnMetadata::new("a", SqreamType::BigInt, true),
            ColumnMetadata::new("b", SqreamType::Text, false),
        ];
        let codecs = ColumnCodec::for_columns(&columns);
        let rows: Vec<Vec<SqreamValue>> = (0..100i64)
            .map(|i| {
                let a = if i % 3 == 0 { SqreamValue::Null } else { i.into() };
                vec![a, format!("r{i}").into()]
            })
            .collect();

        let mut seq = BufferPool::new(2);
        pack_batch(&rows, 0, &columns, &codecs, VarcharEncoding::Ascii, &mut seq, false).unwrap();
        let mut par = BufferPool::new(2);
        pack_batch(&rows, 0, &columns, &codecs, VarcharEncoding::Ascii, &mut par, true).unwrap();
        assert_eq!(seq.buffers(), par.buffers());
    }
}
