//! Per-type encode/decode dispatch, resolved once per column.
//!
//! Encoders accept the `SqreamValue` variants that convert losslessly (or
//! with the documented rounding) into the column type, and reject the rest
//! with a message naming the offending value. Decoders receive exactly one
//! data slot (or one Text value) and never see nulls.

use chrono::NaiveDateTime;

use crate::protocol::codec::{self, VarcharEncoding};
use crate::protocol::message::WriteExt;
use crate::protocol::types::{ColumnMetadata, Decimal, SqreamType, SqreamValue};

type CodecResult<T> = std::result::Result<T, String>;

/// Append one value's data slot.
pub type EncodeFn =
    fn(&SqreamValue, &ColumnMetadata, VarcharEncoding, &mut Vec<u8>) -> CodecResult<()>;

/// Decode one value's data slot.
pub type DecodeFn = fn(&[u8], &ColumnMetadata, VarcharEncoding) -> CodecResult<SqreamValue>;

/// Encode and decode functions for one column type.
#[derive(Clone, Copy)]
pub struct ColumnCodec {
    sqream_type: SqreamType,
    encode: EncodeFn,
    decode: DecodeFn,
}

impl std::fmt::Debug for ColumnCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnCodec")
            .field("sqream_type", &self.sqream_type)
            .finish()
    }
}

impl ColumnCodec {
    /// Look up the codec for a type.
    pub fn for_type(sqream_type: SqreamType) -> Self {
        let (encode, decode): (EncodeFn, DecodeFn) = match sqream_type {
            SqreamType::Bool => (encode_bool, decode_bool),
            SqreamType::TinyInt => (encode_tinyint, decode_tinyint),
            SqreamType::SmallInt => (encode_smallint, decode_smallint),
            SqreamType::Int => (encode_int, decode_int),
            SqreamType::BigInt => (encode_bigint, decode_bigint),
            SqreamType::Float => (encode_float, decode_float),
            SqreamType::Double => (encode_double, decode_double),
            SqreamType::Date => (encode_date, decode_date),
            SqreamType::DateTime => (encode_datetime, decode_datetime),
            SqreamType::Varchar => (encode_varchar, decode_varchar),
            SqreamType::Text => (encode_text, decode_text),
            SqreamType::Numeric => (encode_numeric, decode_numeric),
        };
        Self {
            sqream_type,
            encode,
            decode,
        }
    }

    /// Resolve codecs for every column, in column order.
    pub fn for_columns(columns: &[ColumnMetadata]) -> Vec<Self> {
        columns.iter().map(|c| Self::for_type(c.sqream_type)).collect()
    }

    /// The type this codec handles.
    pub fn sqream_type(&self) -> SqreamType {
        self.sqream_type
    }

    /// Append the data slot for a non-null value.
    pub fn encode(
        &self,
        value: &SqreamValue,
        column: &ColumnMetadata,
        encoding: VarcharEncoding,
        out: &mut Vec<u8>,
    ) -> CodecResult<()> {
        (self.encode)(value, column, encoding, out)
    }

    /// Decode a single data slot.
    pub fn decode(
        &self,
        slot: &[u8],
        column: &ColumnMetadata,
        encoding: VarcharEncoding,
    ) -> CodecResult<SqreamValue> {
        (self.decode)(slot, column, encoding)
    }
}

fn mismatch(value: &SqreamValue) -> String {
    format!("cannot convert {} value {}", value.variant_name(), value)
}

fn integer_in_range(value: &SqreamValue, min: i128, max: i128) -> CodecResult<i128> {
    let v = value.as_integer().ok_or_else(|| mismatch(value))?;
    if v < min || v > max {
        return Err(format!("{} is outside the range {}..={}", v, min, max));
    }
    Ok(v)
}

fn slot<const N: usize>(bytes: &[u8]) -> CodecResult<[u8; N]> {
    bytes
        .try_into()
        .map_err(|_| format!("expected {} bytes, got {}", N, bytes.len()))
}

// Bool

fn encode_bool(
    value: &SqreamValue,
    _: &ColumnMetadata,
    _: VarcharEncoding,
    out: &mut Vec<u8>,
) -> CodecResult<()> {
    let b = value.as_bool().ok_or_else(|| mismatch(value))?;
    out.write_u8(u8::from(b));
    Ok(())
}

fn decode_bool(bytes: &[u8], _: &ColumnMetadata, _: VarcharEncoding) -> CodecResult<SqreamValue> {
    Ok(SqreamValue::Bool(slot::<1>(bytes)?[0] != 0))
}

// Integers

fn encode_tinyint(
    value: &SqreamValue,
    _: &ColumnMetadata,
    _: VarcharEncoding,
    out: &mut Vec<u8>,
) -> CodecResult<()> {
    let v = integer_in_range(value, 0, u8::MAX as i128)?;
    out.write_u8(v as u8);
    Ok(())
}

fn decode_tinyint(
    bytes: &[u8],
    _: &ColumnMetadata,
    _: VarcharEncoding,
) -> CodecResult<SqreamValue> {
    Ok(SqreamValue::TinyInt(slot::<1>(bytes)?[0]))
}

fn encode_smallint(
    value: &SqreamValue,
    _: &ColumnMetadata,
    _: VarcharEncoding,
    out: &mut Vec<u8>,
) -> CodecResult<()> {
    let v = integer_in_range(value, i16::MIN as i128, i16::MAX as i128)?;
    out.write_bytes(&(v as i16).to_le_bytes());
    Ok(())
}

fn decode_smallint(
    bytes: &[u8],
    _: &ColumnMetadata,
    _: VarcharEncoding,
) -> CodecResult<SqreamValue> {
    Ok(SqreamValue::SmallInt(i16::from_le_bytes(slot(bytes)?)))
}

fn encode_int(
    value: &SqreamValue,
    _: &ColumnMetadata,
    _: VarcharEncoding,
    out: &mut Vec<u8>,
) -> CodecResult<()> {
    let v = integer_in_range(value, i32::MIN as i128, i32::MAX as i128)?;
    out.write_i32_le(v as i32);
    Ok(())
}

fn decode_int(bytes: &[u8], _: &ColumnMetadata, _: VarcharEncoding) -> CodecResult<SqreamValue> {
    Ok(SqreamValue::Int(i32::from_le_bytes(slot(bytes)?)))
}

fn encode_bigint(
    value: &SqreamValue,
    _: &ColumnMetadata,
    _: VarcharEncoding,
    out: &mut Vec<u8>,
) -> CodecResult<()> {
    let v = integer_in_range(value, i64::MIN as i128, i64::MAX as i128)?;
    out.write_i64_le(v as i64);
    Ok(())
}

fn decode_bigint(bytes: &[u8], _: &ColumnMetadata, _: VarcharEncoding) -> CodecResult<SqreamValue> {
    Ok(SqreamValue::BigInt(i64::from_le_bytes(slot(bytes)?)))
}

// Floating point

fn encode_float(
    value: &SqreamValue,
    _: &ColumnMetadata,
    _: VarcharEncoding,
    out: &mut Vec<u8>,
) -> CodecResult<()> {
    let v = match value {
        SqreamValue::Float(f) => *f,
        SqreamValue::Double(d) => {
            if d.is_finite() && d.abs() > f32::MAX as f64 {
                return Err(format!("{} overflows a 32-bit float", d));
            }
            *d as f32
        }
        other => other.as_integer().ok_or_else(|| mismatch(other))? as f32,
    };
    out.write_bytes(&v.to_le_bytes());
    Ok(())
}

fn decode_float(bytes: &[u8], _: &ColumnMetadata, _: VarcharEncoding) -> CodecResult<SqreamValue> {
    Ok(SqreamValue::Float(f32::from_le_bytes(slot(bytes)?)))
}

fn encode_double(
    value: &SqreamValue,
    _: &ColumnMetadata,
    _: VarcharEncoding,
    out: &mut Vec<u8>,
) -> CodecResult<()> {
    let v = match value {
        SqreamValue::Float(f) => *f as f64,
        SqreamValue::Double(d) => *d,
        other => other.as_integer().ok_or_else(|| mismatch(other))? as f64,
    };
    out.write_bytes(&v.to_le_bytes());
    Ok(())
}

fn decode_double(bytes: &[u8], _: &ColumnMetadata, _: VarcharEncoding) -> CodecResult<SqreamValue> {
    Ok(SqreamValue::Double(f64::from_le_bytes(slot(bytes)?)))
}

// Temporal

fn encode_date(
    value: &SqreamValue,
    _: &ColumnMetadata,
    _: VarcharEncoding,
    out: &mut Vec<u8>,
) -> CodecResult<()> {
    match value {
        SqreamValue::Date(d) => {
            out.write_i32_le(codec::encode_date(*d));
            Ok(())
        }
        other => Err(mismatch(other)),
    }
}

fn decode_date(bytes: &[u8], _: &ColumnMetadata, _: VarcharEncoding) -> CodecResult<SqreamValue> {
    codec::decode_date(i32::from_le_bytes(slot(bytes)?)).map(SqreamValue::Date)
}

fn encode_datetime(
    value: &SqreamValue,
    _: &ColumnMetadata,
    _: VarcharEncoding,
    out: &mut Vec<u8>,
) -> CodecResult<()> {
    let dt: NaiveDateTime = match value {
        SqreamValue::DateTime(dt) => *dt,
        SqreamValue::Date(d) => d.and_time(Default::default()),
        other => return Err(mismatch(other)),
    };
    out.write_i64_le(codec::encode_datetime(dt));
    Ok(())
}

fn decode_datetime(
    bytes: &[u8],
    _: &ColumnMetadata,
    _: VarcharEncoding,
) -> CodecResult<SqreamValue> {
    codec::long_to_datetime(i64::from_le_bytes(slot(bytes)?)).map(SqreamValue::DateTime)
}

// Numeric

fn encode_numeric(
    value: &SqreamValue,
    column: &ColumnMetadata,
    _: VarcharEncoding,
    out: &mut Vec<u8>,
) -> CodecResult<()> {
    let scale = column.scale as u32;
    let bytes = match value {
        SqreamValue::Numeric(d) => codec::decimal_to_bytes(d, scale)?,
        SqreamValue::Float(_) | SqreamValue::Double(_) => {
            let f = value.to_f64().ok_or_else(|| mismatch(value))?;
            let d = Decimal::try_from(f).map_err(|e| e.to_string())?;
            codec::decimal_to_bytes(&d, scale)?
        }
        other => {
            let v = other.as_integer().ok_or_else(|| mismatch(other))?;
            codec::decimal_to_bytes(&Decimal::from(v), scale)?
        }
    };
    out.write_bytes(&bytes);
    Ok(())
}

fn decode_numeric(
    bytes: &[u8],
    column: &ColumnMetadata,
    _: VarcharEncoding,
) -> CodecResult<SqreamValue> {
    Ok(SqreamValue::Numeric(codec::bytes_to_decimal(
        slot(bytes)?,
        column.scale as u32,
    )))
}

// Strings

fn encode_varchar(
    value: &SqreamValue,
    column: &ColumnMetadata,
    encoding: VarcharEncoding,
    out: &mut Vec<u8>,
) -> CodecResult<()> {
    let s = value.as_str().ok_or_else(|| mismatch(value))?;
    let width = column.fixed_width as usize;
    let start = out.len();
    encoding.encode_into(s, out)?;
    let written = out.len() - start;
    if written > width {
        out.truncate(start);
        return Err(format!(
            "{:?} is {} bytes in {}, wider than VARCHAR({})",
            s, written, encoding, width
        ));
    }
    out.write_repeated(b' ', width - written);
    Ok(())
}

fn decode_varchar(
    bytes: &[u8],
    _: &ColumnMetadata,
    encoding: VarcharEncoding,
) -> CodecResult<SqreamValue> {
    Ok(SqreamValue::String(
        encoding.decode_lossy(codec::strip_padding(bytes)),
    ))
}

fn encode_text(
    value: &SqreamValue,
    _: &ColumnMetadata,
    _: VarcharEncoding,
    out: &mut Vec<u8>,
) -> CodecResult<()> {
    let s = value.as_str().ok_or_else(|| mismatch(value))?;
    out.write_bytes(s.as_bytes());
    Ok(())
}

fn decode_text(bytes: &[u8], _: &ColumnMetadata, _: VarcharEncoding) -> CodecResult<SqreamValue> {
    codec::decode_text(bytes).map(SqreamValue::String)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn encode(meta: &ColumnMetadata, value: SqreamValue) -> CodecResult<Vec<u8>> {
        let mut out = Vec::new();
        ColumnCodec::for_type(meta.sqream_type).encode(
            &value,
            meta,
            VarcharEncoding::Ascii,
            &mut out,
        )?;
        Ok(out)
    }

    fn round_trip(meta: &ColumnMetadata, value: SqreamValue) -> SqreamValue {
        let bytes = encode(meta, value).unwrap();
        ColumnCodec::for_type(meta.sqream_type)
            .decode(&bytes, meta, VarcharEncoding::Ascii)
            .unwrap()
    }

    #[test]
    fn test_fixed_width_matches_type_table() {
        for ty in SqreamType::ALL {
            if ty.is_variable_length() || ty == SqreamType::Varchar {
                continue;
            }
            let meta = ColumnMetadata::new("c", ty, false);
            let bytes = encode(&meta, ty.placeholder(0)).unwrap();
            assert_eq!(Some(bytes.len() as u32), ty.fixed_width(), "{}", ty);
        }
    }

    #[test]
    fn test_integer_coercion_and_range() {
        let tiny = ColumnMetadata::new("t", SqreamType::TinyInt, false);
        assert_eq!(round_trip(&tiny, SqreamValue::Int(255)), SqreamValue::TinyInt(255));
        assert!(encode(&tiny, SqreamValue::Int(300)).is_err());
        assert!(encode(&tiny, SqreamValue::Int(-1)).is_err());

        let small = ColumnMetadata::new("s", SqreamType::SmallInt, false);
        assert!(encode(&small, SqreamValue::BigInt(40_000)).is_err());
        assert_eq!(round_trip(&small, SqreamValue::TinyInt(7)), SqreamValue::SmallInt(7));

        let int = ColumnMetadata::new("i", SqreamType::Int, false);
        assert!(encode(&int, SqreamValue::String("5".into())).is_err());
        assert!(encode(&int, SqreamValue::Double(5.0)).is_err());
    }

    #[test]
    fn test_float_overflow() {
        let real = ColumnMetadata::new("r", SqreamType::Float, false);
        assert!(encode(&real, SqreamValue::Double(1e300)).is_err());
        assert_eq!(round_trip(&real, SqreamValue::Double(1.5)), SqreamValue::Float(1.5));
        assert_eq!(round_trip(&real, SqreamValue::Int(3)), SqreamValue::Float(3.0));
    }

    #[test]
    fn test_datetime_accepts_date() {
        let meta = ColumnMetadata::new("d", SqreamType::DateTime, false);
        let date = NaiveDate::from_ymd_opt(2020, 2, 29).unwrap();
        assert_eq!(
            round_trip(&meta, SqreamValue::Date(date)),
            SqreamValue::DateTime(date.and_hms_opt(0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_numeric_coercion() {
        let meta = ColumnMetadata::numeric("n", 2, false);
        let expected = SqreamValue::Numeric("12.00".parse().unwrap());
        assert_eq!(round_trip(&meta, SqreamValue::Int(12)), expected);
        assert_eq!(
            round_trip(&meta, SqreamValue::Double(0.125)),
            SqreamValue::Numeric("0.13".parse().unwrap())
        );
        assert!(encode(&meta, SqreamValue::Double(f64::INFINITY)).is_err());
    }

    #[test]
    fn test_varchar_padding_and_width() {
        let meta = ColumnMetadata::varchar("v", 5, false);
        assert_eq!(encode(&meta, "ab".into()).unwrap(), b"ab   ");
        assert_eq!(round_trip(&meta, "ab".into()), SqreamValue::from("ab"));
        assert!(encode(&meta, "abcdef".into()).is_err());
        assert!(encode(&meta, "é".into()).is_err());
    }

    #[test]
    fn test_text_strict_decode() {
        let meta = ColumnMetadata::new("t", SqreamType::Text, false);
        let codec = ColumnCodec::for_type(SqreamType::Text);
        assert!(codec.decode(b"\xFF", &meta, VarcharEncoding::Utf8).is_err());
        assert_eq!(round_trip(&meta, "".into()), SqreamValue::from(""));
    }
}
