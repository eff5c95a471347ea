//! SQream value types for statement parameters and query results.

use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

use super::decimal::Decimal;

/// SQream value enum representing a single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqreamValue {
    /// NULL value.
    Null,
    /// BOOL value.
    Bool(bool),
    /// TINYINT value (unsigned).
    TinyInt(u8),
    /// SMALLINT value.
    SmallInt(i16),
    /// INT value.
    Int(i32),
    /// BIGINT value.
    BigInt(i64),
    /// REAL value.
    Float(f32),
    /// DOUBLE value.
    Double(f64),
    /// DATE value.
    Date(NaiveDate),
    /// DATETIME value (millisecond precision on the wire).
    DateTime(NaiveDateTime),
    /// NUMERIC value.
    Numeric(Decimal),
    /// VARCHAR or TEXT value.
    String(String),
}

impl SqreamValue {
    /// Check if the value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, SqreamValue::Null)
    }

    /// Try to get the value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqreamValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get the value as a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqreamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Widen any integer variant to i128.
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            SqreamValue::TinyInt(v) => Some(*v as i128),
            SqreamValue::SmallInt(v) => Some(*v as i128),
            SqreamValue::Int(v) => Some(*v as i128),
            SqreamValue::BigInt(v) => Some(*v as i128),
            _ => None,
        }
    }

    /// Try to convert to i64.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            SqreamValue::Numeric(d) => d.to_i64(),
            other => other.as_integer().and_then(|v| i64::try_from(v).ok()),
        }
    }

    /// Try to convert to f64.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            SqreamValue::Float(v) => Some(*v as f64),
            SqreamValue::Double(v) => Some(*v),
            SqreamValue::Numeric(d) => d.to_f64(),
            other => other.as_integer().map(|v| v as f64),
        }
    }

    /// Try to get the value as a date.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            SqreamValue::Date(d) => Some(*d),
            SqreamValue::DateTime(dt) => Some(dt.date()),
            _ => None,
        }
    }

    /// Try to get the value as a datetime.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            SqreamValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Try to get the value as a decimal.
    pub fn as_decimal(&self) -> Option<&Decimal> {
        match self {
            SqreamValue::Numeric(d) => Some(d),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn variant_name(&self) -> &'static str {
        match self {
            SqreamValue::Null => "NULL",
            SqreamValue::Bool(_) => "bool",
            SqreamValue::TinyInt(_) => "u8",
            SqreamValue::SmallInt(_) => "i16",
            SqreamValue::Int(_) => "i32",
            SqreamValue::BigInt(_) => "i64",
            SqreamValue::Float(_) => "f32",
            SqreamValue::Double(_) => "f64",
            SqreamValue::Date(_) => "date",
            SqreamValue::DateTime(_) => "datetime",
            SqreamValue::Numeric(_) => "decimal",
            SqreamValue::String(_) => "string",
        }
    }
}

impl fmt::Display for SqreamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqreamValue::Null => write!(f, "NULL"),
            SqreamValue::Bool(b) => write!(f, "{}", b),
            SqreamValue::TinyInt(v) => write!(f, "{}", v),
            SqreamValue::SmallInt(v) => write!(f, "{}", v),
            SqreamValue::Int(v) => write!(f, "{}", v),
            SqreamValue::BigInt(v) => write!(f, "{}", v),
            SqreamValue::Float(v) => write!(f, "{}", v),
            SqreamValue::Double(v) => write!(f, "{}", v),
            SqreamValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            SqreamValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.3f")),
            SqreamValue::Numeric(d) => write!(f, "{}", d),
            SqreamValue::String(s) => write!(f, "{}", s),
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for SqreamValue {
                fn from(value: $ty) -> Self {
                    SqreamValue::$variant(value.into())
                }
            }
        )*
    };
}

impl_from_primitive! {
    bool => Bool,
    u8 => TinyInt,
    i16 => SmallInt,
    i32 => Int,
    i64 => BigInt,
    f32 => Float,
    f64 => Double,
    NaiveDate => Date,
    NaiveDateTime => DateTime,
    Decimal => Numeric,
    String => String,
    &str => String,
}

impl<T: Into<SqreamValue>> From<Option<T>> for SqreamValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqreamValue::Null, Into::into)
    }
}
