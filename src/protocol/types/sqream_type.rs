//! SQream column type tags and their static wire properties.
//!
//! Nullability, width and scale are column properties carried by
//! `ColumnMetadata`; this enum only knows what is fixed per type.

use chrono::NaiveDate;

use crate::error::{Error, Result};

use super::value::SqreamValue;

/// SQream logical column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqreamType {
    /// BOOL - one byte, 0 or 1.
    Bool,
    /// TINYINT - unsigned byte.
    TinyInt,
    /// SMALLINT - 16-bit signed.
    SmallInt,
    /// INT - 32-bit signed.
    Int,
    /// BIGINT - 64-bit signed.
    BigInt,
    /// REAL - 32-bit float.
    Float,
    /// DOUBLE - 64-bit float.
    Double,
    /// DATE - days since the SQream epoch.
    Date,
    /// DATETIME - date in the high word, milliseconds in the low word.
    DateTime,
    /// VARCHAR(n) - fixed-width, space padded.
    Varchar,
    /// TEXT / NVARCHAR - variable-length UTF-8.
    Text,
    /// NUMERIC(p, s) - 128-bit scaled integer.
    Numeric,
}

impl SqreamType {
    /// All type tags, in wire-name table order.
    pub const ALL: [SqreamType; 12] = [
        SqreamType::Bool,
        SqreamType::TinyInt,
        SqreamType::SmallInt,
        SqreamType::Int,
        SqreamType::BigInt,
        SqreamType::Float,
        SqreamType::Double,
        SqreamType::Date,
        SqreamType::DateTime,
        SqreamType::Varchar,
        SqreamType::Text,
        SqreamType::Numeric,
    ];

    /// Resolve a type from the name the server uses in `queryType` responses.
    ///
    /// Returns `Err(Error::UnsupportedType)` for names outside the table.
    pub fn from_wire_name(name: &str) -> Result<Self> {
        match name {
            "ftBool" => Ok(SqreamType::Bool),
            "ftUByte" => Ok(SqreamType::TinyInt),
            "ftShort" => Ok(SqreamType::SmallInt),
            "ftInt" => Ok(SqreamType::Int),
            "ftLong" => Ok(SqreamType::BigInt),
            "ftFloat" => Ok(SqreamType::Float),
            "ftDouble" => Ok(SqreamType::Double),
            "ftDate" => Ok(SqreamType::Date),
            "ftDateTime" => Ok(SqreamType::DateTime),
            "ftVarchar" => Ok(SqreamType::Varchar),
            "ftBlob" => Ok(SqreamType::Text),
            "ftNumeric" => Ok(SqreamType::Numeric),
            _ => Err(Error::UnsupportedType {
                type_name: name.to_string(),
            }),
        }
    }

    /// The server's name for this type.
    pub fn wire_name(&self) -> &'static str {
        match self {
            SqreamType::Bool => "ftBool",
            SqreamType::TinyInt => "ftUByte",
            SqreamType::SmallInt => "ftShort",
            SqreamType::Int => "ftInt",
            SqreamType::BigInt => "ftLong",
            SqreamType::Float => "ftFloat",
            SqreamType::Double => "ftDouble",
            SqreamType::Date => "ftDate",
            SqreamType::DateTime => "ftDateTime",
            SqreamType::Varchar => "ftVarchar",
            SqreamType::Text => "ftBlob",
            SqreamType::Numeric => "ftNumeric",
        }
    }

    /// Wire width in bytes for types whose width does not depend on the column.
    ///
    /// `None` for Varchar (width comes from the column) and Text (variable).
    pub fn fixed_width(&self) -> Option<u32> {
        match self {
            SqreamType::Bool | SqreamType::TinyInt => Some(1),
            SqreamType::SmallInt => Some(2),
            SqreamType::Int | SqreamType::Float | SqreamType::Date => Some(4),
            SqreamType::BigInt | SqreamType::Double | SqreamType::DateTime => Some(8),
            SqreamType::Numeric => Some(16),
            SqreamType::Varchar | SqreamType::Text => None,
        }
    }

    /// Whether values of this type carry a per-row length prefix.
    pub fn is_variable_length(&self) -> bool {
        matches!(self, SqreamType::Text)
    }

    /// Value written into the data slot of a null row.
    ///
    /// `width` is the column's fixed width and only matters for Varchar.
    pub fn placeholder(&self, width: u32) -> SqreamValue {
        match self {
            SqreamType::Bool => SqreamValue::Bool(false),
            SqreamType::TinyInt => SqreamValue::TinyInt(0),
            SqreamType::SmallInt => SqreamValue::SmallInt(0),
            SqreamType::Int => SqreamValue::Int(0),
            SqreamType::BigInt => SqreamValue::BigInt(0),
            SqreamType::Float => SqreamValue::Float(0.0),
            SqreamType::Double => SqreamValue::Double(0.0),
            SqreamType::Date => SqreamValue::Date(placeholder_date()),
            SqreamType::DateTime => {
                SqreamValue::DateTime(placeholder_date().and_time(Default::default()))
            }
            SqreamType::Varchar => SqreamValue::String(" ".repeat(width as usize)),
            SqreamType::Text => SqreamValue::String(String::new()),
            SqreamType::Numeric => SqreamValue::Numeric(Default::default()),
        }
    }
}

/// 1900-01-01, the date used to fill null Date/DateTime slots.
fn placeholder_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

impl std::fmt::Display for SqreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SqreamType::Bool => "BOOL",
            SqreamType::TinyInt => "TINYINT",
            SqreamType::SmallInt => "SMALLINT",
            SqreamType::Int => "INT",
            SqreamType::BigInt => "BIGINT",
            SqreamType::Float => "REAL",
            SqreamType::Double => "DOUBLE",
            SqreamType::Date => "DATE",
            SqreamType::DateTime => "DATETIME",
            SqreamType::Varchar => "VARCHAR",
            SqreamType::Text => "TEXT",
            SqreamType::Numeric => "NUMERIC",
        };
        f.write_str(name)
    }
}
