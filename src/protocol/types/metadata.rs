//! Column metadata negotiated through `queryTypeIn` / `queryTypeOut`.
//!
//! `ColumnDescriptor` is the raw JSON shape the server sends;
//! `ColumnMetadata` is the validated form the codecs work from.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::constants::{MAX_NUMERIC_DIGITS, MAX_NUMERIC_SCALE};

use super::sqream_type::SqreamType;

/// Column description as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    /// Column name (absent for insert parameters).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether NULL values are allowed.
    pub nullable: bool,
    /// Whether the column carries a length stream.
    pub is_true_var_char: bool,
    /// `[wire_name, size, scale]`.
    #[serde(rename = "type")]
    pub type_info: (String, u32, u32),
}

/// Validated column metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMetadata {
    /// Column name (empty for insert parameters).
    pub name: String,
    /// Logical type.
    pub sqream_type: SqreamType,
    /// Data slot width in bytes (0 if variable-length).
    pub fixed_width: u32,
    /// Whether NULL values are allowed.
    pub nullable: bool,
    /// Whether a per-row length stream precedes the data.
    pub is_variable_length: bool,
    /// Decimal scale (NUMERIC only).
    pub scale: u8,
}

impl ColumnMetadata {
    /// Create metadata for a type whose width is implied by the type.
    pub fn new(name: impl Into<String>, sqream_type: SqreamType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            sqream_type,
            fixed_width: sqream_type.fixed_width().unwrap_or(0),
            nullable,
            is_variable_length: sqream_type.is_variable_length(),
            scale: 0,
        }
    }

    /// Create VARCHAR(width) metadata.
    pub fn varchar(name: impl Into<String>, width: u32, nullable: bool) -> Self {
        Self {
            fixed_width: width,
            ..Self::new(name, SqreamType::Varchar, nullable)
        }
    }

    /// Create NUMERIC metadata with the given scale.
    pub fn numeric(name: impl Into<String>, scale: u8, nullable: bool) -> Self {
        Self {
            scale,
            ..Self::new(name, SqreamType::Numeric, nullable)
        }
    }

    /// Validate a wire descriptor.
    pub fn from_descriptor(desc: &ColumnDescriptor) -> Result<Self> {
        let (wire_name, size, scale) = &desc.type_info;
        let sqream_type = SqreamType::from_wire_name(wire_name)?;

        if desc.is_true_var_char != sqream_type.is_variable_length() {
            return Err(Error::protocol(format!(
                "Column {:?}: isTrueVarChar={} contradicts type {}",
                desc.name.as_deref().unwrap_or(""),
                desc.is_true_var_char,
                wire_name
            )));
        }

        let fixed_width = match sqream_type {
            SqreamType::Varchar if *size == 0 => {
                return Err(Error::protocol(format!(
                    "Column {:?}: VARCHAR with zero width",
                    desc.name.as_deref().unwrap_or("")
                )));
            }
            SqreamType::Varchar => *size,
            SqreamType::Text => 0,
            other => other.fixed_width().unwrap_or(*size),
        };

        if *scale > MAX_NUMERIC_SCALE {
            return Err(Error::protocol(format!(
                "Column {:?}: scale {} exceeds {}",
                desc.name.as_deref().unwrap_or(""),
                scale,
                MAX_NUMERIC_SCALE
            )));
        }

        Ok(Self {
            name: desc.name.clone().unwrap_or_default(),
            sqream_type,
            fixed_width,
            nullable: desc.nullable,
            is_variable_length: desc.is_true_var_char,
            scale: if sqream_type == SqreamType::Numeric {
                *scale as u8
            } else {
                0
            },
        })
    }

    /// Validate every descriptor in a `queryType` list, keeping statement order.
    pub fn from_descriptors(descs: &[ColumnDescriptor]) -> Result<Vec<Self>> {
        descs.iter().map(Self::from_descriptor).collect()
    }

    /// SQL type as declared, e.g. `VARCHAR(10)` or `NUMERIC(38,4)`.
    pub fn type_label(&self) -> String {
        match self.sqream_type {
            SqreamType::Varchar => format!("VARCHAR({})", self.fixed_width),
            SqreamType::Numeric => format!("NUMERIC({},{})", MAX_NUMERIC_DIGITS, self.scale),
            other => other.to_string(),
        }
    }

    /// Packed bytes one row of this column occupies, not counting Text payload.
    pub fn fixed_row_bytes(&self) -> usize {
        let mut width = self.fixed_width as usize;
        if self.nullable {
            width += 1;
        }
        if self.is_variable_length {
            width += 4;
        }
        width
    }

    /// Number of raw regions this column occupies in a fetch batch.
    pub fn region_count(&self) -> usize {
        1 + usize::from(self.nullable) + usize::from(self.is_variable_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(json: &str) -> ColumnDescriptor {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_from_descriptor_int() {
        let desc = descriptor(
            r#"{"isTrueVarChar":false,"name":"id","nullable":true,"type":["ftInt",4,0]}"#,
        );
        let meta = ColumnMetadata::from_descriptor(&desc).unwrap();
        assert_eq!(meta.name, "id");
        assert_eq!(meta.sqream_type, SqreamType::Int);
        assert_eq!(meta.fixed_width, 4);
        assert!(meta.nullable);
        assert!(!meta.is_variable_length);
        assert_eq!(meta.region_count(), 2);
    }

    #[test]
    fn test_from_descriptor_insert_parameter_has_no_name() {
        let desc = descriptor(r#"{"isTrueVarChar":true,"nullable":false,"type":["ftBlob",0,0]}"#);
        let meta = ColumnMetadata::from_descriptor(&desc).unwrap();
        assert_eq!(meta.name, "");
        assert_eq!(meta.sqream_type, SqreamType::Text);
        assert_eq!(meta.fixed_width, 0);
        assert!(meta.is_variable_length);
        assert_eq!(meta.fixed_row_bytes(), 4);
    }

    #[test]
    fn test_from_descriptor_varchar_and_numeric() {
        let desc = descriptor(
            r#"{"isTrueVarChar":false,"name":"v","nullable":true,"type":["ftVarchar",10,0]}"#,
        );
        let meta = ColumnMetadata::from_descriptor(&desc).unwrap();
        assert_eq!(meta.fixed_width, 10);
        assert_eq!(meta.fixed_row_bytes(), 11);

        let desc = descriptor(
            r#"{"isTrueVarChar":false,"name":"n","nullable":false,"type":["ftNumeric",16,4]}"#,
        );
        let meta = ColumnMetadata::from_descriptor(&desc).unwrap();
        assert_eq!(meta.scale, 4);
        assert_eq!(meta.fixed_width, 16);
        assert_eq!(meta.type_label(), "NUMERIC(38,4)");
    }

    #[test]
    fn test_from_descriptor_rejects_contradictions() {
        let desc = descriptor(r#"{"isTrueVarChar":true,"nullable":true,"type":["ftInt",4,0]}"#);
        assert!(ColumnMetadata::from_descriptor(&desc).is_err());

        let desc = descriptor(r#"{"isTrueVarChar":false,"nullable":true,"type":["ftGeo",4,0]}"#);
        assert!(matches!(
            ColumnMetadata::from_descriptor(&desc),
            Err(Error::UnsupportedType { .. })
        ));
    }
}
