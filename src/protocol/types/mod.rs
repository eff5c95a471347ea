//! SQream data types for statement parameters and query results.

mod column;
mod decimal;
mod metadata;
mod row;
mod sqream_type;
mod value;

pub(crate) use decimal::pow10;

pub use column::ColumnInfo;
pub use decimal::Decimal;
pub use metadata::{ColumnDescriptor, ColumnMetadata};
pub use row::Row;
pub use sqream_type::SqreamType;
pub use value::SqreamValue;
