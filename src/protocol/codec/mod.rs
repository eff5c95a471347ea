//! Scalar codecs for SQream's wire representations.

pub mod date;
pub mod numeric;
pub mod text;

pub use date::{
    date_to_int, datetime_to_long, decode_date, encode_date, encode_datetime, int_to_date,
    long_to_datetime,
};
pub use numeric::{bytes_to_decimal, decimal_to_bytes, decimal_to_i128};
pub use text::{decode_text, strip_padding, VarcharEncoding};
