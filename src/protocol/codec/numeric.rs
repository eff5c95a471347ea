//! SQream NUMERIC codec.
//!
//! NUMERIC is a 16-byte little-endian two's-complement integer holding
//! `value * 10^scale`. Encoding rounds away from zero (ceiling for positive
//! values, floor for negative) when the value has more fractional digits
//! than the column scale.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive};

use crate::protocol::constants::{MAX_NUMERIC_DIGITS, MAX_NUMERIC_SCALE};
use crate::protocol::types::{pow10, Decimal};

/// Decode 16 wire bytes into a decimal with the column scale.
pub fn bytes_to_decimal(bytes: [u8; 16], scale: u32) -> Decimal {
    Decimal::new(i128::from_le_bytes(bytes), scale)
}

/// Encode a decimal into 16 wire bytes at the column scale.
pub fn decimal_to_bytes(value: &Decimal, scale: u32) -> Result<[u8; 16], String> {
    Ok(decimal_to_i128(value, scale)?.to_le_bytes())
}

/// Scale a decimal to the column scale as a 128-bit integer.
pub fn decimal_to_i128(value: &Decimal, scale: u32) -> Result<i128, String> {
    if scale > MAX_NUMERIC_SCALE {
        return Err(format!("scale {} exceeds {}", scale, MAX_NUMERIC_SCALE));
    }
    let scaled = value.rescale_away_from_zero(scale);
    check_precision(&scaled, value, scale)?;
    scaled
        .to_i128()
        .ok_or_else(|| format!("{} does not fit in 128 bits at scale {}", value, scale))
}

fn check_precision(scaled: &BigInt, value: &Decimal, scale: u32) -> Result<(), String> {
    if scaled.abs() >= pow10(MAX_NUMERIC_DIGITS) {
        return Err(format!(
            "{} needs more than {} digits at scale {}",
            value, MAX_NUMERIC_DIGITS, scale
        ));
    }
    Ok(())
}
