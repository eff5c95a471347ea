//! Arbitrary-precision decimal used for NUMERIC columns.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::error::{Error, Result};
use crate::protocol::constants::MAX_DECIMAL_LITERAL_SCALE;

/// A decimal number `unscaled * 10^-scale`.
///
/// Equality is numeric: `1.50 == 1.5`.
#[derive(Debug, Clone, Default)]
pub struct Decimal {
    unscaled: BigInt,
    scale: u32,
}

impl Decimal {
    /// Create a decimal from an unscaled integer and a scale.
    pub fn new(unscaled: impl Into<BigInt>, scale: u32) -> Self {
        Self {
            unscaled: unscaled.into(),
            scale,
        }
    }

    /// The unscaled integer.
    pub fn unscaled(&self) -> &BigInt {
        &self.unscaled
    }

    /// Number of digits after the decimal point.
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Whether the value is negative.
    pub fn is_negative(&self) -> bool {
        self.unscaled.is_negative()
    }

    /// Unscaled value at `target` scale, rounding away from zero when digits are dropped.
    pub fn rescale_away_from_zero(&self, target: u32) -> BigInt {
        match target.cmp(&self.scale) {
            Ordering::Equal => self.unscaled.clone(),
            Ordering::Greater => &self.unscaled * pow10(target - self.scale),
            Ordering::Less => {
                let dropped = self.scale - target;
                if self.unscaled.is_zero() {
                    return BigInt::zero();
                }
                // Every digit is dropped: the quotient is zero and the remainder is not.
                if dropped as usize >= self.unscaled.magnitude().to_str_radix(10).len() {
                    return BigInt::from(if self.unscaled.is_positive() { 1 } else { -1 });
                }
                let divisor = pow10(dropped);
                let quotient = &self.unscaled / &divisor;
                let remainder = &self.unscaled % &divisor;
                if remainder.is_zero() {
                    quotient
                } else if self.unscaled.is_positive() {
                    quotient + 1
                } else {
                    quotient - 1
                }
            }
        }
    }

    /// Drop trailing fractional zeros.
    pub fn normalized(&self) -> Self {
        if self.unscaled.is_zero() {
            return Self::default();
        }
        let ten = BigInt::from(10);
        let mut unscaled = self.unscaled.clone();
        let mut scale = self.scale;
        while scale > 0 && (&unscaled % &ten).is_zero() {
            unscaled /= &ten;
            scale -= 1;
        }
        Self { unscaled, scale }
    }

    /// Convert to f64, losing precision beyond what f64 can hold.
    pub fn to_f64(&self) -> Option<f64> {
        self.to_string().parse().ok()
    }

    /// Convert to i64 if the value is integral and in range.
    pub fn to_i64(&self) -> Option<i64> {
        let normalized = self.normalized();
        if normalized.scale == 0 {
            normalized.unscaled.to_i64()
        } else {
            None
        }
    }
}

/// `10^exp` as a big integer.
pub(crate) fn pow10(exp: u32) -> BigInt {
    BigInt::from(10).pow(exp)
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (self.normalized(), other.normalized());
        a.unscaled == b.unscaled && a.scale == b.scale
    }
}

impl Eq for Decimal {}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Self::new(value, 0)
    }
}

impl From<i128> for Decimal {
    fn from(value: i128) -> Self {
        Self::new(value, 0)
    }
}

impl TryFrom<f64> for Decimal {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(Error::invalid_state(format!(
                "Cannot represent {} as a decimal",
                value
            )));
        }
        // Shortest round-trip representation of the float.
        format!("{}", value).parse()
    }
}

impl FromStr for Decimal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::invalid_state(format!("Invalid decimal literal: {:?}", s));

        let trimmed = s.trim();
        let (mantissa, exponent) = match trimmed.find(['e', 'E']) {
            Some(pos) => {
                let exp: i64 = trimmed[pos + 1..].parse().map_err(|_| invalid())?;
                (&trimmed[..pos], exp)
            }
            None => (trimmed, 0),
        };

        let (negative, digits) = match mantissa.as_bytes().first() {
            Some(b'-') => (true, &mantissa[1..]),
            Some(b'+') => (false, &mantissa[1..]),
            _ => (false, mantissa),
        };
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let all_digits = format!("{}{}", int_part, frac_part);
        let mut unscaled: BigInt = all_digits.parse().map_err(|_| invalid())?;
        if negative {
            unscaled = -unscaled;
        }

        let scale = (frac_part.len() as i64).saturating_sub(exponent);
        if scale.unsigned_abs() > u64::from(MAX_DECIMAL_LITERAL_SCALE) {
            return Err(invalid());
        }
        if scale >= 0 {
            let scale = u32::try_from(scale).map_err(|_| invalid())?;
            Ok(Self::new(unscaled, scale))
        } else {
            let shift = u32::try_from(-scale).map_err(|_| invalid())?;
            Ok(Self::new(unscaled * pow10(shift), 0))
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.unscaled.abs().to_string();
        let sign = if self.unscaled.is_negative() { "-" } else { "" };
        let scale = self.scale as usize;
        if scale == 0 {
            return write!(f, "{}{}", sign, digits);
        }
        if digits.len() > scale {
            let (int_part, frac_part) = digits.split_at(digits.len() - scale);
            write!(f, "{}{}.{}", sign, int_part, frac_part)
        } else {
            write!(f, "{}0.{}{}", sign, "0".repeat(scale - digits.len()), digits)
        }
    }
}
