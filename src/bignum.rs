//! Arbitrary-precision token quantities and their ledger byte encoding.
//!
//! The ledger serializes big integers as a single sign byte followed by the
//! minimal big-endian magnitude. Zero is the empty byte string.

use crate::error::{PeggyError, Result};
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Zero;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Add;
use std::str::FromStr;

const SIGN_POSITIVE: u8 = 0x00;
const SIGN_NEGATIVE: u8 = 0x01;

/// Signed big integer used for message values and gas prices.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BigNum(BigInt);

impl BigNum {
    pub fn zero() -> Self {
        BigNum(BigInt::zero())
    }

    pub fn from_u64(value: u64) -> Self {
        BigNum(BigInt::from(value))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.sign() == Sign::Minus
    }

    /// Ledger byte form: empty for zero, otherwise sign byte ‖ magnitude.
    pub fn to_bytes(&self) -> Vec<u8> {
        if self.0.is_zero() {
            return Vec::new();
        }
        let (sign, magnitude) = self.0.to_bytes_be();
        let mut out = Vec::with_capacity(magnitude.len() + 1);
        out.push(if sign == Sign::Minus {
            SIGN_NEGATIVE
        } else {
            SIGN_POSITIVE
        });
        out.extend_from_slice(&magnitude);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let Some((&sign, magnitude)) = bytes.split_first() else {
            return Ok(BigNum::zero());
        };
        let magnitude = BigInt::from(BigUint::from_bytes_be(magnitude));
        match sign {
            SIGN_POSITIVE => Ok(BigNum(magnitude)),
            SIGN_NEGATIVE => Ok(BigNum(-magnitude)),
            other => Err(PeggyError::InvalidNumber(format!(
                "unknown sign byte 0x{:02x}",
                other
            ))),
        }
    }

    /// Price times gas units, used for the maximum fee a message may burn.
    pub fn mul_gas(&self, units: i64) -> BigNum {
        BigNum(&self.0 * BigInt::from(units))
    }
}

impl FromStr for BigNum {
    type Err = PeggyError;

    /// Accepts only non-negative base-10 integers made of ASCII digits.
    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PeggyError::InvalidNumber(format!(
                "'{}' is not a non-negative decimal integer",
                s
            )));
        }
        BigUint::parse_bytes(s.as_bytes(), 10)
            .map(|n| BigNum(BigInt::from(n)))
            .ok_or_else(|| PeggyError::InvalidNumber(s.to_string()))
    }
}

impl fmt::Display for BigNum {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for &BigNum {
    type Output = BigNum;

    fn add(self, other: Self) -> BigNum {
        BigNum(&self.0 + &other.0)
    }
}

impl From<u64> for BigNum {
    fn from(value: u64) -> Self {
        BigNum::from_u64(value)
    }
}

impl Serialize for BigNum {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for BigNum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        // Node responses may carry negative amounts, e.g. penalties.
        BigInt::parse_bytes(text.as_bytes(), 10)
            .map(BigNum)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid big integer '{}'", text)))
    }
}

/// Serializes a non-negative decimal string into the ledger byte form.
pub fn encode(decimal: &str) -> Result<Vec<u8>> {
    Ok(decimal.parse::<BigNum>()?.to_bytes())
}

/// Inverse of [`encode`]; negative magnitudes are rendered with a leading `-`.
pub fn decode(bytes: &[u8]) -> Result<String> {
    Ok(BigNum::from_bytes(bytes)?.to_string())
}
