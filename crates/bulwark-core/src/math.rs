// crates/bulwark-core/src/math.rs
//
// Fixed-point constants and checked integer arithmetic.
//
// Amounts are u128. Ratios (drip factors, max slash percentages, reward
// indices) are WAD-scaled (1e18). Weights are in parts of ZOC (1e4).
// Products of two u128 values go through a 256-bit intermediate so
// `a * b / c` never overflows when the quotient fits. Reward indices are
// stored as U256: a stake supply of one unit against an 18-decimal drip
// scales past u128.

#![allow(clippy::assign_op_pattern)]

use uint::construct_uint;

use crate::error::BulwarkError;

construct_uint! {
    /// 256-bit unsigned integer.
    pub struct U256(4);
}

/// Fixed-point one (1e18).
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Denominator for weights and percentages expressed in basis points.
pub const ZOC: u16 = 10_000;

pub type BulwarkResult<T> = Result<T, BulwarkError>;

pub trait SafeMath: Sized {
    fn safe_add(self, rhs: Self) -> BulwarkResult<Self>;
    fn safe_sub(self, rhs: Self) -> BulwarkResult<Self>;
    fn safe_mul(self, rhs: Self) -> BulwarkResult<Self>;
    fn safe_div(self, rhs: Self) -> BulwarkResult<Self>;
}

macro_rules! checked_impl {
    ($t:ty) => {
        impl SafeMath for $t {
            #[track_caller]
            #[inline(always)]
            fn safe_add(self, v: $t) -> BulwarkResult<$t> {
                match self.checked_add(v) {
                    Some(result) => Ok(result),
                    None => Err(math_error("add", self, v)),
                }
            }

            #[track_caller]
            #[inline(always)]
            fn safe_sub(self, v: $t) -> BulwarkResult<$t> {
                match self.checked_sub(v) {
                    Some(result) => Ok(result),
                    None => Err(math_error("sub", self, v)),
                }
            }

            #[track_caller]
            #[inline(always)]
            fn safe_mul(self, v: $t) -> BulwarkResult<$t> {
                match self.checked_mul(v) {
                    Some(result) => Ok(result),
                    None => Err(math_error("mul", self, v)),
                }
            }

            #[track_caller]
            #[inline(always)]
            fn safe_div(self, v: $t) -> BulwarkResult<$t> {
                match self.checked_div(v) {
                    Some(result) => Ok(result),
                    None => Err(math_error("div", self, v)),
                }
            }
        }
    };
}

checked_impl!(U256);
checked_impl!(u128);
checked_impl!(u64);
checked_impl!(u16);

#[track_caller]
fn math_error(op: &str, lhs: impl std::fmt::Display, rhs: impl std::fmt::Display) -> BulwarkError {
    let location = std::panic::Location::caller();
    tracing::error!(
        "Math error thrown at {}:{} ({} {} {})",
        location.file(),
        location.line(),
        lhs,
        op,
        rhs
    );
    BulwarkError::Math(format!("{} {} {}", lhs, op, rhs))
}

/// `floor(a * b / denominator)` with a 256-bit intermediate product.
#[track_caller]
pub fn mul_div_down(a: u128, b: u128, denominator: u128) -> BulwarkResult<u128> {
    if denominator == 0 {
        return Err(math_error("mul_div_down by", a, 0u128));
    }
    let quotient = U256::from(a) * U256::from(b) / U256::from(denominator);
    to_u128(quotient)
}

/// `ceil(a * b / denominator)` with a 256-bit intermediate product.
#[track_caller]
pub fn mul_div_up(a: u128, b: u128, denominator: u128) -> BulwarkResult<u128> {
    if denominator == 0 {
        return Err(math_error("mul_div_up by", a, 0u128));
    }
    let d = U256::from(denominator);
    let product = U256::from(a) * U256::from(b);
    let quotient = (product + d - U256::one()) / d;
    to_u128(quotient)
}

/// `floor(a * b / WAD)`.
pub fn mul_wad_down(a: u128, b: u128) -> BulwarkResult<u128> {
    mul_div_down(a, b, WAD)
}

/// `floor(a * WAD / b)`.
pub fn div_wad_down(a: u128, b: u128) -> BulwarkResult<u128> {
    mul_div_down(a, WAD, b)
}

/// Narrow a 256-bit value, failing if it does not fit.
#[track_caller]
pub fn to_u128(v: U256) -> BulwarkResult<u128> {
    if v.bits() > 128 {
        return Err(math_error("narrow", v, "u128"));
    }
    Ok(v.low_u128())
}

/// Serde adapter storing a U256 as a decimal string.
pub mod u256_dec {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::U256;

    pub fn serialize<S: Serializer>(v: &U256, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(d)?;
        U256::from_dec_str(&raw)
            .map_err(|e| D::Error::custom(format!("invalid u256 {:?}: {:?}", raw, e)))
    }
}
