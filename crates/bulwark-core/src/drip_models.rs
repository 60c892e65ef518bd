// crates/bulwark-core/src/drip_models.rs
//
// Reference drip models. All factors are WAD-scaled and never exceed WAD.
//
//   - ConstantDripModel:    same factor for any non-zero elapsed time
//   - ExponentialDripModel: 1 - (1 - r)^t, r a per-second WAD rate
//   - LinearDripModel:      fixed amount per second, capped at the pool

use crate::identity::Address;
use crate::math::{mul_div_down, WAD};
use crate::traits::DripModel;

/// Drips a fixed fraction of the pool on every drip with elapsed > 0.
#[derive(Debug, Clone)]
pub struct ConstantDripModel {
    id: Address,
    factor: u128,
}

impl ConstantDripModel {
    pub fn new(id: Address, factor: u128) -> Self {
        Self { id, factor }
    }
}

impl DripModel for ConstantDripModel {
    fn id(&self) -> Address {
        self.id
    }

    fn drip_factor(&self, _pool_amount: u128, elapsed_seconds: u64) -> u128 {
        if elapsed_seconds == 0 {
            return 0;
        }
        self.factor
    }
}

/// Continuous exponential decay at a per-second rate.
#[derive(Debug, Clone)]
pub struct ExponentialDripModel {
    id: Address,
    rate_per_second: u128,
}

impl ExponentialDripModel {
    /// `rate_per_second` is WAD-scaled and clamped to WAD.
    pub fn new(id: Address, rate_per_second: u128) -> Self {
        Self {
            id,
            rate_per_second: rate_per_second.min(WAD),
        }
    }
}

impl DripModel for ExponentialDripModel {
    fn id(&self) -> Address {
        self.id
    }

    fn drip_factor(&self, _pool_amount: u128, elapsed_seconds: u64) -> u128 {
        if elapsed_seconds == 0 {
            return 0;
        }
        WAD - wad_pow(WAD - self.rate_per_second, elapsed_seconds)
    }
}

/// Drips a fixed asset amount per second until the pool is empty.
#[derive(Debug, Clone)]
pub struct LinearDripModel {
    id: Address,
    amount_per_second: u128,
}

impl LinearDripModel {
    pub fn new(id: Address, amount_per_second: u128) -> Self {
        Self {
            id,
            amount_per_second,
        }
    }
}

impl DripModel for LinearDripModel {
    fn id(&self) -> Address {
        self.id
    }

    fn drip_factor(&self, pool_amount: u128, elapsed_seconds: u64) -> u128 {
        if pool_amount == 0 || elapsed_seconds == 0 {
            return 0;
        }
        let dripped = self.amount_per_second.saturating_mul(elapsed_seconds as u128);
        if dripped >= pool_amount {
            return WAD;
        }
        mul_div_down(dripped, WAD, pool_amount).unwrap_or(WAD)
    }
}

/// `base^exp` for a WAD-scaled `base <= WAD`, by squaring, rounding down.
fn wad_pow(mut base: u128, mut exp: u64) -> u128 {
    let mut result = WAD;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result * base / WAD;
        }
        base = base * base / WAD;
        exp >>= 1;
    }
    result
}
