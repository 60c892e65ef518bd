// crates/bulwark-module/src/conversion.rs
//
// Share/asset conversion between receipt tokens and pool amounts.
//
// Both directions round down, in favor of the pool: presenting the output
// of one conversion to the other never returns more than was put in.

use bulwark_core::math::{mul_div_down, BulwarkResult};
use bulwark_core::BulwarkError;

/// Extra decimals receipt tokens carry over their underlying asset.
///
/// The first deposit into an empty pool mints `asset_amount * 10^offset`
/// receipt tokens.
pub const RECEIPT_DECIMALS_OFFSET: u32 = 0;

/// Receipt tokens minted for `asset_amount` deposited into a pool holding
/// `pool_amount` against `receipt_supply` outstanding receipt tokens.
///
/// # Errors
/// `BulwarkError::InvalidState` when the pool is empty but receipt tokens
/// are still outstanding; depositors retire those before pricing.
pub fn to_receipt_amount(
    asset_amount: u128,
    receipt_supply: u128,
    pool_amount: u128,
) -> BulwarkResult<u128> {
    if receipt_supply == 0 {
        return asset_amount
            .checked_mul(10u128.pow(RECEIPT_DECIMALS_OFFSET))
            .ok_or_else(|| BulwarkError::Math("bootstrap receipt amount overflow".to_string()));
    }
    if pool_amount == 0 {
        return Err(BulwarkError::InvalidState(format!(
            "pool is empty with {} receipt tokens outstanding",
            receipt_supply
        )));
    }
    mul_div_down(asset_amount, receipt_supply, pool_amount)
}

/// Assets redeemable for `receipt_amount` receipt tokens.
///
/// Returns 0 when no receipt tokens exist.
pub fn to_asset_amount(
    receipt_amount: u128,
    receipt_supply: u128,
    pool_amount: u128,
) -> BulwarkResult<u128> {
    if receipt_supply == 0 {
        return Ok(0);
    }
    mul_div_down(receipt_amount, pool_amount, receipt_supply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_mint() {
        let scale = 10u128.pow(RECEIPT_DECIMALS_OFFSET);
        assert_eq!(to_receipt_amount(500, 0, 0).unwrap(), 500 * scale);
        assert_eq!(to_receipt_amount(500, 0, 12_345).unwrap(), 500 * scale);
    }

    #[test]
    fn test_empty_supply_redeems_nothing() {
        assert_eq!(to_asset_amount(1_000, 0, 50_000).unwrap(), 0);
    }

    #[test]
    fn test_proportional_conversion() {
        // 1,000 shares backed by 2,000 assets.
        assert_eq!(to_receipt_amount(100, 1_000, 2_000).unwrap(), 50);
        assert_eq!(to_asset_amount(50, 1_000, 2_000).unwrap(), 100);
    }

    #[test]
    fn test_rounds_down_in_favor_of_pool() {
        // 3 shares backed by 10 assets: 1 share is worth 3.33 assets.
        assert_eq!(to_asset_amount(1, 3, 10).unwrap(), 3);
        // 1 asset buys 0.3 shares.
        assert_eq!(to_receipt_amount(1, 3, 10).unwrap(), 0);
    }

    #[test]
    fn test_empty_pool_with_supply_is_invalid() {
        assert!(matches!(
            to_receipt_amount(1, 10, 0),
            Err(BulwarkError::InvalidState(_))
        ));
        assert_eq!(to_asset_amount(10, 10, 0).unwrap(), 0);
    }
}
