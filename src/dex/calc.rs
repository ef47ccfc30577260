//! Constant-product swap sizing with integer truncation.

use bigdecimal::BigDecimal;
use num_bigint::{BigInt, BigUint};
use num_traits::Zero;
use std::str::FromStr;

/// Fee denominator: fees are expressed in basis points of 10,000.
pub const FEE_DIVISOR: u32 = 10_000;

/// Output of swapping `amount_in` through a pool holding `balance_in` / `balance_out`,
/// with `fee_bps` taken from the input side.
///
/// `amount_in * (10000 - fee) * balance_out / (10000 * balance_in + amount_in * (10000 - fee))`,
/// truncated. Returns zero when the pool cannot quote (fee ≥ 100%, empty pool).
pub fn swap_output(
    amount_in: &BigUint,
    balance_in: &BigUint,
    balance_out: &BigUint,
    fee_bps: u32,
) -> BigUint {
    if fee_bps >= FEE_DIVISOR {
        return BigUint::zero();
    }
    let amount_with_fee = amount_in * BigUint::from(FEE_DIVISOR - fee_bps);
    let denominator = balance_in * BigUint::from(FEE_DIVISOR) + &amount_with_fee;
    if denominator.is_zero() {
        return BigUint::zero();
    }
    amount_with_fee * balance_out / denominator
}

/// [`swap_output`] over the decimal strings the indexer publishes.
///
/// Any unparsable operand yields zero, which callers read as "do not execute".
pub fn get_token_flow_ratio(amount_in: &str, balance_in: &str, balance_out: &str, fee_bps: u32) -> BigUint {
    match (
        parse_amount(amount_in),
        parse_amount(balance_in),
        parse_amount(balance_out),
    ) {
        (Some(a), Some(bi), Some(bo)) => swap_output(&a, &bi, &bo, fee_bps),
        _ => BigUint::zero(),
    }
}

pub fn parse_amount(raw: &str) -> Option<BigUint> {
    BigUint::from_str(raw.trim()).ok()
}

/// Exact decimal product of an integer amount and a factor such as `0.997`.
pub fn decimal_mult(amount: &BigUint, factor: &BigDecimal) -> BigDecimal {
    BigDecimal::new(BigInt::from(amount.clone()), 0) * factor
}

/// Minimum acceptable output: `amount * slippage`, truncated toward zero.
pub fn min_amount_out(amount: &BigUint, slippage: &BigDecimal) -> BigUint {
    let (int, _) = decimal_mult(amount, slippage)
        .with_scale(0)
        .into_bigint_and_exponent();
    int.to_biguint().unwrap_or_default()
}
