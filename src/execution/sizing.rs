//! Order sizing and limit pricing

use crate::exchange::OrderSide;
use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places of order volume
pub const VOLUME_DECIMALS: u32 = 8;

/// Volume for a buy funded by an even share of the free quote balance.
///
/// The quote balance is split across `flat_symbols` (at least one), then
/// converted at `price` and truncated to [`VOLUME_DECIMALS`]. `None` when
/// the conversion overflows.
pub fn buy_volume(
    quote_available: Decimal,
    flat_symbols: usize,
    price: Decimal,
) -> Option<Decimal> {
    if price <= Decimal::ZERO || quote_available <= Decimal::ZERO {
        return Some(Decimal::ZERO);
    }
    let share = quote_available.checked_div(Decimal::from(flat_symbols.max(1) as u64))?;
    let volume = share.checked_div(price)?;
    Some(volume.round_dp_with_strategy(VOLUME_DECIMALS, RoundingStrategy::ToZero))
}

/// Limit price with the slippage buffer applied: above `price` for buys,
/// below it for sells, rounded to `decimals`.
pub fn limit_price(
    side: OrderSide,
    price: Decimal,
    slippage: Decimal,
    decimals: u32,
) -> Option<Decimal> {
    let factor = match side {
        OrderSide::Buy => Decimal::ONE.checked_add(slippage)?,
        OrderSide::Sell => Decimal::ONE.checked_sub(slippage)?,
    };
    let limit = price.checked_mul(factor)?;
    Some(limit.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero))
}
