//! Exponential moving average
//!
//! Seeded with the simple average of the first `period` closes, then
//! smoothed with `k = 2 / (period + 1)` over the remaining closes.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept on a computed EMA
pub const EMA_DECIMALS: u32 = 4;

/// EMA of `prices` (oldest first), or `None` with fewer than `period` prices
pub fn calculate_ema(prices: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let n = Decimal::from(period as u64);
    let seed = prices[..period].iter().sum::<Decimal>() / n;

    let k = Decimal::TWO / (n + Decimal::ONE);
    let keep = Decimal::ONE - k;
    let ema = prices[period..]
        .iter()
        .fold(seed, |ema, price| *price * k + ema * keep);

    Some(ema.round_dp_with_strategy(EMA_DECIMALS, RoundingStrategy::MidpointAwayFromZero))
}
