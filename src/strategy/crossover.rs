//! EMA crossover rule

use crate::exchange::OrderSide;
use crate::market::EmaPair;

/// Side to trade for the current indicator state, if any.
///
/// Buy when flat and the fast EMA has just moved above the slow one. Sell
/// when holding, the fast EMA is not above the slow one, and it was not below
/// it on the previous refresh.
pub fn crossover_signal(ema: &EmaPair, holding: bool) -> Option<OrderSide> {
    let above_now = ema.fast > ema.slow;
    let was_below = ema.prev_fast < ema.prev_slow;

    // TODO: confirm the sell condition with product; a strict bearish cross
    // would require prev_fast > prev_slow
    match (holding, above_now, was_below) {
        (false, true, true) => Some(OrderSide::Buy),
        (true, false, false) => Some(OrderSide::Sell),
        _ => None,
    }
}
