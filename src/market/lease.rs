//! Per-symbol trade lease
//!
//! At most one order may be in flight per symbol. After the order resolves the
//! lease stays held for a cooldown window, which also covers the balance
//! refresh that follows a fill.

use std::time::Duration;
use tokio::time::Instant;

/// Lease state for a single symbol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TradeLease {
    /// No order in flight, no cooldown
    #[default]
    Free,
    /// An order is being submitted
    InFlight { since: Instant },
    /// Order resolved; held until `until`
    CoolingDown { until: Instant },
}

impl TradeLease {
    /// Whether a new trade would be refused at `now`
    pub fn is_held(&self, now: Instant) -> bool {
        match self {
            TradeLease::Free => false,
            TradeLease::InFlight { .. } => true,
            TradeLease::CoolingDown { until } => now < *until,
        }
    }

    /// Take the lease if it is free or its cooldown has passed
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if self.is_held(now) {
            return false;
        }
        *self = TradeLease::InFlight { since: now };
        true
    }

    /// End the in-flight phase and start the cooldown
    pub fn release(&mut self, now: Instant, cooldown: Duration) {
        *self = TradeLease::CoolingDown {
            until: now + cooldown,
        };
    }

    /// When the lease becomes free again, if it is cooling down
    pub fn expires_at(&self) -> Option<Instant> {
        match self {
            TradeLease::CoolingDown { until } => Some(*until),
            _ => None,
        }
    }
}
