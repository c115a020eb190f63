//! Stochastic market-making inventory process.
//!
//! Runs alongside the execution engine on the same time axis but with fully
//! independent state: a signed inventory bounded by a hard limit, and its own
//! trade ledger. Randomness is injected so runs are reproducible; the core
//! never reads ambient entropy.

use crate::config::MarketMakerParams;
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Trade direction of an accepted market-making fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// An accepted market-making trade.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarketMakingRecord {
    pub timestamp: DateTime<Utc>,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
}

/// The inventory process. Owns its signed inventory and ledger; the RNG is
/// injected by the caller (seeded for reproducibility).
pub struct MarketMaker<R: Rng> {
    params: MarketMakerParams,
    rng: R,
    inventory: Decimal,
    ledger: Vec<MarketMakingRecord>,
}

impl<R: Rng> MarketMaker<R> {
    pub fn new(params: MarketMakerParams, rng: R) -> Self {
        Self {
            params,
            rng,
            inventory: Decimal::ZERO,
            ledger: Vec::new(),
        }
    }

    /// Advance one trading period.
    ///
    /// Draws a side and a size, quotes around the market price, and applies
    /// the trade only if the post-trade inventory stays within the hard
    /// bound. Rejected steps leave no record and no state change.
    pub fn step(&mut self, timestamp: DateTime<Utc>, price: Decimal) -> Option<&MarketMakingRecord> {
        let side = if self.rng.gen_bool(self.params.buy_probability) {
            Side::Buy
        } else {
            Side::Sell
        };

        let size_min = self.params.size_min.to_f64().unwrap_or(0.0);
        let size_max = self.params.size_max.to_f64().unwrap_or(0.0);
        let size = Decimal::from_f64(self.rng.gen_range(size_min..size_max))
            .unwrap_or(self.params.size_min)
            .round_dp(4);

        let (quote_price, next_inventory) = match side {
            Side::Buy => (
                price * (Decimal::ONE - self.params.spread_threshold),
                self.inventory + size,
            ),
            Side::Sell => (
                price * (Decimal::ONE + self.params.spread_threshold),
                self.inventory - size,
            ),
        };

        if next_inventory.abs() > self.params.inventory_limit {
            debug!(
                %side,
                %size,
                inventory = %self.inventory,
                limit = %self.params.inventory_limit,
                "trade would breach inventory bound, skipping"
            );
            return None;
        }

        self.inventory = next_inventory;
        self.ledger.push(MarketMakingRecord {
            timestamp,
            side,
            price: quote_price,
            size,
        });
        self.ledger.last()
    }

    /// Current signed inventory.
    pub fn inventory(&self) -> Decimal {
        self.inventory
    }

    pub fn ledger(&self) -> &[MarketMakingRecord] {
        &self.ledger
    }

    pub fn into_ledger(self) -> Vec<MarketMakingRecord> {
        self.ledger
    }
}
