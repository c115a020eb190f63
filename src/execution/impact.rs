//! Almgren-Chriss style price-impact execution model.

use crate::config::ExecutionParams;
use rust_decimal::Decimal;

/// A modeled fill: how much to execute and at what price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub shares: Decimal,
    pub price: Decimal,
}

/// Quote the next slice of a buy program.
///
/// `shares = remaining × execution_rate`, a fixed fractional drawdown per
/// step, and `price = market + gamma × shares`: linear permanent impact,
/// always adding cost on a buy. The temporary coefficient (eta) contributes
/// only when `apply_temporary_impact` is set; the reference formula leaves
/// it out. Pure: no state, no side effects.
pub fn quote(remaining_shares: Decimal, market_price: Decimal, params: &ExecutionParams) -> Quote {
    let shares = remaining_shares * params.execution_rate;

    let mut price = market_price + params.permanent_impact * shares;
    if params.apply_temporary_impact {
        price += params.temporary_impact * shares;
    }

    Quote { shares, price }
}
