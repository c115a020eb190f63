//! Stateless per-step risk predicates.
//!
//! `spike_halt` is terminal for the run; `slippage_exceeded` only skips the
//! step it fires on. The engine owns that distinction, the predicates here
//! just answer yes or no.

use rust_decimal::Decimal;

/// True iff the current price has spiked above the run's anchor price.
///
/// `current > starting × (1 + max_spike)`.
pub fn spike_halt(current_price: Decimal, starting_price: Decimal, max_spike: Decimal) -> bool {
    current_price > starting_price * (Decimal::ONE + max_spike)
}

/// True iff the modeled fill deviates from the market beyond the bound.
///
/// `|execution − market| / market > max_slippage`.
pub fn slippage_exceeded(
    execution_price: Decimal,
    market_price: Decimal,
    max_slippage: Decimal,
) -> bool {
    if market_price == Decimal::ZERO {
        return true;
    }
    ((execution_price - market_price) / market_price).abs() > max_slippage
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_spike_halt_at_threshold() {
        // 111 > 100 × 1.1 trips; exactly 110 does not.
        assert!(spike_halt(dec!(111), dec!(100), dec!(0.1)));
        assert!(!spike_halt(dec!(110), dec!(100), dec!(0.1)));
        assert!(!spike_halt(dec!(95), dec!(100), dec!(0.1)));
    }

    #[test]
    fn test_slippage_bound() {
        // 2% bound: 102.5 vs 100 is out, 101.5 is in.
        assert!(slippage_exceeded(dec!(102.5), dec!(100), dec!(0.02)));
        assert!(!slippage_exceeded(dec!(101.5), dec!(100), dec!(0.02)));
    }

    #[test]
    fn test_slippage_is_symmetric() {
        assert!(slippage_exceeded(dec!(97), dec!(100), dec!(0.02)));
        assert!(!slippage_exceeded(dec!(98.5), dec!(100), dec!(0.02)));
    }

    #[test]
    fn test_slippage_exact_bound_is_allowed() {
        assert!(!slippage_exceeded(dec!(102), dec!(100), dec!(0.02)));
    }
}
