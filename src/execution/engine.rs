//! The stateful execution loop: gate, guard, quote, record.

use crate::config::{ExecutionParams, RiskLimits};
use crate::execution::guard;
use crate::execution::impact;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Engine lifecycle. `Halted` and `Completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStatus {
    Running,
    Halted,
    Completed,
}

/// One executed slice of the buy program. Append-only once recorded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub timestamp: DateTime<Utc>,
    pub shares: Decimal,
    pub price: Decimal,
    pub cost: Decimal,
}

/// What a single step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A record was appended to the ledger.
    Executed,
    /// Z-score above the buy threshold; nothing recorded.
    GateSkipped,
    /// Modeled fill violated the slippage bound; nothing recorded.
    SlippageSkipped,
    /// Price spike tripped the halt. Terminal.
    Halted,
    /// The engine had already reached a terminal state.
    Inactive,
}

/// Drives the buy program over the price series, one step per period.
///
/// Owns all mutable execution state: the remaining target, the anchor price
/// for the spike check, and the ledger.
pub struct ExecutionEngine {
    params: ExecutionParams,
    risk: RiskLimits,
    zscore_buy_threshold: f64,

    remaining_shares: Decimal,
    starting_price: Option<Decimal>,
    step_index: usize,
    status: EngineStatus,
    ledger: Vec<ExecutionRecord>,
}

impl ExecutionEngine {
    pub fn new(params: ExecutionParams, risk: RiskLimits, zscore_buy_threshold: f64) -> Self {
        let remaining_shares = params.target_shares;
        Self {
            params,
            risk,
            zscore_buy_threshold,
            remaining_shares,
            starting_price: None,
            step_index: 0,
            status: EngineStatus::Running,
            ledger: Vec::new(),
        }
    }

    /// Advance one trading period.
    ///
    /// Step order is load-bearing: the anchor is set first, the spike halt is
    /// evaluated before the gate and before the completion check, and the
    /// slippage bound only skips the single step it fires on.
    pub fn step(&mut self, timestamp: DateTime<Utc>, price: Decimal, zscore: f64) -> StepOutcome {
        if self.status != EngineStatus::Running {
            return StepOutcome::Inactive;
        }

        self.step_index += 1;

        // First observed price anchors the spike check for the whole run.
        let starting_price = *self.starting_price.get_or_insert(price);

        if guard::spike_halt(price, starting_price, self.risk.max_price_spike) {
            warn!(
                step = self.step_index,
                %price,
                %starting_price,
                "price spike halt triggered, stopping run"
            );
            self.status = EngineStatus::Halted;
            return StepOutcome::Halted;
        }

        if zscore > self.zscore_buy_threshold {
            return StepOutcome::GateSkipped;
        }

        let quote = impact::quote(self.remaining_shares, price, &self.params);

        if guard::slippage_exceeded(quote.price, price, self.risk.max_slippage) {
            debug!(
                step = self.step_index,
                execution_price = %quote.price,
                market_price = %price,
                "slippage bound exceeded, skipping step"
            );
            return StepOutcome::SlippageSkipped;
        }

        self.ledger.push(ExecutionRecord {
            timestamp,
            shares: quote.shares,
            price: quote.price,
            cost: quote.shares * quote.price,
        });
        self.remaining_shares -= quote.shares;

        debug!(
            step = self.step_index,
            shares = %quote.shares,
            price = %quote.price,
            remaining = %self.remaining_shares,
            "executed slice"
        );

        // The fractional step never reaches zero in exact arithmetic; the
        // <= 0 contract is what actually terminates the program.
        if self.remaining_shares <= Decimal::ZERO {
            self.status = EngineStatus::Completed;
        }

        StepOutcome::Executed
    }

    pub fn status(&self) -> EngineStatus {
        self.status
    }

    pub fn ledger(&self) -> &[ExecutionRecord] {
        &self.ledger
    }

    pub fn into_ledger(self) -> Vec<ExecutionRecord> {
        self.ledger
    }

    pub fn remaining_shares(&self) -> Decimal {
        self.remaining_shares
    }

    pub fn starting_price(&self) -> Option<Decimal> {
        self.starting_price
    }

    /// Number of steps this engine has processed (terminal step included).
    pub fn steps_processed(&self) -> usize {
        self.step_index
    }

    pub fn total_shares_executed(&self) -> Decimal {
        self.ledger.iter().map(|r| r.shares).sum()
    }

    pub fn total_cost(&self) -> Decimal {
        self.ledger.iter().map(|r| r.cost).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    // =========================================================================
    // Test Helpers
    // =========================================================================

    const BUY: f64 = -3.0;
    const FLAT: f64 = 0.0;

    fn ts(i: usize) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(i as i64)
    }

    fn engine(target: Decimal, gamma: Decimal) -> ExecutionEngine {
        let params = ExecutionParams {
            target_shares: target,
            execution_rate: dec!(0.9),
            permanent_impact: gamma,
            ..ExecutionParams::default()
        };
        ExecutionEngine::new(params, RiskLimits::default(), -2.0)
    }

    // =========================================================================
    // Geometric Drawdown
    // =========================================================================

    #[test]
    fn test_fixed_rate_drawdown_sequence() {
        let mut eng = engine(dec!(1000), Decimal::ZERO);

        assert_eq!(eng.step(ts(0), dec!(100), BUY), StepOutcome::Executed);
        assert_eq!(eng.ledger()[0].shares, dec!(900));
        assert_eq!(eng.ledger()[0].price, dec!(100));
        assert_eq!(eng.remaining_shares(), dec!(100));

        assert_eq!(eng.step(ts(1), dec!(100), BUY), StepOutcome::Executed);
        assert_eq!(eng.ledger()[1].shares, dec!(90));
        assert_eq!(eng.remaining_shares(), dec!(10));

        assert_eq!(eng.step(ts(2), dec!(100), BUY), StepOutcome::Executed);
        assert_eq!(eng.ledger()[2].shares, dec!(9));
        assert_eq!(eng.remaining_shares(), dec!(1));
    }

    #[test]
    fn test_run_to_completion_never_exceeds_target() {
        let mut eng = engine(dec!(1000), Decimal::ZERO);

        let mut i = 0;
        while eng.status() == EngineStatus::Running {
            eng.step(ts(i), dec!(100), BUY);
            i += 1;
            assert!(i < 500, "engine did not complete");
        }

        assert_eq!(eng.status(), EngineStatus::Completed);
        assert!(eng.total_shares_executed() <= dec!(1000));
        assert!(eng.remaining_shares() <= Decimal::ZERO);
    }

    #[test]
    fn test_cumulative_shares_non_decreasing() {
        let mut eng = engine(dec!(1000), Decimal::ZERO);
        for i in 0..20 {
            eng.step(ts(i), dec!(100), BUY);
        }

        let mut cumulative = Decimal::ZERO;
        let mut previous = Decimal::ZERO;
        for record in eng.ledger() {
            assert!(record.shares > Decimal::ZERO);
            cumulative += record.shares;
            assert!(cumulative >= previous);
            assert!(cumulative <= dec!(1000));
            previous = cumulative;
        }
    }

    // =========================================================================
    // Spike Halt
    // =========================================================================

    #[test]
    fn test_spike_halt_freezes_ledger() {
        let mut eng = engine(dec!(1000), Decimal::ZERO);

        eng.step(ts(0), dec!(100), BUY); // anchors at 100
        let len_before = eng.ledger().len();

        // 111 > 100 × 1.1
        assert_eq!(eng.step(ts(1), dec!(111), BUY), StepOutcome::Halted);
        assert_eq!(eng.status(), EngineStatus::Halted);
        assert_eq!(eng.ledger().len(), len_before);

        // Further steps are inert.
        assert_eq!(eng.step(ts(2), dec!(100), BUY), StepOutcome::Inactive);
        assert_eq!(eng.ledger().len(), len_before);
    }

    #[test]
    fn test_spike_checked_before_gate() {
        let mut eng = engine(dec!(1000), Decimal::ZERO);
        eng.step(ts(0), dec!(100), FLAT); // anchor set on a gate-skipped step

        // Even with no buy signal, the spike halts first.
        assert_eq!(eng.step(ts(1), dec!(120), FLAT), StepOutcome::Halted);
    }

    #[test]
    fn test_anchor_is_first_observed_price() {
        let mut eng = engine(dec!(1000), Decimal::ZERO);

        eng.step(ts(0), dec!(100), FLAT);
        assert_eq!(eng.starting_price(), Some(dec!(100)));

        // Anchor does not move with later prices.
        eng.step(ts(1), dec!(105), FLAT);
        assert_eq!(eng.starting_price(), Some(dec!(100)));
    }

    #[test]
    fn test_exact_spike_boundary_does_not_halt() {
        let mut eng = engine(dec!(1000), Decimal::ZERO);
        eng.step(ts(0), dec!(100), FLAT);

        assert_ne!(eng.step(ts(1), dec!(110), FLAT), StepOutcome::Halted);
    }

    // =========================================================================
    // Z-Score Gate
    // =========================================================================

    #[test]
    fn test_gate_skip_leaves_engine_running() {
        let mut eng = engine(dec!(1000), Decimal::ZERO);

        assert_eq!(eng.step(ts(0), dec!(100), FLAT), StepOutcome::GateSkipped);
        assert_eq!(eng.status(), EngineStatus::Running);
        assert!(eng.ledger().is_empty());
        assert_eq!(eng.remaining_shares(), dec!(1000));
    }

    #[test]
    fn test_gate_threshold_is_inclusive() {
        let mut eng = engine(dec!(1000), Decimal::ZERO);
        assert_eq!(eng.step(ts(0), dec!(100), -2.0), StepOutcome::Executed);
    }

    // =========================================================================
    // Slippage Skip
    // =========================================================================

    #[test]
    fn test_slippage_skip_is_not_terminal() {
        // gamma 0.0001 × 90000 shares = 9.00 of impact on a 100 price: 9% > 2%.
        let mut eng = engine(dec!(100000), dec!(0.0001));

        assert_eq!(eng.step(ts(0), dec!(100), BUY), StepOutcome::SlippageSkipped);
        assert_eq!(eng.status(), EngineStatus::Running);
        assert!(eng.ledger().is_empty());
        assert_eq!(eng.remaining_shares(), dec!(100000));
    }

    #[test]
    fn test_slippage_skip_then_execute_at_higher_price() {
        // Same remainder, higher price: the same absolute impact is within
        // the relative bound. Spike limit widened so only slippage is in play.
        let params = ExecutionParams {
            target_shares: dec!(100000),
            execution_rate: dec!(0.9),
            permanent_impact: dec!(0.0001),
            ..ExecutionParams::default()
        };
        let risk = RiskLimits {
            max_price_spike: dec!(10),
            ..RiskLimits::default()
        };
        let mut eng = ExecutionEngine::new(params, risk, -2.0);

        assert_eq!(eng.step(ts(0), dec!(100), BUY), StepOutcome::SlippageSkipped);
        assert_eq!(eng.step(ts(1), dec!(500), BUY), StepOutcome::Executed);
        assert_eq!(eng.ledger()[0].shares, dec!(90000));
        assert_eq!(eng.ledger()[0].price, dec!(509));
    }

    // =========================================================================
    // Terminal Behavior
    // =========================================================================

    #[test]
    fn test_no_records_after_completion() {
        let mut eng = engine(dec!(1000), Decimal::ZERO);

        let mut i = 0;
        while eng.status() == EngineStatus::Running {
            eng.step(ts(i), dec!(100), BUY);
            i += 1;
            assert!(i < 500);
        }
        let final_len = eng.ledger().len();

        assert_eq!(eng.step(ts(i), dec!(100), BUY), StepOutcome::Inactive);
        assert_eq!(eng.ledger().len(), final_len);
    }

    #[test]
    fn test_cost_is_shares_times_price() {
        let mut eng = engine(dec!(1000), Decimal::ZERO);
        eng.step(ts(0), dec!(100), BUY);

        let record = eng.ledger()[0];
        assert_eq!(record.cost, record.shares * record.price);
        assert_eq!(record.cost, dec!(90000));
    }

    #[test]
    fn test_ledger_is_chronological() {
        let mut eng = engine(dec!(1000), Decimal::ZERO);
        for i in 0..5 {
            eng.step(ts(i), dec!(100), BUY);
        }

        for pair in eng.ledger().windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }
}
