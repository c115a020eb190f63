//! Simulation driver: one pass over the aligned series, advancing the
//! execution engine and the market maker together, one step per period.
//!
//! The signal leg is computed once up front. The cointegration test is
//! advisory only: its outcome is logged but never gates the execution loop.

use crate::config::Config;
use crate::data::{align, AlignedSeries, PriceSeries};
use crate::errors::SimError;
use crate::execution::{EngineStatus, ExecutionEngine, ExecutionRecord, StepOutcome};
use crate::market_maker::{MarketMaker, MarketMakingRecord};
use crate::signal::{self, CointegrationTest, ZScoreSeries};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Why the simulation loop ended. Exactly one of these per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The spike halt tripped at this step; both ledgers froze before it.
    SpikeHalted { step: usize },
    /// The buy program finished at this step.
    TargetReached { step: usize },
    /// The price series ran out before the program finished.
    SeriesExhausted,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::SpikeHalted { step } => write!(f, "price spike halt at step {step}"),
            StopReason::TargetReached { step } => write!(f, "target reached at step {step}"),
            StopReason::SeriesExhausted => write!(f, "price series exhausted"),
        }
    }
}

/// Derived summary statistics over the execution ledger.
///
/// All fields are zero when the run produced no executions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total_shares: Decimal,
    pub total_cost: Decimal,
    pub avg_execution_price: Decimal,
    /// Mean market price over the executed window (first through last
    /// execution record, inclusive).
    pub market_avg_price: Decimal,
    /// avg_execution_price − market_avg_price
    pub implementation_shortfall: Decimal,
}

/// Everything a run produces, handed to reporting as read-only input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub execution_ledger: Vec<ExecutionRecord>,
    pub market_making_ledger: Vec<MarketMakingRecord>,
    pub stop_reason: StopReason,
    /// Steps fully processed (both loops advanced).
    pub steps_processed: usize,
    /// Advisory cointegration outcome; `None` when the test itself failed.
    pub cointegration: Option<CointegrationTest>,
    pub final_inventory: Decimal,
    pub summary: ExecutionSummary,
}

impl SimulationResult {
    /// Export the execution ledger to CSV.
    pub fn executions_to_csv(&self, path: &str) -> Result<()> {
        use std::io::Write;
        let mut file = std::fs::File::create(path)?;
        writeln!(file, "timestamp,shares,price,cost")?;

        for record in &self.execution_ledger {
            writeln!(
                file,
                "{},{},{},{}",
                record.timestamp.to_rfc3339(),
                record.shares,
                record.price,
                record.cost,
            )?;
        }

        Ok(())
    }

    /// Export the market-making ledger to CSV.
    pub fn market_making_to_csv(&self, path: &str) -> Result<()> {
        use std::io::Write;
        let mut file = std::fs::File::create(path)?;
        writeln!(file, "timestamp,side,price,size")?;

        for record in &self.market_making_ledger {
            writeln!(
                file,
                "{},{},{},{}",
                record.timestamp.to_rfc3339(),
                record.side,
                record.price,
                record.size,
            )?;
        }

        Ok(())
    }

    /// Export the full result as JSON.
    pub fn to_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self).context("Failed to serialize result")
    }

    /// Get a summary string.
    pub fn summary(&self) -> String {
        let cointegration = match &self.cointegration {
            Some(test) if test.is_cointegrated => {
                format!("cointegrated (p = {:.3})", test.p_value)
            }
            Some(test) => format!("NOT cointegrated (p = {:.3})", test.p_value),
            None => "test failed (advisory only)".to_string(),
        };

        format!(
            r#"═══════════════════════════════════════════════
EXECUTION SIMULATION ({} steps)
═══════════════════════════════════════════════
SIGNAL
  Spread:            {}

EXECUTION
  Executions:        {}
  Shares Bought:     {:.4}
  Total Cost:        {:.2}
  Avg Exec Price:    {:.4}
  Market Avg Price:  {:.4}
  Impl Shortfall:    {:.4}

MARKET MAKING
  Trades:            {}
  Final Inventory:   {:.4}

STOP: {}
═══════════════════════════════════════════════"#,
            self.steps_processed,
            cointegration,
            self.execution_ledger.len(),
            self.summary.total_shares,
            self.summary.total_cost,
            self.summary.avg_execution_price,
            self.summary.market_avg_price,
            self.summary.implementation_shortfall,
            self.market_making_ledger.len(),
            self.final_inventory,
            self.stop_reason,
        )
    }
}

/// A stepwise simulation in progress.
///
/// `Simulator::run` drains it in one pass; the CLI's live-replay mode drives
/// it one step at a time with wall-clock spacing in between. The core never
/// sleeps or blocks on its own.
pub struct SimulationSession<R: Rng> {
    aligned: AlignedSeries,
    zscores: ZScoreSeries,
    cointegration: Option<CointegrationTest>,
    engine: ExecutionEngine,
    market_maker: MarketMaker<R>,
    index: usize,
    stop: Option<StopReason>,
}

/// What one fully processed step did.
#[derive(Debug, Clone, Copy)]
pub struct StepEvent {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub outcome: StepOutcome,
}

impl<R: Rng> SimulationSession<R> {
    /// Align the inputs, compute the signal leg, and run the advisory
    /// cointegration test.
    ///
    /// Misaligned series and a degenerate or too-short spread (for the
    /// z-score) fail here, before any step runs. A cointegration test
    /// failure is logged and the session proceeds without it.
    pub fn new(
        config: &Config,
        asset: &PriceSeries,
        benchmark: &PriceSeries,
        rng: R,
    ) -> Result<Self, SimError> {
        let aligned = align(asset, benchmark)?;
        let zscores = signal::compute_zscore(&aligned)?;

        let cointegration = match signal::compute_cointegration(
            &aligned,
            config.signal.p_value_threshold,
            config.signal.min_observations,
        ) {
            Ok(test) => {
                if test.is_cointegrated {
                    info!(
                        p_value = test.p_value,
                        t_stat = test.t_stat,
                        "spread is cointegrated"
                    );
                } else {
                    warn!(
                        p_value = test.p_value,
                        threshold = config.signal.p_value_threshold,
                        "spread is NOT cointegrated, proceeding anyway"
                    );
                }
                Some(test)
            }
            Err(e) => {
                warn!(error = %e, "cointegration test failed, proceeding without it");
                None
            }
        };

        let engine = ExecutionEngine::new(
            config.execution.clone(),
            config.risk.clone(),
            config.signal.zscore_buy_threshold,
        );
        let market_maker = MarketMaker::new(config.market_maker.clone(), rng);

        Ok(Self {
            aligned,
            zscores,
            cointegration,
            engine,
            market_maker,
            index: 0,
            stop: None,
        })
    }

    /// Advance one trading period; `None` once the run is over.
    ///
    /// The engine steps first. A spike halt ends the run before the market
    /// maker advances, so both ledgers freeze at the pre-halt step; target
    /// completion ends the run after the market maker's step at that index.
    pub fn step_next(&mut self) -> Option<StepEvent> {
        if self.stop.is_some() || self.index >= self.aligned.len() {
            return None;
        }

        let i = self.index;
        let timestamp = self.aligned.timestamps[i];
        let price = self.aligned.asset[i];
        let zscore = self.zscores.points()[i].zscore;

        let outcome = self.engine.step(timestamp, price, zscore);

        if outcome == StepOutcome::Halted {
            self.stop = Some(StopReason::SpikeHalted { step: i });
            return Some(StepEvent {
                index: i,
                timestamp,
                outcome,
            });
        }

        self.market_maker.step(timestamp, price);
        self.index = i + 1;

        if self.engine.status() == EngineStatus::Completed {
            self.stop = Some(StopReason::TargetReached { step: i });
        }

        if self.index % 100 == 0 {
            debug!(
                step = self.index,
                total = self.aligned.len(),
                remaining = %self.engine.remaining_shares(),
                "simulation progress"
            );
        }

        Some(StepEvent {
            index: i,
            timestamp,
            outcome,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.stop.is_some() || self.index >= self.aligned.len()
    }

    /// Total steps the session will process at most.
    pub fn total_steps(&self) -> usize {
        self.aligned.len()
    }

    /// Seal the session into a result.
    pub fn finish(self) -> SimulationResult {
        let stop_reason = self.stop.unwrap_or(StopReason::SeriesExhausted);
        let summary = summarize(self.engine.ledger(), &self.aligned);

        SimulationResult {
            steps_processed: self.index,
            stop_reason,
            cointegration: self.cointegration,
            final_inventory: self.market_maker.inventory(),
            summary,
            execution_ledger: self.engine.into_ledger(),
            market_making_ledger: self.market_maker.into_ledger(),
        }
    }
}

/// The simulation entry point: configuration plus a single `run` call.
pub struct Simulator {
    config: Config,
}

impl Simulator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run a full simulation with a seeded RNG for the market maker.
    pub fn run(
        &self,
        asset: &PriceSeries,
        benchmark: &PriceSeries,
        seed: u64,
    ) -> Result<SimulationResult, SimError> {
        self.run_with_rng(asset, benchmark, StdRng::seed_from_u64(seed))
    }

    /// Run a full simulation with a caller-supplied RNG.
    pub fn run_with_rng<R: Rng>(
        &self,
        asset: &PriceSeries,
        benchmark: &PriceSeries,
        rng: R,
    ) -> Result<SimulationResult, SimError> {
        let mut session = SimulationSession::new(&self.config, asset, benchmark, rng)?;

        info!(
            steps = session.total_steps(),
            target = %self.config.execution.target_shares,
            "starting simulation"
        );

        while session.step_next().is_some() {}

        let result = session.finish();
        info!(
            stop = %result.stop_reason,
            executions = result.execution_ledger.len(),
            shares = %result.summary.total_shares,
            "simulation complete"
        );

        Ok(result)
    }
}

/// Compute summary statistics over the execution ledger.
///
/// The market average is taken over the executed window: every aligned step
/// from the first execution record's timestamp through the last one's.
fn summarize(ledger: &[ExecutionRecord], aligned: &AlignedSeries) -> ExecutionSummary {
    let total_shares: Decimal = ledger.iter().map(|r| r.shares).sum();
    let total_cost: Decimal = ledger.iter().map(|r| r.cost).sum();

    if ledger.is_empty() || total_shares == Decimal::ZERO {
        return ExecutionSummary {
            total_shares,
            total_cost,
            avg_execution_price: Decimal::ZERO,
            market_avg_price: Decimal::ZERO,
            implementation_shortfall: Decimal::ZERO,
        };
    }

    let avg_execution_price = total_cost / total_shares;

    let first = ledger[0].timestamp;
    let last = ledger[ledger.len() - 1].timestamp;
    let window: Vec<Decimal> = aligned
        .timestamps
        .iter()
        .zip(aligned.asset.iter())
        .filter(|(ts, _)| **ts >= first && **ts <= last)
        .map(|(_, price)| *price)
        .collect();

    let market_avg_price = if window.is_empty() {
        Decimal::ZERO
    } else {
        window.iter().sum::<Decimal>() / Decimal::from(window.len())
    };

    ExecutionSummary {
        total_shares,
        total_cost,
        avg_execution_price,
        market_avg_price,
        implementation_shortfall: avg_execution_price - market_avg_price,
    }
}
