//! Configuration management for the execution simulator.
//!
//! Loads settings from environment variables and config files. All defaults
//! reproduce the reference behavior of the simulator.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main simulator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Execution program parameters (target size, impact model)
    #[serde(default)]
    pub execution: ExecutionParams,
    /// Per-step risk limits
    #[serde(default)]
    pub risk: RiskLimits,
    /// Spread signal parameters
    #[serde(default)]
    pub signal: SignalParams,
    /// Market-making inventory process parameters
    #[serde(default)]
    pub market_maker: MarketMakerParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionParams {
    /// Initial target quantity to acquire (X0)
    #[serde(default = "default_target_shares")]
    pub target_shares: Decimal,
    /// Fraction of the remaining target executed per step (0-1)
    #[serde(default = "default_execution_rate")]
    pub execution_rate: Decimal,
    /// Temporary impact coefficient (eta). Accepted but inert in the
    /// reference price formula; applied only when `apply_temporary_impact`.
    #[serde(default = "default_temporary_impact")]
    pub temporary_impact: Decimal,
    /// Permanent impact coefficient (gamma)
    #[serde(default = "default_permanent_impact")]
    pub permanent_impact: Decimal,
    /// Opt-in for the temporary impact term in the execution price
    #[serde(default)]
    pub apply_temporary_impact: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Maximum |execution − market| / market before a step is skipped (0-1)
    #[serde(default = "default_max_slippage")]
    pub max_slippage: Decimal,
    /// Price rise above the run's starting price that halts the run (0-1)
    #[serde(default = "default_max_price_spike")]
    pub max_price_spike: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalParams {
    /// Z-score at or below which a step may execute (buy signal)
    #[serde(default = "default_zscore_buy_threshold")]
    pub zscore_buy_threshold: f64,
    /// Significance threshold for the cointegration decision.
    /// Deliberately looser than the conventional 0.05.
    #[serde(default = "default_p_value_threshold")]
    pub p_value_threshold: f64,
    /// Minimum observations for the stationarity test
    #[serde(default = "default_min_observations")]
    pub min_observations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketMakerParams {
    /// Half-spread applied around the market price (0-1).
    /// The default 10% is a deliberately wide illustrative spread.
    #[serde(default = "default_spread_threshold")]
    pub spread_threshold: Decimal,
    /// Hard bound on signed inventory
    #[serde(default = "default_inventory_limit")]
    pub inventory_limit: Decimal,
    /// Probability a step draws a buy (the rest are sells)
    #[serde(default = "default_buy_probability")]
    pub buy_probability: f64,
    /// Lower bound of the uniform size draw (inclusive)
    #[serde(default = "default_size_min")]
    pub size_min: Decimal,
    /// Upper bound of the uniform size draw (exclusive)
    #[serde(default = "default_size_max")]
    pub size_max: Decimal,
}

// Default value functions

fn default_target_shares() -> Decimal {
    Decimal::new(100_000, 0)
}

fn default_execution_rate() -> Decimal {
    Decimal::new(9, 1) // 0.9
}

fn default_temporary_impact() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

fn default_permanent_impact() -> Decimal {
    Decimal::new(1, 4) // 0.0001
}

fn default_max_slippage() -> Decimal {
    Decimal::new(2, 2) // 0.02
}

fn default_max_price_spike() -> Decimal {
    Decimal::new(1, 1) // 0.10
}

fn default_zscore_buy_threshold() -> f64 {
    -2.0
}

fn default_p_value_threshold() -> f64 {
    0.2
}

fn default_min_observations() -> usize {
    20
}

fn default_spread_threshold() -> Decimal {
    Decimal::new(1, 1) // 0.10
}

fn default_inventory_limit() -> Decimal {
    Decimal::new(5000, 0)
}

fn default_buy_probability() -> f64 {
    0.5
}

fn default_size_min() -> Decimal {
    Decimal::new(500, 0)
}

fn default_size_max() -> Decimal {
    Decimal::new(2000, 0)
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("IXC"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.execution.target_shares > Decimal::ZERO,
            "target_shares must be positive"
        );

        anyhow::ensure!(
            self.execution.execution_rate > Decimal::ZERO
                && self.execution.execution_rate < Decimal::ONE,
            "execution_rate must be strictly between 0 and 1"
        );

        anyhow::ensure!(
            self.execution.permanent_impact >= Decimal::ZERO
                && self.execution.temporary_impact >= Decimal::ZERO,
            "impact coefficients must be non-negative"
        );

        anyhow::ensure!(
            self.risk.max_slippage > Decimal::ZERO && self.risk.max_slippage <= Decimal::ONE,
            "max_slippage must be between 0 and 1"
        );

        anyhow::ensure!(
            self.risk.max_price_spike > Decimal::ZERO,
            "max_price_spike must be positive"
        );

        anyhow::ensure!(
            self.signal.p_value_threshold > 0.0 && self.signal.p_value_threshold < 1.0,
            "p_value_threshold must be strictly between 0 and 1"
        );

        anyhow::ensure!(
            self.signal.min_observations >= 3,
            "min_observations must be at least 3"
        );

        anyhow::ensure!(
            self.market_maker.spread_threshold > Decimal::ZERO
                && self.market_maker.spread_threshold < Decimal::ONE,
            "spread_threshold must be strictly between 0 and 1"
        );

        anyhow::ensure!(
            self.market_maker.inventory_limit > Decimal::ZERO,
            "inventory_limit must be positive"
        );

        anyhow::ensure!(
            (0.0..=1.0).contains(&self.market_maker.buy_probability),
            "buy_probability must be between 0 and 1"
        );

        anyhow::ensure!(
            self.market_maker.size_min > Decimal::ZERO
                && self.market_maker.size_min < self.market_maker.size_max,
            "order size range must be positive with size_min < size_max"
        );

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            execution: ExecutionParams::default(),
            risk: RiskLimits::default(),
            signal: SignalParams::default(),
            market_maker: MarketMakerParams::default(),
        }
    }
}

impl Default for ExecutionParams {
    fn default() -> Self {
        Self {
            target_shares: default_target_shares(),
            execution_rate: default_execution_rate(),
            temporary_impact: default_temporary_impact(),
            permanent_impact: default_permanent_impact(),
            apply_temporary_impact: false,
        }
    }
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_slippage: default_max_slippage(),
            max_price_spike: default_max_price_spike(),
        }
    }
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            zscore_buy_threshold: default_zscore_buy_threshold(),
            p_value_threshold: default_p_value_threshold(),
            min_observations: default_min_observations(),
        }
    }
}

impl Default for MarketMakerParams {
    fn default() -> Self {
        Self {
            spread_threshold: default_spread_threshold(),
            inventory_limit: default_inventory_limit(),
            buy_probability: default_buy_probability(),
            size_min: default_size_min(),
            size_max: default_size_max(),
        }
    }
}
