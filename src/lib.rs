//! # Impact Exec
//!
//! A single-asset order-execution simulator: decides, trade-by-trade over a
//! historical price series, how many shares to buy and at what modeled price
//! under risk limits, while a stochastic market-making inventory process runs
//! on the same time axis.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `data`: Price series model, CSV loading, timestamp alignment
//! - `signal`: Spread z-score and the advisory cointegration test
//! - `execution`: Impact model, risk predicates, and the execution engine
//! - `market_maker`: Seeded stochastic inventory process
//! - `sim`: The driver advancing both loops one step per period
//! - `errors`: Typed data-integrity and signal error kinds

pub mod config;
pub mod data;
pub mod errors;
pub mod execution;
pub mod market_maker;
pub mod signal;
pub mod sim;

pub use config::Config;
pub use sim::{SimulationResult, Simulator};
