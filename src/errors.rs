//! Typed error kinds for data integrity and signal computation.
//!
//! These are the failures a caller is expected to branch on before or during
//! a simulation run. Everything else (IO, config, CLI) flows through
//! `anyhow::Result` at the application layer.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Which input series a data-integrity error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesSide {
    Asset,
    Benchmark,
}

impl std::fmt::Display for SeriesSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeriesSide::Asset => write!(f, "asset"),
            SeriesSide::Benchmark => write!(f, "benchmark"),
        }
    }
}

/// Errors surfaced by series construction, alignment, and signal computation.
#[derive(Debug, Error)]
pub enum SimError {
    /// A timestamp exists on one side but not the other. Alignment never
    /// drops or forward-fills; the caller gets the first offending timestamp.
    #[error("series misaligned: {timestamp} present in {side} series has no counterpart")]
    SeriesMisaligned {
        timestamp: DateTime<Utc>,
        side: SeriesSide,
    },

    /// Timestamps must be strictly increasing with no duplicates.
    #[error("series not strictly ordered at index {index} ({timestamp})")]
    UnorderedSeries {
        index: usize,
        timestamp: DateTime<Utc>,
    },

    /// Every price in a series must be positive.
    #[error("non-positive price {price} at {timestamp}")]
    NonPositivePrice {
        timestamp: DateTime<Utc>,
        price: rust_decimal::Decimal,
    },

    /// Not enough observations for the requested statistic.
    #[error("insufficient data: {required} observations required, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// The spread has zero standard deviation; standardization is undefined.
    #[error("degenerate series: spread standard deviation is zero")]
    DegenerateSeries,
}
