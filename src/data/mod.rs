//! Price series model and historical data loading.
//!
//! The simulator consumes two timestamp-indexed price sequences (the asset
//! being acquired and a reference/benchmark). This module owns the ordered
//! sequence abstraction, CSV import, and the pre-run alignment check.

use crate::errors::{SeriesSide, SimError};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A single observation: one price per trading period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
}

/// An ordered price sequence with strictly increasing timestamps.
///
/// Construction validates ordering and price positivity so downstream code
/// can rely on both without re-checking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series from raw points, validating the sequence invariants.
    pub fn new(points: Vec<PricePoint>) -> Result<Self, SimError> {
        for (i, point) in points.iter().enumerate() {
            if point.price <= Decimal::ZERO {
                return Err(SimError::NonPositivePrice {
                    timestamp: point.timestamp,
                    price: point.price,
                });
            }
            if i > 0 && point.timestamp <= points[i - 1].timestamp {
                return Err(SimError::UnorderedSeries {
                    index: i,
                    timestamp: point.timestamp,
                });
            }
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// First and last timestamps, if the series is non-empty.
    pub fn available_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp)),
            _ => None,
        }
    }
}

/// Two series joined on timestamp, one row per trading period.
///
/// Produced only by [`align`]; a row exists for a timestamp iff both inputs
/// have an observation there.
#[derive(Debug, Clone)]
pub struct AlignedSeries {
    pub timestamps: Vec<DateTime<Utc>>,
    pub asset: Vec<Decimal>,
    pub benchmark: Vec<Decimal>,
}

impl AlignedSeries {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Join the two input series on timestamp.
///
/// A timestamp present on one side and missing on the other is a
/// data-integrity error surfaced before the simulation starts; rows are
/// never silently dropped or forward-filled.
pub fn align(asset: &PriceSeries, benchmark: &PriceSeries) -> Result<AlignedSeries, SimError> {
    let a = asset.points();
    let b = benchmark.points();

    // Both inputs are strictly ordered, so a single merge pass finds the
    // first mismatch.
    let mut i = 0;
    let mut j = 0;
    let mut timestamps = Vec::with_capacity(a.len().min(b.len()));
    let mut asset_prices = Vec::with_capacity(a.len().min(b.len()));
    let mut benchmark_prices = Vec::with_capacity(a.len().min(b.len()));

    while i < a.len() && j < b.len() {
        match a[i].timestamp.cmp(&b[j].timestamp) {
            std::cmp::Ordering::Equal => {
                timestamps.push(a[i].timestamp);
                asset_prices.push(a[i].price);
                benchmark_prices.push(b[j].price);
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => {
                return Err(SimError::SeriesMisaligned {
                    timestamp: a[i].timestamp,
                    side: SeriesSide::Asset,
                });
            }
            std::cmp::Ordering::Greater => {
                return Err(SimError::SeriesMisaligned {
                    timestamp: b[j].timestamp,
                    side: SeriesSide::Benchmark,
                });
            }
        }
    }

    if i < a.len() {
        return Err(SimError::SeriesMisaligned {
            timestamp: a[i].timestamp,
            side: SeriesSide::Asset,
        });
    }
    if j < b.len() {
        return Err(SimError::SeriesMisaligned {
            timestamp: b[j].timestamp,
            side: SeriesSide::Benchmark,
        });
    }

    Ok(AlignedSeries {
        timestamps,
        asset: asset_prices,
        benchmark: benchmark_prices,
    })
}

/// CSV loader for price series.
///
/// Expected format, header optional:
/// ```csv
/// timestamp,price
/// 2024-01-01T00:00:00Z,100.25
/// ```
pub struct CsvPriceLoader;

impl CsvPriceLoader {
    /// Load a series from a CSV file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<PriceSeries> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read CSV file: {}", path.display()))?;

        Self::from_csv_content(&content)
            .with_context(|| format!("Failed to parse CSV file: {}", path.display()))
    }

    /// Parse a series from CSV content.
    pub fn from_csv_content(content: &str) -> Result<PriceSeries> {
        let mut points = Vec::new();

        for (line_num, line) in content.lines().enumerate() {
            // Skip header
            if line_num == 0 && line.starts_with("timestamp") {
                continue;
            }

            if line.trim().is_empty() {
                continue;
            }

            let point = parse_row(line)
                .with_context(|| format!("Failed to parse line {}: {}", line_num + 1, line))?;
            points.push(point);
        }

        if points.is_empty() {
            anyhow::bail!("CSV contains no data rows");
        }

        PriceSeries::new(points).map_err(Into::into)
    }
}

fn parse_row(line: &str) -> Result<PricePoint> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() < 2 {
        anyhow::bail!("Expected 2 columns (timestamp,price), got {}", parts.len());
    }

    Ok(PricePoint {
        timestamp: parts[0]
            .trim()
            .parse()
            .with_context(|| format!("Invalid timestamp: {}", parts[0]))?,
        price: parts[1]
            .trim()
            .parse()
            .with_context(|| format!("Invalid price: {}", parts[1]))?,
    })
}
