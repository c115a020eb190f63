//! Spread signal computation: cointegration test and z-score gate.
//!
//! The statistical leg of the simulator. Forms the price spread between the
//! asset and benchmark series, runs an Augmented Dickey-Fuller stationarity
//! test on it, and standardizes it into the z-score sequence the execution
//! engine uses as its trade gate.
//!
//! All statistics run in `f64`; ledger arithmetic stays in `Decimal`.

use crate::data::AlignedSeries;
use crate::errors::SimError;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Minimum observations for the Dickey-Fuller regression to be meaningful.
pub const DEFAULT_MIN_OBSERVATIONS: usize = 20;

/// Outcome of the cointegration test on the spread.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CointegrationTest {
    /// True iff `p_value` is below the configured significance threshold.
    pub is_cointegrated: bool,
    pub p_value: f64,
    pub t_stat: f64,
    pub observations: usize,
}

/// A standardized spread observation.
#[derive(Debug, Clone, Copy)]
pub struct ZScorePoint {
    pub timestamp: DateTime<Utc>,
    pub zscore: f64,
}

/// The standardized spread sequence, index-aligned with the input series.
#[derive(Debug, Clone)]
pub struct ZScoreSeries {
    points: Vec<ZScorePoint>,
    mean: f64,
    std_dev: f64,
}

impl ZScoreSeries {
    pub fn points(&self) -> &[ZScorePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Full-sample spread mean used for standardization.
    pub fn spread_mean(&self) -> f64 {
        self.mean
    }

    /// Full-sample spread standard deviation used for standardization.
    pub fn spread_std_dev(&self) -> f64 {
        self.std_dev
    }

    /// Number of observations at or below the given gate threshold.
    pub fn gate_crossings(&self, threshold: f64) -> usize {
        self.points.iter().filter(|p| p.zscore <= threshold).count()
    }
}

/// Elementwise spread (asset − benchmark) in f64.
pub fn spread(aligned: &AlignedSeries) -> Vec<f64> {
    aligned
        .asset
        .iter()
        .zip(aligned.benchmark.iter())
        .map(|(a, b)| (a - b).to_f64().unwrap_or(0.0))
        .collect()
}

/// Standardize the spread by its full-sample mean and standard deviation.
///
/// The whole series is used for the moments, so every point's z-score leans
/// on future data relative to that point. Acceptable for historical replay;
/// unusable as-is for live signal generation.
pub fn compute_zscore(aligned: &AlignedSeries) -> Result<ZScoreSeries, SimError> {
    let values = spread(aligned);
    if values.len() < 2 {
        return Err(SimError::InsufficientData {
            required: 2,
            actual: values.len(),
        });
    }

    let (mean, std_dev) = mean_std(&values);
    if std_dev <= 0.0 {
        return Err(SimError::DegenerateSeries);
    }

    let points = aligned
        .timestamps
        .iter()
        .zip(values.iter())
        .map(|(&timestamp, &value)| ZScorePoint {
            timestamp,
            zscore: (value - mean) / std_dev,
        })
        .collect();

    Ok(ZScoreSeries {
        points,
        mean,
        std_dev,
    })
}

/// Augmented Dickey-Fuller stationarity test on the spread.
///
/// Fits the AR(1) regression `Δs_t = φ·s_{t-1} + ε` (demeaned), takes the
/// t-statistic of φ, and maps it to a p-value through interpolated
/// Dickey-Fuller critical values. `is_cointegrated` compares the p-value
/// against `p_value_threshold`.
pub fn compute_cointegration(
    aligned: &AlignedSeries,
    p_value_threshold: f64,
    min_observations: usize,
) -> Result<CointegrationTest, SimError> {
    let values = spread(aligned);
    if values.len() < min_observations {
        return Err(SimError::InsufficientData {
            required: min_observations,
            actual: values.len(),
        });
    }

    let mut lagged: Vec<f64> = Vec::with_capacity(values.len() - 1);
    let mut delta: Vec<f64> = Vec::with_capacity(values.len() - 1);
    for win in values.windows(2) {
        lagged.push(win[0]);
        delta.push(win[1] - win[0]);
    }

    let n = lagged.len();
    let mean_lag = lagged.iter().sum::<f64>() / n as f64;
    let mean_delta = delta.iter().sum::<f64>() / n as f64;

    let mut num = 0.0;
    let mut den = 0.0;
    for i in 0..n {
        let dx = lagged[i] - mean_lag;
        num += dx * (delta[i] - mean_delta);
        den += dx * dx;
    }
    if den.abs() < 1e-12 {
        return Err(SimError::DegenerateSeries);
    }
    let phi = (num / den).clamp(-0.999, 0.999);

    // Residual variance and standard error of phi
    let mut rss = 0.0;
    for i in 0..n {
        let fit = phi * (lagged[i] - mean_lag) + mean_delta;
        let err = delta[i] - fit;
        rss += err * err;
    }
    let sigma2 = rss / n.saturating_sub(2).max(1) as f64;
    let se_phi = (sigma2 / den).sqrt();
    let t_stat = if se_phi < 1e-12 { 0.0 } else { phi / se_phi };

    let p_value = df_p_value(t_stat, n).clamp(0.0, 1.0);

    Ok(CointegrationTest {
        is_cointegrated: p_value < p_value_threshold,
        p_value,
        t_stat,
        observations: values.len(),
    })
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, var.sqrt())
}

/// Map a Dickey-Fuller t-statistic to an approximate p-value.
///
/// Critical values (regression with constant) interpolated by sample size.
fn df_p_value(t_stat: f64, n: usize) -> f64 {
    const CRITS: &[(usize, f64, f64, f64)] = &[
        (25, -3.75, -3.00, -2.63),
        (50, -3.58, -2.93, -2.60),
        (100, -3.51, -2.89, -2.58),
        (250, -3.46, -2.88, -2.57),
        (500, -3.44, -2.87, -2.57),
    ];

    let (c1, c5, c10) = interpolate_crits(n, CRITS);
    if t_stat < c1 {
        0.005
    } else if t_stat < c5 {
        0.025
    } else if t_stat < c10 {
        0.075
    } else {
        0.5
    }
}

fn interpolate_crits(n: usize, table: &[(usize, f64, f64, f64)]) -> (f64, f64, f64) {
    if n <= table[0].0 {
        return (table[0].1, table[0].2, table[0].3);
    }
    for w in table.windows(2) {
        let (n1, c1_1, c5_1, c10_1) = w[0];
        let (n2, c1_2, c5_2, c10_2) = w[1];
        if n >= n1 && n <= n2 {
            let t = (n - n1) as f64 / (n2 - n1) as f64;
            let lerp = |a: f64, b: f64| a + t * (b - a);
            return (lerp(c1_1, c1_2), lerp(c5_1, c5_2), lerp(c10_1, c10_2));
        }
    }
    let last = table[table.len() - 1];
    (last.1, last.2, last.3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{align, PricePoint, PriceSeries};
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal_macros::dec;

    fn ts(i: usize) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(i as i64)
    }

    fn aligned_from_spreads(spreads: &[f64]) -> AlignedSeries {
        // Benchmark pinned at 100; asset = 100 + spread.
        let asset = PriceSeries::new(
            spreads
                .iter()
                .enumerate()
                .map(|(i, &s)| PricePoint {
                    timestamp: ts(i),
                    price: Decimal::from_f64(100.0 + s).unwrap(),
                })
                .collect(),
        )
        .unwrap();
        let benchmark = PriceSeries::new(
            (0..spreads.len())
                .map(|i| PricePoint {
                    timestamp: ts(i),
                    price: dec!(100),
                })
                .collect(),
        )
        .unwrap();
        align(&asset, &benchmark).unwrap()
    }

    #[test]
    fn test_spread_is_elementwise_difference() {
        let aligned = aligned_from_spreads(&[1.5, -0.5, 2.0]);
        let s = spread(&aligned);

        assert_eq!(s.len(), 3);
        assert!((s[0] - 1.5).abs() < 1e-9);
        assert!((s[1] + 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_zscore_standardizes_full_sample() {
        let aligned = aligned_from_spreads(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let z = compute_zscore(&aligned).unwrap();

        assert_eq!(z.len(), 5);
        // Mean spread is 3, so the middle point standardizes to zero.
        assert!(z.points()[2].zscore.abs() < 1e-9);
        // Symmetric tails
        assert!((z.points()[0].zscore + z.points()[4].zscore).abs() < 1e-9);
        assert!((z.spread_mean() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_zscore_degenerate_series_is_an_error() {
        // Constant spread: standard deviation zero, never a silent NaN.
        let aligned = aligned_from_spreads(&[2.0; 30]);
        let err = compute_zscore(&aligned).unwrap_err();
        assert!(matches!(err, SimError::DegenerateSeries));
    }

    #[test]
    fn test_zscore_insufficient_data() {
        let aligned = aligned_from_spreads(&[1.0]);
        let err = compute_zscore(&aligned).unwrap_err();
        assert!(matches!(err, SimError::InsufficientData { .. }));
    }

    #[test]
    fn test_gate_crossings() {
        let mut spreads = vec![0.0; 10];
        spreads[0] = -10.0;
        spreads[9] = 10.0;
        let aligned = aligned_from_spreads(&spreads);
        let z = compute_zscore(&aligned).unwrap();

        // Only the extreme low point crosses a -2 gate.
        assert_eq!(z.gate_crossings(-2.0), 1);
    }

    #[test]
    fn test_cointegration_rejects_short_series() {
        let aligned = aligned_from_spreads(&[1.0, 2.0, 1.0, 2.0, 1.0]);
        let err = compute_cointegration(&aligned, 0.2, DEFAULT_MIN_OBSERVATIONS).unwrap_err();
        assert!(matches!(
            err,
            SimError::InsufficientData {
                required: 20,
                actual: 5
            }
        ));
    }

    #[test]
    fn test_cointegration_constant_spread_is_degenerate() {
        let aligned = aligned_from_spreads(&[3.0; 40]);
        let err = compute_cointegration(&aligned, 0.2, DEFAULT_MIN_OBSERVATIONS).unwrap_err();
        assert!(matches!(err, SimError::DegenerateSeries));
    }

    #[test]
    fn test_cointegration_detects_mean_reversion() {
        // Strongly mean-reverting spread: hard oscillation around zero.
        let spreads: Vec<f64> = (0..60)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let aligned = aligned_from_spreads(&spreads);

        let test = compute_cointegration(&aligned, 0.2, DEFAULT_MIN_OBSERVATIONS).unwrap();

        assert!(test.is_cointegrated, "p-value was {}", test.p_value);
        assert!(test.p_value < 0.05);
        assert!(test.t_stat < 0.0);
        assert_eq!(test.observations, 60);
    }

    #[test]
    fn test_cointegration_rejects_trending_spread() {
        // Monotone trend: a unit root process, no mean reversion to find.
        let spreads: Vec<f64> = (0..60).map(|i| i as f64 * 0.5).collect();
        let aligned = aligned_from_spreads(&spreads);

        let test = compute_cointegration(&aligned, 0.2, DEFAULT_MIN_OBSERVATIONS).unwrap();

        assert!(!test.is_cointegrated, "p-value was {}", test.p_value);
        assert!(test.p_value >= 0.2);
    }

    #[test]
    fn test_looser_threshold_is_configurable() {
        let spreads: Vec<f64> = (0..60)
            .map(|i| match i % 4 {
                0 => 0.8,
                1 => -0.2,
                2 => -0.9,
                _ => 0.3,
            })
            .collect();
        let aligned = aligned_from_spreads(&spreads);

        let strict = compute_cointegration(&aligned, 0.01, DEFAULT_MIN_OBSERVATIONS).unwrap();
        let loose = compute_cointegration(&aligned, 0.2, DEFAULT_MIN_OBSERVATIONS).unwrap();

        // Same statistic, different decision rule.
        assert_eq!(strict.p_value, loose.p_value);
        assert!(loose.is_cointegrated || !strict.is_cointegrated);
    }
}
