//! Descriptive statistics over finite sequences of values.
//!
//! Every function rejects an empty input with [StatsError::EmptyInput] instead of producing NaN,
//! callers decide whether to skip, warn or abort.

use indexmap::IndexMap;
use polars::prelude::{NamedFrom, PolarsError, Series};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("Statistics requested over an empty input")]
    EmptyInput,
    #[error("Paired sequences differ in length: {left} != {right}")]
    LengthMismatch { left: usize, right: usize },
    #[error("Percentile must be within [0, 100], got {0}")]
    InvalidPercentile(f64),
    #[error("Correlation is undefined when a sequence has zero variance")]
    UndefinedCorrelation,
    #[error("Numerics failure: {0}")]
    Polars(#[from] PolarsError),
}

pub type Result<T> = std::result::Result<T, StatsError>;

fn series(values: &[f64]) -> Result<Series> {
    if values.is_empty() {
        return Err(StatsError::EmptyInput);
    }
    Ok(Series::new("values".into(), values))
}

pub fn count(values: &[f64]) -> Result<usize> {
    if values.is_empty() {
        return Err(StatsError::EmptyInput);
    }
    Ok(values.len())
}

pub fn mean(values: &[f64]) -> Result<f64> {
    series(values)?.mean().ok_or(StatsError::EmptyInput)
}

pub fn median(values: &[f64]) -> Result<f64> {
    series(values)?.median().ok_or(StatsError::EmptyInput)
}

/// Population standard deviation (no degrees of freedom correction).
pub fn std_dev(values: &[f64]) -> Result<f64> {
    series(values)?.std(0).ok_or(StatsError::EmptyInput)
}

pub fn min(values: &[f64]) -> Result<f64> {
    series(values)?.min::<f64>()?.ok_or(StatsError::EmptyInput)
}

pub fn max(values: &[f64]) -> Result<f64> {
    series(values)?.max::<f64>()?.ok_or(StatsError::EmptyInput)
}

/// The `p`th percentile, `p` in `[0, 100]`.
///
/// Linearly interpolates between the two closest order statistics: with `n` sorted values the
/// rank is `p / 100 * (n - 1)`.
pub fn percentile(values: &[f64], p: f64) -> Result<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_of_sorted(&sorted, p)
}

/// Same as [percentile] for input that is already sorted ascending.
pub fn percentile_of_sorted(sorted: &[f64], p: f64) -> Result<f64> {
    if !(0.0..=100.0).contains(&p) {
        return Err(StatsError::InvalidPercentile(p));
    }
    if sorted.is_empty() {
        return Err(StatsError::EmptyInput);
    }

    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;

    Ok(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

fn check_paired(a: &[f64], b: &[f64]) -> Result<()> {
    if a.len() != b.len() {
        return Err(StatsError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    if a.is_empty() {
        return Err(StatsError::EmptyInput);
    }
    Ok(())
}

/// `mean(|a_i - b_i|)`
pub fn mean_absolute_error(a: &[f64], b: &[f64]) -> Result<f64> {
    check_paired(a, b)?;
    let errors = a
        .iter()
        .zip(b)
        .map(|(a, b)| (a - b).abs())
        .collect::<Vec<_>>();
    mean(&errors)
}

/// `sqrt(mean((a_i - b_i)^2))`
pub fn root_mean_square_error(a: &[f64], b: &[f64]) -> Result<f64> {
    check_paired(a, b)?;
    let squares = a
        .iter()
        .zip(b)
        .map(|(a, b)| (a - b).powi(2))
        .collect::<Vec<_>>();
    Ok(mean(&squares)?.sqrt())
}

/// Pearson correlation coefficient of two paired sequences.
pub fn pearson_correlation(a: &[f64], b: &[f64]) -> Result<f64> {
    check_paired(a, b)?;
    let mean_a = mean(a)?;
    let mean_b = mean(b)?;

    let (mut covariance, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        covariance += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a == 0.0 || var_b == 0.0 {
        return Err(StatsError::UndefinedCorrelation);
    }

    Ok(covariance / (var_a.sqrt() * var_b.sqrt()))
}

/// Percentage of values strictly above and strictly below zero.
///
/// Zeros count towards neither side, so the two can sum to less than 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignProportions {
    pub positive_pct: f64,
    pub negative_pct: f64,
}

pub fn sign_proportions(values: &[f64]) -> Result<SignProportions> {
    let total = count(values)? as f64;
    let positive = values.iter().filter(|v| **v > 0.0).count() as f64;
    let negative = values.iter().filter(|v| **v < 0.0).count() as f64;

    Ok(SignProportions {
        positive_pct: positive / total * 100.0,
        negative_pct: negative / total * 100.0,
    })
}

/// Empirical CDF: the `i`th smallest of `n` values (1-indexed) maps to `i / n`.
pub fn empirical_cdf(values: &[f64]) -> Vec<(f64, f64)> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, value)| (value, (i + 1) as f64 / n))
        .collect()
}

/// Percentile key as displayed in reports, `p50`, `p99.9`.
pub fn percentile_label(p: f64) -> String {
    format!("p{p}")
}

/// Snapshot of the descriptive statistics of one sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStatistics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// Keyed `p<N>` in the order the percentiles were requested.
    pub percentiles: IndexMap<String, f64>,
    #[serde(flatten)]
    pub signs: SignProportions,
}

impl AggregateStatistics {
    pub fn compute(values: &[f64], percentiles: &[f64]) -> Result<Self> {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let percentiles = percentiles
            .iter()
            .map(|p| Ok((percentile_label(*p), percentile_of_sorted(&sorted, *p)?)))
            .collect::<Result<IndexMap<_, _>>>()?;

        Ok(Self {
            count: count(values)?,
            mean: mean(values)?,
            median: median(values)?,
            std_dev: std_dev(values)?,
            min: min(values)?,
            max: max(values)?,
            percentiles,
            signs: sign_proportions(values)?,
        })
    }

    pub fn percentile(&self, p: f64) -> Option<f64> {
        self.percentiles.get(&percentile_label(p)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALUES: [f64; 8] = [4.0, -2.0, 9.5, 0.0, 3.25, 7.0, -1.5, 12.0];

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_input_is_an_error_everywhere() {
        let empty: [f64; 0] = [];
        assert!(matches!(count(&empty), Err(StatsError::EmptyInput)));
        assert!(matches!(mean(&empty), Err(StatsError::EmptyInput)));
        assert!(matches!(median(&empty), Err(StatsError::EmptyInput)));
        assert!(matches!(std_dev(&empty), Err(StatsError::EmptyInput)));
        assert!(matches!(min(&empty), Err(StatsError::EmptyInput)));
        assert!(matches!(max(&empty), Err(StatsError::EmptyInput)));
        assert!(matches!(percentile(&empty, 50.0), Err(StatsError::EmptyInput)));
        assert!(matches!(
            mean_absolute_error(&empty, &empty),
            Err(StatsError::EmptyInput)
        ));
        assert!(matches!(
            sign_proportions(&empty),
            Err(StatsError::EmptyInput)
        ));
        assert!(matches!(
            AggregateStatistics::compute(&empty, &[50.0]),
            Err(StatsError::EmptyInput)
        ));
    }

    #[test]
    fn basic_statistics() -> anyhow::Result<()> {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(count(&values)?, 8);
        assert!(close(mean(&values)?, 5.0));
        assert!(close(std_dev(&values)?, 2.0));
        assert!(close(median(&values)?, 4.5));
        assert_eq!(min(&values)?, 2.0);
        assert_eq!(max(&values)?, 9.0);
        Ok(())
    }

    #[test]
    fn percentile_interpolates_linearly() -> anyhow::Result<()> {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert!(close(percentile(&values, 0.0)?, 1.0));
        assert!(close(percentile(&values, 100.0)?, 4.0));
        assert!(close(percentile(&values, 50.0)?, 2.5));
        assert!(close(percentile(&values, 80.0)?, 3.4));
        assert!(close(percentile(&[7.0], 90.0)?, 7.0));
        Ok(())
    }

    #[test]
    fn percentile_rejects_out_of_range() {
        assert!(matches!(
            percentile(&VALUES, 101.0),
            Err(StatsError::InvalidPercentile(_))
        ));
        assert!(matches!(
            percentile(&VALUES, f64::NAN),
            Err(StatsError::InvalidPercentile(_))
        ));
    }

    #[test]
    fn median_is_fiftieth_percentile() -> anyhow::Result<()> {
        for len in 1..=VALUES.len() {
            let values = &VALUES[..len];
            assert!(close(percentile(values, 50.0)?, median(values)?));
        }
        Ok(())
    }

    #[test]
    fn mae_and_rmse() -> anyhow::Result<()> {
        let a = [12.5, 7.0, 30.0, 4.0];
        let b = [10.0, 9.0, 25.0, 4.0];
        let mae = mean_absolute_error(&a, &b)?;
        let rmse = root_mean_square_error(&a, &b)?;

        let manual = a.iter().zip(&b).map(|(a, b)| (a - b).abs()).sum::<f64>() / a.len() as f64;
        assert!(close(mae, manual));
        assert!(rmse >= mae);
        assert!(close(rmse, ((6.25 + 4.0 + 25.0) / 4.0_f64).sqrt()));
        Ok(())
    }

    #[test]
    fn paired_metrics_need_equal_lengths() {
        assert!(matches!(
            mean_absolute_error(&[1.0, 2.0], &[1.0]),
            Err(StatsError::LengthMismatch { left: 2, right: 1 })
        ));
        assert!(matches!(
            pearson_correlation(&[1.0], &[1.0, 2.0]),
            Err(StatsError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn correlation() -> anyhow::Result<()> {
        let a = [1.0, 2.0, 3.0, 4.0];
        assert!(close(pearson_correlation(&a, &[2.0, 4.0, 6.0, 8.0])?, 1.0));
        assert!(close(pearson_correlation(&a, &[8.0, 6.0, 4.0, 2.0])?, -1.0));
        assert!(matches!(
            pearson_correlation(&a, &[3.0, 3.0, 3.0, 3.0]),
            Err(StatsError::UndefinedCorrelation)
        ));
        Ok(())
    }

    #[test]
    fn sign_proportions_exclude_zero() -> anyhow::Result<()> {
        let signs = sign_proportions(&[1.0, -1.0, 0.0, 2.0])?;
        assert!(close(signs.positive_pct, 50.0));
        assert!(close(signs.negative_pct, 25.0));
        assert!(signs.positive_pct + signs.negative_pct <= 100.0);
        Ok(())
    }

    #[test]
    fn cdf_is_monotonic_and_ends_at_one() {
        let cdf = empirical_cdf(&VALUES);
        assert_eq!(cdf.len(), VALUES.len());
        assert!(cdf.windows(2).all(|w| w[0].0 <= w[1].0 && w[0].1 <= w[1].1));
        assert_eq!(cdf.first().map(|p| p.1), Some(1.0 / VALUES.len() as f64));
        assert_eq!(cdf.last().copied(), Some((12.0, 1.0)));
        assert!(empirical_cdf(&[]).is_empty());
    }

    #[test]
    fn aggregate_snapshot() -> anyhow::Result<()> {
        let stats = AggregateStatistics::compute(&VALUES, &[50.0, 90.0])?;
        assert_eq!(stats.count, VALUES.len());
        assert_eq!(stats.min, -2.0);
        assert_eq!(stats.max, 12.0);
        assert!(close(stats.percentile(50.0).unwrap(), stats.median));
        assert!(stats.percentile(75.0).is_none());
        assert!(close(stats.signs.positive_pct, 62.5));
        assert!(close(stats.signs.negative_pct, 25.0));
        Ok(())
    }

    #[test]
    fn percentiles_keep_requested_order() -> anyhow::Result<()> {
        let stats = AggregateStatistics::compute(&VALUES, &[5.0, 25.0, 100.0])?;
        assert_eq!(
            stats.percentiles.keys().collect::<Vec<_>>(),
            vec!["p5", "p25", "p100"]
        );
        assert_eq!(stats.percentile(100.0), Some(12.0));
        Ok(())
    }
}
