//! Weighted statistics
//!
//! Percentiles and histograms over (value, weight) pairs, where the weight
//! is the sampling extrapolation factor of the contributing bundle. All
//! degenerate inputs (empty point set, zero total weight, zero-width value
//! range) resolve to explicit fallback values rather than errors, so the
//! rendering layer can always display a number.

use crate::types::{HistogramBucket, Percentiles, SeriesStats, EQUAL_WIDTH_BUCKETS};
use std::cmp::Ordering;

/// One observed value with its sampling weight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DataPoint {
    pub value: f64,
    pub weight: f64,
}

/// Weighted nearest-rank percentile.
///
/// Sorts the points ascending by value, then returns the value of the first
/// point whose cumulative weight reaches `p * total_weight`. No
/// interpolation between adjacent points. Empty input returns 0.
pub fn weighted_percentile(points: &[DataPoint], p: f64) -> f64 {
    if points.is_empty() {
        return 0.0;
    }

    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.value.partial_cmp(&b.value).unwrap_or(Ordering::Equal));

    let total_weight: f64 = sorted.iter().map(|pt| pt.weight).sum();
    let target = p * total_weight;

    let mut cumulative = 0.0;
    for point in &sorted {
        cumulative += point.weight;
        if cumulative >= target {
            return point.value;
        }
    }

    // Only reachable through floating-point drift in the cumulative sum.
    sorted[sorted.len() - 1].value
}

/// Accumulated (value, weight) observations for one series within one facet
/// group. Exposes the fixed aggregate surface the rendering layer consumes:
/// sum, mean, min, max and arbitrary percentiles.
#[derive(Clone, Debug, Default)]
pub struct SeriesSummary {
    points: Vec<DataPoint>,
}

impl SeriesSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one value with its bundle's weight.
    pub fn push(&mut self, value: f64, weight: f64) {
        self.points.push(DataPoint { value, weight });
    }

    /// Number of contributing values (unweighted).
    pub fn count(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Sum of contributing weights.
    pub fn total_weight(&self) -> f64 {
        self.points.iter().map(|p| p.weight).sum()
    }

    /// Weighted sum: each bundle contributes `weight` copies of its value.
    pub fn sum(&self) -> f64 {
        self.points.iter().map(|p| p.value * p.weight).sum()
    }

    /// Weighted mean, 0 when no values contributed.
    pub fn mean(&self) -> f64 {
        let total = self.total_weight();
        if total == 0.0 {
            return 0.0;
        }
        self.sum() / total
    }

    /// Smallest contributing value, 0 when empty.
    pub fn min(&self) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.points
            .iter()
            .map(|p| p.value)
            .fold(f64::INFINITY, f64::min)
    }

    /// Largest contributing value, 0 when empty.
    pub fn max(&self) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.points
            .iter()
            .map(|p| p.value)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Weighted nearest-rank percentile, `p` in 0..1. Empty input returns 0.
    pub fn percentile(&self, p: f64) -> f64 {
        weighted_percentile(&self.points, p)
    }

    /// Raw points, for histogram construction.
    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    /// Materialize the fixed export readout.
    pub fn to_stats(&self) -> SeriesStats {
        SeriesStats {
            count: self.count() as u64,
            sum: self.sum(),
            mean: self.mean(),
            min: self.min(),
            max: self.max(),
            percentiles: Percentiles {
                p50: self.percentile(0.5),
                p75: self.percentile(0.75),
                p90: self.percentile(0.9),
                p95: self.percentile(0.95),
                p99: self.percentile(0.99),
            },
        }
    }
}

/// Bucket points into caller-supplied sorted thresholds.
///
/// Buckets are `[thresholds[i], thresholds[i+1])`, except the last bucket
/// which is closed on both ends when its upper boundary is finite and
/// `[min, +inf)` when the final boundary is `f64::INFINITY`.
pub fn histogram_with_thresholds(points: &[DataPoint], thresholds: &[f64]) -> Vec<HistogramBucket> {
    if thresholds.len() < 2 {
        return Vec::new();
    }

    let mut buckets: Vec<HistogramBucket> = thresholds
        .windows(2)
        .map(|pair| empty_bucket(pair[0], pair[1]))
        .collect();

    let last = buckets.len() - 1;
    for point in points {
        let slot = buckets.iter().enumerate().position(|(i, b)| {
            if point.value < b.min {
                return false;
            }
            // Half-open everywhere except the final boundary, which is
            // closed when finite. Out-of-range values land nowhere.
            point.value < b.max || (i == last && b.max.is_finite() && point.value == b.max)
        });
        if let Some(i) = slot {
            buckets[i].count += 1;
            buckets[i].weighted_count += point.weight;
        }
    }

    fill_percentages(&mut buckets);
    buckets
}

/// Bucket points into equal-width buckets spanning `[min, max]` of the
/// observed values. When all values are identical a single bucket holding
/// 100% of the weight is produced instead of dividing a zero-width range.
pub fn histogram_equal_width(points: &[DataPoint]) -> Vec<HistogramBucket> {
    if points.is_empty() {
        return Vec::new();
    }

    let lo = points.iter().map(|p| p.value).fold(f64::INFINITY, f64::min);
    let hi = points
        .iter()
        .map(|p| p.value)
        .fold(f64::NEG_INFINITY, f64::max);

    if lo == hi {
        let mut bucket = empty_bucket(lo, hi);
        bucket.count = points.len() as u64;
        bucket.weighted_count = points.iter().map(|p| p.weight).sum();
        bucket.percentage = 100.0;
        return vec![bucket];
    }

    let width = (hi - lo) / EQUAL_WIDTH_BUCKETS as f64;
    let mut buckets: Vec<HistogramBucket> = (0..EQUAL_WIDTH_BUCKETS)
        .map(|i| {
            let min = lo + width * i as f64;
            let max = if i == EQUAL_WIDTH_BUCKETS - 1 {
                hi
            } else {
                lo + width * (i + 1) as f64
            };
            empty_bucket(min, max)
        })
        .collect();

    for point in points {
        let slot = (((point.value - lo) / width) as usize).min(EQUAL_WIDTH_BUCKETS - 1);
        buckets[slot].count += 1;
        buckets[slot].weighted_count += point.weight;
    }

    fill_percentages(&mut buckets);
    buckets
}

fn empty_bucket(min: f64, max: f64) -> HistogramBucket {
    HistogramBucket {
        min,
        max,
        label: bucket_label(min, max),
        count: 0,
        weighted_count: 0.0,
        percentage: 0.0,
    }
}

fn bucket_label(min: f64, max: f64) -> String {
    if max.is_infinite() {
        format!("{}+", format_bound(min))
    } else {
        format!("{}-{}", format_bound(min), format_bound(max))
    }
}

fn format_bound(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

fn fill_percentages(buckets: &mut [HistogramBucket]) {
    let total: f64 = buckets.iter().map(|b| b.weighted_count).sum();
    if total == 0.0 {
        return;
    }
    for bucket in buckets {
        bucket.percentage = bucket.weighted_count / total * 100.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_points(values: &[f64]) -> Vec<DataPoint> {
        values
            .iter()
            .map(|&value| DataPoint { value, weight: 1.0 })
            .collect()
    }

    #[test]
    fn test_weighted_percentile_nearest_rank() {
        let points = unit_points(&[1.0, 2.0, 3.0, 4.0]);
        // target = 0.5 * 4 = 2, cumulative weight reaches 2 at value 2
        assert_eq!(weighted_percentile(&points, 0.5), 2.0);
        assert_eq!(weighted_percentile(&points, 1.0), 4.0);
        assert_eq!(weighted_percentile(&points, 0.25), 1.0);
    }

    #[test]
    fn test_weighted_percentile_respects_weights() {
        let points = vec![
            DataPoint { value: 1.0, weight: 1.0 },
            DataPoint { value: 100.0, weight: 99.0 },
        ];
        assert_eq!(weighted_percentile(&points, 0.5), 100.0);
    }

    #[test]
    fn test_weighted_percentile_unsorted_input() {
        let points = unit_points(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(weighted_percentile(&points, 0.5), 2.0);
    }

    #[test]
    fn test_weighted_percentile_empty_is_zero() {
        assert_eq!(weighted_percentile(&[], 0.5), 0.0);
    }

    #[test]
    fn test_summary_fallbacks_when_empty() {
        let summary = SeriesSummary::new();
        assert_eq!(summary.mean(), 0.0);
        assert_eq!(summary.min(), 0.0);
        assert_eq!(summary.max(), 0.0);
        assert_eq!(summary.percentile(0.9), 0.0);
        assert!(!summary.to_stats().mean.is_nan());
    }

    #[test]
    fn test_summary_weighted_sum_and_mean() {
        let mut summary = SeriesSummary::new();
        summary.push(2.0, 10.0);
        summary.push(4.0, 5.0);
        assert_eq!(summary.count(), 2);
        assert_eq!(summary.sum(), 40.0);
        assert_eq!(summary.total_weight(), 15.0);
        assert!((summary.mean() - 40.0 / 15.0).abs() < 1e-9);
        assert_eq!(summary.min(), 2.0);
        assert_eq!(summary.max(), 4.0);
    }

    #[test]
    fn test_histogram_fixed_thresholds_with_infinity() {
        let points = unit_points(&[5.0, 15.0]);
        let buckets = histogram_with_thresholds(&points, &[0.0, 10.0, f64::INFINITY]);

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].label, "0-10");
        assert_eq!(buckets[0].count, 1);
        // 15 falls in [10, inf), not dropped
        assert_eq!(buckets[1].label, "10+");
        assert_eq!(buckets[1].count, 1);
        assert_eq!(buckets[1].percentage, 50.0);
    }

    #[test]
    fn test_histogram_finite_last_bucket_is_closed() {
        let points = unit_points(&[20.0]);
        let buckets = histogram_with_thresholds(&points, &[0.0, 10.0, 20.0]);
        assert_eq!(buckets[1].count, 1);
    }

    #[test]
    fn test_histogram_equal_width_five_buckets() {
        let points = unit_points(&[0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        let buckets = histogram_equal_width(&points);

        assert_eq!(buckets.len(), 5);
        assert_eq!(buckets[0].min, 0.0);
        assert_eq!(buckets[4].max, 10.0);
        // max value lands in the final bucket, not out of range
        assert_eq!(buckets[4].count, 2);
        let total: u64 = buckets.iter().map(|b| b.count).sum();
        assert_eq!(total, 6);
    }

    #[test]
    fn test_histogram_degenerate_single_bucket() {
        let points = unit_points(&[5.0, 5.0, 5.0]);
        let buckets = histogram_equal_width(&points);

        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].count, 3);
        assert_eq!(buckets[0].percentage, 100.0);
    }

    #[test]
    fn test_histogram_zero_weight_guard() {
        let points = vec![DataPoint { value: 1.0, weight: 0.0 }];
        let buckets = histogram_with_thresholds(&points, &[0.0, 10.0]);
        assert_eq!(buckets[0].percentage, 0.0);
    }
}
