//! Reduction of per-vertex scalar maps into per-case summary statistics.
//!
//! Two profiles exist. The basic profile keeps one mean per hemisphere plus a
//! whole-brain mean. The extended profile mirrors the historical analysis
//! exactly, including its quirk: the outlier threshold excludes values from
//! the mean, but NOT from the median, percentiles or IQR. Do not "fix" that
//! asymmetry here; uniform outlier filtering is what the clipping scalar load
//! mode is for.

use serde::{Deserialize, Serialize};

use crate::error::{GyrificationError, Result};
use crate::split::Hemisphere;
use crate::util::percentile_sorted;

/// Default upper bound used by the extended profile's mean computation.
pub const DEFAULT_OUTLIER_THRESHOLD: f32 = 10.0;

/// Which summary statistics are computed and recorded per case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticsProfile {
    Basic,
    Extended,
}

/// Extended summary of one hemisphere's scalar map.
#[derive(Debug, Clone, PartialEq)]
pub struct HemisphereSummary {
    /// Mean over the values strictly below the outlier threshold.
    pub mean: f64,
    pub median: f64,
    pub p5: f64,
    pub p25: f64,
    pub p75: f64,
    pub p95: f64,
    pub iqr: f64,
}

/// Basic summary: hemisphere means and their average.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicStats {
    pub left_mean: f64,
    pub right_mean: f64,
    pub brain_mean: f64,
}

/// The per-case statistics, shaped by the configured profile.
#[derive(Debug, Clone, PartialEq)]
pub enum CaseStats {
    Basic(BasicStats),
    Extended {
        left: HemisphereSummary,
        right: HemisphereSummary,
    },
}

impl CaseStats {
    pub fn profile(&self) -> StatisticsProfile {
        match self {
            CaseStats::Basic(_) => StatisticsProfile::Basic,
            CaseStats::Extended { .. } => StatisticsProfile::Extended,
        }
    }
}

/// Reduce the two hemisphere scalar maps of one case.
///
/// NaN sentinels are dropped first in both profiles. An empty filtered set
/// makes every statistic undefined and is reported as an error, never as a
/// silent NaN row.
pub fn reduce_case(
    left: &[f32],
    right: &[f32],
    profile: StatisticsProfile,
    outlier_threshold: f32,
) -> Result<CaseStats> {
    match profile {
        StatisticsProfile::Basic => {
            let left_mean = finite_mean(left, Hemisphere::Left)?;
            let right_mean = finite_mean(right, Hemisphere::Right)?;
            Ok(CaseStats::Basic(BasicStats {
                left_mean,
                right_mean,
                brain_mean: 0.5 * (left_mean + right_mean),
            }))
        }
        StatisticsProfile::Extended => Ok(CaseStats::Extended {
            left: hemisphere_summary(left, Hemisphere::Left, outlier_threshold)?,
            right: hemisphere_summary(right, Hemisphere::Right, outlier_threshold)?,
        }),
    }
}

fn finite_values(values: &[f32]) -> Vec<f32> {
    values.iter().copied().filter(|v| !v.is_nan()).collect()
}

fn mean_f64(values: &[f32]) -> f64 {
    values.iter().map(|v| *v as f64).sum::<f64>() / values.len() as f64
}

fn finite_mean(values: &[f32], hemi: Hemisphere) -> Result<f64> {
    let finite = finite_values(values);
    if finite.is_empty() {
        return Err(GyrificationError::DegenerateStatistics(
            hemi.tag().to_string(),
        ));
    }
    Ok(mean_f64(&finite))
}

/// Compute the extended summary for one hemisphere.
pub fn hemisphere_summary(
    values: &[f32],
    hemi: Hemisphere,
    outlier_threshold: f32,
) -> Result<HemisphereSummary> {
    let mut finite = finite_values(values);
    if finite.is_empty() {
        return Err(GyrificationError::DegenerateStatistics(
            hemi.tag().to_string(),
        ));
    }

    // The mean alone is restricted to values below the threshold; the order
    // statistics are taken over the full finite set.
    let below: Vec<f32> = finite
        .iter()
        .copied()
        .filter(|v| *v < outlier_threshold)
        .collect();
    if below.is_empty() {
        return Err(GyrificationError::DegenerateStatistics(
            hemi.tag().to_string(),
        ));
    }
    let mean = mean_f64(&below);

    finite.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let p5 = percentile_sorted(&finite, 5.0).unwrap();
    let p25 = percentile_sorted(&finite, 25.0).unwrap();
    let median = percentile_sorted(&finite, 50.0).unwrap();
    let p75 = percentile_sorted(&finite, 75.0).unwrap();
    let p95 = percentile_sorted(&finite, 95.0).unwrap();

    Ok(HemisphereSummary {
        mean,
        median,
        p5,
        p25,
        p75,
        p95,
        iqr: p75 - p25,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn extended_summary_matches_the_reference_values() {
        let values: Vec<f32> = (1..=10).map(|v| v as f32).collect();
        let summary =
            hemisphere_summary(&values, Hemisphere::Left, DEFAULT_OUTLIER_THRESHOLD).unwrap();
        // Mean over 1..9 only; order statistics over all ten values.
        assert_abs_diff_eq!(5.0, summary.mean, epsilon = 1e-12);
        assert_abs_diff_eq!(5.5, summary.median, epsilon = 1e-12);
        assert_abs_diff_eq!(3.25, summary.p25, epsilon = 1e-12);
        assert_abs_diff_eq!(7.75, summary.p75, epsilon = 1e-12);
        assert_abs_diff_eq!(4.5, summary.iqr, epsilon = 1e-12);
    }

    #[test]
    fn nan_sentinels_are_dropped_before_any_statistic() {
        let values = vec![f32::NAN, 2.0, f32::NAN, 4.0];
        let summary =
            hemisphere_summary(&values, Hemisphere::Right, DEFAULT_OUTLIER_THRESHOLD).unwrap();
        assert_abs_diff_eq!(3.0, summary.mean, epsilon = 1e-12);
        assert_abs_diff_eq!(3.0, summary.median, epsilon = 1e-12);
    }

    #[test]
    fn empty_filtered_set_is_degenerate_not_nan() {
        let values = vec![f32::NAN, f32::NAN];
        let err = reduce_case(
            &values,
            &[1.0],
            StatisticsProfile::Basic,
            DEFAULT_OUTLIER_THRESHOLD,
        );
        assert!(matches!(
            err,
            Err(GyrificationError::DegenerateStatistics(_))
        ));
    }

    #[test]
    fn all_values_above_threshold_makes_the_extended_mean_degenerate() {
        let values = vec![12.0f32, 15.0, 20.0];
        let err = hemisphere_summary(&values, Hemisphere::Left, DEFAULT_OUTLIER_THRESHOLD);
        assert!(matches!(
            err,
            Err(GyrificationError::DegenerateStatistics(_))
        ));
    }

    #[test]
    fn basic_profile_averages_the_hemisphere_means() {
        let stats = reduce_case(
            &[1.0, 3.0],
            &[5.0, f32::NAN, 7.0],
            StatisticsProfile::Basic,
            DEFAULT_OUTLIER_THRESHOLD,
        )
        .unwrap();
        match stats {
            CaseStats::Basic(b) => {
                assert_abs_diff_eq!(2.0, b.left_mean, epsilon = 1e-12);
                assert_abs_diff_eq!(6.0, b.right_mean, epsilon = 1e-12);
                assert_abs_diff_eq!(4.0, b.brain_mean, epsilon = 1e-12);
            }
            _ => panic!("expected basic stats"),
        }
    }
}
