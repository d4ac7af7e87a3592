//! Utility functions used in all other gyrification modules.

use std::path::Path;

/// Check whether the file extension ends with ".gz".
pub fn is_gz_file<P>(path: P) -> bool
where
    P: AsRef<Path>,
{
    path.as_ref()
        .file_name()
        .map(|a| a.to_string_lossy().ends_with(".gz"))
        .unwrap_or(false)
}

/// Median of a coordinate sample. The input does not need to be sorted.
/// Returns `None` for an empty sample.
pub fn median_usize(values: &[usize]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0)
    } else {
        Some(sorted[mid] as f64)
    }
}

/// Round a non-negative value to the nearest integer, ties to even.
/// This is the convention of the historical tooling, so split plane
/// coordinates derived from a `.5` median stay identical to it.
pub fn round_half_even(v: f64) -> usize {
    let floor = v.floor();
    let frac = v - floor;
    let down = floor as usize;
    if frac > 0.5 {
        down + 1
    } else if frac < 0.5 {
        down
    } else if down % 2 == 0 {
        down
    } else {
        down + 1
    }
}

/// Linear-interpolation percentile of a sorted sample, with `p` in [0, 100].
/// This matches the standard linear method: rank = p/100 * (n - 1), with
/// interpolation between the two bracketing order statistics.
/// The input MUST be sorted ascending. Returns `None` for an empty sample.
pub fn percentile_sorted(sorted: &[f32], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    if sorted.len() == 1 {
        return Some(sorted[0] as f64);
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] as f64 + frac * (sorted[hi] as f64 - sorted[lo] as f64))
}
