//! Estimation and application of the left/right hemisphere split plane.
//!
//! The split is a single coordinate along the left-right axis (axis 0). Two
//! interchangeable estimation strategies are supported: the median of the
//! corpus callosum voxel coordinates, and the midpoint between the facing
//! extents of the two largest white matter components.

use ndarray::Array1;
use ndarray_stats::QuantileExt;
use serde::{Deserialize, Serialize};

use crate::components::label_components_3d;
use crate::error::{GyrificationError, Result};
use crate::util::{median_usize, round_half_even};
use crate::volume::{combined_white_matter, BinaryMask, TissueMasks};

/// One side of the split plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    Left,
    Right,
}

impl Hemisphere {
    pub const BOTH: [Hemisphere; 2] = [Hemisphere::Left, Hemisphere::Right];

    /// The tag used in artifact file names, e.g. `wm_left.vvol.gz`.
    pub fn tag(&self) -> &'static str {
        match self {
            Hemisphere::Left => "left",
            Hemisphere::Right => "right",
        }
    }
}

/// How the split plane coordinate is estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    /// Median of the corpus callosum voxel coordinates along axis 0,
    /// rounded with ties to even.
    MedianCorpusCallosum,
    /// Midpoint of the facing extents of the two largest 26-connected
    /// components of wm|cc, oriented by mean coordinate.
    TwoLargestComponents,
}

/// Compute the split plane coordinate for the given tissue masks.
///
/// An empty corpus callosum (median strategy) or fewer than two white matter
/// components (two-largest strategy) is a fatal configuration error for the
/// case; no default coordinate is ever substituted.
pub fn compute_split_plane(masks: &TissueMasks, strategy: SplitStrategy) -> Result<usize> {
    match strategy {
        SplitStrategy::MedianCorpusCallosum => split_plane_median_cc(masks),
        SplitStrategy::TwoLargestComponents => split_plane_two_largest(masks),
    }
}

fn split_plane_median_cc(masks: &TissueMasks) -> Result<usize> {
    let coords: Vec<usize> = masks
        .corpus_callosum
        .indexed_iter()
        .filter(|(_, v)| **v != 0)
        .map(|((x, _, _), _)| x)
        .collect();
    let median = median_usize(&coords)
        .ok_or_else(|| GyrificationError::EmptyRoiMask(String::from("corpus callosum")))?;
    Ok(round_half_even(median))
}

fn split_plane_two_largest(masks: &TissueMasks) -> Result<usize> {
    let combined = combined_white_matter(masks);
    let labeling = label_components_3d(&combined);
    if labeling.sizes.len() < 2 {
        return Err(GyrificationError::TooFewComponents(labeling.sizes.len()));
    }

    // Rank components by voxel count descending. The sort is stable and the
    // candidates are pushed in ascending id order, so count ties resolve to
    // the first-encountered label id.
    let mut ranked: Vec<(u32, usize)> = labeling
        .sizes
        .iter()
        .enumerate()
        .map(|(idx, size)| (idx as u32 + 1, *size))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let coords_a = component_axis_coords(&labeling.labels, ranked[0].0);
    let coords_b = component_axis_coords(&labeling.labels, ranked[1].0);

    let mean_a = coords_a.mapv(|v| v as f64).mean().unwrap_or(0.0);
    let mean_b = coords_b.mapv(|v| v as f64).mean().unwrap_or(0.0);

    // The components are non-empty by construction, min/max cannot fail.
    let split = if mean_a > mean_b {
        let lo = *coords_a.min().unwrap();
        let hi = *coords_b.max().unwrap();
        0.5 * (lo + hi) as f64
    } else {
        let lo = *coords_a.max().unwrap();
        let hi = *coords_b.min().unwrap();
        0.5 * (lo + hi) as f64
    };
    Ok(round_half_even(split))
}

fn component_axis_coords(labels: &ndarray::Array3<u32>, id: u32) -> Array1<usize> {
    let coords: Vec<usize> = labels
        .indexed_iter()
        .filter(|(_, label)| **label == id)
        .map(|((x, _, _), _)| x)
        .collect();
    Array1::from(coords)
}

/// Restrict a mask to one side of the split plane.
///
/// The left hemisphere keeps voxels with coordinate strictly below `plane`;
/// the voxel at exactly `plane` belongs to the right hemisphere. Every voxel
/// lands on exactly one side.
pub fn apply_split(mask: &BinaryMask, plane: usize, side: Hemisphere) -> BinaryMask {
    let mut out = mask.clone();
    for ((x, _, _), v) in out.indexed_iter_mut() {
        let keep = match side {
            Hemisphere::Left => x < plane,
            Hemisphere::Right => x >= plane,
        };
        if !keep {
            *v = 0;
        }
    }
    out
}
