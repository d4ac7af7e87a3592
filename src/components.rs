//! Connected component labeling for binary masks.
//!
//! Used in two places: per-coronal-slice 2D labeling (8-connectivity) for the
//! spurious component filter, and volumetric 3D labeling (26-connectivity) for
//! the two-largest-components hemisphere split strategy.
//!
//! Labels are assigned in raster scan order, so component ids are deterministic
//! for a given mask: the component whose first voxel comes earliest in scan
//! order gets id 1, and so on.

use ndarray::{Array2, Array3, ArrayView2, ArrayViewMut2, Axis};

use crate::volume::BinaryMask;

/// A 2D component labeling: 0 is background, components are numbered from 1.
/// `sizes[i]` is the voxel count of component `i + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceLabeling {
    pub labels: Array2<u32>,
    pub sizes: Vec<usize>,
}

/// A 3D component labeling, same conventions as [`SliceLabeling`].
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeLabeling {
    pub labels: Array3<u32>,
    pub sizes: Vec<usize>,
}

/// Label the 8-connected components of a 2D binary slice.
pub fn label_components_2d(mask: ArrayView2<u8>) -> SliceLabeling {
    let (nx, nz) = mask.dim();
    let mut labels = Array2::<u32>::zeros((nx, nz));
    let mut sizes: Vec<usize> = Vec::new();
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for x in 0..nx {
        for z in 0..nz {
            if mask[[x, z]] == 0 || labels[[x, z]] != 0 {
                continue;
            }
            let id = sizes.len() as u32 + 1;
            let mut count = 0usize;
            labels[[x, z]] = id;
            stack.push((x, z));
            while let Some((cx, cz)) = stack.pop() {
                count += 1;
                for dx in -1i64..=1 {
                    for dz in -1i64..=1 {
                        if dx == 0 && dz == 0 {
                            continue;
                        }
                        let nx_ = cx as i64 + dx;
                        let nz_ = cz as i64 + dz;
                        if nx_ < 0 || nz_ < 0 || nx_ >= nx as i64 || nz_ >= nz as i64 {
                            continue;
                        }
                        let n = (nx_ as usize, nz_ as usize);
                        if mask[[n.0, n.1]] != 0 && labels[[n.0, n.1]] == 0 {
                            labels[[n.0, n.1]] = id;
                            stack.push(n);
                        }
                    }
                }
            }
            sizes.push(count);
        }
    }

    SliceLabeling { labels, sizes }
}

/// Label the 26-connected components of a 3D binary mask.
pub fn label_components_3d(mask: &BinaryMask) -> VolumeLabeling {
    let (nx, ny, nz) = mask.dim();
    let mut labels = Array3::<u32>::zeros((nx, ny, nz));
    let mut sizes: Vec<usize> = Vec::new();
    let mut stack: Vec<(usize, usize, usize)> = Vec::new();

    for x in 0..nx {
        for y in 0..ny {
            for z in 0..nz {
                if mask[[x, y, z]] == 0 || labels[[x, y, z]] != 0 {
                    continue;
                }
                let id = sizes.len() as u32 + 1;
                let mut count = 0usize;
                labels[[x, y, z]] = id;
                stack.push((x, y, z));
                while let Some((cx, cy, cz)) = stack.pop() {
                    count += 1;
                    for dx in -1i64..=1 {
                        for dy in -1i64..=1 {
                            for dz in -1i64..=1 {
                                if dx == 0 && dy == 0 && dz == 0 {
                                    continue;
                                }
                                let nx_ = cx as i64 + dx;
                                let ny_ = cy as i64 + dy;
                                let nz_ = cz as i64 + dz;
                                if nx_ < 0
                                    || ny_ < 0
                                    || nz_ < 0
                                    || nx_ >= nx as i64
                                    || ny_ >= ny as i64
                                    || nz_ >= nz as i64
                                {
                                    continue;
                                }
                                let n = (nx_ as usize, ny_ as usize, nz_ as usize);
                                if mask[[n.0, n.1, n.2]] != 0 && labels[[n.0, n.1, n.2]] == 0 {
                                    labels[[n.0, n.1, n.2]] = id;
                                    stack.push(n);
                                }
                            }
                        }
                    }
                }
                sizes.push(count);
            }
        }
    }

    VolumeLabeling { labels, sizes }
}

/// Zero the small 8-connected 2D components of `mask`, slice by slice along
/// the coronal axis, restricted to the coronal span of `ventricle`.
///
/// This is the heuristic that excises the fourth ventricle and aqueduct, which
/// otherwise falsely join disconnected gray matter regions: only components of
/// at least `size_threshold` voxels survive within the ventricle span. Slices
/// outside the span are left untouched, and each touched slice ends up strictly
/// binary again.
pub fn remove_spurious_components(
    mask: &mut BinaryMask,
    ventricle: &BinaryMask,
    size_threshold: usize,
) {
    let span = coronal_span(ventricle);
    let (y_min, y_max) = match span {
        Some(span) => span,
        None => return, // no reference voxels, nothing to restrict to
    };

    for y in y_min..=y_max {
        let mut slice: ArrayViewMut2<u8> = mask.index_axis_mut(Axis(1), y);
        let labeling = label_components_2d(slice.view());
        if labeling.sizes.is_empty() {
            continue;
        }
        for (voxel, label) in slice.iter_mut().zip(labeling.labels.iter()) {
            *voxel = if *label == 0 {
                0
            } else if labeling.sizes[(*label - 1) as usize] < size_threshold {
                0
            } else {
                1
            };
        }
    }
}

/// The inclusive range of coronal (axis 1) indices containing foreground voxels.
fn coronal_span(mask: &BinaryMask) -> Option<(usize, usize)> {
    let ny = mask.dim().1;
    let mut y_min = None;
    let mut y_max = None;
    for y in 0..ny {
        if mask.index_axis(Axis(1), y).iter().any(|v| *v != 0) {
            if y_min.is_none() {
                y_min = Some(y);
            }
            y_max = Some(y);
        }
    }
    match (y_min, y_max) {
        (Some(lo), Some(hi)) => Some((lo, hi)),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::{arr2, Array3};

    #[test]
    fn diagonal_pixels_are_8_connected() {
        let slice = arr2(&[
            [1u8, 0, 0, 0],
            [0, 1, 0, 0],
            [0, 0, 0, 1],
            [0, 0, 0, 1],
        ]);
        let labeling = label_components_2d(slice.view());
        assert_eq!(2, labeling.sizes.len());
        assert_eq!(vec![2, 2], labeling.sizes);
        assert_eq!(labeling.labels[[0, 0]], labeling.labels[[1, 1]]);
        assert_ne!(labeling.labels[[0, 0]], labeling.labels[[2, 3]]);
    }

    #[test]
    fn volumetric_labeling_uses_26_connectivity() {
        let mut mask = Array3::<u8>::zeros((4, 4, 4));
        // Two voxels touching only across a cube corner: one component.
        mask[[0, 0, 0]] = 1;
        mask[[1, 1, 1]] = 1;
        // A voxel two steps away: a second component.
        mask[[3, 3, 3]] = 1;
        let labeling = label_components_3d(&mask);
        assert_eq!(2, labeling.sizes.len());
        assert_eq!(labeling.labels[[0, 0, 0]], labeling.labels[[1, 1, 1]]);
        assert_ne!(labeling.labels[[0, 0, 0]], labeling.labels[[3, 3, 3]]);
    }

    #[test]
    fn labels_are_assigned_in_scan_order() {
        let mut mask = Array3::<u8>::zeros((5, 1, 1));
        mask[[0, 0, 0]] = 1;
        mask[[2, 0, 0]] = 1;
        mask[[4, 0, 0]] = 1;
        let labeling = label_components_3d(&mask);
        assert_eq!(1, labeling.labels[[0, 0, 0]]);
        assert_eq!(2, labeling.labels[[2, 0, 0]]);
        assert_eq!(3, labeling.labels[[4, 0, 0]]);
    }

    #[test]
    fn spurious_filter_only_touches_the_ventricle_span() {
        let mut mask = Array3::<u8>::zeros((3, 4, 3));
        // One small component per coronal slice.
        for y in 0..4 {
            mask[[1, y, 1]] = 1;
        }
        let mut ventricle = Array3::<u8>::zeros((3, 4, 3));
        ventricle[[0, 1, 0]] = 1;
        ventricle[[0, 2, 0]] = 1;

        remove_spurious_components(&mut mask, &ventricle, 2);

        assert_eq!(1, mask[[1, 0, 1]]); // outside span, untouched
        assert_eq!(0, mask[[1, 1, 1]]); // inside span, below threshold
        assert_eq!(0, mask[[1, 2, 1]]);
        assert_eq!(1, mask[[1, 3, 1]]); // outside span, untouched
    }

    #[test]
    fn spurious_filter_keeps_large_components() {
        let mut mask = Array3::<u8>::zeros((6, 1, 6));
        for x in 0..6 {
            for z in 0..3 {
                mask[[x, 0, z]] = 1; // 18 voxels, one blob
            }
        }
        mask[[5, 0, 5]] = 1; // lone voxel
        let mut ventricle = Array3::<u8>::zeros((6, 1, 6));
        ventricle[[0, 0, 0]] = 1;

        remove_spurious_components(&mut mask, &ventricle, 10);

        assert_eq!(1, mask[[0, 0, 0]]);
        assert_eq!(1, mask[[5, 0, 2]]);
        assert_eq!(0, mask[[5, 0, 5]]);
    }

    #[test]
    fn empty_ventricle_leaves_mask_unchanged() {
        let mut mask = Array3::<u8>::zeros((3, 3, 3));
        mask[[1, 1, 1]] = 1;
        let ventricle = Array3::<u8>::zeros((3, 3, 3));
        let before = mask.clone();
        remove_spurious_components(&mut mask, &ventricle, 300);
        assert_eq!(before, mask);
    }
}
