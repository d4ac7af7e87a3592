//! Derivation of the four per-hemisphere tissue masks from one labeled volume.
//!
//! This composes the ROI normalization, the spurious component filter and the
//! split plane estimation into a single deterministic step: labeled volume in,
//! wm/cgm masks for both hemispheres out.

use serde::{Deserialize, Serialize};

use crate::components::remove_spurious_components;
use crate::error::Result;
use crate::split::{apply_split, compute_split_plane, Hemisphere, SplitStrategy};
use crate::volume::{
    combined_white_matter, cortical_mask_extended, tissue_masks_extended, tissue_masks_minimal,
    BinaryMask, RoiPolicy, RoiTable, VoxelVolume,
};

/// Size threshold below which an in-plane component is considered spurious.
pub const DEFAULT_COMPONENT_SIZE_THRESHOLD: usize = 300;

/// Options controlling the hemisphere partitioning of a labeled volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionOptions {
    pub roi: RoiTable,
    pub policy: RoiPolicy,
    pub split_strategy: SplitStrategy,
    pub component_size_threshold: usize,
}

impl Default for PartitionOptions {
    fn default() -> PartitionOptions {
        PartitionOptions {
            roi: RoiTable::default(),
            policy: RoiPolicy::Extended,
            split_strategy: SplitStrategy::MedianCorpusCallosum,
            component_size_threshold: DEFAULT_COMPONENT_SIZE_THRESHOLD,
        }
    }
}

/// The four hemisphere masks derived from one labeled volume, plus the split
/// plane coordinate they were cut at.
#[derive(Debug, Clone, PartialEq)]
pub struct HemispherePartition {
    pub split_plane: usize,
    pub wm_left: BinaryMask,
    pub wm_right: BinaryMask,
    pub cgm_left: BinaryMask,
    pub cgm_right: BinaryMask,
}

impl HemispherePartition {
    /// The masks in export order, with their artifact base names.
    pub fn named_masks(&self) -> [(&'static str, &BinaryMask); 4] {
        [
            ("wm_left", &self.wm_left),
            ("cgm_left", &self.cgm_left),
            ("wm_right", &self.wm_right),
            ("cgm_right", &self.cgm_right),
        ]
    }
}

/// Partition a labeled volume into per-hemisphere white and cortical gray
/// matter masks.
///
/// Under the extended policy the cortical mask is component-filtered within
/// the coronal span of the internal CSF (ventricle) mask before the white
/// matter mask is derived from it. The corpus callosum joins the white matter
/// of both hemispheres before the split plane divides it.
pub fn partition_volume(
    volume: &VoxelVolume,
    opts: &PartitionOptions,
) -> Result<HemispherePartition> {
    let masks = match opts.policy {
        RoiPolicy::Minimal => tissue_masks_minimal(volume, &opts.roi),
        RoiPolicy::Extended => {
            let mut cortical = cortical_mask_extended(volume, &opts.roi);
            let ventricle = volume.roi_mask(opts.roi.internal_csf);
            remove_spurious_components(
                &mut cortical,
                &ventricle,
                opts.component_size_threshold,
            );
            tissue_masks_extended(volume, &opts.roi, cortical)
        }
    };

    let split_plane = compute_split_plane(&masks, opts.split_strategy)?;
    let wm = combined_white_matter(&masks);
    let cgm = &masks.cortical_gray_matter;

    Ok(HemispherePartition {
        split_plane,
        wm_left: apply_split(&wm, split_plane, Hemisphere::Left),
        wm_right: apply_split(&wm, split_plane, Hemisphere::Right),
        cgm_left: apply_split(cgm, split_plane, Hemisphere::Left),
        cgm_right: apply_split(cgm, split_plane, Hemisphere::Right),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::Array3;

    /// A 10x10x10 volume with the corpus callosum confined to x = 5, white
    /// matter clusters at x = 2 and x = 7, and cortical gray around them.
    fn synthetic_brain() -> VoxelVolume {
        let roi = RoiTable::default();
        let mut data = Array3::<u8>::zeros((10, 10, 10));
        for y in 3..7 {
            for z in 3..7 {
                data[[5, y, z]] = roi.corpus_callosum;
                data[[2, y, z]] = roi.white_matter;
                data[[7, y, z]] = roi.white_matter;
                data[[1, y, z]] = roi.cortical_gray_matter;
                data[[3, y, z]] = roi.cortical_gray_matter;
                data[[6, y, z]] = roi.cortical_gray_matter;
                data[[8, y, z]] = roi.cortical_gray_matter;
            }
        }
        VoxelVolume {
            origin: [0.; 3],
            data,
        }
    }

    #[test]
    fn hemisphere_masks_are_disjoint_and_cover_the_combined_mask() {
        let volume = synthetic_brain();
        let opts = PartitionOptions {
            policy: RoiPolicy::Minimal,
            ..PartitionOptions::default()
        };
        let part = partition_volume(&volume, &opts).unwrap();
        assert_eq!(5, part.split_plane);

        let roi = RoiTable::default();
        for ((x, y, z), code) in volume.data.indexed_iter() {
            let in_combined =
                *code == roi.white_matter || *code == roi.corpus_callosum;
            let l = part.wm_left[[x, y, z]];
            let r = part.wm_right[[x, y, z]];
            assert_eq!(in_combined as u8, l + r);
            if in_combined {
                // cc sits at x = 5 = split plane, so it lands right; the
                // x = 2 cluster is left, the x = 7 cluster right.
                assert_eq!((x < 5) as u8, l);
                assert_eq!((x >= 5) as u8, r);
            }
        }
    }

    #[test]
    fn cortical_masks_split_at_the_same_plane() {
        let volume = synthetic_brain();
        let opts = PartitionOptions {
            policy: RoiPolicy::Minimal,
            ..PartitionOptions::default()
        };
        let part = partition_volume(&volume, &opts).unwrap();
        assert!(part.cgm_left.indexed_iter().all(|((x, _, _), v)| *v == 0 || x < 5));
        assert!(part.cgm_right.indexed_iter().all(|((x, _, _), v)| *v == 0 || x >= 5));
    }

    #[test]
    fn extended_policy_merges_non_background_tissue_into_the_cortical_mask() {
        let volume = synthetic_brain();
        let part = partition_volume(&volume, &PartitionOptions::default()).unwrap();
        // Under the extended policy every non-background voxel joins the
        // cortical mask, so the wm cluster at x = 2 shows up in cgm_left...
        assert_eq!(1, part.cgm_left[[2, 4, 4]]);
        // ...but the cortical voxels themselves are removed from wm.
        assert_eq!(0, part.wm_left[[1, 4, 4]]);
        assert_eq!(1, part.wm_left[[2, 4, 4]]);
    }
}
