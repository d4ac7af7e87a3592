//! Functions for managing multi-label brain segmentation volumes in binary 'vvol' files.
//!
//! A vvol file stores one unsigned byte per voxel, either an ROI code from the
//! segmentation label table or a 0/1 value for a binary mask, together with the
//! physical-space origin of the volume. Keeping the origin with every mask written
//! from the same segmentation guarantees that the exported surfaces stay aligned.

use byteordered::ByteOrdered;
use flate2::bufread::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::{Array3, Zip};
use serde::{Deserialize, Serialize};

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{GyrificationError, Result};
use crate::util::is_gz_file;

pub const VVOL_MAGIC: i32 = 0x5656_4C31; // "VVL1"

/// A 3D boolean mask stored as 0/1 bytes, axis 0 being the left-right axis
/// and axis 1 the posterior-anterior (coronal slicing) axis.
pub type BinaryMask = Array3<u8>;

/// The ROI code table of the multi-label segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiTable {
    pub white_matter: u8,
    pub internal_csf: u8,
    pub cerebellum: u8,
    pub external_csf: u8,
    pub cortical_gray_matter: u8,
    pub deep_gray_matter: u8,
    pub brainstem: u8,
    pub corpus_callosum: u8,
}

impl Default for RoiTable {
    fn default() -> RoiTable {
        RoiTable {
            white_matter: 1,
            internal_csf: 2,
            cerebellum: 3,
            external_csf: 4,
            cortical_gray_matter: 5,
            deep_gray_matter: 6,
            brainstem: 7,
            corpus_callosum: 8,
        }
    }
}

/// How the tissue masks are derived from the ROI codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoiPolicy {
    /// Direct code membership for wm, cgm and cc. No derived exclusions.
    Minimal,
    /// The cortical mask starts from anything that is not background, with
    /// external CSF, cerebellum and brainstem zeroed, then binarized. The
    /// white matter mask is derived from it by removing cortical gray voxels.
    Extended,
}

/// A voxel volume with one byte per voxel and a physical-space origin.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelVolume {
    pub origin: [f32; 3],
    pub data: Array3<u8>,
}

impl VoxelVolume {
    /// Read a voxel volume from a file.
    /// If the file's name ends with ".gz", the file is assumed to need GZip decoding.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<VoxelVolume> {
        let gz = is_gz_file(&path);
        let file = BufReader::new(File::open(path)?);
        if gz {
            VoxelVolume::from_reader(GzDecoder::new(file))
        } else {
            VoxelVolume::from_reader(file)
        }
    }

    /// Read a voxel volume from the given byte stream.
    /// It is assumed that the input is currently at the start of the vvol header.
    pub fn from_reader<S>(input: S) -> Result<VoxelVolume>
    where
        S: Read,
    {
        let mut input = ByteOrdered::be(input);

        let magic = input.read_i32()?;
        if magic != VVOL_MAGIC {
            return Err(GyrificationError::InvalidVoxelVolumeFormat);
        }

        let dim1 = input.read_i32()? as usize;
        let dim2 = input.read_i32()? as usize;
        let dim3 = input.read_i32()? as usize;

        let mut origin = [0.; 3];
        for v in &mut origin {
            *v = input.read_f32()?;
        }

        let num_voxels = dim1 * dim2 * dim3;
        let mut input = input.into_inner();
        let mut voxels: Vec<u8> = vec![0; num_voxels];
        input.read_exact(&mut voxels)?;

        let data = Array3::from_shape_vec((dim1, dim2, dim3), voxels)
            .map_err(|_| GyrificationError::InvalidVoxelVolumeFormat)?;

        Ok(VoxelVolume { origin, data })
    }

    /// Write this volume to a file, GZip-compressed if the file's name ends with ".gz".
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let gz = is_gz_file(&path);
        let file = BufWriter::new(File::create(path)?);
        if gz {
            self.write_to(GzEncoder::new(file, Compression::default()))
        } else {
            self.write_to(file)
        }
    }

    /// Write this volume to the given byte stream.
    pub fn write_to<S>(&self, output: S) -> Result<()>
    where
        S: Write,
    {
        let mut output = ByteOrdered::be(output);

        output.write_i32(VVOL_MAGIC)?;
        let (dim1, dim2, dim3) = self.data.dim();
        for d in &[dim1, dim2, dim3] {
            output.write_i32(*d as i32)?;
        }
        for v in &self.origin {
            output.write_f32(*v)?;
        }
        for v in self.data.iter() {
            output.write_u8(*v)?;
        }
        Ok(())
    }

    /// Wrap a binary mask as a volume, carrying over the origin of the
    /// segmentation it was derived from.
    pub fn from_mask(origin: [f32; 3], mask: BinaryMask) -> VoxelVolume {
        VoxelVolume { origin, data: mask }
    }

    /// A 0/1 mask of the voxels carrying the given ROI code.
    pub fn roi_mask(&self, code: u8) -> BinaryMask {
        self.data.mapv(|v| (v == code) as u8)
    }

    /// Number of non-zero voxels.
    pub fn num_foreground_voxels(&self) -> usize {
        self.data.iter().filter(|v| **v != 0).count()
    }
}

/// The binary tissue masks derived from one labeled volume.
#[derive(Debug, Clone, PartialEq)]
pub struct TissueMasks {
    pub white_matter: BinaryMask,
    pub cortical_gray_matter: BinaryMask,
    pub corpus_callosum: BinaryMask,
}

/// Build the cortical gray matter mask under the extended policy: anything
/// non-background counts, with external CSF, cerebellum and brainstem zeroed,
/// then any remaining positive value binarized to 1.
pub fn cortical_mask_extended(volume: &VoxelVolume, roi: &RoiTable) -> BinaryMask {
    volume.data.mapv(|v| {
        if v == 0 || v == roi.external_csf || v == roi.cerebellum || v == roi.brainstem {
            0
        } else {
            1
        }
    })
}

/// Derive the tissue masks under the minimal policy: direct code membership.
pub fn tissue_masks_minimal(volume: &VoxelVolume, roi: &RoiTable) -> TissueMasks {
    TissueMasks {
        white_matter: volume.roi_mask(roi.white_matter),
        cortical_gray_matter: volume.roi_mask(roi.cortical_gray_matter),
        corpus_callosum: volume.roi_mask(roi.corpus_callosum),
    }
}

/// Derive the tissue masks under the extended policy, given the (possibly
/// component-filtered) cortical mask. The white matter mask is the cortical
/// mask with the cortical gray voxels themselves removed, so it inherits any
/// filtering applied to the cortical mask beforehand.
pub fn tissue_masks_extended(
    volume: &VoxelVolume,
    roi: &RoiTable,
    cortical: BinaryMask,
) -> TissueMasks {
    let mut white_matter = cortical.clone();
    Zip::from(&mut white_matter)
        .and(&volume.data)
        .apply(|w, &code| {
            if code == roi.cortical_gray_matter {
                *w = 0;
            }
        });
    TissueMasks {
        white_matter,
        cortical_gray_matter: cortical,
        corpus_callosum: volume.roi_mask(roi.corpus_callosum),
    }
}

/// Combined white matter for hemisphere export: wm OR corpus callosum. The
/// corpus callosum contributes to both hemispheres' white matter before the
/// split plane divides it.
pub fn combined_white_matter(masks: &TissueMasks) -> BinaryMask {
    let mut combined = masks.white_matter.clone();
    Zip::from(&mut combined)
        .and(&masks.corpus_callosum)
        .apply(|w, &c| {
            if c != 0 {
                *w = 1;
            }
        });
    combined
}
