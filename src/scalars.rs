//! Functions for managing per-vertex scalar map files.
//!
//! The external metric tool writes one floating point value per line, in the
//! same order as the vertices of the surface it was computed on. Undefined
//! vertices show up as Inf or NaN sentinels.

use flate2::bufread::GzDecoder;
use serde::{Deserialize, Serialize};

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{GyrificationError, Result};
use crate::util::is_gz_file;

/// Default threshold for the outlier-clipping load mode.
pub const DEFAULT_CLIP_THRESHOLD: f32 = 25.0;

/// How raw scalar values are sanitized while loading.
///
/// The two modes are mutually exclusive. `ClipAbove` filters outliers
/// uniformly before any statistic sees the data, which is NOT the same thing
/// as the extended statistics profile's mean-only outlier filter; the two are
/// selected independently and must not be combined
/// (`PipelineConfig::validate` rejects the combination).
///
/// In configuration files this is a table with a `mode` key, e.g.
/// `{ mode = "clip_above", threshold = 25.0 }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScalarLoadMode {
    /// Only remap Inf sentinels to NaN.
    Verbatim,
    /// Remap Inf sentinels and any value above `threshold` to NaN.
    ClipAbove {
        #[serde(default = "default_clip_threshold")]
        threshold: f32,
    },
}

fn default_clip_threshold() -> f32 {
    DEFAULT_CLIP_THRESHOLD
}

impl Default for ScalarLoadMode {
    fn default() -> ScalarLoadMode {
        ScalarLoadMode::Verbatim
    }
}

/// Read a per-vertex scalar map from a file.
/// If the file's name ends with ".gz", the file is assumed to need GZip decoding.
pub fn read_scalar_map<P: AsRef<Path>>(path: P, mode: ScalarLoadMode) -> Result<Vec<f32>> {
    let gz = is_gz_file(&path);
    let file = BufReader::new(File::open(path)?);
    if gz {
        scalar_map_from_reader(GzDecoder::new(file), mode)
    } else {
        scalar_map_from_reader(file, mode)
    }
}

/// Read a per-vertex scalar map from the given byte stream, one value per line.
pub fn scalar_map_from_reader<S>(input: S, mode: ScalarLoadMode) -> Result<Vec<f32>>
where
    S: Read,
{
    let reader = BufReader::new(input);
    let mut values: Vec<f32> = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let raw: f32 = trimmed
            .parse()
            .map_err(|_| GyrificationError::InvalidScalarMapFormat(idx + 1))?;
        values.push(sanitize(raw, mode));
    }
    Ok(values)
}

fn sanitize(value: f32, mode: ScalarLoadMode) -> f32 {
    if value.is_infinite() {
        return f32::NAN;
    }
    match mode {
        ScalarLoadMode::Verbatim => value,
        ScalarLoadMode::ClipAbove { threshold } => {
            if value > threshold {
                f32::NAN
            } else {
                value
            }
        }
    }
}

/// Write a per-vertex scalar map to a file, one value per line.
pub fn write_scalar_map<P: AsRef<Path>>(path: P, values: &[f32]) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    for v in values {
        writeln!(file, "{}", v)?;
    }
    Ok(())
}
