//! The batch driver: per-case pipeline plus ledger bookkeeping.
//!
//! One case flows through three stages: export (partition the segmentation,
//! export the four hemisphere masks as surfaces), metric (one external
//! invocation per hemisphere, with scalar map files reused when already
//! present) and reduce (statistics into the ledger). A case failure is
//! isolated: it is logged with its id and condition, and the batch moves on.
//! The ledger is only touched on full success of a case.

use tracing::{error, info, warn};

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{ConditionGroup, PipelineConfig};
use crate::error::{GyrificationError, Result};
use crate::exec::ToolCommand;
use crate::ledger::{CaseLedger, CaseRecord};
use crate::partition::partition_volume;
use crate::scalars::read_scalar_map;
use crate::split::Hemisphere;
use crate::stats::reduce_case;
use crate::status::{CaseStage, CaseStatusStore};
use crate::volume::VoxelVolume;

/// One case to process: a patient id, its condition label and the folder
/// holding its segmentation.
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub patient_id: String,
    pub condition: String,
    pub folder: PathBuf,
}

/// Enumerate the cases of the configured condition groups.
///
/// Directory entries whose names contain a `.` are skipped; everything else
/// counts as a case identifier. Entries are sorted per folder so the batch
/// order is stable across runs.
pub fn discover_cases(groups: &[ConditionGroup]) -> Result<Vec<Case>> {
    let mut cases = Vec::new();
    for group in groups {
        for folder in &group.folders {
            let mut names: Vec<String> = Vec::new();
            for entry in fs::read_dir(folder)? {
                let entry = entry?;
                let name = entry.file_name().to_string_lossy().into_owned();
                if !name.contains('.') {
                    names.push(name);
                }
            }
            names.sort();
            for name in names {
                cases.push(Case {
                    patient_id: name.clone(),
                    condition: group.condition.clone(),
                    folder: folder.join(name),
                });
            }
        }
    }
    Ok(cases)
}

/// Turns a binary mask volume into a saved polygonal surface file.
pub trait MeshExporter {
    /// Export `mask` as a surface at `surface_path`. The mask carries the
    /// physical-space origin of the segmentation it came from, so surfaces
    /// from the same volume stay aligned.
    fn export(&self, mask: &VoxelVolume, surface_path: &Path) -> Result<()>;
}

/// Computes a per-vertex scalar map from a cortical/white surface pair.
pub trait MetricComputer {
    /// Run the metric computation for one hemisphere, writing its scalar map
    /// file into `out_dir`. The kernel size is passed through unchanged.
    fn compute(
        &self,
        cgm_surface: &Path,
        wm_surface: &Path,
        kernel_size: u32,
        out_dir: &Path,
    ) -> Result<()>;
}

impl<T: MeshExporter + ?Sized> MeshExporter for &T {
    fn export(&self, mask: &VoxelVolume, surface_path: &Path) -> Result<()> {
        (**self).export(mask, surface_path)
    }
}

impl<T: MetricComputer + ?Sized> MetricComputer for &T {
    fn compute(
        &self,
        cgm_surface: &Path,
        wm_surface: &Path,
        kernel_size: u32,
        out_dir: &Path,
    ) -> Result<()> {
        (**self).compute(cgm_surface, wm_surface, kernel_size, out_dir)
    }
}

/// Mesh export through an external conversion tool.
///
/// The mask is written next to the target surface as a vvol file and the tool
/// is invoked with the mask path and the surface path appended to its
/// configured arguments.
pub struct SubprocessMeshExporter {
    pub command: ToolCommand,
    pub timeout: Option<std::time::Duration>,
}

impl MeshExporter for SubprocessMeshExporter {
    fn export(&self, mask: &VoxelVolume, surface_path: &Path) -> Result<()> {
        let mask_path = surface_path.with_extension("vvol.gz");
        mask.to_file(&mask_path)?;
        let command = self
            .command
            .clone()
            .arg(mask_path.to_string_lossy())
            .arg(surface_path.to_string_lossy());
        command.run_checked(self.timeout)?;
        Ok(())
    }
}

/// Metric computation through an external tool, mirroring the historical
/// invocation: `-i <cgm> --white <wm> --out <dir> --kernel <n>`.
pub struct SubprocessMetricComputer {
    pub command: ToolCommand,
    pub timeout: Option<std::time::Duration>,
}

impl MetricComputer for SubprocessMetricComputer {
    fn compute(
        &self,
        cgm_surface: &Path,
        wm_surface: &Path,
        kernel_size: u32,
        out_dir: &Path,
    ) -> Result<()> {
        let command = self
            .command
            .clone()
            .arg("-i")
            .arg(cgm_surface.to_string_lossy())
            .arg("--white")
            .arg(wm_surface.to_string_lossy())
            .arg("--out")
            .arg(out_dir.to_string_lossy())
            .arg("--kernel")
            .arg(kernel_size.to_string());
        command.run_checked(self.timeout)?;
        Ok(())
    }
}

/// What happened to one case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseOutcome {
    Processed,
    Skipped,
}

/// Counts over one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Drives the per-case pipeline over a list of cases.
pub struct BatchOrchestrator<E, M> {
    config: PipelineConfig,
    ledger: CaseLedger,
    status: CaseStatusStore,
    exporter: E,
    computer: M,
}

impl<E: MeshExporter, M: MetricComputer> BatchOrchestrator<E, M> {
    pub fn new(config: PipelineConfig, exporter: E, computer: M) -> Result<BatchOrchestrator<E, M>> {
        config.validate()?;
        fs::create_dir_all(&config.save_folder)?;
        let ledger = CaseLedger::new(config.ledger_path(), config.statistics_profile);
        let status = CaseStatusStore::new(config.status_path());
        Ok(BatchOrchestrator {
            config,
            ledger,
            status,
            exporter,
            computer,
        })
    }

    pub fn ledger(&self) -> &CaseLedger {
        &self.ledger
    }

    /// Process every case in order. Failures are isolated per case and never
    /// abort the batch; no external invocation is retried automatically.
    pub fn run_batch(&self, cases: &[Case]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for case in cases {
            match self.run_case(case) {
                Ok(CaseOutcome::Processed) => summary.processed += 1,
                Ok(CaseOutcome::Skipped) => summary.skipped += 1,
                Err(e) => {
                    error!(
                        patient_id = %case.patient_id,
                        condition = %case.condition,
                        error = %e,
                        "case failed"
                    );
                    summary.failed += 1;
                }
            }
        }
        info!(
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            "batch finished"
        );
        summary
    }

    /// Run the full pipeline for one case.
    pub fn run_case(&self, case: &Case) -> Result<CaseOutcome> {
        if self.ledger.is_processed(&case.patient_id)? {
            info!(patient_id = %case.patient_id, "already in ledger, skipping");
            return Ok(CaseOutcome::Skipped);
        }
        info!(patient_id = %case.patient_id, condition = %case.condition, "processing case");

        let out_dir = self.config.save_folder.join(&case.patient_id);
        if self.status.stage_of(&case.patient_id)? < CaseStage::MaskExported {
            self.export_stage(case, &out_dir)?;
            self.status
                .set_stage(&case.patient_id, CaseStage::MaskExported)?;
        }

        let left = self.metric_stage(case, &out_dir, Hemisphere::Left)?;
        let right = self.metric_stage(case, &out_dir, Hemisphere::Right)?;
        self.status
            .set_stage(&case.patient_id, CaseStage::MetricComputed)?;

        let stats = reduce_case(
            &left,
            &right,
            self.config.statistics_profile,
            self.config.outlier_threshold,
        )?;
        self.ledger.append(&CaseRecord {
            patient_id: case.patient_id.clone(),
            condition: case.condition.clone(),
            stats,
        })?;
        self.ledger.resort()?;
        self.status
            .set_stage(&case.patient_id, CaseStage::LedgerUpdated)?;
        Ok(CaseOutcome::Processed)
    }

    /// Partition the segmentation and export all four hemisphere masks.
    fn export_stage(&self, case: &Case, out_dir: &Path) -> Result<()> {
        let seg_path = case.folder.join(&self.config.segmentation_file);
        let volume = VoxelVolume::from_file(&seg_path)?;
        let part = partition_volume(&volume, &self.config.partition)?;
        info!(patient_id = %case.patient_id, split_plane = part.split_plane, "volume partitioned");

        fs::create_dir_all(out_dir)?;
        for (name, mask) in part.named_masks().iter() {
            let surface_path = out_dir.join(format!("{}.vtk", name));
            let mask_volume = VoxelVolume::from_mask(volume.origin, (*mask).clone());
            self.exporter.export(&mask_volume, &surface_path)?;
            if !surface_path.exists() {
                return Err(GyrificationError::MissingArtifact(
                    case.patient_id.clone(),
                    format!("export ({})", name),
                ));
            }
        }
        Ok(())
    }

    /// Obtain the scalar map for one hemisphere, computing it only when no
    /// existing file is found.
    fn metric_stage(&self, case: &Case, out_dir: &Path, hemi: Hemisphere) -> Result<Vec<f32>> {
        let scalar_path = match self.find_scalar_map(case, out_dir, hemi)? {
            Some(path) => {
                info!(
                    patient_id = %case.patient_id,
                    hemisphere = hemi.tag(),
                    path = %path.display(),
                    "reusing existing scalar map"
                );
                path
            }
            None => {
                let cgm = out_dir.join(format!("cgm_{}.vtk", hemi.tag()));
                let wm = out_dir.join(format!("wm_{}.vtk", hemi.tag()));
                self.computer
                    .compute(&cgm, &wm, self.config.kernel_size, out_dir)?;
                self.find_scalar_map(case, out_dir, hemi)?.ok_or_else(|| {
                    GyrificationError::MissingArtifact(
                        case.patient_id.clone(),
                        format!("metric ({})", hemi.tag()),
                    )
                })?
            }
        };
        read_scalar_map(&scalar_path, self.config.scalar_load_mode)
    }

    /// Search the case output directory for the hemisphere's scalar map:
    /// file name contains `cgm_<side>` and carries the scalar extension.
    /// Exactly one match is a cache hit; more than one is fatal.
    fn find_scalar_map(
        &self,
        case: &Case,
        out_dir: &Path,
        hemi: Hemisphere,
    ) -> Result<Option<PathBuf>> {
        if !out_dir.exists() {
            return Ok(None);
        }
        let needle = format!("cgm_{}", hemi.tag());
        let mut candidates: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(out_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.contains(&needle) && name.ends_with(&self.config.scalar_extension) {
                candidates.push(entry.path());
            }
        }
        match candidates.len() {
            0 => Ok(None),
            1 => Ok(Some(candidates.remove(0))),
            n => {
                warn!(
                    patient_id = %case.patient_id,
                    hemisphere = hemi.tag(),
                    count = n,
                    "ambiguous scalar map candidates"
                );
                Err(GyrificationError::AmbiguousScalarMap(
                    case.patient_id.clone(),
                    hemi.tag().to_string(),
                ))
            }
        }
    }
}
