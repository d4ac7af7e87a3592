//! The persistent CSV ledger of processed cases.
//!
//! One row per patient, fixed header per statistics profile, kept sorted in
//! ascending patient id order. The ledger is the batch driver's skip gate:
//! a patient with a row is never reprocessed.
//!
//! Contract: `append` does NOT deduplicate. Callers must check `is_processed`
//! first; two unguarded appends with the same patient id produce two rows.

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tempfile::NamedTempFile;
use tracing::info;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::error::{GyrificationError, Result};
use crate::stats::{CaseStats, StatisticsProfile};

const BASIC_COLUMNS: [&str; 5] = [
    "Patient ID",
    "Condition",
    "Mean LGI left hemisphere",
    "Mean LGI right hemisphere",
    "Mean LGI",
];

const EXTENDED_COLUMNS: [&str; 16] = [
    "Patient ID",
    "Condition",
    "Mean LGI left hemisphere",
    "Mean LGI right hemisphere",
    "Median LGI left hemisphere",
    "Median LGI right hemisphere",
    "p5 LGI left hemisphere",
    "p5 LGI right hemisphere",
    "p25 LGI left hemisphere",
    "p25 LGI right hemisphere",
    "p75 LGI left hemisphere",
    "p75 LGI right hemisphere",
    "p95 LGI left hemisphere",
    "p95 LGI right hemisphere",
    "IQR LGI left hemisphere",
    "IQR LGI right hemisphere",
];

/// The header row for the given statistics profile.
pub fn ledger_columns(profile: StatisticsProfile) -> &'static [&'static str] {
    match profile {
        StatisticsProfile::Basic => &BASIC_COLUMNS,
        StatisticsProfile::Extended => &EXTENDED_COLUMNS,
    }
}

/// One fully processed case. Created once per patient, never mutated after
/// insertion into the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseRecord {
    pub patient_id: String,
    pub condition: String,
    pub stats: CaseStats,
}

impl CaseRecord {
    fn to_row(&self) -> Vec<String> {
        let mut row = vec![self.patient_id.clone(), self.condition.clone()];
        match &self.stats {
            CaseStats::Basic(b) => {
                row.push(b.left_mean.to_string());
                row.push(b.right_mean.to_string());
                row.push(b.brain_mean.to_string());
            }
            CaseStats::Extended { left, right } => {
                for &(l, r) in [
                    (left.mean, right.mean),
                    (left.median, right.median),
                    (left.p5, right.p5),
                    (left.p25, right.p25),
                    (left.p75, right.p75),
                    (left.p95, right.p95),
                    (left.iqr, right.iqr),
                ]
                .iter()
                {
                    row.push(l.to_string());
                    row.push(r.to_string());
                }
            }
        }
        row
    }
}

/// The ledger backed by one CSV file.
#[derive(Debug, Clone)]
pub struct CaseLedger {
    path: PathBuf,
    profile: StatisticsProfile,
}

impl CaseLedger {
    pub fn new<P: AsRef<Path>>(path: P, profile: StatisticsProfile) -> CaseLedger {
        CaseLedger {
            path: path.as_ref().to_path_buf(),
            profile,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All data rows in physical file order. Readers must treat the order as
    /// informational: a crash between append and resort leaves the file
    /// unsorted but still valid.
    pub fn rows(&self) -> Result<Vec<StringRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = ReaderBuilder::new().has_headers(true).from_path(&self.path)?;
        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record?);
        }
        Ok(rows)
    }

    /// Whether a row for this patient id already exists. Purely a skip gate;
    /// the ledger knows nothing about partially processed cases.
    pub fn is_processed(&self, patient_id: &str) -> Result<bool> {
        Ok(self
            .rows()?
            .iter()
            .any(|row| row.get(0) == Some(patient_id)))
    }

    /// Append one row, creating the file with its header first if needed.
    pub fn append(&self, record: &CaseRecord) -> Result<()> {
        if record.stats.profile() != self.profile {
            return Err(GyrificationError::InvalidConfig(format!(
                "ledger is configured for the {:?} profile, record carries {:?}",
                self.profile,
                record.stats.profile()
            )));
        }

        let exists = self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if !exists {
            info!(ledger = %self.path.display(), "creating ledger");
            writer.write_record(ledger_columns(self.profile))?;
        }
        writer.write_record(&record.to_row())?;
        writer.flush()?;
        info!(patient_id = %record.patient_id, "ledger row appended");
        Ok(())
    }

    /// Reload the full ledger, sort rows by patient id ascending and rewrite
    /// the backing file in one atomic rename.
    pub fn resort(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let mut rows = self.rows()?;
        rows.sort_by(|a, b| a.get(0).unwrap_or("").cmp(b.get(0).unwrap_or("")));

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = WriterBuilder::new().from_writer(tmp.as_file());
            writer.write_record(ledger_columns(self.profile))?;
            for row in &rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }
        tmp.persist(&self.path)
            .map_err(|e| GyrificationError::Io(e.error))?;
        Ok(())
    }
}
