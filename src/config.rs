//! Pipeline configuration.
//!
//! Everything the batch driver needs is explicit configuration: output
//! location, case folders per condition, tissue partitioning options, the
//! statistics profile and the external tool command lines. Nothing is scanned
//! or populated at load time as a side effect.

use serde::{Deserialize, Serialize};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{GyrificationError, Result};
use crate::exec::ToolCommand;
use crate::partition::PartitionOptions;
use crate::scalars::ScalarLoadMode;
use crate::stats::{StatisticsProfile, DEFAULT_OUTLIER_THRESHOLD};

/// Neighborhood size handed through to the metric tool per invocation.
/// The tool's own default is 316; 108 is the neonatal setting.
pub const DEFAULT_KERNEL_SIZE: u32 = 108;

/// File name of the multi-label segmentation inside each case folder.
pub const DEFAULT_SEGMENTATION_FILE: &str = "parcellation.vvol.gz";

/// Extension of the scalar map files written by the metric tool.
pub const DEFAULT_SCALAR_EXTENSION: &str = ".txt";

/// A set of case folders sharing one condition label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionGroup {
    pub condition: String,
    pub folders: Vec<PathBuf>,
}

/// Full configuration of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Where all per-case output and the ledger are written.
    pub save_folder: PathBuf,
    /// Case folder groups, one per condition.
    #[serde(default)]
    pub cases: Vec<ConditionGroup>,
    #[serde(default = "default_segmentation_file")]
    pub segmentation_file: String,
    #[serde(default = "default_scalar_extension")]
    pub scalar_extension: String,
    #[serde(default = "default_kernel_size")]
    pub kernel_size: u32,
    #[serde(default)]
    pub partition: PartitionOptions,
    #[serde(default = "default_statistics_profile")]
    pub statistics_profile: StatisticsProfile,
    #[serde(default = "default_outlier_threshold")]
    pub outlier_threshold: f32,
    #[serde(default)]
    pub scalar_load_mode: ScalarLoadMode,
    /// Tool that turns a mask volume file into a surface file.
    pub mesh_export_tool: Option<ToolCommand>,
    /// Tool that computes the per-vertex metric for one hemisphere.
    pub metric_tool: Option<ToolCommand>,
    /// Upper bound on any single external invocation, in seconds.
    #[serde(default)]
    pub tool_timeout_secs: Option<u64>,
}

fn default_segmentation_file() -> String {
    DEFAULT_SEGMENTATION_FILE.to_string()
}

fn default_scalar_extension() -> String {
    DEFAULT_SCALAR_EXTENSION.to_string()
}

fn default_kernel_size() -> u32 {
    DEFAULT_KERNEL_SIZE
}

fn default_statistics_profile() -> StatisticsProfile {
    StatisticsProfile::Extended
}

fn default_outlier_threshold() -> f32 {
    DEFAULT_OUTLIER_THRESHOLD
}

impl PipelineConfig {
    /// A configuration with all defaults, rooted at the given save folder.
    pub fn new<P: AsRef<Path>>(save_folder: P) -> PipelineConfig {
        PipelineConfig {
            save_folder: save_folder.as_ref().to_path_buf(),
            cases: Vec::new(),
            segmentation_file: default_segmentation_file(),
            scalar_extension: default_scalar_extension(),
            kernel_size: default_kernel_size(),
            partition: PartitionOptions::default(),
            statistics_profile: default_statistics_profile(),
            outlier_threshold: default_outlier_threshold(),
            scalar_load_mode: ScalarLoadMode::default(),
            mesh_export_tool: None,
            metric_tool: None,
            tool_timeout_secs: None,
        }
    }

    /// Load a configuration from a TOML file and validate it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
        let raw = fs::read_to_string(path)?;
        let config: PipelineConfig =
            toml::from_str(&raw).map_err(|e| GyrificationError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field rules the field types cannot express. The clip_above
    /// load mode and the extended statistics profile both filter outliers and
    /// are mutually exclusive.
    pub fn validate(&self) -> Result<()> {
        if let ScalarLoadMode::ClipAbove { .. } = self.scalar_load_mode {
            if self.statistics_profile == StatisticsProfile::Extended {
                return Err(GyrificationError::InvalidConfig(String::from(
                    "the clip_above load mode cannot be combined with the \
                     extended statistics profile; use the basic profile or \
                     verbatim loading",
                )));
            }
        }
        Ok(())
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.save_folder.join("lgi.csv")
    }

    pub fn status_path(&self) -> PathBuf {
        self.save_folder.join("case_status.csv")
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::split::SplitStrategy;
    use crate::volume::RoiPolicy;

    #[test]
    fn minimal_toml_gets_all_defaults() {
        let config: PipelineConfig = toml::from_str("save_folder = \"/tmp/lgi\"").unwrap();
        assert_eq!(PathBuf::from("/tmp/lgi"), config.save_folder);
        assert_eq!(DEFAULT_KERNEL_SIZE, config.kernel_size);
        assert_eq!(StatisticsProfile::Extended, config.statistics_profile);
        assert_eq!(ScalarLoadMode::Verbatim, config.scalar_load_mode);
        assert_eq!(RoiPolicy::Extended, config.partition.policy);
        assert!(config.mesh_export_tool.is_none());
        assert_eq!(PathBuf::from("/tmp/lgi/lgi.csv"), config.ledger_path());
    }

    #[test]
    fn full_toml_overrides_are_honored() {
        let raw = r#"
            save_folder = "/data/save_res_lgi"
            kernel_size = 316
            outlier_threshold = 8.5
            statistics_profile = "basic"

            [[cases]]
            condition = "Control"
            folders = ["/data/controls_a", "/data/controls_b"]

            [[cases]]
            condition = "CDH"
            folders = ["/data/cdh"]

            [partition]
            policy = "minimal"
            split_strategy = "two_largest_components"
            component_size_threshold = 150

            [scalar_load_mode]
            mode = "clip_above"
            threshold = 25.0

            [metric_tool]
            program = "docker"
            args = ["run", "--rm", "cmorph:1.7", "lgi"]
        "#;
        let config: PipelineConfig = toml::from_str(raw).unwrap();
        assert_eq!(316, config.kernel_size);
        assert_eq!(StatisticsProfile::Basic, config.statistics_profile);
        assert_eq!(2, config.cases.len());
        assert_eq!("CDH", config.cases[1].condition);
        assert_eq!(SplitStrategy::TwoLargestComponents, config.partition.split_strategy);
        assert_eq!(150, config.partition.component_size_threshold);
        assert_eq!(
            ScalarLoadMode::ClipAbove { threshold: 25.0 },
            config.scalar_load_mode
        );
        assert_eq!("docker", config.metric_tool.as_ref().unwrap().program);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn clip_above_with_the_extended_profile_is_rejected() {
        // statistics_profile defaults to extended, so clip_above alone is
        // already an invalid combination.
        let raw = "save_folder = \"/tmp/lgi\"\n\n[scalar_load_mode]\nmode = \"clip_above\"\n";
        let config: PipelineConfig = toml::from_str(raw).unwrap();
        assert!(matches!(
            config.validate(),
            Err(GyrificationError::InvalidConfig(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.toml");
        fs::write(&path, raw).unwrap();
        assert!(matches!(
            PipelineConfig::from_file(&path),
            Err(GyrificationError::InvalidConfig(_))
        ));
    }
}
