//! Batch computation of per-hemisphere local gyrification index statistics.
//!
//! The crate partitions a multi-label brain segmentation volume into left and
//! right white/gray matter masks, drives external tools for surface export and
//! per-vertex metric computation, and accumulates per-case summary statistics
//! into a deduplicated, sorted CSV ledger. Runs are resumable: the ledger acts
//! as the skip gate, a per-case stage record gates the expensive stages, and
//! already computed scalar maps are reused.

pub mod components;
pub mod config;
pub mod error;
pub mod exec;
pub mod ledger;
pub mod partition;
pub mod pipeline;
pub mod scalars;
pub mod split;
pub mod stats;
pub mod status;
pub mod util;
pub mod volume;

pub use config::{ConditionGroup, PipelineConfig};
pub use error::{GyrificationError, Result};
pub use exec::{ToolCommand, ToolOutput};
pub use ledger::{CaseLedger, CaseRecord};
pub use partition::{partition_volume, HemispherePartition, PartitionOptions};
pub use pipeline::{
    discover_cases, BatchOrchestrator, BatchSummary, Case, CaseOutcome, MeshExporter,
    MetricComputer, SubprocessMeshExporter, SubprocessMetricComputer,
};
pub use scalars::{read_scalar_map, write_scalar_map, ScalarLoadMode};
pub use split::{apply_split, compute_split_plane, Hemisphere, SplitStrategy};
pub use stats::{reduce_case, CaseStats, HemisphereSummary, StatisticsProfile};
pub use status::{CaseStage, CaseStatusStore};
pub use volume::{BinaryMask, RoiPolicy, RoiTable, VoxelVolume};
