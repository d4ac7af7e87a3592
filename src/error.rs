use quick_error::quick_error;
use std::io::Error as IOError;

quick_error! {
    /// Error type for all error variants originated by this crate.
    #[derive(Debug)]
    pub enum GyrificationError {
        /// Invalid voxel volume file: wrong magic number.
        InvalidVoxelVolumeFormat {
            display("Invalid voxel volume file")
        }

        /// Invalid scalar map file: a line could not be parsed as a float.
        InvalidScalarMapFormat(line: usize) {
            display("Invalid scalar map file: unparsable value on line {}", line)
        }

        /// An ROI mask required for split plane computation is empty.
        EmptyRoiMask(roi: String) {
            display("Cannot compute hemisphere split plane: '{}' mask is empty", roi)
        }

        /// Fewer than two white matter components, cannot orient a split plane.
        TooFewComponents(found: usize) {
            display("Cannot compute hemisphere split plane: found {} white matter component(s), need 2", found)
        }

        /// More than one candidate scalar map file matched for a hemisphere.
        AmbiguousScalarMap(case: String, hemi: String) {
            display("Too many scalar map files found for case '{}', {} hemisphere", case, hemi)
        }

        /// An expected pipeline artifact is absent after the stage that produces it.
        MissingArtifact(case: String, stage: String) {
            display("Missing artifact for case '{}' at stage '{}'", case, stage)
        }

        /// An external tool exited abnormally or could not be run at all.
        ExternalToolFailure(tool: String, detail: String) {
            display("External tool '{}' failed: {}", tool, detail)
        }

        /// An external tool exceeded the configured timeout.
        ExternalToolTimeout(tool: String) {
            display("External tool '{}' timed out", tool)
        }

        /// The filtered per-vertex value set is empty, statistics are undefined.
        DegenerateStatistics(hemi: String) {
            display("No finite per-vertex values for {} hemisphere, statistics undefined", hemi)
        }

        /// Invalid pipeline configuration file.
        InvalidConfig(detail: String) {
            display("Invalid pipeline configuration: {}", detail)
        }

        /// I/O Error
        Io(err: IOError) {
            from()
            source(err)
        }

        /// CSV Error from the ledger backing store.
        Csv(err: csv::Error) {
            from()
            source(err)
        }
    }
}

/// Alias type for results originated from this crate.
pub type Result<T> = ::std::result::Result<T, GyrificationError>;
