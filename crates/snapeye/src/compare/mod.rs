pub mod diff;
pub mod gray;
pub mod otsu;

use std::path::PathBuf;

pub use self::diff::{
    CompareError, ComparisonResult, DebugMasks, DiffOptions, DifferenceMask, compare,
};

/// Status of a single screen check, as shown to the user.
#[derive(Debug)]
pub enum SnapshotStatus {
    Pass,
    Fail {
        diff_pixels: u64,
        percent: f64,
        report: Option<PathBuf>,
    },
    /// No baseline existed; the capture became the baseline.
    New,
    Error(String),
}
