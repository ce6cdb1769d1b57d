//! Events emitted during a scan (consumed by the CLI or any other frontend)

use crate::classifier::Verdict;
use std::path::PathBuf;

/// Ordered notifications from a running scan.
///
/// Events arrive in file-enumeration order; progress percentages never
/// decrease; `Finished` fires exactly once, on completion or cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// Human-readable log line
    Log(String),

    /// Overall completion percentage (0-100)
    Progress(u8),

    /// One file has been classified
    FileClassified { path: PathBuf, verdict: Verdict },

    /// The scan is over; no further events follow
    Finished,
}
