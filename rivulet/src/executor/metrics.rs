//! Cumulative per-task counters reported to the master.

use std::time::Duration;

/// Counters folded in as inputs finish and writers close.
///
/// Byte counters only grow by contributions from channels that account for
/// them; a task whose channels report nothing reports zero, not absence.
/// Folds are saturating, so a misbehaving channel cannot wrap a counter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct TaskMetrics {
    /// Total time the task's source fetchers spent inside bounded reads.
    pub(crate) bounded_source_read_time: Duration,
    /// Total serialized bytes pulled over finished incoming stage edges.
    pub(crate) serialized_read_bytes: u64,
    /// Total encoded bytes pulled over finished incoming stage edges.
    pub(crate) encoded_read_bytes: u64,
    /// Total bytes written by closed external writers.
    pub(crate) written_bytes: u64,
}
