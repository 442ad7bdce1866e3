//! Channel construction at task boundaries.

use crate::plan::StageEdge;
use crate::{Data, InputReader, OutputWriter};

/// Builds the per-edge channels a task uses to reach neighbouring shards.
///
/// The factory is consulted only while the executor is being constructed;
/// one reader per incoming stage edge, one writer per outgoing stage edge,
/// never again afterwards.
pub trait DataTransferFactory<D: Data> {
    /// Creates the reader for one incoming stage edge, addressed to the
    /// given shard index of the consuming stage.
    fn create_reader(&mut self, task_index: usize, edge: &StageEdge) -> Box<dyn InputReader<D>>;

    /// Creates the writer for one outgoing stage edge of the given task.
    fn create_writer(&mut self, task_id: &str, edge: &StageEdge) -> Box<dyn OutputWriter<D>>;
}
