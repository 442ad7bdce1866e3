//! The unit of execution handed to this core.

use std::collections::HashMap;

use crate::plan::StageEdge;
use crate::{Data, Readable};

/// One shard of a stage, as scheduled by the master.
///
/// The descriptor is supplied whole at executor construction and is immutable
/// for the attempt's lifetime; the readables are consumed into the executor's
/// source fetchers.
pub struct Task<D: Data> {
    /// Globally unique id of this task attempt.
    pub task_id: String,
    /// Shard index within the stage; addresses this task's slice of every
    /// incoming stage edge.
    pub task_index: usize,
    /// Stage edges feeding this task.
    pub incoming: Vec<StageEdge>,
    /// Stage edges leaving this task.
    pub outgoing: Vec<StageEdge>,
    /// Bounded sources for the plan's source vertices, keyed by vertex id.
    ///
    /// A readable must be present for exactly the source vertices of the
    /// task's DAG; any disagreement is a construction-time plan error.
    pub readables: HashMap<String, Box<dyn Readable<D>>>,
}
