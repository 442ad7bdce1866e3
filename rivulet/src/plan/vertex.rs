//! Vertices of the task-local operator DAG.

use crate::transform::Transform;
use crate::Data;

/// One node of the local operator graph.
///
/// The variant decides how elements enter the vertex: a source is fed by a
/// bounded [`crate::Readable`] owned by the task, an operator is fed by the
/// vertices and stage edges pointing at it.
pub enum IrVertex<D: Data> {
    /// A vertex fed by a bounded readable rather than by other vertices.
    Source {
        /// Unique vertex id within the plan.
        id: String,
    },
    /// A vertex that runs a [`Transform`] over the elements pushed into it.
    Operator {
        /// Unique vertex id within the plan.
        id: String,
        /// The user logic applied to each element.
        transform: Box<dyn Transform<D>>,
    },
}

impl<D: Data> IrVertex<D> {
    /// The vertex id.
    pub fn id(&self) -> &str {
        match self {
            IrVertex::Source { id } | IrVertex::Operator { id, .. } => id,
        }
    }

    /// True for source vertices.
    pub fn is_source(&self) -> bool {
        matches!(self, IrVertex::Source { .. })
    }
}

impl<D: Data> std::fmt::Debug for IrVertex<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IrVertex::Source { id } => f.debug_struct("Source").field("id", id).finish(),
            IrVertex::Operator { id, .. } => f.debug_struct("Operator").field("id", id).finish_non_exhaustive(),
        }
    }
}
