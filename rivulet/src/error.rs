//! Fault taxonomy of the execution core.
//!
//! Plan violations are programmer errors and abort the task before it runs;
//! execution faults are classified by the executor into the retry/failure
//! states it reports to the master. The transient and recoverable per-fetch
//! faults live with the channel contracts in
//! [`rivulet_communication::FetchError`].

use std::io;

use thiserror::Error;

/// A construction-time violation of the plan or harness invariants.
///
/// These are fatal: the task aborts without executing.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A vertex id appears more than once in the DAG.
    #[error("duplicate vertex id {0}")]
    DuplicateVertex(String),

    /// An intra-task edge references a vertex the DAG does not contain.
    #[error("edge references unknown vertex {0}")]
    UnknownVertex(String),

    /// The stated vertex order is not topological.
    #[error("edge {src} -> {dst} contradicts the stated topological order")]
    NotTopological {
        /// Source vertex of the offending edge.
        src: String,
        /// Destination vertex of the offending edge.
        dst: String,
    },

    /// A source vertex has no readable, or a readable names a vertex that is
    /// not a source.
    #[error("vertex {0} and the task's readables disagree about being a source")]
    SourceReadableMismatch(String),

    /// A stage edge does not connect to any vertex of this task's DAG.
    #[error("stage edge {0} does not connect to this task's DAG")]
    DanglingStageEdge(String),

    /// Elements would be pushed into a vertex that cannot consume them.
    #[error("vertex {0} cannot consume pushed elements; an operator is required")]
    NotAnOperator(String),
}

/// An unrecoverable fault raised while a task attempt is running.
///
/// Any of these surfacing from `execute` moves the task to the failed state;
/// recovery from that point is the master's business, not this core's.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The executor was cancelled while parked between polls.
    #[error("cancelled while waiting for input")]
    Interrupted,

    /// An output writer failed while a record was being written.
    #[error("output writer failed on vertex {vertex}")]
    Write {
        /// Vertex whose external writer failed.
        vertex: String,
        /// The underlying channel fault.
        #[source]
        source: io::Error,
    },

    /// An output writer failed while being closed.
    #[error("output writer failed to close on vertex {vertex}")]
    Close {
        /// Vertex whose external writer failed.
        vertex: String,
        /// The underlying channel fault.
        #[source]
        source: io::Error,
    },

    /// A payload bound for the master could not be serialized.
    #[error("could not serialize collected data of vertex {vertex}")]
    Serialize {
        /// Vertex whose collected payload was rejected.
        vertex: String,
        /// The underlying serializer fault.
        #[source]
        source: serde_json::Error,
    },
}
