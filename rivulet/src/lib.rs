//! Per-task execution core for a distributed dataflow runtime.
//!
//! A task is one shard of a stage in a larger physical execution plan. Given
//! a [`Task`] descriptor and the task-local operator DAG ([`plan::IrDag`]),
//! the [`TaskExecutor`] builds a pointer-free arena of per-vertex execution
//! harnesses, pulls elements from the task's inputs through a fair polling
//! loop, pushes each element through the local operator chain and out to
//! downstream shards in strict topological order, finalizes operator state at
//! end-of-input, and reports the attempt's outcome to the master.
//!
//! The code is organized around the seams the rest of the runtime plugs into:
//!
//! **Plans**: the [`plan`] module holds the immutable vertex/edge structures
//! this core traverses but never invents.
//!
//! **Channels**: the [`rivulet_communication`] crate defines the element
//! vocabulary and the reader/writer contracts at task boundaries; the
//! [`transfer`] module is where concrete channels are manufactured.
//!
//! **User logic**: the [`transform`] module defines the lifecycle run inside
//! every operator vertex, and the collector contract transforms emit through.
//!
//! **Control plane**: the [`state`] and [`master`] modules carry task states,
//! metrics, and the dynamic-optimization hand-off back to the master.
//!
//! The executor is strictly single-threaded on its hot path: the entire
//! per-element traversal of the local graph happens on the executing thread
//! through nested collector invocations, so element order within one input is
//! preserved end to end.

#![forbid(missing_docs)]

pub mod error;
pub mod executor;
pub mod master;
pub mod plan;
pub mod state;
pub mod task;
pub mod transfer;
pub mod transform;

pub use rivulet_communication as communication;

pub use rivulet_communication::{Data, Element, FetchError, InputReader, OutputWriter, Readable, Watermark};
pub use error::{ExecutionError, PlanError};
pub use executor::{Config, TaskExecutor};
pub use state::{RecoverableFailureCause, TaskState, TaskStateManager};
pub use task::Task;
pub use transform::{OutputCollector, Transform, TransformContext};
