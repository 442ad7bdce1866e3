//! Task lifecycle states reported to the master.

use serde::{Deserialize, Serialize};

/// Why a task asks to be retried rather than declared failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecoverableFailureCause {
    /// An input channel broke while the task was reading from it.
    InputReadFailure,
    /// An output channel broke while the task was writing into it.
    OutputWriteFailure,
}

/// The observable lifecycle of one task attempt.
///
/// A run reports `Executing` exactly once, then exactly one terminal state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    /// The task is running its fetch loop.
    Executing,
    /// Every input drained, every transform closed, every writer flushed.
    Complete,
    /// Finished draining, but holding completion until the master has acted
    /// on the data a vertex diverted to it.
    OnHold {
        /// The vertex whose diverted output triggered the hold.
        vertex_id: String,
    },
    /// Hit a recoverable fault; the master should reschedule this attempt.
    ShouldRetry {
        /// The fault classification.
        cause: RecoverableFailureCause,
    },
    /// Hit an unrecoverable fault.
    Failed,
}

impl TaskState {
    /// True for the states a run can end in.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Executing)
    }
}

/// Receives every state transition of a task attempt.
///
/// The manager is the master's agent on the executor side; this core only
/// classifies and reports, it never recovers.
pub trait TaskStateManager {
    /// Observes one state transition.
    fn on_task_state_changed(&mut self, state: TaskState);
}
