//! Faults surfaced by a single pull on an input.

use thiserror::Error;

/// Why a pull on an input produced no element.
///
/// The two variants demand different treatment: [`FetchError::NotReady`] is a
/// scheduling hint, [`FetchError::Io`] is a fault the master may recover from
/// by rescheduling the task. Neither signals end of stream, which is
/// [`crate::Element::Finish`], a normal element.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Nothing is available right now. The caller should revisit this input
    /// later rather than treat the stream as over or broken.
    #[error("no element is available right now")]
    NotReady,
    /// The underlying channel is broken.
    #[error("input channel failed")]
    Io(#[from] std::io::Error),
}
