//! Bounded, restart-free element sources.

use crate::{Element, FetchError};

/// A finite element source backing a source vertex.
///
/// A readable is consumed in place by exactly one task attempt: there is no
/// rewind, and pulling past [`Element::Finish`] is a contract violation.
/// `read_next` may block in the underlying medium; callers account for the
/// time spent here as bounded-source read time.
pub trait Readable<D> {
    /// Pulls the next element of the source.
    fn read_next(&mut self) -> Result<Element<D>, FetchError>;
}
