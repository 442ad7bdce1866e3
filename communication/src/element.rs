//! The units that flow through a task's element streams.

use serde::{Deserialize, Serialize};

/// An out-of-band event-time progress marker.
///
/// Watermarks travel in-band with data records but carry no payload of their
/// own, only a millisecond timestamp. Their propagation through the local
/// operator graph is an extension point and currently inert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Watermark(pub u64);

/// One unit pulled from an input channel or bounded source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Element<D> {
    /// A data record to be pushed through the operator chain.
    Record(D),
    /// An event-time progress marker.
    Watermark(Watermark),
    /// End of stream. A well-behaved input produces this exactly once, after
    /// its last record, and must not be pulled again.
    Finish,
}

impl<D> Element<D> {
    /// True iff this element ends its stream.
    #[inline]
    pub fn is_finish(&self) -> bool {
        matches!(self, Element::Finish)
    }
}
