//! Per-edge input channels from upstream task shards.

use crate::{Element, FetchError};

/// The consuming end of one incoming stage edge.
///
/// A reader yields the slice of the edge addressed to its task shard. Byte
/// counters settle once the stream has finished; before that they may be
/// absent, and a transport that does not account for one of them may leave it
/// absent forever.
pub trait InputReader<D> {
    /// Id of the IR vertex on the producing side of the edge.
    fn source_vertex_id(&self) -> &str;

    /// Pulls the next element off the channel.
    fn fetch(&mut self) -> Result<Element<D>, FetchError>;

    /// Total serialized bytes moved over the edge, where accounted.
    fn serialized_bytes(&self) -> Option<u64>;

    /// Total encoded bytes moved over the edge, where accounted.
    fn encoded_bytes(&self) -> Option<u64>;
}
