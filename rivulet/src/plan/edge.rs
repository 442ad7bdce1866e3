//! Edges inside the local DAG and across stage boundaries.

use serde::{Deserialize, Serialize};

/// An intra-task edge between two IR vertices.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrEdge {
    /// Source vertex id.
    pub src: String,
    /// Destination vertex id.
    pub dst: String,
    /// Names the side output this edge consumes; `None` is the main output.
    pub output_tag: Option<String>,
}

impl IrEdge {
    /// A main-output edge between two vertices.
    pub fn main(src: impl Into<String>, dst: impl Into<String>) -> Self {
        IrEdge { src: src.into(), dst: dst.into(), output_tag: None }
    }

    /// A tagged side-output edge between two vertices.
    pub fn tagged(src: impl Into<String>, dst: impl Into<String>, tag: impl Into<String>) -> Self {
        IrEdge { src: src.into(), dst: dst.into(), output_tag: Some(tag.into()) }
    }
}

/// A data edge crossing a task boundary in the physical plan.
///
/// Stage edges are how this task reaches the shards of neighbouring stages.
/// An edge carrying a `broadcast_id` moves a broadcast variable rather than
/// stream data, and is consumed through the broadcast registry instead of the
/// fetch loop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEdge {
    /// Unique edge id within the physical plan.
    pub id: String,
    /// IR vertex on the producing side.
    pub src_vertex: String,
    /// IR vertex on the consuming side.
    pub dst_vertex: String,
    /// Names the side output this edge consumes; `None` is the main output.
    pub output_tag: Option<String>,
    /// Set when the edge carries a broadcast variable.
    pub broadcast_id: Option<String>,
}

impl StageEdge {
    /// A main-output stage edge.
    pub fn new(id: impl Into<String>, src_vertex: impl Into<String>, dst_vertex: impl Into<String>) -> Self {
        StageEdge {
            id: id.into(),
            src_vertex: src_vertex.into(),
            dst_vertex: dst_vertex.into(),
            output_tag: None,
            broadcast_id: None,
        }
    }

    /// Marks this edge as consuming the named side output.
    pub fn with_output_tag(mut self, tag: impl Into<String>) -> Self {
        self.output_tag = Some(tag.into());
        self
    }

    /// Marks this edge as carrying the named broadcast variable.
    pub fn with_broadcast_id(mut self, id: impl Into<String>) -> Self {
        self.broadcast_id = Some(id.into());
        self
    }
}
