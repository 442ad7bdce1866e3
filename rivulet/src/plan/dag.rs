//! The task-local operator DAG.

use std::collections::HashMap;

use crate::error::PlanError;
use crate::plan::{IrEdge, IrVertex};
use crate::Data;

/// The local operator graph of one task, in topological order.
///
/// Construction validates the shape once so the executor can lean on it:
/// vertex ids are unique, every edge endpoint exists, and the stated vertex
/// order really is topological (every edge points forward). The graph is
/// immutable afterwards.
pub struct IrDag<D: Data> {
    vertices: Vec<IrVertex<D>>,
    edges: Vec<IrEdge>,
}

impl<D: Data> std::fmt::Debug for IrDag<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IrDag")
            .field("vertices", &self.vertices)
            .field("edges", &self.edges)
            .finish()
    }
}

impl<D: Data> IrDag<D> {
    /// Builds a DAG from vertices in topological order and the edges between
    /// them.
    pub fn new(vertices: Vec<IrVertex<D>>, edges: Vec<IrEdge>) -> Result<Self, PlanError> {
        let mut position = HashMap::with_capacity(vertices.len());
        for (index, vertex) in vertices.iter().enumerate() {
            if position.insert(vertex.id().to_owned(), index).is_some() {
                return Err(PlanError::DuplicateVertex(vertex.id().to_owned()));
            }
        }
        for edge in &edges {
            let src = *position
                .get(&edge.src)
                .ok_or_else(|| PlanError::UnknownVertex(edge.src.clone()))?;
            let dst = *position
                .get(&edge.dst)
                .ok_or_else(|| PlanError::UnknownVertex(edge.dst.clone()))?;
            if src >= dst {
                return Err(PlanError::NotTopological {
                    src: edge.src.clone(),
                    dst: edge.dst.clone(),
                });
            }
        }
        Ok(IrDag { vertices, edges })
    }

    /// The vertices, in topological order.
    pub fn vertices(&self) -> &[IrVertex<D>] {
        &self.vertices
    }

    /// All intra-task edges.
    pub fn edges(&self) -> &[IrEdge] {
        &self.edges
    }

    /// Edges leaving the given vertex, in declaration order.
    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a IrEdge> {
        self.edges.iter().filter(move |edge| edge.src == id)
    }

    /// Edges entering the given vertex, in declaration order.
    pub fn incoming<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a IrEdge> {
        self.edges.iter().filter(move |edge| edge.dst == id)
    }

    pub(crate) fn into_parts(self) -> (Vec<IrVertex<D>>, Vec<IrEdge>) {
        (self.vertices, self.edges)
    }
}
