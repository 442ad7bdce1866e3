//! Mutable per-vertex execution records.

use std::collections::{BTreeMap, HashMap};

use smallvec::SmallVec;

use crate::transform::{Transform, TransformContext};
use crate::{Data, OutputWriter};

/// The emit-side routing of one vertex.
///
/// Internal consumers are arena indices of downstream operator harnesses;
/// external consumers are writers onto outgoing stage edges. Each of the two
/// splits into the main output and the named side outputs, and an outgoing
/// edge lands in exactly one of the two slots.
pub(crate) struct Fanout<D: Data> {
    pub(crate) main_children: SmallVec<[usize; 4]>,
    pub(crate) tagged_children: HashMap<String, Vec<usize>>,
    pub(crate) main_writers: Vec<Box<dyn OutputWriter<D>>>,
    pub(crate) tagged_writers: HashMap<String, Vec<Box<dyn OutputWriter<D>>>>,
}

impl<D: Data> Fanout<D> {
    pub(crate) fn new() -> Self {
        Fanout {
            main_children: SmallVec::new(),
            tagged_children: HashMap::new(),
            main_writers: Vec::new(),
            tagged_writers: HashMap::new(),
        }
    }

    /// Every external writer of this vertex, main before tagged.
    pub(crate) fn writers_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn OutputWriter<D>>> {
        self.main_writers
            .iter_mut()
            .chain(self.tagged_writers.values_mut().flatten())
    }
}

/// The mutable execution record of one IR vertex.
///
/// Harnesses live in the executor's arena, one slot per vertex; a slot is
/// vacated only while its vertex is being delivered to on the stack, which is
/// how the no-reentry invariant is enforced. `transform` is `None` exactly
/// for source vertices.
pub(crate) struct VertexHarness<D: Data> {
    pub(crate) id: String,
    pub(crate) transform: Option<Box<dyn Transform<D>>>,
    pub(crate) context: TransformContext<D>,
    pub(crate) routing: Fanout<D>,
    /// Divert emissions to the master instead of fanning out.
    pub(crate) diverts: bool,
}

/// A structural summary of a built harness graph.
///
/// Two executors constructed from the same plan compare equal here, which is
/// the equality hook rebuild tests lean on. The summary reflects the graph as
/// constructed; fetchers retired by a finished run no longer appear.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskStructure {
    /// Per-vertex shapes, in forward topological order.
    pub vertices: Vec<VertexStructure>,
    /// Fetcher shapes, in loop iteration order.
    pub fetchers: Vec<FetcherStructure>,
}

/// The shape of one vertex harness.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexStructure {
    /// Vertex id.
    pub id: String,
    /// True for source vertices.
    pub is_source: bool,
    /// True when emissions divert to the master.
    pub diverts_output: bool,
    /// Ids of main-output internal consumers, in registration order.
    pub main_children: Vec<String>,
    /// Ids of side-output internal consumers, per tag.
    pub tagged_children: BTreeMap<String, Vec<String>>,
    /// Number of main-output external writers.
    pub main_writers: usize,
    /// Number of side-output external writers, per tag.
    pub tagged_writers: BTreeMap<String, usize>,
}

/// The shape of one data fetcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetcherStructure {
    /// Pulls a bounded source into the named vertex.
    Source {
        /// The source vertex fed by this fetcher.
        vertex: String,
    },
    /// Pulls one incoming stage edge into the named vertex.
    ParentTask {
        /// The operator vertex fed by this fetcher.
        vertex: String,
        /// The upstream IR vertex on the producing side of the edge.
        src_vertex: String,
    },
}
