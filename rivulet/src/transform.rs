//! User logic run inside operator vertices, and the collector it emits
//! through.

use std::any::Any;
use std::sync::Arc;

use crate::master::BroadcastWorker;
use crate::{Data, Watermark};

/// The push sink a vertex uses to reach its downstream consumers.
///
/// Emitting is synchronous: internal consumers are run to completion on the
/// caller's stack before `emit` returns, so per-element order is preserved
/// through the whole local graph. Collectors must not block beyond the
/// backpressure a downstream writer exerts.
pub trait OutputCollector<D: Data> {
    /// Emits one record on the main output.
    fn emit(&mut self, record: D);

    /// Emits one record on the named side output.
    ///
    /// A tag nobody consumes drops the record silently; side outputs are
    /// optional consumers, not obligations.
    fn emit_tagged(&mut self, tag: &str, record: D);

    /// Forwards a watermark.
    ///
    /// Watermark propagation through the local graph is an extension point;
    /// no current collector gives it semantics.
    fn emit_watermark(&mut self, watermark: Watermark);
}

/// Per-vertex state handed to a transform across its lifecycle.
pub struct TransformContext<D: Data> {
    broadcast: Arc<dyn BroadcastWorker<D>>,
    serialized_data: Option<String>,
}

impl<D: Data> TransformContext<D> {
    pub(crate) fn new(broadcast: Arc<dyn BroadcastWorker<D>>) -> Self {
        TransformContext { broadcast, serialized_data: None }
    }

    /// Resolves a broadcast variable by id, once some task has materialized
    /// it with the process-wide broadcast worker.
    pub fn broadcast_variable(&self, id: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.broadcast.variable(id)
    }

    /// Replaces the pending serialized payload bound for the master.
    pub(crate) fn set_serialized_data(&mut self, data: String) {
        self.serialized_data = Some(data);
    }

    /// Takes the pending serialized payload, leaving the slot empty.
    pub(crate) fn take_serialized_data(&mut self) -> Option<String> {
        self.serialized_data.take()
    }
}

/// The lifecycle of user logic inside an operator vertex.
///
/// `prepare` runs once before any element arrives, `on_data` once per record
/// pushed into the vertex, and `close` once at end-of-input. `close` may
/// still emit: downstream transforms are guaranteed to be open when an
/// upstream one closes.
pub trait Transform<D: Data> {
    /// Called once, before any element is processed.
    fn prepare(&mut self, context: &mut TransformContext<D>);

    /// Called for every record pushed into this vertex.
    fn on_data(&mut self, record: D, out: &mut dyn OutputCollector<D>);

    /// Called once at end-of-input.
    fn close(&mut self, out: &mut dyn OutputCollector<D>);

    /// True for transforms whose aggregated output is diverted to the master
    /// to drive a replanning decision instead of flowing downstream. A task
    /// containing such a vertex finishes on hold rather than complete.
    fn is_metric_aggregator(&self) -> bool {
        false
    }
}
