//! Emit-side dispatch: the collector view handed to a vertex while it is
//! being delivered to.

use tracing::trace;

use crate::error::ExecutionError;
use crate::executor::harness::Fanout;
use crate::executor::Core;
use crate::transform::{OutputCollector, TransformContext};
use crate::{Data, OutputWriter, Watermark};

/// A vertex's own routing joined with mutable access to the rest of the
/// graph.
///
/// The view exists only for the duration of one delivery: the owning harness
/// is taken out of the arena, its disjoint fields are borrowed here, and
/// recursive deliveries into children go back through `core`. Emission is
/// infallible from the transform's point of view; channel faults are parked
/// on the core and re-raised by the executor once the delivery unwinds.
pub(crate) struct CollectorView<'a, D: Data> {
    pub(crate) core: &'a mut Core<D>,
    pub(crate) vertex_id: &'a str,
    pub(crate) routing: &'a mut Fanout<D>,
    pub(crate) diverts: bool,
    pub(crate) context: &'a mut TransformContext<D>,
}

impl<D: Data> OutputCollector<D> for CollectorView<'_, D> {
    fn emit(&mut self, record: D) {
        if self.diverts {
            self.divert(record);
            return;
        }
        let CollectorView { core, vertex_id, routing, .. } = self;
        fan_out(core, vertex_id, &routing.main_children, &mut routing.main_writers, record);
    }

    fn emit_tagged(&mut self, tag: &str, record: D) {
        if self.diverts {
            self.divert(record);
            return;
        }
        let CollectorView { core, vertex_id, routing, .. } = self;
        let children: &[usize] = routing.tagged_children.get(tag).map(Vec::as_slice).unwrap_or(&[]);
        if let Some(writers) = routing.tagged_writers.get_mut(tag) {
            fan_out(core, vertex_id, children, writers, record);
        } else if !children.is_empty() {
            fan_out(core, vertex_id, children, &mut [], record);
        } else {
            // Side outputs are optional consumers; an unclaimed tag is a no-op.
            trace!(vertex = %vertex_id, tag, "dropping record emitted on an unclaimed tag");
        }
    }

    fn emit_watermark(&mut self, watermark: Watermark) {
        // Reserved extension point: watermarks are accepted here but not yet
        // propagated through the local graph.
        trace!(vertex = %self.vertex_id, watermark = watermark.0, "watermark reached collector");
    }
}

impl<D: Data> CollectorView<'_, D> {
    /// Serializes the record into the harness context for the master and
    /// flags the task to finish on hold.
    fn divert(&mut self, record: D) {
        match serde_json::to_string(&record) {
            Ok(data) => {
                self.context.set_serialized_data(data);
                self.core.hold_vertex(self.vertex_id);
            }
            Err(source) => self.core.record_failure(ExecutionError::Serialize {
                vertex: self.vertex_id.to_owned(),
                source,
            }),
        }
    }
}

/// Fans one record out to internal consumers, then external writers, in
/// registration order. Every consumer but the last gets a clone; the last
/// takes the record itself.
fn fan_out<D: Data>(
    core: &mut Core<D>,
    vertex_id: &str,
    children: &[usize],
    writers: &mut [Box<dyn OutputWriter<D>>],
    record: D,
) {
    match writers.split_last_mut() {
        Some((last, rest)) => {
            for &child in children {
                core.deliver(child, record.clone());
            }
            for writer in rest.iter_mut() {
                write_record(core, vertex_id, writer.as_mut(), record.clone());
            }
            write_record(core, vertex_id, last.as_mut(), record);
        }
        None => {
            if let Some((&last, rest)) = children.split_last() {
                for &child in rest {
                    core.deliver(child, record.clone());
                }
                core.deliver(last, record);
            }
        }
    }
}

fn write_record<D: Data>(
    core: &mut Core<D>,
    vertex_id: &str,
    writer: &mut dyn OutputWriter<D>,
    record: D,
) {
    // Once a fault is parked, stop pushing bytes at the failing run.
    if core.failure_pending() {
        return;
    }
    if let Err(source) = writer.write(record) {
        core.record_failure(ExecutionError::Write { vertex: vertex_id.to_owned(), source });
    }
}
