//! The task executor: harness construction, the fetch loop, finalization,
//! and reporting.
//!
//! One executor runs one task attempt on one thread. Construction turns the
//! declarative vertex DAG into an arena of harnesses wired to concrete
//! channels; `execute` then pulls every input dry through a fair polling
//! loop, pushes each element through the local graph on the executing
//! thread's stack, finalizes state in topological order, and reports exactly
//! one terminal state to the master.

mod collector;
mod fetcher;
mod harness;
mod metrics;

pub use harness::{FetcherStructure, TaskStructure, VertexStructure};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use itertools::{Either, Itertools};
use tracing::{debug, error, info, warn};

use crate::error::{ExecutionError, PlanError};
use crate::master::{
    generate_message_id, BroadcastWorker, ControlMessage, ControlMessageBody, DataCollectMessage,
    MetricMessageSender, PersistentConnectionToMaster, RUNTIME_MASTER_MESSAGE_LISTENER_ID,
};
use crate::plan::{IrDag, IrVertex, StageEdge};
use crate::state::{RecoverableFailureCause, TaskState, TaskStateManager};
use crate::task::Task;
use crate::transfer::DataTransferFactory;
use crate::transform::{OutputCollector, TransformContext};
use crate::{Data, Element, FetchError, Watermark};

use collector::CollectorView;
use fetcher::DataFetcher;
use harness::{Fanout, VertexHarness};
use metrics::TaskMetrics;

/// Metric type under which task counters are reported.
const METRIC_TYPE: &str = "TaskMetric";

/// Tunables of one task executor.
#[derive(Clone, Debug)]
pub struct Config {
    /// How long the fetch loop waits before revisiting inputs that reported
    /// nothing available.
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config { poll_interval: Duration::from_millis(100) }
    }
}

/// The mutable graph state shared by every delivery on the hot path.
///
/// Split out of [`TaskExecutor`] so a collector view can recurse into
/// downstream vertices while the loop state around it stays untouched.
pub(crate) struct Core<D: Data> {
    /// Arena of harnesses; a slot is vacated only while its vertex is being
    /// delivered to on the stack.
    harnesses: Vec<Option<VertexHarness<D>>>,
    /// Vertex that diverted data to the master, if any. Last writer wins
    /// when several vertices divert; the master receives every collected
    /// payload regardless.
    vertex_on_hold: Option<String>,
    /// First channel fault parked by a collector during the current
    /// delivery; re-raised by the executor once the delivery unwinds.
    failure: Option<ExecutionError>,
}

impl<D: Data> Core<D> {
    /// Pushes one record into the vertex at `index`, running its transform
    /// (or, for a source vertex, its fan-out) to completion on this stack.
    ///
    /// Recursion depth is bounded by the depth of the local DAG; plans deep
    /// enough to threaten the stack must be rejected by the compiler that
    /// produced them.
    pub(crate) fn deliver(&mut self, index: usize, record: D) {
        let mut harness = self.harnesses[index]
            .take()
            .expect("vertex re-entered while already on the delivery stack");
        {
            let VertexHarness { ref id, ref mut transform, ref mut context, ref mut routing, diverts } =
                harness;
            let mut out = CollectorView {
                core: &mut *self,
                vertex_id: id.as_str(),
                routing,
                diverts,
                context,
            };
            match transform.as_mut() {
                Some(transform) => transform.on_data(record, &mut out),
                None => out.emit(record),
            }
        }
        self.harnesses[index] = Some(harness);
    }

    /// Forwards a watermark to the vertex's collector. Propagation beyond
    /// the collector is a reserved extension point.
    pub(crate) fn deliver_watermark(&mut self, index: usize, watermark: Watermark) {
        let mut harness = self.harnesses[index]
            .take()
            .expect("vertex re-entered while already on the delivery stack");
        {
            let VertexHarness { ref id, ref mut context, ref mut routing, diverts, .. } = harness;
            let mut out = CollectorView {
                core: &mut *self,
                vertex_id: id.as_str(),
                routing,
                diverts,
                context,
            };
            out.emit_watermark(watermark);
        }
        self.harnesses[index] = Some(harness);
    }

    pub(crate) fn hold_vertex(&mut self, vertex_id: &str) {
        self.vertex_on_hold = Some(vertex_id.to_owned());
    }

    pub(crate) fn record_failure(&mut self, error: ExecutionError) {
        // First fault wins; anything later on the same element is fallout.
        self.failure.get_or_insert(error);
    }

    pub(crate) fn failure_pending(&self) -> bool {
        self.failure.is_some()
    }

    fn take_failure(&mut self) -> Option<ExecutionError> {
        self.failure.take()
    }

    fn vertex_id(&self, index: usize) -> &str {
        self.harnesses[index]
            .as_ref()
            .map(|harness| harness.id.as_str())
            .unwrap_or("<in flight>")
    }
}

/// The per-task orchestrator.
///
/// Owns the harness arena, the fetchers over every non-broadcast input, and
/// the channels back to the master. Strictly single-threaded on the hot
/// path: elements traverse the local graph through nested collector calls on
/// the executing thread, so order within one input is preserved end to end.
pub struct TaskExecutor<D: Data> {
    task_id: String,
    config: Config,
    executed: bool,
    cancelled: Arc<AtomicBool>,
    core: Core<D>,
    /// Arena indices in forward topological order, for finalization.
    sorted: Vec<usize>,
    fetchers: Vec<DataFetcher<D>>,
    state_manager: Box<dyn TaskStateManager>,
    metric_sender: Arc<dyn MetricMessageSender>,
    master: Arc<dyn PersistentConnectionToMaster>,
    metrics: TaskMetrics,
}

impl<D: Data> TaskExecutor<D> {
    /// Builds the executor for one task attempt.
    ///
    /// Construction walks the DAG once in reverse topological order, so each
    /// vertex's consumers already have harnesses when its routing is built,
    /// and materializes every channel the task will use: one writer per
    /// outgoing stage edge, one reader per incoming stage edge (broadcast
    /// readers go to the broadcast worker, the rest become fetchers), and one
    /// source fetcher per readable. Every plan/harness invariant is checked
    /// here; a violation aborts the task before anything runs.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        task: Task<D>,
        dag: IrDag<D>,
        state_manager: Box<dyn TaskStateManager>,
        transfer: &mut dyn DataTransferFactory<D>,
        broadcast: Arc<dyn BroadcastWorker<D>>,
        metric_sender: Arc<dyn MetricMessageSender>,
        master: Arc<dyn PersistentConnectionToMaster>,
        config: Config,
    ) -> Result<Self, PlanError> {
        let Task { task_id, task_index, incoming, outgoing, mut readables } = task;
        let (vertices, edges) = dag.into_parts();
        let count = vertices.len();

        // Arena slots are handed out in build (reverse topological) order,
        // which makes forward topological order the reverse of slot order.
        let index_of: HashMap<String, usize> = vertices
            .iter()
            .enumerate()
            .map(|(position, vertex)| (vertex.id().to_owned(), count - 1 - position))
            .collect();

        for edge in incoming.iter() {
            if !index_of.contains_key(&edge.dst_vertex) {
                return Err(PlanError::DanglingStageEdge(edge.id.clone()));
            }
        }
        for edge in outgoing.iter() {
            if !index_of.contains_key(&edge.src_vertex) {
                return Err(PlanError::DanglingStageEdge(edge.id.clone()));
            }
        }

        let mut harnesses: Vec<Option<VertexHarness<D>>> = Vec::new();
        harnesses.resize_with(count, || None);
        let mut fetchers = Vec::new();

        for vertex in vertices.into_iter().rev() {
            let vertex_id = vertex.id().to_owned();
            let slot = index_of[&vertex_id];

            let readable = readables.remove(&vertex_id);
            if vertex.is_source() != readable.is_some() {
                return Err(PlanError::SourceReadableMismatch(vertex_id));
            }

            let mut routing = Fanout::new();
            for edge in edges.iter().filter(|edge| edge.src == vertex_id) {
                let child = index_of[&edge.dst];
                let consumes = harnesses[child]
                    .as_ref()
                    .map(|harness| harness.transform.is_some())
                    .unwrap_or(false);
                if !consumes {
                    return Err(PlanError::NotAnOperator(edge.dst.clone()));
                }
                match &edge.output_tag {
                    None => routing.main_children.push(child),
                    Some(tag) => {
                        routing.tagged_children.entry(tag.clone()).or_default().push(child)
                    }
                }
            }
            for edge in outgoing.iter().filter(|edge| edge.src_vertex == vertex_id) {
                let writer = transfer.create_writer(&task_id, edge);
                match &edge.output_tag {
                    None => routing.main_writers.push(writer),
                    Some(tag) => routing.tagged_writers.entry(tag.clone()).or_default().push(writer),
                }
            }

            let mut context = TransformContext::new(broadcast.clone());
            let (transform, diverts) = match vertex {
                IrVertex::Source { .. } => (None, false),
                IrVertex::Operator { mut transform, .. } => {
                    let diverts = transform.is_metric_aggregator();
                    transform.prepare(&mut context);
                    (Some(transform), diverts)
                }
            };

            harnesses[slot] =
                Some(VertexHarness { id: vertex_id.clone(), transform, context, routing, diverts });

            if let Some(readable) = readable {
                fetchers.push(DataFetcher::source(readable, slot));
            }

            let (broadcast_edges, data_edges): (Vec<&StageEdge>, Vec<&StageEdge>) = incoming
                .iter()
                .filter(|edge| edge.dst_vertex == vertex_id)
                .partition_map(|edge| match edge.broadcast_id {
                    Some(_) => Either::Left(edge),
                    None => Either::Right(edge),
                });
            for edge in broadcast_edges {
                if let Some(broadcast_id) = &edge.broadcast_id {
                    broadcast.register_reader(broadcast_id, transfer.create_reader(task_index, edge));
                }
            }
            for edge in data_edges {
                let consumes = harnesses[slot]
                    .as_ref()
                    .map(|harness| harness.transform.is_some())
                    .unwrap_or(false);
                if !consumes {
                    return Err(PlanError::NotAnOperator(edge.dst_vertex.clone()));
                }
                fetchers.push(DataFetcher::parent_task(transfer.create_reader(task_index, edge), slot));
            }
        }

        // Anything left names a vertex that is not a source of this DAG.
        if let Some(id) = readables.into_keys().next() {
            return Err(PlanError::SourceReadableMismatch(id));
        }

        Ok(TaskExecutor {
            task_id,
            config,
            executed: false,
            cancelled: Arc::new(AtomicBool::new(false)),
            core: Core { harnesses, vertex_on_hold: None, failure: None },
            sorted: (0..count).rev().collect(),
            fetchers,
            state_manager,
            metric_sender,
            master,
            metrics: TaskMetrics::default(),
        })
    }

    /// Runs the task attempt to a terminal state.
    ///
    /// Reports `Executing` first and then exactly one of `Complete`,
    /// `OnHold`, `ShouldRetry`, or `Failed`. Calling this twice is a
    /// programmer error and panics.
    pub fn execute(&mut self) {
        assert!(!self.executed, "task {} executed twice", self.task_id);
        self.executed = true;
        info!(task = %self.task_id, "task executing");
        self.update_state(TaskState::Executing);

        match self.run() {
            Ok(true) => {
                let state = match self.core.vertex_on_hold.clone() {
                    Some(vertex_id) => TaskState::OnHold { vertex_id },
                    None => TaskState::Complete,
                };
                info!(task = %self.task_id, state = ?state, "task finished");
                self.update_state(state);
            }
            // The fetch loop has already reported the retry request.
            Ok(false) => {}
            Err(err) => {
                error!(task = %self.task_id, error = ?err, "task failed");
                self.update_state(TaskState::Failed);
            }
        }
    }

    fn run(&mut self) -> Result<bool, ExecutionError> {
        let fetchers = std::mem::take(&mut self.fetchers);
        if !self.run_fetch_loop(fetchers)? {
            return Ok(false);
        }
        self.send_metric(
            "boundedSourceReadTime",
            self.metrics.bounded_source_read_time.as_millis() as u64,
        );
        self.send_metric("serializedReadBytes", self.metrics.serialized_read_bytes);
        self.send_metric("encodedReadBytes", self.metrics.encoded_read_bytes);
        self.finalize()?;
        self.send_metric("writtenBytes", self.metrics.written_bytes);
        Ok(true)
    }

    /// Drains every fetcher to end-of-stream.
    ///
    /// Fetchers move between two lists: `available` holds those believed to
    /// have an element ready and is visited on every iteration; `pending`
    /// holds those that recently had nothing and is swept at most once per
    /// poll interval. The sweep timestamp advances once per iteration, so a
    /// fresh wave of empties cannot starve the iteration after it. Returns
    /// false when a broken input has put the task on the retry path.
    fn run_fetch_loop(&mut self, mut available: Vec<DataFetcher<D>>) -> Result<bool, ExecutionError> {
        let mut pending: Vec<DataFetcher<D>> = Vec::new();
        let mut last_sweep = Instant::now();

        while !available.is_empty() || !pending.is_empty() {
            let mut index = 0;
            while index < available.len() {
                match available[index].fetch_one() {
                    Ok(Element::Finish) => {
                        let fetcher = available.remove(index);
                        fetcher.fold_terminal_counters(&mut self.metrics);
                        debug!(task = %self.task_id, "input finished");
                    }
                    Ok(Element::Record(record)) => {
                        self.core.deliver(available[index].target(), record);
                        self.raise_parked_failure()?;
                        index += 1;
                    }
                    Ok(Element::Watermark(watermark)) => {
                        self.core.deliver_watermark(available[index].target(), watermark);
                        index += 1;
                    }
                    Err(FetchError::NotReady) => {
                        pending.push(available.remove(index));
                    }
                    Err(FetchError::Io(err)) => {
                        return Ok(self.request_retry(err));
                    }
                }
            }

            if last_sweep.elapsed() >= self.config.poll_interval {
                let mut index = 0;
                while index < pending.len() {
                    match pending[index].fetch_one() {
                        Ok(Element::Finish) => {
                            let fetcher = pending.remove(index);
                            fetcher.fold_terminal_counters(&mut self.metrics);
                            debug!(task = %self.task_id, "input finished");
                        }
                        Ok(Element::Record(record)) => {
                            self.core.deliver(pending[index].target(), record);
                            self.raise_parked_failure()?;
                            available.push(pending.remove(index));
                        }
                        Ok(Element::Watermark(watermark)) => {
                            self.core.deliver_watermark(pending[index].target(), watermark);
                            available.push(pending.remove(index));
                        }
                        Err(FetchError::NotReady) => {
                            index += 1;
                        }
                        Err(FetchError::Io(err)) => {
                            return Ok(self.request_retry(err));
                        }
                    }
                }
                last_sweep = Instant::now();
            }

            if available.is_empty() && !pending.is_empty() {
                if self.cancelled.load(Ordering::Relaxed) {
                    return Err(ExecutionError::Interrupted);
                }
                thread::sleep(self.config.poll_interval);
                if self.cancelled.load(Ordering::Relaxed) {
                    return Err(ExecutionError::Interrupted);
                }
            }
        }
        Ok(true)
    }

    fn request_retry(&mut self, err: std::io::Error) -> bool {
        warn!(task = %self.task_id, error = %err, "input read failed; requesting retry");
        self.update_state(TaskState::ShouldRetry {
            cause: RecoverableFailureCause::InputReadFailure,
        });
        false
    }

    /// Closes transforms and writers in forward topological order.
    ///
    /// Forward order matters: a closing transform may still emit, and its
    /// downstream consumers must not have been closed before it.
    fn finalize(&mut self) -> Result<(), ExecutionError> {
        for position in 0..self.sorted.len() {
            let index = self.sorted[position];
            let mut harness = self.core.harnesses[index]
                .take()
                .expect("vertex still on the delivery stack at finalization");
            {
                let VertexHarness {
                    ref id,
                    ref mut transform,
                    ref mut context,
                    ref mut routing,
                    diverts,
                } = harness;
                if let Some(transform) = transform.as_mut() {
                    let mut out = CollectorView {
                        core: &mut self.core,
                        vertex_id: id.as_str(),
                        routing,
                        diverts,
                        context,
                    };
                    transform.close(&mut out);
                }
            }
            if let Some(err) = self.core.take_failure() {
                self.core.harnesses[index] = Some(harness);
                return Err(err);
            }

            // Hand any diverted payload to the master before the writers go.
            if let Some(data) = harness.context.take_serialized_data() {
                let message = ControlMessage {
                    id: generate_message_id(),
                    listener_id: RUNTIME_MASTER_MESSAGE_LISTENER_ID.to_owned(),
                    body: ControlMessageBody::ExecutorDataCollected(DataCollectMessage { data }),
                };
                debug!(task = %self.task_id, vertex = %harness.id, "handing collected data to the master");
                self.master.message_sender(RUNTIME_MASTER_MESSAGE_LISTENER_ID).send(message);
            }

            for writer in harness.routing.writers_mut() {
                match writer.close() {
                    Ok(Some(bytes)) => {
                        self.metrics.written_bytes = self.metrics.written_bytes.saturating_add(bytes)
                    }
                    Ok(None) => {}
                    Err(source) => {
                        return Err(ExecutionError::Close { vertex: harness.id.clone(), source });
                    }
                }
            }
            self.core.harnesses[index] = Some(harness);
        }
        Ok(())
    }

    fn raise_parked_failure(&mut self) -> Result<(), ExecutionError> {
        match self.core.take_failure() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn send_metric(&self, key: &str, value: u64) {
        let value = bincode::serialize(&value).expect("primitive metric serialization cannot fail");
        self.metric_sender.send(METRIC_TYPE, &self.task_id, key, value);
    }

    fn update_state(&mut self, state: TaskState) {
        debug!(task = %self.task_id, state = ?state, "task state changed");
        self.state_manager.on_task_state_changed(state);
    }

    /// The id of the task this executor runs.
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// True once `execute` has been entered.
    pub fn is_executed(&self) -> bool {
        self.executed
    }

    /// A shared flag that, once set, aborts the attempt at its next poll
    /// wait; the attempt then finishes in the failed state.
    pub fn cancellation_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// A structural summary of the harness graph, for equality checks
    /// between builds of the same plan.
    pub fn structure(&self) -> TaskStructure {
        let vertices = self
            .sorted
            .iter()
            .map(|&index| {
                let harness =
                    self.core.harnesses[index].as_ref().expect("no delivery in flight");
                VertexStructure {
                    id: harness.id.clone(),
                    is_source: harness.transform.is_none(),
                    diverts_output: harness.diverts,
                    main_children: harness
                        .routing
                        .main_children
                        .iter()
                        .map(|&child| self.core.vertex_id(child).to_owned())
                        .collect(),
                    tagged_children: harness
                        .routing
                        .tagged_children
                        .iter()
                        .map(|(tag, children)| {
                            (
                                tag.clone(),
                                children
                                    .iter()
                                    .map(|&child| self.core.vertex_id(child).to_owned())
                                    .collect(),
                            )
                        })
                        .collect(),
                    main_writers: harness.routing.main_writers.len(),
                    tagged_writers: harness
                        .routing
                        .tagged_writers
                        .iter()
                        .map(|(tag, writers)| (tag.clone(), writers.len()))
                        .collect(),
                }
            })
            .collect();
        let fetchers = self
            .fetchers
            .iter()
            .map(|fetcher| fetcher.describe(|index| self.core.vertex_id(index).to_owned()))
            .collect();
        TaskStructure { vertices, fetchers }
    }
}
