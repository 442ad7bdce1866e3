//! Double collaborators shared by the executor integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use crossbeam_channel::Receiver;

use rivulet::error::PlanError;
use rivulet::master::{
    BroadcastWorker, ControlMessage, MessageSender, MetricMessageSender,
    PersistentConnectionToMaster,
};
use rivulet::plan::{IrDag, IrVertex, StageEdge};
use rivulet::transfer::DataTransferFactory;
use rivulet::{
    Config, Data, Element, FetchError, InputReader, OutputCollector, OutputWriter, Readable, Task,
    TaskExecutor, TaskState, TaskStateManager, Transform, TransformContext, Watermark,
};

/// One scripted outcome of a pull on a test input. An exhausted script
/// finishes the stream.
pub enum Step<D> {
    Record(D),
    Watermark(u64),
    NotReady,
    Fail,
}

/// Shorthand for a script of plain records.
pub fn records<D>(items: impl IntoIterator<Item = D>) -> VecDeque<Step<D>> {
    items.into_iter().map(Step::Record).collect()
}

fn next_element<D>(step: Option<Step<D>>) -> Result<Element<D>, FetchError> {
    match step {
        None => Ok(Element::Finish),
        Some(Step::Record(record)) => Ok(Element::Record(record)),
        Some(Step::Watermark(at)) => Ok(Element::Watermark(Watermark(at))),
        Some(Step::NotReady) => Err(FetchError::NotReady),
        Some(Step::Fail) => Err(FetchError::Io(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "scripted channel failure",
        ))),
    }
}

/// A bounded source that replays a script.
pub struct ScriptedSource<D> {
    steps: VecDeque<Step<D>>,
}

impl<D> ScriptedSource<D> {
    pub fn new(steps: impl IntoIterator<Item = Step<D>>) -> Self {
        ScriptedSource { steps: steps.into_iter().collect() }
    }

    pub fn of(items: impl IntoIterator<Item = D>) -> Self {
        ScriptedSource { steps: records(items) }
    }
}

impl<D: Data> Readable<D> for ScriptedSource<D> {
    fn read_next(&mut self) -> Result<Element<D>, FetchError> {
        next_element(self.steps.pop_front())
    }
}

/// An incoming stage-edge reader that replays a script and settles its byte
/// counters once finished.
pub struct ScriptedReader<D> {
    src_vertex: String,
    steps: VecDeque<Step<D>>,
    serialized: Option<u64>,
    encoded: Option<u64>,
    finished: bool,
}

impl<D> ScriptedReader<D> {
    pub fn new(src_vertex: &str, steps: impl IntoIterator<Item = Step<D>>) -> Self {
        ScriptedReader {
            src_vertex: src_vertex.to_owned(),
            steps: steps.into_iter().collect(),
            serialized: None,
            encoded: None,
            finished: false,
        }
    }

    pub fn with_bytes(mut self, serialized: u64, encoded: u64) -> Self {
        self.serialized = Some(serialized);
        self.encoded = Some(encoded);
        self
    }
}

impl<D: Data> InputReader<D> for ScriptedReader<D> {
    fn source_vertex_id(&self) -> &str {
        &self.src_vertex
    }

    fn fetch(&mut self) -> Result<Element<D>, FetchError> {
        let fetched = next_element(self.steps.pop_front());
        if fetched.as_ref().is_ok_and(|element| element.is_finish()) {
            self.finished = true;
        }
        fetched
    }

    fn serialized_bytes(&self) -> Option<u64> {
        if self.finished {
            self.serialized
        } else {
            None
        }
    }

    fn encoded_bytes(&self) -> Option<u64> {
        if self.finished {
            self.encoded
        } else {
            None
        }
    }
}

/// An outgoing stage-edge writer that records everything written to it.
pub struct RecordingWriter<D> {
    written: Rc<RefCell<Vec<D>>>,
    closed: Rc<Cell<bool>>,
    written_bytes: Option<u64>,
    fail_write: bool,
    fail_close: bool,
}

impl<D> RecordingWriter<D> {
    pub fn new() -> Self {
        RecordingWriter {
            written: Rc::new(RefCell::new(Vec::new())),
            closed: Rc::new(Cell::new(false)),
            written_bytes: None,
            fail_write: false,
            fail_close: false,
        }
    }

    pub fn reporting(bytes: u64) -> Self {
        let mut writer = Self::new();
        writer.written_bytes = Some(bytes);
        writer
    }

    pub fn failing_on_write() -> Self {
        let mut writer = Self::new();
        writer.fail_write = true;
        writer
    }

    pub fn failing_on_close() -> Self {
        let mut writer = Self::new();
        writer.fail_close = true;
        writer
    }

    /// Handle onto everything written, usable after the writer has moved
    /// into the executor.
    pub fn sink(&self) -> Rc<RefCell<Vec<D>>> {
        self.written.clone()
    }

    /// Handle onto the closed flag.
    pub fn closed_flag(&self) -> Rc<Cell<bool>> {
        self.closed.clone()
    }
}

impl<D: Data> OutputWriter<D> for RecordingWriter<D> {
    fn write(&mut self, record: D) -> io::Result<()> {
        if self.fail_write {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted write failure"));
        }
        self.written.borrow_mut().push(record);
        Ok(())
    }

    fn close(&mut self) -> io::Result<Option<u64>> {
        if self.fail_close {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted close failure"));
        }
        self.closed.set(true);
        Ok(self.written_bytes)
    }
}

/// A transfer factory that hands out pre-scripted channels by edge id.
pub struct TestTransfer<D> {
    readers: HashMap<String, ScriptedReader<D>>,
    writers: HashMap<String, RecordingWriter<D>>,
}

impl<D> TestTransfer<D> {
    pub fn new() -> Self {
        TestTransfer { readers: HashMap::new(), writers: HashMap::new() }
    }

    pub fn reader(mut self, edge_id: &str, reader: ScriptedReader<D>) -> Self {
        self.readers.insert(edge_id.to_owned(), reader);
        self
    }

    pub fn writer(mut self, edge_id: &str, writer: RecordingWriter<D>) -> Self {
        self.writers.insert(edge_id.to_owned(), writer);
        self
    }
}

impl<D: Data> DataTransferFactory<D> for TestTransfer<D> {
    fn create_reader(&mut self, _task_index: usize, edge: &StageEdge) -> Box<dyn InputReader<D>> {
        let reader = self
            .readers
            .remove(&edge.id)
            .unwrap_or_else(|| panic!("no reader scripted for edge {}", edge.id));
        Box::new(reader)
    }

    fn create_writer(&mut self, _task_id: &str, edge: &StageEdge) -> Box<dyn OutputWriter<D>> {
        let writer = self
            .writers
            .remove(&edge.id)
            .unwrap_or_else(|| panic!("no writer scripted for edge {}", edge.id));
        Box::new(writer)
    }
}

/// Records every state transition the executor reports.
pub struct StateRecorder {
    states: Rc<RefCell<Vec<TaskState>>>,
}

impl StateRecorder {
    pub fn new() -> (Box<dyn TaskStateManager>, Rc<RefCell<Vec<TaskState>>>) {
        let states = Rc::new(RefCell::new(Vec::new()));
        (Box::new(StateRecorder { states: states.clone() }), states)
    }
}

impl TaskStateManager for StateRecorder {
    fn on_task_state_changed(&mut self, state: TaskState) {
        let mut states = self.states.borrow_mut();
        // A run reports Executing once and then exactly one terminal state.
        if let Some(last) = states.last() {
            assert!(!last.is_terminal(), "state reported after terminal state {last:?}");
        }
        states.push(state);
    }
}

/// Records every metric send.
#[derive(Default)]
pub struct MetricRecorder {
    pub sends: Mutex<Vec<(String, String, String, Vec<u8>)>>,
}

impl MetricRecorder {
    /// Decoded value of the first send under `key`, if any.
    pub fn value_of(&self, key: &str) -> Option<u64> {
        self.sends
            .lock()
            .unwrap()
            .iter()
            .find(|(_, _, sent_key, _)| sent_key == key)
            .map(|(_, _, _, value)| bincode::deserialize(value).unwrap())
    }

    pub fn is_empty(&self) -> bool {
        self.sends.lock().unwrap().is_empty()
    }
}

impl MetricMessageSender for MetricRecorder {
    fn send(&self, metric_type: &str, metric_id: &str, key: &str, value: Vec<u8>) {
        self.sends.lock().unwrap().push((
            metric_type.to_owned(),
            metric_id.to_owned(),
            key.to_owned(),
            value,
        ));
    }
}

/// A master connection backed by a channel the test can drain.
pub struct ChannelMaster {
    sender: crossbeam_channel::Sender<ControlMessage>,
}

impl ChannelMaster {
    pub fn new() -> (Arc<Self>, Receiver<ControlMessage>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Arc::new(ChannelMaster { sender }), receiver)
    }
}

struct ChannelSender(crossbeam_channel::Sender<ControlMessage>);

impl MessageSender for ChannelSender {
    fn send(&self, message: ControlMessage) {
        let _ = self.0.send(message);
    }
}

impl PersistentConnectionToMaster for ChannelMaster {
    fn message_sender(&self, _listener_id: &str) -> Arc<dyn MessageSender> {
        Arc::new(ChannelSender(self.sender.clone()))
    }
}

/// Records broadcast-reader registrations and serves preset variables.
#[derive(Default)]
pub struct BroadcastRecorder {
    pub registered: Mutex<Vec<String>>,
    pub variables: Mutex<HashMap<String, Arc<dyn std::any::Any + Send + Sync>>>,
}

impl<D: Data> BroadcastWorker<D> for BroadcastRecorder {
    fn register_reader(&self, id: &str, _reader: Box<dyn InputReader<D>>) {
        self.registered.lock().unwrap().push(id.to_owned());
    }

    fn variable(&self, id: &str) -> Option<Arc<dyn std::any::Any + Send + Sync>> {
        self.variables.lock().unwrap().get(id).cloned()
    }
}

/// Shared prepare/close call counters of one transform.
#[derive(Clone, Default)]
pub struct Lifecycle {
    pub prepares: Rc<Cell<usize>>,
    pub closes: Rc<Cell<usize>>,
}

impl Lifecycle {
    fn on_prepare(&self) {
        self.prepares.set(self.prepares.get() + 1);
    }

    fn on_close(&self) {
        self.closes.set(self.closes.get() + 1);
    }
}

/// Forwards each record through a mapping function.
pub struct MapTransform<F> {
    func: F,
    lifecycle: Lifecycle,
}

impl<F> MapTransform<F> {
    pub fn new(func: F) -> (Self, Lifecycle) {
        let lifecycle = Lifecycle::default();
        (MapTransform { func, lifecycle: lifecycle.clone() }, lifecycle)
    }
}

impl<D: Data, F: FnMut(D) -> D + 'static> Transform<D> for MapTransform<F> {
    fn prepare(&mut self, _context: &mut TransformContext<D>) {
        self.lifecycle.on_prepare();
    }

    fn on_data(&mut self, record: D, out: &mut dyn OutputCollector<D>) {
        out.emit((self.func)(record));
    }

    fn close(&mut self, _out: &mut dyn OutputCollector<D>) {
        self.lifecycle.on_close();
    }
}

/// Swallows records into a shared list.
pub struct SinkTransform<D> {
    seen: Rc<RefCell<Vec<D>>>,
    lifecycle: Lifecycle,
}

impl<D> SinkTransform<D> {
    pub fn new() -> (Self, Rc<RefCell<Vec<D>>>, Lifecycle) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let lifecycle = Lifecycle::default();
        (
            SinkTransform { seen: seen.clone(), lifecycle: lifecycle.clone() },
            seen,
            lifecycle,
        )
    }
}

impl<D: Data> Transform<D> for SinkTransform<D> {
    fn prepare(&mut self, _context: &mut TransformContext<D>) {
        self.lifecycle.on_prepare();
    }

    fn on_data(&mut self, record: D, _out: &mut dyn OutputCollector<D>) {
        self.seen.borrow_mut().push(record);
    }

    fn close(&mut self, _out: &mut dyn OutputCollector<D>) {
        self.lifecycle.on_close();
    }
}

/// Re-emits every record on the main output and one named side output.
pub struct SideOutputTransform {
    tag: String,
}

impl SideOutputTransform {
    pub fn new(tag: &str) -> Self {
        SideOutputTransform { tag: tag.to_owned() }
    }
}

impl<D: Data> Transform<D> for SideOutputTransform {
    fn prepare(&mut self, _context: &mut TransformContext<D>) {}

    fn on_data(&mut self, record: D, out: &mut dyn OutputCollector<D>) {
        out.emit(record.clone());
        out.emit_tagged(&self.tag, record);
    }

    fn close(&mut self, _out: &mut dyn OutputCollector<D>) {}
}

/// Aggregates string records and emits the aggregate at close; marked as a
/// metric aggregator, so the emission diverts to the master and the task
/// finishes on hold.
pub struct HoldingAggregator {
    items: Vec<String>,
    lifecycle: Lifecycle,
}

impl HoldingAggregator {
    pub fn new() -> (Self, Lifecycle) {
        let lifecycle = Lifecycle::default();
        (HoldingAggregator { items: Vec::new(), lifecycle: lifecycle.clone() }, lifecycle)
    }
}

impl Transform<String> for HoldingAggregator {
    fn prepare(&mut self, _context: &mut TransformContext<String>) {
        self.lifecycle.on_prepare();
    }

    fn on_data(&mut self, record: String, _out: &mut dyn OutputCollector<String>) {
        self.items.push(record);
    }

    fn close(&mut self, out: &mut dyn OutputCollector<String>) {
        self.lifecycle.on_close();
        out.emit(self.items.join(","));
    }

    fn is_metric_aggregator(&self) -> bool {
        true
    }
}

/// A source vertex.
pub fn source<D: Data>(id: &str) -> IrVertex<D> {
    IrVertex::Source { id: id.to_owned() }
}

/// An operator vertex over the given transform.
pub fn operator<D: Data>(id: &str, transform: impl Transform<D> + 'static) -> IrVertex<D> {
    IrVertex::Operator { id: id.to_owned(), transform: Box::new(transform) }
}

/// A task descriptor with fixed id and shard index.
pub fn task<D: Data>(
    incoming: Vec<StageEdge>,
    outgoing: Vec<StageEdge>,
    readables: Vec<(&str, ScriptedSource<D>)>,
) -> Task<D> {
    Task {
        task_id: "plan-stage0-0-attempt0".to_owned(),
        task_index: 0,
        incoming,
        outgoing,
        readables: readables
            .into_iter()
            .map(|(id, readable)| (id.to_owned(), Box::new(readable) as Box<dyn Readable<D>>))
            .collect(),
    }
}

/// Observation handles onto one executor's collaborators.
pub struct Probes {
    pub states: Rc<RefCell<Vec<TaskState>>>,
    pub metrics: Arc<MetricRecorder>,
    pub master: Receiver<ControlMessage>,
    pub broadcast: Arc<BroadcastRecorder>,
}

/// Builds an executor over recording collaborators, with a caller-supplied
/// broadcast registry.
pub fn try_build_with<D: Data>(
    task: Task<D>,
    dag: IrDag<D>,
    transfer: &mut TestTransfer<D>,
    config: Config,
    broadcast: Arc<BroadcastRecorder>,
) -> Result<(TaskExecutor<D>, Probes), PlanError> {
    let (state_manager, states) = StateRecorder::new();
    let metrics = Arc::new(MetricRecorder::default());
    let (master, master_receiver) = ChannelMaster::new();
    let executor = TaskExecutor::new(
        task,
        dag,
        state_manager,
        transfer,
        broadcast.clone(),
        metrics.clone(),
        master,
        config,
    )?;
    Ok((executor, Probes { states, metrics, master: master_receiver, broadcast }))
}

/// Builds an executor over recording collaborators.
pub fn try_build<D: Data>(
    task: Task<D>,
    dag: IrDag<D>,
    transfer: &mut TestTransfer<D>,
    config: Config,
) -> Result<(TaskExecutor<D>, Probes), PlanError> {
    try_build_with(task, dag, transfer, config, Arc::new(BroadcastRecorder::default()))
}

/// Builds an executor over recording collaborators, panicking on plan errors.
pub fn build<D: Data>(
    task: Task<D>,
    dag: IrDag<D>,
    transfer: &mut TestTransfer<D>,
    config: Config,
) -> (TaskExecutor<D>, Probes) {
    try_build(task, dag, transfer, config).expect("plan should build")
}

/// A poll interval short enough to keep tests quick.
pub fn fast_config() -> Config {
    Config { poll_interval: std::time::Duration::from_millis(5) }
}
