//! Control and metric channels back to the master.
//!
//! Everything here is a collaborator contract: the concrete connection,
//! metric store, and broadcast registry live with the executor runtime that
//! hosts many tasks. The message shapes are wire types and must stay stable
//! across the executor/master boundary.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{Data, InputReader};

/// Listener id of the master-side runtime message handler.
pub const RUNTIME_MASTER_MESSAGE_LISTENER_ID: &str = "RUNTIME_MASTER_MESSAGE_LISTENER_ID";

static MESSAGE_IDS: AtomicU64 = AtomicU64::new(1);

/// Draws a fresh control-message id, unique within this executor process.
pub fn generate_message_id() -> u64 {
    MESSAGE_IDS.fetch_add(1, Ordering::Relaxed)
}

/// Payload of an `ExecutorDataCollected` hand-off.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataCollectMessage {
    /// The serialized data diverted from the collecting vertex.
    pub data: String,
}

/// Body of a control message, discriminated by message type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMessageBody {
    /// Aggregated data diverted from a running task to inform replanning.
    ExecutorDataCollected(DataCollectMessage),
}

/// One message on the executor-to-master control channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    /// Fresh id from [`generate_message_id`].
    pub id: u64,
    /// The master-side listener this message is addressed to.
    pub listener_id: String,
    /// The typed payload.
    pub body: ControlMessageBody,
}

/// A capability to send control messages to one master-side listener.
pub trait MessageSender: Send + Sync {
    /// Sends one message. Safe to call from concurrently running executors.
    fn send(&self, message: ControlMessage);
}

/// A persistent, process-wide connection to the master.
pub trait PersistentConnectionToMaster: Send + Sync {
    /// A sender addressed to the given master-side listener.
    fn message_sender(&self, listener_id: &str) -> Arc<dyn MessageSender>;
}

/// Sends task metrics to the master-side metric store.
pub trait MetricMessageSender: Send + Sync {
    /// Records one serialized metric value under `(metric_type, metric_id,
    /// key)`. Safe to call from concurrently running executors.
    fn send(&self, metric_type: &str, metric_id: &str, key: &str, value: Vec<u8>);
}

/// Process-wide registry for broadcast variables and their readers.
pub trait BroadcastWorker<D: Data>: Send + Sync {
    /// Registers the reader that will materialize broadcast variable `id`.
    fn register_reader(&self, id: &str, reader: Box<dyn InputReader<D>>);

    /// Resolves a broadcast variable once materialized.
    fn variable(&self, id: &str) -> Option<Arc<dyn Any + Send + Sync>>;
}
