//! Pull handles over a task's inputs.

use std::time::{Duration, Instant};

use crate::executor::harness::FetcherStructure;
use crate::executor::metrics::TaskMetrics;
use crate::{Data, Element, FetchError, InputReader, Readable};

/// A unified pull interface over one input, carrying the arena index of the
/// vertex its elements are delivered into.
///
/// A fetcher is created at construction, retired from the loop's working
/// lists when it yields [`Element::Finish`], and closed by being dropped at
/// task end; the consumed channel contracts own no close operation.
pub(crate) enum DataFetcher<D: Data> {
    /// Wraps a bounded readable feeding a source vertex.
    Source(SourceFetcher<D>),
    /// Wraps the reader of one incoming stage edge.
    ParentTask(ParentTaskFetcher<D>),
}

pub(crate) struct SourceFetcher<D: Data> {
    target: usize,
    readable: Box<dyn Readable<D>>,
    /// Time spent inside the readable, folded into the task metrics once the
    /// source finishes.
    read_time: Duration,
}

pub(crate) struct ParentTaskFetcher<D: Data> {
    target: usize,
    reader: Box<dyn InputReader<D>>,
}

impl<D: Data> DataFetcher<D> {
    pub(crate) fn source(readable: Box<dyn Readable<D>>, target: usize) -> Self {
        DataFetcher::Source(SourceFetcher { target, readable, read_time: Duration::ZERO })
    }

    pub(crate) fn parent_task(reader: Box<dyn InputReader<D>>, target: usize) -> Self {
        DataFetcher::ParentTask(ParentTaskFetcher { target, reader })
    }

    /// Pulls one element off the input.
    #[inline]
    pub(crate) fn fetch_one(&mut self) -> Result<Element<D>, FetchError> {
        match self {
            DataFetcher::Source(fetcher) => {
                let started = Instant::now();
                let fetched = fetcher.readable.read_next();
                fetcher.read_time += started.elapsed();
                fetched
            }
            DataFetcher::ParentTask(fetcher) => fetcher.reader.fetch(),
        }
    }

    /// Arena index of the vertex this fetcher delivers into.
    #[inline]
    pub(crate) fn target(&self) -> usize {
        match self {
            DataFetcher::Source(fetcher) => fetcher.target,
            DataFetcher::ParentTask(fetcher) => fetcher.target,
        }
    }

    /// Folds this fetcher's terminal counters into the task-wide metrics.
    /// Byte counters are settled only once the input has finished.
    pub(crate) fn fold_terminal_counters(&self, metrics: &mut TaskMetrics) {
        match self {
            DataFetcher::Source(fetcher) => {
                metrics.bounded_source_read_time =
                    metrics.bounded_source_read_time.saturating_add(fetcher.read_time);
            }
            DataFetcher::ParentTask(fetcher) => {
                if let Some(bytes) = fetcher.reader.serialized_bytes() {
                    metrics.serialized_read_bytes =
                        metrics.serialized_read_bytes.saturating_add(bytes);
                }
                if let Some(bytes) = fetcher.reader.encoded_bytes() {
                    metrics.encoded_read_bytes = metrics.encoded_read_bytes.saturating_add(bytes);
                }
            }
        }
    }

    /// The shape of this fetcher, for structural comparisons.
    pub(crate) fn describe(&self, vertex_id_of: impl Fn(usize) -> String) -> FetcherStructure {
        match self {
            DataFetcher::Source(fetcher) => FetcherStructure::Source {
                vertex: vertex_id_of(fetcher.target),
            },
            DataFetcher::ParentTask(fetcher) => FetcherStructure::ParentTask {
                vertex: vertex_id_of(fetcher.target),
                src_vertex: fetcher.reader.source_vertex_id().to_owned(),
            },
        }
    }
}
