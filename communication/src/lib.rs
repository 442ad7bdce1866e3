//! Element streams and channel contracts for rivulet task execution.
//!
//! This crate defines the vocabulary that moves between task shards and the
//! capability contracts the execution core consumes, without knowing anything
//! about plans, tasks, or transforms:
//!
//! **Elements**: the [`Element`] sum is the unit pulled from any input: a
//! data record, an out-of-band [`Watermark`], or the distinguished
//! [`Element::Finish`] marker that ends a stream.
//!
//! **Faults**: a single pull either produces an element or fails with a
//! [`FetchError`], which separates the transient nothing-right-now signal
//! from a broken channel.
//!
//! **Channels**: [`InputReader`] and [`OutputWriter`] are the two ends of a
//! stage edge between task shards, with byte accounting; [`Readable`] is a
//! bounded, restart-free source feeding a source vertex directly.
//!
//! Implementations of these contracts live with the transport and storage
//! layers; the execution core only ever addresses them through the traits
//! defined here.

#![forbid(missing_docs)]

pub mod element;
pub mod fault;
pub mod reader;
pub mod readable;
pub mod writer;

pub use element::{Element, Watermark};
pub use fault::FetchError;
pub use reader::InputReader;
pub use readable::Readable;
pub use writer::OutputWriter;

/// A composite trait for element payloads moved between task shards.
pub trait Data: Clone + serde::Serialize + 'static {}
impl<T: Clone + serde::Serialize + 'static> Data for T {}
