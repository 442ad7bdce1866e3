//! Task-local physical-plan structures.
//!
//! Everything here is immutable once built: the executor traverses these
//! shapes but never rewrites them. The compiler that produces them, and the
//! scheduler that decides where they run, live elsewhere in the runtime.

pub mod dag;
pub mod edge;
pub mod vertex;

pub use dag::IrDag;
pub use edge::{IrEdge, StageEdge};
pub use vertex::IrVertex;
