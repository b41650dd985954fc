//! Incremental dataflow runtime.
//!
//! Programs are graphs of append-only [streams](stream) and reactive
//! [agents](agent), scheduled to quiescence inside a [process](process) and
//! composed across OS processes by [pipelines](pipeline). Agents consume
//! exactly what they say they consumed and see the rest again later, so
//! windowing and uneven merges fall out of one invocation contract instead of
//! per-operator buffering.
//!
//! Typical layering, bottom up:
//!
//! - [`types`]: ids and the type-erased [`Sample`](types::Sample) element.
//! - [`stream`] / [`agent`] / [`graph`]: the data model.
//! - [`scheduler`]: growth-driven execution to quiescence.
//! - [`ops`] / [`window`] / [`merge`]: typed operator constructors.
//! - [`source`] / [`process`] / [`pipeline`]: threads, boundaries, relays.

pub mod agent;
mod channel;
pub mod error;
pub mod graph;
pub mod merge;
pub mod ops;
pub mod pipeline;
pub mod process;
pub mod scheduler;
pub mod source;
pub mod stream;
pub mod types;
pub mod window;

pub use error::RillError;
