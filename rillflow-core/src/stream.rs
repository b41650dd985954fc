//! Append-only streams.
//!
//! A stream is an unbounded log of [`Sample`]s with exactly one producer and
//! any number of readers. Once appended, an element's value and position never
//! change; readers keep their own cursors (see [`crate::agent::Subscription`])
//! so no reader ever disturbs another.

use crate::error::RillError;
use crate::types::{AgentId, Sample};

/// The single party allowed to append to a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Producer {
    /// An agent in the same graph writes this stream as one of its outputs.
    Agent(AgentId),
    /// A source thread feeds this stream from outside the graph.
    Source,
    /// A relay feeds this stream from another process.
    Boundary,
}

pub struct Stream {
    name: String,
    data: Vec<Sample>,
    pub(crate) subscribers: Vec<AgentId>,
    pub(crate) producer: Option<Producer>,
}

impl Stream {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            data: Vec::new(),
            subscribers: Vec::new(),
            producer: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total number of elements appended so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Immutable view of positions `[start, stop)`.
    pub fn slice(&self, start: usize, stop: usize) -> Result<&[Sample], RillError> {
        if start > stop || stop > self.data.len() {
            return Err(RillError::Range {
                stream: self.name.clone(),
                start,
                stop,
                len: self.data.len(),
            });
        }
        Ok(&self.data[start..stop])
    }

    pub(crate) fn extend(&mut self, values: Vec<Sample>) {
        self.data.extend(values);
    }
}
